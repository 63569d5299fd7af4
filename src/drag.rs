//! Node dragging.
//!
//! [`use_drag`] attaches a drag controller to the pointer events of a flow.
//! A press on a node arms the controller; once the pointer has travelled
//! further than the store's drag threshold every selected draggable node
//! (plus the pressed one) follows the pointer. Positions go through the
//! store's `update_node_positions`, so extents, snapping and parent
//! expansion all apply.

use crate::errors::FlowError;
use crate::events::{InputEvents, ListenerGuard, PointerEvent, PointerEventKind, PointerTarget};
use crate::geometry::{point_to_renderer_point, snap_position, Dimensions, XYPosition};
use crate::lookup::{calculate_node_position, NodeLookup};
use crate::nodes::{ElementData, Node};
use crate::store::{FlowStore, NodeDragEvent};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// A node taking part in a drag.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDragItem {
    pub id: String,
    /// Relative to the parent.
    pub position: XYPosition,
    pub position_absolute: XYPosition,
    pub measured: Dimensions,
    /// Pointer position minus the node's absolute position at drag start.
    pub distance: XYPosition,
}

/// Whether any ancestor of `id` is selected.
fn is_parent_selected<D>(id: &str, lookup: &NodeLookup<D>) -> bool {
    let mut current = lookup.get(id).and_then(|n| n.parent_id.as_deref());
    let mut depth = 0;
    while let Some(parent_id) = current {
        let Some(parent) = lookup.get(parent_id) else {
            return false;
        };
        if parent.selected {
            return true;
        }
        current = parent.parent_id.as_deref();
        depth += 1;
        if depth > lookup.len() {
            return false;
        }
    }
    false
}

/// Nodes that move when `node_id` is dragged from `pointer` (flow space):
/// the selected draggable nodes and `node_id` itself, without children
/// whose parent is already moving.
pub fn get_drag_items<D>(
    lookup: &NodeLookup<D>,
    nodes_draggable: bool,
    pointer: XYPosition,
    node_id: Option<&str>,
) -> Vec<NodeDragItem> {
    lookup
        .values()
        .filter(|node| {
            (node.selected || Some(node.id.as_str()) == node_id)
                && (node.parent_id.is_none() || !is_parent_selected(&node.id, lookup))
                && node.is_draggable(nodes_draggable)
        })
        .map(|node| {
            let absolute = node.internals.position_absolute;
            NodeDragItem {
                id: node.id.clone(),
                position: node.position,
                position_absolute: absolute,
                measured: node.dimensions(),
                distance: XYPosition::new(pointer.x - absolute.x, pointer.y - absolute.y),
            }
        })
        .collect()
}

/// Select or deselect a node the way a click on it does.
pub fn handle_node_click<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>, id: &str, unselect: bool) {
    let Some((selected, multi_selection_active)) =
        store.read(|s| s.node_lookup.get(id).map(|n| (n.selected, s.multi_selection_active)))
    else {
        store.report_error(&FlowError::NodeNotFound { id: id.to_string() });
        return;
    };

    store.set_state(|s| s.nodes_selection_active = false);
    if !selected {
        store.add_selected_nodes(&[id.to_string()]);
    } else if unselect || multi_selection_active {
        let ids = [id.to_string()];
        store.unselect_nodes_and_edges(Some(&ids[..]), Some(&[][..]));
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DragOptions {
    /// Only presses on this node start a drag. `None` accepts any node.
    pub node_id: Option<String>,
    pub disabled: bool,
    /// Whether a press may change the selection.
    pub is_selectable: bool,
}

impl Default for DragOptions {
    fn default() -> Self {
        Self {
            node_id: None,
            disabled: false,
            is_selectable: true,
        }
    }
}

impl DragOptions {
    pub fn for_node(node_id: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.into()),
            disabled: false,
            is_selectable: true,
        }
    }
}

struct DragController<ND, ED> {
    store: FlowStore<ND, ED>,
    options: DragOptions,
    /// Node pressed and pointer position (pane) at press time.
    armed: Option<(String, XYPosition)>,
    items: Vec<NodeDragItem>,
    dragging: bool,
}

impl<ND: ElementData, ED: ElementData> DragController<ND, ED> {
    fn pointer_to_flow(&self, position: XYPosition) -> XYPosition {
        self.store
            .read(|s| point_to_renderer_point(position, s.viewport, false, s.snap_grid))
    }

    fn drag_event(&self, node_id: &str) -> Option<NodeDragEvent<ND>> {
        self.store.read(|s| {
            let node = s.node_lookup.get(node_id)?.node.clone();
            let nodes = self
                .items
                .iter()
                .filter_map(|item| s.node_lookup.get(&item.id).map(|n| n.node.clone()))
                .collect::<Vec<Node<ND>>>();
            Some(NodeDragEvent { node, nodes })
        })
    }
}

/// A mounted drag controller. Dropping it detaches its pointer listener.
pub struct NodeDrag<ND = Value, ED = Value> {
    controller: Rc<RefCell<DragController<ND, ED>>>,
    _guard: ListenerGuard,
}

pub fn use_drag<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    events: &InputEvents,
    options: DragOptions,
) -> NodeDrag<ND, ED> {
    let controller = Rc::new(RefCell::new(DragController {
        store: store.clone(),
        options,
        armed: None,
        items: Vec::new(),
        dragging: false,
    }));
    let guard = {
        let controller = controller.clone();
        events.pointer.add(move |event| on_pointer(&controller, event))
    };
    NodeDrag {
        controller,
        _guard: guard,
    }
}

impl<ND: ElementData, ED: ElementData> NodeDrag<ND, ED> {
    pub fn is_dragging(&self) -> bool {
        self.controller.borrow().dragging
    }

    /// Replace the options. Disabling cancels an armed press but lets a
    /// running drag finish.
    pub fn update(&self, options: DragOptions) {
        let mut controller = self.controller.borrow_mut();
        if options.disabled && !controller.dragging {
            controller.armed = None;
        }
        controller.options = options;
    }

    /// End a running drag where the nodes are now, as a pointer release
    /// would, and drop an armed press.
    pub fn cancel(&self) {
        on_up(&self.controller);
    }
}

fn on_pointer<ND: ElementData, ED: ElementData>(controller: &Rc<RefCell<DragController<ND, ED>>>, event: &PointerEvent) {
    match event.kind {
        PointerEventKind::Down => on_down(controller, event),
        PointerEventKind::Move => on_move(controller, event),
        PointerEventKind::Up | PointerEventKind::Cancel => on_up(controller),
    }
}

fn on_down<ND: ElementData, ED: ElementData>(controller: &Rc<RefCell<DragController<ND, ED>>>, event: &PointerEvent) {
    let PointerTarget::Node(node_id) = &event.target else {
        return;
    };
    let (store, is_selectable) = {
        let ctrl = controller.borrow();
        if ctrl.options.disabled || ctrl.options.node_id.as_ref().map_or(false, |id| id != node_id) {
            return;
        }
        (ctrl.store.clone(), ctrl.options.is_selectable)
    };

    let (select_nodes_on_drag, multi_selection_active, selected) = store.read(|s| {
        (
            s.select_nodes_on_drag,
            s.multi_selection_active,
            s.node_lookup.get(node_id).map_or(false, |n| n.selected),
        )
    });
    if !select_nodes_on_drag && !multi_selection_active && !selected {
        store.unselect_nodes_and_edges(None, None);
    }
    if is_selectable && select_nodes_on_drag {
        handle_node_click(&store, node_id, false);
    }

    let mut ctrl = controller.borrow_mut();
    ctrl.armed = Some((node_id.clone(), event.position));
    ctrl.items.clear();
}

fn on_move<ND: ElementData, ED: ElementData>(controller: &Rc<RefCell<DragController<ND, ED>>>, event: &PointerEvent) {
    let (store, node_id, started) = {
        let ctrl = controller.borrow();
        let Some((node_id, start)) = ctrl.armed.clone() else {
            return;
        };
        if !ctrl.dragging {
            let threshold = ctrl.store.read(|s| s.node_drag_threshold);
            if event.position.distance_to(start) <= threshold {
                return;
            }
        }
        (ctrl.store.clone(), node_id, !ctrl.dragging)
    };

    let pointer = controller.borrow().pointer_to_flow(event.position);

    if started {
        let start = {
            let ctrl = controller.borrow();
            ctrl.armed.as_ref().map(|(_, start)| *start).unwrap_or(event.position)
        };
        let start = controller.borrow().pointer_to_flow(start);
        let items = store.read(|s| get_drag_items(&s.node_lookup, s.nodes_draggable, start, Some(&node_id)));
        if items.is_empty() {
            controller.borrow_mut().armed = None;
            return;
        }
        {
            let mut ctrl = controller.borrow_mut();
            ctrl.items = items;
            ctrl.dragging = true;
        }
        store.set_state(|s| s.dragging = true);
        tracing::trace!(node = %node_id, "flow: drag start");
        let start_event = controller.borrow().drag_event(&node_id);
        if let Some(start_event) = start_event {
            store.events().node_drag_start.emit(&start_event);
        }
    }

    let (snap_to_grid, snap_grid, node_origin, node_extent) =
        store.read(|s| (s.snap_to_grid, s.snap_grid, s.node_origin, s.node_extent));
    let mut errors = Vec::new();
    let mut moved = false;
    let items = {
        let mut ctrl = controller.borrow_mut();
        store.read(|s| {
            for item in ctrl.items.iter_mut() {
                let mut next = XYPosition::new(pointer.x - item.distance.x, pointer.y - item.distance.y);
                if snap_to_grid {
                    next = snap_position(next, snap_grid);
                }
                let Some(resolved) = calculate_node_position(
                    &item.id,
                    next,
                    &s.node_lookup,
                    node_origin,
                    node_extent,
                    &mut |err| errors.push(err),
                ) else {
                    continue;
                };
                if resolved.position_absolute != item.position_absolute {
                    moved = true;
                }
                item.position = resolved.position;
                item.position_absolute = resolved.position_absolute;
            }
        });
        ctrl.items.clone()
    };
    for error in &errors {
        store.report_error(error);
    }
    if !moved {
        return;
    }

    store.update_node_positions(&items, true);
    let drag_event = controller.borrow().drag_event(&node_id);
    if let Some(drag_event) = drag_event {
        store.events().node_drag.emit(&drag_event);
    }
}

fn on_up<ND: ElementData, ED: ElementData>(controller: &Rc<RefCell<DragController<ND, ED>>>) {
    let (store, node_id, items) = {
        let mut ctrl = controller.borrow_mut();
        let armed = ctrl.armed.take();
        if !ctrl.dragging {
            return;
        }
        ctrl.dragging = false;
        let Some((node_id, _)) = armed else {
            return;
        };
        (ctrl.store.clone(), node_id, ctrl.items.clone())
    };

    store.update_node_positions(&items, false);
    store.set_state(|s| s.dragging = false);
    let stop_event = controller.borrow().drag_event(&node_id);
    controller.borrow_mut().items.clear();
    tracing::trace!(node = %node_id, "flow: drag stop");
    if let Some(stop_event) = stop_event {
        store.events().node_drag_stop.emit(&stop_event);
    }
}

/// Moves the selected draggable nodes with the keyboard.
#[derive(Clone)]
pub struct MoveSelectedNodes<ND = Value, ED = Value> {
    store: FlowStore<ND, ED>,
}

pub fn use_move_selected_nodes<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
) -> MoveSelectedNodes<ND, ED> {
    MoveSelectedNodes {
        store: store.clone(),
    }
}

impl<ND: ElementData, ED: ElementData> MoveSelectedNodes<ND, ED> {
    /// Move by `direction * factor` steps. A step is 5 units, or one grid
    /// cell when snapping.
    pub fn move_selected_nodes(&self, direction: XYPosition, factor: f32) {
        let mut errors = Vec::new();
        let items = self.store.read(|s| {
            let velocity = if s.snap_to_grid { s.snap_grid } else { [5.0, 5.0] };
            let dx = direction.x * velocity[0] * factor;
            let dy = direction.y * velocity[1] * factor;

            s.node_lookup
                .values()
                .filter(|n| n.selected && n.is_draggable(s.nodes_draggable))
                .filter_map(|node| {
                    let absolute = node.internals.position_absolute;
                    let mut next = XYPosition::new(absolute.x + dx, absolute.y + dy);
                    if s.snap_to_grid {
                        next = snap_position(next, s.snap_grid);
                    }
                    let resolved = calculate_node_position(
                        &node.id,
                        next,
                        &s.node_lookup,
                        s.node_origin,
                        s.node_extent,
                        &mut |err| errors.push(err),
                    )?;
                    Some(NodeDragItem {
                        id: node.id.clone(),
                        position: resolved.position,
                        position_absolute: resolved.position_absolute,
                        measured: node.dimensions(),
                        distance: XYPosition::default(),
                    })
                })
                .collect::<Vec<_>>()
        });
        for error in &errors {
            self.store.report_error(error);
        }
        if !items.is_empty() {
            self.store.update_node_positions(&items, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowOptions;
    use crate::nodes::InternalNode;

    fn lookup(nodes: Vec<Node<()>>) -> NodeLookup<()> {
        nodes
            .into_iter()
            .map(|n| {
                let pos = n.position;
                (n.id.clone(), InternalNode::from_user_node(&n, pos, 0))
            })
            .collect()
    }

    // ========================================================================
    // get_drag_items()
    // ========================================================================

    #[test]
    fn test_drag_items_are_selection_plus_pressed_node() {
        let lookup = lookup(vec![
            Node::new("a", XYPosition::new(10.0, 10.0), ()),
            Node::new("b", XYPosition::new(50.0, 0.0), ()).with_selected(true),
            Node::new("c", XYPosition::new(0.0, 0.0), ()),
        ]);
        let items = get_drag_items(&lookup, true, XYPosition::new(15.0, 15.0), Some("a"));

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(items[0].distance, XYPosition::new(5.0, 5.0));
    }

    #[test]
    fn test_drag_items_skip_children_of_selected_parents() {
        let lookup = lookup(vec![
            Node::new("p", XYPosition::default(), ()).with_selected(true),
            Node::new("c", XYPosition::default(), ()).with_parent("p").with_selected(true),
        ]);
        let items = get_drag_items(&lookup, true, XYPosition::default(), None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "p");
    }

    #[test]
    fn test_drag_items_respect_draggable() {
        let lookup = lookup(vec![
            Node::new("a", XYPosition::default(), ()).with_selected(true).with_draggable(false),
            Node::new("b", XYPosition::default(), ()).with_selected(true),
        ]);
        assert_eq!(get_drag_items(&lookup, true, XYPosition::default(), None).len(), 1);
        assert!(get_drag_items(&lookup, false, XYPosition::default(), None).is_empty());
    }

    // ========================================================================
    // NodeDrag::cancel()
    // ========================================================================

    fn pointer(kind: PointerEventKind, x: f32, y: f32) -> PointerEvent {
        PointerEvent::new(kind, XYPosition::new(x, y))
    }

    #[test]
    fn test_cancel_ends_running_drag() {
        let store: FlowStore<(), ()> = FlowStore::new(FlowOptions::new().with_default_nodes(vec![
            Node::new("a", XYPosition::new(0.0, 0.0), ()).with_measured(50.0, 50.0),
        ]));
        let events = InputEvents::new();
        let drag = use_drag(&store, &events, DragOptions::default());
        let stops = Rc::new(RefCell::new(Vec::new()));
        let _stop = {
            let stops = stops.clone();
            store
                .events()
                .node_drag_stop
                .add(move |event| stops.borrow_mut().push(event.node.id.clone()))
        };

        events
            .pointer
            .emit(&pointer(PointerEventKind::Down, 5.0, 5.0).on(PointerTarget::Node("a".to_string())));
        events.pointer.emit(&pointer(PointerEventKind::Move, 25.0, 15.0));
        assert!(drag.is_dragging());
        assert!(store.read(|s| s.nodes[0].dragging));

        drag.cancel();

        assert!(!drag.is_dragging());
        store.read(|s| {
            assert!(!s.dragging);
            assert!(!s.nodes[0].dragging);
            assert!(!s.node_lookup["a"].dragging);
            assert_eq!(s.nodes[0].position, XYPosition::new(20.0, 10.0));
        });
        assert_eq!(*stops.borrow(), vec!["a".to_string()]);

        // Nothing left to end
        drag.cancel();
        assert_eq!(stops.borrow().len(), 1);
    }

    #[test]
    fn test_cancel_drops_armed_press() {
        let store: FlowStore<(), ()> = FlowStore::new(FlowOptions::new().with_default_nodes(vec![
            Node::new("a", XYPosition::new(0.0, 0.0), ()).with_measured(50.0, 50.0),
        ]));
        let events = InputEvents::new();
        let drag = use_drag(&store, &events, DragOptions::default());

        events
            .pointer
            .emit(&pointer(PointerEventKind::Down, 5.0, 5.0).on(PointerTarget::Node("a".to_string())));
        drag.cancel();
        events.pointer.emit(&pointer(PointerEventKind::Move, 25.0, 15.0));

        assert!(!drag.is_dragging());
        assert_eq!(store.read(|s| s.nodes[0].position), XYPosition::default());
    }
}
