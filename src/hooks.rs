//! Read handles and listener registrations over a store.
//!
//! Every `use_*` read handle is a [`Derived`] value: it follows the store
//! and is only updated when the selected value changes. Registration
//! helpers return guards that unregister when dropped.

use crate::connections::{ConnectionKey, ConnectionState, HandleConnection};
use crate::edges::{is_edge_visible, Edge};
use crate::errors::FlowError;
use crate::events::{InputEvents, ListenerGuard, WindowEvent};
use crate::geometry::{point_to_renderer_point, Rect, Viewport};
use crate::nodes::{get_nodes_inside, ElementData, HandleType, InternalNode, Node};
use crate::reactive::{use_store, Derived};
use crate::selection::SelectionChange;
use crate::store::{FlowStore, UpdateNodeInternalsParams};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub fn use_nodes<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>) -> Derived<Vec<Node<ND>>> {
    use_store(store, |s| s.nodes.clone())
}

pub fn use_edges<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>) -> Derived<Vec<Edge<ED>>> {
    use_store(store, |s| s.edges.clone())
}

pub fn use_viewport<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>) -> Derived<Viewport> {
    use_store(store, |s| s.viewport)
}

/// The connection in progress, with its end point in flow coordinates.
pub fn use_connection<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>) -> Derived<ConnectionState> {
    use_store(store, |s| match &s.connection {
        ConnectionState::InProgress(connection) => {
            let mut connection = connection.clone();
            connection.to = point_to_renderer_point(connection.to, s.viewport, false, s.snap_grid);
            ConnectionState::InProgress(connection)
        }
        ConnectionState::Idle => ConnectionState::Idle,
    })
}

/// True once there is at least one node and every (visible) node has been
/// measured with its handles.
pub fn use_nodes_initialized<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    include_hidden: bool,
) -> Derived<bool> {
    use_store(store, move |s| {
        !s.node_lookup.is_empty()
            && s.node_lookup
                .values()
                .filter(|n| include_hidden || !n.hidden)
                .all(|n| n.is_measured() && n.internals.handle_bounds.is_some())
    })
}

/// Id, kind and payload of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeData<D = Value> {
    pub id: String,
    pub kind: Option<String>,
    pub data: D,
}

/// Payloads of the given nodes, in node order. Unknown ids are skipped.
pub fn use_nodes_data<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    ids: Vec<String>,
) -> Derived<Vec<NodeData<ND>>> {
    use_store(store, move |s| {
        s.nodes
            .iter()
            .filter(|n| ids.contains(&n.id))
            .map(|n| NodeData {
                id: n.id.clone(),
                kind: n.kind.clone(),
                data: n.data.clone(),
            })
            .collect()
    })
}

pub fn use_internal_node<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    id: impl Into<String>,
) -> Derived<Option<InternalNode<ND>>> {
    let id = id.into();
    use_store(store, move |s| s.node_lookup.get(&id).cloned())
}

// ============================================================================
// Connections
// ============================================================================

/// The node a renderer is currently drawing. Hooks that need a node id fall
/// back to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeScope {
    id: String,
}

impl NodeScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Live list of the connections under one lookup key.
pub struct Connections {
    inner: Derived<Vec<HandleConnection>>,
}

impl Connections {
    fn new<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>, key: ConnectionKey) -> Self {
        Self {
            inner: use_store(store, move |s| {
                s.connection_lookup
                    .get(&key)
                    .map(|connections| connections.values().cloned().collect())
                    .unwrap_or_default()
            }),
        }
    }

    pub fn get(&self) -> Vec<HandleConnection> {
        self.inner.get()
    }

    pub fn watch(&self, watcher: impl Fn(&Vec<HandleConnection>) + 'static) -> ListenerGuard {
        self.inner.watch(watcher)
    }

    /// Called with the connections that appeared since the last change.
    pub fn on_connect(&self, handler: impl Fn(&[HandleConnection]) + 'static) -> ListenerGuard {
        self.on_difference(handler, |next, prev| missing_from(next, prev))
    }

    /// Called with the connections that went away since the last change.
    pub fn on_disconnect(&self, handler: impl Fn(&[HandleConnection]) + 'static) -> ListenerGuard {
        self.on_difference(handler, |next, prev| missing_from(prev, next))
    }

    fn on_difference(
        &self,
        handler: impl Fn(&[HandleConnection]) + 'static,
        diff: fn(&[HandleConnection], &[HandleConnection]) -> Vec<HandleConnection>,
    ) -> ListenerGuard {
        let previous = RefCell::new(self.get());
        self.inner.watch(move |next| {
            let changed = diff(next, &previous.borrow());
            *previous.borrow_mut() = next.clone();
            if !changed.is_empty() {
                handler(&changed);
            }
        })
    }
}

/// Entries of `a` whose edge id is not in `b`.
fn missing_from(a: &[HandleConnection], b: &[HandleConnection]) -> Vec<HandleConnection> {
    a.iter()
        .filter(|c| !b.iter().any(|other| other.edge_id == c.edge_id))
        .cloned()
        .collect()
}

/// Which connections of a node to follow.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeConnectionsOptions {
    /// Explicit node id; falls back to the [`NodeScope`].
    pub id: Option<String>,
    pub handle_type: Option<HandleType>,
    /// Only used together with `handle_type`.
    pub handle_id: Option<String>,
}

/// Connections of a node. Fails with [`FlowError::MissingNodeId`] when
/// neither an id nor a scope is given.
pub fn use_node_connections<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    scope: Option<&NodeScope>,
    options: NodeConnectionsOptions,
) -> Result<Connections, FlowError> {
    let node_id = options
        .id
        .or_else(|| scope.map(|s| s.id.clone()))
        .ok_or(FlowError::MissingNodeId)?;
    let key = match (options.handle_type, options.handle_id) {
        (None, _) => ConnectionKey::node(node_id),
        (Some(handle_type), None) => ConnectionKey::side(node_id, handle_type),
        (Some(handle_type), Some(handle_id)) => ConnectionKey::handle(node_id, handle_type, handle_id),
    };
    Ok(Connections::new(store, key))
}

/// Connections of one handle.
pub fn use_handle_connections<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    node_id: &str,
    handle_type: HandleType,
    handle_id: Option<&str>,
) -> Connections {
    Connections::new(store, ConnectionKey::for_handle(node_id, handle_type, handle_id))
}

// ============================================================================
// Visibility
// ============================================================================

/// Ids of the nodes to render: all of them, or with `only_visible` those
/// inside the pane.
pub fn use_visible_node_ids<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    only_visible: bool,
) -> Derived<Vec<String>> {
    use_store(store, move |s| {
        if !only_visible {
            return s.node_lookup.keys().cloned().collect();
        }
        get_nodes_inside(
            s.node_lookup.values(),
            Rect::new(0.0, 0.0, s.width, s.height),
            s.viewport,
            true,
            false,
        )
        .into_iter()
        .map(|n| n.id.clone())
        .collect()
    })
}

/// Ids of the edges to render. With `only_visible` an edge is kept when
/// both endpoints exist and its bounding box overlaps the pane.
pub fn use_visible_edge_ids<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    only_visible: bool,
) -> Derived<Vec<String>> {
    use_store(store, move |s| {
        if !only_visible {
            return s.edges.iter().map(|e| e.id.clone()).collect();
        }
        if s.width <= 0.0 || s.height <= 0.0 {
            return Vec::new();
        }
        s.edges
            .iter()
            .filter(|edge| {
                match (s.node_lookup.get(&edge.source), s.node_lookup.get(&edge.target)) {
                    (Some(source), Some(target)) => is_edge_visible(source, target, s.width, s.height, s.viewport),
                    _ => false,
                }
            })
            .map(|e| e.id.clone())
            .collect()
    })
}

// ============================================================================
// Registrations
// ============================================================================

pub fn use_on_selection_change<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    handler: impl Fn(&SelectionChange<ND, ED>) + 'static,
) -> ListenerGuard {
    store.events().selection_change.add(handler)
}

/// Optional viewport gesture callbacks.
#[derive(Default)]
pub struct ViewportChangeHandlers {
    pub on_start: Option<Box<dyn Fn(&Viewport)>>,
    pub on_change: Option<Box<dyn Fn(&Viewport)>>,
    pub on_end: Option<Box<dyn Fn(&Viewport)>>,
}

/// Register the given viewport callbacks; the guards unregister them.
pub fn use_on_viewport_change<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    handlers: ViewportChangeHandlers,
) -> Vec<ListenerGuard> {
    let events = store.events();
    let mut guards = Vec::new();
    if let Some(f) = handlers.on_start {
        guards.push(events.viewport_change_start.add(move |v| f(v)));
    }
    if let Some(f) = handlers.on_change {
        guards.push(events.viewport_change.add(move |v| f(v)));
    }
    if let Some(f) = handlers.on_end {
        guards.push(events.viewport_change_end.add(move |v| f(v)));
    }
    guards
}

/// Run `handler` once the viewport is initialized; immediately when it
/// already is.
pub fn use_on_init_handler<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    handler: impl Fn(&FlowStore<ND, ED>) + 'static,
) -> ListenerGuard {
    if store.read(|s| s.viewport_initialized) {
        handler(store);
        return ListenerGuard::new(|| {});
    }
    store.events().init.add(handler)
}

/// A callback that re-measures the given nodes.
pub fn use_update_node_internals<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
) -> impl Fn(&[String]) + Clone {
    let store = store.clone();
    move |ids| store.update_node_internals(ids, UpdateNodeInternalsParams::default())
}

// ============================================================================
// Resize
// ============================================================================

/// Optional resize callbacks, called with the new pane size.
#[derive(Default)]
pub struct ResizeHandlers {
    pub on_resize_start: Option<Box<dyn Fn(f32, f32)>>,
    pub on_resize: Option<Box<dyn Fn(f32, f32)>>,
    pub on_resize_end: Option<Box<dyn Fn(f32, f32)>>,
}

/// Pane resize bookkeeping. Dropping it stops listening.
pub struct ResizeHandler {
    resizing: Rc<Cell<bool>>,
    _guard: ListenerGuard,
}

impl ResizeHandler {
    pub fn is_resizing(&self) -> bool {
        self.resizing.get()
    }
}

/// Follow window resizes: the store's dimensions are updated and the
/// start, resize and end callbacks run in that order.
pub fn use_resize_handler<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    events: &InputEvents,
    handlers: ResizeHandlers,
) -> ResizeHandler {
    let resizing = Rc::new(Cell::new(false));
    let guard = {
        let store = store.clone();
        let resizing = resizing.clone();
        events.window.add(move |event| {
            let WindowEvent::Resized { width, height } = *event else {
                return;
            };
            resizing.set(true);
            if let Some(f) = &handlers.on_resize_start {
                f(width, height);
            }
            store.set_dimensions(width, height);
            if let Some(f) = &handlers.on_resize {
                f(width, height);
            }
            resizing.set(false);
            if let Some(f) = &handlers.on_resize_end {
                f(width, height);
            }
        })
    };
    ResizeHandler {
        resizing,
        _guard: guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowOptions;
    use crate::connections::ConnectionInProgress;
    use crate::geometry::XYPosition;
    use crate::nodes::{HandleElement, Position};

    fn store() -> FlowStore<(), ()> {
        FlowStore::new(
            FlowOptions::new()
                .with_default_nodes(vec![
                    Node::new("a", XYPosition::new(0.0, 0.0), ()).with_measured(10.0, 10.0),
                    Node::new("b", XYPosition::new(500.0, 500.0), ()).with_measured(10.0, 10.0),
                ])
                .with_default_edges(vec![Edge::new("e", "a", "b")])
                .with_size(100.0, 100.0),
        )
    }

    // ========================================================================
    // Read handles
    // ========================================================================

    #[test]
    fn test_use_nodes_data_filters_ids() {
        let store = store();
        let data = use_nodes_data(&store, vec!["b".to_string(), "zzz".to_string()]);
        assert_eq!(data.get().len(), 1);
        assert_eq!(data.get()[0].id, "b");
    }

    #[test]
    fn test_use_connection_converts_to_flow() {
        let store = store();
        store.set_state(|s| s.viewport = Viewport::new(10.0, 20.0, 2.0));
        let connection = use_connection(&store);
        assert_eq!(connection.get(), ConnectionState::Idle);

        store.update_connection(ConnectionInProgress {
            from_node: "a".into(),
            from_handle: HandleElement {
                id: None,
                node_id: "a".into(),
                handle_type: HandleType::Source,
                position: Position::Right,
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 0.0,
            },
            from: XYPosition::default(),
            to: XYPosition::new(30.0, 40.0),
            to_handle: None,
            to_node: None,
            is_valid: None,
            pointer: XYPosition::new(30.0, 40.0),
        });
        let state = connection.get();
        assert_eq!(state.in_progress().unwrap().to, XYPosition::new(10.0, 10.0));
    }

    #[test]
    fn test_nodes_initialized_needs_handles() {
        let store = store();
        let initialized = use_nodes_initialized(&store, false);
        assert!(!initialized.get());
    }

    // ========================================================================
    // Connections
    // ========================================================================

    #[test]
    fn test_node_connections_need_an_id() {
        let store = store();
        let result = use_node_connections(&store, None, NodeConnectionsOptions::default());
        assert!(matches!(result, Err(FlowError::MissingNodeId)));

        let scope = NodeScope::new("a");
        let connections = use_node_connections(&store, Some(&scope), NodeConnectionsOptions::default()).unwrap();
        assert_eq!(connections.get().len(), 1);
    }

    #[test]
    fn test_on_connect_and_disconnect() {
        let store = store();
        let connections = use_handle_connections(&store, "b", HandleType::Target, None);
        let added = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let _g1 = {
            let added = added.clone();
            connections.on_connect(move |c| added.borrow_mut().extend(c.iter().map(|c| c.edge_id.clone())))
        };
        let _g2 = {
            let removed = removed.clone();
            connections.on_disconnect(move |c| removed.borrow_mut().extend(c.iter().map(|c| c.edge_id.clone())))
        };

        store.set_edges(vec![Edge::new("f", "a", "b")]);
        assert_eq!(*added.borrow(), vec!["f"]);
        assert_eq!(*removed.borrow(), vec!["e"]);
    }

    // ========================================================================
    // Visibility
    // ========================================================================

    #[test]
    fn test_visible_node_ids() {
        let store = store();
        // Nodes without handle bounds are always rendered once
        assert_eq!(use_visible_node_ids(&store, true).get(), vec!["a", "b"]);
        store.set_state(|s| {
            for node in s.node_lookup.values_mut() {
                node.internals.handle_bounds = Some(Default::default());
            }
        });
        assert_eq!(use_visible_node_ids(&store, false).get(), vec!["a", "b"]);
        assert_eq!(use_visible_node_ids(&store, true).get(), vec!["a"]);
    }

    #[test]
    fn test_visible_edge_ids() {
        let store = store();
        assert_eq!(use_visible_edge_ids(&store, false).get(), vec!["e"]);
        // The edge's box spans from a to b and crosses the pane
        assert_eq!(use_visible_edge_ids(&store, true).get(), vec!["e"]);

        store.set_state(|s| s.viewport = Viewport::new(-2000.0, -2000.0, 1.0));
        assert!(use_visible_edge_ids(&store, true).get().is_empty());
    }

    // ========================================================================
    // Registrations
    // ========================================================================

    #[test]
    fn test_viewport_change_guards_unregister() {
        let store = store();
        let guards = use_on_viewport_change(
            &store,
            ViewportChangeHandlers {
                on_change: Some(Box::new(|_| {})),
                ..Default::default()
            },
        );
        assert_eq!(guards.len(), 1);
        assert_eq!(store.events().viewport_change.len(), 1);
        drop(guards);
        assert!(store.events().viewport_change.is_empty());
    }

    #[test]
    fn test_resize_handler_sets_dimensions() {
        let store = store();
        let events = InputEvents::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let handlers = {
            let start = calls.clone();
            let end = calls.clone();
            ResizeHandlers {
                on_resize_start: Some(Box::new(move |_, _| start.borrow_mut().push("start"))),
                on_resize: None,
                on_resize_end: Some(Box::new(move |_, _| end.borrow_mut().push("end"))),
            }
        };
        let resize = use_resize_handler(&store, &events, handlers);

        events.window.emit(&WindowEvent::Resized {
            width: 640.0,
            height: 480.0,
        });
        assert_eq!(store.read(|s| (s.width, s.height)), (640.0, 480.0));
        assert_eq!(*calls.borrow(), vec!["start", "end"]);
        assert!(!resize.is_resizing());
    }
}
