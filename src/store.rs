//! The canonical flow store.
//!
//! [`FlowStore`] owns the collections, the derived lookups, the viewport and
//! the interaction flags. It is a cheap `Rc` handle: every composable holds a
//! clone and reads through it, and all mutation goes through the named
//! actions below.
//!
//! No borrow of the state is held while listeners run, so a listener may
//! call back into the store.

use crate::changes::{apply_edge_changes, apply_node_changes, EdgeChange, NodeChange};
use crate::config::{FlowExport, FlowOptions};
use crate::connections::{ConnectionInProgress, ConnectionState};
use crate::drag::NodeDragItem;
use crate::edges::{Connection, Edge};
use crate::errors::{default_error_handler, ErrorHandler, FlowError};
use crate::events::{ListenerGuard, Listeners};
use crate::geometry::{get_viewport_for_bounds, CoordinateExtent, Rect, Viewport, XYPosition};
use crate::lookup::{
    handle_expand_parent, update_absolute_positions, update_node_internals, NodeUpdate, ParentExpandChild,
};
use crate::nodes::{get_internal_nodes_bounds, ElementData, HandleType, Node};
use crate::selection::{create_selection_change, get_selection_changes, SelectionChange, SelectionSnapshot};
use crate::state::{FitViewState, FlowState};
use crate::tracking::Surface;
use crate::viewport::{get_fit_view_nodes, FitViewOptions, PanZoom, ZOOM_STEP};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Keeps a store subscription alive; dropping it unsubscribes.
pub type Subscription = ListenerGuard;

pub type IsValidConnection = Rc<dyn Fn(&Connection) -> bool>;

pub type BeforeDeleteHandler<ND, ED> = Rc<dyn Fn(&DeletedElements<ND, ED>) -> BeforeDelete<ND, ED>>;

#[derive(Clone, Debug, PartialEq)]
pub struct DeletedElements<ND = Value, ED = Value> {
    pub nodes: Vec<Node<ND>>,
    pub edges: Vec<Edge<ED>>,
}

impl<ND, ED> Default for DeletedElements<ND, ED> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

impl<ND, ED> DeletedElements<ND, ED> {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Answer of an `on_before_delete` handler.
#[derive(Clone, Debug, PartialEq)]
pub enum BeforeDelete<ND = Value, ED = Value> {
    Proceed,
    Cancel,
    /// Delete these elements instead.
    Replace(DeletedElements<ND, ED>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectStart {
    pub node_id: String,
    pub handle_id: Option<String>,
    pub handle_type: HandleType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeDragEvent<ND = Value> {
    /// The node under the pointer.
    pub node: Node<ND>,
    /// Every node moved by this drag.
    pub nodes: Vec<Node<ND>>,
}

/// Outgoing events of a flow.
pub struct FlowEvents<ND = Value, ED = Value> {
    pub nodes_change: Listeners<Vec<NodeChange<ND>>>,
    pub edges_change: Listeners<Vec<EdgeChange<ED>>>,
    pub connect: Listeners<Connection>,
    pub connect_start: Listeners<ConnectStart>,
    /// `Some` when the connection ended on a valid handle.
    pub connect_end: Listeners<Option<Connection>>,
    pub nodes_delete: Listeners<Vec<Node<ND>>>,
    pub edges_delete: Listeners<Vec<Edge<ED>>>,
    pub delete: Listeners<DeletedElements<ND, ED>>,
    pub selection_change: Listeners<SelectionChange<ND, ED>>,
    pub viewport_change_start: Listeners<Viewport>,
    pub viewport_change: Listeners<Viewport>,
    pub viewport_change_end: Listeners<Viewport>,
    pub init: Listeners<FlowStore<ND, ED>>,
    pub node_drag_start: Listeners<NodeDragEvent<ND>>,
    pub node_drag: Listeners<NodeDragEvent<ND>>,
    pub node_drag_stop: Listeners<NodeDragEvent<ND>>,
}

impl<ND, ED> Default for FlowEvents<ND, ED> {
    fn default() -> Self {
        Self {
            nodes_change: Listeners::new(),
            edges_change: Listeners::new(),
            connect: Listeners::new(),
            connect_start: Listeners::new(),
            connect_end: Listeners::new(),
            nodes_delete: Listeners::new(),
            edges_delete: Listeners::new(),
            delete: Listeners::new(),
            selection_change: Listeners::new(),
            viewport_change_start: Listeners::new(),
            viewport_change: Listeners::new(),
            viewport_change_end: Listeners::new(),
            init: Listeners::new(),
            node_drag_start: Listeners::new(),
            node_drag: Listeners::new(),
            node_drag_stop: Listeners::new(),
        }
    }
}

impl<ND, ED> FlowEvents<ND, ED> {
    fn clear(&self) {
        self.nodes_change.clear();
        self.edges_change.clear();
        self.connect.clear();
        self.connect_start.clear();
        self.connect_end.clear();
        self.nodes_delete.clear();
        self.edges_delete.clear();
        self.delete.clear();
        self.selection_change.clear();
        self.viewport_change_start.clear();
        self.viewport_change.clear();
        self.viewport_change_end.clear();
        self.init.clear();
        self.node_drag_start.clear();
        self.node_drag.clear();
        self.node_drag_stop.clear();
    }
}

/// Parameters of [`FlowStore::update_node_internals`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateNodeInternalsParams {
    /// Run the pending fit-view-on-init once the nodes are measured.
    pub trigger_fit_view: bool,
    /// Update even when the size did not change.
    pub force: bool,
}

impl Default for UpdateNodeInternalsParams {
    fn default() -> Self {
        Self {
            trigger_fit_view: true,
            force: false,
        }
    }
}

struct StoreInner<ND, ED> {
    state: RefCell<FlowState<ND, ED>>,
    pan_zoom: RefCell<Option<Box<dyn PanZoom>>>,
    surface: RefCell<Option<Rc<dyn Surface>>>,
    events: FlowEvents<ND, ED>,
    subscribers: Listeners<()>,
    selection: RefCell<SelectionSnapshot>,
    on_error: RefCell<ErrorHandler>,
    on_before_delete: RefCell<Option<BeforeDeleteHandler<ND, ED>>>,
    is_valid_connection: RefCell<Option<IsValidConnection>>,
}

pub struct FlowStore<ND = Value, ED = Value> {
    inner: Rc<StoreInner<ND, ED>>,
}

impl<ND, ED> Clone for FlowStore<ND, ED> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<ND: ElementData, ED: ElementData> Default for FlowStore<ND, ED> {
    fn default() -> Self {
        Self::new(FlowOptions::default())
    }
}

impl<ND: ElementData, ED: ElementData> FlowStore<ND, ED> {
    pub fn new(options: FlowOptions<ND, ED>) -> Self {
        let mut errors = Vec::new();
        let state = FlowState::from_options(&options, &mut |err| errors.push(err));
        let selection = SelectionSnapshot::capture(state.node_lookup.values(), state.edge_lookup.values());
        let store = Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(state),
                pan_zoom: RefCell::new(None),
                surface: RefCell::new(None),
                events: FlowEvents::default(),
                subscribers: Listeners::new(),
                selection: RefCell::new(selection),
                on_error: RefCell::new(default_error_handler()),
                on_before_delete: RefCell::new(None),
                is_valid_connection: RefCell::new(None),
            }),
        };
        store.report_errors(errors);
        store
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // State interface
    // ========================================================================

    /// Snapshot of the whole state.
    pub fn get_state(&self) -> FlowState<ND, ED> {
        self.inner.state.borrow().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&FlowState<ND, ED>) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Mutate the state directly and notify subscribers.
    pub fn set_state(&self, f: impl FnOnce(&mut FlowState<ND, ED>)) {
        f(&mut self.inner.state.borrow_mut());
        self.notify();
    }

    /// Call `listener` after every state change.
    pub fn subscribe(&self, listener: impl Fn(&FlowStore<ND, ED>) + 'static) -> Subscription {
        let weak = Rc::downgrade(&self.inner);
        self.inner.subscribers.add(move |_| {
            if let Some(inner) = weak.upgrade() {
                listener(&FlowStore { inner });
            }
        })
    }

    pub fn events(&self) -> &FlowEvents<ND, ED> {
        &self.inner.events
    }

    /// Tell subscribers the state changed, then report a selection change
    /// if the set of selected elements differs from the last report.
    pub fn notify(&self) {
        self.inner.subscribers.emit(&());

        let snapshot = self.read(|s| SelectionSnapshot::capture(s.node_lookup.values(), s.edge_lookup.values()));
        let previous = std::mem::replace(&mut *self.inner.selection.borrow_mut(), snapshot.clone());
        if previous == snapshot {
            return;
        }
        let change = self.read(|s| SelectionChange {
            nodes: snapshot
                .nodes
                .iter()
                .filter_map(|id| s.node_lookup.get(id).map(|n| n.node.clone()))
                .collect(),
            edges: snapshot
                .edges
                .iter()
                .filter_map(|id| s.edge_lookup.get(id).cloned())
                .collect(),
        });
        self.inner.events.selection_change.emit(&change);
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    pub fn set_on_error(&self, handler: ErrorHandler) {
        *self.inner.on_error.borrow_mut() = handler;
    }

    pub fn report_error(&self, error: &FlowError) {
        let handler = self.inner.on_error.borrow().clone();
        handler(error.code(), error);
    }

    fn report_errors(&self, errors: Vec<FlowError>) {
        for error in &errors {
            self.report_error(error);
        }
    }

    pub fn set_on_before_delete(&self, handler: Option<BeforeDeleteHandler<ND, ED>>) {
        *self.inner.on_before_delete.borrow_mut() = handler;
    }

    pub fn before_delete(&self, elements: &DeletedElements<ND, ED>) -> BeforeDelete<ND, ED> {
        let handler = self.inner.on_before_delete.borrow().clone();
        match handler {
            Some(handler) => handler(elements),
            None => BeforeDelete::Proceed,
        }
    }

    pub fn set_is_valid_connection(&self, validator: Option<IsValidConnection>) {
        *self.inner.is_valid_connection.borrow_mut() = validator;
    }

    pub fn is_valid_connection(&self) -> Option<IsValidConnection> {
        self.inner.is_valid_connection.borrow().clone()
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Replace the nodes. Unchanged nodes keep their internal node.
    pub fn set_nodes(&self, nodes: Vec<Node<ND>>) {
        let mut errors = Vec::new();
        self.inner
            .state
            .borrow_mut()
            .set_nodes(nodes, &mut |err| errors.push(err));
        self.report_errors(errors);
        self.notify();
    }

    pub fn set_edges(&self, edges: Vec<Edge<ED>>) {
        self.inner.state.borrow_mut().set_edges(edges);
        self.notify();
    }

    /// Let the store own the given collections from now on.
    pub fn set_default_nodes_and_edges(&self, nodes: Option<Vec<Node<ND>>>, edges: Option<Vec<Edge<ED>>>) {
        let mut errors = Vec::new();
        {
            let mut state = self.inner.state.borrow_mut();
            if let Some(nodes) = nodes {
                state.has_default_nodes = true;
                state.set_nodes(nodes, &mut |err| errors.push(err));
            }
            if let Some(edges) = edges {
                state.has_default_edges = true;
                state.set_edges(edges);
            }
        }
        self.report_errors(errors);
        self.notify();
    }

    /// Emit node changes. A self-managed store applies them first.
    pub fn trigger_node_changes(&self, changes: Vec<NodeChange<ND>>) {
        if changes.is_empty() {
            return;
        }
        let (debug, has_default_nodes) = self.read(|s| (s.debug, s.has_default_nodes));
        if debug {
            tracing::debug!(count = changes.len(), ?changes, "flow: node changes");
        }
        if has_default_nodes {
            let mut errors = Vec::new();
            {
                let mut state = self.inner.state.borrow_mut();
                let nodes = std::mem::take(&mut state.nodes);
                let next = apply_node_changes(&changes, nodes);
                state.set_nodes(next, &mut |err| errors.push(err));
            }
            self.report_errors(errors);
        }
        self.inner.events.nodes_change.emit(&changes);
        self.notify();
    }

    /// Emit edge changes. A self-managed store applies them first.
    pub fn trigger_edge_changes(&self, changes: Vec<EdgeChange<ED>>) {
        if changes.is_empty() {
            return;
        }
        let (debug, has_default_edges) = self.read(|s| (s.debug, s.has_default_edges));
        if debug {
            tracing::debug!(count = changes.len(), ?changes, "flow: edge changes");
        }
        if has_default_edges {
            let mut state = self.inner.state.borrow_mut();
            let edges = std::mem::take(&mut state.edges);
            let next = apply_edge_changes(&changes, edges);
            state.set_edges(next);
        }
        self.inner.events.edges_change.emit(&changes);
        self.notify();
    }

    // ========================================================================
    // Measurement and positions
    // ========================================================================

    /// Measure `ids` on the attached surface and store the results.
    ///
    /// Without a surface or ids nothing happens. Runs the pending
    /// fit-view-on-init once measurements exist.
    pub fn update_node_internals(&self, ids: &[String], params: UpdateNodeInternalsParams) {
        let Some(surface) = self.inner.surface.borrow().clone() else {
            return;
        };
        if ids.is_empty() {
            return;
        }
        let updates: Vec<NodeUpdate> = ids
            .iter()
            .map(|id| NodeUpdate {
                id: id.clone(),
                measurement: surface.measure_node(id),
                force: params.force,
            })
            .collect();

        let (changes, updated) = {
            let mut state = self.inner.state.borrow_mut();
            let state = &mut *state;
            let (changes, updated) = update_node_internals(
                &updates,
                &mut state.node_lookup,
                &mut state.parent_lookup,
                state.node_origin,
                state.node_extent,
            );
            if updated {
                update_absolute_positions(
                    &mut state.node_lookup,
                    &mut state.parent_lookup,
                    state.node_origin,
                    state.node_extent,
                    state.elevate_nodes_on_select,
                );
                state.nodes_initialized = state.all_nodes_measured();
            }
            (changes, updated)
        };
        if !updated {
            return;
        }

        if params.trigger_fit_view {
            let pending = self.read(|s| {
                (s.fit_view_on_init && s.fit_view_state == FitViewState::NotDone)
                    .then(|| s.fit_view_options.clone())
            });
            if let Some(options) = pending {
                if self.fit_view_sync(&options) {
                    self.inner.state.borrow_mut().fit_view_state = FitViewState::Done;
                    tracing::trace!("flow: fit view on init done");
                }
            }
        }

        if changes.is_empty() {
            self.notify();
        } else {
            self.trigger_node_changes(changes);
        }
    }

    /// Move dragged nodes. Children that expand their parent stay at
    /// non-negative positions and grow the parent in the same change batch.
    pub fn update_node_positions(&self, items: &[NodeDragItem], dragging: bool) {
        let changes = {
            let mut state = self.inner.state.borrow_mut();
            let state = &mut *state;
            let mut changes: Vec<NodeChange<ND>> = Vec::with_capacity(items.len());
            let mut expand_children = Vec::new();

            for item in items {
                let node = state.node_lookup.get_mut(&item.id);
                let parent_id = node.as_ref().and_then(|n| n.parent_id.clone());
                let expand_parent = node.as_ref().map_or(false, |n| n.expand_parent) && parent_id.is_some();
                let position = if expand_parent {
                    XYPosition::new(item.position.x.max(0.0), item.position.y.max(0.0))
                } else {
                    item.position
                };
                if let Some(node) = node {
                    node.node.position = position;
                    node.node.dragging = dragging;
                    node.internals.position_absolute = item.position_absolute;
                }
                if let (true, Some(parent_id)) = (expand_parent, parent_id) {
                    expand_children.push(ParentExpandChild {
                        id: item.id.clone(),
                        parent_id,
                        rect: Rect::from_position(item.position_absolute, item.measured),
                    });
                }
                changes.push(NodeChange::Position {
                    id: item.id.clone(),
                    position: Some(position),
                    dragging: Some(dragging),
                });
            }

            if !expand_children.is_empty() {
                changes.extend(handle_expand_parent(
                    &expand_children,
                    &state.node_lookup,
                    &state.parent_lookup,
                    state.node_origin,
                ));
            }
            update_absolute_positions(
                &mut state.node_lookup,
                &mut state.parent_lookup,
                state.node_origin,
                state.node_extent,
                state.elevate_nodes_on_select,
            );
            changes
        };
        self.trigger_node_changes(changes);
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select `ids`. Without multi selection everything else is deselected.
    pub fn add_selected_nodes(&self, ids: &[String]) {
        if self.read(|s| s.multi_selection_active) {
            let changes: Vec<NodeChange<ND>> = self.read(|s| {
                ids.iter()
                    .filter(|id| s.node_lookup.get(id.as_str()).map_or(false, |n| !n.selected))
                    .map(|id| create_selection_change(id.clone(), true))
                    .collect()
            });
            self.trigger_node_changes(changes);
            return;
        }
        let selected: HashSet<String> = ids.iter().cloned().collect();
        let (node_changes, edge_changes) = {
            let mut state = self.inner.state.borrow_mut();
            (
                get_selection_changes(&mut state.node_lookup, &selected, true),
                get_selection_changes(&mut state.edge_lookup, &HashSet::new(), false),
            )
        };
        self.trigger_node_changes(node_changes);
        self.trigger_edge_changes(edge_changes);
    }

    pub fn add_selected_edges(&self, ids: &[String]) {
        if self.read(|s| s.multi_selection_active) {
            let changes: Vec<EdgeChange<ED>> = self.read(|s| {
                ids.iter()
                    .filter(|id| s.edge_lookup.get(id.as_str()).map_or(false, |e| !e.selected))
                    .map(|id| create_selection_change(id.clone(), true))
                    .collect()
            });
            self.trigger_edge_changes(changes);
            return;
        }
        let selected: HashSet<String> = ids.iter().cloned().collect();
        let (edge_changes, node_changes) = {
            let mut state = self.inner.state.borrow_mut();
            (
                get_selection_changes(&mut state.edge_lookup, &selected, false),
                get_selection_changes(&mut state.node_lookup, &HashSet::new(), true),
            )
        };
        self.trigger_edge_changes(edge_changes);
        self.trigger_node_changes(node_changes);
    }

    /// Deselect the given elements, or all of them when `None`.
    pub fn unselect_nodes_and_edges(&self, nodes: Option<&[String]>, edges: Option<&[String]>) {
        let (node_changes, edge_changes) = {
            let mut state = self.inner.state.borrow_mut();
            let node_ids: Vec<String> = match nodes {
                Some(ids) => ids.to_vec(),
                None => state.nodes.iter().map(|n| n.id.clone()).collect(),
            };
            let edge_ids: Vec<String> = match edges {
                Some(ids) => ids.to_vec(),
                None => state.edges.iter().map(|e| e.id.clone()).collect(),
            };
            let node_changes: Vec<NodeChange<ND>> = node_ids
                .into_iter()
                .map(|id| {
                    if let Some(node) = state.node_lookup.get_mut(&id) {
                        node.node.selected = false;
                    }
                    create_selection_change(id, false)
                })
                .collect();
            let edge_changes: Vec<EdgeChange<ED>> = edge_ids
                .into_iter()
                .map(|id| create_selection_change(id, false))
                .collect();
            (node_changes, edge_changes)
        };
        self.trigger_node_changes(node_changes);
        self.trigger_edge_changes(edge_changes);
    }

    /// Deselect whatever is currently selected.
    pub fn reset_selected_elements(&self) {
        let (node_changes, edge_changes) = self.read(|s| {
            let nodes: Vec<NodeChange<ND>> = s
                .node_lookup
                .values()
                .filter(|n| n.selected)
                .map(|n| create_selection_change(n.id.clone(), false))
                .collect();
            let edges: Vec<EdgeChange<ED>> = s
                .edge_lookup
                .values()
                .filter(|e| e.selected)
                .map(|e| create_selection_change(e.id.clone(), false))
                .collect();
            (nodes, edges)
        });
        self.trigger_node_changes(node_changes);
        self.trigger_edge_changes(edge_changes);
    }

    pub fn set_multi_selection_active(&self, active: bool) {
        if self.read(|s| s.multi_selection_active) != active {
            self.set_state(|s| s.multi_selection_active = active);
        }
    }

    // ========================================================================
    // Viewport
    // ========================================================================

    fn with_pan_zoom<R>(&self, f: impl FnOnce(&mut dyn PanZoom) -> R) -> Option<R> {
        let mut pan_zoom = self.inner.pan_zoom.borrow_mut();
        match pan_zoom.as_mut() {
            Some(pan_zoom) => Some(f(pan_zoom.as_mut())),
            None => None,
        }
    }

    pub fn has_pan_zoom(&self) -> bool {
        self.inner.pan_zoom.borrow().is_some()
    }

    /// Store a viewport the pan/zoom already reached; emits the viewport
    /// events when it differs from the current one.
    fn publish_viewport(&self, next: Viewport) -> bool {
        if self.read(|s| s.viewport == next) {
            return false;
        }
        self.inner.events.viewport_change_start.emit(&next);
        self.inner.state.borrow_mut().viewport = next;
        self.inner.events.viewport_change.emit(&next);
        self.notify();
        self.inner.events.viewport_change_end.emit(&next);
        true
    }

    /// Move to `viewport` (constrained). Returns whether it changed.
    pub fn set_viewport(&self, viewport: Viewport) -> bool {
        match self.with_pan_zoom(|pz| pz.set_viewport(viewport)) {
            Some(next) => self.publish_viewport(next),
            None => false,
        }
    }

    /// Pan by `delta` pixels. Returns whether the viewport moved.
    pub fn pan_by(&self, delta: XYPosition) -> bool {
        if delta.x == 0.0 && delta.y == 0.0 {
            return false;
        }
        let current = self.read(|s| s.viewport);
        let requested = Viewport::new(current.x + delta.x, current.y + delta.y, current.zoom);
        self.set_viewport(requested)
    }

    pub fn zoom_in(&self) -> bool {
        self.scale_by(ZOOM_STEP)
    }

    pub fn zoom_out(&self) -> bool {
        self.scale_by(1.0 / ZOOM_STEP)
    }

    pub fn zoom_to(&self, zoom: f32) -> bool {
        match self.with_pan_zoom(|pz| pz.scale_to(zoom)) {
            Some(next) => self.publish_viewport(next),
            None => false,
        }
    }

    pub fn scale_by(&self, factor: f32) -> bool {
        match self.with_pan_zoom(|pz| pz.scale_by(factor)) {
            Some(next) => self.publish_viewport(next),
            None => false,
        }
    }

    /// Frame the eligible nodes. Returns whether any node was eligible.
    pub fn fit_view_sync(&self, options: &FitViewOptions) -> bool {
        if !self.has_pan_zoom() {
            return false;
        }
        let target = self.read(|s| {
            let nodes = get_fit_view_nodes(&s.node_lookup, options);
            if nodes.is_empty() {
                return None;
            }
            let bounds = get_internal_nodes_bounds(nodes);
            Some(get_viewport_for_bounds(
                &bounds,
                s.width,
                s.height,
                options.min_zoom.unwrap_or(s.min_zoom),
                options.max_zoom.unwrap_or(s.max_zoom),
                options.padding,
            ))
        });
        match target {
            Some(viewport) => {
                self.set_viewport(viewport);
                true
            }
            None => false,
        }
    }

    /// Same as [`fit_view_sync`](Self::fit_view_sync); viewport transitions
    /// are never animated.
    pub fn fit_view(&self, options: &FitViewOptions) -> bool {
        self.fit_view_sync(options)
    }

    /// Reapply the extents to the pan/zoom and publish the result.
    fn reconstrain(&self) {
        let (min_zoom, max_zoom, extent, viewport) =
            self.read(|s| (s.min_zoom, s.max_zoom, s.translate_extent, s.viewport));
        let next = self.with_pan_zoom(|pz| {
            pz.set_scale_extent(min_zoom, max_zoom);
            pz.set_translate_extent(extent);
            pz.set_viewport(viewport)
        });
        if let Some(next) = next {
            self.publish_viewport(next);
        }
    }

    pub fn set_min_zoom(&self, min_zoom: f32) {
        self.inner.state.borrow_mut().min_zoom = min_zoom;
        self.reconstrain();
        self.notify();
    }

    pub fn set_max_zoom(&self, max_zoom: f32) {
        self.inner.state.borrow_mut().max_zoom = max_zoom;
        self.reconstrain();
        self.notify();
    }

    pub fn set_translate_extent(&self, extent: CoordinateExtent) {
        self.inner.state.borrow_mut().translate_extent = extent;
        self.reconstrain();
        self.notify();
    }

    /// Start of a user pan/zoom gesture.
    pub fn start_viewport_gesture(&self) {
        let viewport = self.read(|s| s.viewport);
        self.inner.state.borrow_mut().pane_dragging = true;
        self.inner.events.viewport_change_start.emit(&viewport);
    }

    /// One step of a user pan/zoom gesture. Returns whether it moved.
    pub fn update_viewport_gesture(&self, viewport: Viewport) -> bool {
        let Some(next) = self.with_pan_zoom(|pz| pz.set_viewport(viewport)) else {
            return false;
        };
        if self.read(|s| s.viewport == next) {
            return false;
        }
        self.inner.state.borrow_mut().viewport = next;
        self.inner.events.viewport_change.emit(&next);
        self.notify();
        true
    }

    pub fn end_viewport_gesture(&self) {
        let viewport = self.read(|s| s.viewport);
        self.inner.state.borrow_mut().pane_dragging = false;
        self.inner.events.viewport_change_end.emit(&viewport);
    }

    // ========================================================================
    // Mounting
    // ========================================================================

    /// Hand the store the pan/zoom of the mounted pane. The first attach
    /// emits `init`.
    pub fn attach_pan_zoom(&self, mut pan_zoom: Box<dyn PanZoom>) {
        let (min_zoom, max_zoom, extent, width, height, viewport, initialized) = self.read(|s| {
            (
                s.min_zoom,
                s.max_zoom,
                s.translate_extent,
                s.width,
                s.height,
                s.viewport,
                s.viewport_initialized,
            )
        });
        pan_zoom.set_scale_extent(min_zoom, max_zoom);
        pan_zoom.set_translate_extent(extent);
        pan_zoom.set_pane_size(width, height);
        let viewport = pan_zoom.set_viewport(viewport);
        *self.inner.pan_zoom.borrow_mut() = Some(pan_zoom);
        {
            let mut state = self.inner.state.borrow_mut();
            state.viewport = viewport;
            state.viewport_initialized = true;
        }
        self.notify();
        if !initialized {
            tracing::trace!("flow: viewport initialized");
            self.inner.events.init.emit(self);
        }
    }

    pub fn detach_pan_zoom(&self) {
        self.inner.pan_zoom.borrow_mut().take();
        self.inner.state.borrow_mut().viewport_initialized = false;
        self.notify();
    }

    pub fn attach_surface(&self, surface: Rc<dyn Surface>) {
        *self.inner.surface.borrow_mut() = Some(surface);
    }

    pub fn detach_surface(&self) {
        self.inner.surface.borrow_mut().take();
    }

    /// Pane rect in window coordinates; empty without a surface.
    pub fn surface_bounds(&self) -> Rect {
        self.inner
            .surface
            .borrow()
            .as_ref()
            .map(|surface| surface.bounds())
            .unwrap_or_default()
    }

    pub fn set_dimensions(&self, width: f32, height: f32) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.width = width;
            state.height = height;
        }
        self.with_pan_zoom(|pz| pz.set_pane_size(width, height));
        self.notify();
    }

    // ========================================================================
    // Connections
    // ========================================================================

    pub fn update_connection(&self, connection: ConnectionInProgress) {
        self.set_state(|s| s.connection = ConnectionState::InProgress(connection));
    }

    pub fn cancel_connection(&self) {
        self.set_state(|s| s.connection = ConnectionState::Idle);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Apply option changes to the live store.
    pub fn configure(&self, options: &FlowOptions<ND, ED>) {
        let mut errors = Vec::new();
        self.inner
            .state
            .borrow_mut()
            .apply_options(options, &mut |err| errors.push(err));
        self.report_errors(errors);
        let (width, height) = self.read(|s| (s.width, s.height));
        self.with_pan_zoom(|pz| pz.set_pane_size(width, height));
        self.reconstrain();
        self.notify();
    }

    /// Back to an empty default state. Handlers and listeners stay
    /// registered; the surface and pan/zoom are dropped.
    pub fn reset(&self) {
        *self.inner.state.borrow_mut() = FlowState::default();
        self.inner.pan_zoom.borrow_mut().take();
        self.inner.surface.borrow_mut().take();
        self.notify();
    }

    /// Reset and drop every listener.
    pub fn dispose(&self) {
        self.reset();
        self.inner.events.clear();
        self.inner.subscribers.clear();
    }

    pub fn to_object(&self) -> FlowExport<ND, ED> {
        self.read(|s| FlowExport {
            nodes: s.nodes.clone(),
            edges: s.edges.clone(),
            viewport: s.viewport,
        })
    }
}
