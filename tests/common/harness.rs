//! Test harness for a mounted flow.
//!
//! Provides a flow with two nodes and one edge, mounted through a
//! [`FlowController`] on a manual scheduler, with event tracking and helper
//! methods for simulating what a Slint window reports.

#![allow(dead_code)]

use super::CallbackTracker;
use serde_json::json;
use slint::platform::Key;
use slint::SharedString;
use slint_flow::{
    Edge, Flow, FlowController, FlowInstance, FlowOptions, InternalNode, ListenerGuard, ManualScheduler,
    Modifiers, Node, XYPosition,
};
use std::rc::Rc;

pub const NODE_WIDTH: f32 = 150.0;
pub const NODE_HEIGHT: f32 = 80.0;
pub const HANDLE_SIZE: f32 = 10.0;

/// Nodes "a" at (100, 100) and "b" at (400, 200).
pub fn default_nodes() -> Vec<Node> {
    vec![
        Node::new("a", XYPosition::new(100.0, 100.0), json!({ "label": "Node A" })),
        Node::new("b", XYPosition::new(400.0, 200.0), json!({ "label": "Node B" })),
    ]
}

/// Edge "a-b" from "a" to "b".
pub fn default_edges() -> Vec<Edge> {
    vec![Edge::new("a-b", "a", "b")]
}

/// Center of a node's source handle (right side) in flow coordinates.
pub fn source_handle_center(node_position: XYPosition) -> XYPosition {
    XYPosition::new(node_position.x + NODE_WIDTH, node_position.y + NODE_HEIGHT / 2.0)
}

/// Center of a node's target handle (left side) in flow coordinates.
pub fn target_handle_center(node_position: XYPosition) -> XYPosition {
    XYPosition::new(node_position.x, node_position.y + NODE_HEIGHT / 2.0)
}

fn key_text(key: Key) -> SharedString {
    char::from(key).to_string().into()
}

/// Test harness for a mounted flow.
pub struct FlowTestHarness {
    pub flow: Flow,
    pub ctrl: FlowController,
    pub scheduler: ManualScheduler,
    pub tracker: CallbackTracker,
    _guards: Vec<ListenerGuard>,
}

impl FlowTestHarness {
    /// A self-managed flow with the default nodes and edges, mounted and
    /// measured.
    pub fn new() -> Self {
        Self::with_options(
            FlowOptions::new()
                .with_default_nodes(default_nodes())
                .with_default_edges(default_edges()),
        )
    }

    /// A flow created from `options`, mounted and measured.
    pub fn with_options(options: FlowOptions) -> Self {
        let harness = Self::unmounted(options);
        harness.mount();
        harness.measure_all();
        harness
    }

    /// A flow created from `options`, with tracking but not yet mounted.
    pub fn unmounted(options: FlowOptions) -> Self {
        let scheduler = ManualScheduler::new();
        let flow = Flow::with_scheduler(options, Rc::new(scheduler.clone()));
        let ctrl = FlowController::new(&flow);
        let tracker = CallbackTracker::new();
        let guards = tracker.attach(flow.store());
        Self {
            flow,
            ctrl,
            scheduler,
            tracker,
            _guards: guards,
        }
    }

    /// Report an 800x600 pane and mount the controller.
    pub fn mount(&self) {
        self.ctrl.pane_geometry_callback()(0.0, 0.0, 800.0, 600.0);
        self.ctrl.mount();
    }

    pub fn instance(&self) -> FlowInstance {
        self.flow.instance()
    }

    /// Run the queued batch flushes.
    pub fn flush(&self) -> usize {
        self.scheduler.run_pending()
    }

    // ========================================================================
    // Measurement
    // ========================================================================

    /// Report a node's size and its two handles: a target handle on the
    /// left edge and a source handle on the right edge.
    pub fn measure_node(&self, id: &str) {
        self.ctrl.node_size_callback()(id.into(), NODE_WIDTH, NODE_HEIGHT);
        let report = self.ctrl.handle_callback();
        let y = NODE_HEIGHT / 2.0 - HANDLE_SIZE / 2.0;
        report(
            id.into(),
            "".into(),
            0,
            2,
            NODE_WIDTH - HANDLE_SIZE / 2.0,
            y,
            HANDLE_SIZE,
            HANDLE_SIZE,
        );
        report(id.into(), "".into(), 1, 0, -HANDLE_SIZE / 2.0, y, HANDLE_SIZE, HANDLE_SIZE);
    }

    pub fn measure_all(&self) {
        for id in self.node_ids() {
            self.measure_node(&id);
        }
    }

    // ========================================================================
    // State access
    // ========================================================================

    pub fn node_ids(&self) -> Vec<String> {
        self.flow.store().read(|s| s.nodes.iter().map(|n| n.id.clone()).collect())
    }

    pub fn edge_ids(&self) -> Vec<String> {
        self.flow.store().read(|s| s.edges.iter().map(|e| e.id.clone()).collect())
    }

    /// The node as it is in the store's node array.
    pub fn node(&self, id: &str) -> Node {
        self.flow
            .store()
            .read(|s| s.nodes.iter().find(|n| n.id == id).cloned())
            .unwrap_or_else(|| panic!("no node {id}"))
    }

    pub fn internal(&self, id: &str) -> InternalNode {
        self.flow
            .store()
            .read(|s| s.node_lookup.get(id).cloned())
            .unwrap_or_else(|| panic!("no internal node {id}"))
    }

    pub fn position(&self, id: &str) -> XYPosition {
        self.node(id).position
    }

    pub fn selected_node_ids(&self) -> Vec<String> {
        self.flow.store().read(|s| {
            s.nodes
                .iter()
                .filter(|n| n.selected)
                .map(|n| n.id.clone())
                .collect()
        })
    }

    pub fn selected_edge_ids(&self) -> Vec<String> {
        self.flow.store().read(|s| {
            s.edges
                .iter()
                .filter(|e| e.selected)
                .map(|e| e.id.clone())
                .collect()
        })
    }

    // ========================================================================
    // Pointer
    // ========================================================================

    pub fn press_node(&self, id: &str, x: f32, y: f32) {
        self.ctrl.node_pointer_down_callback()(id.into(), x, y);
    }

    /// Press on a node's source (`0`) or target (`1`) handle.
    pub fn press_handle(&self, node_id: &str, handle_type: i32, x: f32, y: f32) {
        self.ctrl.handle_pointer_down_callback()(node_id.into(), "".into(), handle_type, x, y);
    }

    pub fn move_pointer(&self, x: f32, y: f32) {
        self.ctrl.pointer_moved_callback()(x, y);
    }

    pub fn release_pointer(&self, x: f32, y: f32) {
        self.ctrl.pointer_released_callback()(x, y);
    }

    pub fn click_pane(&self) {
        self.ctrl.pane_clicked_callback()();
    }

    /// Press on `id` at `from`, move halfway, move to `to`, release.
    pub fn drag_node(&self, id: &str, from: XYPosition, to: XYPosition) {
        self.press_node(id, from.x, from.y);
        self.move_pointer((from.x + to.x) / 2.0, (from.y + to.y) / 2.0);
        self.move_pointer(to.x, to.y);
        self.release_pointer(to.x, to.y);
    }

    /// Press on `id` and release without moving.
    pub fn click_node(&self, id: &str) {
        let p = self.position(id);
        self.press_node(id, p.x + 10.0, p.y + 10.0);
        self.release_pointer(p.x + 10.0, p.y + 10.0);
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    pub fn key_down(&self, key: Key) {
        self.key_down_with(key_text(key), Self::modifiers_for(key));
    }

    pub fn key_up(&self, key: Key) {
        self.key_up_with(key_text(key), Modifiers::default());
    }

    pub fn tap_key(&self, key: Key) {
        self.key_down(key);
        self.key_up(key);
    }

    pub fn key_down_with(&self, text: SharedString, m: Modifiers) {
        self.ctrl.key_pressed_callback()(text, m.shift, m.control, m.alt, m.meta);
    }

    pub fn key_up_with(&self, text: SharedString, m: Modifiers) {
        self.ctrl.key_released_callback()(text, m.shift, m.control, m.alt, m.meta);
    }

    /// Modifiers held while the modifier key itself goes down.
    fn modifiers_for(key: Key) -> Modifiers {
        Modifiers {
            shift: key == Key::Shift,
            control: key == Key::Control,
            alt: key == Key::Alt,
            meta: key == Key::Meta,
        }
    }
}
