//! Level 7: Scalability Tests
//!
//! These tests verify that the flow handles large graphs (1K-10K nodes/edges)
//! without performance regressions. Tests use generous timing thresholds (2-5x expected)
//! to avoid CI flakiness while still catching O(n²) regressions.
//!
//! **IMPORTANT:** Run with `cargo test level7 --release` for realistic performance.
//! Debug mode is 10-50x slower and timing assertions will be skipped.

mod common;

use common::harness::FlowTestHarness;
use serde_json::json;
use slint_flow::{
    apply_node_changes, get_connected_edges, get_elements_diff_changes, use_handle_connections,
    use_visible_node_ids, Change, Edge, FlowOptions, FlowStore, HandleType, Node, XYPosition,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};

// ============================================================================
// Debug Mode Detection
// ============================================================================

/// Returns true if running in debug mode (without optimizations)
const fn is_debug_mode() -> bool {
    cfg!(debug_assertions)
}

/// Assert that elapsed time is within threshold, but skip in debug mode.
/// In debug mode, prints a warning instead of failing.
macro_rules! assert_timing {
    ($elapsed:expr, $threshold:expr, $($msg:tt)+) => {
        if is_debug_mode() {
            if $elapsed > $threshold {
                eprintln!(
                    "SKIPPED (debug mode): {} - took {:?}, threshold {:?}. Run with --release for accurate timing.",
                    format!($($msg)+),
                    $elapsed,
                    $threshold
                );
            }
        } else {
            assert!(
                $elapsed <= $threshold,
                "{} took {:?}, expected <= {:?}",
                format!($($msg)+),
                $elapsed,
                $threshold
            );
        }
    };
}

// ============================================================================
// Constants
// ============================================================================

/// Small scale: 1,000 items
const SCALE_SMALL: usize = 1_000;

/// Large scale: 10,000 items
const SCALE_LARGE: usize = 10_000;

/// Nodes per grid row
const GRID_COLUMNS: usize = 50;

/// Distance between grid nodes
const GRID_SPACING: f32 = 200.0;

// ============================================================================
// Timing Thresholds (generous to avoid CI flakiness)
// ============================================================================

mod thresholds {
    use super::*;

    /// Maximum time for adopting 1K nodes into an empty store
    pub const SET_NODES_1K: Duration = Duration::from_millis(50);

    /// Maximum time for adopting 10K nodes into an empty store
    pub const SET_NODES_10K: Duration = Duration::from_millis(300);

    /// Maximum time for diffing 10K unchanged nodes
    pub const DIFF_10K: Duration = Duration::from_millis(100);

    /// Maximum time for applying 10K position changes
    pub const APPLY_10K: Duration = Duration::from_millis(100);

    /// Maximum time for one drag step with 1K selected nodes
    pub const DRAG_STEP_1K: Duration = Duration::from_millis(100);

    /// Maximum time for collecting the edges of 100 nodes out of 10K
    pub const CONNECTED_EDGES_10K: Duration = Duration::from_millis(50);
}

// ============================================================================
// Generators
// ============================================================================

fn grid_position(i: usize) -> XYPosition {
    XYPosition::new(
        (i % GRID_COLUMNS) as f32 * GRID_SPACING,
        (i / GRID_COLUMNS) as f32 * GRID_SPACING,
    )
}

fn grid_nodes(count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| Node::new(format!("n{i}"), grid_position(i), json!({ "index": i })))
        .collect()
}

/// Edges linking each node to the next one.
fn chain_edges(count: usize) -> Vec<Edge> {
    (1..count)
        .map(|i| Edge::new(format!("e{i}"), format!("n{}", i - 1), format!("n{i}")))
        .collect()
}

fn store_with(nodes: Vec<Node>, edges: Vec<Edge>) -> FlowStore {
    FlowStore::new(FlowOptions::new().with_default_nodes(nodes).with_default_edges(edges))
}

// ============================================================================
// Store adoption
// ============================================================================

#[test]
fn test_set_nodes_1k() {
    let store: FlowStore = FlowStore::new(FlowOptions::new());
    let nodes = grid_nodes(SCALE_SMALL);

    let start = Instant::now();
    store.set_nodes(nodes);
    let elapsed = start.elapsed();

    assert_eq!(store.read(|s| s.node_lookup.len()), SCALE_SMALL);
    assert_timing!(elapsed, thresholds::SET_NODES_1K, "set_nodes (1K)");
}

#[test]
fn test_set_nodes_10k() {
    let store: FlowStore = FlowStore::new(FlowOptions::new());
    let nodes = grid_nodes(SCALE_LARGE);

    let start = Instant::now();
    store.set_nodes(nodes);
    let elapsed = start.elapsed();

    assert_eq!(store.read(|s| s.node_lookup.len()), SCALE_LARGE);
    assert_eq!(
        store.read(|s| s.node_lookup.get("n9999").map(|n| n.internals.position_absolute)),
        Some(grid_position(9_999))
    );
    assert_timing!(elapsed, thresholds::SET_NODES_10K, "set_nodes (10K)");
}

#[test]
fn test_set_nodes_10k_with_children() {
    let mut nodes = grid_nodes(SCALE_LARGE / 2);
    nodes.extend((0..SCALE_LARGE / 2).map(|i| {
        Node::new(format!("c{i}"), XYPosition::new(10.0, 10.0), json!({})).with_parent(format!("n{i}"))
    }));
    let store = store_with(nodes, Vec::new());

    let (parents, child) = store.read(|s| {
        (
            s.parent_lookup.len(),
            s.node_lookup.get("c42").map(|n| n.internals.position_absolute),
        )
    });
    assert_eq!(parents, SCALE_LARGE / 2);
    let p = grid_position(42);
    assert_eq!(child, Some(XYPosition::new(p.x + 10.0, p.y + 10.0)));
}

// ============================================================================
// Diff and reducer
// ============================================================================

#[test]
fn test_diff_10k_unchanged_is_empty() {
    let nodes = grid_nodes(SCALE_LARGE);
    let store = store_with(nodes.clone(), Vec::new());

    let start = Instant::now();
    let changes = store.read(|s| get_elements_diff_changes(&nodes, &s.node_lookup));
    let elapsed = start.elapsed();

    assert!(changes.is_empty());
    assert_timing!(elapsed, thresholds::DIFF_10K, "diff (10K unchanged)");
}

#[test]
fn test_diff_10k_with_one_moved_node() {
    let mut nodes = grid_nodes(SCALE_LARGE);
    let store = store_with(nodes.clone(), Vec::new());
    nodes[5_000].position = XYPosition::new(-1.0, -1.0);

    let changes = store.read(|s| get_elements_diff_changes(&nodes, &s.node_lookup));

    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], Change::Replace { id, .. } if id == "n5000"));
}

#[test]
fn test_apply_10k_position_changes() {
    let nodes = grid_nodes(SCALE_LARGE);
    let changes: Vec<_> = nodes
        .iter()
        .map(|n| Change::position(n.id.clone(), XYPosition::new(n.position.x + 1.0, n.position.y)))
        .collect();

    let start = Instant::now();
    let moved = apply_node_changes(&changes, nodes);
    let elapsed = start.elapsed();

    assert_eq!(moved.len(), SCALE_LARGE);
    assert_eq!(moved[0].id, "n0");
    assert_eq!(moved[0].position, XYPosition::new(1.0, 0.0));
    assert_eq!(moved[SCALE_LARGE - 1].id, format!("n{}", SCALE_LARGE - 1));
    assert_timing!(elapsed, thresholds::APPLY_10K, "apply position changes (10K)");
}

#[test]
fn test_remove_every_other_node_1k() {
    let store = store_with(grid_nodes(SCALE_SMALL), chain_edges(SCALE_SMALL));
    let changes: Vec<_> = (0..SCALE_SMALL).step_by(2).map(|i| Change::remove(format!("n{i}"))).collect();

    store.trigger_node_changes(changes);

    let ids: Vec<String> = store.read(|s| s.nodes.iter().map(|n| n.id.clone()).collect());
    assert_eq!(ids.len(), SCALE_SMALL / 2);
    assert_eq!(ids[0], "n1");
    assert_eq!(ids[1], "n3");
}

// ============================================================================
// Batching
// ============================================================================

#[test]
fn test_many_adds_flush_once() {
    let harness = FlowTestHarness::new();
    let instance = harness.instance();

    for i in 0..SCALE_SMALL {
        instance.add_nodes(vec![Node::new(format!("x{i}"), grid_position(i), json!({}))]);
    }
    assert_eq!(harness.scheduler.pending_count(), 1);
    assert_eq!(harness.node_ids().len(), 2);

    assert_eq!(harness.flush(), 1);
    let ids = harness.node_ids();
    assert_eq!(ids.len(), SCALE_SMALL + 2);
    assert_eq!(ids[2], "x0");
    assert_eq!(ids[SCALE_SMALL + 1], format!("x{}", SCALE_SMALL - 1));
}

// ============================================================================
// Interaction
// ============================================================================

#[test]
fn test_drag_1k_selected_nodes() {
    let harness = FlowTestHarness::with_options(FlowOptions::new().with_default_nodes(grid_nodes(SCALE_SMALL)));
    let all: Vec<String> = harness.node_ids();
    harness.flow.store().add_selected_nodes(&all);

    harness.press_node("n0", 10.0, 10.0);
    harness.move_pointer(20.0, 20.0);
    let start = Instant::now();
    harness.move_pointer(30.0, 40.0);
    let elapsed = start.elapsed();
    harness.release_pointer(30.0, 40.0);

    for i in [0, 499, 999] {
        let expected = grid_position(i);
        assert_eq!(
            harness.position(&format!("n{i}")),
            XYPosition::new(expected.x + 20.0, expected.y + 30.0)
        );
    }
    assert_timing!(elapsed, thresholds::DRAG_STEP_1K, "drag step (1K selected)");
}

#[test]
fn test_visible_nodes_in_large_graph() {
    let harness = FlowTestHarness::with_options(FlowOptions::new().with_default_nodes(grid_nodes(SCALE_SMALL)));

    let visible = use_visible_node_ids(harness.flow.store(), true);

    // 4 columns and 3 rows of the grid fit in the 800x600 pane
    assert_eq!(visible.get().len(), 12);
    assert!(visible.get().contains(&"n0".to_string()));
    assert!(!visible.get().contains(&"n999".to_string()));
}

// ============================================================================
// Connections
// ============================================================================

#[test]
fn test_connected_edges_of_100_nodes_in_10k() {
    let edges = chain_edges(SCALE_LARGE);
    let ids: Vec<String> = (0..100).map(|i| format!("n{i}")).collect();
    let node_ids: HashSet<&str> = ids.iter().map(String::as_str).collect();

    let start = Instant::now();
    let connected = get_connected_edges(&node_ids, &edges);
    let elapsed = start.elapsed();

    // e1..=e100 touch n0..n99
    assert_eq!(connected.len(), 100);
    assert_timing!(elapsed, thresholds::CONNECTED_EDGES_10K, "connected edges (100 of 10K)");
}

#[test]
fn test_hub_node_handle_connections() {
    let mut nodes = grid_nodes(SCALE_SMALL);
    nodes.push(Node::new("hub", XYPosition::new(-500.0, 0.0), json!({})));
    let edges: Vec<Edge> = (0..SCALE_SMALL)
        .map(|i| Edge::new(format!("h{i}"), "hub", format!("n{i}")))
        .collect();
    let store = store_with(nodes, edges);

    let outgoing = use_handle_connections(&store, "hub", HandleType::Source, None);
    let incoming = use_handle_connections(&store, "n7", HandleType::Target, None);

    assert_eq!(outgoing.get().len(), SCALE_SMALL);
    assert_eq!(incoming.get().len(), 1);
    assert_eq!(incoming.get()[0].source, "hub");

    store.trigger_edge_changes(vec![Change::remove("h7")]);
    assert_eq!(outgoing.get().len(), SCALE_SMALL - 1);
    assert!(incoming.get().is_empty());
}
