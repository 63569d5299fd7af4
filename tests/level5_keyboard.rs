//! Level 5: Keyboard Tests
//!
//! Tests the delete key, key combos fed through the controller and
//! deletion through the flow instance.

mod common;

use common::harness::{default_edges, default_nodes, FlowTestHarness};
use slint::platform::Key;
use slint_flow::{use_key_press, BeforeDelete, DeletedElements, Edge, FlowOptions, KeyPressOptions, Node, XYPosition};
use serde_json::json;
use std::rc::Rc;

fn text(key: Key) -> slint::SharedString {
    char::from(key).to_string().into()
}

#[test]
fn test_delete_key_removes_selected_node_and_its_edges() {
    let harness = FlowTestHarness::new();
    harness.click_node("a");
    harness.tracker.clear();

    harness.tap_key(Key::Backspace);

    assert_eq!(harness.node_ids(), vec!["b"]);
    assert!(harness.edge_ids().is_empty());
    assert_eq!(*harness.tracker.nodes_deleted.borrow(), vec!["a"]);
    assert_eq!(*harness.tracker.edges_deleted.borrow(), vec!["a-b"]);
}

#[test]
fn test_delete_emits_edges_before_nodes() {
    let harness = FlowTestHarness::new();
    harness.click_node("a");
    harness.tracker.clear();

    harness.tap_key(Key::Backspace);

    let order = harness.tracker.order.borrow();
    let position = |name: &str| order.iter().position(|e| *e == name).expect(name);
    assert!(position("edges_delete") < position("edges_change"));
    assert!(position("edges_change") < position("nodes_delete"));
    assert!(position("nodes_delete") < position("nodes_change"));
    assert_eq!(order.last(), Some(&"delete"));
}

#[test]
fn test_delete_key_with_nothing_selected() {
    let harness = FlowTestHarness::new();

    harness.tap_key(Key::Backspace);

    assert_eq!(harness.node_ids(), vec!["a", "b"]);
    assert_eq!(*harness.tracker.delete.borrow(), 0);
}

#[test]
fn test_non_deletable_node_survives() {
    let harness = FlowTestHarness::with_options(
        FlowOptions::new()
            .with_default_nodes(vec![
                Node::new("a", XYPosition::new(0.0, 0.0), json!({})).with_deletable(false),
                Node::new("b", XYPosition::new(300.0, 0.0), json!({})),
            ])
            .with_default_edges(default_edges()),
    );
    harness.click_node("a");

    harness.tap_key(Key::Backspace);

    assert_eq!(harness.node_ids(), vec!["a", "b"]);
    assert_eq!(harness.edge_ids(), vec!["a-b"]);
}

#[test]
fn test_configured_delete_key() {
    let mut options = FlowOptions::new()
        .with_default_nodes(default_nodes())
        .with_default_edges(default_edges());
    options.delete_key_code = Some("Delete".to_string());
    let harness = FlowTestHarness::with_options(options);
    harness.click_node("b");

    harness.tap_key(Key::Backspace);
    assert_eq!(harness.node_ids(), vec!["a", "b"]);

    harness.tap_key(Key::Delete);
    assert_eq!(harness.node_ids(), vec!["a"]);
}

#[test]
fn test_before_delete_can_cancel() {
    let harness = FlowTestHarness::new();
    let cancel = |_: &DeletedElements| -> BeforeDelete { BeforeDelete::Cancel };
    harness.flow.store().set_on_before_delete(Some(Rc::new(cancel)));
    harness.click_node("a");

    harness.tap_key(Key::Backspace);

    assert_eq!(harness.node_ids(), vec!["a", "b"]);
    assert_eq!(*harness.tracker.delete.borrow(), 0);
}

#[test]
fn test_before_delete_can_keep_edges() {
    let harness = FlowTestHarness::new();
    harness.flow.store().set_on_before_delete(Some(Rc::new(|elements: &DeletedElements| -> BeforeDelete {
        BeforeDelete::Replace(DeletedElements {
            nodes: elements.nodes.clone(),
            edges: Vec::new(),
        })
    })));

    let deleted = harness.instance().delete_elements(&["b".to_string()], &[]);

    assert_eq!(deleted.nodes.len(), 1);
    assert!(deleted.edges.is_empty());
    assert_eq!(harness.node_ids(), vec!["a"]);
    assert_eq!(harness.edge_ids(), vec!["a-b"]);
}

#[test]
fn test_deleting_parent_deletes_children() {
    let harness = FlowTestHarness::with_options(
        FlowOptions::new()
            .with_default_nodes(vec![
                Node::new("p", XYPosition::new(0.0, 0.0), json!({})),
                Node::new("c", XYPosition::new(10.0, 10.0), json!({})).with_parent("p"),
                Node::new("g", XYPosition::new(5.0, 5.0), json!({})).with_parent("c"),
                Node::new("x", XYPosition::new(500.0, 0.0), json!({})),
            ])
            .with_default_edges(vec![Edge::new("g-x", "g", "x")]),
    );

    let deleted = harness.instance().delete_elements(&["p".to_string()], &[]);

    let mut ids: Vec<String> = deleted.nodes.iter().map(|n| n.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["c", "g", "p"]);
    assert_eq!(harness.node_ids(), vec!["x"]);
    assert!(harness.edge_ids().is_empty());
    assert!(harness.flow.store().read(|s| s.parent_lookup.is_empty()));
}

// ============================================================================
// Key combos
// ============================================================================

#[test]
fn test_combo_through_controller() {
    let harness = FlowTestHarness::new();
    let save = use_key_press(harness.flow.events(), &["Control+s"], KeyPressOptions::default());

    harness.key_down(Key::Control);
    assert!(!save.is_pressed());
    harness.key_down_with(
        "s".into(),
        slint_flow::Modifiers {
            control: true,
            ..Default::default()
        },
    );
    assert!(save.is_pressed());

    harness.key_up_with("s".into(), Default::default());
    assert!(!save.is_pressed());
}

#[test]
fn test_combo_matches_by_code() {
    let harness = FlowTestHarness::new();
    let key = use_key_press(harness.flow.events(), &["KeyZ"], KeyPressOptions::default());

    harness.key_down_with("Z".into(), Default::default());
    assert!(key.is_pressed());
}

#[test]
fn test_focus_loss_releases_keys() {
    let harness = FlowTestHarness::new();
    let escape = use_key_press(harness.flow.events(), &["Escape"], KeyPressOptions::default());

    harness.key_down_with(text(Key::Escape), Default::default());
    assert!(escape.is_pressed());

    harness.ctrl.focus_changed_callback()(false);
    assert!(!escape.is_pressed());
}

#[test]
fn test_keys_ignored_while_unmounted() {
    let harness = FlowTestHarness::new();
    harness.click_node("a");
    harness.ctrl.unmount();

    harness.tap_key(Key::Backspace);

    assert_eq!(harness.node_ids(), vec!["a", "b"]);
}
