//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod harness;

use slint_flow::{
    ConnectStart, Connection, EdgeChange, FlowError, FlowStore, ListenerGuard, NodeChange, Viewport,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Tracks store events for testing.
///
/// Each field records the events of the corresponding store event source.
#[derive(Default, Clone)]
pub struct CallbackTracker {
    /// One entry per `nodes_change` emission
    pub nodes_change: Rc<RefCell<Vec<Vec<NodeChange>>>>,
    /// One entry per `edges_change` emission
    pub edges_change: Rc<RefCell<Vec<Vec<EdgeChange>>>>,
    pub connect: Rc<RefCell<Vec<Connection>>>,
    pub connect_start: Rc<RefCell<Vec<ConnectStart>>>,
    pub connect_end: Rc<RefCell<Vec<Option<Connection>>>>,
    /// Ids of deleted nodes, in emission order
    pub nodes_deleted: Rc<RefCell<Vec<String>>>,
    /// Ids of deleted edges, in emission order
    pub edges_deleted: Rc<RefCell<Vec<String>>>,
    /// Count of `delete` emissions
    pub delete: Rc<RefCell<usize>>,
    /// (selected node ids, selected edge ids)
    pub selection_change: Rc<RefCell<Vec<(Vec<String>, Vec<String>)>>>,
    pub viewport_change: Rc<RefCell<Vec<Viewport>>>,
    /// Count of `init` emissions
    pub init: Rc<RefCell<usize>>,
    pub node_drag_start: Rc<RefCell<Vec<String>>>,
    pub node_drag_stop: Rc<RefCell<Vec<String>>>,
    /// Codes reported through `on_error`
    pub errors: Rc<RefCell<Vec<&'static str>>>,
    /// Order in which the event sources fired
    pub order: Rc<RefCell<Vec<&'static str>>>,
}

impl CallbackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every event of `store`. Recording stops when the guards drop.
    pub fn attach(&self, store: &FlowStore) -> Vec<ListenerGuard> {
        let events = store.events();
        let t = self.clone();
        store.set_on_error(Rc::new(move |code: &'static str, _: &FlowError| {
            t.errors.borrow_mut().push(code);
        }));

        let mut guards = Vec::new();
        let t = self.clone();
        guards.push(events.nodes_change.add(move |changes| {
            t.order.borrow_mut().push("nodes_change");
            t.nodes_change.borrow_mut().push(changes.clone());
        }));
        let t = self.clone();
        guards.push(events.edges_change.add(move |changes| {
            t.order.borrow_mut().push("edges_change");
            t.edges_change.borrow_mut().push(changes.clone());
        }));
        let t = self.clone();
        guards.push(events.connect.add(move |connection| {
            t.order.borrow_mut().push("connect");
            t.connect.borrow_mut().push(connection.clone());
        }));
        let t = self.clone();
        guards.push(events.connect_start.add(move |start| {
            t.order.borrow_mut().push("connect_start");
            t.connect_start.borrow_mut().push(start.clone());
        }));
        let t = self.clone();
        guards.push(events.connect_end.add(move |connection| {
            t.order.borrow_mut().push("connect_end");
            t.connect_end.borrow_mut().push(connection.clone());
        }));
        let t = self.clone();
        guards.push(events.nodes_delete.add(move |nodes| {
            t.order.borrow_mut().push("nodes_delete");
            t.nodes_deleted
                .borrow_mut()
                .extend(nodes.iter().map(|n| n.id.clone()));
        }));
        let t = self.clone();
        guards.push(events.edges_delete.add(move |edges| {
            t.order.borrow_mut().push("edges_delete");
            t.edges_deleted
                .borrow_mut()
                .extend(edges.iter().map(|e| e.id.clone()));
        }));
        let t = self.clone();
        guards.push(events.delete.add(move |_| {
            t.order.borrow_mut().push("delete");
            *t.delete.borrow_mut() += 1;
        }));
        let t = self.clone();
        guards.push(events.selection_change.add(move |change| {
            t.selection_change.borrow_mut().push((
                change.nodes.iter().map(|n| n.id.clone()).collect(),
                change.edges.iter().map(|e| e.id.clone()).collect(),
            ));
        }));
        let t = self.clone();
        guards.push(events.viewport_change.add(move |viewport| {
            t.viewport_change.borrow_mut().push(*viewport);
        }));
        let t = self.clone();
        guards.push(events.init.add(move |_| {
            *t.init.borrow_mut() += 1;
        }));
        let t = self.clone();
        guards.push(events.node_drag_start.add(move |event| {
            t.node_drag_start.borrow_mut().push(event.node.id.clone());
        }));
        let t = self.clone();
        guards.push(events.node_drag_stop.add(move |event| {
            t.node_drag_stop.borrow_mut().push(event.node.id.clone());
        }));
        guards
    }

    /// Clear all recorded events.
    pub fn clear(&self) {
        self.nodes_change.borrow_mut().clear();
        self.edges_change.borrow_mut().clear();
        self.connect.borrow_mut().clear();
        self.connect_start.borrow_mut().clear();
        self.connect_end.borrow_mut().clear();
        self.nodes_deleted.borrow_mut().clear();
        self.edges_deleted.borrow_mut().clear();
        *self.delete.borrow_mut() = 0;
        self.selection_change.borrow_mut().clear();
        self.viewport_change.borrow_mut().clear();
        *self.init.borrow_mut() = 0;
        self.node_drag_start.borrow_mut().clear();
        self.node_drag_stop.borrow_mut().clear();
        self.errors.borrow_mut().clear();
        self.order.borrow_mut().clear();
    }
}
