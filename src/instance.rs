//! The imperative flow API.
//!
//! [`FlowInstance`] bundles getters, batched setters, deletion, intersection
//! queries and the viewport helper over one store. Setters go through the
//! [`Flow`](crate::Flow)'s queues when the instance was created from one;
//! an instance built directly on a store commits immediately.

use crate::batch::{apply_queue_items, commit_edges, commit_nodes, BatchContext, Flow, QueueItem};
use crate::changes::element_to_remove_change;
use crate::config::FlowExport;
use crate::connections::{ConnectionKey, HandleConnection};
use crate::edges::{get_connected_edges, Edge};
use crate::errors::FlowError;
use crate::geometry::{get_overlapping_area, Rect};
use crate::nodes::{get_internal_nodes_bounds, ElementData, HandleType, InternalNode, Node};
use crate::store::{BeforeDelete, DeletedElements, FlowStore};
use crate::viewport::{use_viewport_helper, ViewportHelper};
use serde_json::Value;
use std::collections::HashSet;

/// What an intersection query is measured against.
#[derive(Clone, Debug, PartialEq)]
pub enum IntersectionTarget {
    /// A node of the flow, by id. The node itself is never reported.
    Node(String),
    /// A rect in flow coordinates.
    Rect(Rect),
}

/// Handle to a flow's imperative API. Cheap to clone.
#[derive(Clone)]
pub struct FlowInstance<ND = Value, ED = Value> {
    store: FlowStore<ND, ED>,
    batch: Option<BatchContext<ND, ED>>,
}

/// The instance of `flow`, batched through its queues.
pub fn use_flow<ND: ElementData, ED: ElementData>(flow: &Flow<ND, ED>) -> FlowInstance<ND, ED> {
    flow.instance()
}

impl<ND: ElementData, ED: ElementData> FlowInstance<ND, ED> {
    /// An unbatched instance: setters commit immediately.
    pub fn new(store: FlowStore<ND, ED>) -> Self {
        Self { store, batch: None }
    }

    pub fn with_batch(store: FlowStore<ND, ED>, batch: BatchContext<ND, ED>) -> Self {
        Self {
            store,
            batch: Some(batch),
        }
    }

    pub fn store(&self) -> &FlowStore<ND, ED> {
        &self.store
    }

    /// The queues this instance pushes to.
    pub fn batch_context(&self) -> Result<&BatchContext<ND, ED>, FlowError> {
        self.batch.as_ref().ok_or(FlowError::MissingProvider("batch_context"))
    }

    pub fn viewport(&self) -> ViewportHelper<ND, ED> {
        use_viewport_helper(&self.store)
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn get_nodes(&self) -> Vec<Node<ND>> {
        self.store.read(|s| s.nodes.clone())
    }

    /// The node as the host supplied it.
    pub fn get_node(&self, id: &str) -> Option<Node<ND>> {
        self.store.read(|s| s.node_lookup.get(id).map(|n| n.internals.user_node.clone()))
    }

    pub fn get_internal_node(&self, id: &str) -> Option<InternalNode<ND>> {
        self.store.read(|s| s.node_lookup.get(id).cloned())
    }

    pub fn get_edges(&self) -> Vec<Edge<ED>> {
        self.store.read(|s| s.edges.clone())
    }

    pub fn get_edge(&self, id: &str) -> Option<Edge<ED>> {
        self.store.read(|s| s.edge_lookup.get(id).cloned())
    }

    pub fn to_object(&self) -> FlowExport<ND, ED> {
        self.store.to_object()
    }

    // ========================================================================
    // Batched setters
    // ========================================================================

    fn push_nodes(&self, item: QueueItem<Node<ND>>) {
        match &self.batch {
            Some(batch) => batch.node_queue.push(item),
            None => {
                let current = self.store.read(|s| s.nodes.clone());
                commit_nodes(&self.store, apply_queue_items(vec![item], current));
            }
        }
    }

    fn push_edges(&self, item: QueueItem<Edge<ED>>) {
        match &self.batch {
            Some(batch) => batch.edge_queue.push(item),
            None => {
                let current = self.store.read(|s| s.edges.clone());
                commit_edges(&self.store, apply_queue_items(vec![item], current));
            }
        }
    }

    pub fn set_nodes(&self, nodes: Vec<Node<ND>>) {
        self.push_nodes(QueueItem::Set(nodes));
    }

    /// Replace the nodes with a function of the pending value.
    pub fn update_nodes(&self, f: impl FnOnce(Vec<Node<ND>>) -> Vec<Node<ND>> + 'static) {
        self.push_nodes(QueueItem::update(f));
    }

    pub fn set_edges(&self, edges: Vec<Edge<ED>>) {
        self.push_edges(QueueItem::Set(edges));
    }

    pub fn update_edges(&self, f: impl FnOnce(Vec<Edge<ED>>) -> Vec<Edge<ED>> + 'static) {
        self.push_edges(QueueItem::update(f));
    }

    pub fn add_nodes(&self, nodes: Vec<Node<ND>>) {
        self.update_nodes(move |mut current| {
            current.extend(nodes);
            current
        });
    }

    pub fn add_edges(&self, edges: Vec<Edge<ED>>) {
        self.update_edges(move |mut current| {
            current.extend(edges);
            current
        });
    }

    /// Edit one node in place. An unknown id is reported when the batch
    /// is flushed.
    pub fn update_node(&self, id: &str, f: impl FnOnce(&mut Node<ND>) + 'static) {
        let id = id.to_string();
        let store = self.store.clone();
        self.update_nodes(move |mut nodes| {
            match nodes.iter_mut().find(|n| n.id == id) {
                Some(node) => f(node),
                None => store.report_error(&FlowError::NodeNotFound { id }),
            }
            nodes
        });
    }

    pub fn update_node_data(&self, id: &str, f: impl FnOnce(&mut ND) + 'static) {
        self.update_node(id, move |node| f(&mut node.data));
    }

    pub fn update_edge(&self, id: &str, f: impl FnOnce(&mut Edge<ED>) + 'static) {
        let id = id.to_string();
        let store = self.store.clone();
        self.update_edges(move |mut edges| {
            match edges.iter_mut().find(|e| e.id == id) {
                Some(edge) => f(edge),
                None => store.report_error(&FlowError::EdgeNotFound { id }),
            }
            edges
        });
    }

    /// Edit an edge's payload. `data` is `None` when the edge carries none.
    pub fn update_edge_data(&self, id: &str, f: impl FnOnce(&mut Option<ED>) + 'static) {
        self.update_edge(id, move |edge| f(&mut edge.data));
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// What deleting `node_ids` and `edge_ids` would remove.
    ///
    /// Non-deletable elements are skipped. Descendants of deleted nodes are
    /// included, as are deletable edges connected to any deleted node.
    pub fn get_elements_to_remove(&self, node_ids: &[String], edge_ids: &[String]) -> DeletedElements<ND, ED> {
        self.store.read(|s| {
            let mut removed: HashSet<&str> = HashSet::new();
            loop {
                let before = removed.len();
                for node in s.nodes.iter().filter(|n| n.is_deletable()) {
                    if removed.contains(node.id.as_str()) {
                        continue;
                    }
                    let requested = node_ids.iter().any(|id| *id == node.id);
                    let parent_removed = node
                        .parent_id
                        .as_deref()
                        .map_or(false, |parent| removed.contains(parent));
                    if requested || parent_removed {
                        removed.insert(node.id.as_str());
                    }
                }
                if removed.len() == before {
                    break;
                }
            }

            let nodes: Vec<Node<ND>> = s
                .nodes
                .iter()
                .filter(|n| removed.contains(n.id.as_str()))
                .cloned()
                .collect();

            let deletable: Vec<&Edge<ED>> = s.edges.iter().filter(|e| e.is_deletable()).collect();
            let mut edges: Vec<Edge<ED>> = get_connected_edges(&removed, deletable.iter().copied())
                .into_iter()
                .cloned()
                .collect();
            for edge in deletable {
                if edge_ids.iter().any(|id| *id == edge.id) && !edges.iter().any(|e| e.id == edge.id) {
                    edges.push(edge.clone());
                }
            }

            DeletedElements { nodes, edges }
        })
    }

    /// Delete nodes and edges, returning what was actually deleted.
    ///
    /// `on_before_delete` may cancel or replace the selection. Edge removal
    /// is emitted before node removal, and `delete` last.
    pub fn delete_elements(&self, node_ids: &[String], edge_ids: &[String]) -> DeletedElements<ND, ED> {
        let matching = self.get_elements_to_remove(node_ids, edge_ids);
        if matching.is_empty() {
            return matching;
        }
        let deleted = match self.store.before_delete(&matching) {
            BeforeDelete::Proceed => matching,
            BeforeDelete::Cancel => return DeletedElements::default(),
            BeforeDelete::Replace(elements) => elements,
        };

        let events = self.store.events();
        if !deleted.edges.is_empty() {
            events.edges_delete.emit(&deleted.edges);
            self.store
                .trigger_edge_changes(deleted.edges.iter().map(element_to_remove_change).collect());
        }
        if !deleted.nodes.is_empty() {
            events.nodes_delete.emit(&deleted.nodes);
            self.store
                .trigger_node_changes(deleted.nodes.iter().map(element_to_remove_change).collect());
        }
        if !deleted.is_empty() {
            events.delete.emit(&deleted);
        }
        deleted
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn target_rect(&self, target: &IntersectionTarget) -> Option<Rect> {
        match target {
            IntersectionTarget::Rect(rect) => Some(*rect),
            IntersectionTarget::Node(id) => {
                let rect = self.store.read(|s| s.node_lookup.get(id).map(|n| n.rect()));
                if rect.is_none() {
                    self.store.report_error(&FlowError::NodeNotFound { id: id.clone() });
                }
                rect
            }
        }
    }

    /// Nodes overlapping `target`. With `partially` any overlap counts,
    /// otherwise the overlap must cover the whole target rect.
    pub fn get_intersecting_nodes(&self, target: &IntersectionTarget, partially: bool) -> Vec<Node<ND>> {
        let Some(rect) = self.target_rect(target) else {
            return Vec::new();
        };
        let exclude = match target {
            IntersectionTarget::Node(id) => Some(id.as_str()),
            IntersectionTarget::Rect(_) => None,
        };
        self.store.read(|s| {
            s.nodes
                .iter()
                .filter(|node| {
                    if exclude == Some(node.id.as_str()) {
                        return false;
                    }
                    let Some(internal) = s.node_lookup.get(&node.id) else {
                        return false;
                    };
                    overlaps(&internal.rect(), &rect, partially)
                })
                .cloned()
                .collect()
        })
    }

    /// Whether `target` overlaps `area`.
    pub fn is_node_intersecting(&self, target: &IntersectionTarget, area: &Rect, partially: bool) -> bool {
        self.target_rect(target)
            .map_or(false, |rect| overlaps(area, &rect, partially))
    }

    /// Bounding rect of the given nodes, in flow coordinates.
    pub fn get_nodes_bounds(&self, ids: &[String]) -> Rect {
        self.store
            .read(|s| get_internal_nodes_bounds(ids.iter().filter_map(|id| s.node_lookup.get(id))))
    }

    /// Edges attached to one handle.
    pub fn get_handle_connections(
        &self,
        node_id: &str,
        handle_type: HandleType,
        handle_id: Option<&str>,
    ) -> Vec<HandleConnection> {
        let key = ConnectionKey::for_handle(node_id, handle_type, handle_id);
        self.connections_for(&key)
    }

    /// Edges attached to a node, optionally narrowed to one side or handle.
    pub fn get_node_connections(
        &self,
        node_id: &str,
        handle_type: Option<HandleType>,
        handle_id: Option<&str>,
    ) -> Vec<HandleConnection> {
        let key = match (handle_type, handle_id) {
            (None, _) => ConnectionKey::node(node_id),
            (Some(handle_type), None) => ConnectionKey::side(node_id, handle_type),
            (Some(handle_type), Some(handle_id)) => ConnectionKey::handle(node_id, handle_type, handle_id),
        };
        self.connections_for(&key)
    }

    fn connections_for(&self, key: &ConnectionKey) -> Vec<HandleConnection> {
        self.store.read(|s| {
            s.connection_lookup
                .get(key)
                .map(|connections| connections.values().cloned().collect())
                .unwrap_or_default()
        })
    }
}

fn overlaps(a: &Rect, target: &Rect, partially: bool) -> bool {
    let area = get_overlapping_area(a, target);
    (partially && area > 0.0) || area >= target.area()
}
