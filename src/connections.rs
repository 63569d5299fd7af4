//! Connection lookup and the in-progress connection state.

use crate::edges::Edge;
use crate::geometry::XYPosition;
use crate::nodes::{HandleElement, HandleType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How handles may be joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionMode {
    /// Source handles only connect to target handles.
    #[default]
    Strict,
    /// Any two distinct handles connect.
    Loose,
}

/// Key into the [`ConnectionLookup`]: a node, a node side (source/target),
/// or one handle of a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub node_id: String,
    pub handle_type: Option<HandleType>,
    pub handle_id: Option<String>,
}

impl ConnectionKey {
    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            handle_type: None,
            handle_id: None,
        }
    }

    pub fn side(node_id: impl Into<String>, handle_type: HandleType) -> Self {
        Self {
            node_id: node_id.into(),
            handle_type: Some(handle_type),
            handle_id: None,
        }
    }

    pub fn handle(node_id: impl Into<String>, handle_type: HandleType, handle_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            handle_type: Some(handle_type),
            handle_id: Some(handle_id.into()),
        }
    }

    /// Most specific key for an optional handle id.
    pub fn for_handle(node_id: impl Into<String>, handle_type: HandleType, handle_id: Option<&str>) -> Self {
        match handle_id {
            Some(handle_id) => Self::handle(node_id, handle_type, handle_id),
            None => Self::side(node_id, handle_type),
        }
    }
}

/// One edge as seen from one of its endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleConnection {
    pub edge_id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

pub type ConnectionLookup = IndexMap<ConnectionKey, IndexMap<String, HandleConnection>>;

pub type EdgeLookup<D = serde_json::Value> = IndexMap<String, Edge<D>>;

fn add_connection(
    lookup: &mut ConnectionLookup,
    connection: &HandleConnection,
    node_id: &str,
    handle_type: HandleType,
    handle_id: Option<&str>,
) {
    let mut keys = vec![ConnectionKey::node(node_id), ConnectionKey::side(node_id, handle_type)];
    if let Some(handle_id) = handle_id {
        keys.push(ConnectionKey::handle(node_id, handle_type, handle_id));
    }
    for key in keys {
        lookup
            .entry(key)
            .or_default()
            .insert(connection.edge_id.clone(), connection.clone());
    }
}

/// Rebuild both lookups from `edges`.
pub fn update_connection_lookup<D: Clone>(
    connection_lookup: &mut ConnectionLookup,
    edge_lookup: &mut EdgeLookup<D>,
    edges: &[Edge<D>],
) {
    connection_lookup.clear();
    edge_lookup.clear();

    for edge in edges {
        let connection = HandleConnection {
            edge_id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            source_handle: edge.source_handle.clone(),
            target_handle: edge.target_handle.clone(),
        };
        add_connection(
            connection_lookup,
            &connection,
            &edge.source,
            HandleType::Source,
            edge.source_handle.as_deref(),
        );
        add_connection(
            connection_lookup,
            &connection,
            &edge.target,
            HandleType::Target,
            edge.target_handle.as_deref(),
        );
        edge_lookup.insert(edge.id.clone(), edge.clone());
    }
    tracing::trace!(edges = edges.len(), keys = connection_lookup.len(), "flow: connection lookup rebuilt");
}

/// A connection being dragged out of a handle.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionInProgress {
    pub from_node: String,
    pub from_handle: HandleElement,
    /// Anchor of the starting handle, flow space.
    pub from: XYPosition,
    /// Current end point, pane coordinates.
    pub to: XYPosition,
    pub to_handle: Option<HandleElement>,
    pub to_node: Option<String>,
    /// `None` until a candidate handle is under the pointer.
    pub is_valid: Option<bool>,
    /// Pointer position, pane coordinates.
    pub pointer: XYPosition,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ConnectionState {
    #[default]
    Idle,
    InProgress(ConnectionInProgress),
}

impl ConnectionState {
    pub fn in_progress(&self) -> Option<&ConnectionInProgress> {
        match self {
            Self::InProgress(connection) => Some(connection),
            Self::Idle => None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress(_))
    }
}
