//! Edges and connections between node handles.

use crate::geometry::{get_bounds_of_rects, get_overlapping_area, Rect, Viewport};
use crate::nodes::InternalNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

fn is_false(value: &bool) -> bool {
    !*value
}

/// An edge as supplied by the host application.
///
/// `source`/`target` may name nodes that do not exist; such edges stay in
/// the store but are never visible.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "D: Deserialize<'de>"))]
pub struct Edge<D = Value> {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<D>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub animated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl<D> Edge<D> {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            kind: None,
            data: None,
            selected: false,
            hidden: false,
            animated: false,
            deletable: None,
            selectable: None,
            z_index: None,
        }
    }

    /// Edge for a connection, with the generated `xy-edge__...` id.
    pub fn from_connection(connection: &Connection) -> Self {
        let mut edge = Self::new(
            get_edge_id(connection),
            connection.source.clone(),
            connection.target.clone(),
        );
        edge.source_handle = connection.source_handle.clone();
        edge.target_handle = connection.target_handle.clone();
        edge
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_string);
        self.target_handle = target_handle.map(str::to_string);
        self
    }

    pub fn with_data(mut self, data: D) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_deletable(mut self, deletable: bool) -> Self {
        self.deletable = Some(deletable);
        self
    }

    pub fn is_deletable(&self) -> bool {
        self.deletable.unwrap_or(true)
    }

    pub fn is_selectable(&self, elements_selectable: bool) -> bool {
        self.selectable.unwrap_or(elements_selectable)
    }

    pub fn connection(&self) -> Connection {
        Connection {
            source: self.source.clone(),
            target: self.target.clone(),
            source_handle: self.source_handle.clone(),
            target_handle: self.target_handle.clone(),
        }
    }
}

/// A (potential) link between two handles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Connection {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source_handle: Option<&str>, target_handle: Option<&str>) -> Self {
        self.source_handle = source_handle.map(str::to_string);
        self.target_handle = target_handle.map(str::to_string);
        self
    }
}

pub fn get_edge_id(connection: &Connection) -> String {
    format!(
        "xy-edge__{}{}-{}{}",
        connection.source,
        connection.source_handle.as_deref().unwrap_or(""),
        connection.target,
        connection.target_handle.as_deref().unwrap_or("")
    )
}

/// Whether an edge joining the same handles already exists.
pub fn connection_exists<D>(connection: &Connection, edges: &[Edge<D>]) -> bool {
    edges.iter().any(|edge| {
        edge.source == connection.source
            && edge.target == connection.target
            && edge.source_handle == connection.source_handle
            && edge.target_handle == connection.target_handle
    })
}

/// Append `edge` unless it lacks an endpoint or duplicates an existing
/// connection. Returns whether the edge was added.
pub fn add_edge<D>(edge: Edge<D>, edges: &mut Vec<Edge<D>>) -> bool {
    if edge.source.is_empty() || edge.target.is_empty() {
        tracing::warn!(edge = %edge.id, "flow: edge needs a source and a target");
        return false;
    }
    if connection_exists(&edge.connection(), edges) {
        return false;
    }
    edges.push(edge);
    true
}

/// Edges touching any of `node_ids`.
pub fn get_connected_edges<'a, D>(
    node_ids: &HashSet<&str>,
    edges: impl IntoIterator<Item = &'a Edge<D>>,
) -> Vec<&'a Edge<D>>
where
    D: 'a,
{
    edges
        .into_iter()
        .filter(|edge| node_ids.contains(edge.source.as_str()) || node_ids.contains(edge.target.as_str()))
        .collect()
}

/// Whether the box spanning both endpoint nodes overlaps the visible pane.
pub fn is_edge_visible<D>(
    source: &InternalNode<D>,
    target: &InternalNode<D>,
    width: f32,
    height: f32,
    viewport: Viewport,
) -> bool {
    let mut edge_rect = get_bounds_of_rects(&source.rect(), &target.rect());
    if edge_rect.width == 0.0 {
        edge_rect.width = 1.0;
    }
    if edge_rect.height == 0.0 {
        edge_rect.height = 1.0;
    }
    let view_rect = Rect::new(
        -viewport.x / viewport.zoom,
        -viewport.y / viewport.zoom,
        width / viewport.zoom,
        height / viewport.zoom,
    );
    get_overlapping_area(&view_rect, &edge_rect) > 0.0
}
