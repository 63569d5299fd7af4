//! Flow options and the export format.
//!
//! [`FlowOptions`] mirrors the props a flow is created with. Every field is
//! optional; unset fields keep the store's defaults. Options can be built in
//! code or parsed from JSON (camelCase keys).

use crate::connections::ConnectionMode;
use crate::edges::Edge;
use crate::errors::FlowError;
use crate::geometry::{CoordinateExtent, NodeOrigin, SnapGrid, Viewport};
use crate::nodes::Node;
use crate::viewport::FitViewOptions;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowOptions<ND = Value, ED = Value> {
    /// Nodes owned by the host (controlled mode).
    pub nodes: Option<Vec<Node<ND>>>,
    pub edges: Option<Vec<Edge<ED>>>,
    /// Nodes owned by the store (self-managed mode).
    pub default_nodes: Option<Vec<Node<ND>>>,
    pub default_edges: Option<Vec<Edge<ED>>>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    #[serde(alias = "fitView")]
    pub fit_view_on_init: Option<bool>,
    pub fit_view_options: Option<FitViewOptions>,
    pub node_origin: Option<NodeOrigin>,
    pub node_extent: Option<CoordinateExtent>,
    pub min_zoom: Option<f32>,
    pub max_zoom: Option<f32>,
    pub translate_extent: Option<CoordinateExtent>,
    pub default_viewport: Option<Viewport>,
    pub snap_to_grid: Option<bool>,
    pub snap_grid: Option<SnapGrid>,
    pub nodes_draggable: Option<bool>,
    pub nodes_connectable: Option<bool>,
    pub elements_selectable: Option<bool>,
    pub select_nodes_on_drag: Option<bool>,
    pub elevate_nodes_on_select: Option<bool>,
    pub elevate_edges_on_select: Option<bool>,
    pub connection_mode: Option<ConnectionMode>,
    pub connection_radius: Option<f32>,
    pub node_drag_threshold: Option<f32>,
    pub only_render_visible_elements: Option<bool>,
    pub delete_key_code: Option<String>,
    pub multi_selection_key_code: Option<String>,
    pub debug: Option<bool>,
}

impl<ND, ED> Default for FlowOptions<ND, ED> {
    fn default() -> Self {
        Self {
            nodes: None,
            edges: None,
            default_nodes: None,
            default_edges: None,
            width: None,
            height: None,
            fit_view_on_init: None,
            fit_view_options: None,
            node_origin: None,
            node_extent: None,
            min_zoom: None,
            max_zoom: None,
            translate_extent: None,
            default_viewport: None,
            snap_to_grid: None,
            snap_grid: None,
            nodes_draggable: None,
            nodes_connectable: None,
            elements_selectable: None,
            select_nodes_on_drag: None,
            elevate_nodes_on_select: None,
            elevate_edges_on_select: None,
            connection_mode: None,
            connection_radius: None,
            node_drag_threshold: None,
            only_render_visible_elements: None,
            delete_key_code: None,
            multi_selection_key_code: None,
            debug: None,
        }
    }
}

impl<ND, ED> FlowOptions<ND, ED> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(mut self, nodes: Vec<Node<ND>>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn with_edges(mut self, edges: Vec<Edge<ED>>) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn with_default_nodes(mut self, nodes: Vec<Node<ND>>) -> Self {
        self.default_nodes = Some(nodes);
        self
    }

    pub fn with_default_edges(mut self, edges: Vec<Edge<ED>>) -> Self {
        self.default_edges = Some(edges);
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_fit_view_on_init(mut self, fit_view: bool) -> Self {
        self.fit_view_on_init = Some(fit_view);
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = Some(min_zoom);
        self.max_zoom = Some(max_zoom);
        self
    }

    pub fn with_translate_extent(mut self, extent: CoordinateExtent) -> Self {
        self.translate_extent = Some(extent);
        self
    }

    pub fn with_snap_grid(mut self, snap_grid: SnapGrid) -> Self {
        self.snap_to_grid = Some(true);
        self.snap_grid = Some(snap_grid);
        self
    }

    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = Some(mode);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }
}

impl<ND: DeserializeOwned, ED: DeserializeOwned> FlowOptions<ND, ED> {
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Key that deletes the selection unless configured otherwise.
pub const DEFAULT_DELETE_KEY: &str = "Backspace";

/// Key that toggles multi selection unless configured otherwise.
pub fn default_multi_selection_key() -> &'static str {
    if cfg!(target_os = "macos") {
        "Meta"
    } else {
        "Control"
    }
}

/// Serializable snapshot of a flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowExport<ND = Value, ED = Value> {
    pub nodes: Vec<Node<ND>>,
    pub edges: Vec<Edge<ED>>,
    pub viewport: Viewport,
}
