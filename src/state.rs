use crate::config::{default_multi_selection_key, FlowOptions, DEFAULT_DELETE_KEY};
use crate::connections::{update_connection_lookup, ConnectionLookup, ConnectionMode, ConnectionState, EdgeLookup};
use crate::edges::Edge;
use crate::errors::FlowError;
use crate::geometry::{get_viewport_for_bounds, CoordinateExtent, NodeOrigin, SnapGrid, Viewport};
use crate::lookup::{adopt_user_nodes, AdoptOptions, NodeLookup, ParentLookup};
use crate::nodes::{get_internal_nodes_bounds, ElementData, Node};
use crate::viewport::FitViewOptions;
use serde_json::Value;

/// Progress of the one-time fit-view requested by `fit_view_on_init`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitViewState {
    #[default]
    NotDone,
    Done,
}

/// Everything the store knows about a flow.
///
/// `nodes` / `edges` are the collections as the host supplied them; the
/// lookups are derived from them and only ever rebuilt by the store.
#[derive(Clone, Debug)]
pub struct FlowState<ND = Value, ED = Value> {
    pub nodes: Vec<Node<ND>>,
    pub edges: Vec<Edge<ED>>,
    pub node_lookup: NodeLookup<ND>,
    pub parent_lookup: ParentLookup,
    pub edge_lookup: EdgeLookup<ED>,
    pub connection_lookup: ConnectionLookup,

    pub viewport: Viewport,
    pub width: f32,
    pub height: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub translate_extent: CoordinateExtent,
    pub node_extent: CoordinateExtent,
    pub node_origin: NodeOrigin,
    pub snap_to_grid: bool,
    pub snap_grid: SnapGrid,

    /// The store owns the nodes and applies changes itself.
    pub has_default_nodes: bool,
    pub has_default_edges: bool,

    pub fit_view_on_init: bool,
    pub fit_view_options: FitViewOptions,
    pub fit_view_state: FitViewState,
    pub nodes_initialized: bool,
    pub viewport_initialized: bool,

    pub multi_selection_active: bool,
    pub nodes_selection_active: bool,
    pub user_selection_active: bool,
    /// A node drag is in progress.
    pub dragging: bool,
    pub pane_dragging: bool,

    pub connection: ConnectionState,
    pub connection_mode: ConnectionMode,
    pub connection_radius: f32,

    pub nodes_draggable: bool,
    pub nodes_connectable: bool,
    pub elements_selectable: bool,
    pub select_nodes_on_drag: bool,
    pub elevate_nodes_on_select: bool,
    pub elevate_edges_on_select: bool,
    pub node_drag_threshold: f32,
    pub only_render_visible_elements: bool,

    /// `None` disables the key.
    pub delete_key_code: Option<String>,
    pub multi_selection_key_code: Option<String>,

    pub debug: bool,
}

impl<ND, ED> Default for FlowState<ND, ED> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            node_lookup: NodeLookup::default(),
            parent_lookup: ParentLookup::default(),
            edge_lookup: EdgeLookup::default(),
            connection_lookup: ConnectionLookup::default(),
            viewport: Viewport::default(),
            width: 0.0,
            height: 0.0,
            min_zoom: 0.5,
            max_zoom: 2.0,
            translate_extent: CoordinateExtent::INFINITE,
            node_extent: CoordinateExtent::INFINITE,
            node_origin: [0.0, 0.0],
            snap_to_grid: false,
            snap_grid: [15.0, 15.0],
            has_default_nodes: false,
            has_default_edges: false,
            fit_view_on_init: false,
            fit_view_options: FitViewOptions::default(),
            fit_view_state: FitViewState::NotDone,
            nodes_initialized: false,
            viewport_initialized: false,
            multi_selection_active: false,
            nodes_selection_active: false,
            user_selection_active: false,
            dragging: false,
            pane_dragging: false,
            connection: ConnectionState::Idle,
            connection_mode: ConnectionMode::Strict,
            connection_radius: 20.0,
            nodes_draggable: true,
            nodes_connectable: true,
            elements_selectable: true,
            select_nodes_on_drag: true,
            elevate_nodes_on_select: true,
            elevate_edges_on_select: false,
            node_drag_threshold: 1.0,
            only_render_visible_elements: false,
            delete_key_code: Some(DEFAULT_DELETE_KEY.to_string()),
            multi_selection_key_code: Some(default_multi_selection_key().to_string()),
            debug: false,
        }
    }
}

impl<ND: ElementData, ED: ElementData> FlowState<ND, ED> {
    /// Initial state for a flow created with `options`.
    ///
    /// With `fit_view_on_init` and a known pane size the initial viewport
    /// already frames every node that has a size.
    pub fn from_options(options: &FlowOptions<ND, ED>, on_error: &mut dyn FnMut(FlowError)) -> Self {
        let mut state = Self::default();
        state.apply_options(options, on_error);

        if state.fit_view_on_init && state.width > 0.0 && state.height > 0.0 {
            let sized = state.node_lookup.values().filter(|node| {
                node.width.or(node.initial_width).is_some() && node.height.or(node.initial_height).is_some()
            });
            let bounds = get_internal_nodes_bounds(sized);
            if bounds.width > 0.0 && bounds.height > 0.0 {
                let fit = &state.fit_view_options;
                state.viewport = get_viewport_for_bounds(
                    &bounds,
                    state.width,
                    state.height,
                    fit.min_zoom.unwrap_or(state.min_zoom),
                    fit.max_zoom.unwrap_or(state.max_zoom),
                    fit.padding,
                );
            }
        }
        state
    }

    /// Apply every option that is set. Collections are adopted last so they
    /// see the new origin and extent.
    pub fn apply_options(&mut self, options: &FlowOptions<ND, ED>, on_error: &mut dyn FnMut(FlowError)) {
        macro_rules! set_if_some {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = options.$field.clone() {
                    self.$field = value;
                })*
            };
        }
        set_if_some!(
            width,
            height,
            fit_view_on_init,
            fit_view_options,
            node_origin,
            node_extent,
            min_zoom,
            max_zoom,
            translate_extent,
            snap_to_grid,
            snap_grid,
            nodes_draggable,
            nodes_connectable,
            elements_selectable,
            select_nodes_on_drag,
            elevate_nodes_on_select,
            elevate_edges_on_select,
            connection_mode,
            connection_radius,
            node_drag_threshold,
            only_render_visible_elements,
            debug,
        );
        if let Some(viewport) = options.default_viewport {
            self.viewport = viewport;
        }
        if let Some(key) = &options.delete_key_code {
            self.delete_key_code = Some(key.clone());
        }
        if let Some(key) = &options.multi_selection_key_code {
            self.multi_selection_key_code = Some(key.clone());
        }
        self.viewport.zoom = crate::geometry::clamp(self.viewport.zoom, self.min_zoom, self.max_zoom);

        if let Some(edges) = &options.default_edges {
            self.has_default_edges = true;
            self.set_edges(edges.clone());
        } else if let Some(edges) = &options.edges {
            self.set_edges(edges.clone());
        }
        if let Some(nodes) = &options.default_nodes {
            self.has_default_nodes = true;
            self.set_nodes(nodes.clone(), on_error);
        } else if let Some(nodes) = &options.nodes {
            self.set_nodes(nodes.clone(), on_error);
        }
    }

    pub fn adopt_options(&self) -> AdoptOptions {
        AdoptOptions {
            node_origin: self.node_origin,
            node_extent: self.node_extent,
            elevate_nodes_on_select: self.elevate_nodes_on_select,
            check_equality: true,
        }
    }

    /// Replace the nodes and re-adopt them into the lookups.
    pub fn set_nodes(&mut self, nodes: Vec<Node<ND>>, on_error: &mut dyn FnMut(FlowError)) {
        let options = self.adopt_options();
        self.nodes_initialized = adopt_user_nodes(
            &nodes,
            &mut self.node_lookup,
            &mut self.parent_lookup,
            &options,
            on_error,
        );
        self.nodes = nodes;
    }

    /// Replace the edges and rebuild the edge and connection lookups.
    pub fn set_edges(&mut self, edges: Vec<Edge<ED>>) {
        update_connection_lookup(&mut self.connection_lookup, &mut self.edge_lookup, &edges);
        self.edges = edges;
    }

    /// Whether every visible node in the lookup has been measured.
    pub fn all_nodes_measured(&self) -> bool {
        self.node_lookup.values().all(|node| node.hidden || node.is_measured())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::XYPosition;

    type State = FlowState<(), ()>;

    fn from_options(options: FlowOptions<(), ()>) -> (State, Vec<FlowError>) {
        let mut errors = Vec::new();
        let state = FlowState::from_options(&options, &mut |e| errors.push(e));
        (state, errors)
    }

    // ========================================================================
    // Defaults
    // ========================================================================

    #[test]
    fn test_default_state() {
        let state = State::default();
        assert_eq!(state.min_zoom, 0.5);
        assert_eq!(state.max_zoom, 2.0);
        assert!(state.translate_extent.is_infinite());
        assert_eq!(state.snap_grid, [15.0, 15.0]);
        assert_eq!(state.connection_radius, 20.0);
        assert_eq!(state.node_drag_threshold, 1.0);
        assert_eq!(state.delete_key_code.as_deref(), Some("Backspace"));
        assert_eq!(state.fit_view_state, FitViewState::NotDone);
        assert!(state.elevate_nodes_on_select);
        assert!(!state.elevate_edges_on_select);
        assert!(!state.has_default_nodes);
    }

    // ========================================================================
    // from_options()
    // ========================================================================

    #[test]
    fn test_default_collections_enable_self_managed_mode() {
        let (state, errors) = from_options(
            FlowOptions::new()
                .with_default_nodes(vec![Node::new("a", XYPosition::default(), ())])
                .with_edges(vec![Edge::new("e", "a", "b")]),
        );
        assert!(errors.is_empty());
        assert!(state.has_default_nodes);
        assert!(!state.has_default_edges);
        assert!(state.node_lookup.contains_key("a"));
        assert!(state.edge_lookup.contains_key("e"));
    }

    #[test]
    fn test_missing_parent_is_reported() {
        let (state, errors) = from_options(
            FlowOptions::new().with_nodes(vec![Node::new("a", XYPosition::default(), ()).with_parent("ghost")]),
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "029");
        assert!(state.node_lookup.contains_key("a"));
    }

    #[test]
    fn test_initial_fit_view_uses_node_sizes() {
        let (state, _) = from_options(
            FlowOptions::new()
                .with_nodes(vec![
                    Node::new("a", XYPosition::new(0.0, 0.0), ()).with_size(100.0, 100.0),
                    Node::new("b", XYPosition::new(100.0, 0.0), ()).with_size(100.0, 100.0),
                ])
                .with_size(1000.0, 1000.0)
                .with_fit_view_on_init(true),
        );
        // Bounds 200x100 centered at (100, 50), zoom capped at 2
        assert_eq!(state.viewport, Viewport::new(500.0 - 200.0, 500.0 - 100.0, 2.0));
    }

    #[test]
    fn test_initial_fit_view_respects_zoom_range() {
        let (state, _) = from_options(
            FlowOptions::new()
                .with_nodes(vec![Node::new("a", XYPosition::new(0.0, 0.0), ()).with_size(10.0, 10.0)])
                .with_size(1000.0, 1000.0)
                .with_zoom_range(0.1, 1.0)
                .with_fit_view_on_init(true),
        );
        assert_eq!(state.viewport.zoom, 1.0);
        // Node center (5, 5) lands on the pane center
        assert_eq!(state.viewport, Viewport::new(495.0, 495.0, 1.0));
    }

    #[test]
    fn test_initial_fit_view_uses_fit_view_padding() {
        let mut options = FlowOptions::<(), ()>::new()
            .with_nodes(vec![Node::new("a", XYPosition::new(0.0, 0.0), ()).with_size(1000.0, 1000.0)])
            .with_size(1000.0, 1000.0)
            .with_fit_view_on_init(true);
        options.fit_view_options = Some(FitViewOptions::default().with_padding(0.0));
        let (state, _) = from_options(options);
        assert_eq!(state.viewport, Viewport::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_initial_fit_view_needs_pane_size() {
        let (state, _) = from_options(
            FlowOptions::new()
                .with_nodes(vec![Node::new("a", XYPosition::new(50.0, 50.0), ()).with_size(10.0, 10.0)])
                .with_fit_view_on_init(true),
        );
        assert_eq!(state.viewport, Viewport::default());
    }

    #[test]
    fn test_default_viewport_zoom_is_clamped() {
        let mut options = FlowOptions::<(), ()>::new().with_zoom_range(0.5, 1.5);
        options.default_viewport = Some(Viewport::new(10.0, 10.0, 4.0));
        let (state, _) = from_options(options);
        assert_eq!(state.viewport, Viewport::new(10.0, 10.0, 1.5));
    }

    #[test]
    fn test_all_nodes_measured_ignores_hidden() {
        let (state, _) = from_options(FlowOptions::new().with_nodes(vec![
            Node::new("a", XYPosition::default(), ()).with_measured(10.0, 10.0),
            Node::new("b", XYPosition::default(), ()).with_hidden(true),
        ]));
        assert!(state.all_nodes_measured());
        assert!(state.nodes_initialized);
    }
}
