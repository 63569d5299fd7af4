//! # Slint Flow
//!
//! A reactive node/edge graph store with interaction controllers for
//! building flow editors in Slint: data flow diagrams, pipelines, state
//! machines and any other node-based interface.
//!
//! ## Features
//!
//! - **Generic Data** - Nodes and edges carry any `Clone + PartialEq` payload
//! - **Change Reducer** - Select, move, resize, add, remove and replace as data
//! - **Batched Updates** - Many updates in one tick become one commit
//! - **Controlled or Uncontrolled** - Own the arrays yourself or let the store do it
//! - **Interaction Controllers** - Node drag, connection drag, key combos, resize
//! - **Slint Integration** - Measurement tracking and `VecModel` synchronisation
//!
//! ## Quick Start
//!
//! ```ignore
//! use slint_flow::{Flow, FlowController, FlowOptions, Node, Edge, XYPosition};
//!
//! let flow: Flow = Flow::new(
//!     FlowOptions::new()
//!         .with_default_nodes(vec![
//!             Node::new("a", XYPosition::new(0.0, 0.0), serde_json::json!({ "label": "A" })),
//!             Node::new("b", XYPosition::new(200.0, 0.0), serde_json::json!({ "label": "B" })),
//!         ])
//!         .with_default_edges(vec![Edge::new("a-b", "a", "b")])
//!         .with_fit_view_on_init(true),
//! );
//!
//! let instance = flow.instance();
//! instance.update_node_data("a", |data| data["label"] = "Start".into());
//!
//! let ctrl = FlowController::new(&flow);
//! ctrl.mount();
//! ```
//!
//! ## Core Pieces
//!
//! - [`FlowStore`] - State, derived lookups and events of one flow
//! - [`Flow`] - Store plus the batching queues and input events
//! - [`FlowInstance`] - Imperative API: get, set, update, delete, query
//! - [`FlowController`] - Ready-made callbacks for a Slint window
//! - [`apply_node_changes`] / [`apply_edge_changes`] - The change reducer
//! - [`get_elements_diff_changes`] - Diff two node or edge arrays into changes
//!
//! Hooks such as [`use_nodes`], [`use_node_connections`] and
//! [`use_key_press`] return handles that stop listening when dropped.

pub mod geometry;
pub mod errors;
pub mod nodes;
pub mod edges;
pub mod changes;
pub mod selection;
pub mod connections;
pub mod lookup;
pub mod events;
pub mod config;
pub mod viewport;
pub mod state;
pub mod tracking;
pub mod store;
pub mod drag;
pub mod handle;
pub mod batch;
pub mod instance;
pub mod reactive;
pub mod hooks;
pub mod keyboard;
pub mod controller;

// Model
pub use geometry::{
    get_bounds_of_rects, get_overlapping_area, get_viewport_for_bounds, is_rect_intersecting,
    point_to_renderer_point, renderer_point_to_point, snap_position, CoordinateExtent, Dimensions, NodeOrigin,
    Rect, SnapGrid, Viewport, XYPosition,
};
pub use errors::{ErrorHandler, FlowError};
pub use nodes::{
    get_internal_nodes_bounds, get_nodes_inside, ElementData, HandleBounds, HandleElement, HandleType,
    InternalNode, Node, NodeExtent, Position,
};
pub use edges::{add_edge, connection_exists, get_connected_edges, Connection, Edge};
pub use changes::{
    apply_changes, apply_edge_changes, apply_node_changes, get_elements_diff_changes, Change, EdgeChange,
    NodeChange,
};
pub use selection::SelectionChange;
pub use connections::{ConnectionInProgress, ConnectionKey, ConnectionMode, ConnectionState, HandleConnection};
pub use lookup::{NodeLookup, ParentLookup};

// Store
pub use config::{FlowExport, FlowOptions};
pub use state::{FitViewState, FlowState};
pub use store::{
    BeforeDelete, ConnectStart, DeletedElements, FlowEvents, FlowStore, NodeDragEvent, Subscription,
    UpdateNodeInternalsParams,
};
pub use batch::{BatchContext, Flow, ManualScheduler, Queue, QueueItem, Scheduler, SlintScheduler};
pub use instance::{use_flow, FlowInstance, IntersectionTarget};

// Interaction
pub use events::{
    InputEvents, KeyEventKind, KeyboardEvent, ListenerGuard, Listeners, Modifiers, PointerEvent,
    PointerEventKind, PointerTarget, WindowEvent,
};
pub use viewport::{use_viewport_helper, FitViewOptions, PanZoom, PanZoomController, ViewportHelper};
pub use drag::{use_drag, use_move_selected_nodes, DragOptions, MoveSelectedNodes, NodeDrag};
pub use handle::{
    use_connection_handle, CompositeValidator, ConnectionHandle, ConnectionValidator, NoDuplicatesValidator,
    ValidationError, ValidationResult,
};
pub use keyboard::{use_global_key_handler, use_key_press, GlobalKeyHandler, KeyPress, KeyPressOptions};

// Hooks
pub use reactive::{bind_edges_model, bind_nodes_model, sync_model, use_store, Derived};
pub use hooks::{
    use_connection, use_edges, use_handle_connections, use_internal_node, use_node_connections, use_nodes,
    use_nodes_data, use_nodes_initialized, use_on_init_handler, use_on_selection_change, use_on_viewport_change,
    use_resize_handler, use_update_node_internals, use_viewport, use_visible_edge_ids, use_visible_node_ids,
    Connections, NodeConnectionsOptions, NodeData, NodeScope, ResizeHandler, ResizeHandlers,
    ViewportChangeHandlers,
};

// Slint
pub use tracking::{MeasurementTracker, Surface};
pub use controller::FlowController;
