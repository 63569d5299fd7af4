//! Error type and the advisory error channel.
//!
//! Two kinds of failures exist. Usage errors (a composable used without the
//! context it needs, a config that does not parse) are returned as
//! `Err(FlowError)`. Invalid references (an unknown node id, a child whose
//! parent is missing) are reported through the store's `on_error` handler
//! and the offending operation is skipped.

use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("{0} must be used within a flow provider")]
    MissingProvider(&'static str),

    #[error("invalid handle position")]
    InvalidHandlePosition,

    #[error("node {id} has extent \"parent\" but no parent node")]
    ParentExtentWithoutParent { id: String },

    #[error("couldn't create edge for {handle_type} handle id \"{handle_id}\", edge id: {edge_id}")]
    HandleNotFound {
        handle_type: &'static str,
        handle_id: String,
        edge_id: String,
    },

    #[error("edge {id} needs a source and a target node")]
    MissingEdgeEndpoint { id: String },

    #[error("node id is required when not used inside a node scope")]
    MissingNodeId,

    #[error("node {id} has not been measured yet")]
    NodeNotMeasured { id: String },

    #[error("parent node {parent_id} of node {id} not found")]
    ParentNotFound { id: String, parent_id: String },

    #[error("node {id} not found")]
    NodeNotFound { id: String },

    #[error("edge {id} not found")]
    EdgeNotFound { id: String },

    #[error("connection already exists")]
    ConnectionExists,

    #[error("invalid flow options: {0}")]
    Config(String),
}

impl FlowError {
    /// Stable error code, matching the numbering used by the wider xyflow
    /// ecosystem where one exists.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingProvider(_) => "001",
            Self::InvalidHandlePosition => "002",
            Self::ParentExtentWithoutParent { .. } => "005",
            Self::HandleNotFound { .. } => "008",
            Self::MissingEdgeEndpoint { .. } => "009",
            Self::MissingNodeId => "014",
            Self::NodeNotMeasured { .. } => "015",
            Self::ParentNotFound { .. } => "029",
            Self::NodeNotFound { .. } => "030",
            Self::EdgeNotFound { .. } => "031",
            Self::ConnectionExists => "032",
            Self::Config(_) => "C00",
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Handler receiving advisory errors: `(code, error)`.
pub type ErrorHandler = Rc<dyn Fn(&'static str, &FlowError)>;

/// Default `on_error`: log and carry on.
pub fn default_error_handler() -> ErrorHandler {
    Rc::new(|code, err| {
        tracing::warn!(code, error = %err, "flow: advisory error");
    })
}
