//! Connecting handles.
//!
//! [`use_connection_handle`] turns a press on a handle into an in-progress
//! connection, tracks the closest valid handle under the pointer and emits
//! `connect` when the pointer is released over one. Whether a candidate is
//! acceptable is decided by the connection mode, the node's connectable flag,
//! an optional [`ConnectionValidator`] and the store's `is_valid_connection`.

use crate::connections::{ConnectionInProgress, ConnectionMode};
use crate::edges::{connection_exists, Connection};
use crate::errors::FlowError;
use crate::events::{InputEvents, ListenerGuard, PointerEvent, PointerEventKind, PointerTarget};
use crate::geometry::{point_to_renderer_point, renderer_point_to_point, XYPosition};
use crate::lookup::NodeLookup;
use crate::nodes::{ElementData, HandleElement, HandleType};
use crate::state::FlowState;
use crate::store::{ConnectStart, FlowStore};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Validation
// ============================================================================

/// Result of connection validation with optional rejection reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Combine two results (AND logic): returns first error if any
    pub fn and(self, other: ValidationResult) -> ValidationResult {
        match self {
            ValidationResult::Valid => other,
            invalid => invalid,
        }
    }
}

/// Reasons why a connection was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Cannot connect a handle to itself
    SameHandle,
    /// Strict mode only joins a source to a target
    IncompatibleDirection,
    /// The node under the pointer does not accept connections
    NotConnectable(String),
    /// An edge between these handles already exists
    DuplicateEdge,
    /// Rejected by the store's `is_valid_connection`
    Rejected,
    Custom(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SameHandle => write!(f, "Cannot connect a handle to itself"),
            Self::IncompatibleDirection => write!(f, "Must connect a source to a target"),
            Self::NotConnectable(id) => write!(f, "Node {} is not connectable", id),
            Self::DuplicateEdge => write!(f, "Edge already exists"),
            Self::Rejected => write!(f, "Connection rejected"),
            Self::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

/// Custom rule for accepting a connection.
///
/// # Example
///
/// ```ignore
/// struct NoSelfLoops;
///
/// impl<ND, ED> ConnectionValidator<ND, ED> for NoSelfLoops {
///     fn validate(&self, connection: &Connection, _state: &FlowState<ND, ED>) -> ValidationResult {
///         if connection.source == connection.target {
///             ValidationResult::Invalid(ValidationError::Custom("no self loops".into()))
///         } else {
///             ValidationResult::Valid
///         }
///     }
/// }
/// ```
pub trait ConnectionValidator<ND = Value, ED = Value> {
    fn validate(&self, connection: &Connection, state: &FlowState<ND, ED>) -> ValidationResult;
}

/// Rejects connections that an existing edge already makes.
#[derive(Clone, Debug, Default)]
pub struct NoDuplicatesValidator;

impl<ND, ED> ConnectionValidator<ND, ED> for NoDuplicatesValidator {
    fn validate(&self, connection: &Connection, state: &FlowState<ND, ED>) -> ValidationResult {
        if connection_exists(connection, &state.edges) {
            ValidationResult::Invalid(ValidationError::DuplicateEdge)
        } else {
            ValidationResult::Valid
        }
    }
}

/// All validators must accept (AND logic); the first error wins.
pub struct CompositeValidator<ND = Value, ED = Value> {
    validators: Vec<Box<dyn ConnectionValidator<ND, ED>>>,
}

impl<ND, ED> Default for CompositeValidator<ND, ED> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ND, ED> CompositeValidator<ND, ED> {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    /// Validators are checked in the order they were added.
    pub fn add<V: ConnectionValidator<ND, ED> + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }
}

impl<ND, ED> ConnectionValidator<ND, ED> for CompositeValidator<ND, ED> {
    fn validate(&self, connection: &Connection, state: &FlowState<ND, ED>) -> ValidationResult {
        for v in &self.validators {
            let result = v.validate(connection, state);
            if !result.is_valid() {
                return result;
            }
        }
        ValidationResult::Valid
    }
}

// ============================================================================
// Handle lookup
// ============================================================================

/// A handle next to the pointer, with its anchor in flow space.
#[derive(Clone, Debug, PartialEq)]
pub struct HandleCandidate {
    pub handle: HandleElement,
    pub position: XYPosition,
}

/// The closest handle within `radius` of `position`, ignoring `from`
/// itself. On a tie a handle of the opposite type wins.
pub fn get_closest_handle<D>(
    position: XYPosition,
    radius: f32,
    lookup: &NodeLookup<D>,
    from: &HandleElement,
) -> Option<HandleCandidate> {
    let mut closest: Vec<HandleCandidate> = Vec::new();
    let mut min_distance = f32::INFINITY;

    for node in lookup.values() {
        let Some(bounds) = &node.internals.handle_bounds else {
            continue;
        };
        for handle in bounds.source.iter().chain(bounds.target.iter()) {
            if handle.node_id == from.node_id && handle.handle_type == from.handle_type && handle.id == from.id {
                continue;
            }
            let anchor = handle.absolute_position(node.internals.position_absolute, true);
            let distance = anchor.distance_to(position);
            if distance > radius {
                continue;
            }
            let candidate = HandleCandidate {
                handle: handle.clone(),
                position: anchor,
            };
            if distance < min_distance {
                closest = vec![candidate];
                min_distance = distance;
            } else if distance == min_distance {
                closest.push(candidate);
            }
        }
    }

    if closest.len() > 1 {
        let opposite = from.handle_type.opposite();
        if let Some(index) = closest.iter().position(|c| c.handle.handle_type == opposite) {
            return Some(closest.swap_remove(index));
        }
    }
    closest.into_iter().next()
}

/// The connection joining `from` to `to`, oriented source -> target.
pub fn connection_between(from: &HandleElement, to: &HandleElement) -> Connection {
    let (source, target) = match from.handle_type {
        HandleType::Target => (to, from),
        HandleType::Source => (from, to),
    };
    Connection {
        source: source.node_id.clone(),
        target: target.node_id.clone(),
        source_handle: source.id.clone(),
        target_handle: target.id.clone(),
    }
}

/// Whether `to` may be joined to `from` under the store's rules.
pub fn validate_handle<ND: ElementData, ED: ElementData>(
    from: &HandleElement,
    to: &HandleElement,
    state: &FlowState<ND, ED>,
) -> ValidationResult {
    let connectable = state
        .node_lookup
        .get(&to.node_id)
        .map_or(false, |n| n.is_connectable(state.nodes_connectable));
    if !connectable {
        return ValidationResult::Invalid(ValidationError::NotConnectable(to.node_id.clone()));
    }
    match state.connection_mode {
        ConnectionMode::Strict if to.handle_type == from.handle_type => {
            ValidationResult::Invalid(ValidationError::IncompatibleDirection)
        }
        ConnectionMode::Loose if to.node_id == from.node_id && to.id == from.id => {
            ValidationResult::Invalid(ValidationError::SameHandle)
        }
        _ => ValidationResult::Valid,
    }
}

// ============================================================================
// Controller
// ============================================================================

struct ActiveConnection {
    from: HandleElement,
    anchor: XYPosition,
    connection: Option<Connection>,
}

struct HandleController<ND, ED> {
    store: FlowStore<ND, ED>,
    validator: Option<Rc<dyn ConnectionValidator<ND, ED>>>,
    active: Option<ActiveConnection>,
}

/// A mounted connection controller. Dropping it detaches its listener.
pub struct ConnectionHandle<ND = Value, ED = Value> {
    controller: Rc<RefCell<HandleController<ND, ED>>>,
    _guard: ListenerGuard,
}

pub fn use_connection_handle<ND: ElementData, ED: ElementData>(
    store: &FlowStore<ND, ED>,
    events: &InputEvents,
    validator: Option<Rc<dyn ConnectionValidator<ND, ED>>>,
) -> ConnectionHandle<ND, ED> {
    let controller = Rc::new(RefCell::new(HandleController {
        store: store.clone(),
        validator,
        active: None,
    }));
    let guard = {
        let controller = controller.clone();
        events.pointer.add(move |event| on_pointer(&controller, event))
    };
    ConnectionHandle {
        controller,
        _guard: guard,
    }
}

impl<ND: ElementData, ED: ElementData> ConnectionHandle<ND, ED> {
    pub fn is_connecting(&self) -> bool {
        self.controller.borrow().active.is_some()
    }
}

fn on_pointer<ND: ElementData, ED: ElementData>(
    controller: &Rc<RefCell<HandleController<ND, ED>>>,
    event: &PointerEvent,
) {
    match event.kind {
        PointerEventKind::Down => on_down(controller, event),
        PointerEventKind::Move => on_move(controller, event),
        PointerEventKind::Up => on_up(controller, true),
        PointerEventKind::Cancel => on_up(controller, false),
    }
}

fn on_down<ND: ElementData, ED: ElementData>(
    controller: &Rc<RefCell<HandleController<ND, ED>>>,
    event: &PointerEvent,
) {
    let PointerTarget::Handle {
        node_id,
        handle_type,
        handle_id,
    } = &event.target
    else {
        return;
    };
    let store = controller.borrow().store.clone();

    let found = store.read(|s| -> Result<Option<(HandleElement, XYPosition)>, FlowError> {
        let node = s.node_lookup.get(node_id).ok_or_else(|| FlowError::NodeNotFound { id: node_id.clone() })?;
        if !node.is_connectable(s.nodes_connectable) {
            return Ok(None);
        }
        let handle = node
            .internals
            .handle_bounds
            .as_ref()
            .and_then(|bounds| bounds.find(*handle_type, handle_id.as_deref()))
            .cloned()
            .ok_or_else(|| FlowError::HandleNotFound {
                handle_type: handle_type.as_str(),
                handle_id: handle_id.clone().unwrap_or_default(),
                edge_id: String::new(),
            })?;
        let anchor = handle.absolute_position(node.internals.position_absolute, false);
        Ok(Some((handle, anchor)))
    });
    let (handle, anchor) = match found {
        Ok(Some(found)) => found,
        Ok(None) => return,
        Err(err) => {
            store.report_error(&err);
            return;
        }
    };

    controller.borrow_mut().active = Some(ActiveConnection {
        from: handle.clone(),
        anchor,
        connection: None,
    });
    store.update_connection(ConnectionInProgress {
        from_node: node_id.clone(),
        from_handle: handle,
        from: anchor,
        to: event.position,
        to_handle: None,
        to_node: None,
        is_valid: None,
        pointer: event.position,
    });
    store.events().connect_start.emit(&ConnectStart {
        node_id: node_id.clone(),
        handle_id: handle_id.clone(),
        handle_type: *handle_type,
    });
}

fn on_move<ND: ElementData, ED: ElementData>(
    controller: &Rc<RefCell<HandleController<ND, ED>>>,
    event: &PointerEvent,
) {
    let (store, from, anchor, validator) = {
        let ctrl = controller.borrow();
        let Some(active) = &ctrl.active else {
            return;
        };
        (ctrl.store.clone(), active.from.clone(), active.anchor, ctrl.validator.clone())
    };
    let is_valid_connection = store.is_valid_connection();

    let (candidate, connection, is_valid) = store.read(|s| {
        let pointer = point_to_renderer_point(event.position, s.viewport, false, s.snap_grid);
        let Some(candidate) = get_closest_handle(pointer, s.connection_radius, &s.node_lookup, &from) else {
            return (None, None, None);
        };
        let connection = connection_between(&from, &candidate.handle);
        let mut result = validate_handle(&from, &candidate.handle, s);
        if let Some(validator) = &validator {
            result = result.and(validator.validate(&connection, s));
        }
        if result.is_valid() {
            if let Some(is_valid_connection) = &is_valid_connection {
                if !is_valid_connection(&connection) {
                    result = ValidationResult::Invalid(ValidationError::Rejected);
                }
            }
        }
        (Some(candidate), Some(connection), Some(result.is_valid()))
    });

    let viewport = store.read(|s| s.viewport);
    // Snap the end point onto a valid candidate
    let to = match (&candidate, is_valid) {
        (Some(candidate), Some(true)) => renderer_point_to_point(candidate.position, viewport),
        _ => event.position,
    };

    if let Some(active) = controller.borrow_mut().active.as_mut() {
        active.connection = connection.filter(|_| is_valid == Some(true));
    }
    store.update_connection(ConnectionInProgress {
        from_node: from.node_id.clone(),
        from_handle: from,
        from: anchor,
        to,
        to_node: candidate.as_ref().map(|c| c.handle.node_id.clone()),
        to_handle: candidate.map(|c| c.handle),
        is_valid,
        pointer: event.position,
    });
}

fn on_up<ND: ElementData, ED: ElementData>(controller: &Rc<RefCell<HandleController<ND, ED>>>, commit: bool) {
    let (store, active) = {
        let mut ctrl = controller.borrow_mut();
        let Some(active) = ctrl.active.take() else {
            return;
        };
        (ctrl.store.clone(), active)
    };
    let connection = active.connection.filter(|_| commit);
    if let Some(connection) = &connection {
        tracing::trace!(source = %connection.source, target = %connection.target, "flow: connect");
        store.events().connect.emit(connection);
    }
    store.events().connect_end.emit(&connection);
    store.cancel_connection();
}
