//! High-level controller wiring a flow to a Slint window.
//!
//! The [`FlowController`] reduces boilerplate by owning the measurement
//! tracker and the interaction controllers (drag, connection, keys, resize)
//! of one [`Flow`], and by handing out ready-made closures for the window's
//! callbacks.
//!
//! # Example
//!
//! ```ignore
//! use slint_flow::{Flow, FlowController, FlowOptions};
//!
//! slint::include_modules!();
//!
//! fn main() {
//!     let window = MainWindow::new().unwrap();
//!     let flow = Flow::new(FlowOptions::new().with_default_nodes(nodes).with_fit_view_on_init(true));
//!     let ctrl = FlowController::new(&flow);
//!
//!     // Measurements reported by the node and handle components
//!     window.on_node_size_changed(ctrl.node_size_callback());
//!     window.on_handle_reported(ctrl.handle_callback());
//!     window.on_pane_geometry_changed(ctrl.pane_geometry_callback());
//!
//!     // Pointer input, pane-relative coordinates
//!     window.on_node_pointer_down(ctrl.node_pointer_down_callback());
//!     window.on_handle_pointer_down(ctrl.handle_pointer_down_callback());
//!     window.on_pointer_moved(ctrl.pointer_moved_callback());
//!     window.on_pointer_released(ctrl.pointer_released_callback());
//!     window.on_pane_clicked(ctrl.pane_clicked_callback());
//!
//!     // Keyboard and viewport
//!     window.on_key_pressed(ctrl.key_pressed_callback());
//!     window.on_key_released(ctrl.key_released_callback());
//!     window.on_viewport_changed(ctrl.viewport_changed_callback());
//!
//!     ctrl.mount();
//!     window.run().unwrap();
//!     ctrl.unmount();
//! }
//! ```

use crate::batch::Flow;
use crate::drag::{use_drag, use_move_selected_nodes, DragOptions, NodeDrag};
use crate::events::{
    InputEvents, KeyEventKind, KeyboardEvent, Modifiers, PointerEvent, PointerEventKind, PointerTarget,
    WindowEvent,
};
use crate::geometry::{Rect, Viewport, XYPosition};
use crate::handle::{use_connection_handle, ConnectionHandle};
use crate::hooks::{use_resize_handler, ResizeHandler, ResizeHandlers};
use crate::instance::FlowInstance;
use crate::keyboard::{use_global_key_handler, GlobalKeyHandler};
use crate::nodes::{ElementData, HandleType};
use crate::store::{FlowStore, Subscription, UpdateNodeInternalsParams};
use crate::tracking::{MeasurementTracker, Surface};
use crate::viewport::PanZoomController;
use serde_json::Value;
use slint::platform::Key;
use slint::SharedString;
use std::cell::RefCell;
use std::rc::Rc;

/// Guards of a mounted controller.
struct Mounted<ND, ED> {
    drag: NodeDrag<ND, ED>,
    _connection: ConnectionHandle<ND, ED>,
    _keys: GlobalKeyHandler,
    _resize: ResizeHandler,
    _zoom_sync: Subscription,
}

/// Controller that owns a flow's interaction state and provides callback
/// implementations.
///
/// Clone this controller to share it across callbacks.
#[derive(Clone)]
pub struct FlowController<ND = Value, ED = Value> {
    instance: FlowInstance<ND, ED>,
    events: InputEvents,
    tracker: MeasurementTracker,
    modifiers: Rc<RefCell<Modifiers>>,
    mounted: Rc<RefCell<Option<Mounted<ND, ED>>>>,
}

impl<ND: ElementData, ED: ElementData> FlowController<ND, ED> {
    pub fn new(flow: &Flow<ND, ED>) -> Self {
        Self {
            instance: flow.instance(),
            events: flow.events().clone(),
            tracker: MeasurementTracker::new(),
            modifiers: Rc::new(RefCell::new(Modifiers::default())),
            mounted: Rc::new(RefCell::new(None)),
        }
    }

    pub fn store(&self) -> &FlowStore<ND, ED> {
        self.instance.store()
    }

    pub fn instance(&self) -> &FlowInstance<ND, ED> {
        &self.instance
    }

    pub fn tracker(&self) -> &MeasurementTracker {
        &self.tracker
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.borrow().is_some()
    }

    /// Attach the surface and pan/zoom and start the interaction
    /// controllers. Mounting twice does nothing.
    pub fn mount(&self) {
        if self.is_mounted() {
            return;
        }
        let store = self.store().clone();
        store.attach_surface(Rc::new(self.tracker.clone()));

        let zoom_sync = {
            let tracker = self.tracker.clone();
            tracker.set_zoom(store.read(|s| s.viewport.zoom));
            store.subscribe(move |store| tracker.set_zoom(store.read(|s| s.viewport.zoom)))
        };
        let mounted = Mounted {
            drag: use_drag(&store, &self.events, DragOptions::default()),
            _connection: use_connection_handle(&store, &self.events, None),
            _keys: use_global_key_handler(&self.instance, &self.events),
            _resize: use_resize_handler(&store, &self.events, ResizeHandlers::default()),
            _zoom_sync: zoom_sync,
        };
        *self.mounted.borrow_mut() = Some(mounted);

        // Geometry reported before mounting had no resize listener yet
        let bounds = self.tracker.bounds();
        if bounds.width > 0.0 && bounds.height > 0.0 {
            store.set_dimensions(bounds.width, bounds.height);
        }
        store.attach_pan_zoom(Box::new(PanZoomController::default()));
        tracing::debug!("flow: controller mounted");
    }

    /// Release every listener and detach from the store. Events dispatched
    /// afterwards reach nothing.
    pub fn unmount(&self) {
        let Some(mounted) = self.mounted.borrow_mut().take() else {
            return;
        };
        mounted.drag.cancel();
        drop(mounted);
        let store = self.store();
        store.cancel_connection();
        store.detach_pan_zoom();
        store.detach_surface();
        self.tracker.clear();
        tracing::debug!("flow: controller unmounted");
    }

    // === Callback factories ===

    /// Returns a callback for node size reports: `(node_id, width, height)`.
    pub fn node_size_callback(&self) -> impl Fn(SharedString, f32, f32) + Clone {
        let tracker = self.tracker.clone();
        let store = self.store().clone();
        move |id, width, height| {
            tracker.report_node_size(id.as_str(), width, height);
            store.update_node_internals(&[id.to_string()], UpdateNodeInternalsParams::default());
        }
    }

    /// Returns a callback for handle reports, see
    /// [`MeasurementTracker::handle_callback`] for the arguments.
    #[allow(clippy::type_complexity)]
    pub fn handle_callback(&self) -> impl Fn(SharedString, SharedString, i32, i32, f32, f32, f32, f32) + Clone {
        let report = self.tracker.handle_callback();
        let store = self.store().clone();
        move |node_id, handle_id, handle_type, position, x, y, width, height| {
            let id = node_id.to_string();
            report(node_id, handle_id, handle_type, position, x, y, width, height);
            store.update_node_internals(
                &[id],
                UpdateNodeInternalsParams {
                    force: true,
                    ..Default::default()
                },
            );
        }
    }

    /// Returns a callback for the pane's geometry: `(x, y, width, height)`
    /// in window coordinates.
    pub fn pane_geometry_callback(&self) -> impl Fn(f32, f32, f32, f32) + Clone {
        let tracker = self.tracker.clone();
        let events = self.events.clone();
        move |x, y, width, height| {
            tracker.set_bounds(Rect::new(x, y, width, height));
            events.window.emit(&WindowEvent::Resized { width, height });
        }
    }

    /// Returns a callback for presses on a node: `(node_id, x, y)`.
    pub fn node_pointer_down_callback(&self) -> impl Fn(SharedString, f32, f32) + Clone {
        let this = self.clone();
        move |node_id, x, y| {
            this.dispatch_pointer(PointerEventKind::Down, x, y, PointerTarget::Node(node_id.to_string()));
        }
    }

    /// Returns a callback for presses on a handle:
    /// `(node_id, handle_id, handle_type, x, y)`. `handle_type` is 0 for
    /// source; an empty `handle_id` means the handle has no id.
    pub fn handle_pointer_down_callback(&self) -> impl Fn(SharedString, SharedString, i32, f32, f32) + Clone {
        let this = self.clone();
        move |node_id, handle_id, handle_type, x, y| {
            let target = PointerTarget::Handle {
                node_id: node_id.to_string(),
                handle_type: if handle_type == 0 {
                    HandleType::Source
                } else {
                    HandleType::Target
                },
                handle_id: (!handle_id.is_empty()).then(|| handle_id.to_string()),
            };
            this.dispatch_pointer(PointerEventKind::Down, x, y, target);
        }
    }

    pub fn pointer_moved_callback(&self) -> impl Fn(f32, f32) + Clone {
        let this = self.clone();
        move |x, y| this.dispatch_pointer(PointerEventKind::Move, x, y, PointerTarget::Pane)
    }

    pub fn pointer_released_callback(&self) -> impl Fn(f32, f32) + Clone {
        let this = self.clone();
        move |x, y| this.dispatch_pointer(PointerEventKind::Up, x, y, PointerTarget::Pane)
    }

    /// Returns a callback for a click on the empty pane: clears the
    /// selection.
    pub fn pane_clicked_callback(&self) -> impl Fn() + Clone {
        let store = self.store().clone();
        move || {
            if store.read(|s| s.elements_selectable) {
                store.reset_selected_elements();
                store.set_state(|s| s.nodes_selection_active = false);
            }
        }
    }

    /// Returns a callback for key presses: `(text, shift, control, alt, meta)`
    /// with Slint's key text.
    pub fn key_pressed_callback(&self) -> impl Fn(SharedString, bool, bool, bool, bool) + Clone {
        let this = self.clone();
        move |text, shift, control, alt, meta| {
            let modifiers = Modifiers {
                shift,
                control,
                alt,
                meta,
            };
            this.dispatch_key(KeyEventKind::Down, &text, modifiers);
        }
    }

    pub fn key_released_callback(&self) -> impl Fn(SharedString, bool, bool, bool, bool) + Clone {
        let this = self.clone();
        move |text, shift, control, alt, meta| {
            let modifiers = Modifiers {
                shift,
                control,
                alt,
                meta,
            };
            this.dispatch_key(KeyEventKind::Up, &text, modifiers);
        }
    }

    /// Returns a callback for window focus changes. Losing focus resets
    /// held keys.
    pub fn focus_changed_callback(&self) -> impl Fn(bool) + Clone {
        let events = self.events.clone();
        move |focused| {
            if !focused {
                events.window.emit(&WindowEvent::Blur);
            }
        }
    }

    pub fn viewport_gesture_started_callback(&self) -> impl Fn() + Clone {
        let store = self.store().clone();
        move || store.start_viewport_gesture()
    }

    /// Returns a callback for viewport changes made by the view:
    /// `(x, y, zoom)`.
    pub fn viewport_changed_callback(&self) -> impl Fn(f32, f32, f32) + Clone {
        let store = self.store().clone();
        move |x, y, zoom| {
            store.update_viewport_gesture(Viewport::new(x, y, zoom));
        }
    }

    pub fn viewport_gesture_ended_callback(&self) -> impl Fn() + Clone {
        let store = self.store().clone();
        move || store.end_viewport_gesture()
    }

    // === Direct handlers ===

    fn dispatch_pointer(&self, kind: PointerEventKind, x: f32, y: f32, target: PointerTarget) {
        if !self.is_mounted() {
            return;
        }
        let event = PointerEvent::new(kind, XYPosition::new(x, y))
            .on(target)
            .with_modifiers(*self.modifiers.borrow());
        self.events.pointer.emit(&event);
    }

    fn dispatch_key(&self, kind: KeyEventKind, text: &str, modifiers: Modifiers) {
        *self.modifiers.borrow_mut() = modifiers;
        if !self.is_mounted() {
            return;
        }
        let (key, code) = key_from_text(text);
        if kind == KeyEventKind::Down {
            if let Some(direction) = arrow_direction(&key) {
                let factor = if modifiers.shift { 4.0 } else { 1.0 };
                use_move_selected_nodes(self.store()).move_selected_nodes(direction, factor);
            }
        }
        let event = KeyboardEvent {
            kind,
            key,
            code,
            modifiers,
            in_input: false,
        };
        self.events.keyboard.emit(&event);
    }
}

const NAMED_KEYS: [(Key, &str); 13] = [
    (Key::Backspace, "Backspace"),
    (Key::Delete, "Delete"),
    (Key::Tab, "Tab"),
    (Key::Return, "Enter"),
    (Key::Escape, "Escape"),
    (Key::Shift, "Shift"),
    (Key::Control, "Control"),
    (Key::Alt, "Alt"),
    (Key::Meta, "Meta"),
    (Key::LeftArrow, "ArrowLeft"),
    (Key::RightArrow, "ArrowRight"),
    (Key::UpArrow, "ArrowUp"),
    (Key::DownArrow, "ArrowDown"),
];

/// Map Slint key text to a key name and a physical code.
pub fn key_from_text(text: &str) -> (String, String) {
    let mut chars = text.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return (text.to_string(), String::new());
    };
    for (key, name) in NAMED_KEYS {
        if char::from(key) == c {
            return (name.to_string(), name.to_string());
        }
    }
    let code = match c {
        ' ' => "Space".to_string(),
        'a'..='z' | 'A'..='Z' => format!("Key{}", c.to_ascii_uppercase()),
        '0'..='9' => format!("Digit{c}"),
        _ => String::new(),
    };
    (c.to_string(), code)
}

fn arrow_direction(key: &str) -> Option<XYPosition> {
    match key {
        "ArrowLeft" => Some(XYPosition::new(-1.0, 0.0)),
        "ArrowRight" => Some(XYPosition::new(1.0, 0.0)),
        "ArrowUp" => Some(XYPosition::new(0.0, -1.0)),
        "ArrowDown" => Some(XYPosition::new(0.0, 1.0)),
        _ => None,
    }
}
