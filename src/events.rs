//! Listener lists and the input events the interaction controllers consume.
//!
//! Every registration returns a [`ListenerGuard`]; dropping the guard
//! removes the listener. Composables keep their guards, so dropping a
//! composable detaches it from every event source it listened on.

use crate::geometry::XYPosition;
use crate::nodes::HandleType;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<E> = Rc<dyn Fn(&E)>;

struct ListenerList<E> {
    next_id: u64,
    entries: Vec<(u64, Handler<E>)>,
}

/// An ordered list of handlers for one event type.
pub struct Listeners<E> {
    inner: Rc<RefCell<ListenerList<E>>>,
}

impl<E> Clone for Listeners<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListenerList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call every handler in registration order.
    ///
    /// Handlers may register or remove listeners while running. A handler
    /// removed during dispatch is not called afterwards.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<(u64, Handler<E>)> = self.inner.borrow().entries.clone();
        for (id, handler) in snapshot {
            let live = self.inner.borrow().entries.iter().any(|(entry, _)| *entry == id);
            if live {
                handler(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }
}

impl<E: 'static> Listeners<E> {
    /// Register `handler`; it stays registered while the guard lives.
    pub fn add(&self, handler: impl Fn(&E) + 'static) -> ListenerGuard {
        let id = {
            let mut list = self.inner.borrow_mut();
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push((id, Rc::new(handler)));
            id
        };
        let weak: Weak<RefCell<ListenerList<E>>> = Rc::downgrade(&self.inner);
        ListenerGuard::new(move || {
            if let Some(list) = weak.upgrade() {
                list.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }
}

/// Removes a registration when dropped.
#[must_use = "dropping the guard removes the listener"]
pub struct ListenerGuard {
    remove: Option<Box<dyn FnOnce()>>,
}

impl ListenerGuard {
    pub fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Keep the listener registered for the lifetime of its source.
    pub fn persist(mut self) {
        self.remove = None;
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.control || self.alt || self.meta
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    pub kind: KeyEventKind,
    /// Logical key, e.g. `"a"`, `"Backspace"`, `"Meta"`.
    pub key: String,
    /// Physical key, e.g. `"KeyA"`. Empty when unknown.
    pub code: String,
    pub modifiers: Modifiers,
    /// The focused element is a text input.
    pub in_input: bool,
}

impl KeyboardEvent {
    pub fn down(key: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Down,
            key: key.into(),
            code: String::new(),
            modifiers: Modifiers::default(),
            in_input: false,
        }
    }

    pub fn up(key: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Up,
            ..Self::down(key)
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn in_input(mut self, in_input: bool) -> Self {
        self.in_input = in_input;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowEvent {
    Blur,
    ContextMenu,
    Resized { width: f32, height: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEventKind {
    Down,
    Move,
    Up,
    Cancel,
}

/// What the pointer is over.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PointerTarget {
    #[default]
    Pane,
    Node(String),
    Handle {
        node_id: String,
        handle_type: HandleType,
        handle_id: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    /// Pane coordinates.
    pub position: XYPosition,
    pub target: PointerTarget,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn new(kind: PointerEventKind, position: XYPosition) -> Self {
        Self {
            kind,
            position,
            target: PointerTarget::Pane,
            modifiers: Modifiers::default(),
        }
    }

    pub fn on(mut self, target: PointerTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// The input sources a flow listens on. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct InputEvents {
    pub pointer: Listeners<PointerEvent>,
    pub keyboard: Listeners<KeyboardEvent>,
    pub window: Listeners<WindowEvent>,
}

impl InputEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered listeners across all sources.
    pub fn listener_count(&self) -> usize {
        self.pointer.len() + self.keyboard.len() + self.window.len()
    }
}
