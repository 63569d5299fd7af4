//! Key combos and the global delete / multi-selection keys.
//!
//! A combo string is a `+`-separated list of keys, e.g. `"Meta+s"` or
//! `"Shift++"`. [`use_key_press`] tracks the pressed keys and reports a
//! combo as pressed when the set of held keys is exactly one of the combos.
//! A key matches by its `code` when the code is one of the watched keys,
//! otherwise by its `key` value.

use crate::events::{InputEvents, KeyEventKind, KeyboardEvent, ListenerGuard, Listeners, WindowEvent};
use crate::instance::FlowInstance;
use crate::nodes::ElementData;
use indexmap::IndexSet;
use std::cell::RefCell;
use std::rc::Rc;

/// Split a combo into its keys. An empty segment stands for the `+` key
/// itself, so `"+"` and `"Shift++"` work.
pub fn parse_key_combo(combo: &str) -> Vec<String> {
    if combo == "+" {
        return vec!["+".to_string()];
    }
    let mut keys = Vec::new();
    let mut plus_pending = false;
    for part in combo.split('+') {
        if part.is_empty() {
            if plus_pending {
                keys.push("+".to_string());
                plus_pending = false;
            } else {
                plus_pending = true;
            }
        } else {
            keys.push(part.to_string());
        }
    }
    keys
}

#[derive(Clone, Debug)]
pub struct KeyPressOptions {
    /// Still react inside text inputs while ctrl, meta or shift is held.
    pub act_inside_input_with_modifier: bool,
}

impl Default for KeyPressOptions {
    fn default() -> Self {
        Self {
            act_inside_input_with_modifier: true,
        }
    }
}

#[derive(Debug)]
struct KeyPressState {
    combos: Vec<Vec<String>>,
    watched: Vec<String>,
    pressed_keys: IndexSet<String>,
    modifier_pressed: bool,
    pressed: bool,
}

impl KeyPressState {
    fn key_of<'a>(&self, event: &'a KeyboardEvent) -> &'a str {
        if self.watched.iter().any(|k| *k == event.code) {
            &event.code
        } else {
            &event.key
        }
    }

    /// On key down only exact sets match; on key up any held combo does.
    fn is_matching(&self, is_up: bool) -> bool {
        self.combos
            .iter()
            .filter(|keys| is_up || keys.len() == self.pressed_keys.len())
            .any(|keys| keys.iter().all(|k| self.pressed_keys.contains(k)))
    }

    fn suppressed(&self, event: &KeyboardEvent, options: &KeyPressOptions) -> bool {
        (!self.modifier_pressed || !options.act_inside_input_with_modifier) && event.in_input
    }

    /// Returns the new pressed state when it changed.
    fn handle(&mut self, event: &KeyboardEvent, options: &KeyPressOptions) -> Option<bool> {
        let before = self.pressed;
        match event.kind {
            KeyEventKind::Down => {
                let m = event.modifiers;
                self.modifier_pressed = m.control || m.meta || m.shift;
                if self.suppressed(event, options) {
                    return None;
                }
                let key = self.key_of(event).to_string();
                self.pressed_keys.insert(key);
                if self.is_matching(false) {
                    self.pressed = true;
                }
            }
            KeyEventKind::Up => {
                if self.suppressed(event, options) {
                    return None;
                }
                if self.is_matching(true) {
                    self.pressed = false;
                    self.pressed_keys.clear();
                } else {
                    let key = self.key_of(event).to_string();
                    self.pressed_keys.shift_remove(&key);
                }
                if event.key == "Meta" {
                    self.pressed_keys.clear();
                }
                self.modifier_pressed = false;
            }
        }
        (self.pressed != before).then_some(self.pressed)
    }

    fn reset(&mut self) -> Option<bool> {
        self.pressed_keys.clear();
        let changed = self.pressed;
        self.pressed = false;
        changed.then_some(false)
    }
}

/// Whether a key combo is held. Dropping it stops listening.
pub struct KeyPress {
    state: Rc<RefCell<KeyPressState>>,
    changes: Listeners<bool>,
    _guards: Vec<ListenerGuard>,
}

impl KeyPress {
    pub fn is_pressed(&self) -> bool {
        self.state.borrow().pressed
    }

    /// Call `handler` whenever the pressed state flips.
    pub fn on_change(&self, handler: impl Fn(bool) + 'static) -> ListenerGuard {
        self.changes.add(move |pressed| handler(*pressed))
    }
}

/// Track `combos` on the keyboard and window events of `events`. With no
/// combos nothing is registered and the result never reports a press.
pub fn use_key_press(events: &InputEvents, combos: &[&str], options: KeyPressOptions) -> KeyPress {
    let combos: Vec<Vec<String>> = combos.iter().map(|c| parse_key_combo(c)).collect();
    let watched = combos.iter().flatten().cloned().collect();
    let register = !combos.is_empty();
    let state = Rc::new(RefCell::new(KeyPressState {
        combos,
        watched,
        pressed_keys: IndexSet::new(),
        modifier_pressed: false,
        pressed: false,
    }));
    let changes = Listeners::new();

    let mut guards = Vec::new();
    if register {
        guards.push({
            let state = state.clone();
            let changes = changes.clone();
            events.keyboard.add(move |event| {
                let changed = state.borrow_mut().handle(event, &options);
                if let Some(pressed) = changed {
                    changes.emit(&pressed);
                }
            })
        });
        guards.push({
            let state = state.clone();
            let changes = changes.clone();
            // Blur and context menu both swallow the matching key up
            events.window.add(move |event| {
                if matches!(event, WindowEvent::Resized { .. }) {
                    return;
                }
                let changed = state.borrow_mut().reset();
                if let Some(pressed) = changed {
                    changes.emit(&pressed);
                }
            })
        });
    }

    KeyPress {
        state,
        changes,
        _guards: guards,
    }
}

/// The delete and multi-selection keys of a flow.
pub struct GlobalKeyHandler {
    delete_key: KeyPress,
    multi_selection_key: KeyPress,
    _guards: Vec<ListenerGuard>,
}

impl GlobalKeyHandler {
    pub fn delete_key_pressed(&self) -> bool {
        self.delete_key.is_pressed()
    }

    pub fn multi_selection_key_pressed(&self) -> bool {
        self.multi_selection_key.is_pressed()
    }
}

/// Pressing the store's delete key deletes the selected nodes and edges;
/// holding the multi-selection key sets `multi_selection_active`.
pub fn use_global_key_handler<ND: ElementData, ED: ElementData>(
    instance: &FlowInstance<ND, ED>,
    events: &InputEvents,
) -> GlobalKeyHandler {
    let (delete_key_code, multi_selection_key_code) = instance
        .store()
        .read(|s| (s.delete_key_code.clone(), s.multi_selection_key_code.clone()));

    let delete_key = use_key_press(
        events,
        &delete_key_code.as_deref().into_iter().collect::<Vec<_>>(),
        KeyPressOptions {
            act_inside_input_with_modifier: false,
        },
    );
    let multi_selection_key = use_key_press(
        events,
        &multi_selection_key_code.as_deref().into_iter().collect::<Vec<_>>(),
        KeyPressOptions::default(),
    );

    let delete_guard = {
        let instance = instance.clone();
        delete_key.on_change(move |pressed| {
            if pressed {
                delete_selected(&instance);
            }
        })
    };
    let multi_guard = {
        let store = instance.store().clone();
        multi_selection_key.on_change(move |pressed| store.set_multi_selection_active(pressed))
    };

    GlobalKeyHandler {
        delete_key,
        multi_selection_key,
        _guards: vec![delete_guard, multi_guard],
    }
}

fn delete_selected<ND: ElementData, ED: ElementData>(instance: &FlowInstance<ND, ED>) {
    let store = instance.store();
    let (nodes, edges): (Vec<String>, Vec<String>) = store.read(|s| {
        (
            s.nodes.iter().filter(|n| n.selected).map(|n| n.id.clone()).collect(),
            s.edges.iter().filter(|e| e.selected).map(|e| e.id.clone()).collect(),
        )
    });
    instance.delete_elements(&nodes, &edges);
    store.set_state(|s| s.nodes_selection_active = false);
}
