//! Derived values and Slint model synchronisation.
//!
//! A [`Derived`] is a value computed from store state that is recomputed on
//! every store notification and only changes (and notifies its watchers)
//! when the computed value differs. [`sync_model`] and the `bind_*_model`
//! helpers mirror store collections into a Slint `VecModel`, writing only
//! the rows that changed.
//!
//! # Example
//!
//! ```ignore
//! use slint_flow::{bind_nodes_model, use_store};
//!
//! let node_count = use_store(&store, |s| s.nodes.len());
//! let _watch = node_count.watch(|count| println!("{count} nodes"));
//!
//! let model = Rc::new(VecModel::<NodeRow>::default());
//! let _binding = bind_nodes_model(&store, model.clone(), |node| NodeRow {
//!     id: node.id.as_str().into(),
//!     x: node.internals.position_absolute.x,
//!     y: node.internals.position_absolute.y,
//! });
//! window.set_nodes(ModelRc::from(model));
//! ```

use crate::edges::Edge;
use crate::events::{ListenerGuard, Listeners};
use crate::nodes::{ElementData, InternalNode};
use crate::state::FlowState;
use crate::store::{FlowStore, Subscription};
use slint::{Model, VecModel};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct DerivedInner<T> {
    value: RefCell<T>,
    watchers: Listeners<T>,
}

/// A value derived from store state. Dropping it unsubscribes.
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
    _subscription: Subscription,
}

impl<T: Clone + PartialEq + 'static> Derived<T> {
    pub fn new<ND: ElementData, ED: ElementData>(
        store: &FlowStore<ND, ED>,
        selector: impl Fn(&FlowState<ND, ED>) -> T + 'static,
    ) -> Self {
        let inner = Rc::new(DerivedInner {
            value: RefCell::new(store.read(&selector)),
            watchers: Listeners::new(),
        });
        let subscription = {
            let inner = inner.clone();
            store.subscribe(move |store| {
                let next = store.read(&selector);
                let changed = {
                    let mut value = inner.value.borrow_mut();
                    if *value == next {
                        false
                    } else {
                        *value = next.clone();
                        true
                    }
                };
                if changed {
                    inner.watchers.emit(&next);
                }
            })
        };
        Self {
            inner,
            _subscription: subscription,
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Call `watcher` with every new value.
    pub fn watch(&self, watcher: impl Fn(&T) + 'static) -> ListenerGuard {
        self.inner.watchers.add(watcher)
    }
}

impl<T: fmt::Debug> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Derived").field(&self.inner.value.borrow()).finish()
    }
}

/// Select a value from the store.
pub fn use_store<ND: ElementData, ED: ElementData, T: Clone + PartialEq + 'static>(
    store: &FlowStore<ND, ED>,
    selector: impl Fn(&FlowState<ND, ED>) -> T + 'static,
) -> Derived<T> {
    Derived::new(store, selector)
}

// ============================================================================
// Slint models
// ============================================================================

/// Make `model` hold one row per item. Rows that already hold the same
/// value are left alone; surplus rows are removed from the end.
pub fn sync_model<T, P>(model: &VecModel<P>, items: &[T], row: impl Fn(&T) -> P)
where
    P: Clone + PartialEq + 'static,
{
    for (i, item) in items.iter().enumerate() {
        let next = row(item);
        if i < model.row_count() {
            if model.row_data(i).as_ref() != Some(&next) {
                model.set_row_data(i, next);
            }
        } else {
            model.push(next);
        }
    }
    while model.row_count() > items.len() {
        model.remove(model.row_count() - 1);
    }
}

/// Keep `model` in sync with the store's internal nodes, in node order.
pub fn bind_nodes_model<ND, ED, P>(
    store: &FlowStore<ND, ED>,
    model: Rc<VecModel<P>>,
    row: impl Fn(&InternalNode<ND>) -> P + 'static,
) -> Subscription
where
    ND: ElementData,
    ED: ElementData,
    P: Clone + PartialEq + 'static,
{
    let sync = move |store: &FlowStore<ND, ED>| {
        store.read(|s| {
            let nodes: Vec<&InternalNode<ND>> = s
                .nodes
                .iter()
                .filter_map(|n| s.node_lookup.get(&n.id))
                .collect();
            sync_model(&model, &nodes, |node| row(node));
        });
    };
    sync(store);
    store.subscribe(sync)
}

/// Keep `model` in sync with the store's edges.
pub fn bind_edges_model<ND, ED, P>(
    store: &FlowStore<ND, ED>,
    model: Rc<VecModel<P>>,
    row: impl Fn(&Edge<ED>) -> P + 'static,
) -> Subscription
where
    ND: ElementData,
    ED: ElementData,
    P: Clone + PartialEq + 'static,
{
    let sync = move |store: &FlowStore<ND, ED>| {
        store.read(|s| sync_model(&model, &s.edges, |edge| row(edge)));
    };
    sync(store);
    store.subscribe(sync)
}
