//! Batched node and edge updates.
//!
//! Imperative updates (`set_nodes`, `add_edges`, ...) are pushed onto a
//! [`Queue`] instead of being applied immediately. The first push of a batch
//! schedules a single flush on the next event loop tick; the flush folds all
//! queued items over the current collection and commits the result once.
//!
//! [`Flow`] owns a store together with its node and edge queues and the
//! input event sources. It is the root every composable is created from.
//!
//! # Example
//!
//! ```ignore
//! use slint_flow::{Flow, FlowOptions};
//!
//! let flow = Flow::new(FlowOptions::new().with_default_nodes(nodes));
//! let instance = flow.instance();
//!
//! instance.add_nodes(vec![node_a]);
//! instance.add_nodes(vec![node_b]);
//! // Both additions land in one `set_nodes` on the next tick.
//! ```

use crate::changes::get_elements_diff_changes;
use crate::config::FlowOptions;
use crate::edges::Edge;
use crate::events::InputEvents;
use crate::instance::FlowInstance;
use crate::nodes::{ElementData, Node};
use crate::store::FlowStore;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// A queued update: a full replacement or a function of the previous value.
pub enum QueueItem<T> {
    Set(Vec<T>),
    Update(Box<dyn FnOnce(Vec<T>) -> Vec<T>>),
}

impl<T> QueueItem<T> {
    pub fn update(f: impl FnOnce(Vec<T>) -> Vec<T> + 'static) -> Self {
        QueueItem::Update(Box::new(f))
    }
}

impl<T> fmt::Debug for QueueItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueItem::Set(items) => f.debug_tuple("Set").field(&items.len()).finish(),
            QueueItem::Update(_) => f.write_str("Update"),
        }
    }
}

/// Fold queued items over `current`, in push order.
pub fn apply_queue_items<T>(items: Vec<QueueItem<T>>, current: Vec<T>) -> Vec<T> {
    items.into_iter().fold(current, |acc, item| match item {
        QueueItem::Set(next) => next,
        QueueItem::Update(f) => f(acc),
    })
}

// ============================================================================
// Schedulers
// ============================================================================

/// Runs deferred work after the current call stack unwinds.
pub trait Scheduler {
    fn schedule(&self, task: Box<dyn FnOnce()>);
}

/// Defers to the next Slint event loop iteration.
#[derive(Clone, Copy, Debug, Default)]
pub struct SlintScheduler;

impl Scheduler for SlintScheduler {
    fn schedule(&self, task: Box<dyn FnOnce()>) {
        slint::Timer::single_shot(Duration::ZERO, task);
    }
}

/// Holds tasks until [`run_pending`](Self::run_pending) is called. For tests
/// and hosts without a running event loop.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    pending: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Run tasks until none are left, including tasks scheduled by the
    /// tasks themselves. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.pending.borrow_mut().pop_front();
            let Some(task) = task else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: Box<dyn FnOnce()>) {
        self.pending.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}

// ============================================================================
// Queue
// ============================================================================

struct QueueInner<T> {
    items: RefCell<Vec<QueueItem<T>>>,
    scheduled: Cell<bool>,
    scheduler: Rc<dyn Scheduler>,
    handler: Box<dyn Fn(Vec<QueueItem<T>>)>,
}

/// Collects updates and hands them to its handler once per tick.
pub struct Queue<T> {
    inner: Rc<QueueInner<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Queue<T> {
    pub fn new(scheduler: Rc<dyn Scheduler>, handler: impl Fn(Vec<QueueItem<T>>) + 'static) -> Self {
        Self {
            inner: Rc::new(QueueInner {
                items: RefCell::new(Vec::new()),
                scheduled: Cell::new(false),
                scheduler,
                handler: Box::new(handler),
            }),
        }
    }

    /// Queue an item. Only the first push after a flush schedules one.
    pub fn push(&self, item: QueueItem<T>) {
        self.inner.items.borrow_mut().push(item);
        if self.inner.scheduled.replace(true) {
            return;
        }
        let weak: Weak<QueueInner<T>> = Rc::downgrade(&self.inner);
        self.inner.scheduler.schedule(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Queue { inner }.flush();
            }
        }));
    }

    /// Hand every queued item to the handler now. Nothing queued, nothing
    /// called.
    pub fn flush(&self) {
        self.inner.scheduled.set(false);
        let items = std::mem::take(&mut *self.inner.items.borrow_mut());
        if items.is_empty() {
            return;
        }
        tracing::trace!(items = items.len(), "flow: flushing queue");
        (self.inner.handler)(items);
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Provider
// ============================================================================

/// The node and edge queues of a [`Flow`].
pub struct BatchContext<ND = Value, ED = Value> {
    pub node_queue: Queue<Node<ND>>,
    pub edge_queue: Queue<Edge<ED>>,
}

impl<ND, ED> Clone for BatchContext<ND, ED> {
    fn clone(&self) -> Self {
        Self {
            node_queue: self.node_queue.clone(),
            edge_queue: self.edge_queue.clone(),
        }
    }
}

/// Commit the next node array: replaced directly in self-managed mode,
/// otherwise offered to `on_nodes_change` as a diff.
pub fn commit_nodes<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>, next: Vec<Node<ND>>) {
    if store.read(|s| s.has_default_nodes) {
        store.set_nodes(next);
        return;
    }
    let changes = store.read(|s| get_elements_diff_changes(&next, &s.node_lookup));
    store.trigger_node_changes(changes);
}

pub fn commit_edges<ND: ElementData, ED: ElementData>(store: &FlowStore<ND, ED>, next: Vec<Edge<ED>>) {
    if store.read(|s| s.has_default_edges) {
        store.set_edges(next);
        return;
    }
    let changes = store.read(|s| get_elements_diff_changes(&next, &s.edge_lookup));
    store.trigger_edge_changes(changes);
}

/// A store with its update queues and input sources.
pub struct Flow<ND = Value, ED = Value> {
    store: FlowStore<ND, ED>,
    batch: BatchContext<ND, ED>,
    events: InputEvents,
}

impl<ND: ElementData, ED: ElementData> Flow<ND, ED> {
    /// Create a flow whose queues flush on the next Slint event loop tick.
    pub fn new(options: FlowOptions<ND, ED>) -> Self {
        Self::with_scheduler(options, Rc::new(SlintScheduler))
    }

    pub fn with_scheduler(options: FlowOptions<ND, ED>, scheduler: Rc<dyn Scheduler>) -> Self {
        let store = FlowStore::new(options);

        let node_queue = {
            let store = store.clone();
            Queue::new(scheduler.clone(), move |items| {
                let current = store.read(|s| s.nodes.clone());
                commit_nodes(&store, apply_queue_items(items, current));
            })
        };
        let edge_queue = {
            let store = store.clone();
            Queue::new(scheduler, move |items| {
                let current = store.read(|s| s.edges.clone());
                commit_edges(&store, apply_queue_items(items, current));
            })
        };

        Self {
            store,
            batch: BatchContext { node_queue, edge_queue },
            events: InputEvents::new(),
        }
    }

    pub fn store(&self) -> &FlowStore<ND, ED> {
        &self.store
    }

    pub fn events(&self) -> &InputEvents {
        &self.events
    }

    pub fn batch_context(&self) -> &BatchContext<ND, ED> {
        &self.batch
    }

    /// The imperative API, batched through this flow's queues.
    pub fn instance(&self) -> FlowInstance<ND, ED> {
        FlowInstance::with_batch(self.store.clone(), self.batch.clone())
    }
}
