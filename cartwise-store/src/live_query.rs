//! Reactive reads.
//!
//! A [`LiveQuery`] runs a read function and publishes its result as a
//! [`QueryState`] on a watch channel. It re-runs when activated, when its
//! dependencies change by value, when asked to, and on every change event
//! for the topic it watches.
//!
//! Every run takes a generation number. Only the newest generation may
//! commit, so a slow read that finishes after a newer one is discarded.

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{trace, warn};

use crate::error::StoreError;
use crate::notifier::{ChangeNotifier, ChangeTopic, SubscriptionId};

/// Read function driving a [`LiveQuery`].
pub type QueryFn<D, T> = Box<dyn Fn(&D) -> BoxFuture<'static, Result<T, StoreError>> + Send + Sync>;

/// Observable state of a live query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    /// Result of the last successful read.
    pub data: Option<T>,
    /// A read is in flight.
    pub loading: bool,
    /// Error from the last read, cleared when the next one starts.
    pub error: Option<String>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

struct Inner<D, T> {
    fetch: QueryFn<D, T>,
    deps: Mutex<D>,
    generation: AtomicU64,
    active: AtomicBool,
    state: watch::Sender<QueryState<T>>,
    runtime: Handle,
}

impl<D, T> Inner<D, T>
where
    D: Clone + Send + 'static,
    T: Send + Sync + 'static,
{
    /// Marks a run as started and returns its generation with the pending read.
    ///
    /// A read that panics resolves to an error instead, so the run still
    /// commits and `loading` is cleared.
    fn begin(self: &Arc<Self>) -> (u64, BoxFuture<'static, Result<T, StoreError>>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        let deps = self
            .deps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        trace!(generation, "Live query run started");
        let read = match panic::catch_unwind(AssertUnwindSafe(|| (self.fetch)(&deps))) {
            Ok(read) => AssertUnwindSafe(read)
                .catch_unwind()
                .map(|outcome| outcome.unwrap_or_else(|payload| Err(panicked(payload.as_ref()))))
                .boxed(),
            Err(payload) => future::ready(Err(panicked(payload.as_ref()))).boxed(),
        };
        (generation, read)
    }

    fn spawn_run(self: &Arc<Self>) {
        let (generation, read) = self.begin();
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = read.await;
            inner.commit(generation, result);
        });
    }

    fn commit(&self, generation: u64, result: Result<T, StoreError>) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                trace!(generation, "Discarding stale live query result");
                return false;
            }
            match result {
                Ok(data) => state.data = Some(data),
                Err(e) => state.error = Some(e.to_string()),
            }
            state.loading = false;
            true
        })
    }
}

fn panicked(payload: &(dyn Any + Send)) -> StoreError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    warn!(cause = %message, "Live query read panicked");
    StoreError::Task(format!("live query read panicked: {message}"))
}

/// A read bound to dependencies and, optionally, a change topic.
pub struct LiveQuery<D, T> {
    inner: Arc<Inner<D, T>>,
    subscription: Option<(Arc<ChangeNotifier>, ChangeTopic, SubscriptionId)>,
}

impl<D, T> LiveQuery<D, T>
where
    D: Clone + PartialEq + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Creates an inactive query. Nothing runs until [`LiveQuery::activate`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new<F>(deps: D, fetch: F) -> Self
    where
        F: Fn(&D) -> BoxFuture<'static, Result<T, StoreError>> + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            inner: Arc::new(Inner {
                fetch: Box::new(fetch),
                deps: Mutex::new(deps),
                generation: AtomicU64::new(0),
                active: AtomicBool::new(false),
                state,
                runtime: Handle::current(),
            }),
            subscription: None,
        }
    }

    /// Re-runs the query on every event for `topic` once active.
    pub fn watching(mut self, notifier: &Arc<ChangeNotifier>, topic: ChangeTopic) -> Self {
        if let Some((old, old_topic, id)) = self.subscription.take() {
            old.off(old_topic, id);
        }
        let weak: Weak<Inner<D, T>> = Arc::downgrade(&self.inner);
        let id = notifier.on(topic, move |_| {
            if let Some(inner) = weak.upgrade() {
                if inner.active.load(Ordering::SeqCst) {
                    inner.spawn_run();
                }
            }
        });
        self.subscription = Some((Arc::clone(notifier), topic, id));
        self
    }

    /// Runs the query for the first time. Returns false if already active.
    pub fn activate(&self) -> bool {
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.spawn_run();
        true
    }

    /// Returns true once activated.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Replaces the dependencies. Re-runs (when active) only if they differ.
    pub fn set_deps(&self, deps: D) -> bool {
        {
            let mut current = self
                .inner
                .deps
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *current == deps {
                return false;
            }
            *current = deps;
        }
        if self.is_active() {
            self.inner.spawn_run();
        }
        true
    }

    /// Re-runs the query in the background.
    pub fn refetch(&self) {
        self.inner.spawn_run();
    }

    /// Re-runs the query and waits for it. Returns whether the result was
    /// committed (false when a newer run started meanwhile).
    pub async fn refetch_now(&self) -> bool {
        let (generation, read) = self.inner.begin();
        let result = read.await;
        self.inner.commit(generation, result)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> QueryState<T> {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every committed state.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.inner.state.subscribe()
    }

    /// Waits until no run is in flight and returns the state.
    pub async fn settled(&self) -> QueryState<T> {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }
}

impl<D, T> Drop for LiveQuery<D, T> {
    fn drop(&mut self) {
        if let Some((notifier, topic, id)) = self.subscription.take() {
            notifier.off(topic, id);
        }
    }
}

impl<D, T> std::fmt::Debug for LiveQuery<D, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery")
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .field("active", &self.inner.active.load(Ordering::SeqCst))
            .field("topic", &self.subscription.as_ref().map(|(_, t, _)| *t))
            .finish_non_exhaustive()
    }
}
