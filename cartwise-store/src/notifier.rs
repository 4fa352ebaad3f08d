//! In-process change notification.
//!
//! The store emits one [`ChangeEvent`] per successful mutation. Handlers run
//! synchronously inside [`ChangeNotifier::emit`], in registration order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::error::StoreError;

// ============================================================================
// Topics and Events
// ============================================================================

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeTopic {
    /// Shopping lists.
    #[serde(rename = "lists-changed")]
    Lists,
    /// Items of any list.
    #[serde(rename = "items-changed")]
    Items,
    /// Budgets.
    #[serde(rename = "budgets-changed")]
    Budgets,
    /// Profile settings.
    #[serde(rename = "settings-changed")]
    Settings,
}

impl ChangeTopic {
    /// Wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTopic::Lists => "lists-changed",
            ChangeTopic::Items => "items-changed",
            ChangeTopic::Budgets => "budgets-changed",
            ChangeTopic::Settings => "settings-changed",
        }
    }

    /// All topics.
    pub fn all() -> &'static [ChangeTopic] {
        &[
            ChangeTopic::Lists,
            ChangeTopic::Items,
            ChangeTopic::Budgets,
            ChangeTopic::Settings,
        ]
    }
}

impl fmt::Display for ChangeTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeTopic {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeTopic::all()
            .iter()
            .copied()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| StoreError::Config(format!("unknown change topic: {s}")))
    }
}

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// A record was created.
    Create,
    /// A record was updated.
    Update,
    /// A record was deleted (soft or hard).
    Delete,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Topic the event was emitted on.
    pub topic: ChangeTopic,
    /// Kind of mutation.
    pub action: ChangeAction,
    /// The affected record as stored (for deletes, the last known record).
    pub record: Value,
}

impl ChangeEvent {
    /// Creates an event.
    pub fn new(topic: ChangeTopic, action: ChangeAction, record: Value) -> Self {
        Self {
            topic,
            action,
            record,
        }
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Handle returned by [`ChangeNotifier::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Topic-based publish/subscribe bus.
///
/// There is no replay: a handler sees only events emitted after it was
/// registered, and a handler registered while an emission is running is not
/// invoked for that emission.
#[derive(Default)]
pub struct ChangeNotifier {
    handlers: Mutex<HashMap<ChangeTopic, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<ChangeTopic, usize> = self
            .lock()
            .iter()
            .map(|(topic, handlers)| (*topic, handlers.len()))
            .collect();
        f.debug_struct("ChangeNotifier")
            .field("handlers", &counts)
            .finish()
    }
}

impl ChangeNotifier {
    /// Creates a notifier with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`.
    pub fn on<F>(&self, topic: ChangeTopic, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        trace!(topic = %topic, id = id.0, "Handler registered");
        id
    }

    /// Removes a handler. Returns whether it was registered.
    pub fn off(&self, topic: ChangeTopic, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let Some(list) = handlers.get_mut(&topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    /// Invokes every handler registered for the event's topic.
    ///
    /// The handler list is copied before the first call, so handlers may
    /// subscribe or unsubscribe freely. Returns the number of handlers run.
    pub fn emit(&self, event: &ChangeEvent) -> usize {
        let snapshot: Vec<Handler> = self
            .lock()
            .get(&event.topic)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        trace!(topic = %event.topic, handlers = snapshot.len(), "Emitting change");
        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// Number of handlers registered for `topic`.
    pub fn handler_count(&self, topic: ChangeTopic) -> usize {
        self.lock().get(&topic).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChangeTopic, Vec<(SubscriptionId, Handler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn event(topic: ChangeTopic) -> ChangeEvent {
        ChangeEvent::new(topic, ChangeAction::Update, json!({ "id": "x" }))
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let seen = Arc::clone(&seen);
            notifier.on(ChangeTopic::Items, move |_| seen.lock().unwrap().push(n));
        }

        assert_eq!(notifier.emit(&event(ChangeTopic::Items)), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_topics_are_independent() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        notifier.on(ChangeTopic::Lists, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.emit(&event(ChangeTopic::Items));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        notifier.emit(&event(ChangeTopic::Lists));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = notifier.on(ChangeTopic::Budgets, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(notifier.off(ChangeTopic::Budgets, id));
        assert!(!notifier.off(ChangeTopic::Budgets, id));
        notifier.emit(&event(ChangeTopic::Budgets));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_late_handler_misses_earlier_emit() {
        let notifier = ChangeNotifier::new();
        notifier.emit(&event(ChangeTopic::Settings));

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        notifier.on(ChangeTopic::Settings, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_registered_during_emit_is_not_called() {
        let notifier = Arc::new(ChangeNotifier::new());
        let late_hits = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&notifier);
        let late = Arc::clone(&late_hits);
        notifier.on(ChangeTopic::Lists, move |_| {
            let late = Arc::clone(&late);
            inner.on(ChangeTopic::Lists, move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        assert_eq!(notifier.emit(&event(ChangeTopic::Lists)), 1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.handler_count(ChangeTopic::Lists), 2);
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(ChangeTopic::Items.to_string(), "items-changed");
        assert_eq!(
            "budgets-changed".parse::<ChangeTopic>().unwrap(),
            ChangeTopic::Budgets
        );
        assert!("nope".parse::<ChangeTopic>().is_err());
        assert_eq!(
            serde_json::to_value(ChangeTopic::Settings).unwrap(),
            json!("settings-changed")
        );
    }
}
