//! Fan-out of new fleet summaries to registered callbacks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use fleetscope_types::{FleetSummary, SubscriptionId};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{panic_message, SubscriberError};

type Callback = Arc<dyn Fn(&FleetSummary) -> Result<(), SubscriberError> + Send + Sync>;

/// Outcome of one [`SubscriberRegistry::notify`] round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Registered snapshot subscribers.
///
/// Callbacks run on the notifying task, outside the registry lock, against
/// a copy of the list taken at the start of the round. A callback that
/// errors or panics is logged and skipped.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&FleetSummary) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId::generate();
        self.subscribers.lock().push((id, Arc::new(callback)));
        debug!(subscription = %id, "Subscriber added");
        id
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        before != subscribers.len()
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    pub fn notify(&self, summary: &FleetSummary) -> NotifyReport {
        let subscribers: Vec<(SubscriptionId, Callback)> = self.subscribers.lock().clone();
        let mut report = NotifyReport::default();

        for (id, callback) in subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(summary))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(subscription = %id, error = %e, "Subscriber failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    warn!(
                        subscription = %id,
                        panic = %panic_message(payload.as_ref()),
                        "Subscriber panicked"
                    );
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_add_remove() {
        let registry = SubscriberRegistry::new();
        let id = registry.add(|_| Ok(()));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failing_subscribers_do_not_block_others() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.add(|_| Err("subscriber rejected snapshot".into()));
        registry.add(|_| panic!("subscriber blew up"));
        let counter = hits.clone();
        registry.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = registry.notify(&FleetSummary::from_hosts(Vec::new()));
        assert_eq!(report, NotifyReport { delivered: 1, failed: 2 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscriber_may_unsubscribe_itself() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&registry);
        let own_id = slot.clone();
        let id = registry.add(move |_| {
            if let (Some(registry), Some(id)) = (weak.upgrade(), *own_id.lock()) {
                registry.remove(id);
            }
            Ok(())
        });
        *slot.lock() = Some(id);

        let report = registry.notify(&FleetSummary::from_hosts(Vec::new()));
        assert_eq!(report.delivered, 1);
        assert!(registry.is_empty());
    }
}
