//! Clear observers.
//!
//! Interceptors registered on the clear service at construction time. They
//! see the keys of a batch before it runs and its report after it commits.
//! Observers cannot veto or alter a batch.

use std::sync::Arc;

use rearm_types::config::ObserverConfig;
use rearm_types::event::ClearEvent;
use rearm_types::task::TaskInstanceKey;
use tokio::sync::broadcast;

use super::engine::ClearReport;

/// Hooks around a clear batch. Both default to no-ops.
pub trait ClearObserver: Send + Sync {
    fn before_clear(&self, _keys: &[TaskInstanceKey]) {}

    /// Called only after a successful commit.
    fn after_clear(&self, _report: &ClearReport) {}
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ClearObserver for NoopObserver {}

/// Publishes [`ClearEvent`]s on a broadcast channel.
///
/// Publishing with no subscribers drops the event.
#[derive(Clone)]
pub struct EventRecorder {
    sender: broadcast::Sender<ClearEvent>,
}

impl EventRecorder {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClearEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: ClearEvent) {
        let _ = self.sender.send(event);
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

impl ClearObserver for EventRecorder {
    fn before_clear(&self, keys: &[TaskInstanceKey]) {
        self.publish(ClearEvent::ClearRequested {
            keys: keys.to_vec(),
        });
    }

    fn after_clear(&self, report: &ClearReport) {
        for cleared in &report.cleared {
            self.publish(ClearEvent::TaskCleared {
                key: cleared.key.clone(),
                try_number: cleared.try_number,
                max_tries: cleared.max_tries,
            });
        }
        for transition in &report.run_transitions {
            self.publish(ClearEvent::RunStateChanged {
                run_id: transition.run_id,
                from: transition.from,
                to: transition.to,
            });
        }
        self.publish(ClearEvent::BatchCommitted {
            cleared: report.cleared.len(),
            skipped: report.skipped.len(),
            markers_removed: report.markers_removed,
        });
    }
}

/// The event sink chosen from configuration.
#[derive(Debug, Clone)]
pub enum EventSink {
    Recording(EventRecorder),
    Noop(NoopObserver),
}

impl EventSink {
    pub fn from_config(config: &ObserverConfig) -> Self {
        if config.record_events {
            EventSink::Recording(EventRecorder::new(config.event_capacity))
        } else {
            EventSink::Noop(NoopObserver)
        }
    }

    /// Subscribe to clear events. `None` when events are not recorded.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ClearEvent>> {
        match self {
            EventSink::Recording(recorder) => Some(recorder.subscribe()),
            EventSink::Noop(_) => None,
        }
    }
}

impl ClearObserver for EventSink {
    fn before_clear(&self, keys: &[TaskInstanceKey]) {
        match self {
            EventSink::Recording(r) => r.before_clear(keys),
            EventSink::Noop(n) => n.before_clear(keys),
        }
    }

    fn after_clear(&self, report: &ClearReport) {
        match self {
            EventSink::Recording(r) => r.after_clear(report),
            EventSink::Noop(n) => n.after_clear(report),
        }
    }
}

/// Ordered list of observers, called in registration order.
#[derive(Clone, Default)]
pub struct ObserverChain {
    observers: Vec<Arc<dyn ClearObserver>>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn ClearObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ClearObserver for ObserverChain {
    fn before_clear(&self, keys: &[TaskInstanceKey]) {
        for observer in &self.observers {
            observer.before_clear(keys);
        }
    }

    fn after_clear(&self, report: &ClearReport) {
        for observer in &self.observers {
            observer.after_clear(report);
        }
    }
}

impl std::fmt::Debug for ObserverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverChain")
            .field("observers", &self.observers.len())
            .finish()
    }
}
