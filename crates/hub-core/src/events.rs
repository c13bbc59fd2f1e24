//! Event Emitter
//!
//! Lifecycle notifications for agents and tasks.
//!
//! Listeners registered with [`EventBus::on`] run synchronously, in
//! registration order, on the emitting thread. A panicking listener is
//! logged and skipped; the remaining listeners still run. Delivery is
//! at-most-effort: nothing is retried or buffered for listeners.
//!
//! Async consumers can use [`EventBus::subscribe`] instead. A lagging
//! receiver loses the oldest events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::agents::AgentId;
use crate::error::panic_message;
use crate::tasks::Task;

const BROADCAST_CAPACITY: usize = 256;

/// Name of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AgentRegistered,
    AgentStarted,
    AgentStopped,
    TaskAssigned,
    TaskCompleted,
    TaskFailed,
    MainAgentStarted,
    MainAgentStopped,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentRegistered => "agent_registered",
            Self::AgentStarted => "agent_started",
            Self::AgentStopped => "agent_stopped",
            Self::TaskAssigned => "task_assigned",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::MainAgentStarted => "main_agent_started",
            Self::MainAgentStopped => "main_agent_stopped",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event and its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HubEvent {
    AgentRegistered { agent_id: AgentId, name: String },
    AgentStarted { agent_id: AgentId },
    AgentStopped { agent_id: AgentId },
    TaskAssigned { task: Box<Task> },
    TaskCompleted { task: Box<Task> },
    TaskFailed { task: Box<Task> },
    MainAgentStarted,
    MainAgentStopped,
}

impl HubEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AgentRegistered { .. } => EventKind::AgentRegistered,
            Self::AgentStarted { .. } => EventKind::AgentStarted,
            Self::AgentStopped { .. } => EventKind::AgentStopped,
            Self::TaskAssigned { .. } => EventKind::TaskAssigned,
            Self::TaskCompleted { .. } => EventKind::TaskCompleted,
            Self::TaskFailed { .. } => EventKind::TaskFailed,
            Self::MainAgentStarted => EventKind::MainAgentStarted,
            Self::MainAgentStopped => EventKind::MainAgentStopped,
        }
    }

    /// The task carried by task events
    pub fn task(&self) -> Option<&Task> {
        match self {
            Self::TaskAssigned { task } | Self::TaskCompleted { task } | Self::TaskFailed { task } => {
                Some(task)
            }
            _ => None,
        }
    }
}

/// Listener callback
pub type Listener = Arc<dyn Fn(&HubEvent) + Send + Sync>;

struct Registration {
    /// `None` listens to every kind
    kind: Option<EventKind>,
    listener: Listener,
}

/// Synchronous pub/sub for [`HubEvent`]s
pub struct EventBus {
    listeners: RwLock<Vec<Registration>>,
    sender: broadcast::Sender<HubEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            listeners: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Register a listener for one kind of event
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        self.add(Some(kind), Arc::new(listener));
    }

    /// Register a listener for every event
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(listener));
    }

    fn add(&self, kind: Option<EventKind>, listener: Listener) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.push(Registration { kind, listener });
    }

    /// Receiver for async consumers
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    /// Deliver an event to every matching listener.
    ///
    /// Returns the number of listeners that ran without panicking.
    pub fn emit(&self, event: HubEvent) -> usize {
        let kind = event.kind();

        // Listeners may register more listeners; call them without holding the lock
        let matching: Vec<Listener> = {
            let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
            listeners
                .iter()
                .filter(|r| r.kind.is_none_or(|k| k == kind))
                .map(|r| r.listener.clone())
                .collect()
        };

        debug!(event = %kind, listeners = matching.len(), "Emitting event");

        let mut delivered = 0;
        for listener in matching {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(event = %kind, "Event listener panicked: {}", message);
                }
            }
        }

        // No receivers is fine
        let _ = self.sender.send(event);

        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn started(id: &str) -> HubEvent {
        HubEvent::AgentStarted {
            agent_id: AgentId::new(id),
        }
    }

    #[test]
    fn test_listener_receives_matching_kind_only() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        bus.on(EventKind::AgentStarted, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(started("a"));
        bus.emit(HubEvent::MainAgentStarted);
        bus.emit(started("b"));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let seen = seen.clone();
            bus.on_any(move |event| seen.lock().unwrap().push((n, event.kind())));
        }

        bus.emit(HubEvent::MainAgentStopped);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (0, EventKind::MainAgentStopped),
                (1, EventKind::MainAgentStopped),
                (2, EventKind::MainAgentStopped),
            ]
        );
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::AgentStarted, |_| panic!("listener failure"));
        let c = count.clone();
        bus.on(EventKind::AgentStarted, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let delivered = bus.emit(started("a"));

        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Bus still usable afterwards
        bus.emit(started("b"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_can_register_listener() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.on(EventKind::MainAgentStarted, move |_| {
            inner.on_any(|_| {});
        });

        bus.emit(HubEvent::MainAgentStarted);
        assert_eq!(bus.listener_count(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_receives_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(started("seo"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event, started("seo"));
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(started("seo")).unwrap();
        assert_eq!(json["event"], "agent_started");
        assert_eq!(json["agent_id"], "seo");
        assert_eq!(EventKind::TaskFailed.to_string(), "task_failed");
    }
}
