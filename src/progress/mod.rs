//! Live Progress Bus (§4.6): per-mission event fan-out to subscribers,
//! with a bounded queue per subscriber and a drop-oldest-non-essential
//! policy under saturation.
//!
//! Built on the same `tokio::sync` primitives the teacher uses for its
//! concurrency control (`Semaphore` in the mission dispatcher), but the
//! per-subscriber queue is hand-rolled rather than `tokio::sync::mpsc`
//! because the delivery guarantee ("drop oldest non-essential
//! `agent_feedback` first, `update`/`status` never dropped") requires
//! removing an item from the middle of the queue, which `mpsc` cannot do.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Notify, RwLock};

use crate::core::{ExecutionLogEntry, MissionStatus};
use crate::error::{ProgressBusError, Result};
use crate::storage::UsageTotals;

/// Default bound on a subscriber's pending-event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 512;

/// A kind of agent-feedback signal (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    FileRead,
    WebSearchComplete,
    WebSearchError,
    WebFetchStart,
    WebFetchComplete,
    NoteGenerated,
    NoteUpdatedFromFullContent,
    ToolUsageStatus,
    ThreadStatus,
}

/// A Progress Bus event. Tagged so subscribers can deserialize without
/// knowing the variant in advance (`#[serde(tag = "type")]`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An execution log entry, or a terminal-status signal with no
    /// payload.
    Update {
        /// `None` signals a terminal status change with no log entry.
        entry: Option<ExecutionLogEntry>,
    },
    /// A free-form agent/tool feedback signal. Never dropped-essential;
    /// the first candidate evicted under queue saturation.
    AgentFeedback {
        /// Which kind of feedback this is.
        kind: FeedbackKind,
        /// Feedback payload, shape depends on `kind`.
        payload: serde_json::Value,
    },
    /// A usage rollup, absolute or incremental.
    StatsUpdate {
        /// Current usage totals.
        totals: UsageTotals,
        /// Whether `totals` is a delta (`true`) or an absolute snapshot.
        incremental: bool,
    },
    /// A mission-level status transition.
    Status {
        /// The mission's new status.
        status: MissionStatus,
    },
    /// Signals that subscribers should discard any locally cached
    /// artifacts strictly after `after_round` (a `resume_from_round` or
    /// `revise_outline_and_resume` happened).
    TruncateData {
        /// Discard anything logged strictly after this round.
        after_round: u32,
    },
}

impl Event {
    /// Whether this event must never be dropped under queue saturation.
    const fn is_essential(&self) -> bool {
        matches!(self, Self::Update { .. } | Self::Status { .. })
    }
}

struct Subscriber {
    id: u64,
    queue: std::sync::Mutex<VecDeque<Event>>,
    notify: Notify,
    closed: AtomicBool,
    capacity: usize,
}

impl Subscriber {
    fn push(&self, event: Event) {
        let mut queue = self.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if queue.len() >= self.capacity {
            if event.is_essential() {
                if let Some(pos) = queue.iter().position(|e| !e.is_essential()) {
                    queue.remove(pos);
                }
                // No non-essential entry to evict: let an essential event
                // through anyway rather than drop it.
            } else {
                // Incoming event is non-essential and the queue is full of
                // essential work; drop the incoming event.
                return;
            }
        }

        queue.push_back(event);
        drop(queue);
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

/// A live handle to one subscriber's event stream.
pub struct Subscription {
    bus: Arc<ProgressBusInner>,
    mission_id: String,
    subscriber: Arc<Subscriber>,
}

impl Subscription {
    /// Awaits the next event, or `None` once the subscription is closed
    /// and its queue has drained.
    pub async fn recv(&self) -> Option<Event> {
        loop {
            {
                let mut queue = self
                    .subscriber
                    .queue
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(event) = queue.pop_front() {
                    return Some(event);
                }
                if self.subscriber.closed.load(Ordering::SeqCst) {
                    return None;
                }
            }
            self.subscriber.notify.notified().await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.mission_id, self.subscriber.id);
    }
}

struct ProgressBusInner {
    missions: RwLock<HashMap<String, Vec<Arc<Subscriber>>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

/// The Progress Bus: per-mission FIFO fan-out to registered subscribers.
///
/// Cheap to clone (an `Arc` internally); the same handle backs agent
/// feedback emission and the external subscription surface.
#[derive(Clone)]
pub struct ProgressBus {
    inner: Arc<ProgressBusInner>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ProgressBus {
    /// Creates a bus with the given per-subscriber queue capacity.
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(ProgressBusInner {
                missions: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue_capacity,
            }),
        }
    }

    /// Registers a new subscriber for `mission_id`.
    pub async fn subscribe(&self, mission_id: &str) -> Subscription {
        let subscriber = Arc::new(Subscriber {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            queue: std::sync::Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            capacity: self.inner.queue_capacity,
        });

        self.inner
            .missions
            .write()
            .await
            .entry(mission_id.to_string())
            .or_default()
            .push(subscriber.clone());

        Subscription {
            bus: self.inner.clone(),
            mission_id: mission_id.to_string(),
            subscriber,
        }
    }

    /// Publishes an event to every subscriber of `mission_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressBusError::NoSubscriber`] if no subscriber is
    /// registered for the mission; this is a soft signal (callers
    /// typically log and continue rather than treat it as fatal).
    pub async fn publish(&self, mission_id: &str, event: Event) -> Result<()> {
        let missions = self.inner.missions.read().await;
        let Some(subscribers) = missions.get(mission_id) else {
            return Err(ProgressBusError::NoSubscriber {
                mission_id: mission_id.to_string(),
            }
            .into());
        };
        for subscriber in subscribers {
            subscriber.push(event.clone());
        }
        Ok(())
    }

    /// Marks `mission_id` terminal: subscribers receive remaining queued
    /// events, then `recv` returns `None`. Callers (the Mission
    /// Controller) are expected to call this after the documented grace
    /// period following a terminal status event.
    pub async fn close_mission(&self, mission_id: &str) {
        if let Some(subscribers) = self.inner.missions.write().await.remove(mission_id) {
            for subscriber in subscribers {
                subscriber.close();
            }
        }
    }

    fn unsubscribe_inner(inner: &Arc<ProgressBusInner>, mission_id: &str, subscriber_id: u64) {
        if let Ok(mut missions) = inner.missions.try_write() {
            if let Some(subscribers) = missions.get_mut(mission_id) {
                subscribers.retain(|s| s.id != subscriber_id);
                if subscribers.is_empty() {
                    missions.remove(mission_id);
                }
            }
        }
    }
}

impl ProgressBusInner {
    fn unsubscribe(self: &Arc<Self>, mission_id: &str, subscriber_id: u64) {
        ProgressBus::unsubscribe_inner(self, mission_id, subscriber_id);
    }
}

/// A lightweight, cloneable handle agents and tools use to emit feedback
/// for a single mission without needing the whole bus API.
#[derive(Clone)]
pub struct ProgressHandle {
    bus: ProgressBus,
    mission_id: String,
}

impl ProgressHandle {
    /// Creates a handle scoped to one mission.
    #[must_use]
    pub const fn new(bus: ProgressBus, mission_id: String) -> Self {
        Self { bus, mission_id }
    }

    /// Publishes an event, swallowing `NoSubscriber` (feedback with no
    /// listener is not an error for the emitting tool/agent).
    pub async fn emit(&self, event: Event) {
        let _ = self.bus.publish(&self.mission_id, event).await;
    }

    /// Convenience wrapper for an `agent_feedback` event.
    pub async fn feedback(&self, kind: FeedbackKind, payload: serde_json::Value) {
        self.emit(Event::AgentFeedback { kind, payload }).await;
    }
}
