//! Observability bus: per-job event stores with live fan-out.
//!
//! Two keyed stores per job: a fixed-capacity FIFO ring of log events
//! and a single-slot latest progress cell. Every emission records into
//! the store and fans out to two broadcast groups - the job's own and a
//! global one - so per-job viewers and a dashboard-of-everything both
//! see it live.
//!
//! Subscribing takes the history snapshot and creates the live receiver
//! under the same lock the publishers write through, so an event lands
//! either in the snapshot or in the live stream - never both, never
//! neither.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// A log line emitted by a running job. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub bot_id: Uuid,
    pub bot_name: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A progress update; only the latest per job is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub bot_id: Uuid,
    pub bot_name: String,
    pub current: u64,
    pub total: u64,
    pub percentage: f32,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Wire message delivered to subscribers.
///
/// `History` is sent exactly once per subscription, before any live
/// event; job-scoped subscriptions also get the latest progress
/// snapshot inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMessage {
    History {
        events: Vec<LogEvent>,
        progress: Option<ProgressEvent>,
    },
    Log(LogEvent),
    Progress(ProgressEvent),
}

struct JobChannel {
    ring: VecDeque<LogEvent>,
    progress: Option<ProgressEvent>,
    tx: broadcast::Sender<BusMessage>,
}

impl JobChannel {
    fn new(broadcast_capacity: usize) -> Self {
        Self {
            ring: VecDeque::new(),
            progress: None,
            tx: broadcast::channel(broadcast_capacity).0,
        }
    }
}

struct BusInner {
    jobs: HashMap<Uuid, JobChannel>,
    global: broadcast::Sender<BusMessage>,
}

/// The observability bus. Thread-safe and cloneable; one per process.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
    ring_capacity: usize,
    broadcast_capacity: usize,
}

impl EventBus {
    /// Create a bus with the default per-job ring capacity (1000).
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Create a bus with the given per-job ring capacity.
    pub fn with_capacity(ring_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                jobs: HashMap::new(),
                global: broadcast::channel(256).0,
            })),
            ring_capacity,
            broadcast_capacity: 256,
        }
    }

    /// Clear a job's ring and progress slot so the run starts with an
    /// empty transcript. Existing live subscribers stay attached.
    pub async fn begin_run(&self, bot_id: Uuid) {
        let mut inner = self.inner.lock().await;
        let capacity = self.broadcast_capacity;
        let channel = inner
            .jobs
            .entry(bot_id)
            .or_insert_with(|| JobChannel::new(capacity));
        channel.ring.clear();
        channel.progress = None;
    }

    /// Record and fan out a log event.
    pub async fn log(
        &self,
        bot_id: Uuid,
        bot_name: &str,
        level: LogLevel,
        message: impl Into<String>,
    ) {
        let event = LogEvent {
            bot_id,
            bot_name: bot_name.to_string(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
        };

        let mut inner = self.inner.lock().await;
        let capacity = self.broadcast_capacity;
        let channel = inner
            .jobs
            .entry(bot_id)
            .or_insert_with(|| JobChannel::new(capacity));

        if channel.ring.len() >= self.ring_capacity {
            channel.ring.pop_front();
        }
        channel.ring.push_back(event.clone());

        // Fan out; send errors just mean no live subscribers.
        let _ = channel.tx.send(BusMessage::Log(event.clone()));
        let _ = inner.global.send(BusMessage::Log(event));
    }

    /// Record and fan out a progress update (overwrites the slot).
    pub async fn progress(
        &self,
        bot_id: Uuid,
        bot_name: &str,
        current: u64,
        total: u64,
        message: impl Into<String>,
    ) {
        let percentage = if total == 0 {
            0.0
        } else {
            (current as f32 / total as f32) * 100.0
        };

        let event = ProgressEvent {
            bot_id,
            bot_name: bot_name.to_string(),
            current,
            total,
            percentage,
            message: message.into(),
            timestamp: Utc::now(),
        };

        let mut inner = self.inner.lock().await;
        let capacity = self.broadcast_capacity;
        let channel = inner
            .jobs
            .entry(bot_id)
            .or_insert_with(|| JobChannel::new(capacity));

        channel.progress = Some(event.clone());

        let _ = channel.tx.send(BusMessage::Progress(event.clone()));
        let _ = inner.global.send(BusMessage::Progress(event));
    }

    /// Subscribe to one job's channel.
    ///
    /// Returns the history replay (ring contents plus latest progress)
    /// and the live receiver, created atomically. Unsubscribing is
    /// dropping the receiver; history is unaffected.
    pub async fn subscribe_bot(&self, bot_id: Uuid) -> (BusMessage, broadcast::Receiver<BusMessage>) {
        let mut inner = self.inner.lock().await;
        let capacity = self.broadcast_capacity;
        let channel = inner
            .jobs
            .entry(bot_id)
            .or_insert_with(|| JobChannel::new(capacity));

        let history = BusMessage::History {
            events: channel.ring.iter().cloned().collect(),
            progress: channel.progress.clone(),
        };

        (history, channel.tx.subscribe())
    }

    /// Subscribe to the global channel (all jobs).
    ///
    /// The replay is every job's buffered events merged in timestamp
    /// order, without a progress snapshot.
    pub async fn subscribe_global(&self) -> (BusMessage, broadcast::Receiver<BusMessage>) {
        let inner = self.inner.lock().await;

        let mut events: Vec<LogEvent> = inner
            .jobs
            .values()
            .flat_map(|c| c.ring.iter().cloned())
            .collect();
        events.sort_by_key(|e| e.timestamp);

        let history = BusMessage::History {
            events,
            progress: None,
        };

        (history, inner.global.subscribe())
    }

    /// Snapshot of a job's buffered events (for assertions and status
    /// endpoints; live viewers should subscribe instead).
    pub async fn history(&self, bot_id: Uuid) -> Vec<LogEvent> {
        let inner = self.inner.lock().await;
        inner
            .jobs
            .get(&bot_id)
            .map(|c| c.ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Latest progress for a job, if any was published this run.
    pub async fn latest_progress(&self, bot_id: Uuid) -> Option<ProgressEvent> {
        let inner = self.inner.lock().await;
        inner.jobs.get(&bot_id).and_then(|c| c.progress.clone())
    }

    /// Drop a job's stores entirely (when the bot itself is deleted).
    pub async fn remove_bot(&self, bot_id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.jobs.remove(&bot_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_of(message: &BusMessage) -> &[LogEvent] {
        match message {
            BusMessage::History { events, .. } => events,
            _ => panic!("expected history"),
        }
    }

    #[tokio::test]
    async fn test_ring_evicts_oldest_beyond_capacity() {
        let bus = EventBus::with_capacity(1000);
        let id = Uuid::new_v4();

        for i in 1..=1001u32 {
            bus.log(id, "bot", LogLevel::Info, format!("event {i}")).await;
        }

        let history = bus.history(id).await;
        assert_eq!(history.len(), 1000);
        assert_eq!(history.first().unwrap().message, "event 2");
        assert_eq!(history.last().unwrap().message, "event 1001");
    }

    #[tokio::test]
    async fn test_progress_slot_holds_latest_only() {
        let bus = EventBus::new();
        let id = Uuid::new_v4();

        bus.progress(id, "bot", 1, 4, "chunk 1").await;
        bus.progress(id, "bot", 3, 4, "chunk 3").await;

        let latest = bus.latest_progress(id).await.unwrap();
        assert_eq!(latest.current, 3);
        assert!((latest.percentage - 75.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_two_subscribers_get_identical_replays() {
        let bus = EventBus::new();
        let id = Uuid::new_v4();

        bus.log(id, "bot", LogLevel::Info, "one").await;
        bus.log(id, "bot", LogLevel::Warning, "two").await;

        let (replay_a, _rx_a) = bus.subscribe_bot(id).await;
        let (replay_b, _rx_b) = bus.subscribe_bot(id).await;

        assert_eq!(events_of(&replay_a), events_of(&replay_b));
        assert_eq!(events_of(&replay_a).len(), 2);
    }

    #[tokio::test]
    async fn test_live_events_follow_snapshot_without_loss() {
        let bus = EventBus::new();
        let id = Uuid::new_v4();

        bus.log(id, "bot", LogLevel::Info, "before").await;
        let (replay, mut rx) = bus.subscribe_bot(id).await;
        bus.log(id, "bot", LogLevel::Info, "after").await;

        assert_eq!(events_of(&replay).len(), 1);
        assert_eq!(events_of(&replay)[0].message, "before");

        match rx.recv().await.unwrap() {
            BusMessage::Log(event) => assert_eq!(event.message, "after"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_global_channel_sees_all_jobs() {
        let bus = EventBus::new();
        let (_, mut rx) = bus.subscribe_global().await;

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        bus.log(a, "bot-a", LogLevel::Info, "from a").await;
        bus.log(b, "bot-b", LogLevel::Info, "from b").await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first, second) {
            (BusMessage::Log(x), BusMessage::Log(y)) => {
                assert_eq!(x.message, "from a");
                assert_eq!(y.message, "from b");
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_begin_run_clears_transcript() {
        let bus = EventBus::new();
        let id = Uuid::new_v4();

        bus.log(id, "bot", LogLevel::Info, "old run").await;
        bus.progress(id, "bot", 1, 1, "done").await;

        bus.begin_run(id).await;

        assert!(bus.history(id).await.is_empty());
        assert!(bus.latest_progress(id).await.is_none());
    }
}
