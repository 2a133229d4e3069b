//! In-process per-task publish/subscribe channel backed by the durable log.
//!
//! Append and broadcast happen under a per-task lock, and `subscribe` reads
//! the historical log under the same lock before attaching its live receiver.
//! A subscriber therefore observes every event exactly once: either in the
//! replay backlog or in the live feed, never both, never neither. Unrelated
//! tasks use unrelated locks and never contend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use super::{EventLog, EventLogError, EventPayload, TaskEvent};

/// Error type for event bus operations.
#[derive(Debug, Error)]
pub enum EventBusError {
    #[error(transparent)]
    Log(#[from] EventLogError),

    /// The subscriber's buffer overflowed; it is disconnected rather than
    /// silently missing events.
    #[error("subscriber fell behind and was disconnected ({skipped} events skipped)")]
    Backpressure { skipped: u64 },
}

/// Per-task channel: the live broadcast sender plus the sequence counter.
struct TaskChannel {
    next_sequence: u64,
    sender: broadcast::Sender<TaskEvent>,
}

/// Per-task publish/subscribe bus with a durable historical log.
pub struct EventBus {
    log: Arc<dyn EventLog>,
    capacity: usize,
    channels: Mutex<HashMap<String, Arc<Mutex<TaskChannel>>>>,
}

impl EventBus {
    /// Create a new event bus. `capacity` bounds each subscriber's live
    /// buffer; a subscriber that falls further behind is disconnected.
    pub fn new(log: Arc<dyn EventLog>, capacity: usize) -> Self {
        Self {
            log,
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Get or lazily create the channel for a task.
    ///
    /// The sequence counter resumes from the durable log, so a channel that
    /// was released and recreated keeps the per-task ordering contract.
    fn channel(&self, task_id: &str) -> Result<Arc<Mutex<TaskChannel>>, EventBusError> {
        if let Some(channel) = self.channels.lock().unwrap().get(task_id) {
            return Ok(Arc::clone(channel));
        }

        // Read the log before taking the registry lock so slow storage for
        // one task cannot stall lookups for others.
        let last = self.log.last_sequence(task_id)?;

        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(task_id.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel(self.capacity);
            Arc::new(Mutex::new(TaskChannel {
                next_sequence: last + 1,
                sender,
            }))
        });

        Ok(Arc::clone(channel))
    }

    /// Append an event for a task: assigns the next sequence number,
    /// persists it, then broadcasts to all live subscribers.
    pub fn append(
        &self,
        task_id: &str,
        payload: EventPayload,
    ) -> Result<TaskEvent, EventBusError> {
        let channel = self.channel(task_id)?;
        let mut channel = channel.lock().unwrap();

        let event = TaskEvent {
            task_id: task_id.to_string(),
            sequence: channel.next_sequence,
            payload,
            timestamp: Utc::now(),
        };

        // Persist first: an event is only observable once it is durable.
        self.log.append(&event)?;
        channel.next_sequence += 1;

        // No receivers is fine; the log already has the event.
        let _ = channel.sender.send(event.clone());

        Ok(event)
    }

    /// Subscribe to a task's events with replay-then-live semantics.
    pub fn subscribe(&self, task_id: &str) -> Result<Subscription, EventBusError> {
        let channel = self.channel(task_id)?;
        let channel = channel.lock().unwrap();

        // History snapshot and receiver registration happen under the task
        // lock, so a concurrent append lands in exactly one of the two.
        let backlog = self.log.history(task_id)?;
        let receiver = channel.sender.subscribe();

        Ok(Subscription {
            backlog: backlog.into(),
            receiver,
        })
    }

    /// Historical log replay, sequence ascending. Safe to call many times.
    pub fn history(&self, task_id: &str) -> Result<Vec<TaskEvent>, EventBusError> {
        Ok(self.log.history(task_id)?)
    }

    /// Drop the in-memory channel for a task.
    ///
    /// Called once a task is terminal. Live subscribers drain whatever is
    /// already buffered (including the terminal event) and then see the
    /// stream end. The durable log is untouched.
    pub fn release(&self, task_id: &str) {
        if self.channels.lock().unwrap().remove(task_id).is_some() {
            debug!(task_id, "released event channel");
        }
    }

    /// Number of tasks with a live channel.
    pub fn live_channels(&self) -> usize {
        self.channels.lock().unwrap().len()
    }
}

/// A live observer of one task's event stream.
///
/// Yields the historical backlog first, then live events. Dropping the
/// subscription releases its buffer and has no effect on the task or on
/// other subscribers.
pub struct Subscription {
    backlog: VecDeque<TaskEvent>,
    receiver: broadcast::Receiver<TaskEvent>,
}

impl Subscription {
    /// Next event, replay before live. Returns `Ok(None)` when the stream
    /// is closed, or `Backpressure` if this subscriber fell too far behind.
    pub async fn next(&mut self) -> Result<Option<TaskEvent>, EventBusError> {
        if let Some(event) = self.backlog.pop_front() {
            return Ok(Some(event));
        }

        match self.receiver.recv().await {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Err(EventBusError::Backpressure { skipped })
            }
            Err(broadcast::error::RecvError::Closed) => Ok(None),
        }
    }

    /// Number of replayed events still queued.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}
