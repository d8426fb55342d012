//! Per-task progress registry.
//!
//! A [`ProgressEmitter`] maps task ids to append-only event logs. Producers
//! push [`ProgressEvent`]s; any number of [`Subscription`]s read the log from
//! the start, so a subscriber that attaches late still sees the terminal
//! event. A task's entry is dropped after a retention window once it has
//! finished.

use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, warn};

use mdigest_shared::{ProgressConfig, ProgressEvent, TaskId};

/// Default time a finished task stays resolvable.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// TaskChannel
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TaskLog {
    events: Vec<ProgressEvent>,
    /// A terminal event has been appended.
    finished: bool,
    /// The entry was reaped; no more events will arrive.
    closed: bool,
}

/// Event log of one task plus a wake-up signal for its subscribers.
#[derive(Debug, Default)]
pub struct TaskChannel {
    log: Mutex<TaskLog>,
    notify: Notify,
}

impl TaskChannel {
    fn lock(&self) -> MutexGuard<'_, TaskLog> {
        // A poisoned log is still a valid append-only Vec.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an event. Returns `false` if the task already finished.
    fn push(&self, event: ProgressEvent) -> bool {
        {
            let mut log = self.lock();
            if log.finished || log.closed {
                return false;
            }
            log.finished = event.is_terminal();
            log.events.push(event);
        }
        self.notify.notify_waiters();
        true
    }

    fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Number of events appended so far.
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// TaskHandle
// ---------------------------------------------------------------------------

/// Returned by [`ProgressEmitter::create_task`].
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    channel: Arc<TaskChannel>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Whether the task has emitted its terminal event.
    pub fn is_finished(&self) -> bool {
        self.channel.is_finished()
    }
}

// ---------------------------------------------------------------------------
// ProgressEmitter
// ---------------------------------------------------------------------------

/// Registry of live tasks. Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tasks: Arc<DashMap<TaskId, Arc<TaskChannel>>>,
    retention: Duration,
}

impl Default for ProgressEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl ProgressEmitter {
    pub fn new(retention: Duration) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            retention,
        }
    }

    pub fn from_config(config: &ProgressConfig) -> Self {
        Self::new(Duration::from_secs(config.retention_secs))
    }

    /// Register a new task with an empty log.
    pub fn create_task(&self) -> TaskHandle {
        let id = TaskId::new();
        let channel = Arc::new(TaskChannel::default());
        self.tasks.insert(id.clone(), Arc::clone(&channel));
        debug!(task_id = %id, "task created");
        TaskHandle { id, channel }
    }

    /// Append `event` to the task's log and wake its subscribers.
    ///
    /// Events for unknown tasks, and events after the terminal one, are
    /// dropped. A terminal event schedules removal of the entry after the
    /// retention window.
    pub fn emit(&self, id: &TaskId, event: ProgressEvent) {
        let Some(channel) = self.tasks.get(id).map(|entry| Arc::clone(entry.value())) else {
            warn!(task_id = %id, ?event, "event for unknown task dropped");
            return;
        };

        let terminal = event.is_terminal();
        if !channel.push(event) {
            warn!(task_id = %id, "event after terminal event dropped");
            return;
        }

        if terminal {
            self.schedule_removal(id.clone(), channel);
        }
    }

    fn schedule_removal(&self, id: TaskId, channel: Arc<TaskChannel>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(task_id = %id, "no runtime, finished task kept until reaped");
            return;
        };

        let tasks = Arc::clone(&self.tasks);
        let retention = self.retention;
        runtime.spawn(async move {
            tokio::time::sleep(retention).await;
            if tasks
                .remove_if(&id, |_, current| Arc::ptr_eq(current, &channel))
                .is_some()
            {
                channel.close();
                debug!(task_id = %id, "finished task removed");
            }
        });
    }

    /// Open a stream over the task's events, starting from the first one.
    ///
    /// Subscribing to an unknown id never blocks: the subscription yields a
    /// single "not found" message and ends.
    pub fn subscribe(&self, id: &TaskId) -> Subscription {
        let state = match self.tasks.get(id) {
            Some(entry) => SubscriptionState::Live {
                channel: Arc::clone(entry.value()),
                cursor: 0,
            },
            None => SubscriptionState::Missing(id.clone()),
        };
        Subscription { state }
    }

    /// Remove the task's entry now. Live subscriptions still drain the
    /// events already logged, then end.
    pub fn reap(&self, id: &TaskId) -> bool {
        match self.tasks.remove(id) {
            Some((_, channel)) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum SubscriptionState {
    Live {
        channel: Arc<TaskChannel>,
        cursor: usize,
    },
    Missing(TaskId),
    Done,
}

/// Pull-based reader over one task's event log.
#[derive(Debug)]
pub struct Subscription {
    state: SubscriptionState,
}

impl Subscription {
    /// Next event, or `None` once the terminal event has been delivered or
    /// the task was reaped and drained.
    ///
    /// Cancel-safe: dropping the future never loses an event.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            let channel = match &mut self.state {
                SubscriptionState::Done => return None,
                SubscriptionState::Missing(id) => {
                    let event = ProgressEvent::message(format!("task {id} not found"));
                    self.state = SubscriptionState::Done;
                    return Some(event);
                }
                SubscriptionState::Live { channel, .. } => Arc::clone(channel),
            };

            // Register for wake-ups before looking at the log so a push
            // between the check and the await is not missed.
            let mut notified = pin!(channel.notify.notified());
            notified.as_mut().enable();

            if let Some(event) = self.poll_log(&channel) {
                return event;
            }

            notified.await;
        }
    }

    /// `Some(result)` when the log decides the outcome without waiting.
    fn poll_log(&mut self, channel: &TaskChannel) -> Option<Option<ProgressEvent>> {
        let SubscriptionState::Live { cursor, .. } = &mut self.state else {
            return Some(None);
        };

        let log = channel.lock();
        if let Some(event) = log.events.get(*cursor).cloned() {
            *cursor += 1;
            if event.is_terminal() {
                drop(log);
                self.state = SubscriptionState::Done;
            }
            return Some(Some(event));
        }

        if log.closed {
            drop(log);
            self.state = SubscriptionState::Done;
            return Some(None);
        }
        None
    }
}
