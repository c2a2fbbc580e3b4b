//! Event scheduler: one-shot timed callbacks with second granularity.
//!
//! Events are bucketed by the whole second they fall due in. A background loop
//! wakes once per tick, pops every bucket whose second has arrived and runs the
//! actions sequentially, outside the registry lock.
//!
//! Firing and cancellation both go through the same registry lock, so for any
//! event exactly one of them wins: a popped event can no longer be cancelled
//! and a cancelled event is never popped.
//!
//! A separate firing lock is held for a whole `run_due` pass. A loop that is
//! still draining after `stop` and the loop spawned by the next `start` take
//! turns, so two actions never run at the same time.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;

/// Zero-argument callback run when an event falls due.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

/// Identifies one registration. Cancelling it after it fired is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    id: EventId,
    due: i64,
}

impl EventHandle {
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Unix second the event is bucketed under.
    pub fn due_second(&self) -> i64 {
        self.due
    }
}

struct ScheduledEvent {
    due: DateTime<Utc>,
    action: Action,
}

#[derive(Default)]
struct Registry {
    events: HashMap<EventId, ScheduledEvent>,
    buckets: BTreeMap<i64, Vec<EventId>>,
}

impl Registry {
    fn insert(&mut self, id: EventId, second: i64, event: ScheduledEvent) {
        self.events.insert(id, event);
        self.buckets.entry(second).or_default().push(id);
    }

    fn remove(&mut self, handle: &EventHandle) -> bool {
        if self.events.remove(&handle.id).is_none() {
            return false;
        }
        if let Some(bucket) = self.buckets.get_mut(&handle.due) {
            bucket.retain(|id| *id != handle.id);
            if bucket.is_empty() {
                self.buckets.remove(&handle.due);
            }
        }
        true
    }

    /// Remove and return every event due at or before `second`.
    fn take_due(&mut self, second: i64) -> Vec<(EventId, ScheduledEvent)> {
        let later = self.buckets.split_off(&second.saturating_add(1));
        let due = std::mem::replace(&mut self.buckets, later);

        due.into_values()
            .flatten()
            .filter_map(|id| self.events.remove(&id).map(|event| (id, event)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the loop checks for due events.
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
        }
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl LoopHandle {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

pub struct EventScheduler {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    running: Mutex<Option<LoopHandle>>,
    firing: Mutex<()>,
    failed_actions: AtomicU64,
}

impl EventScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, SchedulerConfig::default())
    }

    pub fn with_config(clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
            clock,
            config,
            running: Mutex::new(None),
            firing: Mutex::new(()),
            failed_actions: AtomicU64::new(0),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Register `action` to run at `time`. Past times fire on the next tick.
    pub fn schedule<F>(&self, time: DateTime<Utc>, action: F) -> EventHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let id = EventId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let due = time.timestamp();

        self.registry().insert(
            id,
            due,
            ScheduledEvent {
                due: time,
                action: Box::new(action),
            },
        );

        tracing::trace!(event = %id, due = %time, "Event scheduled");
        EventHandle { id, due }
    }

    /// Drop a pending registration. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&self, handle: &EventHandle) -> bool {
        let removed = self.registry().remove(handle);
        if removed {
            tracing::trace!(event = %handle.id, "Event cancelled");
        }
        removed
    }

    /// Fire every event due at `now`. Returns how many actions ran.
    ///
    /// The registry lock is released before any action runs, so actions may
    /// schedule or cancel events themselves. Concurrent callers are
    /// serialized; an action must not call `run_due`.
    pub fn run_due(&self, now: DateTime<Utc>) -> usize {
        let _firing = self.firing.lock().unwrap_or_else(|e| e.into_inner());
        let ready = self.registry().take_due(now.timestamp());
        let fired = ready.len();

        for (id, ScheduledEvent { due, action }) in ready {
            tracing::trace!(event = %id, due = %due, "Firing event");
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(action)) {
                self.failed_actions.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    event = %id,
                    due = %due,
                    error = panic_message(payload.as_ref()),
                    "Scheduled action failed"
                );
            }
        }

        fired
    }

    /// Start the background loop. Calling this while the loop runs does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.as_ref().is_some_and(LoopHandle::is_live) {
            tracing::debug!("Event scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::downgrade(self),
            self.config.tick,
            cancel.clone(),
        ));
        *running = Some(LoopHandle { cancel, task });

        tracing::info!(tick = ?self.config.tick, "Event scheduler started");
    }

    /// Signal the loop to exit. An action already running is not interrupted;
    /// a loop started afterwards waits for it before firing anything.
    pub fn stop(&self) {
        let handle = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            tracing::info!("Event scheduler stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(LoopHandle::is_live)
    }

    /// Number of events still waiting to fire.
    pub fn pending(&self) -> usize {
        self.registry().events.len()
    }

    /// Number of actions that panicked since creation.
    pub fn failed_actions(&self) -> u64 {
        self.failed_actions.load(Ordering::Relaxed)
    }
}

impl Drop for EventScheduler {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock()
            && let Some(handle) = running.take()
        {
            handle.cancel.cancel();
        }
    }
}

async fn run_loop(scheduler: Weak<EventScheduler>, tick: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Some(scheduler) = scheduler.upgrade() else {
            break;
        };
        let now = scheduler.clock.now();
        let fired = scheduler.run_due(now);
        if fired > 0 {
            tracing::debug!(fired, "Scheduler tick");
        }
    }

    tracing::info!("Event scheduler stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
