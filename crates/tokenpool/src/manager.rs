//! Lease manager - the token state machine.
//!
//! Every live token carries an idle-expiry timer that deletes it. The timer
//! is armed by `generate` and only moved by `keep_alive`; assigning and
//! unassigning leave it alone. An allocated token also carries an
//! allocation-expiry timer that returns it to the pool. `token.expiry` is
//! the due time of the allocation timer while allocated, and of the idle
//! timer otherwise.
//!
//! Pool and timer bookkeeping share one mutex. Timer actions hold only a weak
//! reference to the manager plus the token id and a generation number, and
//! re-check the bookkeeping when they fire. A timer that was replaced after
//! the scheduler popped it finds a newer generation and does nothing.
//!
//! Lock order: manager state, then scheduler registry. The scheduler never
//! runs an action while holding its own lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::deadline;
use crate::error::{LeaseError, Result};
use crate::pool::{Token, TokenId, TokenPool};
use crate::scheduler::{EventHandle, EventScheduler};

pub const DEFAULT_KEEPALIVE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_ASSIGN_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseConfig {
    /// Idle lifetime of an available token, and the extension granted by keep-alive.
    pub keepalive_ttl: Duration,
    /// How long an assignment lasts without a keep-alive.
    pub assign_ttl: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            keepalive_ttl: DEFAULT_KEEPALIVE_TTL,
            assign_ttl: DEFAULT_ASSIGN_TTL,
        }
    }
}

impl LeaseConfig {
    pub fn with_keepalive_ttl(mut self, ttl: Duration) -> Self {
        self.keepalive_ttl = ttl;
        self
    }

    pub fn with_assign_ttl(mut self, ttl: Duration) -> Self {
        self.assign_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKind {
    IdleExpiry,
    AllocationExpiry,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::IdleExpiry => f.write_str("idle-expiry"),
            TimerKind::AllocationExpiry => f.write_str("allocation-expiry"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    handle: EventHandle,
    generation: u64,
    due: DateTime<Utc>,
}

#[derive(Default)]
struct LeaseState {
    pool: TokenPool,
    idle_timers: HashMap<TokenId, Timer>,
    allocation_timers: HashMap<TokenId, Timer>,
    next_generation: u64,
}

impl LeaseState {
    fn timers(&self, kind: TimerKind) -> &HashMap<TokenId, Timer> {
        match kind {
            TimerKind::IdleExpiry => &self.idle_timers,
            TimerKind::AllocationExpiry => &self.allocation_timers,
        }
    }

    fn timers_mut(&mut self, kind: TimerKind) -> &mut HashMap<TokenId, Timer> {
        match kind {
            TimerKind::IdleExpiry => &mut self.idle_timers,
            TimerKind::AllocationExpiry => &mut self.allocation_timers,
        }
    }
}

/// Pool occupancy, for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub allocated: usize,
}

pub struct LeaseManager {
    state: Mutex<LeaseState>,
    scheduler: Arc<EventScheduler>,
    config: LeaseConfig,
    this: Weak<LeaseManager>,
}

impl LeaseManager {
    pub fn new(scheduler: Arc<EventScheduler>, config: LeaseConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            state: Mutex::new(LeaseState::default()),
            scheduler,
            config,
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<EventScheduler> {
        &self.scheduler
    }

    fn state(&self) -> MutexGuard<'_, LeaseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn now(&self) -> DateTime<Utc> {
        self.scheduler.clock().now()
    }

    /// Create an available token that expires after `keepalive_ttl` unless kept alive.
    pub fn generate(&self) -> Token {
        let expiry = deadline(self.now(), self.config.keepalive_ttl);
        let token = Token::new(TokenId::new(), expiry);

        let mut state = self.state();
        state.pool.add(token.clone());
        self.arm(&mut state, TimerKind::IdleExpiry, &token.id, expiry);
        drop(state);

        tracing::info!(token = %token.id, expiry = %expiry, "Token generated");
        token
    }

    /// Allocate the oldest available token for `assign_ttl`. The idle clock keeps running.
    ///
    /// `None` means the pool is exhausted.
    pub fn assign(&self) -> Option<Token> {
        let expiry = deadline(self.now(), self.config.assign_ttl);

        let mut state = self.state();
        let Some(token) = state.pool.assign() else {
            tracing::debug!("Assign found no available token");
            return None;
        };
        self.arm(&mut state, TimerKind::AllocationExpiry, &token.id, expiry);
        let token = set_expiry(&mut state.pool, &token.id, expiry)?;
        drop(state);

        tracing::info!(token = %token.id, expiry = %expiry, "Token assigned");
        Some(token)
    }

    /// Return an allocated token to the pool. Already-available tokens are left alone.
    pub fn unassign(&self, id: &TokenId) -> Result<()> {
        let mut state = self.state();
        if !state.pool.contains(id) {
            return Err(LeaseError::NotFound(id.clone()));
        }
        if self.release(&mut state, id) {
            tracing::info!(token = %id, "Token unassigned");
        }
        Ok(())
    }

    /// Remove a token and cancel its timers. Returns `false` if it was already gone.
    pub fn delete(&self, id: &TokenId) -> bool {
        let mut state = self.state();
        let removed = self.remove(&mut state, id).is_some();
        drop(state);

        if removed {
            tracing::info!(token = %id, "Token deleted");
        }
        removed
    }

    /// Push every pending timer of the token out to `now + keepalive_ttl`.
    pub fn keep_alive(&self, id: &TokenId) -> Result<Token> {
        let expiry = deadline(self.now(), self.config.keepalive_ttl);

        let mut state = self.state();
        let allocated = match state.pool.get(id) {
            Some(token) => token.allocated,
            None => return Err(LeaseError::NotFound(id.clone())),
        };

        for kind in [TimerKind::AllocationExpiry, TimerKind::IdleExpiry] {
            let required = kind == TimerKind::IdleExpiry || allocated;
            if state.timers(kind).contains_key(id) {
                self.arm(&mut state, kind, id, expiry);
            } else if required {
                tracing::warn!(token = %id, timer = %kind, "Live token was missing a timer, re-arming");
                self.arm(&mut state, kind, id, expiry);
            }
        }

        let token = set_expiry(&mut state.pool, id, expiry)
            .ok_or_else(|| LeaseError::NotFound(id.clone()))?;
        drop(state);

        tracing::debug!(token = %id, expiry = %expiry, "Token kept alive");
        Ok(token)
    }

    pub fn get(&self, id: &TokenId) -> Result<Token> {
        self.state()
            .pool
            .get(id)
            .cloned()
            .ok_or_else(|| LeaseError::NotFound(id.clone()))
    }

    pub fn list(&self) -> Vec<Token> {
        self.state().pool.list()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state();
        let total = state.pool.len();
        let available = state.pool.available();
        PoolStats {
            total,
            available,
            allocated: total - available,
        }
    }

    /// Allocated -> Available. Returns `false` if nothing changed.
    fn release(&self, state: &mut LeaseState, id: &TokenId) -> bool {
        self.disarm(state, TimerKind::AllocationExpiry, id);
        if !state.pool.unassign(id) {
            return false;
        }
        if let Some(due) = state.idle_timers.get(id).map(|timer| timer.due) {
            set_expiry(&mut state.pool, id, due);
        }
        true
    }

    fn remove(&self, state: &mut LeaseState, id: &TokenId) -> Option<Token> {
        self.disarm(state, TimerKind::AllocationExpiry, id);
        self.disarm(state, TimerKind::IdleExpiry, id);
        state.pool.delete(id)
    }

    /// Schedule a timer of `kind` for `id`, replacing (and cancelling) any previous one.
    fn arm(&self, state: &mut LeaseState, kind: TimerKind, id: &TokenId, due: DateTime<Utc>) {
        state.next_generation += 1;
        let generation = state.next_generation;

        let manager = self.this.clone();
        let token = id.clone();
        let handle = self.scheduler.schedule(due, move || {
            if let Some(manager) = manager.upgrade() {
                manager.expire(kind, &token, generation);
            }
        });

        let timer = Timer {
            handle,
            generation,
            due,
        };
        if let Some(previous) = state.timers_mut(kind).insert(id.clone(), timer) {
            self.scheduler.cancel(&previous.handle);
        }
        tracing::debug!(token = %id, timer = %kind, event = %handle.id(), due = %due, "Timer armed");
    }

    fn disarm(&self, state: &mut LeaseState, kind: TimerKind, id: &TokenId) -> bool {
        let Some(timer) = state.timers_mut(kind).remove(id) else {
            return false;
        };
        self.scheduler.cancel(&timer.handle);
        tracing::debug!(token = %id, timer = %kind, event = %timer.handle.id(), "Timer cancelled");
        true
    }

    /// Timer callback. Ignored unless `generation` is still the armed timer.
    fn expire(&self, kind: TimerKind, id: &TokenId, generation: u64) {
        let mut state = self.state();
        let armed = state.timers(kind).get(id).map(|timer| timer.generation);
        if armed != Some(generation) {
            tracing::debug!(token = %id, timer = %kind, "Stale timer ignored");
            return;
        }
        state.timers_mut(kind).remove(id);

        match kind {
            TimerKind::IdleExpiry => {
                if self.remove(&mut state, id).is_some() {
                    tracing::info!(token = %id, "Token expired");
                }
            }
            TimerKind::AllocationExpiry => {
                if self.release(&mut state, id) {
                    tracing::info!(token = %id, "Assignment expired, token returned to pool");
                }
            }
        }
    }
}

fn set_expiry(pool: &mut TokenPool, id: &TokenId, expiry: DateTime<Utc>) -> Option<Token> {
    let token = pool.get_mut(id)?;
    token.expiry = expiry;
    Some(token.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    struct Harness {
        clock: Arc<ManualClock>,
        scheduler: Arc<EventScheduler>,
        manager: Arc<LeaseManager>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(LeaseConfig::default())
        }

        fn with_config(config: LeaseConfig) -> Self {
            let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
            let clock = Arc::new(ManualClock::new(start));
            let scheduler = Arc::new(EventScheduler::new(clock.clone()));
            let manager = LeaseManager::new(Arc::clone(&scheduler), config);
            Self {
                clock,
                scheduler,
                manager,
            }
        }

        /// Move the clock forward and run one scheduler tick.
        fn advance(&self, secs: u64) {
            self.clock.advance(Duration::from_secs(secs));
            self.scheduler.run_due(self.clock.now());
        }

        fn timers(&self, id: &TokenId) -> (Option<Timer>, Option<Timer>) {
            let state = self.manager.state();
            (
                state.idle_timers.get(id).copied(),
                state.allocation_timers.get(id).copied(),
            )
        }

        fn assert_invariants(&self) {
            let state = self.manager.state();
            for token in state.pool.list() {
                assert_eq!(state.pool.is_available(&token.id), !token.allocated);

                let idle = state.idle_timers.get(&token.id);
                let allocation = state.allocation_timers.get(&token.id);
                let Some(idle) = idle else {
                    panic!("token {} has no idle-expiry timer", token.id);
                };
                assert_eq!(
                    allocation.is_some(),
                    token.allocated,
                    "token {} allocated={} with allocation timer {:?}",
                    token.id,
                    token.allocated,
                    allocation
                );
                let governing = allocation.unwrap_or(idle);
                assert_eq!(token.expiry, governing.due);
                assert_eq!(governing.due.timestamp(), governing.handle.due_second());
            }
            assert!(state.idle_timers.keys().all(|id| state.pool.contains(id)));
            assert!(state.allocation_timers.keys().all(|id| state.pool.contains(id)));
            assert_eq!(
                self.scheduler.pending(),
                state.idle_timers.len() + state.allocation_timers.len()
            );
        }
    }

    #[test]
    fn generate_arms_idle_timer() {
        let h = Harness::new();
        let token = h.manager.generate();

        assert!(!token.allocated);
        assert_eq!(token.expiry, deadline(h.clock.now(), DEFAULT_KEEPALIVE_TTL));

        let (idle, allocation) = h.timers(&token.id);
        assert!(idle.is_some());
        assert!(allocation.is_none());
        h.assert_invariants();
    }

    #[test]
    fn untouched_token_expires_after_keepalive_ttl() {
        let h = Harness::new();
        let id = h.manager.generate().id;

        h.advance(59);
        assert!(h.manager.get(&id).is_ok());

        h.advance(2);
        assert_eq!(h.manager.get(&id), Err(LeaseError::NotFound(id.clone())));
        assert_eq!(h.scheduler.pending(), 0);
        h.assert_invariants();
    }

    #[test]
    fn assign_keeps_idle_timer() {
        let h = Harness::new();
        let id = h.manager.generate().id;
        let (idle_before, _) = h.timers(&id);

        let token = h.manager.assign().unwrap();
        assert_eq!(token.id, id);
        assert!(token.allocated);
        assert_eq!(token.expiry, deadline(h.clock.now(), DEFAULT_ASSIGN_TTL));

        let (idle_after, allocation) = h.timers(&id);
        assert_eq!(idle_before.unwrap().handle, idle_after.unwrap().handle);
        assert!(allocation.is_some());
        assert_eq!(h.scheduler.pending(), 2);
        h.assert_invariants();
    }

    #[test]
    fn allocation_expiry_returns_token_to_pool() {
        let h = Harness::new();
        let created = h.clock.now();
        let id = h.manager.generate().id;
        h.manager.assign().unwrap();

        h.advance(29);
        assert!(h.manager.get(&id).unwrap().allocated);

        h.advance(2);
        let token = h.manager.get(&id).unwrap();
        assert!(!token.allocated);
        assert_eq!(token.expiry, deadline(created, DEFAULT_KEEPALIVE_TTL));
        h.assert_invariants();

        // The idle clock started at generate and was never reset.
        h.advance(28);
        assert!(h.manager.get(&id).is_ok());
        h.advance(1);
        assert!(h.manager.get(&id).is_err());
        h.assert_invariants();
    }

    #[test]
    fn allocated_untouched_token_is_deleted_at_keepalive_ttl() {
        let h = Harness::new();
        let id = h.manager.generate().id;
        h.advance(1);
        h.manager.assign().unwrap();

        for _ in 1..59 {
            h.advance(1);
            assert!(h.manager.get(&id).is_ok());
            h.assert_invariants();
        }

        h.advance(1);
        assert_eq!(h.manager.get(&id), Err(LeaseError::NotFound(id.clone())));
        assert_eq!(h.scheduler.pending(), 0);

        for _ in 0..2 {
            h.advance(1);
        }
        assert!(h.manager.list().is_empty());
    }

    #[test]
    fn idle_clock_deletes_token_while_still_allocated() {
        let h = Harness::with_config(
            LeaseConfig::default().with_assign_ttl(Duration::from_secs(120)),
        );
        let id = h.manager.generate().id;
        h.advance(1);
        h.manager.assign().unwrap();

        h.advance(58);
        assert!(h.manager.get(&id).unwrap().allocated);

        h.advance(1);
        assert!(h.manager.get(&id).is_err());
        assert!(h.timers(&id).1.is_none());
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[test]
    fn unassign_leaves_idle_timer_untouched() {
        let h = Harness::new();
        let created = h.clock.now();
        let id = h.manager.generate().id;
        let (idle_before, _) = h.timers(&id);

        h.advance(5);
        h.manager.assign().unwrap();
        h.advance(5);
        h.manager.unassign(&id).unwrap();

        let (idle_after, allocation) = h.timers(&id);
        assert_eq!(idle_before.unwrap().handle, idle_after.unwrap().handle);
        assert_eq!(idle_before.unwrap().generation, idle_after.unwrap().generation);
        assert!(allocation.is_none());

        let token = h.manager.get(&id).unwrap();
        assert!(!token.allocated);
        assert_eq!(token.expiry, deadline(created, DEFAULT_KEEPALIVE_TTL));
        assert_eq!(h.scheduler.pending(), 1);
        h.assert_invariants();
    }

    #[test]
    fn keep_alive_refreshes_both_timers() {
        let h = Harness::new();
        let id = h.manager.generate().id;
        h.manager.assign().unwrap();
        let (idle_before, allocation_before) = h.timers(&id);

        h.advance(20);
        let token = h.manager.keep_alive(&id).unwrap();
        let expected = deadline(h.clock.now(), DEFAULT_KEEPALIVE_TTL);
        assert_eq!(token.expiry, expected);

        let (idle, allocation) = h.timers(&id);
        assert_ne!(idle.unwrap().handle, idle_before.unwrap().handle);
        assert_ne!(allocation.unwrap().handle, allocation_before.unwrap().handle);
        assert_eq!(idle.unwrap().due, expected);
        assert_eq!(allocation.unwrap().due, expected);
        assert_eq!(h.scheduler.pending(), 2);
        h.assert_invariants();

        // Without the keep-alive the assignment would have lapsed at T+30.
        h.advance(25);
        assert!(h.manager.get(&id).unwrap().allocated);

        h.advance(34);
        assert!(h.manager.get(&id).unwrap().allocated);

        // Both timers come due at T+80: unassigned, then deleted.
        h.advance(1);
        assert!(h.manager.get(&id).is_err());
        assert_eq!(h.scheduler.pending(), 0);
        h.assert_invariants();
    }

    #[test]
    fn keep_alive_extends_idle_token() {
        let h = Harness::new();
        let id = h.manager.generate().id;

        h.advance(50);
        h.manager.keep_alive(&id).unwrap();

        h.advance(50);
        assert!(h.manager.get(&id).is_ok());

        h.advance(10);
        assert!(h.manager.get(&id).is_err());
    }

    #[test]
    fn keep_alive_replaces_timer() {
        let h = Harness::new();
        let id = h.manager.generate().id;
        let (before, _) = h.timers(&id);

        h.manager.keep_alive(&id).unwrap();
        let (after, _) = h.timers(&id);

        assert_ne!(before.unwrap().handle, after.unwrap().handle);
        assert_eq!(h.scheduler.pending(), 1);
    }

    #[test]
    fn assign_reports_exhaustion() {
        let h = Harness::new();
        for _ in 0..3 {
            h.manager.generate();
        }
        for _ in 0..3 {
            assert!(h.manager.assign().is_some());
        }

        assert!(h.manager.assign().is_none());
        assert_eq!(
            h.manager.stats(),
            PoolStats {
                total: 3,
                available: 0,
                allocated: 3
            }
        );
        h.assert_invariants();
    }

    #[test]
    fn assign_on_empty_pool() {
        let h = Harness::new();
        assert!(h.manager.assign().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let h = Harness::new();
        let id = h.manager.generate().id;
        h.manager.assign().unwrap();

        assert!(h.manager.delete(&id));
        assert!(!h.manager.delete(&id));

        assert_eq!(h.scheduler.pending(), 0);
        assert!(h.manager.list().is_empty());
        h.assert_invariants();
    }

    #[test]
    fn unassign_available_token_is_noop() {
        let h = Harness::new();
        let id = h.manager.generate().id;
        let (before, _) = h.timers(&id);

        h.manager.unassign(&id).unwrap();
        h.manager.unassign(&id).unwrap();

        let (after, _) = h.timers(&id);
        assert_eq!(before.unwrap().handle, after.unwrap().handle);
        h.assert_invariants();
    }

    #[test]
    fn unknown_ids_report_not_found() {
        let h = Harness::new();
        let id = TokenId::from("missing");

        assert_eq!(h.manager.unassign(&id), Err(LeaseError::NotFound(id.clone())));
        assert_eq!(h.manager.keep_alive(&id), Err(LeaseError::NotFound(id.clone())));
        assert_eq!(h.manager.get(&id), Err(LeaseError::NotFound(id.clone())));
        assert!(!h.manager.delete(&id));
    }

    #[test]
    fn reassign_after_unassign_gets_fresh_timer() {
        let h = Harness::new();
        let id = h.manager.generate().id;

        h.manager.assign().unwrap();
        let (_, first) = h.timers(&id);

        h.manager.unassign(&id).unwrap();
        h.advance(5);

        let token = h.manager.assign().unwrap();
        assert_eq!(token.id, id);
        assert_eq!(token.expiry, deadline(h.clock.now(), DEFAULT_ASSIGN_TTL));

        let (_, second) = h.timers(&id);
        assert_ne!(first.unwrap().handle, second.unwrap().handle);
        h.assert_invariants();
    }

    #[test]
    fn stale_timer_does_not_act() {
        let h = Harness::new();
        let id = h.manager.generate().id;
        h.manager.assign().unwrap();
        let (_, stale) = h.timers(&id);

        // The scheduler popped the old timer, then keep-alive replaced it
        // before the action got to run.
        h.manager.keep_alive(&id).unwrap();
        h.manager
            .expire(TimerKind::AllocationExpiry, &id, stale.unwrap().generation);

        assert!(h.manager.get(&id).unwrap().allocated);
        h.assert_invariants();
    }

    #[test]
    fn custom_ttls_apply() {
        let h = Harness::with_config(
            LeaseConfig::default()
                .with_keepalive_ttl(Duration::from_secs(10))
                .with_assign_ttl(Duration::from_secs(5)),
        );
        let kept = h.manager.generate().id;
        let idle = h.manager.generate().id;
        h.manager.assign().unwrap();

        h.advance(6);
        assert!(!h.manager.get(&kept).unwrap().allocated);
        h.manager.keep_alive(&kept).unwrap();

        h.advance(5);
        assert!(h.manager.get(&idle).is_err());
        assert!(h.manager.get(&kept).is_ok());

        h.advance(5);
        assert!(h.manager.get(&kept).is_err());
    }

    #[test]
    fn timers_are_inert_after_manager_drop() {
        let h = Harness::new();
        h.manager.generate();
        let Harness {
            clock,
            scheduler,
            manager,
        } = h;
        drop(manager);

        clock.advance(Duration::from_secs(120));
        assert_eq!(scheduler.run_due(clock.now()), 1);
        assert_eq!(scheduler.failed_actions(), 0);
    }

    #[test]
    fn concurrent_callers_and_timers_keep_invariants() {
        let h = Harness::with_config(
            LeaseConfig::default()
                .with_keepalive_ttl(Duration::from_secs(3))
                .with_assign_ttl(Duration::from_secs(2)),
        );

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for i in 0..200 {
                        let id = h.manager.generate().id;
                        if let Some(token) = h.manager.assign() {
                            match i % 3 {
                                0 => {
                                    let _ = h.manager.keep_alive(&token.id);
                                }
                                1 => {
                                    let _ = h.manager.unassign(&token.id);
                                }
                                _ => {
                                    h.manager.delete(&token.id);
                                }
                            }
                        }
                        if i % 5 == 0 {
                            h.manager.delete(&id);
                        }
                    }
                });
            }
            s.spawn(|| {
                for _ in 0..50 {
                    h.advance(1);
                    std::thread::yield_now();
                }
            });
        });

        h.assert_invariants();
        let stats = h.manager.stats();
        assert_eq!(stats.total, stats.available + stats.allocated);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_expires_tokens() {
        let h = Harness::new();
        h.scheduler.start();

        let id = h.manager.generate().id;
        h.clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(h.manager.get(&id).is_err());
        h.scheduler.stop();
    }
}
