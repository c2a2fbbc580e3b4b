//! TokenService: transport-agnostic facade over the lease engine.
//!
//! This service owns:
//! - The event scheduler and its background loop
//! - The lease manager (pool + timer bookkeeping)
//! - Health tracking and shutdown coordination
//!
//! Transports translate requests into these calls and map `LeaseError` to
//! their own status codes.

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::clock::{Clock, SystemClock};
use crate::error::{LeaseError, Result};
use crate::health::Health;
use crate::manager::{LeaseConfig, LeaseManager, PoolStats};
use crate::pool::{Token, TokenId};
use crate::scheduler::{EventScheduler, SchedulerConfig};
use crate::version::VersionInfo;

/// Snapshot of service health for transports to query.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub state: Health,
    pub tokens: PoolStats,
    pub pending_timers: usize,
    pub failed_actions: u64,
    pub version: VersionInfo,
}

impl HealthSnapshot {
    pub fn is_ready(&self) -> bool {
        self.state == Health::Ready
    }

    /// BUSY state: ready, tokens exist, none available.
    pub fn is_busy(&self) -> bool {
        self.is_ready() && self.tokens.total > 0 && self.tokens.available == 0
    }
}

pub struct TokenService {
    scheduler: Arc<EventScheduler>,
    manager: Arc<LeaseManager>,

    health: RwLock<Health>,

    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,

    version: VersionInfo,
}

impl TokenService {
    pub fn new(config: LeaseConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock), SchedulerConfig::default())
    }

    pub fn with_clock(
        config: LeaseConfig,
        clock: Arc<dyn Clock>,
        scheduler_config: SchedulerConfig,
    ) -> Self {
        let scheduler = Arc::new(EventScheduler::with_config(clock, scheduler_config));
        let manager = LeaseManager::new(Arc::clone(&scheduler), config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            scheduler,
            manager,
            health: RwLock::new(Health::Starting),
            shutdown_tx,
            shutdown_rx,
            version: VersionInfo::new(),
        }
    }

    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = version;
        self
    }

    pub fn manager(&self) -> &Arc<LeaseManager> {
        &self.manager
    }

    pub fn scheduler(&self) -> &Arc<EventScheduler> {
        &self.scheduler
    }

    /// Start the expiry loop and mark the service READY.
    pub async fn start(&self) {
        self.scheduler.start();
        *self.health.write().await = Health::Ready;
        tracing::info!(
            keepalive_ttl = ?self.manager.config().keepalive_ttl,
            assign_ttl = ?self.manager.config().assign_ttl,
            "Token service ready"
        );
    }

    /// Stop the expiry loop. Tokens stay in memory but no longer expire.
    pub async fn shutdown(&self) {
        self.scheduler.stop();
        *self.health.write().await = Health::Stopped;
        tracing::info!("Token service stopped");
    }

    pub async fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: *self.health.read().await,
            tokens: self.manager.stats(),
            pending_timers: self.scheduler.pending(),
            failed_actions: self.scheduler.failed_actions(),
            version: self.version.clone(),
        }
    }

    pub fn generate(&self) -> Token {
        self.manager.generate()
    }

    pub fn assign(&self) -> Result<Token> {
        self.manager.assign().ok_or(LeaseError::PoolExhausted)
    }

    pub fn unassign(&self, id: &TokenId) -> Result<()> {
        self.manager.unassign(id)
    }

    pub fn keep_alive(&self, id: &TokenId) -> Result<Token> {
        self.manager.keep_alive(id)
    }

    pub fn delete(&self, id: &TokenId) -> Result<()> {
        if self.manager.delete(id) {
            Ok(())
        } else {
            Err(LeaseError::NotFound(id.clone()))
        }
    }

    pub fn get(&self, id: &TokenId) -> Result<Token> {
        self.manager.get(id)
    }

    pub fn list(&self) -> Vec<Token> {
        self.manager.list()
    }

    /// Request shutdown (e.g. from an HTTP endpoint).
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Resolves once `trigger_shutdown` has been called, including before this was awaited.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown_rx();
        // The sender lives as long as `self`, so this cannot fail while borrowed.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}
