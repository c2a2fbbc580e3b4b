//! tokenpool: lease lifecycle engine for pools of ephemeral tokens.
//!
//! Tokens are generated into a pool, assigned to clients, and reclaimed
//! automatically: an idle token is deleted after `keepalive_ttl`, an assigned
//! token returns to the pool after `assign_ttl`, and keep-alive pushes the
//! governing deadline out again.

pub mod clock;
pub mod error;
mod health;
pub mod manager;
pub mod pool;
pub mod scheduler;
pub mod service;
pub mod transport;
mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LeaseError;
pub use health::{Health, HealthResponse};
pub use manager::{LeaseConfig, LeaseManager, PoolStats};
pub use pool::{Token, TokenId, TokenPool};
pub use scheduler::{EventHandle, EventId, EventScheduler, SchedulerConfig};
pub use service::{HealthSnapshot, TokenService};
pub use version::{TOKENPOOL_VERSION, VersionInfo};
