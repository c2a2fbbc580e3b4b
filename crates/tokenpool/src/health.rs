//! Health status types for the token service.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    /// Created, expiry loop not running yet
    #[default]
    Starting,
    /// Expiry loop running, accepting requests
    Ready,
    /// Shut down; timers no longer fire
    Stopped,
}

/// Response-only health status (includes transient states like BUSY).
/// Used in HTTP responses but not stored as internal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthResponse {
    Starting,
    Ready,
    /// Ready, but every token is allocated
    Busy,
    Stopped,
}

impl From<Health> for HealthResponse {
    fn from(health: Health) -> Self {
        match health {
            Health::Starting => HealthResponse::Starting,
            Health::Ready => HealthResponse::Ready,
            Health::Stopped => HealthResponse::Stopped,
        }
    }
}
