//! HTTP transport: axum routes and server.

mod routes;
mod server;

pub use routes::{HealthCheckResponse, routes};
pub use server::{ServerConfig, run, serve};
