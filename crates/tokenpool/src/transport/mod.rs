//! Transport layer for the token service.
//!
//! Currently provides HTTP transport via axum.

pub mod http;

pub use http::{ServerConfig, run, serve};
