//! Version information for the token service.

/// Crate version from Cargo.toml
pub const TOKENPOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported by the health check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    pub tokenpool: &'static str,
    /// Build or deployment label, if the embedding process sets one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            tokenpool: TOKENPOOL_VERSION,
            build: None,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_build(mut self, build: String) -> Self {
        self.build = Some(build);
        self
    }
}
