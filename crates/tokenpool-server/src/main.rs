//! tokenpool server: HTTP front end for the lease engine.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tokenpool::{
    LeaseConfig, TokenService, VersionInfo,
    transport::{ServerConfig, serve},
};

#[derive(Debug, Parser)]
#[command(name = "tokenpool", version, about = "Serve a pool of expiring lease tokens over HTTP")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "TOKENPOOL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "TOKENPOOL_PORT", default_value_t = 5000)]
    port: u16,

    /// Seconds an unassigned token lives without a keep-alive.
    #[arg(long, env = "TOKENPOOL_KEEPALIVE_TTL", default_value_t = 60)]
    keepalive_ttl: u64,

    /// Seconds an assignment lasts without a keep-alive.
    #[arg(long, env = "TOKENPOOL_ASSIGN_TTL", default_value_t = 30)]
    assign_ttl: u64,

    /// Ignore SIGTERM; exit only on SIGINT or POST /shutdown.
    #[arg(long, env = "TOKENPOOL_AWAIT_EXPLICIT_SHUTDOWN")]
    await_explicit_shutdown: bool,

    /// Build label reported by /health-check.
    #[arg(long, env = "TOKENPOOL_BUILD")]
    build: Option<String>,
}

impl Args {
    fn lease_config(&self) -> LeaseConfig {
        LeaseConfig::default()
            .with_keepalive_ttl(Duration::from_secs(self.keepalive_ttl))
            .with_assign_ttl(Duration::from_secs(self.assign_ttl))
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            await_explicit_shutdown: self.await_explicit_shutdown,
        }
    }
}

/// Initialize tracing with TOKENPOOL_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let base_level = match std::env::var("TOKENPOOL_LOG").as_deref() {
            Ok("trace") => "trace",
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };

        EnvFilter::new(format!(
            "tokenpool={level},tokenpool_server={level}",
            level = base_level
        ))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    info!("tokenpool {}", env!("CARGO_PKG_VERSION"));

    let mut version = VersionInfo::new();
    if let Some(build) = args.build.clone() {
        version = version.with_build(build);
    }

    let service = Arc::new(TokenService::new(args.lease_config()).with_version(version));
    serve(args.server_config(), service).await
}
