//! HTTP server: binds the listener and ties its lifetime to the token service.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::service::TokenService;

use super::routes::routes;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Ignore SIGTERM; only SIGINT or `POST /shutdown` stop the server.
    pub await_explicit_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            await_explicit_shutdown: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Bind `config`'s address and serve until SIGINT, SIGTERM or `POST /shutdown`.
pub async fn serve(config: ServerConfig, service: Arc<TokenService>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.socket_addr()?).await?;
    let signals = os_signals(config.await_explicit_shutdown)?;
    run(listener, service, signals).await
}

/// Serve on `listener` while the service's expiry loop runs.
///
/// Returns once `stop` resolves or the service receives a shutdown request.
/// The service is shut down on every exit path, including a server error.
pub async fn run<S>(listener: TcpListener, service: Arc<TokenService>, stop: S) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    service.start().await;
    info!(%addr, "Serving tokenpool");

    let watcher = Arc::clone(&service);
    let served = axum::serve(listener, routes(Arc::clone(&service)))
        .with_graceful_shutdown(async move {
            tokio::select! {
                () = stop => {}
                () = watcher.shutdown_requested() => info!("Shutdown requested over HTTP"),
            }
        })
        .await;

    service.shutdown().await;
    served?;
    Ok(())
}

/// SIGINT, plus SIGTERM unless `ignore_sigterm`. Handlers are installed
/// before this returns so a failure surfaces at startup.
fn os_signals(ignore_sigterm: bool) -> anyhow::Result<impl Future<Output = ()> + Send + 'static> {
    #[cfg(unix)]
    let mut sigterm = if ignore_sigterm {
        None
    } else {
        Some(tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        )?)
    };
    if ignore_sigterm {
        info!("Ignoring SIGTERM until /shutdown or SIGINT");
    }

    Ok(async move {
        let interrupt = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Cannot listen for SIGINT");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match sigterm.as_mut() {
                Some(signal) => {
                    signal.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = interrupt => info!("SIGINT received"),
            () = terminate => info!("SIGTERM received"),
        }
    })
}
