//! Web server for cloudbox.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::config::{Config, ServerConfig};
use crate::quota::StorageQuota;
use crate::store::Backend;
use crate::{CloudboxError, Result};

use super::handlers::AppState;
use super::middleware::{JwtState, RateLimitState};
use super::router::create_router;

/// Web server for the API.
pub struct WebServer<S> {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: AppState<S>,
    /// Login limiter, present when authentication is enabled.
    rate_limit: Option<Arc<RateLimitState>>,
    server_config: ServerConfig,
}

impl<S: Backend> WebServer<S> {
    /// Create a new web server around an opened store.
    pub fn new(config: &Config, store: Arc<S>) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                CloudboxError::Config(format!(
                    "invalid server address {}:{}: {}",
                    config.server.host, config.server.port, e
                ))
            })?;

        let mut app_state = AppState::new(store, StorageQuota::from(&config.quota));
        let mut rate_limit = None;

        if config.auth.enabled {
            app_state = app_state.with_auth(Arc::new(JwtState::new(
                &config.auth.jwt_secret,
                config.auth.token_expiry_secs,
            )));
            rate_limit = Some(Arc::new(RateLimitState::new(config.auth.login_rate_limit)));
        }

        Ok(Self {
            addr,
            app_state,
            rate_limit,
            server_config: config.server.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The full application, compression included.
    pub fn router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            self.rate_limit.clone(),
            &self.server_config,
        )
        .layer(CompressionLayer::new())
    }

    async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        if let Some(limiter) = self.rate_limit.clone() {
            limiter.start_cleanup_task();
        }

        tracing::info!(
            backend = self.app_state.store.backend_name(),
            auth = self.app_state.auth_enabled(),
            "Web server listening on http://{}",
            local_addr
        );
        Ok((listener, local_addr))
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let router = self.router();
        let (listener, _) = self.bind().await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }

    /// Serve in the background and return the bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.router();
        let (listener, local_addr) = self.bind().await?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
