//! Server lifecycle management
//!
//! Builds the shared services from configuration, starts the HTTP control
//! surface and runs the graceful shutdown sequence when a signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use gridcast_api::{create_router, AppState};
use gridcast_compositor::BroadcastController;
use gridcast_core::service::{AuthService, SessionRegistry};
use gridcast_core::store::{JsonFileStore, MemorySessionStore, SessionStore};
use gridcast_core::Config;
use gridcast_media::{MediaHub, MediaTransport};

/// How often expired bearer tokens are swept out of the token directory.
const TOKEN_PRUNE_INTERVAL: Duration = Duration::from_secs(900);

/// Container for shared services
pub struct Services {
    pub auth: Arc<AuthService>,
    pub registry: Arc<SessionRegistry>,
    pub controller: Arc<BroadcastController>,
    pub transport: Arc<dyn MediaTransport>,
}

/// Gridcast server - owns the shared services and the HTTP listener
pub struct GridcastServer {
    config: Config,
    services: Services,
}

impl GridcastServer {
    /// Build every service from configuration. Nothing is listening yet
    /// when this returns.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // 1. Session store: file-backed when a data path is configured,
        //    in-memory otherwise
        let store: Arc<dyn SessionStore> = match &config.registry.data_path {
            Some(path) => {
                info!(path = %path, "Using file-backed session store");
                Arc::new(JsonFileStore::new(path))
            }
            None => {
                warn!("registry.data_path not set, sessions will not survive a restart");
                Arc::new(MemorySessionStore::new())
            }
        };

        // 2. Session registry (loads the persisted session list)
        let registry = Arc::new(SessionRegistry::load(store).await?);
        info!(
            sessions = registry.list().await.len(),
            "Session registry loaded"
        );

        // 3. Accounts and the token directory
        let auth = Arc::new(AuthService::new(&config.auth)?);
        info!(accounts = config.auth.users.len(), "Auth service initialized");

        // 4. Media hub
        let transport: Arc<dyn MediaTransport> =
            Arc::new(MediaHub::new(config.media.subscriber_channel_capacity));

        // 5. Broadcast controller
        let controller = Arc::new(BroadcastController::new(
            registry.clone(),
            transport.clone(),
            config.compositor.clone(),
        ));

        Ok(Self {
            config,
            services: Services {
                auth,
                registry,
                controller,
                transport,
            },
        })
    }

    /// Start the HTTP server and wait for a shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        info!("Starting Gridcast server...");

        // Resume the persisted active session before accepting traffic.
        if self.config.resume_on_start {
            match self.services.controller.resume().await {
                Ok(Some(session_id)) => {
                    info!(session = %session_id, "Resumed live broadcast");
                }
                Ok(None) => {
                    info!("No active session to resume");
                }
                Err(e) => {
                    // Non-fatal: the session stays active in the registry and
                    // an operator can retry by updating it.
                    warn!("Failed to resume active session: {e}");
                }
            }
        }

        let _prune_task = self.spawn_token_pruner();

        // Create shutdown signal channel
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Start HTTP server with graceful shutdown
        let mut http_handle = self.start_http_server(shutdown_rx);

        info!("All servers started successfully");

        // Wait for either the server to stop or a shutdown signal
        let server_exited = tokio::select! {
            _ = &mut http_handle => {
                error!("HTTP server stopped unexpectedly");
                true
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
                false
            }
        };

        // Signal the HTTP server to stop accepting connections and drain
        let _ = shutdown_tx.send(true);
        if !server_exited {
            if let Err(e) = http_handle.await {
                warn!("HTTP server task ended abnormally: {e}");
            }
        }

        self.shutdown().await;

        Ok(())
    }

    /// Gracefully shut down the running components
    async fn shutdown(&self) {
        info!("Shutting down Gridcast server...");

        // Stop the live compositor without deactivating the persisted
        // session, so `resume` picks it up on the next boot.
        self.services.controller.shutdown().await;

        info!("Gridcast server shut down complete");
    }

    /// Start the HTTP control surface
    fn start_http_server(&self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        let http_address = self.config.http_address();
        let state = AppState {
            auth: self.services.auth.clone(),
            registry: self.services.registry.clone(),
            controller: self.services.controller.clone(),
            transport: self.services.transport.clone(),
        };
        let router = create_router(state);

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&http_address).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind HTTP address {}: {}", http_address, e);
                    return;
                }
            };

            info!("HTTP server listening on {}", http_address);

            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        })
    }

    /// Sweep expired bearer tokens on a timer
    fn spawn_token_pruner(&self) -> JoinHandle<()> {
        let auth = self.services.auth.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TOKEN_PRUNE_INTERVAL);
            // The first tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let pruned = auth.prune_expired();
                if pruned > 0 {
                    info!(count = pruned, "Pruned expired tokens");
                }
            }
        })
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
