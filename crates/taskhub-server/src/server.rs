//! `TaskhubServer`: router assembly and listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::Json;
use axum::routing::get;
use taskhub_store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api;
use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::Broadcaster;
use crate::websocket::handler::ws_handler;
use crate::websocket::notice::NoticeGate;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistence gateway.
    pub store: Store,
    /// Token issuer and validator.
    pub auth: Arc<AuthManager>,
    /// Mutation fan-out and connection registry.
    pub broadcaster: Arc<Broadcaster>,
    /// Runtime configuration.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
    /// Root shutdown token.
    pub shutdown: CancellationToken,
}

/// The TaskHub HTTP + WebSocket server.
pub struct TaskhubServer {
    config: Arc<ServerConfig>,
    store: Store,
    auth: Arc<AuthManager>,
    broadcaster: Arc<Broadcaster>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl TaskhubServer {
    /// Create a server. Client notices are relayed unconditionally.
    pub fn new(config: ServerConfig, store: Store, auth: AuthManager) -> Self {
        let broadcaster = Broadcaster::new(config.broadcast_config());
        Self {
            config: Arc::new(config),
            store,
            auth: Arc::new(auth),
            broadcaster: Arc::new(broadcaster),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Replace the notice gate. Call before serving.
    #[must_use]
    pub fn with_notice_gate(mut self, gate: Arc<dyn NoticeGate>) -> Self {
        self.broadcaster = Arc::new(Broadcaster::with_gate(self.config.broadcast_config(), gate));
        self
    }

    fn state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            auth: Arc::clone(&self.auth),
            broadcaster: Arc::clone(&self.broadcaster),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
            shutdown: self.shutdown.token(),
        }
    }

    fn cors(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        if self.config.allows_any_origin() {
            return layer.allow_origin(Any);
        }
        let origins: Vec<HeaderValue> = self
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring invalid allowed origin");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }

    /// Build the router with all routes.
    pub fn router(&self) -> Router {
        let state = self.state();
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .merge(api::routes(&state))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(self.cors())
    }

    /// Bind and serve until shutdown. Returns the bound address.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%local_addr, "taskhub server listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server stopped with error");
            }
        });
        Ok((local_addr, handle))
    }

    /// The broadcaster.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The runtime configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The store.
    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.broadcaster.connection_count(),
    ))
}
