//! HTTP and WebSocket surface.

mod error;
mod handlers;
mod protocol;
mod ws;

pub use error::ApiError;
pub use protocol::{
    ChooseSymbolRequest, ClientEnvelope, CreateGameRequest, CreatedGame, ErrorBody,
    GameStateRequest, GameView, MakeMoveRequest, MessageKind, ReplyKind, ServerEnvelope,
};

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use std::time::Instant;
use tower::ServiceBuilder;
use tracing::{info, instrument};

use crate::registry::ConnectionRegistry;
use crate::service::GameService;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    service: GameService,
    registry: ConnectionRegistry,
    idle_timeout_secs: u64,
}

impl AppState {
    /// Bundles the service, the registry and the WebSocket idle timeout.
    pub fn new(service: GameService, registry: ConnectionRegistry, idle_timeout_secs: u64) -> Self {
        Self {
            service,
            registry,
            idle_timeout_secs,
        }
    }

    /// Game use cases.
    pub fn service(&self) -> &GameService {
        &self.service
    }

    /// Live connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Seconds a WebSocket may stay silent before it is closed.
    pub fn idle_timeout_secs(&self) -> u64 {
        self.idle_timeout_secs
    }
}

/// Builds the application router.
#[instrument(skip(state))]
pub fn router(state: AppState) -> Router {
    info!("Building router");
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/game/create", post(handlers::create_game))
        .route("/api/v1/game/state", post(handlers::game_state))
        .route("/api/v1/game/choose", post(handlers::choose_symbol))
        .route("/api/v1/game/move", post(handlers::make_move))
        .route("/ws", get(ws::ws_handler))
        .layer(ServiceBuilder::new().layer(middleware::from_fn(log_request)))
        .with_state(state)
}

async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    info!(method = %method, uri = %uri, "Incoming HTTP request");

    let response = next.run(req).await;

    info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Response sent"
    );
    response
}
