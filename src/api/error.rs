//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::api::protocol::ErrorBody;
use crate::game::MoveError;
use crate::service::GameError;

/// Error returned by HTTP handlers.
#[derive(Debug, derive_more::Display, derive_more::From)]
pub enum ApiError {
    /// A service-level failure.
    #[display("{_0}")]
    Game(GameError),
    /// The request body could not be decoded.
    #[display("Invalid request body: {_0}")]
    #[from(ignore)]
    BadRequest(String),
}

impl std::error::Error for ApiError {}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Game(err) => match err {
                GameError::MissingField { .. }
                | GameError::InvalidGameId(_)
                | GameError::InvalidSymbol { .. }
                | GameError::Token(_) => StatusCode::BAD_REQUEST,
                GameError::Move(MoveError::OutOfRange { .. }) => StatusCode::BAD_REQUEST,
                GameError::Move(MoveError::NotYourTurn { .. } | MoveError::GameAlreadyOver) => {
                    StatusCode::FORBIDDEN
                }
                GameError::Move(MoveError::CellOccupied { .. })
                | GameError::SymbolTaken { .. }
                | GameError::AlreadySeated { .. }
                | GameError::PlayersFull
                | GameError::Conflict => StatusCode::CONFLICT,
                GameError::NotFound { .. } => StatusCode::NOT_FOUND,
                GameError::Storage(_) | GameError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        } else {
            warn!(status = %status, error = %self, "Request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
