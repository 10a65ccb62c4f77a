//! HTTP request handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use tracing::{debug, instrument};

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::api::protocol::{
    ChooseSymbolRequest, CreateGameRequest, CreatedGame, GameStateRequest, GameView,
    MakeMoveRequest, ServerEnvelope,
};
use crate::db::GameRecord;

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `POST /api/v1/game/create`
#[instrument(skip_all)]
pub async fn create_game(
    State(state): State<AppState>,
    payload: Result<Json<CreateGameRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedGame>), ApiError> {
    let Json(req) = payload?;
    let record = state.service().create_game(&req.player_uuid).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedGame {
            game_id: record.game_id().clone(),
        }),
    ))
}

/// `POST /api/v1/game/state`
#[instrument(skip_all)]
pub async fn game_state(
    State(state): State<AppState>,
    payload: Result<Json<GameStateRequest>, JsonRejection>,
) -> Result<Json<GameView>, ApiError> {
    let Json(req) = payload?;
    let record = state
        .service()
        .game_state(&req.player_uuid, &req.game_id)
        .await?;
    Ok(Json(GameView::from(&record)))
}

/// `POST /api/v1/game/choose`
#[instrument(skip_all)]
pub async fn choose_symbol(
    State(state): State<AppState>,
    payload: Result<Json<ChooseSymbolRequest>, JsonRejection>,
) -> Result<Json<GameView>, ApiError> {
    let Json(req) = payload?;
    let record = state
        .service()
        .choose_symbol(&req.player_uuid, &req.game_id, &req.choice)
        .await?;
    Ok(Json(broadcast(&state, &record)))
}

/// `POST /api/v1/game/move`
#[instrument(skip_all)]
pub async fn make_move(
    State(state): State<AppState>,
    payload: Result<Json<MakeMoveRequest>, JsonRejection>,
) -> Result<Json<GameView>, ApiError> {
    let Json(req) = payload?;
    let record = state
        .service()
        .make_move(&req.player_uuid, &req.game_id, &req.token)
        .await?;
    Ok(Json(broadcast(&state, &record)))
}

/// Pushes the new state to every member of the game and returns the view.
fn broadcast(state: &AppState, record: &GameRecord) -> GameView {
    let view = GameView::from(record);
    debug!(game_id = %record.game_id(), revision = record.revision(), "Fanning out game state");
    state
        .registry()
        .send_to_game(record.game_id(), &ServerEnvelope::game_state(view.clone()));
    view
}
