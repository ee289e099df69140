use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::game::{GameSnapshot, RoundStats},
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes exposing read-only game views per room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{room_id}/game", get(game_snapshot))
        .route("/rooms/{room_id}/game/rounds", get(game_rounds))
}

/// Return the current game state of a room, secrets withheld.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/game",
    tag = "game",
    params(("room_id" = String, Path, description = "Identifier of the chat room")),
    responses(
        (status = 200, description = "Current game state", body = GameSnapshot),
        (status = 404, description = "No game in this room")
    )
)]
pub async fn game_snapshot(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<GameSnapshot>, AppError> {
    let snapshot = game_service::session_snapshot(&state, &room_id).await?;
    Ok(Json(snapshot))
}

/// Return round-by-round statistics of the room's latest game.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/game/rounds",
    tag = "game",
    params(("room_id" = String, Path, description = "Identifier of the chat room")),
    responses(
        (status = 200, description = "Round records in order", body = [RoundStats]),
        (status = 404, description = "No game in this room")
    )
)]
pub async fn game_rounds(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<RoundStats>>, AppError> {
    let rounds = game_service::round_stats(&state, &room_id).await?;
    Ok(Json(rounds))
}
