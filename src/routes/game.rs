use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, header},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{AnswerView, CreateGameRequest, GameSummary, SubmitAnswerRequest},
    error::AppError,
    services::game_service,
    state::{SharedState, game::PlayerIdentity},
};

/// Routes handling game lifecycle operations over HTTP.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{id}", get(game_detail))
        .route("/games/{id}/join", post(join_game))
        .route("/games/{id}/answers", post(submit_answer))
}

/// Create a fresh game and register its live room.
#[utoipa::path(
    post,
    path = "/games",
    tag = "game",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = GameSummary),
        (status = 401, description = "Missing or invalid credential"),
        (status = 502, description = "Track provider unavailable")
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    let creator = resolve_identity(&state, &headers).await?;
    let summary = game_service::create_game(&state, creator, payload).await?;
    Ok(Json(summary))
}

/// Snapshot a live game.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    responses(
        (status = 200, description = "Game snapshot", body = GameSummary),
        (status = 404, description = "Unknown or already completed game")
    )
)]
pub async fn game_detail(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    let summary = game_service::game_detail(&state, id).await?;
    Ok(Json(summary))
}

/// Join a waiting game.
#[utoipa::path(
    post,
    path = "/games/{id}/join",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game to join")),
    responses(
        (status = 200, description = "Joined", body = GameSummary),
        (status = 404, description = "Unknown or already completed game"),
        (status = 409, description = "Game is full or no longer waiting")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<GameSummary>, AppError> {
    let user = resolve_identity(&state, &headers).await?;
    let summary = game_service::join_game(&state, id, user).await?;
    Ok(Json(summary))
}

/// Submit an answer for the current round.
#[utoipa::path(
    post,
    path = "/games/{id}/answers",
    tag = "game",
    params(("id" = Uuid, Path, description = "Identifier of the game")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer scored", body = AnswerView),
        (status = 404, description = "Unknown or already completed game"),
        (status = 409, description = "Round closed or answer already submitted")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<AnswerView>, AppError> {
    let user = resolve_identity(&state, &headers).await?;
    let answer = game_service::submit_answer(&state, id, user, payload).await?;
    Ok(Json(answer))
}

async fn resolve_identity(
    state: &SharedState,
    headers: &HeaderMap,
) -> Result<PlayerIdentity, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    Ok(game_service::authenticate(state, authorization).await?)
}
