//! Game lifecycle service backing the HTTP surface.
//!
//! Creation happens here; everything after creation is mediated by the
//! game's session task, which this module reaches through request/response
//! commands.

use tokio::sync::oneshot;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{GameStatusUpdate, StatusTimestamps},
    dto::game::{AnswerView, CreateGameRequest, GameSummary, SubmitAnswerRequest},
    error::ServiceError,
    services::room_session::{self, RoomCommand, Submission},
    state::{
        SharedState,
        game::{GameSession, Guess, PlayerIdentity, Round},
        state_machine::RoomPhase,
    },
};

/// Resolve the bearer credential carried by an HTTP request.
pub async fn authenticate(
    state: &SharedState,
    authorization: Option<&str>,
) -> Result<PlayerIdentity, ServiceError> {
    let header = authorization.ok_or_else(|| {
        ServiceError::Authentication("missing authorization header".into())
    })?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    if token.is_empty() {
        return Err(ServiceError::Authentication("empty bearer token".into()));
    }
    Ok(state.identity().resolve(token).await?)
}

/// Create a new game for `creator` and spawn its session task.
///
/// Rounds are drawn up front so a short catalog fails the request instead
/// of a later round. Nothing is registered until the initial status has
/// been persisted, keeping creation all-or-nothing.
pub async fn create_game(
    state: &SharedState,
    creator: PlayerIdentity,
    request: CreateGameRequest,
) -> Result<GameSummary, ServiceError> {
    let truths = state.tracks().fetch_rounds(request.max_rounds).await?;
    let rounds: Vec<Round> = truths
        .into_iter()
        .enumerate()
        .map(|(index, truth)| Round {
            number: index as u32 + 1,
            truth,
        })
        .collect();

    let game = GameSession::new(request.mode, request.max_rounds, creator, rounds);
    let game_id = game.id;

    state
        .store()
        .update_game_status(GameStatusUpdate {
            game_id,
            status: RoomPhase::Waiting,
            timestamps: StatusTimestamps {
                started_at: None,
                finished_at: None,
            },
        })
        .await?;

    let summary = GameSummary::from_session(&game, RoomPhase::Waiting);
    let handle = room_session::spawn(state.clone(), game);
    state.rooms().insert(game_id, handle);

    info!(game_id = %game_id, mode = ?request.mode, rounds = request.max_rounds, "game created");
    Ok(summary)
}

/// Snapshot a live game for the detail endpoint.
pub async fn game_detail(state: &SharedState, game_id: Uuid) -> Result<GameSummary, ServiceError> {
    let handle = state.room(game_id)?;
    let (reply, response) = oneshot::channel();
    handle.send(RoomCommand::Snapshot { reply })?;
    response
        .await
        .map_err(|_| ServiceError::NotFound(format!("game `{game_id}` is no longer active")))
}

/// Join a waiting game over HTTP.
pub async fn join_game(
    state: &SharedState,
    game_id: Uuid,
    user: PlayerIdentity,
) -> Result<GameSummary, ServiceError> {
    let handle = state.room(game_id)?;
    let (reply, response) = oneshot::channel();
    handle.send(RoomCommand::JoinRequest { user, reply })?;
    response
        .await
        .map_err(|_| ServiceError::NotFound(format!("game `{game_id}` is no longer active")))?
}

/// Submit an answer over HTTP; scoring matches the real-time path exactly.
pub async fn submit_answer(
    state: &SharedState,
    game_id: Uuid,
    user: PlayerIdentity,
    request: SubmitAnswerRequest,
) -> Result<AnswerView, ServiceError> {
    let handle = state.room(game_id)?;
    let (reply, response) = oneshot::channel();
    handle.send(RoomCommand::SubmitRequest {
        user_id: user.id,
        submission: Submission {
            round_number: request.round_number,
            guess: Guess {
                artist: request.guessed_artist,
                track: request.guessed_track,
                year: request.guessed_year,
            },
            time_to_answer: request.time_to_answer,
        },
        reply,
    })?;
    response
        .await
        .map_err(|_| ServiceError::NotFound(format!("game `{game_id}` is no longer active")))?
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::InMemoryGameStore,
        providers::{catalog::CatalogTrackProvider, tokens::TokenTableResolver},
        state::AppState,
    };

    fn state_with_token(token: &str, name: &str) -> (SharedState, PlayerIdentity) {
        let resolver = Arc::new(TokenTableResolver::new());
        let registered = resolver.register(token, name);
        let state = AppState::new(
            AppConfig::with_timings(
                Duration::from_secs(30),
                Duration::from_secs(5),
                Duration::from_secs(600),
            ),
            resolver,
            Arc::new(CatalogTrackProvider::new()),
            Arc::new(InMemoryGameStore::new()),
        );
        (state, registered)
    }

    #[tokio::test]
    async fn bearer_prefix_is_stripped_before_resolution() {
        let (state, registered) = state_with_token("abc-123", "freddie");

        let user = authenticate(&state, Some("Bearer abc-123")).await.unwrap();
        assert_eq!(user, registered);

        // A raw token without the prefix also resolves.
        let user = authenticate(&state, Some("abc-123")).await.unwrap();
        assert_eq!(user, registered);
    }

    #[tokio::test]
    async fn missing_or_unknown_credentials_are_rejected() {
        let (state, _) = state_with_token("abc-123", "freddie");

        let err = authenticate(&state, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));

        let err = authenticate(&state, Some("Bearer nope")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));

        let err = authenticate(&state, Some("Bearer ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));
    }

    #[tokio::test]
    async fn creation_fails_atomically_when_the_catalog_is_short() {
        let (state_base, creator) = state_with_token("abc-123", "host");
        let state = AppState::new(
            state_base.config().clone(),
            state_base.identity(),
            Arc::new(CatalogTrackProvider::with_catalog(Vec::new())),
            state_base.store(),
        );

        let err = create_game(
            &state,
            creator,
            CreateGameRequest {
                mode: crate::state::game::GameMode::Solo,
                max_rounds: 3,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Provider(_)));
        assert!(state.rooms().is_empty());
    }
}
