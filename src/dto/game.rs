use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    scoring::ScoreBreakdown,
    state::{
        game::{Answer, GameMode, GameSession, PlayerIdentity, Round, TrackTruth},
        state_machine::RoomPhase,
    },
};

/// Payload used to create a new game over the HTTP surface.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Solo or multiplayer.
    pub mode: GameMode,
    /// Number of rounds to play, bounded to `[1, 10]`.
    #[validate(range(min = 1, max = 10))]
    pub max_rounds: u32,
}

/// Request/response submission path, mirroring the real-time command.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// 1-based round the answer targets; must be the current round.
    #[validate(range(min = 1, max = 10))]
    pub round_number: u32,
    /// Guessed artist name, if any.
    pub guessed_artist: Option<String>,
    /// Guessed track title, if any.
    pub guessed_track: Option<String>,
    /// Guessed release year, if any.
    pub guessed_year: Option<i32>,
    /// Client-reported seconds from round start to submission.
    #[validate(range(min = 0.0))]
    pub time_to_answer: Option<f64>,
}

/// Client-facing snapshot of a game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameSummary {
    /// Opaque game identifier.
    pub id: Uuid,
    /// Solo or multiplayer.
    pub mode: GameMode,
    /// Lifecycle status.
    pub status: RoomPhase,
    /// 1-based current round pointer; 0 before the first round is armed.
    pub current_round: u32,
    /// Number of rounds this game plays.
    pub max_rounds: u32,
    /// Identifier of the creating participant.
    pub creator_id: Uuid,
    /// Participants in join order.
    pub players: Vec<PlayerIdentity>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 start timestamp, once in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// RFC3339 finish timestamp, once terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl GameSummary {
    /// Snapshot a session together with its current phase.
    pub fn from_session(game: &GameSession, status: RoomPhase) -> Self {
        Self {
            id: game.id,
            mode: game.mode,
            status,
            current_round: game.current_round,
            max_rounds: game.max_rounds,
            creator_id: game.creator_id,
            players: game.participants.values().cloned().collect(),
            created_at: format_system_time(game.created_at),
            started_at: game.started_at.map(format_system_time),
            finished_at: game.finished_at.map(format_system_time),
        }
    }
}

/// Round payload exposed while the round is live.
///
/// Deliberately omits artist, title and year: the ground truth is only
/// revealed with the round result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundPublicView {
    /// 1-based round number.
    pub round_number: u32,
    /// Playable preview reference, when the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Cover-art reference, when the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl From<&Round> for RoundPublicView {
    fn from(round: &Round) -> Self {
        Self {
            round_number: round.number,
            preview_url: round.truth.preview_url.clone(),
            cover_url: round.truth.cover_url.clone(),
        }
    }
}

/// Ground truth revealed when a round completes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundRevealView {
    /// Correct artist name.
    pub artist: String,
    /// Correct track title.
    pub track: String,
    /// Correct release year.
    pub year: i32,
    /// Cover-art reference, when the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl From<&TrackTruth> for RoundRevealView {
    fn from(truth: &TrackTruth) -> Self {
        Self {
            artist: truth.artist.clone(),
            track: truth.title.clone(),
            year: truth.year,
            cover_url: truth.cover_url.clone(),
        }
    }
}

/// One scored answer as shown to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerView {
    /// Submitting participant.
    pub user_id: Uuid,
    /// Submitter's display name.
    pub display_name: String,
    /// Round the answer belongs to.
    pub round_number: u32,
    /// Guessed artist, if provided.
    pub guessed_artist: Option<String>,
    /// Guessed track title, if provided.
    pub guessed_track: Option<String>,
    /// Guessed release year, if provided.
    pub guessed_year: Option<i32>,
    /// Clamped seconds from round start to submission; absent for
    /// synthesized non-submitter entries.
    pub time_to_answer: Option<f64>,
    /// Point breakdown computed at submission time.
    pub score: ScoreBreakdown,
}

impl AnswerView {
    /// Pair an answer with the submitter's display name.
    pub fn from_answer(answer: &Answer, display_name: String) -> Self {
        Self {
            user_id: answer.user_id,
            display_name,
            round_number: answer.round_number,
            guessed_artist: answer.guess.artist.clone(),
            guessed_track: answer.guess.track.clone(),
            guessed_year: answer.guess.year,
            time_to_answer: answer.time_to_answer,
            score: answer.score,
        }
    }
}
