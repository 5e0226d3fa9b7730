use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::game::{AnswerView, GameSummary, RoundPublicView, RoundRevealView},
    error::ServiceError,
    state::game::{GameResult, PlayerIdentity},
};

/// Commands accepted from WebSocket clients.
///
/// The first frame on a fresh connection must be `authenticate`; every
/// other command is rejected until the credential has been resolved.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientCommand {
    /// Present the bearer credential for this connection.
    Authenticate {
        /// Opaque token resolved by the identity collaborator.
        token: String,
    },
    /// Enter a room (joining it first if still waiting for players).
    JoinGame {
        /// Target game identifier.
        game_id: Uuid,
    },
    /// Leave a room and stop receiving its events.
    LeaveGame {
        /// Target game identifier.
        game_id: Uuid,
    },
    /// Begin gameplay (multiplayer, creator only).
    StartGame {
        /// Target game identifier.
        game_id: Uuid,
    },
    /// Submit a guess for the current round.
    SubmitAnswer {
        /// Target game identifier.
        game_id: Uuid,
        /// 1-based round the answer targets.
        round_number: u32,
        /// Guessed artist name, if any.
        guessed_artist: Option<String>,
        /// Guessed track title, if any.
        guessed_track: Option<String>,
        /// Guessed release year, if any.
        guessed_year: Option<i32>,
        /// Client-reported seconds from round start to submission.
        time_to_answer: Option<f64>,
    },
}

/// Events pushed to WebSocket clients.
///
/// For a given room these are produced by its session in order and fan out
/// to every subscribed connection in that same order; `answer-submitted`
/// and `error` are only ever addressed to a single connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// The connection's identity was resolved.
    Authenticated {
        /// Resolved identity for this connection.
        user: PlayerIdentity,
    },
    /// Unicast acknowledgement that the connection entered the room.
    GameJoined {
        /// Snapshot of the joined game.
        game: GameSummary,
    },
    /// A participant joined the room.
    PlayerJoined {
        /// The joining participant.
        player: PlayerIdentity,
        /// Snapshot after the join.
        game: GameSummary,
    },
    /// A participant left the room or disconnected.
    PlayerLeft {
        /// The departing participant.
        player: PlayerIdentity,
    },
    /// Gameplay began.
    GameStarted {
        /// Snapshot at start time.
        game: GameSummary,
    },
    /// A round is now accepting answers.
    RoundStarted {
        /// Public payload of the armed round (no ground truth).
        round: RoundPublicView,
    },
    /// Once-per-second countdown tick for the current round.
    Countdown {
        /// Round the tick belongs to.
        round_number: u32,
        /// Whole seconds left before the deadline.
        seconds_remaining: u64,
    },
    /// Unicast acknowledgement of the connection's own submission.
    AnswerSubmitted {
        /// The scored answer.
        answer: AnswerView,
    },
    /// All expected answers arrived or the deadline fired.
    RoundCompleted {
        /// Settled round number.
        round_number: u32,
        /// Revealed ground truth.
        correct_answer: RoundRevealView,
        /// Every participant's answer, including synthesized zero-score
        /// entries for non-submitters.
        answers: Vec<AnswerView>,
    },
    /// The last round settled; final standings are attached.
    GameFinished {
        /// Ranked results, best first.
        results: Vec<GameResult>,
    },
    /// Typed rejection delivered only to the initiating connection.
    Error {
        /// Machine-readable error kind (see [`ServiceError::kind`]).
        kind: String,
        /// Human readable description.
        message: String,
    },
}

impl ServerEvent {
    /// Build a typed error event from a service failure.
    pub fn error(err: &ServiceError) -> Self {
        ServerEvent::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
