//! Record shapes handed to the persistence collaborator.
//!
//! The coordinator only ever appends: one answer per (round, user), one
//! result set per game, plus status updates on lifecycle transitions.

use std::time::SystemTime;

use serde::Serialize;
use uuid::Uuid;

use crate::state::{
    game::{Answer, GameResult, GameSession},
    state_machine::RoomPhase,
};

/// Durable copy of one scored answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    /// Game the answer belongs to.
    pub game_id: Uuid,
    /// 1-based round number within the game.
    pub round_number: u32,
    /// Submitting participant.
    pub user_id: Uuid,
    /// Guessed artist, if provided.
    pub guessed_artist: Option<String>,
    /// Guessed track title, if provided.
    pub guessed_track: Option<String>,
    /// Guessed release year, if provided.
    pub guessed_year: Option<i32>,
    /// Clamped seconds from round start to submission.
    pub time_to_answer: Option<f64>,
    /// Artist component of the score.
    pub artist_score: u32,
    /// Track component of the score.
    pub track_score: u32,
    /// Year component of the score.
    pub year_score: u32,
    /// Speed bonus component of the score.
    pub speed_bonus: u32,
    /// Sum of the four components.
    pub total_score: u32,
}

impl AnswerRecord {
    /// Flatten an in-memory answer into its persisted shape.
    pub fn from_answer(game_id: Uuid, answer: &Answer) -> Self {
        Self {
            game_id,
            round_number: answer.round_number,
            user_id: answer.user_id,
            guessed_artist: answer.guess.artist.clone(),
            guessed_track: answer.guess.track.clone(),
            guessed_year: answer.guess.year,
            time_to_answer: answer.time_to_answer,
            artist_score: answer.score.artist_score,
            track_score: answer.score.track_score,
            year_score: answer.score.year_score,
            speed_bonus: answer.score.speed_bonus,
            total_score: answer.score.total_score,
        }
    }
}

/// Durable copy of one participant's final standing.
#[derive(Debug, Clone, Serialize)]
pub struct GameResultRecord {
    /// Game the result belongs to.
    pub game_id: Uuid,
    /// Participant the result belongs to.
    pub user_id: Uuid,
    /// Summed total across all rounds.
    pub total_score: u32,
    /// 1-based final rank.
    pub position: u32,
}

impl GameResultRecord {
    /// Flatten a computed standing into its persisted shape.
    pub fn from_result(game_id: Uuid, result: &GameResult) -> Self {
        Self {
            game_id,
            user_id: result.user_id,
            total_score: result.total_score,
            position: result.position,
        }
    }
}

/// Lifecycle timestamps attached to a status update.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusTimestamps {
    /// When the game entered `IN_PROGRESS`, if it has.
    pub started_at: Option<SystemTime>,
    /// When the game reached a terminal status, if it has.
    pub finished_at: Option<SystemTime>,
}

impl StatusTimestamps {
    /// Snapshot the lifecycle timestamps of a session.
    pub fn from_session(game: &GameSession) -> Self {
        Self {
            started_at: game.started_at,
            finished_at: game.finished_at,
        }
    }
}

/// Status update pushed to the store on every lifecycle transition.
#[derive(Debug, Clone)]
pub struct GameStatusUpdate {
    /// Game whose status changed.
    pub game_id: Uuid,
    /// New lifecycle status.
    pub status: RoomPhase,
    /// Timestamps accompanying the transition.
    pub timestamps: StatusTimestamps,
}
