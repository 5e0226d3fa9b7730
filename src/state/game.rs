//! In-memory domain types for one play session.

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::scoring::ScoreBreakdown;

/// Maximum number of participants a room can hold.
pub const MAX_PARTICIPANTS: usize = 2;

/// Resolved user identity attached to connections and answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlayerIdentity {
    /// Stable user identifier supplied by the identity collaborator.
    pub id: Uuid,
    /// Name shown to other participants.
    pub display_name: String,
}

/// Whether a game is played alone or against a second participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    /// Single participant, gameplay starts immediately on creation.
    Solo,
    /// Two participants, gameplay starts on an explicit creator command.
    Multiplayer,
}

impl GameMode {
    /// Number of answers expected per round in this mode.
    pub fn expected_players(self) -> usize {
        match self {
            GameMode::Solo => 1,
            GameMode::Multiplayer => MAX_PARTICIPANTS,
        }
    }
}

/// Ground-truth track metadata for a round, delivered by the track provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTruth {
    /// Provider-side track identifier.
    pub track_id: String,
    /// Track title to be guessed.
    pub title: String,
    /// Artist name to be guessed.
    pub artist: String,
    /// Release year to be guessed.
    pub year: i32,
    /// Optional playable preview reference.
    pub preview_url: Option<String>,
    /// Optional cover-art reference, revealed with the round result.
    pub cover_url: Option<String>,
}

/// One track-guessing challenge within a game. Immutable once generated.
#[derive(Debug, Clone)]
pub struct Round {
    /// 1-based round number, unique within the game.
    pub number: u32,
    /// The track the participants must identify.
    pub truth: TrackTruth,
}

/// A participant's guess for one round; every field is independently optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Guess {
    /// Guessed artist name, if any.
    pub artist: Option<String>,
    /// Guessed track title, if any.
    pub track: Option<String>,
    /// Guessed release year, if any.
    pub year: Option<i32>,
}

/// One participant's scored submission for one round. Created once, never
/// mutated; the room session enforces at most one per (round, user).
#[derive(Debug, Clone)]
pub struct Answer {
    /// Submitting participant.
    pub user_id: Uuid,
    /// Round the answer belongs to.
    pub round_number: u32,
    /// The submitted guess fields.
    pub guess: Guess,
    /// Seconds from round start to submission, clamped to the round
    /// duration; `None` for synthesized non-submitter entries.
    pub time_to_answer: Option<f64>,
    /// Point breakdown computed at submission time.
    pub score: ScoreBreakdown,
}

impl Answer {
    /// Synthesized zero-score entry for a participant who never submitted
    /// before the round deadline.
    pub fn absent(user_id: Uuid, round_number: u32) -> Self {
        Self {
            user_id,
            round_number,
            guess: Guess::default(),
            time_to_answer: None,
            score: ScoreBreakdown::zero(),
        }
    }
}

/// Final standing for one participant, created when the game finishes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameResult {
    /// Participant the result belongs to.
    pub user_id: Uuid,
    /// Display name frozen at game end.
    pub display_name: String,
    /// Sum of the participant's round totals.
    pub total_score: u32,
    /// 1-based rank after a stable descending sort on `total_score`.
    pub position: u32,
}

/// Aggregated state for one game, owned exclusively by its room session.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Opaque unique game identifier.
    pub id: Uuid,
    /// Solo or multiplayer.
    pub mode: GameMode,
    /// Number of rounds this game plays, bounded to `[1, 10]` at creation.
    pub max_rounds: u32,
    /// Identifier of the participant who created the game.
    pub creator_id: Uuid,
    /// Participants in join order, keyed by user id.
    pub participants: IndexMap<Uuid, PlayerIdentity>,
    /// Rounds generated in bulk at creation; immutable afterwards.
    pub rounds: Vec<Round>,
    /// 1-based pointer to the round currently accepting answers; 0 before
    /// the first round is armed.
    pub current_round: u32,
    /// Scored answers for settled and in-flight rounds.
    pub answers: Vec<Answer>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Set when the game transitions to `IN_PROGRESS`.
    pub started_at: Option<SystemTime>,
    /// Set when the game reaches a terminal phase.
    pub finished_at: Option<SystemTime>,
}

impl GameSession {
    /// Build a new session with rounds already materialized by the track
    /// provider. The creator is the first participant.
    pub fn new(
        mode: GameMode,
        max_rounds: u32,
        creator: PlayerIdentity,
        rounds: Vec<Round>,
    ) -> Self {
        let mut participants = IndexMap::new();
        let creator_id = creator.id;
        participants.insert(creator_id, creator);

        Self {
            id: Uuid::new_v4(),
            mode,
            max_rounds,
            creator_id,
            participants,
            rounds,
            current_round: 0,
            answers: Vec::new(),
            created_at: SystemTime::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Look up a round by its 1-based number.
    pub fn round(&self, number: u32) -> Option<&Round> {
        self.rounds.get(number.checked_sub(1)? as usize)
    }

    /// Whether `number` is the final round of the game.
    pub fn is_last_round(&self, number: u32) -> bool {
        number >= self.max_rounds
    }

    /// Sum totals per participant and assign 1-based ranks.
    ///
    /// The sort is a stable descending sort on total score, so participants
    /// tied on points keep their join order (the order their sums were
    /// accumulated in).
    pub fn compute_results(&self) -> Vec<GameResult> {
        let mut totals: IndexMap<Uuid, u32> = self
            .participants
            .keys()
            .map(|user_id| (*user_id, 0))
            .collect();

        for answer in &self.answers {
            if let Some(total) = totals.get_mut(&answer.user_id) {
                *total += answer.score.total_score;
            }
        }

        let mut standings: Vec<(Uuid, u32)> = totals.into_iter().collect();
        standings.sort_by(|a, b| b.1.cmp(&a.1));

        standings
            .into_iter()
            .enumerate()
            .map(|(index, (user_id, total_score))| GameResult {
                user_id,
                display_name: self
                    .participants
                    .get(&user_id)
                    .map(|player| player.display_name.clone())
                    .unwrap_or_default(),
                total_score,
                position: index as u32 + 1,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(number: u32) -> Round {
        Round {
            number,
            truth: TrackTruth {
                track_id: format!("track-{number}"),
                title: "title".into(),
                artist: "artist".into(),
                year: 1980,
                preview_url: None,
                cover_url: None,
            },
        }
    }

    fn player(name: &str) -> PlayerIdentity {
        PlayerIdentity {
            id: Uuid::new_v4(),
            display_name: name.into(),
        }
    }

    fn scored(user_id: Uuid, round_number: u32, total: u32) -> Answer {
        Answer {
            user_id,
            round_number,
            guess: Guess::default(),
            time_to_answer: Some(1.0),
            score: ScoreBreakdown {
                total_score: total,
                ..ScoreBreakdown::zero()
            },
        }
    }

    #[test]
    fn results_are_a_stable_descending_sort() {
        let a = player("A");
        let b = player("B");
        let c = player("C");
        let mut game = GameSession::new(GameMode::Multiplayer, 3, a.clone(), vec![round(1)]);
        game.participants.insert(b.id, b.clone());
        game.participants.insert(c.id, c.clone());

        game.answers.push(scored(a.id, 1, 120));
        game.answers.push(scored(b.id, 1, 300));
        game.answers.push(scored(c.id, 1, 120));

        let results = game.compute_results();
        assert_eq!(results.len(), 3);
        assert_eq!((results[0].user_id, results[0].position), (b.id, 1));
        assert_eq!((results[1].user_id, results[1].position), (a.id, 2));
        assert_eq!((results[2].user_id, results[2].position), (c.id, 3));
    }

    #[test]
    fn totals_sum_across_rounds() {
        let a = player("A");
        let mut game = GameSession::new(GameMode::Solo, 2, a.clone(), vec![round(1), round(2)]);
        game.answers.push(scored(a.id, 1, 283));
        game.answers.push(scored(a.id, 2, 100));

        let results = game.compute_results();
        assert_eq!(results[0].total_score, 383);
        assert_eq!(results[0].display_name, "A");
    }

    #[test]
    fn non_submitters_still_get_a_result_row() {
        let a = player("A");
        let b = player("B");
        let mut game = GameSession::new(GameMode::Multiplayer, 1, a.clone(), vec![round(1)]);
        game.participants.insert(b.id, b.clone());
        game.answers.push(scored(a.id, 1, 50));

        let results = game.compute_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].user_id, b.id);
        assert_eq!(results[1].total_score, 0);
    }

    #[test]
    fn round_lookup_is_one_based() {
        let game = GameSession::new(GameMode::Solo, 2, player("A"), vec![round(1), round(2)]);
        assert_eq!(game.round(1).map(|r| r.number), Some(1));
        assert_eq!(game.round(2).map(|r| r.number), Some(2));
        assert!(game.round(0).is_none());
        assert!(game.round(3).is_none());
    }
}
