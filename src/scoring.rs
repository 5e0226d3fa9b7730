//! Pure scoring engine for round guesses.
//!
//! Scoring never fails and has no side effects: every comparison degrades to
//! zero points when a guess field is absent or out of range.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::{Guess, TrackTruth};

/// Points awarded for an exact artist or track match.
const EXACT_MATCH_POINTS: u32 = 100;
/// Points awarded when one trimmed string contains the other.
const PARTIAL_MATCH_POINTS: u32 = 50;
/// Maximum speed bonus, awarded for an instantaneous answer.
const MAX_SPEED_BONUS: u32 = 50;

/// Four-part point breakdown computed when an answer is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScoreBreakdown {
    /// Points for the artist guess (0, 50 or 100).
    pub artist_score: u32,
    /// Points for the track title guess (0, 50 or 100).
    pub track_score: u32,
    /// Points for the release year guess (0, 25, 50 or 100).
    pub year_score: u32,
    /// Bonus scaled by how quickly the answer arrived (0..=50).
    pub speed_bonus: u32,
    /// Sum of the four components.
    pub total_score: u32,
}

impl ScoreBreakdown {
    /// Breakdown recorded for a participant who never submitted.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Score a guess against the round's ground truth.
///
/// `elapsed_seconds` is the client-reported time from round start to
/// submission; values outside `[0, round_duration_seconds]` (or an absent
/// value) forfeit the speed bonus but never fail.
pub fn score(
    guess: &Guess,
    truth: &TrackTruth,
    elapsed_seconds: Option<f64>,
    round_duration_seconds: u64,
) -> ScoreBreakdown {
    let artist_score = text_score(guess.artist.as_deref(), &truth.artist);
    let track_score = text_score(guess.track.as_deref(), &truth.title);
    let year_score = year_score(guess.year, truth.year);
    let speed_bonus = speed_bonus(elapsed_seconds, round_duration_seconds);

    ScoreBreakdown {
        artist_score,
        track_score,
        year_score,
        speed_bonus,
        total_score: artist_score + track_score + year_score + speed_bonus,
    }
}

/// Case-insensitive, whitespace-trimmed text comparison.
///
/// A guess that trims to the empty string counts as absent, so it can never
/// ride the substring rule to free points.
fn text_score(guess: Option<&str>, truth: &str) -> u32 {
    let Some(guess) = guess else {
        return 0;
    };

    let guessed = guess.trim().to_lowercase();
    if guessed.is_empty() {
        return 0;
    }
    let expected = truth.trim().to_lowercase();

    if guessed == expected {
        EXACT_MATCH_POINTS
    } else if expected.contains(&guessed) || guessed.contains(&expected) {
        PARTIAL_MATCH_POINTS
    } else {
        0
    }
}

/// Release-year proximity scoring: diff 0 -> 100, 1 -> 50, 2 -> 25, else 0.
fn year_score(guess: Option<i32>, truth: i32) -> u32 {
    let Some(guess) = guess else {
        return 0;
    };

    match guess.abs_diff(truth) {
        0 => 100,
        1 => 50,
        2 => 25,
        _ => 0,
    }
}

/// Linear speed bonus, `floor(50 * (1 - elapsed/duration))`, clamped to
/// `[0, 50]`. Out-of-range elapsed values yield no bonus.
fn speed_bonus(elapsed_seconds: Option<f64>, round_duration_seconds: u64) -> u32 {
    let Some(elapsed) = elapsed_seconds else {
        return 0;
    };

    let duration = round_duration_seconds as f64;
    if duration <= 0.0 || elapsed < 0.0 || elapsed > duration {
        return 0;
    }

    let bonus = (MAX_SPEED_BONUS as f64 * (1.0 - elapsed / duration)).floor();
    (bonus.max(0.0) as u32).min(MAX_SPEED_BONUS)
}
