//! Lifecycle state machine for a room session.
//!
//! The room actor owns one machine per game and applies events from its
//! mailbox, so transitions are already serialized; the machine's job is to
//! reject events that are not legal from the current phase.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// High-level lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    /// Multiplayer room accepting a second participant.
    Waiting,
    /// Rounds are advancing; answers are accepted for the current round.
    InProgress,
    /// Terminal: all rounds settled and results computed.
    Finished,
    /// Terminal: the room was abandoned or declined before play began.
    Cancelled,
}

impl RoomPhase {
    /// Whether the room has reached a terminal status and must be evicted.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoomPhase::Finished | RoomPhase::Cancelled)
    }
}

/// Events that can be applied to the room state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Gameplay begins (explicit start, or immediately for solo rooms).
    Start,
    /// The last round settled and results were computed.
    Finish,
    /// The room was abandoned before gameplay started.
    Cancel,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// State machine driving a room from `WAITING` to a terminal phase.
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
}

impl Default for RoomStateMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Waiting,
        }
    }
}

impl RoomStateMachine {
    /// Create a new machine in the `WAITING` phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Apply an event, moving to the next phase if the transition is valid.
    pub fn apply(&mut self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Waiting, RoomEvent::Start) => RoomPhase::InProgress,
            (RoomPhase::Waiting, RoomEvent::Cancel) => RoomPhase::Cancelled,
            (RoomPhase::InProgress, RoomEvent::Finish) => RoomPhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        self.phase = next;
        Ok(next)
    }
}
