//! Per-room session actor: the authoritative state machine for one game.
//!
//! Each room runs as a dedicated task draining an unbounded mailbox, so
//! every command — two participants submitting in the same instant, a
//! submission racing the round clock — is applied in a single serialized
//! order. The "first of {all answered, deadline}" race therefore has one
//! authoritative winner: whichever message the mailbox delivers first
//! settles the round, and the loser is discarded as stale.

use std::time::SystemTime;

use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{AnswerRecord, GameResultRecord, GameStatusUpdate, StatusTimestamps},
    dto::{
        game::{AnswerView, GameSummary, RoundPublicView, RoundRevealView},
        ws::ServerEvent,
    },
    error::ServiceError,
    scoring,
    services::round_clock::{self, RoundClock},
    state::{
        SharedState,
        game::{Answer, GameMode, GameSession, Guess, MAX_PARTICIPANTS, PlayerIdentity},
        state_machine::{RoomEvent, RoomPhase, RoomStateMachine},
    },
};

/// Channel used to push room events toward one subscribed connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// One guess submission, shared by the WebSocket and HTTP paths.
#[derive(Debug)]
pub struct Submission {
    /// 1-based round the answer targets.
    pub round_number: u32,
    /// The submitted guess fields.
    pub guess: Guess,
    /// Client-reported seconds from round start to submission.
    pub time_to_answer: Option<f64>,
}

/// Commands delivered to a room session's mailbox.
#[derive(Debug)]
pub enum RoomCommand {
    /// A connection enters the room, joining it first when still waiting.
    Enter {
        /// Connection identifier used for later unicast and unsubscribe.
        conn_id: Uuid,
        /// Resolved identity behind the connection.
        user: PlayerIdentity,
        /// Outbound event channel for this connection.
        events: EventSender,
    },
    /// Explicit `leave-game` from a connection.
    Leave {
        /// Connection leaving the room.
        conn_id: Uuid,
        /// Identity behind the connection.
        user_id: Uuid,
    },
    /// A connection dropped; unsubscribe it without touching game state.
    Disconnected {
        /// The closed connection.
        conn_id: Uuid,
    },
    /// Creator starts a multiplayer game.
    Start {
        /// Initiating connection, for unicast rejections.
        conn_id: Uuid,
        /// Identity behind the connection.
        user_id: Uuid,
    },
    /// Real-time answer submission.
    Submit {
        /// Initiating connection, for the unicast acknowledgement.
        conn_id: Uuid,
        /// Submitting participant.
        user_id: Uuid,
        /// The guess payload.
        submission: Submission,
    },
    /// HTTP join: add a participant without subscribing a connection.
    JoinRequest {
        /// Joining identity.
        user: PlayerIdentity,
        /// Response channel back to the HTTP handler.
        reply: oneshot::Sender<Result<GameSummary, ServiceError>>,
    },
    /// HTTP answer submission, acknowledged through the response instead of
    /// an `answer-submitted` event.
    SubmitRequest {
        /// Submitting participant.
        user_id: Uuid,
        /// The guess payload.
        submission: Submission,
        /// Response channel back to the HTTP handler.
        reply: oneshot::Sender<Result<AnswerView, ServiceError>>,
    },
    /// HTTP detail snapshot.
    Snapshot {
        /// Response channel back to the HTTP handler.
        reply: oneshot::Sender<GameSummary>,
    },
    /// Once-per-second tick from the round clock.
    CountdownTick {
        /// Round the tick belongs to.
        round_number: u32,
        /// Whole seconds left before the deadline.
        seconds_remaining: u64,
    },
    /// Deadline from the round clock.
    RoundExpired {
        /// Round whose deadline fired.
        round_number: u32,
    },
    /// Settle-delay follow-up arming the next round.
    BeginRound {
        /// Round to arm; stale numbers are discarded.
        round_number: u32,
    },
}

/// Cloneable handle for pushing commands into a room session.
#[derive(Clone)]
pub struct RoomHandle {
    /// Identifier of the game this handle addresses.
    pub id: Uuid,
    mailbox: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Deliver a command, failing with `NotFound` once the session ended.
    pub fn send(&self, command: RoomCommand) -> Result<(), ServiceError> {
        self.mailbox
            .send(command)
            .map_err(|_| ServiceError::NotFound(format!("game `{}` is no longer active", self.id)))
    }
}

/// Spawn the session task for a freshly created game and return its handle.
///
/// Solo games arm round 1 immediately; multiplayer games wait for a second
/// participant and an explicit start.
pub fn spawn(state: SharedState, game: GameSession) -> RoomHandle {
    let (mailbox, rx) = mpsc::unbounded_channel();
    let handle = RoomHandle {
        id: game.id,
        mailbox: mailbox.clone(),
    };

    let session = RoomSession {
        state,
        game,
        machine: RoomStateMachine::new(),
        subscribers: IndexMap::new(),
        active: None,
        mailbox,
    };
    tokio::spawn(session.run(rx));

    handle
}

/// The round currently accepting answers.
struct ActiveRound {
    number: u32,
    answers: IndexMap<Uuid, Answer>,
    // Held so dropping the round disarms the countdown.
    _clock: RoundClock,
}

struct RoomSession {
    state: SharedState,
    game: GameSession,
    machine: RoomStateMachine,
    // Subscribed connections in join order, keyed by connection id.
    subscribers: IndexMap<Uuid, EventSender>,
    active: Option<ActiveRound>,
    mailbox: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomSession {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        info!(game_id = %self.game.id, mode = ?self.game.mode, "room session started");

        if self.game.mode == GameMode::Solo {
            // Solo rooms skip the waiting phase entirely.
            self.game.started_at = Some(SystemTime::now());
            if let Err(err) = self
                .state
                .store()
                .update_game_status(GameStatusUpdate {
                    game_id: self.game.id,
                    status: RoomPhase::InProgress,
                    timestamps: StatusTimestamps::from_session(&self.game),
                })
                .await
            {
                error!(game_id = %self.game.id, error = %err, "failed to persist started status");
            }
            self.start_gameplay().await;
        }

        loop {
            let command = if self.machine.phase() == RoomPhase::Waiting {
                // A waiting room that nobody touches is abandoned.
                match tokio::time::timeout(self.state.config().waiting_timeout(), rx.recv()).await {
                    Ok(Some(command)) => command,
                    Ok(None) => break,
                    Err(_) => {
                        info!(game_id = %self.game.id, "waiting room abandoned, cancelling");
                        self.cancel_room().await;
                        break;
                    }
                }
            } else {
                match rx.recv().await {
                    Some(command) => command,
                    None => break,
                }
            };

            self.handle(command).await;

            if self.machine.phase().is_terminal() {
                break;
            }
        }

        self.state.rooms().remove(&self.game.id);
        info!(game_id = %self.game.id, phase = ?self.machine.phase(), "room session ended");
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Enter {
                conn_id,
                user,
                events,
            } => self.handle_enter(conn_id, user, events).await,
            RoomCommand::Leave { conn_id, user_id } => self.handle_leave(conn_id, user_id).await,
            RoomCommand::Disconnected { conn_id } => {
                self.subscribers.shift_remove(&conn_id);
            }
            RoomCommand::Start { conn_id, user_id } => {
                if let Err(err) = self.handle_start(user_id).await {
                    self.report(conn_id, &err);
                }
            }
            RoomCommand::Submit {
                conn_id,
                user_id,
                submission,
            } => {
                match self.submit_answer(user_id, submission).await {
                    Ok(view) => {
                        self.unicast(conn_id, ServerEvent::AnswerSubmitted { answer: view });
                        self.settle_if_complete().await;
                    }
                    Err(err) => self.report(conn_id, &err),
                }
            }
            RoomCommand::JoinRequest { user, reply } => {
                let result = self.join_participant(user);
                let _ = reply.send(result);
            }
            RoomCommand::SubmitRequest {
                user_id,
                submission,
                reply,
            } => {
                let result = self.submit_answer(user_id, submission).await;
                let _ = reply.send(result);
                self.settle_if_complete().await;
            }
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.summary());
            }
            RoomCommand::CountdownTick {
                round_number,
                seconds_remaining,
            } => {
                // Stale ticks from an already settled round are dropped.
                if self.active.as_ref().map(|round| round.number) == Some(round_number) {
                    self.broadcast(ServerEvent::Countdown {
                        round_number,
                        seconds_remaining,
                    });
                }
            }
            RoomCommand::RoundExpired { round_number } => {
                // The all-answered path may have settled this round already;
                // the guard makes the advancement exactly-once.
                if self.active.as_ref().map(|round| round.number) == Some(round_number) {
                    self.settle_round().await;
                }
            }
            RoomCommand::BeginRound { round_number } => {
                let expected = self.game.current_round + 1;
                if self.machine.phase() == RoomPhase::InProgress
                    && self.active.is_none()
                    && round_number == expected
                {
                    self.begin_round(round_number);
                }
            }
        }
    }

    async fn handle_enter(&mut self, conn_id: Uuid, user: PlayerIdentity, events: EventSender) {
        if self.game.participants.contains_key(&user.id) {
            // Known participant re-entering (or a second device): subscribe
            // and hand back the current snapshot.
            self.subscribers.insert(conn_id, events.clone());
            let _ = events.send(ServerEvent::GameJoined {
                game: self.summary(),
            });
            return;
        }

        match self.join_participant(user.clone()) {
            Ok(summary) => {
                self.subscribers.insert(conn_id, events.clone());
                let _ = events.send(ServerEvent::GameJoined { game: summary });
            }
            Err(err) => {
                let _ = events.send(ServerEvent::error(&err));
            }
        }
    }

    /// Add a participant to a waiting room, broadcasting the join.
    fn join_participant(&mut self, user: PlayerIdentity) -> Result<GameSummary, ServiceError> {
        if self.machine.phase() != RoomPhase::Waiting {
            return Err(ServiceError::InvalidState(
                "players can only join while the game is waiting".into(),
            ));
        }
        if self.game.participants.contains_key(&user.id) {
            return Err(ServiceError::InvalidState(
                "player already joined this game".into(),
            ));
        }
        if self.game.participants.len() >= MAX_PARTICIPANTS {
            return Err(ServiceError::InvalidState("game is already full".into()));
        }

        self.game.participants.insert(user.id, user.clone());
        info!(game_id = %self.game.id, user_id = %user.id, "player joined");

        let summary = self.summary();
        self.broadcast(ServerEvent::PlayerJoined {
            player: user,
            game: summary.clone(),
        });
        Ok(summary)
    }

    async fn handle_leave(&mut self, conn_id: Uuid, user_id: Uuid) {
        self.subscribers.shift_remove(&conn_id);

        let Some(player) = self.game.participants.get(&user_id).cloned() else {
            return;
        };

        match self.machine.phase() {
            RoomPhase::Waiting => {
                self.game.participants.shift_remove(&user_id);
                self.broadcast(ServerEvent::PlayerLeft { player });

                if user_id == self.game.creator_id {
                    info!(game_id = %self.game.id, "creator left the waiting room, cancelling");
                    self.cancel_room().await;
                }
            }
            RoomPhase::InProgress => {
                // The game carries on; the departed participant simply stops
                // submitting and is scored as absent on timeout.
                self.broadcast(ServerEvent::PlayerLeft { player });
            }
            RoomPhase::Finished | RoomPhase::Cancelled => {}
        }
    }

    async fn handle_start(&mut self, user_id: Uuid) -> Result<(), ServiceError> {
        if self.machine.phase() != RoomPhase::Waiting {
            return Err(ServiceError::InvalidState(
                "game cannot be started in its current state".into(),
            ));
        }
        if user_id != self.game.creator_id {
            return Err(ServiceError::Authorization(
                "only the game creator can start the game".into(),
            ));
        }
        if self.game.participants.len() < self.game.mode.expected_players() {
            return Err(ServiceError::InvalidState(
                "waiting for a second player".into(),
            ));
        }

        // Persist the transition first: a start that cannot be recorded is
        // rejected rather than played unrecorded.
        self.game.started_at = Some(SystemTime::now());
        self.state
            .store()
            .update_game_status(GameStatusUpdate {
                game_id: self.game.id,
                status: RoomPhase::InProgress,
                timestamps: StatusTimestamps::from_session(&self.game),
            })
            .await
            .inspect_err(|_| self.game.started_at = None)?;

        self.start_gameplay().await;
        Ok(())
    }

    /// Transition to `IN_PROGRESS` and arm round 1.
    async fn start_gameplay(&mut self) {
        if self.game.started_at.is_none() {
            self.game.started_at = Some(SystemTime::now());
        }
        if let Err(err) = self.machine.apply(RoomEvent::Start) {
            warn!(game_id = %self.game.id, error = %err, "start ignored");
            return;
        }

        self.broadcast(ServerEvent::GameStarted {
            game: self.summary(),
        });
        self.begin_round(1);
    }

    /// Arm `round_number`: advance the pointer, start the clock, announce it.
    fn begin_round(&mut self, round_number: u32) {
        let Some(round) = self.game.round(round_number) else {
            error!(game_id = %self.game.id, round_number, "round out of range, cannot arm");
            return;
        };
        let public: RoundPublicView = round.into();

        self.game.current_round = round_number;
        let clock = round_clock::arm(
            round_number,
            self.state.config().round_duration(),
            self.mailbox.clone(),
        );
        self.active = Some(ActiveRound {
            number: round_number,
            answers: IndexMap::new(),
            _clock: clock,
        });

        info!(game_id = %self.game.id, round_number, "round started");
        self.broadcast(ServerEvent::RoundStarted { round: public });
    }

    /// Score and record one submission. Shared by both inbound paths.
    async fn submit_answer(
        &mut self,
        user_id: Uuid,
        submission: Submission,
    ) -> Result<AnswerView, ServiceError> {
        if self.machine.phase() != RoomPhase::InProgress {
            return Err(ServiceError::InvalidState(
                "answers are only accepted while the game is in progress".into(),
            ));
        }
        let display_name = self
            .game
            .participants
            .get(&user_id)
            .map(|player| player.display_name.clone())
            .ok_or_else(|| {
                ServiceError::Authorization("not a participant of this game".into())
            })?;

        let duration_secs = self.state.config().round_duration_secs();
        let round_number = submission.round_number;

        let Some(active) = self.active.as_ref() else {
            return Err(ServiceError::InvalidState(format!(
                "round {round_number} is not accepting answers"
            )));
        };
        if active.number != round_number {
            return Err(ServiceError::InvalidState(format!(
                "round {round_number} is not the current round"
            )));
        }
        if active.answers.contains_key(&user_id) {
            return Err(ServiceError::DuplicateSubmission(format!(
                "answer already submitted for round {round_number}"
            )));
        }

        let truth = self
            .game
            .round(round_number)
            .map(|round| round.truth.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("round {round_number} not found")))?;

        let score = scoring::score(
            &submission.guess,
            &truth,
            submission.time_to_answer,
            duration_secs,
        );
        let answer = Answer {
            user_id,
            round_number,
            guess: submission.guess,
            time_to_answer: submission
                .time_to_answer
                .map(|elapsed| elapsed.clamp(0.0, duration_secs as f64)),
            score,
        };

        // Persist before recording: a failed write rejects the submission so
        // the client knows to retry, instead of silently dropping it.
        self.state
            .store()
            .save_answer(AnswerRecord::from_answer(self.game.id, &answer))
            .await?;

        let view = AnswerView::from_answer(&answer, display_name);
        if let Some(active) = self.active.as_mut() {
            active.answers.insert(user_id, answer);
        }

        info!(
            game_id = %self.game.id,
            user_id = %user_id,
            round_number,
            total = score.total_score,
            "answer recorded"
        );
        Ok(view)
    }

    /// Settle the round early once every participant has answered.
    async fn settle_if_complete(&mut self) {
        let complete = self
            .active
            .as_ref()
            .is_some_and(|active| active.answers.len() >= self.game.participants.len());
        if complete {
            self.settle_round().await;
        }
    }

    /// Complete the active round: reveal the truth, then advance or finish.
    async fn settle_round(&mut self) {
        // Taking the round drops its clock, so the countdown is disarmed and
        // no second settlement trigger can match this round number.
        let Some(active) = self.active.take() else {
            return;
        };
        let round_number = active.number;

        let Some(truth) = self
            .game
            .round(round_number)
            .map(|round| round.truth.clone())
        else {
            error!(game_id = %self.game.id, round_number, "settling unknown round");
            return;
        };

        let mut answers: Vec<Answer> = active.answers.into_values().collect();
        for user_id in self.game.participants.keys() {
            if !answers.iter().any(|answer| answer.user_id == *user_id) {
                answers.push(Answer::absent(*user_id, round_number));
            }
        }

        let views: Vec<AnswerView> = answers
            .iter()
            .map(|answer| {
                let name = self
                    .game
                    .participants
                    .get(&answer.user_id)
                    .map(|player| player.display_name.clone())
                    .unwrap_or_default();
                AnswerView::from_answer(answer, name)
            })
            .collect();
        self.game.answers.extend(answers);

        info!(game_id = %self.game.id, round_number, "round completed");
        self.broadcast(ServerEvent::RoundCompleted {
            round_number,
            correct_answer: RoundRevealView::from(&truth),
            answers: views,
        });

        if self.game.is_last_round(round_number) {
            self.finish_game().await;
        } else {
            let mailbox = self.mailbox.clone();
            let delay = self.state.config().settle_delay();
            let next = round_number + 1;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = mailbox.send(RoomCommand::BeginRound { round_number: next });
            });
        }
    }

    /// Compute, persist and broadcast the final standings.
    async fn finish_game(&mut self) {
        if let Err(err) = self.machine.apply(RoomEvent::Finish) {
            warn!(game_id = %self.game.id, error = %err, "finish ignored");
            return;
        }
        self.game.finished_at = Some(SystemTime::now());

        let results = self.game.compute_results();
        let records: Vec<GameResultRecord> = results
            .iter()
            .map(|result| GameResultRecord::from_result(self.game.id, result))
            .collect();

        // Settlement persistence failures are surfaced to the room as a
        // distinct upstream error; the session still finishes in memory so
        // the room does not hang. Retrying is left to operators.
        if let Err(err) = self
            .state
            .store()
            .save_game_results(records)
            .await
            .map_err(ServiceError::from)
        {
            error!(game_id = %self.game.id, error = %err, "failed to persist game results");
            self.broadcast(ServerEvent::error(&err));
        }
        if let Err(err) = self
            .state
            .store()
            .update_game_status(GameStatusUpdate {
                game_id: self.game.id,
                status: RoomPhase::Finished,
                timestamps: StatusTimestamps::from_session(&self.game),
            })
            .await
        {
            error!(game_id = %self.game.id, error = %err, "failed to persist finished status");
        }

        info!(game_id = %self.game.id, "game finished");
        self.broadcast(ServerEvent::GameFinished { results });
    }

    /// Cancel a waiting room and record the terminal status.
    async fn cancel_room(&mut self) {
        if let Err(err) = self.machine.apply(RoomEvent::Cancel) {
            warn!(game_id = %self.game.id, error = %err, "cancel ignored");
            return;
        }
        self.game.finished_at = Some(SystemTime::now());

        if let Err(err) = self
            .state
            .store()
            .update_game_status(GameStatusUpdate {
                game_id: self.game.id,
                status: RoomPhase::Cancelled,
                timestamps: StatusTimestamps::from_session(&self.game),
            })
            .await
        {
            error!(game_id = %self.game.id, error = %err, "failed to persist cancelled status");
        }
    }

    fn summary(&self) -> GameSummary {
        GameSummary::from_session(&self.game, self.machine.phase())
    }

    /// Fan an event out to every subscribed connection, in producer order.
    /// Connections whose channel is gone are pruned.
    fn broadcast(&mut self, event: ServerEvent) {
        self.subscribers
            .retain(|_, events| events.send(event.clone()).is_ok());
    }

    /// Address an event to a single connection.
    fn unicast(&self, conn_id: Uuid, event: ServerEvent) {
        if let Some(events) = self.subscribers.get(&conn_id) {
            let _ = events.send(event);
        }
    }

    /// Deliver a typed rejection only to the initiating connection.
    fn report(&self, conn_id: Uuid, err: &ServiceError) {
        warn!(game_id = %self.game.id, error = %err, "command rejected");
        self.unicast(conn_id, ServerEvent::error(err));
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::future::{self, BoxFuture};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::{GameStore, memory::InMemoryGameStore},
            storage::{StorageError, StorageResult},
        },
        dto::game::CreateGameRequest,
        providers::{catalog::CatalogTrackProvider, tokens::TokenTableResolver},
        services::game_service,
        state::{AppState, game::GameMode, game::TrackTruth},
    };

    fn truth() -> TrackTruth {
        TrackTruth {
            track_id: "bohemian-rhapsody".into(),
            title: "Bohemian Rhapsody".into(),
            artist: "Queen".into(),
            year: 1975,
            preview_url: Some("https://cdn.example.org/previews/bohemian-rhapsody.mp3".into()),
            cover_url: None,
        }
    }

    fn test_state(store: Arc<InMemoryGameStore>) -> SharedState {
        AppState::new(
            AppConfig::with_timings(
                Duration::from_secs(30),
                Duration::from_secs(1),
                Duration::from_secs(5),
            ),
            Arc::new(TokenTableResolver::new()),
            Arc::new(CatalogTrackProvider::with_catalog(vec![
                truth(),
                TrackTruth {
                    track_id: "dancing-queen".into(),
                    title: "Dancing Queen".into(),
                    artist: "ABBA".into(),
                    year: 1976,
                    preview_url: None,
                    cover_url: None,
                },
            ])),
            store,
        )
    }

    fn player(name: &str) -> PlayerIdentity {
        PlayerIdentity {
            id: Uuid::new_v4(),
            display_name: name.into(),
        }
    }

    async fn create(
        state: &SharedState,
        creator: &PlayerIdentity,
        mode: GameMode,
        max_rounds: u32,
    ) -> Uuid {
        game_service::create_game(state, creator.clone(), CreateGameRequest { mode, max_rounds })
            .await
            .expect("game creation")
            .id
    }

    /// Receive the next event, skipping countdown ticks.
    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(120), rx.recv())
                .await
                .expect("event within the round window")
                .expect("event channel open");
            if !matches!(event, ServerEvent::Countdown { .. }) {
                return event;
            }
        }
    }

    /// Store double delegating to memory, except for writes told to fail.
    struct UnreliableStore {
        inner: InMemoryGameStore,
        fail_answers: bool,
        fail_results: bool,
    }

    impl UnreliableStore {
        fn failing_answers() -> Self {
            Self {
                inner: InMemoryGameStore::new(),
                fail_answers: true,
                fail_results: false,
            }
        }

        fn failing_results() -> Self {
            Self {
                inner: InMemoryGameStore::new(),
                fail_answers: false,
                fail_results: true,
            }
        }
    }

    impl GameStore for UnreliableStore {
        fn save_answer(&self, answer: AnswerRecord) -> BoxFuture<'static, StorageResult<()>> {
            if self.fail_answers {
                return Box::pin(future::ready(Err(StorageError::new(
                    "answer collection rejected the write",
                ))));
            }
            self.inner.save_answer(answer)
        }

        fn save_game_results(
            &self,
            results: Vec<GameResultRecord>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            if self.fail_results {
                return Box::pin(future::ready(Err(StorageError::with_source(
                    "results collection unavailable",
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
                ))));
            }
            self.inner.save_game_results(results)
        }

        fn update_game_status(
            &self,
            update: GameStatusUpdate,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_game_status(update)
        }
    }

    fn solo_state(store: Arc<UnreliableStore>) -> SharedState {
        AppState::new(
            AppConfig::with_timings(
                Duration::from_secs(30),
                Duration::from_secs(1),
                Duration::from_secs(5),
            ),
            Arc::new(TokenTableResolver::new()),
            Arc::new(CatalogTrackProvider::with_catalog(vec![truth()])),
            store,
        )
    }

    fn submission(round_number: u32, year: i32, elapsed: f64) -> Submission {
        Submission {
            round_number,
            guess: Guess {
                artist: Some("Queen".into()),
                track: Some("Bohemian Rhapsody".into()),
                year: Some(year),
            },
            time_to_answer: Some(elapsed),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn solo_game_plays_to_completion_with_exact_scoring() {
        let store = Arc::new(InMemoryGameStore::new());
        let state = test_state(store.clone());
        let creator = player("solo");

        // Single-round solo game pinned to the Queen track.
        let state_one_track = AppState::new(
            state.config().clone(),
            state.identity(),
            Arc::new(CatalogTrackProvider::with_catalog(vec![truth()])),
            store.clone(),
        );
        let game_id = create(&state_one_track, &creator, GameMode::Solo, 1).await;
        let handle = state_one_track.room(game_id).expect("live room");

        let conn_id = Uuid::new_v4();
        let (events, mut rx) = mpsc::unbounded_channel();
        handle
            .send(RoomCommand::Enter {
                conn_id,
                user: creator.clone(),
                events,
            })
            .expect("enter");

        match next_event(&mut rx).await {
            ServerEvent::GameJoined { game } => {
                assert_eq!(game.status, RoomPhase::InProgress);
                assert_eq!(game.current_round, 1);
            }
            other => panic!("expected game-joined, got {other:?}"),
        }

        // Exact artist + exact track + year off by one + 10s of 30s.
        handle
            .send(RoomCommand::Submit {
                conn_id,
                user_id: creator.id,
                submission: submission(1, 1974, 10.0),
            })
            .expect("submit");

        match next_event(&mut rx).await {
            ServerEvent::AnswerSubmitted { answer } => {
                assert_eq!(answer.score.artist_score, 100);
                assert_eq!(answer.score.track_score, 100);
                assert_eq!(answer.score.year_score, 50);
                assert_eq!(answer.score.speed_bonus, 33);
                assert_eq!(answer.score.total_score, 283);
            }
            other => panic!("expected answer-submitted, got {other:?}"),
        }

        match next_event(&mut rx).await {
            ServerEvent::RoundCompleted {
                round_number,
                correct_answer,
                answers,
            } => {
                assert_eq!(round_number, 1);
                assert_eq!(correct_answer.artist, "Queen");
                assert_eq!(correct_answer.year, 1975);
                assert_eq!(answers.len(), 1);
            }
            other => panic!("expected round-completed, got {other:?}"),
        }

        match next_event(&mut rx).await {
            ServerEvent::GameFinished { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].total_score, 283);
                assert_eq!(results[0].position, 1);
            }
            other => panic!("expected game-finished, got {other:?}"),
        }

        assert_eq!(store.answers_for(game_id).len(), 1);
        assert_eq!(store.results_for(game_id).len(), 1);
        let history = store.status_history(game_id);
        assert_eq!(
            history.last().map(|update| update.status),
            Some(RoomPhase::Finished)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn multiplayer_start_needs_a_second_player_and_the_creator() {
        let store = Arc::new(InMemoryGameStore::new());
        let state = test_state(store);
        let creator = player("host");
        let challenger = player("guest");

        let game_id = create(&state, &creator, GameMode::Multiplayer, 2).await;
        let handle = state.room(game_id).expect("live room");

        let host_conn = Uuid::new_v4();
        let (host_events, mut host_rx) = mpsc::unbounded_channel();
        handle
            .send(RoomCommand::Enter {
                conn_id: host_conn,
                user: creator.clone(),
                events: host_events,
            })
            .expect("host enter");
        assert!(matches!(
            next_event(&mut host_rx).await,
            ServerEvent::GameJoined { .. }
        ));

        // Alone in the room: start is rejected.
        handle
            .send(RoomCommand::Start {
                conn_id: host_conn,
                user_id: creator.id,
            })
            .expect("premature start");
        match next_event(&mut host_rx).await {
            ServerEvent::Error { kind, .. } => assert_eq!(kind, "invalid_state"),
            other => panic!("expected error, got {other:?}"),
        }

        let guest_conn = Uuid::new_v4();
        let (guest_events, mut guest_rx) = mpsc::unbounded_channel();
        handle
            .send(RoomCommand::Enter {
                conn_id: guest_conn,
                user: challenger.clone(),
                events: guest_events,
            })
            .expect("guest enter");
        match next_event(&mut host_rx).await {
            ServerEvent::PlayerJoined { player, .. } => assert_eq!(player.id, challenger.id),
            other => panic!("expected player-joined, got {other:?}"),
        }
        assert!(matches!(
            next_event(&mut guest_rx).await,
            ServerEvent::GameJoined { .. }
        ));

        // Non-creator start is rejected.
        handle
            .send(RoomCommand::Start {
                conn_id: guest_conn,
                user_id: challenger.id,
            })
            .expect("guest start");
        match next_event(&mut guest_rx).await {
            ServerEvent::Error { kind, .. } => assert_eq!(kind, "authorization"),
            other => panic!("expected error, got {other:?}"),
        }

        handle
            .send(RoomCommand::Start {
                conn_id: host_conn,
                user_id: creator.id,
            })
            .expect("host start");
        assert!(matches!(
            next_event(&mut host_rx).await,
            ServerEvent::GameStarted { .. }
        ));
        assert!(matches!(
            next_event(&mut host_rx).await,
            ServerEvent::RoundStarted { .. }
        ));
        assert!(matches!(
            next_event(&mut guest_rx).await,
            ServerEvent::GameStarted { .. }
        ));
        assert!(matches!(
            next_event(&mut guest_rx).await,
            ServerEvent::RoundStarted { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn second_answer_for_the_same_round_is_rejected() {
        let store = Arc::new(InMemoryGameStore::new());
        let state = test_state(store.clone());
        let creator = player("host");
        let challenger = player("guest");

        let game_id = create(&state, &creator, GameMode::Multiplayer, 2).await;
        let handle = state.room(game_id).expect("live room");

        let conn_id = Uuid::new_v4();
        let (events, mut rx) = mpsc::unbounded_channel();
        handle
            .send(RoomCommand::Enter {
                conn_id,
                user: creator.clone(),
                events,
            })
            .expect("host enter");
        let _ = game_service::join_game(&state, game_id, challenger.clone())
            .await
            .expect("http join");
        handle
            .send(RoomCommand::Start {
                conn_id,
                user_id: creator.id,
            })
            .expect("start");

        // game-joined, player-joined, game-started, round-started.
        for _ in 0..4 {
            let _ = next_event(&mut rx).await;
        }

        handle
            .send(RoomCommand::Submit {
                conn_id,
                user_id: creator.id,
                submission: submission(1, 1975, 3.0),
            })
            .expect("first submit");
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::AnswerSubmitted { .. }
        ));

        handle
            .send(RoomCommand::Submit {
                conn_id,
                user_id: creator.id,
                submission: submission(1, 1975, 4.0),
            })
            .expect("second submit");
        match next_event(&mut rx).await {
            ServerEvent::Error { kind, .. } => assert_eq!(kind, "duplicate_submission"),
            other => panic!("expected error, got {other:?}"),
        }

        // The duplicate never reached the store.
        assert_eq!(store.answers_for(game_id).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_settles_the_round_and_scores_absentees_zero() {
        let store = Arc::new(InMemoryGameStore::new());
        let state = test_state(store);
        let creator = player("host");
        let challenger = player("guest");

        let game_id = create(&state, &creator, GameMode::Multiplayer, 2).await;
        let handle = state.room(game_id).expect("live room");

        let conn_id = Uuid::new_v4();
        let (events, mut rx) = mpsc::unbounded_channel();
        handle
            .send(RoomCommand::Enter {
                conn_id,
                user: creator.clone(),
                events,
            })
            .expect("host enter");
        let _ = game_service::join_game(&state, game_id, challenger.clone())
            .await
            .expect("http join");
        handle
            .send(RoomCommand::Start {
                conn_id,
                user_id: creator.id,
            })
            .expect("start");
        for _ in 0..4 {
            let _ = next_event(&mut rx).await;
        }

        handle
            .send(RoomCommand::Submit {
                conn_id,
                user_id: creator.id,
                submission: submission(1, 1975, 2.0),
            })
            .expect("submit");
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::AnswerSubmitted { .. }
        ));

        // The challenger never answers; the clock settles the round.
        match next_event(&mut rx).await {
            ServerEvent::RoundCompleted { answers, .. } => {
                assert_eq!(answers.len(), 2);
                let absent = answers
                    .iter()
                    .find(|answer| answer.user_id == challenger.id)
                    .expect("absent row");
                assert_eq!(absent.score.total_score, 0);
                assert!(absent.time_to_answer.is_none());
            }
            other => panic!("expected round-completed, got {other:?}"),
        }

        // After the settle delay the next round is armed exactly once.
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::RoundStarted { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_waiting_room_is_cancelled_and_evicted() {
        let store = Arc::new(InMemoryGameStore::new());
        let state = test_state(store.clone());
        let creator = player("host");

        let game_id = create(&state, &creator, GameMode::Multiplayer, 2).await;
        assert!(state.room(game_id).is_ok());

        // Nobody touches the room past the waiting timeout.
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(state.room(game_id).is_err());
        let history = store.status_history(game_id);
        assert_eq!(
            history.last().map(|update| update.status),
            Some(RoomPhase::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn http_submission_scores_like_the_realtime_path() {
        let store = Arc::new(InMemoryGameStore::new());
        let state = AppState::new(
            AppConfig::with_timings(
                Duration::from_secs(30),
                Duration::from_secs(1),
                Duration::from_secs(5),
            ),
            Arc::new(TokenTableResolver::new()),
            Arc::new(CatalogTrackProvider::with_catalog(vec![truth()])),
            store,
        );
        let creator = player("solo");

        let game_id = create(&state, &creator, GameMode::Solo, 1).await;

        let summary = game_service::game_detail(&state, game_id)
            .await
            .expect("snapshot");
        assert_eq!(summary.status, RoomPhase::InProgress);
        assert_eq!(summary.current_round, 1);

        let request = crate::dto::game::SubmitAnswerRequest {
            round_number: 1,
            guessed_artist: Some("queen".into()),
            guessed_track: None,
            guessed_year: None,
            time_to_answer: Some(15.0),
        };
        let answer = game_service::submit_answer(&state, game_id, creator.clone(), request)
            .await
            .expect("scored answer");

        // Case-insensitive artist match plus half the speed window.
        assert_eq!(answer.score.artist_score, 100);
        assert_eq!(answer.score.speed_bonus, 25);
        assert_eq!(answer.score.total_score, 125);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_answer_write_rejects_the_submission() {
        let store = Arc::new(UnreliableStore::failing_answers());
        let state = solo_state(store.clone());
        let creator = player("solo");

        let game_id = create(&state, &creator, GameMode::Solo, 1).await;
        let handle = state.room(game_id).expect("live room");

        let conn_id = Uuid::new_v4();
        let (events, mut rx) = mpsc::unbounded_channel();
        handle
            .send(RoomCommand::Enter {
                conn_id,
                user: creator.clone(),
                events,
            })
            .expect("enter");
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::GameJoined { .. }
        ));

        handle
            .send(RoomCommand::Submit {
                conn_id,
                user_id: creator.id,
                submission: submission(1, 1975, 5.0),
            })
            .expect("submit");
        match next_event(&mut rx).await {
            ServerEvent::Error { kind, .. } => assert_eq!(kind, "upstream"),
            other => panic!("expected error, got {other:?}"),
        }

        // The rejected answer was not recorded in memory either: a retry is
        // another upstream failure, not a duplicate.
        handle
            .send(RoomCommand::Submit {
                conn_id,
                user_id: creator.id,
                submission: submission(1, 1975, 6.0),
            })
            .expect("retry");
        match next_event(&mut rx).await {
            ServerEvent::Error { kind, .. } => assert_eq!(kind, "upstream"),
            other => panic!("expected error, got {other:?}"),
        }

        assert!(store.inner.answers_for(game_id).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_results_write_is_surfaced_but_the_game_still_finishes() {
        let store = Arc::new(UnreliableStore::failing_results());
        let state = solo_state(store.clone());
        let creator = player("solo");

        let game_id = create(&state, &creator, GameMode::Solo, 1).await;
        let handle = state.room(game_id).expect("live room");

        let conn_id = Uuid::new_v4();
        let (events, mut rx) = mpsc::unbounded_channel();
        handle
            .send(RoomCommand::Enter {
                conn_id,
                user: creator.clone(),
                events,
            })
            .expect("enter");
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::GameJoined { .. }
        ));

        handle
            .send(RoomCommand::Submit {
                conn_id,
                user_id: creator.id,
                submission: submission(1, 1975, 5.0),
            })
            .expect("submit");
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::AnswerSubmitted { .. }
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            ServerEvent::RoundCompleted { .. }
        ));

        // The failed write surfaces as an upstream error, but the game still
        // finishes so the room cannot hang on a dead backend.
        match next_event(&mut rx).await {
            ServerEvent::Error { kind, .. } => assert_eq!(kind, "upstream"),
            other => panic!("expected error, got {other:?}"),
        }
        match next_event(&mut rx).await {
            ServerEvent::GameFinished { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].position, 1);
            }
            other => panic!("expected game-finished, got {other:?}"),
        }

        tokio::task::yield_now().await;
        assert!(state.room(game_id).is_err());
        assert!(store.inner.results_for(game_id).is_empty());
    }
}
