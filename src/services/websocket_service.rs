//! Real-time gateway: one task per client WebSocket connection.
//!
//! The connection authenticates with its first frame, then routes commands
//! to room sessions by identifier. Room events arrive over a per-connection
//! channel and are serialized by a dedicated writer task, so broadcast
//! order from a room is preserved on the wire.

use std::{collections::HashMap, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientCommand, ServerEvent},
    error::ServiceError,
    services::room_session::{RoomCommand, RoomHandle, Submission},
    state::{
        SharedState,
        game::{Guess, PlayerIdentity},
    },
};

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of one client WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Room sessions publish typed events; this bridge serializes them onto
    // the single writer channel in arrival order.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let bridge_outbound = outbound_tx.clone();
    let bridge_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    if bridge_outbound.send(Message::Text(payload.into())).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to serialize server event");
                }
            }
        }
    });

    let conn_id = Uuid::new_v4();

    let user = match authenticate(&state, &mut receiver, &events_tx).await {
        Some(user) => user,
        None => {
            // Flush any rejection event through the bridge before closing so
            // the client sees the error ahead of the close frame.
            drop(events_tx);
            let _ = bridge_task.await;
            let _ = outbound_tx.send(Message::Close(None));
            drop(outbound_tx);
            let _ = writer_task.await;
            return;
        }
    };
    info!(conn_id = %conn_id, user_id = %user.id, "connection authenticated");
    let _ = events_tx.send(ServerEvent::Authenticated { user: user.clone() });

    // Rooms this connection entered, so close can notify each of them.
    let mut joined: HashMap<Uuid, RoomHandle> = HashMap::new();

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let command = match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => command,
                    Err(err) => {
                        warn!(conn_id = %conn_id, error = %err, "unparseable client command");
                        let invalid = ServiceError::InvalidInput(format!(
                            "unrecognized command: {err}"
                        ));
                        let _ = events_tx.send(ServerEvent::error(&invalid));
                        continue;
                    }
                };
                handle_command(&state, conn_id, &user, &events_tx, &mut joined, command);
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(conn_id = %conn_id, error = %err, "websocket error");
                break;
            }
        }
    }

    for handle in joined.values() {
        let _ = handle.send(RoomCommand::Disconnected { conn_id });
    }
    info!(conn_id = %conn_id, user_id = %user.id, "connection closed");

    finalize(writer_task, bridge_task, outbound_tx, events_tx).await;
}

/// Route one parsed command to the room it targets.
fn handle_command(
    state: &SharedState,
    conn_id: Uuid,
    user: &PlayerIdentity,
    events_tx: &mpsc::UnboundedSender<ServerEvent>,
    joined: &mut HashMap<Uuid, RoomHandle>,
    command: ClientCommand,
) {
    let result = match command {
        ClientCommand::Authenticate { .. } => {
            warn!(conn_id = %conn_id, "ignoring duplicate authenticate command");
            Ok(())
        }
        ClientCommand::JoinGame { game_id } => state.room(game_id).and_then(|handle| {
            handle.send(RoomCommand::Enter {
                conn_id,
                user: user.clone(),
                events: events_tx.clone(),
            })?;
            joined.insert(game_id, handle);
            Ok(())
        }),
        ClientCommand::LeaveGame { game_id } => {
            joined.remove(&game_id);
            state.room(game_id).and_then(|handle| {
                handle.send(RoomCommand::Leave {
                    conn_id,
                    user_id: user.id,
                })
            })
        }
        ClientCommand::StartGame { game_id } => state.room(game_id).and_then(|handle| {
            handle.send(RoomCommand::Start {
                conn_id,
                user_id: user.id,
            })
        }),
        ClientCommand::SubmitAnswer {
            game_id,
            round_number,
            guessed_artist,
            guessed_track,
            guessed_year,
            time_to_answer,
        } => state.room(game_id).and_then(|handle| {
            handle.send(RoomCommand::Submit {
                conn_id,
                user_id: user.id,
                submission: Submission {
                    round_number,
                    guess: Guess {
                        artist: guessed_artist,
                        track: guessed_track,
                        year: guessed_year,
                    },
                    time_to_answer,
                },
            })
        }),
    };

    if let Err(err) = result {
        let _ = events_tx.send(ServerEvent::error(&err));
    }
}

/// Run the first-frame authentication exchange.
///
/// Returns the resolved identity, or `None` when the connection should be
/// closed (timeout, protocol violation, rejected credential).
async fn authenticate(
    state: &SharedState,
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    events_tx: &mpsc::UnboundedSender<ServerEvent>,
) -> Option<PlayerIdentity> {
    let first_frame = match tokio::time::timeout(AUTH_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) => {
            warn!("first frame was not text");
            return None;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            return None;
        }
        Ok(None) | Err(_) => {
            warn!("websocket authentication timed out");
            return None;
        }
    };

    let token = match serde_json::from_str::<ClientCommand>(&first_frame) {
        Ok(ClientCommand::Authenticate { token }) => token,
        Ok(_) => {
            warn!("first command was not authenticate");
            let err = ServiceError::Authentication("connection must authenticate first".into());
            let _ = events_tx.send(ServerEvent::error(&err));
            return None;
        }
        Err(err) => {
            warn!(error = %err, "unparseable authentication frame");
            return None;
        }
    };

    match state.identity().resolve(&token).await {
        Ok(user) => Some(user),
        Err(err) => {
            warn!(error = %err, "credential rejected");
            let _ = events_tx.send(ServerEvent::error(&err.into()));
            None
        }
    }
}

/// Ensure the bridge and writer tasks wind down before the handler returns.
async fn finalize(
    writer_task: JoinHandle<()>,
    bridge_task: JoinHandle<()>,
    outbound_tx: mpsc::UnboundedSender<Message>,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    drop(events_tx);
    let _ = bridge_task.await;
    drop(outbound_tx);
    let _ = writer_task.await;
}
