//! Per-round countdown driving deadline-based round settlement.
//!
//! The clock never touches room state itself: it pushes tick and expiry
//! messages into the owning room's mailbox, where the session task decides
//! whether they still apply. A clock that raced its own cancellation can
//! therefore leave at most one stale message behind, which the session
//! discards by comparing round numbers.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::services::room_session::RoomCommand;

/// Handle to an armed countdown. Dropping the handle disarms the clock; a
/// disarmed clock performs no further sends.
#[derive(Debug)]
pub struct RoundClock {
    _cancel: watch::Sender<bool>,
}

/// Arm a countdown for `round_number`.
///
/// Emits one `Countdown` message per second carrying the remaining seconds
/// (starting immediately with the full duration) and a single
/// `RoundExpired` message once the duration elapses.
pub fn arm(
    round_number: u32,
    duration: Duration,
    mailbox: mpsc::UnboundedSender<RoomCommand>,
) -> RoundClock {
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    let total_secs = duration.as_secs().max(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // First tick completes immediately so clients see the full countdown.
        interval.tick().await;

        let mut remaining = total_secs;
        loop {
            if mailbox
                .send(RoomCommand::CountdownTick {
                    round_number,
                    seconds_remaining: remaining,
                })
                .is_err()
            {
                return;
            }

            tokio::select! {
                _ = cancel_rx.changed() => {
                    debug!(round_number, "round clock disarmed");
                    return;
                }
                _ = interval.tick() => {}
            }

            remaining -= 1;
            if remaining == 0 {
                let _ = mailbox.send(RoomCommand::RoundExpired { round_number });
                return;
            }
        }
    });

    RoundClock { _cancel: cancel_tx }
}
