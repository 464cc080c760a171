//! One-way notifications from background work to the presentation layer.

use chess_core::{Reconstruction, UserColor};
use tokio::sync::mpsc;

use crate::engine::Suggestion;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A new position was accepted
    BoardUpdated(Reconstruction),
    /// The engine's suggestion for `color`
    Suggestion {
        color: UserColor,
        suggestion: Suggestion,
    },
    /// Something the user should see
    Error(String),
    /// The poller has exited
    PollerStopped,
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
