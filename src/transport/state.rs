//! Connection state machine
//!
//! [`transition`] is the whole lifecycle as a table: every
//! `(ConnectionState, Trigger)` pair has exactly one row. Rows that do
//! nothing are stale events (a close from a socket we already gave up on,
//! a timer that lost a race with `connect()`).

use std::fmt;

/// Close code the client sends on a deliberate disconnect. A close with this
/// code is never retried.
pub const MANUAL_CLOSE_CODE: u16 = 1000;

/// Close code reported when a socket dies without a close handshake
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Consumer called `connect()`
    Connect,
    /// Consumer called `disconnect()`
    Disconnect,
    /// Socket handshake completed
    Opened,
    /// Socket closed with this code
    Closed { code: u16 },
    /// Socket reported an error
    Errored,
    /// Reconnect delay elapsed
    DelayElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ResetAttempts,
    OpenSocket,
    /// Close the socket with [`MANUAL_CLOSE_CODE`]
    CloseSocket,
    ScheduleReconnect,
    CancelReconnect,
    EmitOpen,
    EmitClose,
    EmitError,
    /// Attempts exhausted; surface terminal failure
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: ConnectionState,
    pub effects: Vec<Effect>,
}

impl Step {
    fn to(next: ConnectionState, effects: &[Effect]) -> Self {
        Self {
            next,
            effects: effects.to_vec(),
        }
    }

    fn stay(state: ConnectionState) -> Self {
        Self::to(state, &[])
    }
}

/// Next state and side effects for `trigger` in `state`.
///
/// `can_retry` is whether the reconnect policy allows another automatic
/// attempt given the failures counted so far.
pub fn transition(state: ConnectionState, trigger: Trigger, can_retry: bool) -> Step {
    use ConnectionState::*;
    use Effect::*;

    match (state, trigger) {
        (Disconnected, Trigger::Connect) => Step::to(Connecting, &[ResetAttempts, OpenSocket]),
        (Disconnected, _) => Step::stay(Disconnected),

        (Connecting, Trigger::Opened) => Step::to(Connected, &[ResetAttempts, EmitOpen]),
        (Connecting, Trigger::Closed { .. }) => failed(&[], can_retry),
        (Connecting, Trigger::Errored) => failed(&[EmitError], can_retry),
        (Connecting, Trigger::Disconnect) => Step::to(Disconnected, &[CloseSocket]),
        (Connecting, Trigger::Connect | Trigger::DelayElapsed) => Step::stay(Connecting),

        (Connected, Trigger::Closed { code }) if code == MANUAL_CLOSE_CODE => {
            Step::to(Disconnected, &[EmitClose])
        }
        (Connected, Trigger::Closed { .. }) => failed(&[EmitClose], can_retry),
        // The socket reports the close separately
        (Connected, Trigger::Errored) => Step::to(Connected, &[EmitError]),
        (Connected, Trigger::Disconnect) => Step::to(Disconnected, &[CloseSocket, EmitClose]),
        (Connected, Trigger::Connect | Trigger::Opened | Trigger::DelayElapsed) => {
            Step::stay(Connected)
        }

        (Reconnecting, Trigger::DelayElapsed) => Step::to(Connecting, &[OpenSocket]),
        (Reconnecting, Trigger::Connect) => {
            Step::to(Connecting, &[CancelReconnect, ResetAttempts, OpenSocket])
        }
        (Reconnecting, Trigger::Disconnect) => Step::to(Disconnected, &[CancelReconnect]),
        (Reconnecting, Trigger::Opened | Trigger::Closed { .. } | Trigger::Errored) => {
            Step::stay(Reconnecting)
        }
    }
}

fn failed(first: &[Effect], can_retry: bool) -> Step {
    let mut effects = first.to_vec();
    if can_retry {
        effects.push(Effect::ScheduleReconnect);
        Step {
            next: ConnectionState::Reconnecting,
            effects,
        }
    } else {
        effects.push(Effect::GiveUp);
        Step {
            next: ConnectionState::Disconnected,
            effects,
        }
    }
}
