//! Named connection phases, used only for logging/tracing.
//!
//! A connection's state lives entirely in the control flow of the `async
//! fn` driving it — there is no long-lived struct mutated from callback
//! contexts. These variants exist purely so log lines can say which phase a
//! connection is in, without duplicating the state machine as a second
//! source of truth.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Closed,
    NegoSent,
    CmdRcvd,
    Connected,
    ReqSent,
    RepRcvd,
    Estab,
    CloseWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Closed,
    ReqRcvd,
    Connected,
    Estab,
    CloseWait,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
