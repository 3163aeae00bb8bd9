//! Connection lifecycle

use std::time::Instant;

/// Lifecycle of a live session
///
/// Results are only delivered while `Active`; once a session starts closing
/// nothing more is sent, even if a frame was in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// WebSocket handshake done, estimator not yet checked
    Connected,

    /// Processing messages
    Active {
        /// When the session became active
        since: Instant,
    },

    /// Cancellation requested (peer left, fatal error or server shutdown)
    Closing,

    /// State discarded
    Closed,
}

impl SessionState {
    /// Check if a transition to the target state is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        use SessionState::*;

        match (self, target) {
            (Connected, Active { .. }) => true,
            (Connected, Closing) => true,
            (Active { .. }, Closing) => true,
            (Closing, Closed) => true,

            (Closed, _) => false,

            (a, b) if a == b => true,

            _ => false,
        }
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            SessionState::Connected => "Connected",
            SessionState::Active { .. } => "Active",
            SessionState::Closing => "Closing",
            SessionState::Closed => "Closed",
        }
    }

    /// Whether results may still be sent to the peer
    pub fn accepts_output(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Active { .. })
    }

    /// Check if the session is closing or closed
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }

    /// Get how long the session has been active, if it is
    pub fn active_duration(&self) -> Option<std::time::Duration> {
        if let SessionState::Active { since } = self {
            Some(since.elapsed())
        } else {
            None
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Holds the current lifecycle state and rejects invalid moves
#[derive(Debug)]
pub struct Lifecycle {
    state: SessionState,
}

impl Lifecycle {
    /// Create a lifecycle in the `Connected` state
    pub fn new() -> Self {
        Self {
            state: SessionState::Connected,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `target` if allowed; returns whether the state changed
    pub fn transition(&mut self, target: SessionState) -> bool {
        if self.state == target || !self.state.can_transition_to(&target) {
            return false;
        }
        self.state = target;
        true
    }

    /// Enter `Active`, stamped with the current time
    pub fn activate(&mut self) -> bool {
        self.transition(SessionState::Active { since: Instant::now() })
    }

    /// Closing then Closed, from wherever we are
    pub fn close(&mut self) {
        self.transition(SessionState::Closing);
        self.transition(SessionState::Closed);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
