//! Live sessions
//!
//! One session per connection. The coordinator holds the exercise selection
//! and rep counter, `state` tracks the connection lifecycle and `health`
//! collects per-session counters for logging.

pub mod coordinator;
pub mod error;
pub mod health;
pub mod state;

pub use coordinator::{SessionCoordinator, SessionId, SessionSummary};
pub use error::SessionError;
pub use health::{HealthSummary, SessionHealth};
pub use state::{Lifecycle, SessionState};
