//! WebSocket transport
//!
//! `protocol` holds the JSON message shapes, `connection` runs one session
//! and `server` accepts clients.

pub mod connection;
pub mod protocol;
pub mod server;

pub use connection::{serve_connection, SessionContext};
pub use protocol::{ClientMessage, ServerMessage};
pub use server::PoseServer;
