//! Hub wire protocol
//!
//! Defines the message types exchanged with requesters and workers.
//! The protocol uses JSON over WebSocket with versioning support.

mod messages;
mod version;

pub use messages::*;
pub use version::*;
