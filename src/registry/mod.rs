//! Connection registry
//!
//! Tracks which requesters and workers are connected and owns each peer's
//! outbound queue handle.

mod connection;
mod outbox;
#[allow(clippy::module_inception)]
mod registry;

pub use connection::{Connection, RttState};
pub use outbox::Outbox;
pub use registry::{ConnectionRegistry, Registries};
