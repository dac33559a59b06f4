//! Type definitions shared across the hub
//!
//! Peer identity, roles and system descriptors, plus the job fragment
//! structure carried between requesters and workers.

mod job;
mod peer;

pub use job::*;
pub use peer::*;
