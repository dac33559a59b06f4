//! WWC Hub - World Wide Cluster rendezvous hub
//!
//! Library half of the `wwc-hub` binary. Exposes the hub core and the
//! WebSocket listener so they can be embedded and tested directly.

pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod hub;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod types;
pub mod version;

pub use config::HubConfig;
pub use error::{Error, Result};
pub use hub::{Hub, Session};
pub use server::HubServer;
