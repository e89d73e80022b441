//! Broadcast transport
//!
//! Connects to the realtime hub and turns its records into
//! [`plansync_core::TransportEvent`]s for the session runtime.

pub mod hub;
pub mod protocol;

pub use hub::{HubConfig, HubTransport};
