//! # PlanSync Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - The reqwest-based HTTP client and the persisted-store API client
//! - The realtime hub transport (negotiate, WebSocket, reconnect)
//! - Session bootstrap tying store, transport and runtime together
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `plansync-core`
//! - Contains all network and file I/O

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod transport;

// Re-export commonly used items
pub use api::{ApiError, ApiErrorCategory, PlanApiClient};
pub use bootstrap::{load_plan, PlanSyncClient};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::init_tracing;
pub use transport::{HubConfig, HubTransport};
