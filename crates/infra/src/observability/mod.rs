//! Observability
//!
//! Structured logging through `tracing`; this module only installs the
//! subscriber.

pub mod logging;

pub use logging::init_tracing;
