//! Optimistic mutation pipeline
//!
//! The session applies each local action to its store first, then queues the
//! matching [`PersistCommand`]. The [`PersistenceDispatcher`] performs the
//! calls one at a time and reports each [`PersistOutcome`] back. Failures
//! are alerted and never rolled back.

pub mod command;
pub mod dispatcher;

pub use command::{PersistCommand, PersistOutcome};
pub use dispatcher::{
    persist_queue, DispatcherConfig, PendingCommands, PersistQueue, PersistenceDispatcher,
};
