//! # PlanSync Core
//!
//! Pure synchronization logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Fractional key allocation and the entity store for the local mirror
//! - Edit lock coordination and remote event reconciliation
//! - The sequential persistence pipeline and the session runtime
//! - Port interfaces (traits) for the persisted store and user notices
//!
//! ## Architecture Principles
//! - Only depends on `plansync-domain`
//! - No HTTP, WebSocket or platform code
//! - All external dependencies via traits

pub mod calendar;
pub mod edit_lock;
pub mod ordering;
pub mod pipeline;
pub mod ports;
pub mod remote;
pub mod session;
pub mod store;

// Re-export specific items to avoid ambiguity
pub use calendar::{project, CalendarCell, CalendarGrid};
pub use edit_lock::{EditLockCoordinator, LockState};
pub use pipeline::{
    persist_queue, DispatcherConfig, PendingCommands, PersistCommand, PersistOutcome,
    PersistQueue, PersistenceDispatcher,
};
pub use ports::{LogNotifier, Notice, PlanPersistence, UserNotifier};
pub use remote::{InboundEvent, Reconciled, Reconciler, SubscriptionRegistry, TransportEvent};
pub use session::{
    CommandError, CommandResult, PlanSession, RuntimeConfig, SessionHandle, SessionPhase,
    SessionRuntime,
};
pub use store::{assemble_plan, PlanChange, PlanStore};
