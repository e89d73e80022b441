//! # PlanSync Domain
//!
//! Business domain types and models for PlanSync.
//!
//! This crate contains:
//! - Plan data types (Plan, PlanDate, PlanActivity, ActivityKey)
//! - Broadcast envelopes and store rows exchanged with collaborators
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants and date/key helpers
//!
//! ## Architecture
//! - No dependencies on other PlanSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::composite_key::{parse_activity_row_id, parse_date_row_id};
pub use utils::dates::{days_inclusive, format_day, parse_day};
