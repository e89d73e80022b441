//! Persisted-store API
//!
//! [`PlanApiClient`] is the production [`plansync_core::PlanPersistence`]
//! adapter. Store failures are classified as [`ApiError`] and flattened into
//! `PlanSyncError` before they leave this module.

pub mod client;
pub mod errors;

pub use client::PlanApiClient;
pub use errors::{ApiError, ApiErrorCategory};
