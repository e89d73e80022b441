//! Shared test helpers for `plansync-core` integration tests.
//!
//! Provides an in-memory persisted store that records every call, a notifier
//! that keeps what the user was told, and fixtures for wiring two sessions
//! together through what the store would broadcast.

#![allow(dead_code)]

pub mod fixtures;
pub mod notifier;
pub mod persistence;
