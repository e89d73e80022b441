//! HTTP plumbing shared by the store API client and the hub negotiation.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
