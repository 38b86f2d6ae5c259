//! Profile and credit storage.
//!
//! This crate provides:
//! - The `ProfileStore` trait used by the ledger and the billing reconciler
//! - A PostgREST-backed implementation with retry and request metrics
//! - An in-process implementation with the same atomic credit semantics
//! - Webhook event claims for replay de-duplication

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod store;

pub use client::PostgrestProfileStore;
pub use config::PostgrestConfig;
pub use error::{ProfileError, ProfileResult};
pub use memory::MemoryProfileStore;
pub use retry::RetryConfig;
pub use store::ProfileStore;
