//! Storage layer for tally
//!
//! This crate implements the multi-version row store behind the in-memory
//! engine:
//! - VersionChain: committed versions of one row, newest first
//! - VersionedStore: DashMap of chains plus per-row write intents
//! - Version publication with AtomicU64

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod store;

pub use chain::VersionChain;
pub use store::{VersionedStore, WriteIntent};
