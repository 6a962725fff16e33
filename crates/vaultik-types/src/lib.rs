//! Shared types, adapter traits, and core utilities for the Vaultik client core.
//!
//! This crate contains the foundational types shared between the core crate
//! and all adapter implementations. Extracting these into a separate crate
//! lets adapter crates compile without pulling in the whole core.

pub mod auth_adapter;
pub mod error;
pub mod prelude;
pub mod storage_adapter;
pub mod types;
pub mod vault_adapter;

// vim: ts=4
