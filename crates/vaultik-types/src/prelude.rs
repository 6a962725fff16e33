//! Common imports for Vaultik crates.

pub use crate::error::{Error, VkResult};
pub use crate::types::Timestamp;

// vim: ts=4
