//! Persistent key/value storage adapter.
//!
//! Models the host environment's storage areas: `local` (device-only),
//! `sync` (synced across devices) and `managed` (organisation-pushed,
//! read-only). Each area holds named slots of JSON values. Writes notify all
//! subscribers, including the writer itself.

use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fmt::Debug;
use std::pin::Pin;

use crate::error::VkResult;

/// The three storage areas with different persistence/visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
	/// Device-only storage.
	Local,
	/// Synced across the user's devices.
	Sync,
	/// Pushed by the organisation; read-only through this trait.
	Managed,
}

impl fmt::Display for StorageArea {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			StorageArea::Local => write!(f, "local"),
			StorageArea::Sync => write!(f, "sync"),
			StorageArea::Managed => write!(f, "managed"),
		}
	}
}

/// Change event emitted when a slot's value is written or removed.
///
/// Carries full values, not deltas: consumers must treat `new_value` as the
/// authoritative latest state of the slot.
#[derive(Debug, Clone)]
pub struct StorageChange {
	pub area: StorageArea,
	pub key: Box<str>,
	pub old_value: Option<Value>,
	pub new_value: Option<Value>,
}

pub type StorageChangeStream = Pin<Box<dyn Stream<Item = StorageChange> + Send>>;

/// Storage adapter trait.
///
/// A failed read or write surfaces as an error; the adapter does not retry.
/// Implementations emit change events in the order writes are applied.
#[async_trait]
pub trait StorageAdapter: Debug + Send + Sync {
	/// Read one slot. Returns `None` if the slot has never been written.
	async fn get(&self, area: StorageArea, key: &str) -> VkResult<Option<Value>>;

	/// Write one slot. Writing to [`StorageArea::Managed`] is an error.
	async fn set(&self, area: StorageArea, key: &str, value: Value) -> VkResult<()>;

	/// Remove one slot. Removing a missing slot is not an error.
	async fn remove(&self, area: StorageArea, key: &str) -> VkResult<()>;

	/// Subscribe to change events across all areas.
	async fn subscribe(&self) -> VkResult<StorageChangeStream>;
}

// vim: ts=4
