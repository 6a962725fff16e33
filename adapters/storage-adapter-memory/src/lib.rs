//! In-memory storage adapter.
//!
//! Backs the Vaultik storage contract with a plain map plus a broadcast
//! channel for change events. Used by the test suites and by embedders that
//! have no host-provided storage areas.
//!
//! The `managed` area is read-only through the [`StorageAdapter`] trait, as
//! it is in a real host environment. Organisation-pushed values can be
//! seeded out-of-band with [`MemoryStorageAdapter::seed_managed`], which
//! emits a change event exactly like a policy push would.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;

use vaultik::prelude::*;
use vaultik::storage_adapter::{StorageAdapter, StorageArea, StorageChange, StorageChangeStream};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct MemoryStorageAdapter {
	slots: RwLock<HashMap<(StorageArea, Box<str>), Value>>,
	changes: broadcast::Sender<StorageChange>,
}

impl Default for MemoryStorageAdapter {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStorageAdapter {
	pub fn new() -> Self {
		let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
		Self { slots: RwLock::new(HashMap::new()), changes }
	}

	/// Seed a slot in the managed area, as an organisation policy push
	/// would. Emits a change event to all subscribers.
	pub fn seed_managed(&self, key: &str, value: Value) {
		self.write(StorageArea::Managed, key, Some(value));
	}

	/// Remove a slot from the managed area, emitting a change event.
	pub fn clear_managed(&self, key: &str) {
		self.write(StorageArea::Managed, key, None);
	}

	fn write(&self, area: StorageArea, key: &str, value: Option<Value>) {
		let old_value = {
			let mut slots = self.slots.write();
			match value.clone() {
				Some(value) => slots.insert((area, key.into()), value),
				None => slots.remove(&(area, key.into())),
			}
		};
		debug!("storage write {}.{}", area, key);
		// Nobody listening is fine; subscribers may come and go.
		let _ = self.changes.send(StorageChange {
			area,
			key: key.into(),
			old_value,
			new_value: value,
		});
	}
}

#[async_trait]
impl StorageAdapter for MemoryStorageAdapter {
	async fn get(&self, area: StorageArea, key: &str) -> VkResult<Option<Value>> {
		Ok(self.slots.read().get(&(area, key.into())).cloned())
	}

	async fn set(&self, area: StorageArea, key: &str, value: Value) -> VkResult<()> {
		if area == StorageArea::Managed {
			return Err(Error::transport_msg("managed storage area is read-only"));
		}
		self.write(area, key, Some(value));
		Ok(())
	}

	async fn remove(&self, area: StorageArea, key: &str) -> VkResult<()> {
		if area == StorageArea::Managed {
			return Err(Error::transport_msg("managed storage area is read-only"));
		}
		self.write(area, key, None);
		Ok(())
	}

	async fn subscribe(&self) -> VkResult<StorageChangeStream> {
		let mut rx = self.changes.subscribe();
		Ok(Box::pin(async_stream::stream! {
			loop {
				match rx.recv().await {
					Ok(change) => yield change,
					// A lagged subscriber skips missed events; each event
					// carries the full new value, so the next one catches up.
					Err(broadcast::error::RecvError::Lagged(_)) => continue,
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		}))
	}
}


// vim: ts=4
