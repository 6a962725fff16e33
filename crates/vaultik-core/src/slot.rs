//! Typed access to one named slot in a storage area.
//!
//! A [`Slot`] pairs an `(area, key)` address with a value type and a
//! declared default, converting at the storage boundary via serde. Reads of
//! an absent slot return the default; every write notifies all subscribers
//! of that slot, including the writer's own subsequent reads.

use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use vaultik_types::error::VkResult;
use vaultik_types::storage_adapter::{StorageAdapter, StorageArea};

#[derive(Debug, Clone)]
pub struct Slot<V> {
	adapter: Arc<dyn StorageAdapter>,
	area: StorageArea,
	key: Box<str>,
	default: V,
}

impl<V> Slot<V>
where
	V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
	pub fn new(
		adapter: Arc<dyn StorageAdapter>,
		area: StorageArea,
		key: impl Into<Box<str>>,
		default: V,
	) -> Self {
		Self { adapter, area, key: key.into(), default }
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	fn decode(&self, value: Option<Value>) -> VkResult<V> {
		match value {
			Some(value) => Ok(serde_json::from_value(value)?),
			None => Ok(self.default.clone()),
		}
	}

	/// Read the current value, falling back to the declared default if the
	/// slot has never been written.
	pub async fn get(&self) -> VkResult<V> {
		self.decode(self.adapter.get(self.area, &self.key).await?)
	}

	/// Persist a new value, notifying all subscribers of this slot.
	pub async fn set(&self, value: &V) -> VkResult<()> {
		self.adapter.set(self.area, &self.key, serde_json::to_value(value)?).await
	}

	/// Remove the persisted value; readers will see the default again.
	pub async fn clear(&self) -> VkResult<()> {
		self.adapter.remove(self.area, &self.key).await
	}

	/// Register a change listener and resolve with the current value.
	///
	/// The change stream is opened before the current value is read, so a
	/// write landing between the two is still delivered and the caller can
	/// seed state without a race. `on_change` receives `(new, old)` full
	/// values, never deltas.
	pub async fn subscribe<F>(&self, on_change: F) -> VkResult<V>
	where
		F: Fn(V, V) + Send + 'static,
	{
		let mut stream = self.adapter.subscribe().await?;
		let current = self.get().await?;
		let slot = self.clone();
		tokio::spawn(async move {
			while let Some(change) = stream.next().await {
				if change.area != slot.area || *change.key != *slot.key {
					continue;
				}
				let old = match slot.decode(change.old_value) {
					Ok(value) => value,
					Err(err) => {
						warn!("slot '{}.{}': undecodable old value: {}", slot.area, slot.key, err);
						slot.default.clone()
					}
				};
				match slot.decode(change.new_value) {
					Ok(new) => on_change(new, old),
					Err(err) => {
						warn!("slot '{}.{}': undecodable new value: {}", slot.area, slot.key, err);
					}
				}
			}
		});
		Ok(current)
	}
}

// vim: ts=4
