//! Host ignore list.
//!
//! Hosts on this list are excluded from save/fill prompts. Device-local.

use std::sync::Arc;
use tracing::debug;

use crate::slot::Slot;
use vaultik_types::error::{Error, VkResult};
use vaultik_types::storage_adapter::{StorageAdapter, StorageArea};

pub const IGNORE_KEY: &str = "ignore";

#[derive(Debug, Clone)]
pub struct IgnoreStore {
	slot: Slot<Vec<Box<str>>>,
}

impl IgnoreStore {
	pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
		let slot = Slot::new(adapter, StorageArea::Local, IGNORE_KEY, Vec::new());
		Self { slot }
	}

	pub async fn get(&self) -> VkResult<Vec<Box<str>>> {
		self.slot.get().await
	}

	/// Register a change listener and resolve with the current list.
	pub async fn subscribe<F>(&self, on_change: F) -> VkResult<Vec<Box<str>>>
	where
		F: Fn(Vec<Box<str>>, Vec<Box<str>>) + Send + 'static,
	{
		self.slot.subscribe(on_change).await
	}

	/// Add `host` to the ignore list. Adding an already-ignored host is a
	/// no-op.
	pub async fn add(&self, host: &str) -> VkResult<()> {
		let mut hosts = self.slot.get().await?;
		if hosts.iter().any(|h| **h == *host) {
			debug!("'{}' is already ignored", host);
			return Ok(());
		}
		hosts.push(host.into());
		self.slot.set(&hosts).await
	}

	/// Remove `host` from the ignore list.
	pub async fn remove(&self, host: &str) -> VkResult<()> {
		let mut hosts = self.slot.get().await?;
		let before = hosts.len();
		hosts.retain(|h| **h != *host);
		if hosts.len() == before {
			return Err(Error::NotFound(format!("'{}' in ignore list", host).into()));
		}
		self.slot.set(&hosts).await
	}

	pub async fn clear(&self) -> VkResult<()> {
		self.slot.clear().await
	}
}

// vim: ts=4
