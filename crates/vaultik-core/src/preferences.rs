//! Device-local UI preferences.
//!
//! Holds the distinguished "current host" pointer and per-host extras such
//! as the last username used in the login form. Advisory data only; nothing
//! here affects session validity.

use std::sync::Arc;
use tracing::debug;

use crate::slot::Slot;
use vaultik_types::error::VkResult;
use vaultik_types::storage_adapter::{StorageAdapter, StorageArea};
use vaultik_types::types::{Preferences, SitePreferences};

pub const PREFERENCES_KEY: &str = "preferences";

#[derive(Debug, Clone)]
pub struct PreferencesStore {
	slot: Slot<Preferences>,
}

impl PreferencesStore {
	pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
		let slot = Slot::new(adapter, StorageArea::Local, PREFERENCES_KEY, Preferences::default());
		Self { slot }
	}

	pub async fn get(&self) -> VkResult<Preferences> {
		self.slot.get().await
	}

	/// Register a change listener and resolve with the current preferences.
	pub async fn subscribe<F>(&self, on_change: F) -> VkResult<Preferences>
	where
		F: Fn(Preferences, Preferences) + Send + 'static,
	{
		self.slot.subscribe(on_change).await
	}

	pub async fn last_used_host(&self) -> VkResult<Option<Box<str>>> {
		Ok(self.slot.get().await?.last_used_host)
	}

	/// Point the "current host" at `host`, or clear the pointer.
	pub async fn set_last_used_host(&self, host: Option<&str>) -> VkResult<()> {
		let mut preferences = self.slot.get().await?;
		preferences.last_used_host = host.map(Into::into);
		self.slot.set(&preferences).await
	}

	/// Remember the username last used to log into `host`.
	pub async fn set_site_username(&self, host: &str, username: &str) -> VkResult<()> {
		let mut preferences = self.slot.get().await?;
		preferences
			.sites
			.entry(host.into())
			.or_insert_with(SitePreferences::default)
			.username = Some(username.into());
		self.slot.set(&preferences).await
	}

	pub async fn site(&self, host: &str) -> VkResult<Option<SitePreferences>> {
		Ok(self.slot.get().await?.sites.get(host).cloned())
	}

	pub async fn clear(&self) -> VkResult<()> {
		debug!("clearing preferences");
		self.slot.clear().await
	}
}

// vim: ts=4
