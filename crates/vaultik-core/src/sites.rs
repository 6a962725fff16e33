//! Configured vault hosts.
//!
//! The `sites` slot exists in both the sync and managed areas: users manage
//! their own list, organisations push theirs. The merged view marks managed
//! entries, which cannot be removed by the user.

use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::slot::Slot;
use vaultik_types::error::{Error, VkResult};
use vaultik_types::storage_adapter::{StorageAdapter, StorageArea};
use vaultik_types::types::Site;

pub const SITES_KEY: &str = "sites";

#[derive(Debug, Clone)]
pub struct SitesStore {
	adapter: Arc<dyn StorageAdapter>,
	sync_slot: Slot<Vec<Site>>,
	managed_slot: Slot<Vec<Site>>,
}

impl SitesStore {
	pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
		let sync_slot = Slot::new(Arc::clone(&adapter), StorageArea::Sync, SITES_KEY, Vec::new());
		let managed_slot =
			Slot::new(Arc::clone(&adapter), StorageArea::Managed, SITES_KEY, Vec::new());
		Self { adapter, sync_slot, managed_slot }
	}

	/// The merged site list: user-managed entries first, then
	/// organisation-pushed ones (flagged managed regardless of how they were
	/// stored).
	pub async fn get(&self) -> VkResult<Vec<Site>> {
		let mut sites = self.sync_slot.get().await?;
		for mut site in self.managed_slot.get().await? {
			site.managed = true;
			sites.push(site);
		}
		Ok(sites)
	}

	pub async fn find(&self, host: &str) -> VkResult<Option<Site>> {
		Ok(self.get().await?.into_iter().find(|site| *site.host == *host))
	}

	/// Add or replace a user site. Upserts by host; managed entries are
	/// never touched.
	pub async fn add(&self, site: Site) -> VkResult<()> {
		let mut sites = self.sync_slot.get().await?;
		sites.retain(|existing| existing.host != site.host);
		debug!("adding site '{}'", site.host);
		sites.push(Site { managed: false, ..site });
		self.sync_slot.set(&sites).await
	}

	/// Remove a user site by host. Organisation-pushed sites cannot be
	/// removed.
	pub async fn remove(&self, host: &str) -> VkResult<()> {
		let managed = self.managed_slot.get().await?;
		if managed.iter().any(|site| *site.host == *host) {
			return Err(Error::forbidden(format!(
				"site '{}' is managed by the organisation and cannot be removed",
				host
			)));
		}
		let mut sites = self.sync_slot.get().await?;
		let before = sites.len();
		sites.retain(|site| *site.host != *host);
		if sites.len() == before {
			return Err(Error::NotFound(format!("site '{}'", host).into()));
		}
		self.sync_slot.set(&sites).await
	}

	pub async fn clear(&self) -> VkResult<()> {
		self.sync_slot.clear().await
	}

	/// Register a change listener and resolve with the current merged list.
	/// Fires on changes to the `sites` slot in either the sync or managed
	/// area.
	pub async fn subscribe<F>(&self, on_change: F) -> VkResult<Vec<Site>>
	where
		F: Fn(Vec<Site>) + Send + 'static,
	{
		let mut stream = self.adapter.subscribe().await?;
		let current = self.get().await?;
		let store = self.clone();
		tokio::spawn(async move {
			while let Some(change) = stream.next().await {
				if &*change.key != SITES_KEY || change.area == StorageArea::Local {
					continue;
				}
				match store.get().await {
					Ok(sites) => on_change(sites),
					Err(err) => warn!("failed to re-read sites after change: {}", err),
				}
			}
		});
		Ok(current)
	}
}

// vim: ts=4
