//! Cross-host object search.
//!
//! Fans a needle out to every host with a live session and caches the
//! per-host results. Mutating operations go straight to the adapter and the
//! cache is patched in place, so the UI stays consistent without a re-search.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

use crate::task::TaskTracker;
use vaultik_types::error::{Error, VkResult};
use vaultik_types::types::SessionMap;
use vaultik_types::vault_adapter::{VaultAdapter, VaultObject};

/// Task key prefix; per-host searches run under `search.<host>`.
pub const SEARCH_TASK: &str = "search";

#[derive(Debug, Clone)]
pub struct SearchStore {
	results: Arc<RwLock<BTreeMap<Box<str>, Vec<VaultObject>>>>,
	/// Hosts the latest search was issued against; an in-flight search for a
	/// host missing from the next search gets cancelled, not just purged.
	searched: Arc<Mutex<BTreeSet<Box<str>>>>,
	vault: Arc<dyn VaultAdapter>,
	tracker: Arc<TaskTracker>,
}

impl SearchStore {
	pub fn new(vault: Arc<dyn VaultAdapter>, tracker: Arc<TaskTracker>) -> Self {
		Self {
			results: Arc::new(RwLock::new(BTreeMap::new())),
			searched: Arc::new(Mutex::new(BTreeSet::new())),
			vault,
			tracker,
		}
	}

	/// Search all hosts in `sessions` for `needle`. Each host runs as its own
	/// task, so a slow host delays only its own results; a second search for
	/// a host supersedes the first. Results for hosts without a live session
	/// are dropped from the cache, and their in-flight searches cancelled so
	/// a late settlement cannot re-insert them.
	pub fn search(&self, sessions: &SessionMap, needle: &str) {
		{
			let mut searched = self.searched.lock();
			for host in searched.iter().filter(|host| !sessions.contains_key(*host)) {
				self.tracker.cancel(&search_key(host));
			}
			*searched = sessions.keys().cloned().collect();
		}
		self.results.write().retain(|host, _| sessions.contains_key(host));

		for (host, session) in sessions.iter() {
			let vault = Arc::clone(&self.vault);
			let search_host = host.clone();
			let token = session.token.clone();
			let search_needle: Box<str> = needle.into();
			let fut = async move { vault.search(&search_host, &token, &search_needle).await };

			let on_success = {
				let results = Arc::clone(&self.results);
				let host = host.clone();
				move |objects| {
					results.write().insert(host, objects);
				}
			};
			let on_error = {
				let host = host.clone();
				move |err| warn!("search on '{}' failed: {}", host, err)
			};
			self.tracker.add(search_key(host), fut, on_success, on_error);
		}
	}

	/// Snapshot of the cached results, keyed by host.
	pub fn results(&self) -> BTreeMap<Box<str>, Vec<VaultObject>> {
		self.results.read().clone()
	}

	pub fn clear(&self) {
		self.results.write().clear();
	}

	/// Fetch `object_id` from `host` with encrypted fields decrypted, and
	/// replace the cached copy if the object is present in the results.
	pub async fn decrypt(&self, host: &str, token: &str, object_id: &str) -> VkResult<VaultObject> {
		let object = self.vault.decrypt_object(host, token, object_id).await?;
		self.patch(host, &object);
		Ok(object)
	}

	/// Update `object` on `host` and patch the cached copy.
	pub async fn edit(
		&self,
		host: &str,
		token: &str,
		object: &VaultObject,
	) -> VkResult<VaultObject> {
		let stored = self.vault.edit_object(host, token, object).await?;
		self.patch(host, &stored);
		Ok(stored)
	}

	/// Delete `object_id` on `host` and drop it from the cache.
	pub async fn delete(&self, host: &str, token: &str, object_id: &str) -> VkResult<()> {
		self.vault.delete_object(host, token, object_id).await?;
		if let Some(objects) = self.results.write().get_mut(host) {
			objects.retain(|object| &*object.id != object_id);
		}
		Ok(())
	}

	/// The cached object, or `NotFound` if no search has surfaced it.
	pub fn find(&self, host: &str, object_id: &str) -> VkResult<VaultObject> {
		self.results
			.read()
			.get(host)
			.and_then(|objects| objects.iter().find(|object| &*object.id == object_id))
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("object '{}' on '{}'", object_id, host).into()))
	}

	fn patch(&self, host: &str, object: &VaultObject) {
		if let Some(objects) = self.results.write().get_mut(host) {
			if let Some(slot) = objects.iter_mut().find(|cached| cached.id == object.id) {
				*slot = object.clone();
			}
		}
	}
}

fn search_key(host: &str) -> String {
	format!("{SEARCH_TASK}.{host}")
}

// vim: ts=4
