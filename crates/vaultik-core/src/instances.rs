//! Derived per-host instance data.
//!
//! For every host with a live session the directory holds the vaults,
//! templates and password policies fetched from that host. The directory is
//! purely derived state: it follows the session map and reconciles itself
//! whenever the map changes. Consumers never trigger fetches directly.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::task::TaskTracker;
use vaultik_types::types::SessionMap;
use vaultik_types::vault_adapter::{PasswordPolicy, Template, Vault, VaultAdapter};

/// Task key prefix; per-host fetches run under `instances.refresh.<host>`.
pub const INSTANCES_REFRESH_TASK: &str = "instances.refresh";

/// Everything known about one connected host.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
	pub host: Box<str>,
	pub vaults: Vec<Vault>,
	pub templates: Vec<Template>,
	pub policies: Vec<PasswordPolicy>,
}

#[derive(Debug)]
struct Inner {
	instances: RwLock<Vec<Instance>>,
	/// Token the current instance data was fetched with, per host. A host
	/// absent here has no instance and no fetch in flight.
	tokens: Mutex<BTreeMap<Box<str>, Box<str>>>,
	initialized: watch::Sender<bool>,
	/// Hosts from the first reconcile still owed a settled fetch. A host
	/// leaves the set when any fetch for it settles, or when it is removed
	/// from the session map; its very first fetch may never call back if a
	/// token change superseded it mid-flight.
	initial_pending: Mutex<BTreeSet<Box<str>>>,
}

#[derive(Debug, Clone)]
pub struct InstanceDirectory {
	inner: Arc<Inner>,
	vault: Arc<dyn VaultAdapter>,
	tracker: Arc<TaskTracker>,
}

impl InstanceDirectory {
	pub fn new(vault: Arc<dyn VaultAdapter>, tracker: Arc<TaskTracker>) -> Self {
		let (initialized, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner {
				instances: RwLock::new(Vec::new()),
				tokens: Mutex::new(BTreeMap::new()),
				initialized,
				initial_pending: Mutex::new(BTreeSet::new()),
			}),
			vault,
			tracker,
		}
	}

	/// Follow the session map. The first observed value drives the initial
	/// reconcile; the directory is initialized once all of that reconcile's
	/// fetches have settled, successfully or not. A host that cannot be
	/// reached never blocks the others.
	pub fn spawn(&self, mut sessions: watch::Receiver<SessionMap>) {
		let directory = self.clone();
		tokio::spawn(async move {
			let mut initial = true;
			loop {
				let map = sessions.borrow_and_update().clone();
				directory.reconcile(&map, initial);
				initial = false;
				if sessions.changed().await.is_err() {
					break;
				}
			}
		});
	}

	/// Snapshot of all instances, sorted case-insensitively by host.
	pub fn instances(&self) -> Vec<Instance> {
		self.inner.instances.read().clone()
	}

	pub fn instance(&self, host: &str) -> Option<Instance> {
		self.inner.instances.read().iter().find(|inst| &*inst.host == host).cloned()
	}

	pub fn is_initialized(&self) -> bool {
		*self.inner.initialized.borrow()
	}

	pub async fn wait_initialized(&self) {
		let mut rx = self.inner.initialized.subscribe();
		let _ = rx.wait_for(|ready| *ready).await;
	}

	/// Diff the session map against tracked tokens.
	///
	/// Removed hosts are dropped locally with no network traffic, and any
	/// fetch still in flight for them is cancelled. Hosts whose token is
	/// unchanged are left alone. New or re-logged-in hosts get a fresh fetch.
	fn reconcile(&self, sessions: &SessionMap, initial: bool) {
		let stale: Vec<(Box<str>, Box<str>)> = {
			let mut tokens = self.inner.tokens.lock();

			let removed: Vec<Box<str>> =
				tokens.keys().filter(|host| !sessions.contains_key(*host)).cloned().collect();
			for host in removed {
				debug!("dropping instance for '{}'", host);
				self.tracker.cancel(&refresh_key(&host));
				tokens.remove(&host);
				self.inner.instances.write().retain(|inst| inst.host != host);
				// An in-flight initial fetch for this host was just cancelled
				// and will never call back.
				self.settle_initial(&host);
			}

			let mut stale = Vec::new();
			for (host, session) in sessions.iter() {
				if tokens.get(host).is_some_and(|token| *token == session.token) {
					continue;
				}
				tokens.insert(host.clone(), session.token.clone());
				stale.push((host.clone(), session.token.clone()));
			}
			stale
		};

		// The pending set must be in place before any fetch can settle.
		if initial {
			let mut pending = self.inner.initial_pending.lock();
			pending.extend(stale.iter().map(|(host, _)| host.clone()));
			if pending.is_empty() {
				self.inner.initialized.send_replace(true);
			}
		}
		for (host, token) in stale {
			self.fetch(&host, &token);
		}
	}

	fn fetch(&self, host: &str, token: &str) {
		let vault = Arc::clone(&self.vault);
		let fetch_host: Box<str> = host.into();
		let fetch_token: Box<str> = token.into();
		let fut = async move {
			let (vaults, templates, policies) = futures::try_join!(
				vault.vaults(&fetch_host, &fetch_token),
				vault.templates(&fetch_host, &fetch_token),
				vault.policies(&fetch_host, &fetch_token),
			)?;
			Ok(Instance { host: fetch_host, vaults, templates, policies })
		};

		let on_success = {
			let directory = self.clone();
			move |instance: Instance| {
				let host = instance.host.clone();
				directory.upsert(instance);
				directory.settle_initial(&host);
			}
		};
		let on_error = {
			let directory = self.clone();
			let host: Box<str> = host.into();
			move |err| {
				warn!("failed to fetch instance data for '{}': {}", host, err);
				// Forget the token so the next session change retries.
				directory.inner.tokens.lock().remove(&host);
				directory.settle_initial(&host);
			}
		};
		self.tracker.add(refresh_key(host), fut, on_success, on_error);
	}

	fn upsert(&self, instance: Instance) {
		let mut instances = self.inner.instances.write();
		instances.retain(|inst| inst.host != instance.host);
		instances.push(instance);
		instances.sort_by_key(|inst| inst.host.to_uppercase());
	}

	/// Mark `host` as settled for initialization purposes. Any settlement
	/// counts, including a successor fetch after a mid-flight token change;
	/// hosts that never belonged to the initial set are ignored.
	fn settle_initial(&self, host: &str) {
		let mut pending = self.inner.initial_pending.lock();
		if pending.remove(host) && pending.is_empty() {
			self.inner.initialized.send_replace(true);
		}
	}
}

fn refresh_key(host: &str) -> String {
	format!("{INSTANCES_REFRESH_TASK}.{host}")
}

// vim: ts=4
