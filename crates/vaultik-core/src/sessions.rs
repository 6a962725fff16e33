//! Per-host session lifecycle.
//!
//! The registry exclusively owns the persisted session map; all mutation
//! goes through its operations. It is however never the sole writer: a
//! different extension surface (or another device, for synced slots) may
//! write the same slot, so every external change flows back in through the
//! storage subscription and replaces the in-memory state wholesale.
//!
//! On initialization every persisted session is validated against its host
//! in parallel; a token the server no longer accepts must not be presented
//! to the UI as live. Only after all validations settle is the registry
//! considered initialized.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::preferences::PreferencesStore;
use crate::slot::Slot;
use crate::task::TaskTracker;
use vaultik_types::auth_adapter::{AuthAdapter, LoginData};
use vaultik_types::error::{Error, VkResult};
use vaultik_types::storage_adapter::{StorageAdapter, StorageArea};
use vaultik_types::types::{Session, SessionMap, Site, Timestamp};

pub const SESSIONS_KEY: &str = "sessions";

/// Task key for re-reading the session map from storage.
pub const SESSIONS_LOADING_TASK: &str = "sessions.loading";
/// Task key for validating persisted sessions against their hosts.
pub const SESSIONS_CHECKING_TASK: &str = "sessions.checking";

#[derive(Debug)]
struct Inner {
	state: RwLock<SessionMap>,
	map_tx: watch::Sender<SessionMap>,
	initialized: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct SessionRegistry {
	inner: Arc<Inner>,
	slot: Slot<SessionMap>,
	auth: Arc<dyn AuthAdapter>,
	tracker: Arc<TaskTracker>,
	preferences: PreferencesStore,
}

impl SessionRegistry {
	pub fn new(
		adapter: Arc<dyn StorageAdapter>,
		auth: Arc<dyn AuthAdapter>,
		tracker: Arc<TaskTracker>,
		preferences: PreferencesStore,
	) -> Self {
		let slot = Slot::new(adapter, StorageArea::Local, SESSIONS_KEY, SessionMap::new());
		let (map_tx, _) = watch::channel(SessionMap::new());
		let (initialized, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner { state: RwLock::new(SessionMap::new()), map_tx, initialized }),
			slot,
			auth,
			tracker,
			preferences,
		}
	}

	/// Subscribe to the persisted session map, seed in-memory state, and
	/// validate every persisted session in parallel. Resolves once all
	/// validations have settled; a session whose token the server rejects
	/// is gone from the exposed state by then.
	pub async fn init(&self) -> VkResult<()> {
		let inner = Arc::clone(&self.inner);
		let current = self
			.slot
			.subscribe(move |new, _old| {
				*inner.state.write() = new.clone();
				inner.map_tx.send_replace(new);
			})
			.await?;
		self.apply(current.clone());

		let auth = Arc::clone(&self.auth);
		let sessions: Vec<(Box<str>, Box<str>)> =
			current.iter().map(|(host, session)| (host.clone(), session.token.clone())).collect();
		let validate = async move {
			let checks = sessions.into_iter().map(|(host, token)| {
				let auth = Arc::clone(&auth);
				async move {
					let result = auth.check(&host, &token).await;
					(host, result)
				}
			});
			Ok(futures::future::join_all(checks).await)
		};

		let registry = self.clone();
		let on_error_registry = self.clone();
		self.tracker.add(
			SESSIONS_CHECKING_TASK,
			validate,
			move |results: Vec<(Box<str>, VkResult<()>)>| {
				tokio::spawn(async move {
					let mut stale = Vec::new();
					for (host, result) in results {
						match result {
							Ok(()) => {}
							Err(err) if err.is_auth() => {
								info!("session for '{}' is no longer valid: {}", host, err);
								stale.push(host);
							}
							Err(err) => {
								// Offline or broken host; the token may still
								// be good, so the session stays.
								warn!("session check for '{}' failed: {}", host, err);
							}
						}
					}
					if let Err(err) = registry.purge(&stale).await {
						warn!("failed to remove stale sessions: {}", err);
					}
					registry.inner.initialized.send_replace(true);
				});
			},
			move |err| {
				warn!("session validation failed: {}", err);
				on_error_registry.inner.initialized.send_replace(true);
			},
		);

		self.wait_initialized().await;
		Ok(())
	}

	/// Re-read the session map from storage through the tracker (key
	/// `sessions.loading`), so a UI surface opening can gate on it.
	pub fn reload(&self) {
		let slot = self.slot.clone();
		let registry = self.clone();
		self.tracker.add(
			SESSIONS_LOADING_TASK,
			async move { slot.get().await },
			move |map| registry.apply(map),
			|err| warn!("failed to reload sessions: {}", err),
		);
	}

	/// Login to `site` using a time-based one-time password. On success the
	/// new session is merged into the persisted map by host; other hosts'
	/// sessions are untouched. On failure nothing is written.
	pub async fn login_totp(
		&self,
		site: &Site,
		username: &str,
		passphrase: &str,
		otp: &str,
	) -> VkResult<()> {
		let data = self.auth.login_totp(site, username, passphrase, otp).await?;
		self.store_login(&site.host, username, data).await
	}

	/// Login to `site` using a YubiKey press.
	pub async fn login_yubikey(
		&self,
		site: &Site,
		username: &str,
		passphrase: &str,
		otp: &str,
	) -> VkResult<()> {
		let data = self.auth.login_yubikey(site, username, passphrase, otp).await?;
		self.store_login(&site.host, username, data).await
	}

	/// Invalidate the session for `host` remotely and remove it locally.
	///
	/// The local entry is removed even when the remote call fails: a session
	/// the user asked to end must not linger as a logged-in illusion in the
	/// UI.
	pub async fn logout(&self, host: &str) -> VkResult<()> {
		let token = self.inner.state.read().get(host).map(|session| session.token.clone());
		let Some(token) = token else {
			return Err(Error::NotFound(format!("session for '{}'", host).into()));
		};
		if let Err(err) = self.auth.logout(host, &token).await {
			warn!("remote logout for '{}' failed: {}; removing local session anyway", host, err);
		}
		self.purge(&[host.into()]).await?;
		info!("logged out from '{}'", host);
		Ok(())
	}

	/// Validate the session for `host` right now. An auth rejection removes
	/// the session and propagates; a transport failure propagates without
	/// touching the session.
	pub async fn check(&self, host: &str) -> VkResult<()> {
		let token = self.inner.state.read().get(host).map(|session| session.token.clone());
		let Some(token) = token else {
			return Err(Error::NotFound(format!("session for '{}'", host).into()));
		};
		match self.auth.check(host, &token).await {
			Ok(()) => Ok(()),
			Err(err) if err.is_auth() => {
				info!("session for '{}' rejected by server; removing", host);
				self.purge(&[host.into()]).await?;
				Err(err)
			}
			Err(err) => Err(err),
		}
	}

	/// Advisory bookkeeping: record activity on the `host` session. Unknown
	/// hosts are ignored.
	pub async fn touch(&self, host: &str) -> VkResult<()> {
		let mut map = self.slot.get().await?;
		let Some(session) = map.get_mut(host) else { return Ok(()) };
		session.last_active = Timestamp::now();
		self.slot.set(&map).await?;
		self.apply(map);
		Ok(())
	}

	/// Point the "current host" at `host`, or clear the pointer. The pointer
	/// may only reference a host with a live session.
	pub async fn select(&self, host: Option<&str>) -> VkResult<()> {
		if let Some(host) = host {
			if !self.inner.state.read().contains_key(host) {
				return Err(Error::NotFound(format!("session for '{}'", host).into()));
			}
		}
		self.preferences.set_last_used_host(host).await
	}

	/// The selected host, if it still has a live session.
	pub async fn selected(&self) -> VkResult<Option<Box<str>>> {
		let Some(host) = self.preferences.last_used_host().await? else { return Ok(None) };
		Ok(self.inner.state.read().contains_key(&host).then_some(host))
	}

	/// Snapshot of the current session map.
	pub fn sessions(&self) -> SessionMap {
		self.inner.state.read().clone()
	}

	pub fn is_online(&self, host: &str) -> bool {
		self.inner.state.read().contains_key(host)
	}

	/// Watch the session map; receivers always observe the latest value.
	pub fn watch(&self) -> watch::Receiver<SessionMap> {
		self.inner.map_tx.subscribe()
	}

	pub fn is_initialized(&self) -> bool {
		*self.inner.initialized.borrow()
	}

	pub async fn wait_initialized(&self) {
		let mut rx = self.inner.initialized.subscribe();
		let _ = rx.wait_for(|ready| *ready).await;
	}

	async fn store_login(&self, host: &str, username: &str, data: LoginData) -> VkResult<()> {
		let now = Timestamp::now();
		let session = Session {
			token: data.token,
			created_at: now,
			last_active: now,
			warnings: data.warnings,
			violations: data.violations,
			timeout: data.timeout,
		};
		let mut map = self.slot.get().await?;
		map.insert(host.into(), session);
		self.slot.set(&map).await?;
		self.apply(map);
		self.preferences.set_last_used_host(Some(host)).await?;
		self.preferences.set_site_username(host, username).await?;
		info!("logged in to '{}'", host);
		Ok(())
	}

	/// Remove the given hosts from the persisted map and sync in-memory
	/// state immediately (the storage event will deliver the same value
	/// again, which is harmless).
	async fn purge(&self, hosts: &[Box<str>]) -> VkResult<()> {
		if hosts.is_empty() {
			return Ok(());
		}
		let mut map = self.slot.get().await?;
		for host in hosts {
			map.remove(host);
		}
		self.slot.set(&map).await?;
		self.apply(map);
		Ok(())
	}

	fn apply(&self, map: SessionMap) {
		*self.inner.state.write() = map.clone();
		self.inner.map_tx.send_replace(map);
	}
}

// vim: ts=4
