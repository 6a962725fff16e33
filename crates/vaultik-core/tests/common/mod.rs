//! Shared test infrastructure: mock auth/vault adapters over the in-memory
//! storage adapter, plus small async helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use vaultik_core::auth_adapter::{AuthAdapter, LoginData};
use vaultik_core::storage_adapter::{StorageAdapter, StorageArea, StorageChangeStream};
use vaultik_core::types::{Session, SessionMap, Site, Timestamp};
use vaultik_core::vault_adapter::{PasswordPolicy, Template, Vault, VaultAdapter, VaultObject};
use vaultik_core::{Error, VkResult};
use vaultik_storage_adapter_memory::MemoryStorageAdapter;

pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

/// Poll `cond` until it holds, or panic after ~1s. For assertions that settle
/// through spawned tasks.
pub async fn wait_until<F: Fn() -> bool>(cond: F) {
	for _ in 0..200 {
		if cond() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("condition not met within timeout");
}

pub fn test_site(host: &str) -> Site {
	Site { host: host.into(), apikey: "test-apikey".into(), managed: false }
}

pub fn test_session(token: &str) -> Session {
	let now = Timestamp::now();
	Session {
		token: token.into(),
		created_at: now,
		last_active: now,
		warnings: BTreeMap::new(),
		violations: BTreeMap::new(),
		timeout: None,
	}
}

/// Persist a session map the way the registry does, without going through it.
pub async fn seed_sessions(storage: &MemoryStorageAdapter, sessions: &[(&str, &str)]) {
	let map: SessionMap =
		sessions.iter().map(|(host, token)| ((*host).into(), test_session(token))).collect();
	let value = serde_json::to_value(&map).expect("Failed to serialize session map");
	storage.set(StorageArea::Local, "sessions", value).await.expect("Failed to seed sessions");
}

/// Mock auth adapter. A token is valid if it is present in `valid`; hosts in
/// `unreachable` fail every call with a transport error.
#[derive(Debug, Default)]
pub struct MockAuthAdapter {
	valid: Mutex<BTreeMap<Box<str>, Box<str>>>,
	unreachable: Mutex<BTreeSet<Box<str>>>,
	pub login_calls: AtomicUsize,
	pub logout_calls: AtomicUsize,
	pub check_calls: AtomicUsize,
}

impl MockAuthAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn accept(&self, host: &str, token: &str) {
		self.valid.lock().insert(host.into(), token.into());
	}

	pub fn set_unreachable(&self, host: &str) {
		self.unreachable.lock().insert(host.into());
	}

	/// Invalidate the token server-side; subsequent `check` calls reject it.
	pub fn revoke(&self, host: &str) {
		self.valid.lock().remove(host);
	}

	fn login(&self, site: &Site, username: &str) -> VkResult<LoginData> {
		self.login_calls.fetch_add(1, Ordering::SeqCst);
		if self.unreachable.lock().contains(&site.host) {
			return Err(Error::transport_msg(format!("'{}' is unreachable", site.host)));
		}
		let token: Box<str> = format!("tok-{}@{}", username, site.host).into();
		self.valid.lock().insert(site.host.clone(), token.clone());
		Ok(LoginData {
			token,
			warnings: BTreeMap::new(),
			violations: BTreeMap::new(),
			timeout: Some(28800),
		})
	}
}

#[async_trait]
impl AuthAdapter for MockAuthAdapter {
	async fn login_totp(
		&self,
		site: &Site,
		username: &str,
		_passphrase: &str,
		_otp: &str,
	) -> VkResult<LoginData> {
		self.login(site, username)
	}

	async fn login_yubikey(
		&self,
		site: &Site,
		username: &str,
		_passphrase: &str,
		_otp: &str,
	) -> VkResult<LoginData> {
		self.login(site, username)
	}

	async fn logout(&self, host: &str, _token: &str) -> VkResult<()> {
		self.logout_calls.fetch_add(1, Ordering::SeqCst);
		if self.unreachable.lock().contains(host) {
			return Err(Error::transport_msg(format!("'{}' is unreachable", host)));
		}
		self.valid.lock().remove(host);
		Ok(())
	}

	async fn check(&self, host: &str, token: &str) -> VkResult<()> {
		self.check_calls.fetch_add(1, Ordering::SeqCst);
		if self.unreachable.lock().contains(host) {
			return Err(Error::transport_msg(format!("'{}' is unreachable", host)));
		}
		match self.valid.lock().get(host) {
			Some(valid) if **valid == *token => Ok(()),
			_ => Err(Error::auth(format!("token for '{}' rejected", host))),
		}
	}
}

/// Mock vault adapter serving canned data. `fetch_count` counts `vaults`
/// calls per host, which stands in for one instance refresh. `hold` parks
/// requests for a host until `release`, to test behaviour while a fetch is
/// in flight.
#[derive(Debug, Default)]
pub struct MockVaultAdapter {
	unreachable: Mutex<BTreeSet<Box<str>>>,
	objects: Mutex<BTreeMap<Box<str>, Vec<VaultObject>>>,
	fetches: Mutex<BTreeMap<Box<str>, usize>>,
	holds: Mutex<BTreeMap<Box<str>, watch::Sender<bool>>>,
}

impl MockVaultAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_unreachable(&self, host: &str) {
		self.unreachable.lock().insert(host.into());
	}

	pub fn set_reachable(&self, host: &str) {
		self.unreachable.lock().remove(host);
	}

	/// Park all further requests for `host` until [`release`](Self::release).
	pub fn hold(&self, host: &str) {
		let (tx, _rx) = watch::channel(false);
		self.holds.lock().insert(host.into(), tx);
	}

	pub fn release(&self, host: &str) {
		if let Some(tx) = self.holds.lock().get(host) {
			tx.send_replace(true);
		}
	}

	pub fn seed_object(&self, host: &str, object: VaultObject) {
		self.objects.lock().entry(host.into()).or_default().push(object);
	}

	pub fn fetch_count(&self, host: &str) -> usize {
		self.fetches.lock().get(host).copied().unwrap_or(0)
	}

	async fn wait_hold(&self, host: &str) {
		let rx = self.holds.lock().get(host).map(watch::Sender::subscribe);
		if let Some(mut rx) = rx {
			let _ = rx.wait_for(|open| *open).await;
		}
	}

	fn gate(&self, host: &str) -> VkResult<()> {
		if self.unreachable.lock().contains(host) {
			return Err(Error::transport_msg(format!("'{}' is unreachable", host)));
		}
		Ok(())
	}
}

pub fn test_object(id: &str, name: &str) -> VaultObject {
	VaultObject {
		id: id.into(),
		vault_id: "179".into(),
		template_id: "20".into(),
		name: name.into(),
		fields: BTreeMap::from([("username".into(), "alice".into())]),
	}
}

#[async_trait]
impl VaultAdapter for MockVaultAdapter {
	async fn vaults(&self, host: &str, _token: &str) -> VkResult<Vec<Vault>> {
		*self.fetches.lock().entry(host.into()).or_insert(0) += 1;
		self.wait_hold(host).await;
		self.gate(host)?;
		Ok(vec![Vault { id: "179".into(), name: format!("Vault on {}", host).into(), can_write: true }])
	}

	async fn templates(&self, host: &str, _token: &str) -> VkResult<Vec<Template>> {
		self.gate(host)?;
		Ok(vec![Template { id: "20".into(), name: "Login".into(), fields: Vec::new() }])
	}

	async fn policies(&self, host: &str, _token: &str) -> VkResult<Vec<PasswordPolicy>> {
		self.gate(host)?;
		Ok(vec![PasswordPolicy {
			id: "1".into(),
			name: "Default".into(),
			rules: serde_json::json!({ "minLength": 12 }),
		}])
	}

	async fn search(&self, host: &str, _token: &str, needle: &str) -> VkResult<Vec<VaultObject>> {
		self.wait_hold(host).await;
		self.gate(host)?;
		let objects = self.objects.lock().get(host).cloned().unwrap_or_default();
		Ok(objects
			.into_iter()
			.filter(|object| object.name.to_lowercase().contains(&needle.to_lowercase()))
			.collect())
	}

	async fn decrypt_object(
		&self,
		host: &str,
		_token: &str,
		object_id: &str,
	) -> VkResult<VaultObject> {
		self.gate(host)?;
		let objects = self.objects.lock();
		let mut object = objects
			.get(host)
			.and_then(|objects| objects.iter().find(|object| &*object.id == object_id))
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("object '{}'", object_id).into()))?;
		object.fields.insert("password".into(), "s3cret".into());
		Ok(object)
	}

	async fn edit_object(
		&self,
		host: &str,
		_token: &str,
		object: &VaultObject,
	) -> VkResult<VaultObject> {
		self.gate(host)?;
		let mut objects = self.objects.lock();
		let stored = objects
			.get_mut(host)
			.and_then(|objects| objects.iter_mut().find(|cached| cached.id == object.id))
			.ok_or_else(|| Error::NotFound(format!("object '{}'", object.id).into()))?;
		*stored = object.clone();
		Ok(object.clone())
	}

	async fn delete_object(&self, host: &str, _token: &str, object_id: &str) -> VkResult<()> {
		self.gate(host)?;
		if let Some(objects) = self.objects.lock().get_mut(host) {
			objects.retain(|object| &*object.id != object_id);
		}
		Ok(())
	}
}

/// Storage wrapper whose sync-area reads always fail. Used to prove that
/// enforced scalar settings resolve without touching the sync area.
#[derive(Debug)]
pub struct PoisonedSyncStorage {
	inner: Arc<MemoryStorageAdapter>,
}

impl PoisonedSyncStorage {
	pub fn new(inner: Arc<MemoryStorageAdapter>) -> Self {
		Self { inner }
	}
}

#[async_trait]
impl StorageAdapter for PoisonedSyncStorage {
	async fn get(&self, area: StorageArea, key: &str) -> VkResult<Option<serde_json::Value>> {
		if area == StorageArea::Sync {
			return Err(Error::transport_msg("sync area must not be read"));
		}
		self.inner.get(area, key).await
	}

	async fn set(&self, area: StorageArea, key: &str, value: serde_json::Value) -> VkResult<()> {
		self.inner.set(area, key, value).await
	}

	async fn remove(&self, area: StorageArea, key: &str) -> VkResult<()> {
		self.inner.remove(area, key).await
	}

	async fn subscribe(&self) -> VkResult<StorageChangeStream> {
		self.inner.subscribe().await
	}
}

// vim: ts=4
