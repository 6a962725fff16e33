//! Application assembly.
//!
//! Wires the stores together over a set of adapters and runs the startup
//! sequence: session validation first, then the instance directory follows
//! the session map in the background.

use std::sync::Arc;
use tracing::info;

use crate::ignore::IgnoreStore;
use crate::instances::InstanceDirectory;
use crate::preferences::PreferencesStore;
use crate::search::SearchStore;
use crate::sessions::SessionRegistry;
use crate::settings::SettingsStore;
use crate::sites::SitesStore;
use crate::task::TaskTracker;
use vaultik_types::auth_adapter::AuthAdapter;
use vaultik_types::error::VkResult;
use vaultik_types::storage_adapter::StorageAdapter;
use vaultik_types::vault_adapter::VaultAdapter;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Adapter set the application is built over.
pub struct Adapters {
	pub storage_adapter: Arc<dyn StorageAdapter>,
	pub auth_adapter: Arc<dyn AuthAdapter>,
	pub vault_adapter: Arc<dyn VaultAdapter>,
}

pub struct AppState {
	pub tracker: Arc<TaskTracker>,
	pub settings: SettingsStore,
	pub sites: SitesStore,
	pub preferences: PreferencesStore,
	pub ignore: IgnoreStore,
	pub sessions: SessionRegistry,
	pub instances: InstanceDirectory,
	pub search: SearchStore,

	pub storage_adapter: Arc<dyn StorageAdapter>,
	pub auth_adapter: Arc<dyn AuthAdapter>,
	pub vault_adapter: Arc<dyn VaultAdapter>,
}

pub type App = Arc<AppState>;

impl AppState {
	/// Build the application and run its startup sequence.
	///
	/// Resolves once the persisted sessions are loaded and validated. The
	/// instance directory initializes in the background; gate on
	/// [`InstanceDirectory::wait_initialized`] where its data is needed.
	pub async fn build(adapters: Adapters) -> VkResult<App> {
		info!("starting vaultik core v{}", VERSION);

		let Adapters { storage_adapter, auth_adapter, vault_adapter } = adapters;
		let tracker = Arc::new(TaskTracker::new());

		let settings = SettingsStore::new(Arc::clone(&storage_adapter));
		let sites = SitesStore::new(Arc::clone(&storage_adapter));
		let preferences = PreferencesStore::new(Arc::clone(&storage_adapter));
		let ignore = IgnoreStore::new(Arc::clone(&storage_adapter));
		let sessions = SessionRegistry::new(
			Arc::clone(&storage_adapter),
			Arc::clone(&auth_adapter),
			Arc::clone(&tracker),
			preferences.clone(),
		);
		let instances = InstanceDirectory::new(Arc::clone(&vault_adapter), Arc::clone(&tracker));
		let search = SearchStore::new(Arc::clone(&vault_adapter), Arc::clone(&tracker));

		sessions.init().await?;
		instances.spawn(sessions.watch());

		Ok(Arc::new(AppState {
			tracker,
			settings,
			sites,
			preferences,
			ignore,
			sessions,
			instances,
			search,
			storage_adapter,
			auth_adapter,
			vault_adapter,
		}))
	}
}

// vim: ts=4
