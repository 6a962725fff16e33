//! Layered settings resolution.
//!
//! Four sources contribute to the effective value of a setting, in strict
//! precedence order:
//! 1. organisation-enforced values (managed storage, `enforced` object)
//! 2. user-synced values (sync storage)
//! 3. organisation defaults (managed storage, `default` object)
//! 4. hardcoded defaults compiled into this module
//!
//! Scalars short-circuit: an enforced scalar is returned without consulting
//! any lower source. Object values are deep-merged across all defining
//! sources with the same precedence winning key-by-key conflicts, so keys
//! absent from higher sources still survive from lower ones.
//!
//! Updates only ever touch the user-synced object; enforced and
//! organisation-default values are read-only here.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::merge;
use crate::slot::Slot;
use vaultik_types::error::{Error, VkResult};
use vaultik_types::storage_adapter::{StorageAdapter, StorageArea};
use vaultik_types::types::Setting;

pub const SETTINGS_KEY: &str = "settings";

/// Minutes a user may be idle before being logged out.
pub const SETTING_IDLE_MAX: &str = "idleMax";
/// Whether to fill forms automatically when a single match exists.
pub const SETTING_AUTO_FILL: &str = "autoFill";
/// Hours a session may be kept alive regardless of activity.
pub const SETTING_MAX_TOKEN_LIFE: &str = "maxTokenLife";

fn hardcoded_defaults() -> Map<String, Value> {
	let mut defaults = Map::new();
	defaults.insert(SETTING_IDLE_MAX.into(), json!(20));
	defaults.insert(SETTING_AUTO_FILL.into(), json!(false));
	defaults.insert(SETTING_MAX_TOKEN_LIFE.into(), json!(8));
	defaults
}

/// Uncollapsed view of the settings sources, for a settings UI that shows
/// provenance instead of just effective values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsView {
	/// Organisation-enforced values; read-only to the user.
	pub system: Value,
	/// The user's synced values.
	pub user: Value,
	/// Organisation defaults merged over the hardcoded defaults.
	pub defaults: Value,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
	adapter: Arc<dyn StorageAdapter>,
	sync_slot: Slot<Value>,
	managed_slot: Slot<Value>,
}

impl SettingsStore {
	pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
		let sync_slot = Slot::new(Arc::clone(&adapter), StorageArea::Sync, SETTINGS_KEY, json!({}));
		let managed_slot =
			Slot::new(Arc::clone(&adapter), StorageArea::Managed, SETTINGS_KEY, json!({}));
		Self { adapter, sync_slot, managed_slot }
	}

	/// Resolve the effective value for one named setting.
	///
	/// An enforced scalar returns immediately; the sync area is not even
	/// read in that case. Fails with a not-found error if no source defines
	/// `name` (an unknown setting name is a programming error).
	pub async fn resolve(&self, name: &str) -> VkResult<Setting> {
		let (enforced, managed_default) = self.managed_sources().await?;
		if let Some(value) = enforced.get(name) {
			if !value.is_object() {
				return Ok(Setting { managed: true, value: value.clone() });
			}
		}
		let synced = self.synced_source().await?;
		resolve_from(name, &enforced, &synced, &managed_default, &hardcoded_defaults())
	}

	/// Resolve every setting defined in any source.
	pub async fn resolve_all(&self) -> VkResult<BTreeMap<Box<str>, Setting>> {
		let (enforced, managed_default) = self.managed_sources().await?;
		let synced = self.synced_source().await?;
		let hardcoded = hardcoded_defaults();

		let names: BTreeSet<&str> = enforced
			.keys()
			.chain(synced.keys())
			.chain(managed_default.keys())
			.chain(hardcoded.keys())
			.map(String::as_str)
			.collect();

		let mut settings = BTreeMap::new();
		for name in names {
			let setting = resolve_from(name, &enforced, &synced, &managed_default, &hardcoded)?;
			settings.insert(name.into(), setting);
		}
		Ok(settings)
	}

	/// The sources without collapsing precedence, for display/editing.
	pub async fn get_all(&self) -> VkResult<SettingsView> {
		let (enforced, managed_default) = self.managed_sources().await?;
		let synced = self.synced_source().await?;
		Ok(SettingsView {
			system: Value::Object(enforced),
			user: Value::Object(synced),
			defaults: merge::merge(
				&Value::Object(managed_default),
				&Value::Object(hardcoded_defaults()),
			),
		})
	}

	/// Merge `partial` into the user-synced values and persist. Keys not
	/// named in `partial` keep their current synced value; enforced and
	/// organisation-default sources are never touched.
	pub async fn update(&self, partial: &Value) -> VkResult<()> {
		if !partial.is_object() {
			return Err(Error::transport_msg("settings update requires an object"));
		}
		let synced = self.sync_slot.get().await?;
		let merged = merge::merge(partial, &synced);
		debug!("settings updated: {} field(s)", partial.as_object().map_or(0, Map::len));
		self.sync_slot.set(&merged).await
	}

	/// Delete one leaf from the user-synced values by dot-separated key
	/// path. Fails with an invalid-path error if any intermediate segment
	/// is absent or not an object.
	pub async fn remove_field(&self, path: &str) -> VkResult<()> {
		let mut synced = self.sync_slot.get().await?;
		{
			let invalid = || Error::InvalidPath(path.into());
			let mut cursor = synced.as_object_mut().ok_or_else(invalid)?;
			let segments: Vec<&str> = path.split('.').collect();
			let (leaf, parents) = segments.split_last().ok_or_else(invalid)?;
			for segment in parents {
				cursor = cursor
					.get_mut(*segment)
					.and_then(Value::as_object_mut)
					.ok_or_else(invalid)?;
			}
			cursor.remove(*leaf);
		}
		self.sync_slot.set(&synced).await
	}

	/// Drop all user-synced values, falling back to managed and hardcoded
	/// defaults.
	pub async fn clear(&self) -> VkResult<()> {
		self.sync_slot.clear().await
	}

	pub async fn idle_max(&self) -> VkResult<i64> {
		Ok(self.resolve(SETTING_IDLE_MAX).await?.value.as_i64().unwrap_or(20))
	}

	pub async fn auto_fill(&self) -> VkResult<bool> {
		Ok(self.resolve(SETTING_AUTO_FILL).await?.value.as_bool().unwrap_or(false))
	}

	pub async fn max_token_life(&self) -> VkResult<i64> {
		Ok(self.resolve(SETTING_MAX_TOKEN_LIFE).await?.value.as_i64().unwrap_or(8))
	}

	/// Register a change listener and resolve with the current effective
	/// settings. The listener receives the full re-resolved map whenever the
	/// settings slot changes in the sync or managed area.
	pub async fn subscribe<F>(&self, on_change: F) -> VkResult<BTreeMap<Box<str>, Setting>>
	where
		F: Fn(BTreeMap<Box<str>, Setting>) + Send + 'static,
	{
		let mut stream = self.adapter.subscribe().await?;
		let current = self.resolve_all().await?;
		let store = self.clone();
		tokio::spawn(async move {
			while let Some(change) = stream.next().await {
				if &*change.key != SETTINGS_KEY || change.area == StorageArea::Local {
					continue;
				}
				match store.resolve_all().await {
					Ok(settings) => on_change(settings),
					Err(err) => warn!("failed to re-resolve settings after change: {}", err),
				}
			}
		});
		Ok(current)
	}

	async fn synced_source(&self) -> VkResult<Map<String, Value>> {
		let value = self.sync_slot.get().await?;
		Ok(as_object_or_empty(value, "sync settings"))
	}

	/// The managed `settings` slot holds `{ "enforced": {..}, "default": {..} }`.
	async fn managed_sources(&self) -> VkResult<(Map<String, Value>, Map<String, Value>)> {
		let value = self.managed_slot.get().await?;
		let managed = as_object_or_empty(value, "managed settings");
		let enforced = managed
			.get("enforced")
			.and_then(Value::as_object)
			.cloned()
			.unwrap_or_default();
		let default = managed
			.get("default")
			.and_then(Value::as_object)
			.cloned()
			.unwrap_or_default();
		Ok((enforced, default))
	}
}

fn as_object_or_empty(value: Value, what: &str) -> Map<String, Value> {
	match value {
		Value::Object(map) => map,
		Value::Null => Map::new(),
		other => {
			warn!("{} is not an object (got {}); treating as empty", what, other);
			Map::new()
		}
	}
}

fn resolve_from(
	name: &str,
	enforced: &Map<String, Value>,
	synced: &Map<String, Value>,
	managed_default: &Map<String, Value>,
	hardcoded: &Map<String, Value>,
) -> VkResult<Setting> {
	let managed = enforced.contains_key(name);
	let defined: Vec<&Value> = [
		enforced.get(name),
		synced.get(name),
		managed_default.get(name),
		hardcoded.get(name),
	]
	.into_iter()
	.flatten()
	.collect();

	let Some(first) = defined.first().copied() else {
		return Err(Error::NotFound(format!("setting '{}'", name).into()));
	};
	let value = if first.is_object() {
		match merge::merge_all(defined.iter().copied()) {
			Some(merged) => merged,
			None => first.clone(),
		}
	} else {
		first.clone()
	};
	Ok(Setting { managed, value })
}

// vim: ts=4
