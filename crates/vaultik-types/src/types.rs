//! Core data types shared by the Vaultik crates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Unix timestamp in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Self {
		Self(chrono::Utc::now().timestamp())
	}
}

/// An authenticated session against one remote vault host.
///
/// At most one session exists per host; the session map in storage is the
/// single source of truth and all mutation goes through the session registry.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	/// Opaque token issued by the remote host.
	pub token: Box<str>,
	pub created_at: Timestamp,
	pub last_active: Timestamp,
	/// Audit warnings reported at login, keyed by warning code.
	#[serde(default)]
	pub warnings: BTreeMap<Box<str>, Box<str>>,
	/// Policy violations reported at login, keyed by violation code.
	#[serde(default)]
	pub violations: BTreeMap<Box<str>, Box<str>>,
	/// Server-side token timeout in seconds. Advisory only; staleness is
	/// always decided by the remote `check` call, never by client timers.
	pub timeout: Option<i64>,
}

/// Session map keyed by host.
///
/// Maps are not natively serializable in the underlying key/value areas, so
/// the map is persisted as an array of `[host, session]` pairs and converted
/// at the storage boundary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMap(BTreeMap<Box<str>, Session>);

impl SessionMap {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Deref for SessionMap {
	type Target = BTreeMap<Box<str>, Session>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for SessionMap {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl FromIterator<(Box<str>, Session)> for SessionMap {
	fn from_iter<I: IntoIterator<Item = (Box<str>, Session)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

impl Serialize for SessionMap {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_seq(self.0.iter())
	}
}

impl<'de> Deserialize<'de> for SessionMap {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let pairs = Vec::<(Box<str>, Session)>::deserialize(deserializer)?;
		Ok(Self(pairs.into_iter().collect()))
	}
}

/// One resolved setting value with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
	/// `true` if the value comes from organisation-enforced storage and must
	/// not be editable in the UI.
	pub managed: bool,
	pub value: serde_json::Value,
}

/// A configured remote vault host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
	pub host: Box<str>,
	pub apikey: Box<str>,
	/// Set for sites pushed through managed storage; such sites cannot be
	/// removed by the user.
	#[serde(default)]
	pub managed: bool,
}

/// Per-host UI preferences, persisted device-locally.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitePreferences {
	/// Last username used to log into this host.
	pub username: Option<Box<str>>,
}

/// Device-local preferences, including the distinguished "current host"
/// pointer. The pointer may name a host with no live session; consumers
/// filter it against the session map.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
	pub last_used_host: Option<Box<str>>,
	#[serde(default)]
	pub sites: BTreeMap<Box<str>, SitePreferences>,
}

// vim: ts=4
