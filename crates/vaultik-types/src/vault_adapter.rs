//! Remote vault data adapter.
//!
//! Interface over the vault service's data endpoints: listing vaults,
//! templates and password policies, searching, and object mutation. All
//! calls are keyed by host plus session token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::VkResult;

/// A vault (container of objects) on a remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
	pub id: Box<str>,
	pub name: Box<str>,
	/// Whether the authenticated user may write to this vault.
	#[serde(default)]
	pub can_write: bool,
}

/// One field of an object template.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
	pub name: Box<str>,
	pub title: Option<Box<str>>,
	/// Encrypted fields are omitted from search results until explicitly
	/// decrypted.
	#[serde(default)]
	pub encrypted: bool,
}

/// An object template (structure description) on a remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
	pub id: Box<str>,
	pub name: Box<str>,
	#[serde(default)]
	pub fields: Vec<TemplateField>,
}

/// A password generation policy on a remote host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
	pub id: Box<str>,
	pub name: Box<str>,
	/// Policy rules as delivered by the server (min length, character
	/// classes, ...). Opaque to the core.
	#[serde(default)]
	pub rules: serde_json::Value,
}

/// A vault object as returned by search or decrypt calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultObject {
	pub id: Box<str>,
	pub vault_id: Box<str>,
	pub template_id: Box<str>,
	pub name: Box<str>,
	/// Field values by field name. Encrypted fields are absent until
	/// [`VaultAdapter::decrypt_object`] is called.
	#[serde(default)]
	pub fields: BTreeMap<Box<str>, Box<str>>,
}

/// Vault data adapter trait.
#[async_trait]
pub trait VaultAdapter: Debug + Send + Sync {
	/// List the vaults readable with `token` on `host`.
	async fn vaults(&self, host: &str, token: &str) -> VkResult<Vec<Vault>>;

	/// List the object templates configured on `host`.
	async fn templates(&self, host: &str, token: &str) -> VkResult<Vec<Template>>;

	/// List the password policies configured on `host`.
	async fn policies(&self, host: &str, token: &str) -> VkResult<Vec<PasswordPolicy>>;

	/// Search objects on `host` matching `needle`. Encrypted fields are not
	/// included in the results.
	async fn search(&self, host: &str, token: &str, needle: &str) -> VkResult<Vec<VaultObject>>;

	/// Fetch one object with its encrypted fields decrypted server-side.
	async fn decrypt_object(&self, host: &str, token: &str, object_id: &str)
	-> VkResult<VaultObject>;

	/// Update an object in place. Returns the stored object.
	async fn edit_object(&self, host: &str, token: &str, object: &VaultObject)
	-> VkResult<VaultObject>;

	/// Delete an object.
	async fn delete_object(&self, host: &str, token: &str, object_id: &str) -> VkResult<()>;
}

// vim: ts=4
