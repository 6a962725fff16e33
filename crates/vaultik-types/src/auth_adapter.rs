//! Remote authentication adapter.
//!
//! Thin interface over the vault service's auth endpoints. Tokens are opaque
//! strings; issuing and invalidating them is entirely the remote side's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::VkResult;
use crate::types::Site;

/// Payload of a successful login.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
	pub token: Box<str>,
	/// Audit warnings keyed by warning code (e.g. weak passphrase notices).
	#[serde(default)]
	pub warnings: BTreeMap<Box<str>, Box<str>>,
	/// Policy violations keyed by violation code.
	#[serde(default)]
	pub violations: BTreeMap<Box<str>, Box<str>>,
	/// Server-side token timeout in seconds.
	pub timeout: Option<i64>,
}

/// Authentication adapter trait.
///
/// All operations reject with [`crate::error::Error::Auth`] when the remote
/// service refuses the request, and with [`crate::error::Error::Transport`]
/// when the request itself could not be made.
#[async_trait]
pub trait AuthAdapter: Debug + Send + Sync {
	/// Login using a time-based one-time password from an authenticator app.
	async fn login_totp(
		&self,
		site: &Site,
		username: &str,
		passphrase: &str,
		otp: &str,
	) -> VkResult<LoginData>;

	/// Login using an HMAC-based one-time password from a YubiKey press.
	async fn login_yubikey(
		&self,
		site: &Site,
		username: &str,
		passphrase: &str,
		otp: &str,
	) -> VkResult<LoginData>;

	/// Invalidate the token associated with the `host` session.
	async fn logout(&self, host: &str, token: &str) -> VkResult<()>;

	/// Check token validity. Rejects with an auth error if the session is no
	/// longer valid server-side.
	async fn check(&self, host: &str, token: &str) -> VkResult<()>;
}

// vim: ts=4
