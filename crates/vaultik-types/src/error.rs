//! Error type shared across the Vaultik crates.
//!
//! The taxonomy is deliberately small:
//! - [`Error::NotFound`] and [`Error::InvalidPath`] are programming errors
//!   (unknown setting name, bad key path) and propagate to the immediate
//!   caller.
//! - [`Error::Auth`] is a rejection by the remote vault service and is shown
//!   to the user as-is.
//! - [`Error::Forbidden`] is a policy rejection: the operation exists but the
//!   caller may not perform it.
//! - [`Error::Transport`] wraps failures of the underlying storage or network
//!   primitive, preserving the original cause.

use std::fmt;

pub type VkResult<T> = std::result::Result<T, Error>;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug)]
pub enum Error {
	/// A requested setting name or storage entry does not exist in any source.
	NotFound(Box<str>),
	/// A settings key path names a missing intermediate segment.
	InvalidPath(Box<str>),
	/// Login or session validation rejected by the remote host.
	Auth(Box<str>),
	/// The operation is valid but not permitted, e.g. removing a site that is
	/// pushed by organisation policy.
	Forbidden(Box<str>),
	/// The storage or network primitive itself failed.
	Transport { context: Box<str>, source: Option<Source> },
}

impl Error {
	/// Wrap an arbitrary failure of an external primitive, keeping the cause.
	pub fn transport(context: impl Into<Box<str>>, source: impl Into<Source>) -> Self {
		Self::Transport { context: context.into(), source: Some(source.into()) }
	}

	/// A transport failure with no underlying cause worth preserving.
	pub fn transport_msg(context: impl Into<Box<str>>) -> Self {
		Self::Transport { context: context.into(), source: None }
	}

	pub fn auth(message: impl Into<Box<str>>) -> Self {
		Self::Auth(message.into())
	}

	pub fn forbidden(message: impl Into<Box<str>>) -> Self {
		Self::Forbidden(message.into())
	}

	pub fn is_auth(&self) -> bool {
		matches!(self, Self::Auth(_))
	}

	/// Domain errors propagate untouched; everything else is already a
	/// transport wrapper. Used by the task tracker before invoking error
	/// callbacks so callers always receive a typed error.
	pub fn is_domain(&self) -> bool {
		matches!(
			self,
			Self::NotFound(_) | Self::InvalidPath(_) | Self::Auth(_) | Self::Forbidden(_)
		)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::NotFound(what) => write!(f, "not found: {}", what),
			Error::InvalidPath(path) => write!(f, "invalid path: {}", path),
			Error::Auth(msg) => write!(f, "authentication failed: {}", msg),
			Error::Forbidden(msg) => write!(f, "forbidden: {}", msg),
			Error::Transport { context, source: Some(source) } => {
				write!(f, "{}: {}", context, source)
			}
			Error::Transport { context, source: None } => write!(f, "{}", context),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Transport { source: Some(source), .. } => Some(source.as_ref()),
			_ => None,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::transport("serialization failed", err)
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::transport("io error", err)
	}
}

// vim: ts=4
