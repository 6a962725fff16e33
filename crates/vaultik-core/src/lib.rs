//! Vaultik client core.
//!
//! The coordination layer of the vault client: layered settings resolution,
//! per-host session lifecycle with external validation, a keyed cancellable
//! task tracker, and a derived per-host instance directory. The UI layer
//! reads these stores synchronously and triggers mutations through their
//! async operations; all persistence goes through the storage adapter.
//!
//! Construct everything once via [`app::AppState::build`] and share the resulting
//! [`app::App`]. There are no ambient singletons; tests construct isolated
//! instances with their own adapters.

pub mod app;
pub mod ignore;
pub mod instances;
pub mod merge;
pub mod preferences;
pub mod search;
pub mod sessions;
pub mod settings;
pub mod sites;
pub mod slot;
pub mod task;

pub use vaultik_types::error::{Error, VkResult};
pub use vaultik_types::{auth_adapter, storage_adapter, types, vault_adapter};

// vim: ts=4
