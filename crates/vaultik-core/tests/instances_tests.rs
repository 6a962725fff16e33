//! Instance directory tests: reconciliation against the session map, fetch
//! economy and initialization gating.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

use common::{MockVaultAdapter, setup_test_logging, test_session, wait_until};
use vaultik_core::instances::InstanceDirectory;
use vaultik_core::task::TaskTracker;
use vaultik_core::types::SessionMap;
use vaultik_core::vault_adapter::VaultAdapter;

struct Harness {
	vault: Arc<MockVaultAdapter>,
	tracker: Arc<TaskTracker>,
	directory: InstanceDirectory,
	sessions: watch::Sender<SessionMap>,
}

fn create_test_directory(initial: SessionMap) -> Harness {
	let vault = Arc::new(MockVaultAdapter::new());
	let tracker = Arc::new(TaskTracker::new());
	let directory = InstanceDirectory::new(
		Arc::clone(&vault) as Arc<dyn VaultAdapter>,
		Arc::clone(&tracker),
	);
	let (sessions, rx) = watch::channel(initial);
	directory.spawn(rx);
	Harness { vault, tracker, directory, sessions }
}

fn session_map(hosts: &[(&str, &str)]) -> SessionMap {
	hosts.iter().map(|(host, token)| ((*host).into(), test_session(token))).collect()
}

#[tokio::test]
async fn test_empty_session_map_initializes_immediately() {
	let h = create_test_directory(SessionMap::new());
	h.directory.wait_initialized().await;
	assert!(h.directory.instances().is_empty());
}

#[tokio::test]
async fn test_initial_fetch_and_case_insensitive_order() {
	setup_test_logging();
	let h = create_test_directory(session_map(&[
		("Banana.example.com", "tok-b"),
		("apple.example.com", "tok-a"),
	]));

	h.directory.wait_initialized().await;
	h.tracker.wait_idle().await;

	let instances = h.directory.instances();
	let hosts: Vec<&str> = instances.iter().map(|inst| &*inst.host).collect();
	// Byte order would put "Banana" first; ordering is case-insensitive.
	assert_eq!(hosts, ["apple.example.com", "Banana.example.com"]);
	assert_eq!(instances[0].vaults.len(), 1);
	assert_eq!(instances[0].templates.len(), 1);
	assert_eq!(instances[0].policies.len(), 1);
	assert_eq!(h.vault.fetch_count("apple.example.com"), 1);
	assert_eq!(h.vault.fetch_count("Banana.example.com"), 1);
}

#[tokio::test]
async fn test_removed_host_is_dropped_without_network_traffic() {
	setup_test_logging();
	let h = create_test_directory(session_map(&[
		("a.example.com", "tok-a"),
		("b.example.com", "tok-b"),
	]));
	h.directory.wait_initialized().await;
	h.tracker.wait_idle().await;

	h.sessions.send_replace(session_map(&[("a.example.com", "tok-a")]));

	let directory = h.directory.clone();
	wait_until(move || directory.instances().len() == 1).await;
	assert!(h.directory.instance("b.example.com").is_none());
	// Removal is pure set difference: no host was re-fetched.
	assert_eq!(h.vault.fetch_count("a.example.com"), 1);
	assert_eq!(h.vault.fetch_count("b.example.com"), 1);
}

#[tokio::test]
async fn test_unchanged_token_is_not_refetched() {
	let h = create_test_directory(session_map(&[("a.example.com", "tok-a")]));
	h.directory.wait_initialized().await;
	h.tracker.wait_idle().await;

	// Same map again, e.g. a touch updating lastActive.
	h.sessions.send_replace(session_map(&[("a.example.com", "tok-a")]));
	h.tracker.wait_idle().await;

	assert_eq!(h.vault.fetch_count("a.example.com"), 1);
}

#[tokio::test]
async fn test_token_change_triggers_refetch() {
	let h = create_test_directory(session_map(&[("a.example.com", "tok-a")]));
	h.directory.wait_initialized().await;
	h.tracker.wait_idle().await;

	// Re-login on the same host issues a new token.
	h.sessions.send_replace(session_map(&[("a.example.com", "tok-a2")]));

	let vault = Arc::clone(&h.vault);
	wait_until(move || vault.fetch_count("a.example.com") == 2).await;
}

#[tokio::test]
async fn test_unreachable_host_does_not_block_initialization() {
	setup_test_logging();
	let vault = Arc::new(MockVaultAdapter::new());
	vault.set_unreachable("down.example.com");
	let tracker = Arc::new(TaskTracker::new());
	let directory = InstanceDirectory::new(
		Arc::clone(&vault) as Arc<dyn VaultAdapter>,
		Arc::clone(&tracker),
	);
	let (sessions, rx) = watch::channel(session_map(&[
		("down.example.com", "tok-down"),
		("up.example.com", "tok-up"),
	]));
	directory.spawn(rx);

	directory.wait_initialized().await;
	tracker.wait_idle().await;

	let instances = directory.instances();
	assert_eq!(instances.len(), 1);
	assert_eq!(&*instances[0].host, "up.example.com");

	// The failed host retries on the next session change for it.
	vault.set_reachable("down.example.com");
	sessions.send_replace(session_map(&[
		("down.example.com", "tok-down2"),
		("up.example.com", "tok-up"),
	]));
	let view = directory.clone();
	wait_until(move || view.instance("down.example.com").is_some()).await;
	assert_eq!(vault.fetch_count("up.example.com"), 1);
}

#[tokio::test]
async fn test_token_change_during_initial_fetch_still_initializes() {
	setup_test_logging();
	let vault = Arc::new(MockVaultAdapter::new());
	vault.hold("a.example.com");
	let tracker = Arc::new(TaskTracker::new());
	let directory = InstanceDirectory::new(
		Arc::clone(&vault) as Arc<dyn VaultAdapter>,
		Arc::clone(&tracker),
	);
	let (sessions, rx) = watch::channel(session_map(&[("a.example.com", "tok-a")]));
	directory.spawn(rx);

	let fetching = Arc::clone(&vault);
	wait_until(move || fetching.fetch_count("a.example.com") == 1).await;

	// A re-login while the first fetch is parked supersedes it; the first
	// fetch never calls back, yet startup must still complete.
	sessions.send_replace(session_map(&[("a.example.com", "tok-a2")]));
	let refetched = Arc::clone(&vault);
	wait_until(move || refetched.fetch_count("a.example.com") == 2).await;
	vault.release("a.example.com");

	timeout(Duration::from_secs(2), directory.wait_initialized())
		.await
		.expect("Failed to initialize after a mid-fetch token change");
	tracker.wait_idle().await;
	assert!(directory.instance("a.example.com").is_some());
}

#[tokio::test]
async fn test_host_removed_during_initial_fetch_still_initializes() {
	setup_test_logging();
	let vault = Arc::new(MockVaultAdapter::new());
	vault.hold("a.example.com");
	let tracker = Arc::new(TaskTracker::new());
	let directory = InstanceDirectory::new(
		Arc::clone(&vault) as Arc<dyn VaultAdapter>,
		Arc::clone(&tracker),
	);
	let (sessions, rx) = watch::channel(session_map(&[("a.example.com", "tok-a")]));
	directory.spawn(rx);

	let fetching = Arc::clone(&vault);
	wait_until(move || fetching.fetch_count("a.example.com") == 1).await;

	// Logging out the only host cancels its parked fetch; nothing remains to
	// settle, so startup completes right away.
	sessions.send_replace(SessionMap::new());
	vault.release("a.example.com");

	timeout(Duration::from_secs(2), directory.wait_initialized())
		.await
		.expect("Failed to initialize after removing the only host mid-fetch");
	tracker.wait_idle().await;
	assert!(directory.instances().is_empty());
}

// vim: ts=4
