//! Keyed cancellable task tracker.
//!
//! Tracks in-flight async operations under caller-chosen string keys and
//! guarantees at most one observable outcome per key: submitting a new task
//! under an existing key makes the previous task's callbacks permanently
//! inert, even if its future later settles. Cancellation is
//! suppress-callbacks only; the underlying future is never aborted, since
//! the external primitives offer no cancellation of their own.
//!
//! Keying by string rather than future identity lets unrelated call sites
//! share or isolate cancellation scopes deliberately (e.g. repeated search
//! keystrokes all submit under the same key and only the freshest result is
//! ever applied).

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, error};

use vaultik_types::error::{Error, VkResult};

#[derive(Debug)]
struct Entry {
	/// Distinguishes this submission from a later one under the same key,
	/// so settlement bookkeeping never removes a successor's entry.
	generation: u64,
	cancelled: Arc<AtomicBool>,
}

#[derive(Debug)]
struct Inner {
	tasks: Mutex<HashMap<Box<str>, Entry>>,
	/// Number of active tasks, for `wait_idle`.
	active: watch::Sender<usize>,
}

#[derive(Debug)]
pub struct TaskTracker {
	inner: Arc<Inner>,
	generation: AtomicU64,
}

impl Default for TaskTracker {
	fn default() -> Self {
		Self::new()
	}
}

impl TaskTracker {
	pub fn new() -> Self {
		let (active, _) = watch::channel(0);
		Self {
			inner: Arc::new(Inner { tasks: Mutex::new(HashMap::new()), active }),
			generation: AtomicU64::new(0),
		}
	}

	/// Submit a task under `key`.
	///
	/// An existing task under the same key is cancelled first: its callbacks
	/// will not fire no matter how its future settles. On fulfillment
	/// `on_success` receives the value; on rejection `on_error` receives the
	/// classified error. Either way the task leaves the active set when it
	/// settles.
	pub fn add<T, F, S, E>(&self, key: impl Into<Box<str>>, fut: F, on_success: S, on_error: E)
	where
		T: Send + 'static,
		F: Future<Output = VkResult<T>> + Send + 'static,
		S: FnOnce(T) + Send + 'static,
		E: FnOnce(Error) + Send + 'static,
	{
		let key = key.into();
		let generation = self.generation.fetch_add(1, Ordering::Relaxed);
		let cancelled = Arc::new(AtomicBool::new(false));
		{
			let mut tasks = self.inner.tasks.lock();
			let entry = Entry { generation, cancelled: Arc::clone(&cancelled) };
			if let Some(prev) = tasks.insert(key.clone(), entry) {
				debug!("task '{}' superseded", key);
				prev.cancelled.store(true, Ordering::SeqCst);
			}
			self.inner.active.send_replace(tasks.len());
		}

		let inner = Arc::clone(&self.inner);
		tokio::spawn(async move {
			let result = fut.await;
			if cancelled.load(Ordering::SeqCst) {
				// Deliberately silent: a superseded task is not a failure.
				debug!("task '{}' settled after cancellation", key);
			} else {
				match result {
					Ok(value) => on_success(value),
					Err(err) => on_error(classify(&key, err)),
				}
			}
			let mut tasks = inner.tasks.lock();
			if tasks.get(&key).is_some_and(|entry| entry.generation == generation) {
				tasks.remove(&key);
			}
			inner.active.send_replace(tasks.len());
		});
	}

	/// Cancel the task under `key`, removing it from the active set
	/// immediately. Its callbacks will never fire.
	pub fn cancel(&self, key: &str) {
		let mut tasks = self.inner.tasks.lock();
		if let Some(entry) = tasks.remove(key) {
			entry.cancelled.store(true, Ordering::SeqCst);
			debug!("task '{}' cancelled", key);
		}
		self.inner.active.send_replace(tasks.len());
	}

	/// `true` if any active task key contains one of the given fragments.
	///
	/// Partial matching lets the UI gate on a whole scope: `has(&["sessions"])`
	/// covers both `sessions.loading` and `sessions.checking`.
	pub fn has(&self, fragments: &[&str]) -> bool {
		let tasks = self.inner.tasks.lock();
		fragments.iter().any(|fragment| tasks.keys().any(|key| key.contains(fragment)))
	}

	/// `true` while any task is in flight.
	pub fn is_loading(&self) -> bool {
		!self.inner.tasks.lock().is_empty()
	}

	/// Wait until no task is in flight. Cancelled-but-unsettled futures do
	/// not count; only active entries do.
	pub async fn wait_idle(&self) {
		let mut rx = self.inner.active.subscribe();
		// The receiver observes the current value, so this cannot miss a
		// settlement that happened before the call.
		let _ = rx.wait_for(|active| *active == 0).await;
	}
}

/// Error classification before callbacks fire: domain errors pass through
/// untouched for inline handling; transport failures are logged here so a
/// failed primitive is visible even when the caller only shows a generic
/// message.
fn classify(key: &str, err: Error) -> Error {
	if err.is_domain() {
		err
	} else {
		error!("task '{}' failed: {}", key, err);
		err
	}
}

// vim: ts=4
