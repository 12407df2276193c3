// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for lease cache activity.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	acquisitions: AtomicU64,
	hits: AtomicU64,
	joined: AtomicU64,
	fetches: AtomicU64,
	fetch_failures: AtomicU64,
	retries_scheduled: AtomicU64,
}
impl CacheMetrics {
	/// Returns the number of `acquire()` calls.
	pub fn acquisitions(&self) -> u64 {
		self.acquisitions.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions served from the in-memory lease.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions that attached to an in-flight refresh.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns the number of lease endpoint round-trips.
	pub fn fetches(&self) -> u64 {
		self.fetches.load(Ordering::Relaxed)
	}

	/// Returns the number of failed lease endpoint round-trips.
	pub fn fetch_failures(&self) -> u64 {
		self.fetch_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of background retries scheduled after failures.
	pub fn retries_scheduled(&self) -> u64 {
		self.retries_scheduled.load(Ordering::Relaxed)
	}

	pub(crate) fn record_acquisition(&self) {
		self.acquisitions.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fetch(&self) {
		self.fetches.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fetch_failure(&self) {
		self.fetch_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry_scheduled(&self) {
		self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
	}
}
