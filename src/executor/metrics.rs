// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::executor::RequestOutcome;

/// Thread-safe counters for bounded requests.
#[derive(Debug, Default)]
pub struct ExecutorMetrics {
	runs: AtomicU64,
	succeeded: AtomicU64,
	failed: AtomicU64,
	timed_out: AtomicU64,
	discarded: AtomicU64,
}
impl ExecutorMetrics {
	/// Returns the number of `run()` calls.
	pub fn runs(&self) -> u64 {
		self.runs.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that succeeded.
	pub fn succeeded(&self) -> u64 {
		self.succeeded.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that failed before the deadline.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that hit their deadline.
	pub fn timed_out(&self) -> u64 {
		self.timed_out.load(Ordering::Relaxed)
	}

	/// Returns the number of work results that arrived after the outcome was settled.
	pub fn discarded(&self) -> u64 {
		self.discarded.load(Ordering::Relaxed)
	}

	pub(crate) fn record_run(&self) {
		self.runs.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_outcome(&self, outcome: &RequestOutcome) {
		let counter = match outcome {
			RequestOutcome::Succeeded(_) => &self.succeeded,
			RequestOutcome::Failed(_) => &self.failed,
			RequestOutcome::TimedOut { .. } => &self.timed_out,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_discarded(&self) {
		self.discarded.fetch_add(1, Ordering::Relaxed);
	}
}
