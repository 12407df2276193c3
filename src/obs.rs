//! Optional observability helpers for cache and executor operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `lease_broker.op` with the `op` and `stage`
//!   fields, plus debug/warn events for discarded records, store failures, refresh failures, and
//!   late downstream results.
//! - Enable `metrics` to increment the `lease_broker_op_total` counter for every
//!   attempt/success/failure/timeout, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// `LeaseCache::acquire`.
	Acquire,
	/// A single lease endpoint round-trip.
	Refresh,
	/// `BoundedExecutor::run`.
	Run,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::Acquire => "acquire",
			OpKind::Refresh => "refresh",
			OpKind::Run => "run",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Deadline elapsed first.
	TimedOut,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
			OpOutcome::TimedOut => "timed_out",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
