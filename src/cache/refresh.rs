//! The shared refresh operation and the opt-in background retry.
//!
//! A refresh is a boxed future wrapped in [`Shared`], stored in the cache state while in flight.
//! Every caller that finds no usable lease clones the same handle, so the lease endpoint sees one
//! request per refresh cycle no matter how many callers pile up. The future publishes its own
//! result, which keeps the cache consistent even if every awaiting caller is cancelled: the handle
//! stays in the state and the next caller re-attaches and drives it to completion.
//!
//! The stored future reaches the cache only through a [`Weak`] reference, so an abandoned refresh
//! never keeps a dropped cache alive.

// std
use std::sync::Weak;

// crates.io
use futures_util::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	cache::Inner,
	clock::Clock,
	config,
	error::CredentialError,
	http::LeaseFetcher,
	lease::{Lease, PersistedLease, TokenSecret},
	store::CredentialStore,
	obs::{self, OpKind, OpOutcome, OpSpan},
};

/// Awaitable handle every concurrent requester attaches to.
pub(crate) type RefreshHandle = Shared<BoxFuture<'static, Result<Lease, CredentialError>>>;

/// Result of inspecting the cache state under its lock.
pub(crate) enum Lookup {
	/// A usable lease was cached.
	Cached(TokenSecret),
	/// The caller must await this refresh (new or already in flight).
	Refresh(RefreshHandle),
}

/// Runs the fast-path check and, if needed, attaches to or starts a refresh, all under one lock.
pub(crate) fn lookup(inner: &Arc<Inner>) -> Lookup {
	let mut state = inner.state.lock();
	let now = inner.clock.now();

	if let Some(lease) =
		state.lease.as_ref().filter(|lease| lease.is_usable_at(now, inner.config.safety_buffer))
	{
		inner.metrics.record_hit();

		return Lookup::Cached(lease.token.clone());
	}
	if let Some(handle) = state.inflight.as_ref() {
		inner.metrics.record_join();

		return Lookup::Refresh(handle.clone());
	}

	let job = RefreshJob {
		fetcher: inner.fetcher.clone(),
		store: inner.store.clone(),
		clock: inner.clock.clone(),
		owner: Arc::downgrade(inner),
	};
	let handle = job.run().boxed().shared();

	inner.metrics.record_fetch();
	state.inflight = Some(handle.clone());

	Lookup::Refresh(handle)
}

/// Everything one refresh needs, detached from the cache that started it.
struct RefreshJob {
	fetcher: Arc<dyn LeaseFetcher>,
	store: Option<Arc<dyn CredentialStore>>,
	clock: Arc<dyn Clock>,
	owner: Weak<Inner>,
}
impl RefreshJob {
	async fn run(self) -> Result<Lease, CredentialError> {
		const KIND: OpKind = OpKind::Refresh;

		let span = OpSpan::new(KIND, "refresh");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.fetch_and_publish()).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn fetch_and_publish(self) -> Result<Lease, CredentialError> {
		const KIND: OpKind = OpKind::Refresh;

		let issued =
			self.fetcher.fetch().await.and_then(|grant| grant.into_lease(self.clock.now()));
		let persisted = match (&issued, self.store.as_ref()) {
			(Ok(lease), Some(store)) => store.save(PersistedLease::from(lease)).await,
			_ => Ok(()),
		};

		if let Err(e) = persisted {
			obs::warn_event(KIND, "failed to persist refreshed lease", &e);
		}

		// Cache dropped mid-flight: nobody is left to publish to.
		let Some(inner) = self.owner.upgrade() else {
			return issued;
		};

		{
			let mut state = inner.state.lock();

			state.inflight = None;
			state.lease = issued.as_ref().ok().cloned();
		}

		if let Err(e) = &issued {
			inner.metrics.record_fetch_failure();
			obs::warn_event(KIND, "lease refresh failed", e);
			schedule_retry(&inner);
		}

		issued
	}
}

/// Schedules one background refresh after a failure when `retry_interval` is configured.
fn schedule_retry(inner: &Arc<Inner>) {
	let Some(interval) = inner.config.retry_interval else {
		return;
	};
	let Ok(runtime) = tokio::runtime::Handle::try_current() else {
		obs::debug_event(OpKind::Refresh, "no tokio runtime; background retry skipped");

		return;
	};
	let weak = Arc::downgrade(inner);

	inner.metrics.record_retry_scheduled();
	obs::debug_event(OpKind::Refresh, "scheduled background lease refresh");
	runtime.spawn(async move {
		tokio::time::sleep(config::to_std(interval)).await;

		let handle = {
			let Some(inner) = weak.upgrade() else {
				return;
			};

			match lookup(&inner) {
				Lookup::Cached(_) => return,
				Lookup::Refresh(handle) => handle,
			}
		};

		let _ = handle.await;
	});
}
