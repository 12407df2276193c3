//! Process-wide credential lease cache with single-flight refresh.
//!
//! [`LeaseCache::acquire`] returns a bearer token valid for at least the configured safety buffer.
//! The fast path is a lock-protected read with no I/O. When the lease is missing, stale, or
//! expired, exactly one refresh is issued against the [`LeaseFetcher`] and every concurrent caller
//! receives its result, success or failure. A successful refresh is persisted through the optional
//! [`CredentialStore`] before callers see it; a failed one clears the lease and is not retried
//! unless [`LeaseCacheConfig::retry_interval`] opts in.

mod metrics;
mod refresh;

pub use metrics::CacheMetrics;

// crates.io
use async_lock::OnceCell;
// self
use crate::{
	_prelude::*,
	cache::refresh::{Lookup, RefreshHandle},
	clock::{Clock, SystemClock},
	config::LeaseCacheConfig,
	error::{ConfigError, CredentialError},
	http::LeaseFetcher,
	lease::{Lease, LeaseStatus, TokenSecret},
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{config::Endpoints, http::ReqwestLeaseFetcher};

/// Mutable state guarded as one unit so readers never see a half-updated lease.
#[derive(Default)]
struct LeaseState {
	lease: Option<Lease>,
	inflight: Option<RefreshHandle>,
}

pub(crate) struct Inner {
	fetcher: Arc<dyn LeaseFetcher>,
	store: Option<Arc<dyn CredentialStore>>,
	clock: Arc<dyn Clock>,
	config: LeaseCacheConfig,
	state: Mutex<LeaseState>,
	restored: OnceCell<()>,
	metrics: CacheMetrics,
}
impl Inner {
	/// Loads the persisted lease at most once per cache lifetime.
	async fn ensure_restored(&self) {
		const KIND: OpKind = OpKind::Acquire;

		let Some(store) = self.store.as_ref() else {
			return;
		};

		self.restored
			.get_or_init(|| async {
				match store.load().await {
					Ok(Some(record)) => match record.restore_at(self.clock.now()) {
						Some(lease) => {
							let mut state = self.state.lock();

							if state.lease.is_none() {
								state.lease = Some(lease);
							}
						},
						None => obs::debug_event(KIND, "discarded expired persisted lease"),
					},
					Ok(None) => {},
					Err(e) => obs::warn_event(KIND, "failed to load persisted lease", &e),
				}
			})
			.await;
	}
}

/// Shared handle to one credential scope's lease.
///
/// Clones share the same state, so hand clones to every component that issues authenticated
/// calls; the single-flight guarantee only holds within one cache.
#[derive(Clone)]
pub struct LeaseCache {
	inner: Arc<Inner>,
}
impl LeaseCache {
	/// Creates a cache with default configuration, the system clock, and no persistence.
	pub fn new(fetcher: Arc<dyn LeaseFetcher>) -> Self {
		Self::builder(fetcher).build_unchecked()
	}

	/// Starts a builder around the provided fetcher.
	pub fn builder(fetcher: Arc<dyn LeaseFetcher>) -> LeaseCacheBuilder {
		LeaseCacheBuilder {
			fetcher,
			store: None,
			clock: Arc::new(SystemClock),
			config: LeaseCacheConfig::default(),
		}
	}

	/// Returns a token valid for at least the safety buffer, refreshing if needed.
	pub async fn acquire(&self) -> Result<TokenSecret, CredentialError> {
		const KIND: OpKind = OpKind::Acquire;

		let span = OpSpan::new(KIND, "acquire");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				self.inner.metrics.record_acquisition();
				self.inner.ensure_restored().await;

				let handle = match refresh::lookup(&self.inner) {
					Lookup::Cached(token) => return Ok(token),
					Lookup::Refresh(handle) => handle,
				};
				let lease = handle.await?;

				if lease.is_usable_at(self.inner.clock.now(), self.inner.config.safety_buffer) {
					Ok(lease.token)
				} else {
					Err(CredentialError::ExpiresTooSoon)
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Drops the in-memory lease so the next `acquire()` refreshes; an in-flight refresh is kept.
	pub fn invalidate(&self) {
		self.inner.state.lock().lease = None;
	}

	/// Drops the in-memory lease only if it still holds `token`, so a rejection of an old token
	/// never discards a lease refreshed in the meantime.
	pub fn invalidate_token(&self, token: &TokenSecret) {
		let mut state = self.inner.state.lock();

		if state.lease.as_ref().is_some_and(|lease| &lease.token == token) {
			state.lease = None;
		}
	}

	/// Returns a copy of the current lease, if any.
	pub fn snapshot(&self) -> Option<Lease> {
		self.inner.state.lock().lease.clone()
	}

	/// Returns the lifecycle status of the current lease at the cache clock's "now".
	pub fn status(&self) -> Option<LeaseStatus> {
		let now = self.inner.clock.now();

		self.inner
			.state
			.lock()
			.lease
			.as_ref()
			.map(|lease| lease.status_at(now, self.inner.config.safety_buffer))
	}

	/// Returns `true` while a refresh is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.inner.state.lock().inflight.is_some()
	}

	/// Activity counters.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.inner.metrics
	}

	/// Active configuration.
	pub fn config(&self) -> &LeaseCacheConfig {
		&self.inner.config
	}
}
#[cfg(feature = "reqwest")]
impl LeaseCache {
	/// Creates a cache that fetches leases from `endpoints.lease` with reqwest.
	pub fn with_reqwest(
		endpoints: &Endpoints,
		config: LeaseCacheConfig,
	) -> Result<LeaseCacheBuilder, ConfigError> {
		let fetcher = ReqwestLeaseFetcher::new(endpoints, &config)?;

		Ok(Self::builder(Arc::new(fetcher)).config(config))
	}
}
impl Debug for LeaseCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("LeaseCache")
			.field("lease", &state.lease)
			.field("refreshing", &state.inflight.is_some())
			.field("persistent", &self.inner.store.is_some())
			.field("config", &self.inner.config)
			.finish()
	}
}

/// Builder for [`LeaseCache`].
pub struct LeaseCacheBuilder {
	fetcher: Arc<dyn LeaseFetcher>,
	store: Option<Arc<dyn CredentialStore>>,
	clock: Arc<dyn Clock>,
	config: LeaseCacheConfig,
}
impl LeaseCacheBuilder {
	/// Persists leases through `store` and restores from it on first demand.
	pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Overrides the clock used for freshness checks.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the configuration.
	pub fn config(mut self, config: LeaseCacheConfig) -> Self {
		self.config = config;

		self
	}

	/// Validates the configuration and builds the cache.
	pub fn build(self) -> Result<LeaseCache, ConfigError> {
		self.config.validate()?;

		Ok(self.build_unchecked())
	}

	fn build_unchecked(self) -> LeaseCache {
		LeaseCache {
			inner: Arc::new(Inner {
				fetcher: self.fetcher,
				store: self.store,
				clock: self.clock,
				config: self.config,
				state: Default::default(),
				restored: OnceCell::new(),
				metrics: Default::default(),
			}),
		}
	}
}
impl Debug for LeaseCacheBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LeaseCacheBuilder")
			.field("persistent", &self.store.is_some())
			.field("config", &self.config)
			.finish()
	}
}
