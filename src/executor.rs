//! Deadline-bounded execution of authenticated inference calls.
//!
//! [`BoundedExecutor::run`] races two spawned tasks against one [`OutcomeSlot`]:
//!
//! - the work task acquires a credential from the [`LeaseCache`] and calls the downstream;
//! - the timer task fires at the request deadline.
//!
//! Whichever settles the slot first decides the [`RequestOutcome`]. A winning work task aborts the
//! timer. A winning timer leaves the downstream call running, but its result is discarded and only
//! shows up in [`ExecutorMetrics::discarded`].

mod metrics;
mod outcome;
mod slot;

pub use metrics::ExecutorMetrics;
pub use outcome::*;
pub use slot::OutcomeSlot;

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	task::{AbortHandle, JoinHandle},
	time::Instant,
};
// self
use crate::{
	_prelude::*,
	cache::LeaseCache,
	config::{self, ExecutorConfig},
	error::{ConfigError, DownstreamError},
	http::{InferenceRequest, InferenceTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
};
#[cfg(feature = "reqwest")]
use crate::http::ReqwestInferenceTransport;

#[cfg(feature = "reqwest")]
/// Executor specialized for the crate's default reqwest transport.
pub type ReqwestExecutor = BoundedExecutor<ReqwestInferenceTransport>;

/// When a bounded request must settle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deadline {
	/// Relative budget measured from the start of `run()`.
	After(Duration),
	/// Absolute instant on the tokio clock.
	At(Instant),
}

/// One caller's request plus its deadline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundedRequest {
	/// Payload forwarded downstream.
	pub request: InferenceRequest,
	/// Explicit deadline; falls back to [`ExecutorConfig::default_timeout`].
	pub deadline: Option<Deadline>,
}
impl BoundedRequest {
	/// Creates a request for `text` with the executor's default timeout.
	pub fn new(text: impl Into<String>) -> Self {
		Self { request: InferenceRequest::new(text), deadline: None }
	}

	/// Bounds the request by a relative timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.deadline = Some(Deadline::After(timeout));

		self
	}

	/// Bounds the request by an absolute instant.
	pub fn with_deadline(mut self, instant: Instant) -> Self {
		self.deadline = Some(Deadline::At(instant));

		self
	}

	/// Resolves the absolute deadline and the budget it represents.
	///
	/// Relative budgets beyond [`config::MAX_TIMEOUT`] are scheduled at that cap; the reported
	/// timeout stays the requested one.
	fn resolve(&self, start: Instant, default_timeout: Duration) -> (Instant, Duration) {
		match self.deadline.unwrap_or(Deadline::After(default_timeout)) {
			Deadline::After(timeout) =>
				(start + config::to_std(timeout.min(config::MAX_TIMEOUT)), timeout),
			Deadline::At(instant) => {
				let budget = instant.saturating_duration_since(start);

				(instant, Duration::try_from(budget).unwrap_or(Duration::MAX))
			},
		}
	}
}

/// Aborts the timer task when dropped, including when the caller of `run()` is cancelled.
struct TimerGuard(JoinHandle<()>);
impl Drop for TimerGuard {
	fn drop(&mut self) {
		self.0.abort();
	}
}

/// Runs inference calls with a credential from the lease cache and a hard deadline.
pub struct BoundedExecutor<T>
where
	T: ?Sized + InferenceTransport,
{
	cache: LeaseCache,
	transport: Arc<T>,
	config: ExecutorConfig,
	metrics: Arc<ExecutorMetrics>,
}
impl<T> BoundedExecutor<T>
where
	T: ?Sized + InferenceTransport,
{
	/// Creates an executor with the default configuration.
	pub fn new(cache: LeaseCache, transport: impl Into<Arc<T>>) -> Self {
		Self {
			cache,
			transport: transport.into(),
			config: ExecutorConfig::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the configuration after validating it.
	pub fn with_config(mut self, config: ExecutorConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		self.config = config;

		Ok(self)
	}

	/// The lease cache credentials come from.
	pub fn cache(&self) -> &LeaseCache {
		&self.cache
	}

	/// Activity counters.
	pub fn metrics(&self) -> &ExecutorMetrics {
		&self.metrics
	}

	/// Runs `request`, settling exactly once by its deadline.
	pub async fn run(&self, request: BoundedRequest) -> RequestOutcome {
		const KIND: OpKind = OpKind::Run;

		let span = OpSpan::new(KIND, "run");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);
		self.metrics.record_run();

		let outcome = span.instrument(self.race(request)).await;

		self.metrics.record_outcome(&outcome);
		obs::record_op_outcome(KIND, outcome.op_outcome());

		outcome
	}

	/// Convenience wrapper for `run(BoundedRequest::new(text))`.
	pub async fn ask(&self, text: impl Into<String>) -> RequestOutcome {
		self.run(BoundedRequest::new(text)).await
	}

	async fn race(&self, request: BoundedRequest) -> RequestOutcome {
		let (deadline, timeout) = request.resolve(Instant::now(), self.config.default_timeout);
		let (slot, receiver) = OutcomeSlot::new();
		let slot = Arc::new(slot);
		let timer = TimerGuard(tokio::spawn(fire_at(slot.clone(), deadline, timeout)));

		tokio::spawn(work(
			self.cache.clone(),
			self.transport.clone(),
			self.metrics.clone(),
			slot,
			timer.0.abort_handle(),
			self.config.transport_timeout_std(),
			request.request,
		));

		let outcome = receiver.await.unwrap_or(RequestOutcome::Failed(Error::Abandoned));

		drop(timer);

		outcome
	}
}
impl<T> Clone for BoundedExecutor<T>
where
	T: ?Sized + InferenceTransport,
{
	fn clone(&self) -> Self {
		Self {
			cache: self.cache.clone(),
			transport: self.transport.clone(),
			config: self.config.clone(),
			metrics: self.metrics.clone(),
		}
	}
}
#[cfg(feature = "reqwest")]
impl BoundedExecutor<ReqwestInferenceTransport> {
	/// Creates an executor calling `endpoints.inference` with reqwest.
	///
	/// The client enforces [`ExecutorConfig::transport_timeout`] on every downstream call.
	pub fn with_reqwest(
		cache: LeaseCache,
		endpoints: &config::Endpoints,
		config: ExecutorConfig,
	) -> Result<Self, ConfigError> {
		let transport = ReqwestInferenceTransport::new(endpoints, &config)?;

		Self::new(cache, transport).with_config(config)
	}
}
impl<T> Debug for BoundedExecutor<T>
where
	T: ?Sized + InferenceTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BoundedExecutor")
			.field("cache", &self.cache)
			.field("config", &self.config)
			.finish()
	}
}

async fn fire_at(slot: Arc<OutcomeSlot<RequestOutcome>>, deadline: Instant, timeout: Duration) {
	tokio::time::sleep_until(deadline).await;
	slot.settle(RequestOutcome::TimedOut { timeout });
}

async fn work<T>(
	cache: LeaseCache,
	transport: Arc<T>,
	metrics: Arc<ExecutorMetrics>,
	slot: Arc<OutcomeSlot<RequestOutcome>>,
	timer: AbortHandle,
	transport_timeout: StdDuration,
	request: InferenceRequest,
) where
	T: ?Sized + InferenceTransport,
{
	let settle = |outcome: RequestOutcome| {
		if slot.settle(outcome) {
			timer.abort();
		} else {
			metrics.record_discarded();
			obs::debug_event(OpKind::Run, "discarded result that arrived after the deadline");
		}
	};
	let token = match cache.acquire().await {
		Ok(token) => token,
		Err(e) => return settle(RequestOutcome::Failed(e.into())),
	};

	// Deadline passed while acquiring; the downstream is never contacted.
	if slot.is_settled() {
		metrics.record_discarded();

		return;
	}

	// Bounded even after the deadline so a stalled downstream cannot pin this task forever.
	let sent = tokio::time::timeout(transport_timeout, transport.send(&token, &request))
		.await
		.unwrap_or_else(|elapsed| Err(DownstreamError::network(elapsed)));
	let outcome = match sent {
		Ok(reply) => RequestOutcome::Succeeded(reply),
		Err(e) => {
			if e.is_unauthorized() {
				cache.invalidate_token(&token);
			}

			RequestOutcome::Failed(e.into())
		},
	};

	settle(outcome);
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration as StdDuration,
	};
	// self
	use super::*;
	use crate::{
		_preludet::*,
		error::{CredentialError, DownstreamError},
		http::{InferenceReply, TransportFuture},
		lease::TokenSecret,
	};

	#[derive(Debug)]
	struct FakeTransport {
		delay: StdDuration,
		status: Option<u16>,
		calls: AtomicUsize,
		completed: AtomicUsize,
		tokens: Mutex<Vec<String>>,
	}
	impl FakeTransport {
		fn replying_after(delay: StdDuration) -> Self {
			Self {
				delay,
				status: None,
				calls: AtomicUsize::new(0),
				completed: AtomicUsize::new(0),
				tokens: Mutex::new(Vec::new()),
			}
		}

		fn failing_with(status: u16) -> Self {
			Self { status: Some(status), ..Self::replying_after(StdDuration::ZERO) }
		}
	}
	impl InferenceTransport for FakeTransport {
		fn send<'a>(
			&'a self,
			token: &'a TokenSecret,
			request: &'a InferenceRequest,
		) -> TransportFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				self.tokens.lock().push(token.expose().to_owned());
				tokio::time::sleep(self.delay).await;
				self.completed.fetch_add(1, Ordering::SeqCst);

				match self.status {
					Some(status @ (401 | 403)) => Err(DownstreamError::Unauthorized { status }),
					Some(status) => Err(DownstreamError::Status { status }),
					None => Ok(InferenceReply { response: format!("echo: {}", request.text) }),
				}
			})
		}
	}

	fn executor_with(
		fetcher: ScriptedFetcher,
		transport: &Arc<FakeTransport>,
	) -> BoundedExecutor<FakeTransport> {
		BoundedExecutor::new(LeaseCache::new(Arc::new(fetcher)), transport.clone())
	}

	#[tokio::test(start_paused = true)]
	async fn late_response_is_discarded_after_timeout() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::from_secs(12)));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport);
		let outcome = executor
			.run(BoundedRequest::new("hello").with_timeout(Duration::seconds(10)))
			.await;

		assert!(
			matches!(outcome, RequestOutcome::TimedOut { timeout } if timeout == Duration::seconds(10))
		);
		assert_eq!(transport.completed.load(Ordering::SeqCst), 0);

		tokio::time::sleep(StdDuration::from_secs(5)).await;

		assert_eq!(transport.completed.load(Ordering::SeqCst), 1);
		assert_eq!(executor.metrics().discarded(), 1);
		assert_eq!(executor.metrics().timed_out(), 1);
		assert_eq!(executor.metrics().succeeded(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn fast_response_wins_and_timer_stays_silent() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::from_millis(100)));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport);
		let outcome = executor.ask("hello").await;

		assert_eq!(
			outcome.reply().expect("Fast reply should win the race.").response,
			"echo: hello"
		);
		assert_eq!(transport.tokens.lock().as_slice(), ["abc".to_owned()]);

		tokio::time::sleep(StdDuration::from_secs(30)).await;

		assert_eq!(executor.metrics().timed_out(), 0);
		assert_eq!(executor.metrics().discarded(), 0);
		assert_eq!(executor.metrics().runs(), 1);
	}

	#[tokio::test]
	async fn missing_credential_short_circuits_downstream() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::ZERO));
		let executor = executor_with(
			ScriptedFetcher::default().fail(CredentialError::Status { status: 500 }),
			&transport,
		);
		let outcome = executor.ask("hello").await;

		assert!(matches!(
			outcome,
			RequestOutcome::Failed(Error::Credential(CredentialError::Status { status: 500 }))
		));
		assert_eq!(outcome.fallback_message(), Some(FAILURE_FALLBACK));
		assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
		assert_eq!(executor.metrics().failed(), 1);
	}

	#[tokio::test]
	async fn unauthorized_reply_invalidates_lease() {
		let transport = Arc::new(FakeTransport::failing_with(401));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport);
		let outcome = executor.ask("hello").await;

		assert!(matches!(
			outcome,
			RequestOutcome::Failed(Error::Downstream(DownstreamError::Unauthorized { status: 401 }))
		));
		assert!(executor.cache().snapshot().is_none());
	}

	#[tokio::test]
	async fn downstream_failure_keeps_lease() {
		let transport = Arc::new(FakeTransport::failing_with(500));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport);
		let outcome = executor.ask("hello").await;

		assert!(matches!(
			outcome,
			RequestOutcome::Failed(Error::Downstream(DownstreamError::Status { status: 500 }))
		));
		assert!(executor.cache().snapshot().is_some());
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_covers_slow_credential_acquisition() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::ZERO));
		let executor = executor_with(
			ScriptedFetcher::default()
				.with_delay(StdDuration::from_secs(20))
				.grant("abc", 600.),
			&transport,
		);
		let outcome = executor
			.run(BoundedRequest::new("hello").with_timeout(Duration::seconds(10)))
			.await;

		assert!(outcome.is_timed_out());

		tokio::time::sleep(StdDuration::from_secs(15)).await;

		assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
		assert_eq!(executor.metrics().discarded(), 1);
		assert!(executor.cache().snapshot().is_some());
	}

	#[tokio::test(start_paused = true)]
	async fn absolute_deadline_is_honoured() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::from_secs(3)));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport);
		let deadline = Instant::now() + StdDuration::from_secs(2);
		let outcome = executor.run(BoundedRequest::new("hello").with_deadline(deadline)).await;

		assert!(
			matches!(outcome, RequestOutcome::TimedOut { timeout } if timeout == Duration::seconds(2))
		);
	}

	#[tokio::test(start_paused = true)]
	async fn unbounded_timeout_still_settles() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::from_millis(100)));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport);
		let outcome = executor.run(BoundedRequest::new("hello").with_timeout(Duration::MAX)).await;

		assert!(outcome.is_success());

		let start = Instant::now();
		let (deadline, timeout) =
			BoundedRequest::new("hello").with_timeout(Duration::MAX).resolve(start, Duration::MAX);

		assert_eq!(timeout, Duration::MAX);
		assert_eq!(deadline, start + StdDuration::from_secs(365 * 24 * 60 * 60));
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_downstream_is_released_after_transport_timeout() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::from_secs(3_600)));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport)
			.with_config(ExecutorConfig::default().with_transport_timeout(Duration::seconds(30)))
			.expect("Transport timeout should be valid.");
		let outcome = executor
			.run(BoundedRequest::new("hello").with_timeout(Duration::seconds(10)))
			.await;

		assert!(outcome.is_timed_out());
		assert_eq!(executor.metrics().discarded(), 0);

		tokio::time::sleep(StdDuration::from_secs(25)).await;

		assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
		assert_eq!(transport.completed.load(Ordering::SeqCst), 0);
		assert_eq!(executor.metrics().discarded(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn transport_timeout_inside_deadline_fails_the_request() {
		let transport = Arc::new(FakeTransport::replying_after(StdDuration::from_secs(3_600)));
		let executor = executor_with(ScriptedFetcher::default().grant("abc", 600.), &transport)
			.with_config(ExecutorConfig::default().with_transport_timeout(Duration::seconds(2)))
			.expect("Transport timeout should be valid.");
		let outcome = executor.ask("hello").await;

		assert!(matches!(
			outcome,
			RequestOutcome::Failed(Error::Downstream(DownstreamError::Network { .. }))
		));
		assert_eq!(outcome.fallback_message(), Some(FAILURE_FALLBACK));
	}

	#[tokio::test(start_paused = true)]
	async fn request_resolves_default_timeout() {
		let start = Instant::now();
		let (deadline, timeout) =
			BoundedRequest::new("hello").resolve(start, ExecutorConfig::DEFAULT_TIMEOUT);

		assert_eq!(timeout, Duration::seconds(10));
		assert_eq!(deadline, start + StdDuration::from_secs(10));
	}
}
