//! Endpoint descriptors and tuning knobs for the lease cache and the executor.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Validated endpoint pair consumed by the reqwest transports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	/// Lease endpoint (`GET`, JSON `{ token, ttl }`).
	pub lease: Url,
	/// Inference endpoint (`GET ?text=`, JSON `{ response }`).
	pub inference: Url,
}
impl Endpoints {
	/// Creates a new builder.
	pub fn builder() -> EndpointsBuilder {
		EndpointsBuilder::default()
	}

	/// Derives both endpoints from a single service root: `<base>/lease` and `<base>` itself.
	///
	/// The lease path always nests under the full base path, with or without a trailing slash.
	pub fn from_base(base: &Url) -> Result<Self, ConfigError> {
		let mut root = base.clone();

		if !root.path().ends_with('/') {
			root.set_path(&format!("{}/", root.path()));
		}

		let lease = root.join("lease").map_err(|_| ConfigError::InvalidEndpoint {
			endpoint: "lease",
			url: base.to_string(),
		})?;

		Self::builder().lease(lease).inference(base.clone()).build()
	}
}

/// Builder for [`Endpoints`].
#[derive(Debug, Default)]
pub struct EndpointsBuilder {
	/// Lease endpoint being configured.
	pub lease: Option<Url>,
	/// Inference endpoint being configured.
	pub inference: Option<Url>,
}
impl EndpointsBuilder {
	/// Sets the lease endpoint.
	pub fn lease(mut self, url: Url) -> Self {
		self.lease = Some(url);

		self
	}

	/// Sets the inference endpoint.
	pub fn inference(mut self, url: Url) -> Self {
		self.inference = Some(url);

		self
	}

	/// Consumes the builder and validates both endpoints.
	pub fn build(self) -> Result<Endpoints, ConfigError> {
		let lease = self.lease.ok_or(ConfigError::MissingEndpoint { endpoint: "lease" })?;
		let inference =
			self.inference.ok_or(ConfigError::MissingEndpoint { endpoint: "inference" })?;

		validate_endpoint("lease", &lease)?;
		validate_endpoint("inference", &inference)?;

		Ok(Endpoints { lease, inference })
	}
}

/// Tuning knobs for [`LeaseCache`](crate::cache::LeaseCache).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaseCacheConfig {
	/// Margin subtracted from expiry before a token counts as usable.
	pub safety_buffer: Duration,
	/// Upper bound for a single lease fetch (applied by the reqwest fetcher).
	pub fetch_timeout: Duration,
	/// When set, a failed refresh schedules one background re-fetch after this interval.
	///
	/// Disabled by default: without it the next `acquire()` is the only thing that retries.
	pub retry_interval: Option<Duration>,
}
impl LeaseCacheConfig {
	/// Default safety buffer (5 seconds).
	pub const DEFAULT_SAFETY_BUFFER: Duration = Duration::seconds(5);
	/// Default fetch timeout (10 seconds).
	pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::seconds(10);
	/// Largest accepted safety buffer; matches the longest lease the endpoint may grant.
	pub const MAX_SAFETY_BUFFER: Duration = Duration::days(365);

	/// Overrides the safety buffer.
	pub fn with_safety_buffer(mut self, buffer: Duration) -> Self {
		self.safety_buffer = buffer;

		self
	}

	/// Overrides the fetch timeout.
	pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
		self.fetch_timeout = timeout;

		self
	}

	/// Opts into automatic background retries after failed refreshes.
	pub fn with_retry_interval(mut self, interval: Duration) -> Self {
		self.retry_interval = Some(interval);

		self
	}

	/// Checks the configured durations.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.safety_buffer.is_negative() {
			return Err(ConfigError::NegativeSafetyBuffer);
		}
		if self.safety_buffer > Self::MAX_SAFETY_BUFFER {
			return Err(ConfigError::SafetyBufferOutOfRange { max: Self::MAX_SAFETY_BUFFER });
		}

		validate_timeout("fetch", self.fetch_timeout)?;

		if self.retry_interval.is_some_and(|interval| !interval.is_positive()) {
			return Err(ConfigError::NonPositiveRetryInterval);
		}

		Ok(())
	}

	pub(crate) fn fetch_timeout_std(&self) -> StdDuration {
		to_std(self.fetch_timeout)
	}
}
impl Default for LeaseCacheConfig {
	fn default() -> Self {
		Self {
			safety_buffer: Self::DEFAULT_SAFETY_BUFFER,
			fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
			retry_interval: None,
		}
	}
}

/// Tuning knobs for [`BoundedExecutor`](crate::executor::BoundedExecutor).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutorConfig {
	/// Time budget for requests that do not carry their own deadline.
	pub default_timeout: Duration,
	/// Upper bound for one downstream call, including calls that outlive their request deadline.
	pub transport_timeout: Duration,
}
impl ExecutorConfig {
	/// Default request timeout (10 seconds).
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(10);
	/// Default downstream call timeout (30 seconds).
	pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::seconds(30);

	/// Overrides the default request timeout.
	pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
		self.default_timeout = timeout;

		self
	}

	/// Overrides the downstream call timeout.
	pub fn with_transport_timeout(mut self, timeout: Duration) -> Self {
		self.transport_timeout = timeout;

		self
	}

	/// Checks the configured durations.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_timeout("request", self.default_timeout)?;
		validate_timeout("transport", self.transport_timeout)
	}

	pub(crate) fn transport_timeout_std(&self) -> StdDuration {
		to_std(self.transport_timeout)
	}
}
impl Default for ExecutorConfig {
	fn default() -> Self {
		Self {
			default_timeout: Self::DEFAULT_TIMEOUT,
			transport_timeout: Self::DEFAULT_TRANSPORT_TIMEOUT,
		}
	}
}

/// Largest accepted timeout for any configured operation.
pub const MAX_TIMEOUT: Duration = Duration::days(365);

fn validate_timeout(name: &'static str, timeout: Duration) -> Result<(), ConfigError> {
	if !timeout.is_positive() {
		return Err(ConfigError::NonPositiveTimeout { name });
	}
	if timeout > MAX_TIMEOUT {
		return Err(ConfigError::TimeoutOutOfRange { name, max: MAX_TIMEOUT });
	}

	Ok(())
}

/// Converts a signed duration into a std duration, clamping negatives to zero.
pub(crate) fn to_std(duration: Duration) -> StdDuration {
	StdDuration::try_from(duration).unwrap_or(StdDuration::ZERO)
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() {
		Ok(())
	} else {
		Err(ConfigError::InvalidEndpoint { endpoint: name, url: url.to_string() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse endpoint fixture.")
	}

	#[test]
	fn endpoints_require_both_urls() {
		let err = Endpoints::builder()
			.inference(url("https://ai.example.com/"))
			.build()
			.expect_err("Builder should reject a missing lease endpoint.");

		assert!(matches!(err, ConfigError::MissingEndpoint { endpoint: "lease" }));
	}

	#[test]
	fn endpoints_reject_non_http_schemes() {
		let err = Endpoints::builder()
			.lease(url("ftp://ai.example.com/lease"))
			.inference(url("https://ai.example.com/"))
			.build()
			.expect_err("Builder should reject ftp endpoints.");

		assert!(matches!(err, ConfigError::InvalidEndpoint { endpoint: "lease", .. }));
	}

	#[test]
	fn endpoints_derive_from_base() {
		let endpoints = Endpoints::from_base(&url("https://ai.example.com/"))
			.expect("Base URL should yield valid endpoints.");

		assert_eq!(endpoints.lease.as_str(), "https://ai.example.com/lease");
		assert_eq!(endpoints.inference.as_str(), "https://ai.example.com/");
	}

	#[test]
	fn endpoints_nest_lease_under_base_path() {
		let bare = Endpoints::from_base(&url("https://ai.example.com/api"))
			.expect("Base path without a slash should yield valid endpoints.");
		let slashed = Endpoints::from_base(&url("https://ai.example.com/api/"))
			.expect("Base path with a slash should yield valid endpoints.");

		assert_eq!(bare.lease.as_str(), "https://ai.example.com/api/lease");
		assert_eq!(bare.inference.as_str(), "https://ai.example.com/api");
		assert_eq!(slashed.lease.as_str(), "https://ai.example.com/api/lease");
		assert_eq!(slashed.inference.as_str(), "https://ai.example.com/api/");
	}

	#[test]
	fn cache_config_defaults_and_validation() {
		let config = LeaseCacheConfig::default();

		assert_eq!(config.safety_buffer, Duration::seconds(5));
		assert_eq!(config.retry_interval, None);
		assert!(config.validate().is_ok());
		assert!(matches!(
			config.clone().with_safety_buffer(Duration::seconds(-1)).validate(),
			Err(ConfigError::NegativeSafetyBuffer)
		));
		assert!(matches!(
			config.clone().with_fetch_timeout(Duration::ZERO).validate(),
			Err(ConfigError::NonPositiveTimeout { name: "fetch" })
		));
		assert!(matches!(
			config.with_retry_interval(Duration::ZERO).validate(),
			Err(ConfigError::NonPositiveRetryInterval)
		));
	}

	#[test]
	fn cache_config_rejects_unbounded_durations() {
		let config = LeaseCacheConfig::default();

		assert!(
			config.clone().with_safety_buffer(LeaseCacheConfig::MAX_SAFETY_BUFFER).validate().is_ok()
		);
		assert!(matches!(
			config.clone().with_safety_buffer(Duration::MAX).validate(),
			Err(ConfigError::SafetyBufferOutOfRange { .. })
		));
		assert!(matches!(
			config.with_fetch_timeout(Duration::MAX).validate(),
			Err(ConfigError::TimeoutOutOfRange { name: "fetch", .. })
		));
	}

	#[test]
	fn executor_config_bounds_timeouts() {
		let config = ExecutorConfig::default();

		assert_eq!(config.transport_timeout, Duration::seconds(30));
		assert!(config.validate().is_ok());
		assert!(matches!(
			config.clone().with_default_timeout(Duration::ZERO).validate(),
			Err(ConfigError::NonPositiveTimeout { name: "request" })
		));
		assert!(matches!(
			config.clone().with_default_timeout(Duration::MAX).validate(),
			Err(ConfigError::TimeoutOutOfRange { name: "request", .. })
		));
		assert!(matches!(
			config.with_transport_timeout(Duration::seconds(-1)).validate(),
			Err(ConfigError::NonPositiveTimeout { name: "transport" })
		));
	}

	#[test]
	fn std_conversion_clamps_negatives() {
		assert_eq!(to_std(Duration::milliseconds(1500)), StdDuration::from_millis(1500));
		assert_eq!(to_std(Duration::seconds(-3)), StdDuration::ZERO);
	}
}
