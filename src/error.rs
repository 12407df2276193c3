//! Crate-level error types shared by the lease cache, the executor, and the stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No credential could be obtained, so the request never reached the downstream.
	#[error("No credential is available: {0}")]
	Credential(#[from] CredentialError),
	/// Downstream call was reachable but failed.
	#[error(transparent)]
	Downstream(#[from] DownstreamError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),

	/// Deadline elapsed before the downstream call settled.
	#[error("Request timed out after {timeout}.")]
	TimedOut {
		/// Time budget the request was granted.
		timeout: Duration,
	},
	/// Both racing tasks vanished without settling (runtime shutdown).
	#[error("Request was abandoned before it settled.")]
	Abandoned,
}

/// Failures raised while obtaining a credential from the lease endpoint.
///
/// Attached callers share one refresh, so the error is cheaply cloneable and the same value reaches
/// every waiter.
#[derive(Clone, Debug, ThisError)]
pub enum CredentialError {
	/// Lease endpoint answered with a non-success status.
	#[error("Lease endpoint responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// Lease endpoint returned a body that is not a lease payload.
	#[error("Lease endpoint returned a malformed payload.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
	},
	/// Lease payload carried an empty token.
	#[error("Lease payload contains an empty token.")]
	EmptyToken,
	/// Lease payload carried a zero, negative, or non-finite TTL.
	#[error("The ttl value must be a positive number of seconds.")]
	NonPositiveTtl,
	/// Lease payload carried a TTL beyond the supported range.
	#[error("The ttl value exceeds the supported range.")]
	TtlOutOfRange,
	/// Lease endpoint could not be reached.
	#[error("Network error occurred while calling the lease endpoint.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: SharedError,
	},
	/// Freshly issued lease is already inside the safety buffer.
	#[error("Lease endpoint issued a token that expires within the safety buffer.")]
	ExpiresTooSoon,
}
impl CredentialError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// Wraps a payload parsing failure.
	pub fn malformed(src: serde_path_to_error::Error<serde_json::Error>) -> Self {
		Self::Malformed { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for CredentialError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures raised by the downstream inference call.
#[derive(Debug, ThisError)]
pub enum DownstreamError {
	/// Downstream rejected the bearer token.
	#[error("Inference endpoint rejected the credential with HTTP {status}.")]
	Unauthorized {
		/// HTTP status code (401 or 403).
		status: u16,
	},
	/// Downstream answered with another non-success status.
	#[error("Inference endpoint responded with HTTP {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
	/// Downstream reply could not be parsed.
	#[error("Inference endpoint returned a malformed payload.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Downstream could not be reached.
	#[error("Network error occurred while calling the inference endpoint.")]
	Network {
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
}
impl DownstreamError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Returns `true` when the downstream refused the credential itself.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Unauthorized { .. })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for DownstreamError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required endpoint was not configured.
	#[error("Missing {endpoint} endpoint.")]
	MissingEndpoint {
		/// Which endpoint is missing.
		endpoint: &'static str,
	},
	/// Endpoint URL uses an unsupported scheme or cannot carry a path.
	#[error("The {endpoint} endpoint must be an http(s) URL: {url}.")]
	InvalidEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Safety buffer is negative.
	#[error("The safety buffer must not be negative.")]
	NegativeSafetyBuffer,
	/// A timeout is zero or negative.
	#[error("The {name} timeout must be positive.")]
	NonPositiveTimeout {
		/// Which timeout failed validation.
		name: &'static str,
	},
	/// Safety buffer is longer than any lease the endpoint may grant.
	#[error("The safety buffer must not exceed {max}.")]
	SafetyBufferOutOfRange {
		/// Largest accepted buffer.
		max: Duration,
	},
	/// A timeout is too large to schedule.
	#[error("The {name} timeout must not exceed {max}.")]
	TimeoutOutOfRange {
		/// Which timeout failed validation.
		name: &'static str,
		/// Largest accepted timeout.
		max: Duration,
	},
	/// Automatic retry interval is zero or negative.
	#[error("The retry interval must be positive.")]
	NonPositiveRetryInterval,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
