// self
use crate::{_prelude::*, http::InferenceReply, obs::OpOutcome};

/// User-facing text shown in place of a reply when the deadline elapsed.
pub const TIMEOUT_FALLBACK: &str = "The assistant is taking too long to respond. Please try again.";
/// User-facing text shown in place of a reply for every other failure.
pub const FAILURE_FALLBACK: &str = "Sorry, something went wrong. Please try again.";

/// Terminal outcome of one bounded request.
#[derive(Debug)]
pub enum RequestOutcome {
	/// Downstream replied before the deadline.
	Succeeded(InferenceReply),
	/// No credential, or the downstream failed, before the deadline.
	Failed(Error),
	/// Deadline elapsed first; any later downstream result was discarded.
	TimedOut {
		/// Time budget the request was granted.
		timeout: Duration,
	},
}
impl RequestOutcome {
	/// Returns `true` for [`RequestOutcome::Succeeded`].
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Succeeded(_))
	}

	/// Returns `true` for [`RequestOutcome::TimedOut`].
	pub fn is_timed_out(&self) -> bool {
		matches!(self, Self::TimedOut { .. })
	}

	/// Returns the reply, if any.
	pub fn reply(&self) -> Option<&InferenceReply> {
		match self {
			Self::Succeeded(reply) => Some(reply),
			_ => None,
		}
	}

	/// Fallback text for the UI; `None` on success.
	pub fn fallback_message(&self) -> Option<&'static str> {
		match self {
			Self::Succeeded(_) => None,
			Self::Failed(_) => Some(FAILURE_FALLBACK),
			Self::TimedOut { .. } => Some(TIMEOUT_FALLBACK),
		}
	}

	/// Text to render in the bot bubble: the reply, or the matching fallback.
	pub fn display_text(&self) -> &str {
		match self {
			Self::Succeeded(reply) => &reply.response,
			Self::Failed(_) => FAILURE_FALLBACK,
			Self::TimedOut { .. } => TIMEOUT_FALLBACK,
		}
	}

	/// Converts into a plain result, mapping timeouts to [`Error::TimedOut`].
	pub fn into_result(self) -> Result<InferenceReply> {
		match self {
			Self::Succeeded(reply) => Ok(reply),
			Self::Failed(e) => Err(e),
			Self::TimedOut { timeout } => Err(Error::TimedOut { timeout }),
		}
	}

	pub(crate) fn op_outcome(&self) -> OpOutcome {
		match self {
			Self::Succeeded(_) => OpOutcome::Success,
			Self::Failed(_) => OpOutcome::Failure,
			Self::TimedOut { .. } => OpOutcome::TimedOut,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::CredentialError;

	#[test]
	fn timeouts_and_failures_have_distinct_fallbacks() {
		let timed_out = RequestOutcome::TimedOut { timeout: Duration::seconds(10) };
		let failed = RequestOutcome::Failed(CredentialError::Status { status: 500 }.into());
		let succeeded = RequestOutcome::Succeeded(InferenceReply { response: "hello".into() });

		assert_eq!(timed_out.fallback_message(), Some(TIMEOUT_FALLBACK));
		assert_eq!(failed.fallback_message(), Some(FAILURE_FALLBACK));
		assert_ne!(TIMEOUT_FALLBACK, FAILURE_FALLBACK);
		assert_eq!(succeeded.fallback_message(), None);
		assert_eq!(succeeded.display_text(), "hello");
		assert_eq!(timed_out.display_text(), TIMEOUT_FALLBACK);
	}

	#[test]
	fn into_result_maps_timeout() {
		let err = RequestOutcome::TimedOut { timeout: Duration::seconds(10) }
			.into_result()
			.expect_err("Timeout should convert into an error.");

		assert!(matches!(err, Error::TimedOut { timeout } if timeout == Duration::seconds(10)));
	}
}
