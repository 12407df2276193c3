// self
use crate::{_prelude::*, obs::OpKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by cache and executor operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("lease_broker.op", op = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event tagged with the operation (when tracing is enabled).
pub(crate) fn debug_event(kind: OpKind, message: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(op = kind.as_str(), "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, message);
}

/// Emits a warning event tagged with the operation and the error (when tracing is enabled).
pub(crate) fn warn_event(kind: OpKind, message: &str, error: &dyn StdError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(op = kind.as_str(), error = %error, "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, message, error);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_noop_without_subscriber() {
		debug_event(OpKind::Acquire, "discarded expired persisted lease");
		warn_event(OpKind::Refresh, "lease refresh failed", &std::io::Error::other("boom"));
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OpSpan::new(OpKind::Run, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
