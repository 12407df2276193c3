//! Bearer credential handed to every caller of the lease cache.

// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";

/// Lease token shared by every caller served from the same lease.
///
/// Clones share one allocation. `Debug` and `Display` never print the value; reach for
/// [`TokenSecret::expose`] only at the point the header is written.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenSecret(Arc<str>);
impl TokenSecret {
	/// Wraps a token issued by the lease endpoint.
	pub fn new(value: impl Into<String>) -> Self {
		Self(Arc::from(value.into()))
	}

	/// Raw token value.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `Authorization` header value for this token.
	pub fn bearer_header(&self) -> String {
		format!("Bearer {}", self.expose())
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({REDACTED})")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}
