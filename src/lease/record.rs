//! Immutable lease record, lifecycle status, and its persisted form.

// self
use crate::{_prelude::*, lease::secret::TokenSecret};

/// Lifecycle status of a lease relative to an instant and a safety buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseStatus {
	/// Valid for longer than the safety buffer; safe to hand out.
	Fresh,
	/// Not expired yet but inside the safety buffer; must be refreshed before use.
	Stale,
	/// Past its expiry instant.
	Expired,
}

/// Cached credential plus its expiry instant.
///
/// The token and expiry are always replaced together: the lease cache swaps whole values and never
/// mutates one in place.
#[derive(Clone, PartialEq, Eq)]
pub struct Lease {
	/// Bearer token; callers must avoid logging it.
	pub token: TokenSecret,
	/// Instant the lease endpoint answered.
	pub issued_at: OffsetDateTime,
	/// Instant after which the token must not be used.
	pub expires_at: OffsetDateTime,
}
impl Lease {
	/// Builds a lease issued at `issued_at` and valid for `ttl`.
	pub fn issue(token: impl Into<String>, issued_at: OffsetDateTime, ttl: Duration) -> Self {
		Self {
			token: TokenSecret::new(token),
			issued_at,
			expires_at: issued_at.saturating_add(ttl),
		}
	}

	/// Computes the lifecycle status at `instant` with the given safety buffer.
	///
	/// A buffer reaching past the representable date range leaves the lease permanently stale.
	pub fn status_at(&self, instant: OffsetDateTime, buffer: Duration) -> LeaseStatus {
		if instant >= self.expires_at {
			return LeaseStatus::Expired;
		}
		if self.expires_at.checked_sub(buffer).is_some_and(|fresh_until| instant < fresh_until) {
			return LeaseStatus::Fresh;
		}

		LeaseStatus::Stale
	}

	/// Returns `true` if the token may be handed out at `instant`.
	pub fn is_usable_at(&self, instant: OffsetDateTime, buffer: Duration) -> bool {
		matches!(self.status_at(instant, buffer), LeaseStatus::Fresh)
	}

	/// Returns `true` if the lease has expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Remaining validity at `instant`, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for Lease {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Lease")
			.field("token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Storage shape of a lease: `{ "token": string|null, "expiresAt": epoch-millis }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedLease {
	/// Token value, or `null` for a cleared record.
	pub token: Option<String>,
	/// Expiry instant as Unix epoch milliseconds.
	pub expires_at: i64,
}
impl PersistedLease {
	/// Restores the lease if the record holds a token that is still strictly in the future.
	pub fn restore_at(&self, now: OffsetDateTime) -> Option<Lease> {
		let token = self.token.as_deref().filter(|token| !token.is_empty())?;
		let expires_at = OffsetDateTime::from_unix_timestamp_nanos(
			i128::from(self.expires_at) * 1_000_000,
		)
		.ok()?;

		if expires_at <= now {
			return None;
		}

		Some(Lease { token: TokenSecret::new(token), issued_at: now, expires_at })
	}
}
impl From<&Lease> for PersistedLease {
	fn from(lease: &Lease) -> Self {
		let millis = lease.expires_at.unix_timestamp_nanos() / 1_000_000;

		Self {
			token: Some(lease.token.expose().to_owned()),
			expires_at: i64::try_from(millis).unwrap_or(i64::MAX),
		}
	}
}
