//! Persistence capability for the lease cache, plus built-in backends.
//!
//! A store holds a single [`PersistedLease`] record. The cache reads it at most once per lifetime
//! (lazily, on first demand) and writes it once per successful refresh.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, lease::PersistedLease};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key-value persistence for the one lease record a cache owns.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads the persisted record, if any.
	fn load(&self) -> StoreFuture<'_, Option<PersistedLease>>;

	/// Persists or replaces the record.
	fn save(&self, record: PersistedLease) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
