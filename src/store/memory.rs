//! Thread-safe in-memory [`CredentialStore`] for tests and single-process deployments.

// self
use crate::{
	_prelude::*,
	lease::PersistedLease,
	store::{CredentialStore, StoreError, StoreFuture},
};

type Slot = Arc<RwLock<Option<PersistedLease>>>;

/// Keeps the record in-process; clones share the same slot, so a store can outlive a cache and
/// seed the next one.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Slot);
impl MemoryStore {
	/// Creates a store pre-seeded with `record`.
	pub fn with_record(record: PersistedLease) -> Self {
		Self(Arc::new(RwLock::new(Some(record))))
	}

	/// Returns the current record without going through the async contract.
	pub fn peek(&self) -> Option<PersistedLease> {
		self.0.read().clone()
	}

	fn save_now(slot: Slot, record: PersistedLease) -> Result<(), StoreError> {
		*slot.write() = Some(record);

		Ok(())
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<PersistedLease>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.read().clone()) })
	}

	fn save(&self, record: PersistedLease) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move { Self::save_now(slot, record) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn clones_share_the_record() {
		let store = MemoryStore::default();
		let clone = store.clone();

		assert!(store.load().await.expect("Empty store should load.").is_none());

		clone
			.save(PersistedLease { token: Some("abc".into()), expires_at: 600_000 })
			.await
			.expect("Memory store save should succeed.");

		assert_eq!(
			store.load().await.expect("Seeded store should load."),
			Some(PersistedLease { token: Some("abc".into()), expires_at: 600_000 })
		);
		assert_eq!(store.peek(), clone.peek());
	}
}
