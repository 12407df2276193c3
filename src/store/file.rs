//! File-backed [`CredentialStore`] so a restarted process can reuse a live lease.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	lease::PersistedLease,
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Persists the lease record as JSON, replacing the file atomically on every save.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	write_guard: Arc<Mutex<()>>,
}
impl FileStore {
	/// Fixed record name used by [`FileStore::in_dir`].
	pub const DEFAULT_FILE_NAME: &'static str = "lease.json";

	/// Opens a store at the provided path. Nothing is read until the cache first asks.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		Ok(Self { path, write_guard: Default::default() })
	}

	/// Opens the store under the fixed record name inside `dir`.
	pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
		Self::open(dir.as_ref().join(Self::DEFAULT_FILE_NAME))
	}

	/// Location of the record on disk.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_record(path: &Path) -> Result<Option<PersistedLease>, StoreError> {
		let bytes = match fs::read(path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", path.display()),
				}),
		};

		if bytes.is_empty() {
			return Ok(None);
		}

		serde_json::from_slice(&bytes).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist(&self, record: &PersistedLease) -> Result<(), StoreError> {
		let _guard = self.write_guard.lock();

		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize lease record: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn load(&self) -> StoreFuture<'_, Option<PersistedLease>> {
		Box::pin(async move { Self::read_record(&self.path) })
	}

	fn save(&self, record: PersistedLease) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.persist(&record) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_dir(tag: &str) -> PathBuf {
		let unique = format!(
			"lease_broker_file_store_{tag}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn save_and_reload_round_trip() {
		let dir = temp_dir("round_trip");
		let store = FileStore::in_dir(&dir).expect("Failed to open file store.");
		let record = PersistedLease { token: Some("abc".into()), expires_at: 600_000 };

		assert!(store.load().await.expect("Missing file should load as empty.").is_none());

		store.save(record.clone()).await.expect("Failed to save fixture record.");
		drop(store);

		let reopened = FileStore::in_dir(&dir).expect("Failed to reopen file store.");
		let fetched = reopened
			.load()
			.await
			.expect("Failed to load fixture record.")
			.expect("File store lost record after reopen.");

		assert_eq!(fetched, record);
		assert_eq!(reopened.path(), dir.join(FileStore::DEFAULT_FILE_NAME));

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}

	#[tokio::test]
	async fn empty_and_corrupt_files_are_distinguished() {
		let dir = temp_dir("corrupt");
		let store = FileStore::in_dir(&dir).expect("Failed to open file store.");

		fs::write(store.path(), b"").expect("Failed to write empty fixture.");

		assert!(store.load().await.expect("Empty file should load as empty.").is_none());

		fs::write(store.path(), b"{not json").expect("Failed to write corrupt fixture.");

		assert!(matches!(store.load().await, Err(StoreError::Serialization { .. })));

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store directory {}: {e}", dir.display())
		});
	}
}
