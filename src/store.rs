//! Storage contracts and built-in store implementations for persisted session state.
//!
//! Each piece of session state lives under its own [`StoreKey`] so a logout can remove
//! every key independently and a partially written store degrades to safe defaults.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by session stores.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Fetches the raw value stored under `key`, if present.
	fn load(&self, key: StoreKey) -> StoreFuture<'_, Option<String>>;

	/// Persists or replaces the value stored under `key`.
	fn save(&self, key: StoreKey, value: String) -> StoreFuture<'_, ()>;

	/// Removes `key`; removing an absent key succeeds.
	fn remove(&self, key: StoreKey) -> StoreFuture<'_, ()>;
}

/// Independently removable pieces of persisted session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKey {
	/// Short-lived bearer secret.
	AccessToken,
	/// Long-lived refresh secret.
	RefreshToken,
	/// Backend user identifier.
	UserId,
	/// Normalized role label.
	Role,
	/// Name shown by surrounding screens.
	DisplayName,
}
impl StoreKey {
	/// Every key, in the order a logout clears them.
	pub const ALL: [StoreKey; 5] = [
		StoreKey::AccessToken,
		StoreKey::RefreshToken,
		StoreKey::UserId,
		StoreKey::Role,
		StoreKey::DisplayName,
	];

	/// Returns a stable label suitable for file keys or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StoreKey::AccessToken => "access_token",
			StoreKey::RefreshToken => "refresh_token",
			StoreKey::UserId => "user_id",
			StoreKey::Role => "role",
			StoreKey::DisplayName => "display_name",
		}
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error type produced by [`SessionStore`] implementations.
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

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_session_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unavailable".into() };
		let error: Error = store_error.clone().into();

		assert!(matches!(error, Error::Storage(_)));
		assert!(error.to_string().contains("disk unavailable"));

		let source = StdError::source(&error)
			.expect("Session error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn store_keys_serialize_with_stable_labels() {
		for key in StoreKey::ALL {
			let payload = serde_json::to_string(&key).expect("StoreKey should serialize.");

			assert_eq!(payload, format!("\"{}\"", key.as_str()));
		}
	}
}
