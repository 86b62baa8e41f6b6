#![allow(dead_code)]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use session_gate::{
	client::{Client, ReqwestSessionClient},
	config::SessionConfig,
	store::{MemoryStore, SessionStore, StoreKey},
	url::Url,
};

pub const USERNAME: &str = "ada";
pub const PASSWORD: &str = "s3cret";

/// Builds a reqwest-backed client pointed at the mock server's `/api/` prefix.
pub async fn client_for(server: &MockServer, store: &MemoryStore) -> ReqwestSessionClient {
	let base = Url::parse(&server.url("/api/")).expect("Mock base URL should parse.");
	let config = SessionConfig::builder(base).build().expect("Session config should build.");

	Client::new(config, Arc::new(store.clone())).await.expect("Client should build.")
}

/// Writes a persisted session as a previous process would have left it.
pub async fn seed(store: &MemoryStore, entries: &[(StoreKey, &str)]) {
	for (key, value) in entries {
		store.save(*key, (*value).to_owned()).await.expect("Seeding the store should succeed.");
	}
}

/// Seeds a trainer session holding `access` and `refresh`.
pub async fn seed_trainer(store: &MemoryStore, access: &str, refresh: &str) {
	seed(store, &[
		(StoreKey::AccessToken, access),
		(StoreKey::RefreshToken, refresh),
		(StoreKey::UserId, "7"),
		(StoreKey::Role, "trainer"),
		(StoreKey::DisplayName, USERNAME),
	])
	.await;
}
