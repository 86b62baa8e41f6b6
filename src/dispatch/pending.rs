//! Requests captured at the moment the backend rejected their credential.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{ApiResponse, HttpTransport, OutboundRequest},
};

/// Outgoing request parked until a fresh access token is available.
///
/// Lives from the stale-credential response until it is resumed once or abandoned.
#[derive(Clone, Debug)]
pub struct PendingRequest {
	request: OutboundRequest,
	stale_token: Option<TokenSecret>,
}
impl PendingRequest {
	/// Captures `request` together with the access token the backend rejected.
	pub fn new(request: OutboundRequest, stale_token: Option<TokenSecret>) -> Self {
		Self { request, stale_token }
	}

	/// Request as originally issued, without a bearer credential.
	pub fn request(&self) -> &OutboundRequest {
		&self.request
	}

	/// Access token the backend rejected, if one was attached.
	pub fn stale_token(&self) -> Option<&TokenSecret> {
		self.stale_token.as_ref()
	}

	/// Replays the request exactly once with `token`. Whatever comes back is final.
	pub async fn resume<T>(self, transport: &T, token: TokenSecret) -> Result<ApiResponse>
	where
		T: ?Sized + HttpTransport,
	{
		transport.execute(self.request.with_bearer(Some(token))).await
	}
}
