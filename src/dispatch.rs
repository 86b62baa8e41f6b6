//! Request dispatch gate: bearer attachment plus stale-credential recovery.
//!
//! Every authenticated backend call flows through [`DispatchGate::send`]. The gate attaches
//! the current access token unless the target is the login or refresh endpoint. A 401 from
//! a non-exempt target, while a refresh token is held, parks the request as a
//! [`PendingRequest`] on the [`RefreshCoordinator`] and replays it exactly once with the
//! fresh token. Every other status passes through untouched.

pub mod pending;

pub use pending::PendingRequest;

// self
use crate::{
	_prelude::*,
	http::{ApiResponse, HttpTransport, OutboundRequest},
	obs::{self, OpKind},
	refresh::RefreshCoordinator,
	session::SessionService,
};

/// Wraps outgoing requests with credential attachment and single-retry refresh recovery.
pub struct DispatchGate<T>
where
	T: ?Sized + HttpTransport,
{
	session: Arc<SessionService<T>>,
	coordinator: Arc<RefreshCoordinator<T>>,
}
impl<T> DispatchGate<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gate over the provided session and coordinator.
	pub fn new(session: Arc<SessionService<T>>, coordinator: Arc<RefreshCoordinator<T>>) -> Self {
		Self { session, coordinator }
	}

	/// Coordinator shared by every request sent through this gate.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
		&self.coordinator
	}

	/// Sends `request`, recovering once from a stale access token.
	///
	/// Returns the backend response for any status, including a 401 that could not be
	/// recovered (exempt target, no refresh token, or a retry that was rejected again).
	/// Fails with [`Error::RefreshFailed`] when the refresh exchange ends the session, and
	/// with transport errors as they occur.
	pub async fn send(&self, request: OutboundRequest) -> Result<ApiResponse> {
		obs::observe(OpKind::Dispatch, "send", async move {
			let transport = self.session.transport();

			if self.session.endpoints().is_exempt(&request.url) {
				return transport.execute(request.with_bearer(None)).await;
			}

			let token = self.session.access_token();
			let response = transport.execute(request.clone().with_bearer(token.clone())).await?;

			if !response.is_unauthorized() || self.session.snapshot().refresh_token.is_none() {
				return Ok(response);
			}

			#[cfg(feature = "tracing")]
			tracing::debug!(url = %request.url, "access token rejected; awaiting refresh");

			let pending = PendingRequest::new(request.with_bearer(None), token);
			let fresh = self.coordinator.await_fresh_token(pending.stale_token()).await?;

			pending.resume(&**transport, fresh).await
		})
		.await
	}
}
impl<T> Clone for DispatchGate<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { session: self.session.clone(), coordinator: self.coordinator.clone() }
	}
}
impl<T> Debug for DispatchGate<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DispatchGate").field("coordinator", &self.coordinator).finish()
	}
}
