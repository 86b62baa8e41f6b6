//! Single-flight refresh coordination shared by every in-flight request of a session.
//!
//! The coordinator owns the session's [`RefreshPhase`]. The first stale-credential arrival
//! while `Idle` wins the check-and-set under the state mutex, flips the phase to
//! `Refreshing`, and spawns the exchange on the runtime so no caller's cancellation can
//! abort it. Later arrivals join a FIFO wait list. When the exchange finishes, the phase
//! returns to `Idle` and every waiter is released in arrival order with either the fresh
//! access token or a terminal failure. On failure the session is signed out before any
//! waiter observes the outcome, unless a logout or re-login already replaced the session the
//! exchange started from; waiters then resume with whatever that session holds.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::collections::VecDeque;
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::HttpTransport,
	obs::{self, OpKind, RefreshResolution},
	session::{SessionService, SignOutReason},
};

type Outcome = Result<TokenSecret, String>;

/// Observable phase of the coordinator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RefreshPhase {
	/// No exchange in flight.
	#[default]
	Idle,
	/// One exchange in flight; arrivals are queued.
	Refreshing,
}

#[derive(Debug, Default)]
struct CoordinatorState {
	phase: RefreshPhase,
	waiters: VecDeque<Waiter>,
	next_ticket: u64,
}

#[derive(Debug)]
struct Waiter {
	ticket: u64,
	tx: oneshot::Sender<Outcome>,
}

/// Guarantees at most one refresh exchange in flight per session.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	session: Arc<SessionService<T>>,
	timeout: StdDuration,
	state: Mutex<CoordinatorState>,
	metrics: Arc<RefreshMetrics>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an idle coordinator bound to `session`, bounding each exchange by `timeout`.
	pub fn new(session: Arc<SessionService<T>>, timeout: StdDuration) -> Self {
		Self {
			session,
			timeout,
			state: Mutex::new(CoordinatorState::default()),
			metrics: Default::default(),
		}
	}

	/// Current phase.
	pub fn phase(&self) -> RefreshPhase {
		self.state.lock().phase
	}

	/// Number of callers currently suspended on the wait list.
	pub fn waiting(&self) -> usize {
		self.state.lock().waiters.len()
	}

	/// Shared counters.
	pub fn metrics(&self) -> Arc<RefreshMetrics> {
		self.metrics.clone()
	}

	/// Suspends until a fresh access token is available, starting an exchange if none is
	/// in flight.
	///
	/// `stale` is the access token the backend just rejected (`None` when the request went
	/// out without one). If the session already holds a different access token while idle,
	/// that token is returned without a new exchange. Dropping the returned future removes
	/// the caller from the wait list without affecting the exchange or other waiters.
	pub async fn await_fresh_token(self: &Arc<Self>, stale: Option<&TokenSecret>) -> Result<TokenSecret> {
		let (ticket, rx) = {
			let mut state = self.state.lock();

			match state.phase {
				RefreshPhase::Idle => {
					let snapshot = self.session.snapshot();

					if let Some(current) = snapshot.access_token.as_ref() {
						if Some(current) != stale {
							self.metrics.record_coalesced();

							return Ok(current.clone());
						}
					}
					if snapshot.refresh_token.is_none() {
						return Err(Error::RefreshFailed {
							reason: "no refresh token is available".into(),
						});
					}

					state.phase = RefreshPhase::Refreshing;

					let coordinator = self.clone();

					tokio::spawn(async move { coordinator.run_exchange().await });
				},
				RefreshPhase::Refreshing => {
					self.metrics.record_coalesced();

					#[cfg(feature = "tracing")]
					tracing::debug!(waiting = state.waiters.len() + 1, "joined in-flight refresh");
				},
			}

			let (tx, rx) = oneshot::channel();
			let ticket = state.next_ticket;

			state.next_ticket += 1;
			state.waiters.push_back(Waiter { ticket, tx });

			(ticket, rx)
		};
		let _slot = WaiterSlot { coordinator: self.as_ref(), ticket };

		match rx.await {
			Ok(Ok(token)) => Ok(token),
			Ok(Err(reason)) => Err(Error::RefreshFailed { reason }),
			Err(_) => Err(Error::RefreshFailed { reason: "refresh was abandoned".into() }),
		}
	}

	async fn run_exchange(self: Arc<Self>) {
		let mut guard = ExchangeGuard { coordinator: self.clone(), armed: true };

		self.metrics.record_exchange();

		let used_refresh = self.session.snapshot().refresh_token.clone();
		let exchanged = obs::observe(OpKind::Refresh, "exchange", async {
			let used_refresh = used_refresh.clone().ok_or_else(|| Error::RefreshFailed {
				reason: "no refresh token is available".into(),
			})?;

			match tokio::time::timeout(self.timeout, self.session.exchange_refresh_token(used_refresh))
				.await
			{
				Ok(result) => result,
				Err(_) => Err(Error::RefreshFailed {
					reason: format!(
						"refresh exchange timed out after {} ms",
						self.timeout.as_millis()
					),
				}),
			}
		})
		.await;
		let (resolution, outcome) = match exchanged {
			Ok(tokens) =>
				if self.session.apply_refreshed(&tokens).await {
					(RefreshResolution::Refreshed, Ok(tokens.access))
				} else {
					(
						RefreshResolution::Superseded,
						self.current_or("session ended while refreshing".into()),
					)
				},
			Err(e) => {
				let reason = match e {
					Error::RefreshFailed { reason } => reason,
					other => other.to_string(),
				};
				let signed_out = match &used_refresh {
					Some(used) =>
						self.session.sign_out_holding(used, SignOutReason::RefreshFailed).await,
					None => false,
				};

				if signed_out {
					(RefreshResolution::SignedOut, Err(reason))
				} else {
					(RefreshResolution::Superseded, self.current_or(reason))
				}
			},
		};

		#[cfg(feature = "tracing")]
		tracing::debug!(%resolution, waiting = self.waiting(), "refresh exchange finished");

		obs::record_refresh_resolution(resolution);

		match &outcome {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		guard.armed = false;
		self.release(outcome);
	}

	fn current_or(&self, reason: String) -> Outcome {
		self.session.access_token().ok_or(reason)
	}

	fn release(&self, outcome: Outcome) {
		let waiters = {
			let mut state = self.state.lock();

			state.phase = RefreshPhase::Idle;

			std::mem::take(&mut state.waiters)
		};

		for waiter in waiters {
			let _ = waiter.tx.send(outcome.clone());
		}
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("phase", &state.phase)
			.field("waiting", &state.waiters.len())
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Removes a cancelled caller from the wait list.
struct WaiterSlot<'a, T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: &'a RefreshCoordinator<T>,
	ticket: u64,
}
impl<T> Drop for WaiterSlot<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		self.coordinator.state.lock().waiters.retain(|waiter| waiter.ticket != self.ticket);
	}
}

/// Releases waiters if the exchange task is torn down before it finishes.
struct ExchangeGuard<T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: Arc<RefreshCoordinator<T>>,
	armed: bool,
}
impl<T> Drop for ExchangeGuard<T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		if self.armed {
			self.coordinator.metrics.record_failure();
			self.coordinator.release(Err("refresh task was cancelled".into()));
		}
	}
}
