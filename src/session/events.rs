//! Publish/subscribe channel for session changes that other screens react to.

// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	auth::{Role, UserId},
};

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignOutReason {
	/// The user (or application) called logout.
	UserRequested,
	/// The refresh exchange failed; the user must log in again.
	RefreshFailed,
}

/// Event payloads published by the session service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
	/// A login completed.
	SignedIn {
		/// Backend identifier of the new session.
		user_id: UserId,
		/// Role of the new session.
		role: Role,
	},
	/// The display name changed (login or profile edit).
	DisplayNameChanged {
		/// New display name.
		display_name: String,
	},
	/// The session was destroyed.
	SignedOut {
		/// Cause of the sign-out.
		reason: SignOutReason,
	},
}

/// Sender side owned by the session service.
#[derive(Clone, Debug)]
pub(crate) struct EventBus(broadcast::Sender<SessionEvent>);
impl EventBus {
	pub(crate) fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));

		Self(tx)
	}

	pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.0.subscribe()
	}

	/// Publishes `event`; having no subscribers is not an error.
	pub(crate) fn publish(&self, event: SessionEvent) {
		let _ = self.0.send(event);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn subscribers_receive_events_in_order() {
		let bus = EventBus::new(4);

		bus.publish(SessionEvent::SignedOut { reason: SignOutReason::UserRequested });

		let mut rx = bus.subscribe();

		bus.publish(SessionEvent::DisplayNameChanged { display_name: "Ada".into() });
		bus.publish(SessionEvent::SignedOut { reason: SignOutReason::RefreshFailed });

		assert_eq!(
			rx.recv().await.expect("First event should arrive."),
			SessionEvent::DisplayNameChanged { display_name: "Ada".into() }
		);
		assert_eq!(
			rx.recv().await.expect("Second event should arrive."),
			SessionEvent::SignedOut { reason: SignOutReason::RefreshFailed }
		);
	}
}
