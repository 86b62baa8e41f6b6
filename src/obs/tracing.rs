// self
use crate::{
	_prelude::*,
	auth::Identity,
	obs::{FailureClass, OpKind},
};

/// Future returned by [`OpSpan::instrument`]; plain `F` when tracing is disabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; plain `F` when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// Span wrapping one session operation.
///
/// Declares `user_id`, `role`, and `failure` up front so they can be filled in once known:
/// login records the resolved identity through [`record_identity`], and [`super::observe`]
/// stamps the failure class on errors.
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span for `kind` at call site `stage`.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"session_gate.op",
				op = kind.as_str(),
				stage,
				user_id = tracing::field::Empty,
				role = tracing::field::Empty,
				failure = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Stamps the failure class onto the span.
	pub fn record_failure(&self, class: FailureClass) {
		#[cfg(feature = "tracing")]
		self.span.record("failure", class.as_str());
		#[cfg(not(feature = "tracing"))]
		let _ = class;
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Records the resolved identity on the enclosing operation span. Tokens are never recorded.
pub fn record_identity(identity: &Identity) {
	#[cfg(feature = "tracing")]
	{
		let span = tracing::Span::current();

		span.record("user_id", identity.user_id.0);
		span.record("role", identity.role.as_str());
	}
	#[cfg(not(feature = "tracing"))]
	let _ = identity;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{Role, UserId};

	#[tokio::test]
	async fn identity_is_recorded_inside_the_span() {
		let identity = Identity {
			user_id: UserId(7),
			role: Role::Trainer,
			display_name: "ada".into(),
		};
		let span = OpSpan::new(OpKind::Login, "identity_is_recorded_inside_the_span");
		let resolved = span
			.instrument(async {
				record_identity(&identity);

				identity.user_id
			})
			.await;

		span.record_failure(FailureClass::InvalidCredentials);

		assert_eq!(resolved, UserId(7));
	}
}
