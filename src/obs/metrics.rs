// self
use crate::obs::{FailureClass, OpKind, OpOutcome, RefreshResolution};

/// Counts one step of an operation on `session_gate_op_total{op, outcome}`.
pub fn record_op_outcome(kind: OpKind, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"session_gate_op_total",
		"op" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Counts a failed operation: the `failure` outcome plus
/// `session_gate_op_failures_total{op, class}`.
pub fn record_op_failure(kind: OpKind, class: FailureClass) {
	record_op_outcome(kind, OpOutcome::Failure);

	#[cfg(feature = "metrics")]
	metrics::counter!(
		"session_gate_op_failures_total",
		"op" => kind.as_str(),
		"class" => class.as_str()
	)
	.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = class;
}

/// Counts a finished refresh exchange on `session_gate_refresh_total{resolution}`.
pub fn record_refresh_resolution(resolution: RefreshResolution) {
	#[cfg(feature = "metrics")]
	metrics::counter!("session_gate_refresh_total", "resolution" => resolution.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = resolution;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_a_recorder_is_a_noop() {
		record_op_failure(OpKind::Refresh, FailureClass::RefreshFailed);
		record_refresh_resolution(RefreshResolution::Superseded);
	}
}
