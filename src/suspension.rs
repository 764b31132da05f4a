//! The Suspension Protocol (§4.9): request/response handling for external
//! reads in asynchronous mode, plus the resumption cursor that lets the
//! orchestrator pick the right sibling statement back up.

use crate::value::Value;
use std::collections::VecDeque;

/// Identifies the statement that suspended: the compound-statement node's
/// identity (by pointer-ish index into its children, since [crate::ast::Node]
/// has no stable id of its own) and the index of the child that yielded.
/// Resumption continues at `child_index + 1` within the same compound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SuspensionCursor {
    pub child_index: usize,
}

/// What the engine is waiting on while `WaitingForResponse`.
pub struct PendingRequest {
    pub request_id: String,
    pub cursor: SuspensionCursor,
}

/// Owns the response queue and request-id counter. A response that doesn't
/// match the currently-awaited id is retained, not dropped -- §4.9 requires
/// it survive until some later `tick()` consumes it, or program end.
#[derive(Default)]
pub struct SuspensionState {
    pub pending: Option<PendingRequest>,
    responses: VecDeque<(String, Value)>,
    counter: u64,
}

impl SuspensionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a stable request id of the documented shape
    /// `<function>_<counter>_<epoch>`. `epoch` here is the request's own
    /// sequence number restated, following the reference convention of a
    /// monotonic counter doubling as a fake timestamp so the id is
    /// reproducible across runs.
    pub fn next_request_id(&mut self, function: &str) -> String {
        self.counter += 1;
        format!("{}_{}_{}", function, self.counter, self.counter)
    }

    pub fn begin_wait(&mut self, request_id: String, cursor: SuspensionCursor) {
        self.pending = Some(PendingRequest { request_id, cursor });
    }

    pub fn deliver(&mut self, request_id: &str, value: Value) {
        self.responses.push_back((request_id.to_string(), value));
    }

    /// Drain the queue looking for the currently-awaited id. Returns the
    /// matched value and the cursor to resume from, leaving any non-matching
    /// responses buffered in arrival order.
    pub fn try_take_awaited(&mut self) -> Option<(Value, SuspensionCursor)> {
        let awaited = self.pending.as_ref()?.request_id.clone();
        let position = self.responses.iter().position(|(id, _)| *id == awaited)?;
        let (_, value) = self.responses.remove(position).unwrap();
        let cursor = self.pending.take().unwrap().cursor;
        Some((value, cursor))
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_and_stable_shape() {
        let mut state = SuspensionState::new();
        let a = state.next_request_id("analogRead");
        let b = state.next_request_id("analogRead");
        assert_ne!(a, b);
        assert!(a.starts_with("analogRead_"));
    }

    #[test]
    fn non_matching_response_is_retained_for_later() {
        let mut state = SuspensionState::new();
        let id = state.next_request_id("millis");
        state.begin_wait(id.clone(), SuspensionCursor { child_index: 2 });
        state.deliver("someOtherId", Value::Int(1));
        assert!(state.try_take_awaited().is_none());
        state.deliver(&id, Value::Int(42));
        let (value, cursor) = state.try_take_awaited().unwrap();
        assert_eq!(value.coerce_int(), 42);
        assert_eq!(cursor.child_index, 2);
        // the earlier unrelated response is still buffered
        assert_eq!(state.responses.len(), 1);
    }
}
