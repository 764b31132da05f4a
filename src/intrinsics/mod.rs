//! The Arduino Intrinsics surface (§4.7): every built-in callable that isn't
//! a user-defined function. Split by concern the way the teacher splits
//! `machine_instr.rs` by instruction family, with one `dispatch` per family
//! and a single entry point here that routes a call's dotted name
//! (`"digitalWrite"`, `"Serial.println"`, `"myString.trim"`, ...) to the
//! right one.

mod ctype;
mod hardware;
mod keyboard;
mod math;
mod serial;
mod strings;
mod timing;

use crate::interp::Interpreter;
use crate::suspension::SuspensionCursor;
use crate::value::Value;

/// Resolve `name` against the intrinsic surface. Returns `None` if nothing
/// recognizes it, letting [Interpreter::dispatch_call] fall through to
/// `UnknownFunction`.
pub fn dispatch(interp: &mut Interpreter, name: &str, args: Vec<Value>) -> Option<Value> {
    if let Some((object, method)) = name.split_once('.') {
        if object == "Keyboard" {
            return keyboard::dispatch(interp, method, &args);
        }
        if object.starts_with("Serial") {
            return serial::dispatch(interp, object, method, &args);
        }
        // Anything else qualified is a call on a `String` variable
        // (`s.concat(...)`, `s.toUpperCase()`, ...); struct member functions
        // are out of scope for the intrinsic surface.
        return strings::dispatch(interp, object, method, &args);
    }

    hardware::dispatch(interp, name, &args)
        .or_else(|| timing::dispatch(interp, name, &args))
        .or_else(|| math::dispatch(interp, name, &args))
        .or_else(|| ctype::dispatch(name, &args))
}

/// The shared suspend-or-mock pattern behind `digitalRead`, `analogRead`,
/// `millis`, `micros`, and `pulseIn` (§4.9/§4.10). In synchronous mode
/// (the default) the request is still emitted, for stream parity with
/// asynchronous mode, but a mock value is returned immediately instead of
/// suspending. `key` feeds the synchronous-mode request id, which the
/// reference stream shapes as `<function>_static_<key>` rather than the
/// counter-based id asynchronous mode uses.
pub(crate) fn external_read(
    interp: &mut Interpreter,
    function: &str,
    key: impl std::fmt::Display,
    emit_request: impl FnOnce(&mut Interpreter, Option<String>),
    mock_value: impl FnOnce(&mut Interpreter) -> Value,
) -> Value {
    if interp.options.sync_mode {
        let request_id = format!("{}_static_{}", function, key);
        emit_request(interp, Some(request_id));
        mock_value(interp)
    } else {
        let request_id = interp.suspension.next_request_id(function);
        emit_request(interp, Some(request_id.clone()));
        interp.suspension.begin_wait(request_id, SuspensionCursor { child_index: 0 });
        Value::Null
    }
}

/// A monotonic per-call-site counter for external reads that have no
/// natural key of their own (`millis`, `micros`, `pulseIn`), so their
/// synchronous-mode request ids are still unique and stable in order.
pub(crate) fn next_sync_counter(interp: &mut Interpreter) -> u64 {
    interp.mock.next_sync_counter()
}
