//! Timing intrinsics (§4.7): `delay`, `delayMicroseconds`, the two clock
//! external reads, and `pulseIn`.

use super::{external_read, next_sync_counter};
use crate::command::CommandPayload;
use crate::interp::Interpreter;
use crate::value::Value;

pub fn dispatch(interp: &mut Interpreter, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "delay" => {
            let ms = args.get(0).map(Value::coerce_int).unwrap_or(0) as i64;
            interp.emit(CommandPayload::Delay { ms: Some(ms) });
            Some(Value::Null)
        }
        "delayMicroseconds" => {
            let us = args.get(0).map(Value::coerce_int).unwrap_or(0) as i64;
            interp.emit(CommandPayload::DelayMicroseconds { us: Some(us) });
            Some(Value::Null)
        }
        "millis" => {
            let key = next_sync_counter(interp);
            Some(external_read(
                interp,
                "millis",
                key,
                |interp, request_id| emit_request(interp, "millis", request_id),
                |interp| Value::Int(interp.mock.millis() as i32),
            ))
        }
        "micros" => {
            let key = next_sync_counter(interp);
            Some(external_read(
                interp,
                "micros",
                key,
                |interp, request_id| emit_request(interp, "micros", request_id),
                |interp| Value::Int(interp.mock.micros() as i32),
            ))
        }
        "pulseIn" => {
            let key = next_sync_counter(interp);
            Some(external_read(
                interp,
                "pulseIn",
                key,
                |interp, request_id| emit_request(interp, "pulseIn", request_id),
                |interp| Value::Int(interp.mock.pulse_in() as i32),
            ))
        }
        _ => None,
    }
}

fn emit_request(interp: &mut Interpreter, function: &str, request_id: Option<String>) {
    interp.emit(CommandPayload::ExternalRequest {
        function: Some(function.to_string()),
        request_type: Some(function.to_string()),
        request_id,
        params: None,
    });
}
