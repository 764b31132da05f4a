//! Pin I/O intrinsics (§4.7): `pinMode`, `digitalWrite`, `analogWrite`, the
//! two pin-based external reads, and `tone`/`noTone`.

use super::external_read;
use crate::command::CommandPayload;
use crate::interp::Interpreter;
use crate::value::Value;

pub fn dispatch(interp: &mut Interpreter, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "pinMode" => {
            interp.emit(CommandPayload::PinMode { pin: Some(arg_int(args, 0)), mode: Some(arg_int(args, 1)) });
            Some(Value::Null)
        }
        "digitalWrite" => {
            interp.emit(CommandPayload::DigitalWrite { pin: Some(arg_int(args, 0)), value: Some(arg_int(args, 1)) });
            Some(Value::Null)
        }
        "analogWrite" => {
            interp.emit(CommandPayload::AnalogWrite { pin: Some(arg_int(args, 0)), value: Some(arg_int(args, 1)) });
            Some(Value::Null)
        }
        "digitalRead" => {
            let pin = arg_int(args, 0);
            Some(external_read(
                interp,
                "digitalRead",
                pin,
                move |interp, request_id| interp.emit(CommandPayload::DigitalReadRequest { pin: Some(pin), request_id }),
                move |interp| Value::Int(interp.mock.digital_read(pin)),
            ))
        }
        "analogRead" => {
            let pin = arg_int(args, 0);
            Some(external_read(
                interp,
                "analogRead",
                pin,
                move |interp, request_id| interp.emit(CommandPayload::AnalogReadRequest { pin: Some(pin), request_id }),
                move |interp| Value::Int(interp.mock.analog_read(pin)),
            ))
        }
        "tone" | "noTone" => {
            emit_call(interp, name, args);
            Some(Value::Null)
        }
        _ => None,
    }
}

fn arg_int(args: &[Value], i: usize) -> i32 {
    args.get(i).map(Value::coerce_int).unwrap_or(0)
}

fn emit_call(interp: &mut Interpreter, name: &str, args: &[Value]) {
    interp.emit(CommandPayload::FunctionCall {
        function: Some(name.to_string()),
        arguments: Some(args.iter().map(Value::to_json).collect()),
        message: None,
        iteration: None,
        completed: None,
        baud_rate: None,
        data: None,
        timeout: None,
    });
}
