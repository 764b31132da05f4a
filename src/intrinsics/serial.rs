//! `Serial`/`Serial1`/... intrinsics (§4.7). All surfaced as `FUNCTION_CALL`
//! commands rather than a dedicated request type -- §6.2's canonical command
//! list has no `SERIAL_*_REQUEST` shape, only the generic `EXTERNAL_REQUEST`
//! used by the timing reads, so `available`/`read` resolve straight from the
//! mock source without ever entering the suspension protocol, synchronous
//! mode or not.

use crate::command::CommandPayload;
use crate::interp::Interpreter;
use crate::value::Value;

pub fn dispatch(interp: &mut Interpreter, port: &str, method: &str, args: &[Value]) -> Option<Value> {
    let function = format!("{}.{}", port, method);
    match method {
        "begin" => {
            let baud_rate = args.get(0).map(Value::coerce_int).unwrap_or(9600) as i64;
            emit(interp, &function, args, None, None, Some(baud_rate), None);
            Some(Value::Null)
        }
        "print" | "println" => {
            let value = args.get(0).cloned().unwrap_or(Value::Null);
            let message = Some(display_message(&function, &value));
            emit(interp, &function, args, message, Some(value.to_json()), None, None);
            Some(Value::Null)
        }
        "write" => {
            let data = args.get(0).map(Value::to_json);
            emit(interp, &function, args, None, data, None, None);
            Some(Value::Int(args.get(0).map(Value::coerce_int).unwrap_or(0)))
        }
        "available" => {
            emit(interp, &function, args, None, None, None, None);
            Some(Value::Int(interp.mock.serial_available(port)))
        }
        "read" => {
            emit(interp, &function, args, None, None, None, None);
            Some(Value::Int(interp.mock.serial_read()))
        }
        "flush" => {
            emit(interp, &function, args, None, None, None, None);
            Some(Value::Null)
        }
        "setTimeout" => {
            let timeout = args.get(0).map(Value::coerce_int).unwrap_or(1000) as i64;
            emit(interp, &function, args, None, None, None, Some(timeout));
            Some(Value::Null)
        }
        "end" | "peek" => {
            emit(interp, &function, args, None, None, None, None);
            Some(if method == "peek" { Value::Int(interp.mock.serial_read()) } else { Value::Null })
        }
        _ => None,
    }
}

fn emit(
    interp: &mut Interpreter,
    function: &str,
    args: &[Value],
    message: Option<String>,
    data: Option<serde_json::Value>,
    baud_rate: Option<i64>,
    timeout: Option<i64>,
) {
    interp.emit(CommandPayload::FunctionCall {
        function: Some(function.to_string()),
        arguments: Some(args.iter().map(Value::to_json).collect()),
        message,
        iteration: None,
        completed: None,
        baud_rate,
        data,
        timeout,
    });
}

/// `Serial.print`/`println`'s display message quotes string arguments and
/// leaves everything else rendered plainly, matching the two literal
/// examples in §8.
fn display_message(function: &str, value: &Value) -> String {
    let rendered = if value.is_string() { format!("\"{}\"", value.coerce_string()) } else { value.coerce_string() };
    format!("{}({})", function, rendered)
}
