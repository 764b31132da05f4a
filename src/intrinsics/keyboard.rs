//! `Keyboard` (USB HID) intrinsics (§4.7): all surfaced as plain
//! `FUNCTION_CALL` commands, no external reads involved.

use crate::command::CommandPayload;
use crate::interp::Interpreter;
use crate::value::Value;

pub fn dispatch(interp: &mut Interpreter, method: &str, args: &[Value]) -> Option<Value> {
    match method {
        "begin" | "end" | "press" | "release" | "releaseAll" | "write" | "print" | "println" => {
            let data = matches!(method, "write" | "print" | "println").then(|| args.get(0).map(Value::to_json)).flatten();
            interp.emit(CommandPayload::FunctionCall {
                function: Some(format!("Keyboard.{}", method)),
                arguments: Some(args.iter().map(Value::to_json).collect()),
                message: None,
                iteration: None,
                completed: None,
                baud_rate: None,
                data,
                timeout: None,
            });
            Some(Value::Null)
        }
        _ => None,
    }
}
