//! `String` instance methods (§4.7), e.g. `s.concat(...)`, `s.toUpperCase()`.
//! `object` is looked up as a variable in scope; since [Value::Str] shares a
//! `Rc<RefCell<String>>` cell, a mutating method mutates the variable's
//! storage directly and then emits the `VAR_SET` the mutation implies,
//! exactly as a plain assignment to that variable would.

use crate::interp::Interpreter;
use crate::value::Value;
use std::cmp::Ordering;

pub fn dispatch(interp: &mut Interpreter, object: &str, method: &str, args: &[Value]) -> Option<Value> {
    let variable = interp.scope.lookup(object)?;
    let is_const = variable.is_const;
    let cell = match variable.get() {
        Value::Str(s) => s,
        _ => return None,
    };

    let mutates = matches!(method, "concat" | "toUpperCase" | "toLowerCase" | "trim" | "replace" | "setCharAt");

    let result = match method {
        "concat" => {
            cell.borrow_mut().push_str(&arg_str(args, 0));
            Value::Null
        }
        "equals" => Value::Bool(*cell.borrow() == arg_str(args, 0)),
        "equalsIgnoreCase" => Value::Bool(cell.borrow().eq_ignore_ascii_case(&arg_str(args, 0))),
        "length" => Value::UInt(cell.borrow().chars().count() as u32),
        "toInt" => Value::Int(Value::string(cell.borrow().clone()).coerce_int()),
        "toFloat" | "toDouble" => Value::Double(Value::string(cell.borrow().clone()).coerce_double()),
        "toUpperCase" => {
            let upper = cell.borrow().to_uppercase();
            *cell.borrow_mut() = upper;
            Value::Null
        }
        "toLowerCase" => {
            let lower = cell.borrow().to_lowercase();
            *cell.borrow_mut() = lower;
            Value::Null
        }
        "trim" => {
            let trimmed = cell.borrow().trim().to_string();
            *cell.borrow_mut() = trimmed;
            Value::Null
        }
        "replace" => {
            let find = arg_str(args, 0);
            let replace = arg_str(args, 1);
            let replaced = cell.borrow().replace(&find, &replace);
            *cell.borrow_mut() = replaced;
            Value::Null
        }
        "startsWith" => Value::Bool(cell.borrow().starts_with(&arg_str(args, 0))),
        "endsWith" => Value::Bool(cell.borrow().ends_with(&arg_str(args, 0))),
        "indexOf" => {
            let needle = arg_str(args, 0);
            let chars: Vec<char> = cell.borrow().chars().collect();
            let haystack: String = chars.iter().collect();
            Value::Int(byte_to_char_index(&haystack, haystack.find(&needle)))
        }
        "lastIndexOf" => {
            let needle = arg_str(args, 0);
            let haystack = cell.borrow().clone();
            Value::Int(byte_to_char_index(&haystack, haystack.rfind(&needle)))
        }
        "charAt" => {
            let idx = args.get(0).map(Value::coerce_int).unwrap_or(0).max(0) as usize;
            Value::Int(cell.borrow().chars().nth(idx).map(|c| c as i32).unwrap_or(0))
        }
        "setCharAt" => {
            let idx = args.get(0).map(Value::coerce_int).unwrap_or(0).max(0) as usize;
            let ch = args.get(1).map(Value::coerce_int).and_then(|c| char::from_u32(c as u32)).unwrap_or('\0');
            let mut chars: Vec<char> = cell.borrow().chars().collect();
            if idx < chars.len() {
                chars[idx] = ch;
                *cell.borrow_mut() = chars.into_iter().collect();
            }
            Value::Null
        }
        "substring" => {
            let chars: Vec<char> = cell.borrow().chars().collect();
            let start = args.get(0).map(Value::coerce_int).unwrap_or(0).max(0) as usize;
            let end = args.get(1).map(Value::coerce_int).unwrap_or(chars.len() as i32).max(0) as usize;
            let end = end.min(chars.len());
            let start = start.min(end);
            Value::string(chars[start..end].iter().collect::<String>())
        }
        "compareTo" => {
            let other = arg_str(args, 0);
            Value::Int(match cell.borrow().as_str().cmp(other.as_str()) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            })
        }
        "isEmpty" => Value::Bool(cell.borrow().is_empty()),
        "reserve" => Value::Null,
        _ => return None,
    };

    if mutates {
        let updated = Value::Str(cell.clone());
        interp.emit_var_set(object, &updated, is_const, false);
    }
    Some(result)
}

fn arg_str(args: &[Value], i: usize) -> String {
    args.get(i).map(Value::coerce_string).unwrap_or_default()
}

fn byte_to_char_index(haystack: &str, byte_pos: Option<usize>) -> i32 {
    match byte_pos {
        Some(pos) => haystack[..pos].chars().count() as i32,
        None => -1,
    }
}
