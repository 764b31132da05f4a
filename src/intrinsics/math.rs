//! Pure math intrinsics (§4.7): no command emission, since none of these
//! touch the outside world -- `random`/`randomSeed` excepted, which draw from
//! the interpreter's own deterministic mock RNG rather than a true source of
//! entropy (§4.10).

use crate::interp::Interpreter;
use crate::value::{self, Value};
use std::cmp::Ordering;

pub fn dispatch(interp: &mut Interpreter, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "map" => Some(map_value(args)),
        "constrain" => Some(constrain(args)),
        "abs" => Some(abs(args)),
        "min" => Some(pick(args, Ordering::Greater)),
        "max" => Some(pick(args, Ordering::Less)),
        "sq" => Some(sq(args)),
        "sqrt" => Some(Value::Double(arg_f64(args, 0).sqrt())),
        "pow" => Some(Value::Double(arg_f64(args, 0).powf(arg_f64(args, 1)))),
        "sin" => Some(Value::Double(arg_f64(args, 0).sin())),
        "cos" => Some(Value::Double(arg_f64(args, 0).cos())),
        "tan" => Some(Value::Double(arg_f64(args, 0).tan())),
        "random" => {
            let (min, max) = if args.len() >= 2 {
                (args.get(0).map(Value::coerce_int).unwrap_or(0), args.get(1).map(Value::coerce_int).unwrap_or(0))
            } else {
                (0, args.get(0).map(Value::coerce_int).unwrap_or(0))
            };
            Some(Value::Int(interp.mock.random(min, max)))
        }
        "randomSeed" => {
            interp.mock.random_seed(args.get(0).map(Value::coerce_int).unwrap_or(0) as i64);
            Some(Value::Null)
        }
        _ => None,
    }
}

fn arg_f64(args: &[Value], i: usize) -> f64 {
    args.get(i).map(Value::coerce_double).unwrap_or(0.0)
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Int(0))
}

fn map_value(args: &[Value]) -> Value {
    let x = arg(args, 0).coerce_int() as i64;
    let in_min = arg(args, 1).coerce_int() as i64;
    let in_max = arg(args, 2).coerce_int() as i64;
    let out_min = arg(args, 3).coerce_int() as i64;
    let out_max = arg(args, 4).coerce_int() as i64;
    let divisor = in_max - in_min;
    if divisor == 0 {
        return Value::Int(out_min as i32);
    }
    Value::Int(((x - in_min) * (out_max - out_min) / divisor + out_min) as i32)
}

fn constrain(args: &[Value]) -> Value {
    let x = arg(args, 0);
    let low = arg(args, 1);
    let high = arg(args, 2);
    if value::numeric_compare(&x, &low) == Ordering::Less {
        low
    } else if value::numeric_compare(&x, &high) == Ordering::Greater {
        high
    } else {
        x
    }
}

fn abs(args: &[Value]) -> Value {
    let v = arg(args, 0);
    if v.is_double() {
        Value::Double(v.coerce_double().abs())
    } else {
        Value::Int(v.coerce_int().abs())
    }
}

fn sq(args: &[Value]) -> Value {
    let v = arg(args, 0);
    if v.is_double() {
        let d = v.coerce_double();
        Value::Double(d * d)
    } else {
        let n = v.coerce_int();
        Value::Int(n.wrapping_mul(n))
    }
}

/// `min`/`max` share the same two-argument "pick the one on this side of the
/// ordering" shape; `favor` is the [Ordering] the first argument must beat
/// the second by to be kept (`Greater` picks the smaller for `min`, `Less`
/// picks the larger for `max`).
fn pick(args: &[Value], favor: Ordering) -> Value {
    let a = arg(args, 0);
    let b = arg(args, 1);
    if value::numeric_compare(&a, &b) == favor {
        b
    } else {
        a
    }
}
