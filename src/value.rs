//! The run-time [Value] tagged union (§3.1 / §4.1): numeric/string/array/
//! struct/pointer variants, conversions, structural equality, and the JSON
//! shape used for command payloads.
//!
//! Shared/mutable payloads (`string`, the array kinds, `struct`) are held
//! behind `Rc<RefCell<_>>` so aliasing (references, pointers, struct member
//! sharing) and in-place mutation (`String::toUpperCase`, array element
//! stores, ...) fall out of ordinary Rust ownership rather than a hand-rolled
//! arena with generation counters. `Pointer` holds a `Weak` reference into a
//! variable's own storage cell (see [crate::scope::Variable]); a pointer
//! whose target has gone out of scope silently degrades to invalid, which
//! dereference paths turn into a `NullPointerError`.

use indexmap::IndexMap;
use serde_json::json;
use std::cell::RefCell;
use std::fmt;
use std::num::Wrapping;
use std::rc::{Rc, Weak};

pub type SharedString = Rc<RefCell<String>>;
pub type IntArray = Rc<RefCell<Vec<i32>>>;
pub type DoubleArray = Rc<RefCell<Vec<f64>>>;
pub type StringArray = Rc<RefCell<Vec<String>>>;
pub type StructFields = IndexMap<String, Value>;
pub type StructValue = Rc<RefCell<StructFields>>;
/// The kind of cell a variable's storage lives in; pointers borrow this
/// weakly.
pub type ValueCell = Rc<RefCell<Value>>;

/// The tagged-union run-time value described in §3.1.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    UInt(u32),
    Double(f64),
    Str(SharedString),
    IntArray(IntArray),
    DoubleArray(DoubleArray),
    StringArray(StringArray),
    Struct(StructValue),
    Pointer(Option<Weak<RefCell<Value>>>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(RefCell::new(s.into())))
    }

    pub fn int_array(v: Vec<i32>) -> Self {
        Value::IntArray(Rc::new(RefCell::new(v)))
    }

    pub fn double_array(v: Vec<f64>) -> Self {
        Value::DoubleArray(Rc::new(RefCell::new(v)))
    }

    pub fn string_array(v: Vec<String>) -> Self {
        Value::StringArray(Rc::new(RefCell::new(v)))
    }

    pub fn empty_struct() -> Self {
        Value::Struct(Rc::new(RefCell::new(IndexMap::new())))
    }

    pub fn null_pointer() -> Self {
        Value::Pointer(None)
    }

    /// Declared-type name this value would carry if it had just been
    /// produced from a literal of this shape (`"int"`, `"double"`, ...). Used
    /// when a declaration has no explicit base type to fall back on (e.g.
    /// inferred array element type).
    pub fn inferred_type_name(&self) -> &'static str {
        match self {
            Value::Null => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "unsigned int",
            Value::Double(_) => "double",
            Value::Str(_) => "String",
            Value::IntArray(_) => "int[]",
            Value::DoubleArray(_) => "double[]",
            Value::StringArray(_) => "String[]",
            Value::Struct(_) => "struct",
            Value::Pointer(_) => "pointer",
        }
    }

    /// The `typeof` operator's result (§4.4): one of `"number" | "string" |
    /// "boolean" | "undefined" | "object"`.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Null => "undefined",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::UInt(_) | Value::Double(_) => "number",
            Value::Str(_) => "string",
            Value::IntArray(_)
            | Value::DoubleArray(_)
            | Value::StringArray(_)
            | Value::Struct(_)
            | Value::Pointer(_) => "object",
        }
    }

    /// The `sizeof` operator's result in bytes (§4.4).
    pub fn size_of(&self) -> usize {
        match self {
            Value::Null => 4,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::UInt(_) => 4,
            Value::Double(_) => 8,
            Value::Str(s) => s.borrow().len() + 1,
            Value::IntArray(a) => a.borrow().len() * 4,
            Value::DoubleArray(a) => a.borrow().len() * 8,
            Value::StringArray(a) => {
                a.borrow().iter().map(|s| s.len() + 1).sum()
            }
            Value::Struct(s) => {
                s.borrow().values().map(Value::size_of).sum()
            }
            Value::Pointer(_) => 4,
        }
    }

    /// Truthiness, as used by `if`/`while`/`!`/`&&`/`||` conditions. `Serial`
    /// is modeled as a truthy sentinel struct elsewhere (§4.4), not here.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::UInt(n) => *n != 0,
            Value::Double(d) => *d != 0.0,
            Value::Str(s) => !s.borrow().is_empty(),
            Value::IntArray(a) => !a.borrow().is_empty(),
            Value::DoubleArray(a) => !a.borrow().is_empty(),
            Value::StringArray(a) => !a.borrow().is_empty(),
            Value::Struct(_) => true,
            Value::Pointer(p) => p.as_ref().map_or(false, |w| w.upgrade().is_some()),
        }
    }

    /// Coerce to `int32` per C/Arduino conversion rules (truncating
    /// doubles, parsing leading digits of strings à la `atoi`, `true`/`false`
    /// as 1/0).
    pub fn coerce_int(&self) -> i32 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => *b as i32,
            Value::Int(n) => *n,
            Value::UInt(n) => *n as i32,
            Value::Double(d) => *d as i32,
            Value::Str(s) => parse_leading_int(&s.borrow()),
            Value::IntArray(a) => a.borrow().len() as i32,
            Value::DoubleArray(a) => a.borrow().len() as i32,
            Value::StringArray(a) => a.borrow().len() as i32,
            Value::Struct(_) => 0,
            Value::Pointer(_) => 0,
        }
    }

    pub fn coerce_uint(&self) -> u32 {
        Wrapping(self.coerce_int() as u32).0
    }

    pub fn coerce_double(&self) -> f64 {
        match self {
            Value::Double(d) => *d,
            Value::Str(s) => s.borrow().trim().parse::<f64>().unwrap_or(0.0),
            other => other.coerce_int() as f64,
        }
    }

    pub fn coerce_bool(&self) -> bool {
        self.as_bool()
    }

    /// Coerce to a display string. Integer-valued doubles are rendered
    /// without a trailing `.0` per §4.1's display-context rule.
    pub fn coerce_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Double(d) => format_double(*d),
            Value::Str(s) => s.borrow().clone(),
            Value::IntArray(a) => format!("{:?}", a.borrow()),
            Value::DoubleArray(a) => format!("{:?}", a.borrow()),
            Value::StringArray(a) => format!("{:?}", a.borrow()),
            Value::Struct(_) => "[object]".to_string(),
            Value::Pointer(p) => match p {
                Some(w) if w.upgrade().is_some() => "[pointer]".to_string(),
                _ => "nullptr".to_string(),
            },
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_) | Value::Double(_) | Value::Bool(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    /// JSON payload used inside command fields (§4.1, §6.2/§6.4). Strings are
    /// plain JSON strings here; the `VAR_SET`-specific object wrapping for
    /// const strings / `ArduinoString` is applied by the command layer, not
    /// here, since that wrapping depends on variable attributes this type
    /// doesn't know about.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(*b),
            Value::Int(n) => json!(*n),
            Value::UInt(n) => json!(*n),
            Value::Double(d) => double_to_json(*d),
            Value::Str(s) => json!(s.borrow().clone()),
            Value::IntArray(a) => json!(a.borrow().clone()),
            Value::DoubleArray(a) => {
                serde_json::Value::Array(a.borrow().iter().map(|d| double_to_json(*d)).collect())
            }
            Value::StringArray(a) => json!(a.borrow().clone()),
            Value::Struct(s) => {
                let mut map = serde_json::Map::new();
                for (k, v) in s.borrow().iter() {
                    map.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            Value::Pointer(p) => match p {
                Some(w) if w.upgrade().is_some() => json!("[pointer]"),
                _ => serde_json::Value::Null,
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({})", self.coerce_string())
    }
}

/// Render a double the way display contexts want it: integer-valued doubles
/// lose their fractional part (`2.0` -> `"2"`), everything else keeps full
/// precision via Rust's default float formatting.
pub fn format_double(d: f64) -> String {
    if d.fract() == 0.0 && d.is_finite() {
        format!("{}", d as i64)
    } else {
        format!("{}", d)
    }
}

fn double_to_json(d: f64) -> serde_json::Value {
    if d.fract() == 0.0 && d.is_finite() {
        json!(d as i64)
    } else {
        serde_json::Number::from_f64(d).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
    }
}

fn parse_leading_int(s: &str) -> i32 {
    let trimmed = s.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        0
    } else {
        trimmed[..end].parse().unwrap_or(0)
    }
}

/// Structural equality with cross-numeric promotion (`int == double` allowed
/// by numeric value); `null == null` is the only way `null` compares equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Str(x), Value::Str(y)) => *x.borrow() == *y.borrow(),
        (Value::Str(_), _) | (_, Value::Str(_)) => a.coerce_string() == b.coerce_string(),
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ if a.is_numeric() && b.is_numeric() => {
            if a.is_double() || b.is_double() {
                a.coerce_double() == b.coerce_double()
            } else {
                a.coerce_int() == b.coerce_int()
            }
        }
        _ => false,
    }
}

/// Errors from pure numeric operators, kept separate from [crate::error::EngineError]
/// so this module stays emission-agnostic; the expression evaluator is the
/// one place that turns these into `ERROR` commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NumericError {
    DivideByZero,
    ModuloByZero,
}

/// The result type shared across `numeric_*` helpers below.
pub type NumericResult = Result<Value, NumericError>;

/// Whether a binary `+` should be treated as string concatenation (true if
/// *either* operand is a string).
pub fn is_concat(a: &Value, b: &Value) -> bool {
    a.is_string() || b.is_string()
}

/// Whether `int op int -> int` promotion should kick in, vs. promoting to
/// `double`. A double operand whose fractional part is zero still
/// participates in integer division/modulo when paired with an integer, to
/// match the companion implementation's quirk (§9 of the spec).
fn both_integral_for_div(a: &Value, b: &Value) -> bool {
    let a_integral = match a {
        Value::Double(d) => d.fract() == 0.0,
        _ => !a.is_double(),
    };
    let b_integral = match b {
        Value::Double(d) => d.fract() == 0.0,
        _ => !b.is_double(),
    };
    a_integral && b_integral
}

fn promotes_double(a: &Value, b: &Value) -> bool {
    a.is_double() || b.is_double()
}

pub fn numeric_add(a: &Value, b: &Value) -> Value {
    if promotes_double(a, b) {
        Value::Double(a.coerce_double() + b.coerce_double())
    } else {
        Value::Int((Wrapping(a.coerce_int()) + Wrapping(b.coerce_int())).0)
    }
}

pub fn numeric_sub(a: &Value, b: &Value) -> Value {
    if promotes_double(a, b) {
        Value::Double(a.coerce_double() - b.coerce_double())
    } else {
        Value::Int((Wrapping(a.coerce_int()) - Wrapping(b.coerce_int())).0)
    }
}

pub fn numeric_mul(a: &Value, b: &Value) -> Value {
    if promotes_double(a, b) {
        Value::Double(a.coerce_double() * b.coerce_double())
    } else {
        Value::Int((Wrapping(a.coerce_int()) * Wrapping(b.coerce_int())).0)
    }
}

pub fn numeric_div(a: &Value, b: &Value) -> NumericResult {
    if both_integral_for_div(a, b) {
        let divisor = b.coerce_int();
        if divisor == 0 {
            return Err(NumericError::DivideByZero);
        }
        Ok(Value::Int(a.coerce_int() / divisor))
    } else {
        let divisor = b.coerce_double();
        if divisor == 0.0 {
            return Err(NumericError::DivideByZero);
        }
        Ok(Value::Double(a.coerce_double() / divisor))
    }
}

pub fn numeric_mod(a: &Value, b: &Value) -> NumericResult {
    if both_integral_for_div(a, b) {
        let divisor = b.coerce_int();
        if divisor == 0 {
            return Err(NumericError::ModuloByZero);
        }
        Ok(Value::Int(a.coerce_int() % divisor))
    } else {
        let divisor = b.coerce_double();
        if divisor == 0.0 {
            return Err(NumericError::ModuloByZero);
        }
        Ok(Value::Double(a.coerce_double() % divisor))
    }
}

pub fn numeric_compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    if promotes_double(a, b) || a.is_string() || b.is_string() {
        a.coerce_double().partial_cmp(&b.coerce_double()).unwrap_or(std::cmp::Ordering::Equal)
    } else {
        a.coerce_int().cmp(&b.coerce_int())
    }
}

pub fn bitwise_and(a: &Value, b: &Value) -> Value {
    Value::Int(a.coerce_int() & b.coerce_int())
}
pub fn bitwise_or(a: &Value, b: &Value) -> Value {
    Value::Int(a.coerce_int() | b.coerce_int())
}
pub fn bitwise_xor(a: &Value, b: &Value) -> Value {
    Value::Int(a.coerce_int() ^ b.coerce_int())
}
pub fn bitwise_not(a: &Value) -> Value {
    Value::Int(!a.coerce_int())
}
pub fn shift_left(a: &Value, b: &Value) -> Value {
    Value::Int((Wrapping(a.coerce_int()) << (b.coerce_int() as usize & 31)).0)
}
pub fn shift_right(a: &Value, b: &Value) -> Value {
    Value::Int(a.coerce_int() >> (b.coerce_int() as usize & 31))
}

/// Convert a value to the declared base type of a variable it's about to be
/// stored into, e.g. assigning a `double` result to an `int` variable
/// truncates it. `type_name` is the declared base type string (`"int"`,
/// `"double"`, `"String"`, `"bool"`, ...); array and struct types pass the
/// value through unchanged (array-element assignment is handled separately
/// by the evaluator since it needs the target array/index, not a bare
/// value-to-value conversion).
pub fn convert_to_declared_type(value: &Value, type_name: &str) -> Value {
    match type_name {
        "int" | "short" | "long" | "byte" | "char" => Value::Int(value.coerce_int()),
        "unsigned int" | "unsigned long" | "size_t" => Value::UInt(value.coerce_uint()),
        "double" | "float" => Value::Double(value.coerce_double()),
        "bool" | "boolean" => Value::Bool(value.coerce_bool()),
        "String" => Value::string(value.coerce_string()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_division_truncates() {
        let a = Value::Int(7);
        let b = Value::Int(2);
        assert!(matches!(numeric_div(&a, &b), Ok(Value::Int(3))));
    }

    #[test]
    fn double_with_zero_fraction_stays_integral() {
        let a = Value::Int(7);
        let b = Value::Double(2.0);
        assert!(matches!(numeric_div(&a, &b), Ok(Value::Int(3))));
    }

    #[test]
    fn true_double_division_promotes() {
        let a = Value::Int(7);
        let b = Value::Double(2.5);
        match numeric_div(&a, &b) {
            Ok(Value::Double(d)) => assert!((d - 2.8).abs() < 1e-9),
            other => panic!("expected double, got {:?}", other),
        }
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        assert_eq!(numeric_div(&Value::Int(1), &Value::Int(0)).unwrap_err(), NumericError::DivideByZero);
    }

    #[test]
    fn equality_cross_promotes_numeric() {
        assert!(values_equal(&Value::Int(2), &Value::Double(2.0)));
        assert!(!values_equal(&Value::Null, &Value::Int(0)));
        assert!(values_equal(&Value::Null, &Value::Null));
    }

    #[test]
    fn overflow_wraps() {
        let a = Value::Int(i32::MAX);
        let b = Value::Int(1);
        assert!(matches!(numeric_add(&a, &b), Value::Int(n) if n == i32::MIN));
    }

    #[test]
    fn double_display_drops_fraction_when_whole() {
        assert_eq!(format_double(2.0), "2");
        assert_eq!(format_double(2.5), "2.5");
    }
}
