//! `<ctype.h>`-style character classification predicates (§4.7). Pure and
//! stateless: the argument is a character code (an `int`, or the first
//! character of a one-character `String`).

use crate::value::Value;

pub fn dispatch(name: &str, args: &[Value]) -> Option<Value> {
    let c = char::from_u32(args.get(0).map(Value::coerce_int).unwrap_or(0) as u32).unwrap_or('\0');
    let result = match name {
        "isAlpha" => c.is_ascii_alphabetic(),
        "isAlphaNumeric" => c.is_ascii_alphanumeric(),
        "isAscii" => c.is_ascii(),
        "isControl" => c.is_ascii_control(),
        "isDigit" => c.is_ascii_digit(),
        "isGraph" => c.is_ascii_graphic(),
        "isHexadecimalDigit" => c.is_ascii_hexdigit(),
        "isLowerCase" => c.is_ascii_lowercase(),
        "isPrintable" => !c.is_ascii_control(),
        "isPunct" => c.is_ascii_punctuation(),
        "isSpace" => matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r'),
        "isUpperCase" => c.is_ascii_uppercase(),
        "isWhitespace" => c.is_ascii_whitespace(),
        _ => return None,
    };
    Some(Value::Bool(result))
}
