//! Fixed constants bound into the root scope at engine creation, plus a
//! handful of hard engine limits. Mirrors the Arduino standard headers
//! (`Arduino.h`, `USBAPI.h`) closely enough to satisfy the subset of sketches
//! this engine is meant to run, without attempting to be exhaustive.

/// Hard cap on user-function call depth. Exceeding this emits a
/// `StackOverflowError` instead of blowing the host's native stack.
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Soft memory ceiling used for pre-allocation checks (bytes). This is an
/// approximation based on declared array/string sizes, not an actual
/// allocator query, so the same ceiling behaves identically on a desktop
/// host and on a constrained target.
pub const MAX_MEMORY_BYTES: usize = 8 * 1024 * 1024 + 512 * 1024;

/// Safety cap on the number of iterations a range-based `for` over a plain
/// integer range (`for (x : 0..N)`) may run, independent of `maxLoopIterations`.
pub const RANGE_FOR_SAFETY_CAP: usize = 1000;

/// Digital/analog pin constants.
pub const HIGH: i32 = 1;
pub const LOW: i32 = 0;
pub const INPUT: i32 = 0;
pub const OUTPUT: i32 = 1;
pub const INPUT_PULLUP: i32 = 2;
pub const LED_BUILTIN: i32 = 2;

/// Analog pin aliases `A0..A5`, mapped to their digital pin numbers.
pub const ANALOG_PIN_BASE: i32 = 14;
pub const ANALOG_PIN_COUNT: i32 = 6;

/// `String(value, base)` / `print(value, base)` base selectors.
pub const HEX: i32 = 16;
pub const DEC: i32 = 10;
pub const OCT: i32 = 8;
pub const BIN: i32 = 2;

/// A single named numeric constant, used both to seed the root scope and to
/// resolve `constant` AST nodes by name (e.g. `HIGH`, `LED_BUILTIN`).
pub struct NamedConst {
    pub name: &'static str,
    pub value: i32,
}

/// Keyboard HID key codes (USB-HID scan codes as exposed by `Keyboard.h`).
pub const KEY_CONSTANTS: &[NamedConst] = &[
    NamedConst { name: "KEY_LEFT_CTRL", value: 0x80 },
    NamedConst { name: "KEY_LEFT_SHIFT", value: 0x81 },
    NamedConst { name: "KEY_LEFT_ALT", value: 0x82 },
    NamedConst { name: "KEY_LEFT_GUI", value: 0x83 },
    NamedConst { name: "KEY_RIGHT_CTRL", value: 0x84 },
    NamedConst { name: "KEY_RIGHT_SHIFT", value: 0x85 },
    NamedConst { name: "KEY_RIGHT_ALT", value: 0x86 },
    NamedConst { name: "KEY_RIGHT_GUI", value: 0x87 },
    NamedConst { name: "KEY_UP_ARROW", value: 0xDA },
    NamedConst { name: "KEY_DOWN_ARROW", value: 0xD9 },
    NamedConst { name: "KEY_LEFT_ARROW", value: 0xD8 },
    NamedConst { name: "KEY_RIGHT_ARROW", value: 0xD7 },
    NamedConst { name: "KEY_BACKSPACE", value: 0xB2 },
    NamedConst { name: "KEY_TAB", value: 0xB3 },
    NamedConst { name: "KEY_RETURN", value: 0xB0 },
    NamedConst { name: "KEY_ESC", value: 0xB1 },
    NamedConst { name: "KEY_INSERT", value: 0xD1 },
    NamedConst { name: "KEY_DELETE", value: 0xD4 },
    NamedConst { name: "KEY_PAGE_UP", value: 0xD3 },
    NamedConst { name: "KEY_PAGE_DOWN", value: 0xD6 },
    NamedConst { name: "KEY_HOME", value: 0xD2 },
    NamedConst { name: "KEY_END", value: 0xD5 },
    NamedConst { name: "KEY_CAPS_LOCK", value: 0xC1 },
    NamedConst { name: "KEY_F1", value: 0xC2 },
    NamedConst { name: "KEY_F2", value: 0xC3 },
    NamedConst { name: "KEY_F3", value: 0xC4 },
    NamedConst { name: "KEY_F4", value: 0xC5 },
    NamedConst { name: "KEY_F5", value: 0xC6 },
    NamedConst { name: "KEY_F6", value: 0xC7 },
    NamedConst { name: "KEY_F7", value: 0xC8 },
    NamedConst { name: "KEY_F8", value: 0xC9 },
    NamedConst { name: "KEY_F9", value: 0xCA },
    NamedConst { name: "KEY_F10", value: 0xCB },
    NamedConst { name: "KEY_F11", value: 0xCC },
    NamedConst { name: "KEY_F12", value: 0xCD },
];

/// All of the plain numeric root-scope constants other than the keyboard
/// table above (which is large enough to warrant its own list).
pub const CORE_CONSTANTS: &[NamedConst] = &[
    NamedConst { name: "HIGH", value: HIGH },
    NamedConst { name: "LOW", value: LOW },
    NamedConst { name: "INPUT", value: INPUT },
    NamedConst { name: "OUTPUT", value: OUTPUT },
    NamedConst { name: "INPUT_PULLUP", value: INPUT_PULLUP },
    NamedConst { name: "LED_BUILTIN", value: LED_BUILTIN },
    NamedConst { name: "HEX", value: HEX },
    NamedConst { name: "DEC", value: DEC },
    NamedConst { name: "OCT", value: OCT },
    NamedConst { name: "BIN", value: BIN },
];

/// Resolve an `A0`..`A5`-style analog pin alias to its digital pin number.
/// Returns `None` if `name` isn't of that shape.
pub fn analog_pin_alias(name: &str) -> Option<i32> {
    let rest = name.strip_prefix('A')?;
    let idx: i32 = rest.parse().ok()?;
    if idx >= 0 && idx < ANALOG_PIN_COUNT {
        Some(ANALOG_PIN_BASE + idx)
    } else {
        None
    }
}

/// Look up a named constant (core or keyboard) by identifier.
pub fn lookup_named_const(name: &str) -> Option<i32> {
    CORE_CONSTANTS
        .iter()
        .chain(KEY_CONSTANTS.iter())
        .find(|c| c.name == name)
        .map(|c| c.value)
}
