//! The Command Emitter (§3.4/§4.11 Safe Mode/§6.2): the canonical JSON
//! record factory, ordered append, emission statistics, and safe-mode
//! suppression of cascading validation errors.

use crate::error::{EngineError, ErrorKind};
use serde::Serialize;
use serde_json::{Map, Value as Json};

/// One emitted command. `timestamp` is always `0`: the stream's ordering is
/// carried entirely by append order, not by wall-clock time (§3.4).
#[derive(Clone, Debug, Serialize)]
pub struct Command {
    #[serde(flatten)]
    pub payload: CommandPayload,
    pub timestamp: u64,
}

impl Command {
    fn new(payload: CommandPayload) -> Self {
        Self { payload, timestamp: 0 }
    }

    /// The `type` tag this command serializes under, e.g. `"VAR_SET"`.
    pub fn type_tag(&self) -> &'static str {
        self.payload.type_tag()
    }

    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).expect("Command always serializes")
    }
}

macro_rules! command_payload {
    ($( $tag:literal => $variant:ident $( { $( $field:ident : $ty:ty ),* $(,)? } )? ),* $(,)?) => {
        /// All the command payload shapes the engine can emit, internally
        /// tagged by `type` (§6.2's exhaustive canonical type list).
        #[derive(Clone, Debug, Serialize)]
        #[serde(tag = "type")]
        pub enum CommandPayload {
            $(
                #[serde(rename = $tag, rename_all = "camelCase")]
                $variant $( { $( #[serde(skip_serializing_if = "Option::is_none")] $field : $ty ),* } )?,
            )*
        }

        impl CommandPayload {
            pub fn type_tag(&self) -> &'static str {
                match self {
                    $( CommandPayload::$variant { .. } => $tag, )*
                }
            }
        }
    };
}

// NOTE: every field below is `Option<T>` and `skip_serializing_if` is applied
// uniformly by the macro; required-looking fields (e.g. `PIN_MODE`'s `pin`)
// are still declared `Option` for macro uniformity but are always populated
// by the constructors in this module, so in practice they are never omitted.
command_payload! {
    "VERSION_INFO" => VersionInfo { version: Option<String> },
    "PROGRAM_START" => ProgramStart {},
    "PROGRAM_END" => ProgramEnd { message: Option<String> },
    "SETUP_START" => SetupStart {},
    "SETUP_END" => SetupEnd {},
    "LOOP_START" => LoopStart { message: Option<String>, iteration: Option<u32> },
    "LOOP_END" => LoopEnd { iterations: Option<u32>, limit_reached: Option<bool> },
    "LOOP_LIMIT_REACHED" => LoopLimitReached { iterations: Option<u32>, message: Option<String> },
    "ERROR" => Error { message: Option<String>, error_type: Option<ErrorKind> },

    "IF_STATEMENT" => IfStatement {
        condition: Option<Json>,
        condition_display: Option<String>,
        branch: Option<String>
    },
    "SWITCH_STATEMENT" => SwitchStatement { discriminant: Option<Json> },
    "SWITCH_CASE" => SwitchCase { value: Option<Json>, should_execute: Option<bool> },
    "BREAK_STATEMENT" => BreakStatement {},
    "CONTINUE_STATEMENT" => ContinueStatement {},
    "WHILE_LOOP" => WhileLoop { phase: Option<String>, iteration: Option<u32>, iterations: Option<u32> },
    "DO_WHILE_LOOP" => DoWhileLoop { phase: Option<String>, iteration: Option<u32>, iterations: Option<u32> },
    "FOR_LOOP" => ForLoop { phase: Option<String>, iteration: Option<u32>, iterations: Option<u32> },

    "VAR_SET" => VarSet {
        variable: Option<String>,
        value: Option<Json>,
        is_const: Option<bool>,
        is_extern: Option<bool>
    },

    "FUNCTION_CALL" => FunctionCall {
        function: Option<String>,
        arguments: Option<Vec<Json>>,
        message: Option<String>,
        iteration: Option<u32>,
        completed: Option<bool>,
        baud_rate: Option<i64>,
        data: Option<Json>,
        timeout: Option<i64>
    },

    "PIN_MODE" => PinMode { pin: Option<i32>, mode: Option<i32> },
    "DIGITAL_WRITE" => DigitalWrite { pin: Option<i32>, value: Option<i32> },
    "ANALOG_WRITE" => AnalogWrite { pin: Option<i32>, value: Option<i32> },
    "DELAY" => Delay { ms: Option<i64> },
    "DELAY_MICROSECONDS" => DelayMicroseconds { us: Option<i64> },

    "ANALOG_READ_REQUEST" => AnalogReadRequest { pin: Option<i32>, request_id: Option<String> },
    "DIGITAL_READ_REQUEST" => DigitalReadRequest { pin: Option<i32>, request_id: Option<String> },
    "EXTERNAL_REQUEST" => ExternalRequest {
        function: Option<String>,
        request_type: Option<String>,
        request_id: Option<String>,
        params: Option<Map<String, Json>>
    },

    "CONSTRUCTOR_REGISTERED" => ConstructorRegistered { name: Option<String> },
    "ENUM_MEMBER" => EnumMember { name: Option<String>, value: Option<Json>, enum_name: Option<String> },
    "ENUM_TYPE_REF" => EnumTypeRef { name: Option<String> },
    "STRUCT_MEMBER" => StructMember { name: Option<String>, member_type: Option<String> },
    "MULTIPLE_STRUCT_MEMBERS" => MultipleStructMembers { names: Option<Vec<String>>, member_type: Option<String> },
    "UNION_DEFINITION" => UnionDefinition { name: Option<String> },
    "UNION_TYPE_REF" => UnionTypeRef { name: Option<String> },
    "TEMPLATE_TYPE_PARAM" => TemplateTypeParam { variable: Option<String>, template_type: Option<String> },
    "MEMBER_FUNCTION_REGISTERED" => MemberFunctionRegistered { name: Option<String>, struct_name: Option<String> },
    "LAMBDA_FUNCTION" => LambdaFunction { name: Option<String> },
    "OBJECT_INSTANCE" => ObjectInstance { type_name: Option<String>, variable: Option<String> },
    "RANGE_EXPRESSION" => RangeExpression { start: Option<Json>, end: Option<Json> },
    "PREPROCESSOR_ERROR" => PreprocessorError { message: Option<String> },
}

/// Running per-type emission counts, exposed mainly for tests and host-side
/// diagnostics dashboards; not part of the command stream itself.
#[derive(Default, Debug, Clone)]
pub struct EmissionStats {
    pub total: u64,
    pub errors: u64,
    pub suppressed: u64,
}

/// Safe-mode state (§7): a latched flag with a reason, entered on
/// unrecoverable errors (`StackOverflowError`, `MemoryError`).
#[derive(Default, Debug, Clone)]
pub struct SafeMode {
    pub latched: bool,
    pub reason: Option<String>,
}

/// Owns the ordered command buffer and emission statistics. This is the only
/// writer of the command stream; all other components call through
/// [CommandEmitter::emit]/[CommandEmitter::emit_error].
#[derive(Default)]
pub struct CommandEmitter {
    commands: Vec<Command>,
    stats: EmissionStats,
    safe_mode: SafeMode,
}

impl CommandEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn stats(&self) -> &EmissionStats {
        &self.stats
    }

    pub fn safe_mode(&self) -> &SafeMode {
        &self.safe_mode
    }

    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode.latched
    }

    /// Append a command. Never suppressed (non-error commands are only ever
    /// produced by code paths that already stopped running once safe mode
    /// latches, so there's nothing to suppress here).
    pub fn emit(&mut self, payload: CommandPayload) {
        self.stats.total += 1;
        self.commands.push(Command::new(payload));
    }

    /// Emit an `ERROR` command for `error`. While safe mode is latched,
    /// further errors are counted but not appended to the stream, to avoid a
    /// cascade of diagnostics from a program that's already unrecoverably
    /// broken. Returns whether the error was actually appended.
    pub fn emit_error(&mut self, error: &EngineError) -> bool {
        self.stats.errors += 1;
        if self.safe_mode.latched {
            self.stats.suppressed += 1;
            return false;
        }
        self.stats.total += 1;
        self.commands.push(Command::new(CommandPayload::Error {
            message: Some(error.message.clone()),
            error_type: Some(error.kind),
        }));
        if error.kind.is_fatal() {
            self.enter_safe_mode(format!("{}", error));
        }
        true
    }

    pub fn enter_safe_mode(&mut self, reason: impl Into<String>) {
        self.safe_mode = SafeMode { latched: true, reason: Some(reason.into()) };
    }
}

/// Render the full stream as newline-delimited JSON (§6.2).
pub fn to_ndjson(commands: &[Command]) -> String {
    let mut out = String::new();
    for command in commands {
        out.push_str(&command.to_json().to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn serializes_with_type_tag_and_fixed_timestamp() {
        let cmd = Command::new(CommandPayload::PinMode { pin: Some(13), mode: Some(1) });
        let json = cmd.to_json();
        assert_eq!(json["type"], "PIN_MODE");
        assert_eq!(json["timestamp"], 0);
        assert_eq!(json["pin"], 13);
        assert_eq!(json["mode"], 1);
    }

    #[test]
    fn omits_none_fields() {
        let cmd = Command::new(CommandPayload::LoopStart { message: Some("hi".into()), iteration: None });
        let json = cmd.to_json();
        assert!(json.get("iteration").is_none());
        assert_eq!(json["message"], "hi");
    }

    #[test]
    fn safe_mode_suppresses_further_errors_but_counts_them() {
        let mut emitter = CommandEmitter::new();
        let fatal = EngineError::stack_overflow();
        assert!(emitter.emit_error(&fatal));
        assert!(emitter.is_safe_mode());
        let next = EngineError::undefined_variable("x");
        assert!(!emitter.emit_error(&next));
        assert_eq!(emitter.stats().errors, 2);
        assert_eq!(emitter.stats().suppressed, 1);
        assert_eq!(emitter.commands().len(), 1);
    }

    #[test]
    fn non_fatal_errors_do_not_latch_safe_mode() {
        let mut emitter = CommandEmitter::new();
        emitter.emit_error(&EngineError::new(ErrorKind::TypeError, "bad"));
        assert!(!emitter.is_safe_mode());
    }
}
