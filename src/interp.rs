//! The interpreter's shared mutable state: scope stack, execution-control
//! stack, command emitter, mock source, suspension state, and the
//! declaration tables built during the declaration-collection phase (§4.6).
//!
//! Split across files by concern (`eval.rs` for expressions, `exec.rs` for
//! statements, `invoke.rs` for function calls, `intrinsics/` for built-ins)
//! but all as `impl Interpreter` blocks over the one struct defined here,
//! the way the teacher spreads `impl Machine` across `machine.rs` and
//! `machine_instr.rs`.

use crate::ast::Node;
use crate::command::CommandPayload;
use crate::config::EngineOptions;
use crate::consts;
use crate::control::ExecutionControlStack;
use crate::error::EngineError;
use crate::mock::MockSource;
use crate::scope::{ScopeStack, Variable};
use crate::suspension::SuspensionState;
use crate::value::Value;
use std::collections::HashMap;

/// What kind of user-defined type `types` has registered a name under.
#[derive(Clone, Debug)]
pub enum TypeKind {
    Struct,
    Union,
    Enum,
    Typedef(String),
}

#[derive(Clone, Debug)]
pub struct TypeInfo {
    pub kind: TypeKind,
    /// Ordered `(member_name, declared_type)` pairs, populated for struct and
    /// union declarations; empty for enum/typedef.
    pub members: Vec<(String, String)>,
}

/// The live interpreter: everything the evaluator/executor/invoker/
/// intrinsics need, gathered in one place so each concern's `impl` block can
/// borrow `&mut self` without a pile of separate parameters.
pub struct Interpreter {
    pub scope: ScopeStack,
    pub control: ExecutionControlStack,
    pub emitter: crate::command::CommandEmitter,
    pub mock: MockSource,
    pub suspension: SuspensionState,
    pub options: EngineOptions,
    pub functions: HashMap<String, Node>,
    pub types: HashMap<String, TypeInfo>,
    /// Storage cells for `static` locals, keyed by `(function, declaration
    /// site)` per §3.2; the declaration site is approximated by the
    /// variable's declared name plus the enclosing function name, which is
    /// unique for any program without two `static` locals of the same name
    /// in the same function (the only case that matters for a single
    /// compilation unit).
    pub statics: HashMap<(String, String), crate::value::ValueCell>,
    pub call_depth: usize,
    /// The compound-statement node a suspended external-read call yielded
    /// from, paired with [crate::suspension::PendingRequest::cursor]'s child
    /// index to form the resumption cursor (§4.9/§9).
    pub pending_resume_node: Option<Node>,
    /// Running total of approximate bytes allocated by declared arrays and
    /// strings, checked against [consts::MAX_MEMORY_BYTES] on every
    /// allocation (§5's soft memory ceiling).
    pub memory_used: usize,
}

impl Interpreter {
    pub fn new(options: EngineOptions) -> Self {
        let mut scope = ScopeStack::new();
        seed_root_scope(&mut scope);
        Self {
            scope,
            control: ExecutionControlStack::new(),
            emitter: crate::command::CommandEmitter::new(),
            mock: MockSource::new(),
            suspension: SuspensionState::new(),
            options,
            functions: HashMap::new(),
            types: HashMap::new(),
            statics: HashMap::new(),
            call_depth: 0,
            pending_resume_node: None,
            memory_used: 0,
        }
    }

    pub fn emit(&mut self, payload: CommandPayload) {
        self.emitter.emit(payload);
    }

    /// Record a recoverable engine error as an `ERROR` command (subject to
    /// safe-mode suppression) and return the neutral value callers should
    /// treat the failing (sub-)expression as having produced.
    pub fn report(&mut self, error: EngineError) -> Value {
        self.emitter.emit_error(&error);
        Value::Null
    }

    pub fn debug_trace(&self, message: impl AsRef<str>) {
        crate::debug_trace!(self.options.debug, "{}", message.as_ref());
    }

    /// Account for `bytes` of new allocation against the soft memory ceiling
    /// (§5). Returns `false` (and reports a `MemoryError`, latching safe
    /// mode) once the running total would exceed [consts::MAX_MEMORY_BYTES].
    pub fn account_allocation(&mut self, bytes: usize) -> bool {
        let projected = self.memory_used + bytes;
        if projected > consts::MAX_MEMORY_BYTES {
            log::warn!("allocation of {} bytes would exceed the {} byte memory ceiling", bytes, consts::MAX_MEMORY_BYTES);
            self.report(EngineError::memory(format!(
                "allocation of {} bytes exceeds the {} byte memory ceiling",
                bytes,
                consts::MAX_MEMORY_BYTES
            )));
            false
        } else {
            self.memory_used = projected;
            true
        }
    }
}

fn seed_root_scope(scope: &mut ScopeStack) {
    for named in consts::CORE_CONSTANTS.iter().chain(consts::KEY_CONSTANTS.iter()) {
        scope.declare(named.name, Variable::new(Value::Int(named.value), "int").with_const(true).with_global(true));
    }
    scope.declare("Serial", Variable::new(Value::Bool(true), "Serial").with_const(true).with_global(true));
}
