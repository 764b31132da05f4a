//! The Host Control Surface (§4.12/§6.3) and the top-level orchestrator
//! (§4.5's "Top-level orchestration"): the one public entry point a host
//! embeds. Everything else in this crate is reachable only through it.
//!
//! `Engine` owns the [Interpreter] and drives it through three phases --
//! declaration collection, `setup()`, `loop()` -- emitting the lifecycle
//! commands §4.5 specifies around each. A phase's own body execution is just
//! [Interpreter::exec_compound]; the orchestration here is only concerned
//! with *when* to run that, what to emit around it, and how to resume a
//! `WaitingForResponse` phase from the suspension cursor `exec.rs` already
//! tracks.

use crate::ast::Node;
use crate::command::{Command, CommandPayload};
use crate::config::EngineOptions;
use crate::control::{ControlScope, ExecutionState};
use crate::error::CreateError;
use crate::exec::Flow;
use crate::interp::Interpreter;
use crate::value::Value;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which of the three top-level phases the orchestrator is currently
/// driving. `Loop`'s iteration counter is 1-based per §6.4.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Setup,
    Loop { iteration: u32 },
    Done,
}

/// The single host-facing type (§4.12). Not `Sync` (it holds `Rc`/`RefCell`
/// state transitively through [Interpreter]) -- a host needing concurrent
/// access runs one `Engine` per thread rather than sharing one (§5).
pub struct Engine {
    interp: Interpreter,
    program: Node,
    setup_body: Option<Node>,
    loop_body: Option<Node>,
    phase: Phase,
    loop_iterations_run: u32,
    ticking: bool,
    started: bool,
    stopped: bool,
}

impl Engine {
    /// Decode `ast_bytes` (§6.1) and prepare the engine without running
    /// anything: the declaration-collection phase (§4.5a) registers every
    /// top-level function by name so forward references and mutual
    /// recursion resolve regardless of source order, but no body -- not
    /// even `setup()`'s -- executes until [Self::start].
    pub fn create(ast_bytes: &[u8], options: EngineOptions) -> Result<Self, CreateError> {
        let program = crate::ast::wire::decode(ast_bytes)?;
        let mut interp = Interpreter::new(options);
        for child in program.children() {
            if matches!(child.kind(), crate::ast::NodeKind::FunctionDefinition | crate::ast::NodeKind::FunctionDeclaration) {
                interp.functions.insert(child.function_name().to_string(), child.clone());
            }
        }
        let setup_body = interp.functions.get("setup").and_then(Node::function_body).cloned();
        let loop_body = interp.functions.get("loop").and_then(Node::function_body).cloned();
        Ok(Self {
            interp,
            program,
            setup_body,
            loop_body,
            phase: Phase::Setup,
            loop_iterations_run: 0,
            ticking: false,
            started: false,
            stopped: false,
        })
    }

    /// Current [ExecutionState] (§3.5).
    pub fn state(&self) -> ExecutionState {
        if self.stopped || !self.started {
            ExecutionState::Idle
        } else if self.interp.suspension.is_waiting() {
            ExecutionState::WaitingForResponse
        } else if self.interp.emitter.is_safe_mode() {
            ExecutionState::Error
        } else {
            match self.phase {
                Phase::Done => ExecutionState::Complete,
                _ => ExecutionState::Running,
            }
        }
    }

    /// Run to first suspension, completion, or error (§6.3), returning the
    /// commands emitted so far.
    pub fn start(&mut self) -> &[Command] {
        self.started = true;
        self.stopped = false;
        self.interp.emit(CommandPayload::VersionInfo { version: Some(VERSION.to_string()) });
        self.interp.emit(CommandPayload::ProgramStart {});
        self.run_top_level_declarations();
        self.interp.emit(CommandPayload::SetupStart {});
        self.drive(None);
        self.command_stream()
    }

    /// Advance after a response arrives (§4.9/§6.3). A no-op (besides
    /// returning the current stream) unless the engine is actually
    /// `WaitingForResponse`; re-entry-guarded so a host calling `tick()`
    /// from within a callback triggered by this same `tick()` can't recurse.
    pub fn tick(&mut self) -> &[Command] {
        if !self.ticking && self.interp.suspension.is_waiting() {
            self.ticking = true;
            if let Some((_value, cursor)) = self.interp.suspension.try_take_awaited() {
                if let Some(node) = self.interp.pending_resume_node.take() {
                    self.drive(Some((node, cursor.child_index + 1)));
                }
            }
            self.ticking = false;
        }
        self.command_stream()
    }

    /// Deliver an external-read result for `request_id` (§4.9).
    pub fn handle_response(&mut self, request_id: &str, value: Value) {
        self.interp.suspension.deliver(request_id, value);
    }

    /// Pre-seed a deterministic mock value for `pin`, overriding §4.10's
    /// `analogRead` formula for that pin only.
    pub fn set_analog_value(&mut self, pin: i32, value: i32) {
        self.interp.mock.set_analog_value(pin, value);
    }

    /// Pre-seed a deterministic mock value for `pin`, overriding §4.10's
    /// `digitalRead` formula for that pin only.
    pub fn set_digital_value(&mut self, pin: i32, value: i32) {
        self.interp.mock.set_digital_value(pin, value);
    }

    /// Reset to `Idle` (§6.3/§5's cancellation semantics). Does not discard
    /// a pending response or unwind cooperatively; a host that wants a
    /// clean slate should drop this `Engine` and `create` a fresh one.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.phase = Phase::Done;
    }

    /// The full ordered command stream emitted so far (§6.2/§6.3).
    pub fn command_stream(&self) -> &[Command] {
        self.interp.emitter.commands()
    }

    /// The command stream rendered as newline-delimited JSON (§6.2).
    pub fn command_stream_ndjson(&self) -> String {
        crate::command::to_ndjson(self.interp.emitter.commands())
    }

    /// Execute every top-level child of the program that isn't a function
    /// definition/declaration -- global variable declarations and type
    /// metadata (`struct`/`union`/`enum`/`typedef`) -- in source order,
    /// before `setup()` runs. Function bodies are never run here; only
    /// [Self::drive] runs `setup()`/`loop()`.
    fn run_top_level_declarations(&mut self) {
        let program = self.program.clone();
        for child in program.children() {
            if matches!(child.kind(), crate::ast::NodeKind::FunctionDefinition | crate::ast::NodeKind::FunctionDeclaration) {
                continue;
            }
            self.interp.exec_stmt(child);
        }
    }

    /// The orchestrator's phase loop (§4.5). `resume` is `Some((compound,
    /// child_index))` the first time through after a suspension -- the
    /// exact compound/index a suspended external-read call recorded -- and
    /// is consumed by whichever phase is current when `drive` is called;
    /// every later iteration starts that phase fresh.
    fn drive(&mut self, mut resume: Option<(Node, usize)>) {
        loop {
            match self.phase.clone() {
                Phase::Setup => {
                    let flow = match resume.take() {
                        Some((node, idx)) => self.interp.exec_compound_from(&node, idx),
                        None => {
                            self.interp.control.push(ControlScope::Setup);
                            self.setup_body.clone().map(|body| self.interp.exec_compound(&body)).unwrap_or(Flow::Normal)
                        }
                    };
                    if matches!(flow, Flow::Suspend) {
                        return;
                    }
                    self.interp.control.pop();
                    self.interp.emit(CommandPayload::SetupEnd {});
                    self.interp.emit(CommandPayload::LoopStart { message: Some("Starting loop() execution".to_string()), iteration: None });
                    self.phase = Phase::Loop { iteration: 1 };
                }
                Phase::Loop { iteration } => {
                    if self.loop_body.is_none() {
                        self.loop_iterations_run = 0;
                        self.finish_loop();
                        return;
                    }
                    if iteration > self.interp.options.max_loop_iterations {
                        self.finish_loop();
                        return;
                    }
                    let flow = match resume.take() {
                        Some((node, idx)) => self.interp.exec_compound_from(&node, idx),
                        None => {
                            self.interp.control.push(ControlScope::Loop);
                            self.interp.emit(CommandPayload::LoopStart { message: None, iteration: Some(iteration) });
                            self.interp.emit(CommandPayload::FunctionCall {
                                function: Some("loop".to_string()),
                                arguments: Some(Vec::new()),
                                message: None,
                                iteration: Some(iteration),
                                completed: None,
                                baud_rate: None,
                                data: None,
                                timeout: None,
                            });
                            self.loop_body.clone().map(|body| self.interp.exec_compound(&body)).unwrap_or(Flow::Normal)
                        }
                    };
                    match flow {
                        Flow::Suspend => return,
                        Flow::Terminate => {
                            self.interp.control.pop();
                            self.finish_loop();
                            return;
                        }
                        _ => {
                            self.interp.control.pop();
                            self.interp.emit(CommandPayload::FunctionCall {
                                function: Some("loop".to_string()),
                                arguments: Some(Vec::new()),
                                message: None,
                                iteration: Some(iteration),
                                completed: Some(true),
                                baud_rate: None,
                                data: None,
                                timeout: None,
                            });
                            self.loop_iterations_run = iteration;
                            self.phase = Phase::Loop { iteration: iteration + 1 };
                        }
                    }
                }
                Phase::Done => return,
            }
        }
    }

    /// Shared tail for both ways the main loop ends: the iteration cap
    /// reached naturally, or a nested loop's own limit terminating the
    /// whole program early (§4.5's loop-limit propagation policy). Invokes
    /// `serialEvent` once if the program defines it, then emits the fixed
    /// closing sequence.
    fn finish_loop(&mut self) {
        if let Some(serial_event) = self.interp.functions.get("serialEvent").cloned() {
            self.interp.invoke_serial_event(&serial_event);
        }
        let iterations = self.loop_iterations_run;
        self.interp.emit(CommandPayload::LoopEnd { iterations: Some(iterations), limit_reached: Some(true) });
        self.interp.emit(CommandPayload::ProgramEnd { message: Some(format!("Completed {} loop iterations (limit reached)", iterations)) });
        self.interp.emit(CommandPayload::ProgramEnd { message: Some("Program execution stopped".to_string()) });
        self.phase = Phase::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Node as AstNode, NodeKind, Payload};

    fn function(name: &str, ret: &str, body: AstNode) -> AstNode {
        AstNode::new(
            NodeKind::FunctionDefinition,
            Payload::None,
            vec![AstNode::leaf(NodeKind::Type, Payload::Str(ret.into())), AstNode::leaf(NodeKind::Declarator, Payload::Str(name.into())), body],
        )
    }

    fn compound(stmts: Vec<AstNode>) -> AstNode {
        AstNode::new(NodeKind::CompoundStatement, Payload::None, stmts)
    }

    fn call(name: &str, args: Vec<AstNode>) -> AstNode {
        let mut children = vec![AstNode::leaf(NodeKind::Identifier, Payload::Str(name.into()))];
        children.extend(args);
        AstNode::new(NodeKind::FunctionCall, Payload::None, children)
    }

    fn expr_stmt(expr: AstNode) -> AstNode {
        AstNode::new(NodeKind::ExpressionStatement, Payload::None, vec![expr])
    }

    fn int_lit(n: i64) -> AstNode {
        AstNode::leaf(NodeKind::NumberLiteral, Payload::Int(n))
    }

    fn program(children: Vec<AstNode>) -> AstNode {
        AstNode::new(NodeKind::Program, Payload::None, children)
    }

    /// Scenario 1 from §8: `pinMode`/`digitalWrite` in `setup()`, empty
    /// `loop()`, `maxLoopIterations = 0`.
    #[test]
    fn pin_mode_scenario_emits_expected_lifecycle_sequence() {
        let setup = compound(vec![
            expr_stmt(call("pinMode", vec![int_lit(13), AstNode::leaf(NodeKind::Constant, Payload::Str("OUTPUT".into()))])),
            expr_stmt(call("digitalWrite", vec![int_lit(13), AstNode::leaf(NodeKind::Constant, Payload::Str("HIGH".into()))])),
        ]);
        let loop_fn = compound(vec![]);
        let ast = program(vec![function("setup", "void", setup), function("loop", "void", loop_fn)]);
        let bytes = crate::ast::wire::encode(&ast);

        let mut engine = Engine::create(&bytes, EngineOptions::default().with_max_loop_iterations(0)).unwrap();
        engine.start();

        let tags: Vec<&str> = engine.command_stream().iter().map(Command::type_tag).collect();
        assert_eq!(
            tags,
            vec![
                "VERSION_INFO",
                "PROGRAM_START",
                "SETUP_START",
                "PIN_MODE",
                "DIGITAL_WRITE",
                "SETUP_END",
                "LOOP_START",
                "LOOP_END",
                "PROGRAM_END",
                "PROGRAM_END",
            ]
        );
        assert_eq!(engine.state(), ExecutionState::Complete);
    }

    #[test]
    fn stop_resets_state_to_idle_regardless_of_phase() {
        let ast = program(vec![function("setup", "void", compound(vec![])), function("loop", "void", compound(vec![]))]);
        let bytes = crate::ast::wire::encode(&ast);

        let mut engine = Engine::create(&bytes, EngineOptions::default()).unwrap();
        assert_eq!(engine.state(), ExecutionState::Idle);

        engine.start();
        assert_eq!(engine.state(), ExecutionState::Complete);

        engine.stop();
        assert_eq!(engine.state(), ExecutionState::Idle);
    }

    #[test]
    fn missing_loop_still_terminates_cleanly() {
        let setup = compound(vec![]);
        let ast = program(vec![function("setup", "void", setup)]);
        let bytes = crate::ast::wire::encode(&ast);

        let mut engine = Engine::create(&bytes, EngineOptions::default().with_max_loop_iterations(3)).unwrap();
        engine.start();
        assert_eq!(engine.state(), ExecutionState::Complete);
        let last_two: Vec<&str> = engine.command_stream().iter().rev().take(2).map(Command::type_tag).collect();
        assert_eq!(last_two, vec!["PROGRAM_END", "PROGRAM_END"]);

        // the cap is treated as reached immediately -- zero phantom
        // iterations, no per-iteration LOOP_START/FUNCTION_CALL pairs.
        let loop_calls = engine.command_stream().iter().filter(|c| c.to_json()["function"] == "loop").count();
        assert_eq!(loop_calls, 0);
        let loop_end = engine.command_stream().iter().find(|c| c.type_tag() == "LOOP_END").expect("LOOP_END emitted");
        assert_eq!(loop_end.to_json()["iterations"], 0);
        assert_eq!(loop_end.to_json()["limitReached"], true);
    }

    #[test]
    fn malformed_ast_buffer_is_rejected() {
        assert!(matches!(Engine::create(b"nope", EngineOptions::default()), Err(CreateError::BadMagic)));
    }
}
