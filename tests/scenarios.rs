//! End-to-end lifecycle scenarios driven only through the public
//! [Engine]/[EngineOptions] surface: build a small AST by hand (there is no
//! front-end in this crate -- the host always hands over an already-decoded
//! program), encode it through the wire format exactly as a real host would,
//! then assert on the resulting command stream. Mirrors the scenario-based
//! style of the teacher's own `tests/success.rs`.

use avr_sim_core::ast::{self, Node, NodeKind, Payload};
use avr_sim_core::{Command, Engine, EngineOptions};

fn ident(name: &str) -> Node {
    Node::leaf(NodeKind::Identifier, Payload::Str(name.into()))
}

/// Named built-ins (`HIGH`, `LOW`, `OUTPUT`, ...) are a distinct node kind
/// from a plain variable reference -- they resolve via the constant table,
/// not a scope lookup.
fn constant(name: &str) -> Node {
    Node::leaf(NodeKind::Constant, Payload::Str(name.into()))
}

fn int_lit(n: i64) -> Node {
    Node::leaf(NodeKind::NumberLiteral, Payload::Int(n))
}

fn str_lit(s: &str) -> Node {
    Node::leaf(NodeKind::StringLiteral, Payload::Str(s.into()))
}

fn ty(name: &str) -> Node {
    Node::leaf(NodeKind::Type, Payload::Str(name.into()))
}

fn declarator(name: &str) -> Node {
    Node::leaf(NodeKind::Declarator, Payload::Str(name.into()))
}

fn declarator_with_init(name: &str, init: Node) -> Node {
    Node::new(NodeKind::Declarator, Payload::Str(name.into()), vec![init])
}

fn var_decl(type_name: &str, declarators: Vec<Node>) -> Node {
    let mut children = vec![ty(type_name)];
    children.extend(declarators);
    Node::new(NodeKind::VarDeclaration, Payload::None, children)
}

fn binary(op: &str, lhs: Node, rhs: Node) -> Node {
    Node::new(NodeKind::BinaryOp, Payload::Str(op.into()), vec![lhs, rhs])
}

fn assign(op: &str, lhs: Node, rhs: Node) -> Node {
    Node::new(NodeKind::Assignment, Payload::Str(op.into()), vec![lhs, rhs])
}

fn postfix(op: &str, operand: Node) -> Node {
    Node::new(NodeKind::PostfixOp, Payload::Str(op.into()), vec![operand])
}

fn call(name: &str, args: Vec<Node>) -> Node {
    let mut children = vec![ident(name)];
    children.extend(args);
    Node::new(NodeKind::FunctionCall, Payload::None, children)
}

/// `object.method(args...)`, e.g. `Serial.println("hi")`.
fn member_call(object: &str, method: &str, args: Vec<Node>) -> Node {
    let callee = Node::new(NodeKind::MemberAccess, Payload::Str(method.into()), vec![ident(object)]);
    let mut children = vec![callee];
    children.extend(args);
    Node::new(NodeKind::FunctionCall, Payload::None, children)
}

fn expr_stmt(expr: Node) -> Node {
    Node::new(NodeKind::ExpressionStatement, Payload::None, vec![expr])
}

fn return_stmt(expr: Node) -> Node {
    Node::new(NodeKind::Return, Payload::None, vec![expr])
}

fn compound(stmts: Vec<Node>) -> Node {
    Node::new(NodeKind::CompoundStatement, Payload::None, stmts)
}

fn for_stmt(init: Node, cond: Node, incr: Node, body: Node) -> Node {
    Node::new(NodeKind::For, Payload::None, vec![init, cond, incr, body])
}

fn function(name: &str, ret: &str, params: Vec<Node>, body: Node) -> Node {
    let mut children = vec![ty(ret), declarator(name)];
    children.extend(params);
    children.push(body);
    Node::new(NodeKind::FunctionDefinition, Payload::None, children)
}

fn parameter(name: &str, type_name: &str) -> Node {
    Node::new(NodeKind::Parameter, Payload::None, vec![ty(type_name), declarator(name)])
}

fn program(children: Vec<Node>) -> Node {
    Node::new(NodeKind::Program, Payload::None, children)
}

fn tags(commands: &[Command]) -> Vec<&'static str> {
    commands.iter().map(Command::type_tag).collect()
}

fn engine_for(ast: &Node, options: EngineOptions) -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    let bytes = ast::wire::encode(ast);
    Engine::create(&bytes, options).expect("well-formed test program decodes")
}

/// Scenario 2 from §8: a global accumulator built up by a `for` loop inside
/// `setup()`. `maxLoopIterations` is large enough that the `for` loop
/// completes on its own before ever hitting the cap.
#[test]
fn for_loop_accumulates_into_global_variable() {
    let for_loop = for_stmt(
        var_decl("int", vec![declarator_with_init("i", int_lit(0))]),
        binary("<", ident("i"), int_lit(3)),
        postfix("++", ident("i")),
        expr_stmt(assign("+=", ident("a"), ident("i"))),
    );
    let setup = compound(vec![for_loop]);
    let ast = program(vec![
        var_decl("int", vec![declarator_with_init("a", int_lit(0))]),
        function("setup", "void", vec![], setup),
        function("loop", "void", vec![], compound(vec![])),
    ]);

    let mut engine = engine_for(&ast, EngineOptions::default().with_max_loop_iterations(3));
    engine.start();

    let stream = tags(engine.command_stream());
    assert!(stream.contains(&"FOR_LOOP"));
    assert!(stream.contains(&"VAR_SET"));
    // three iterations (i = 0, 1, 2) plus the initial declaration's VAR_SET
    let var_sets = engine.command_stream().iter().filter(|c| c.type_tag() == "VAR_SET").count();
    assert_eq!(var_sets, 1 /* int a = 0 */ + 1 /* for-loop's int i = 0 */ + 3 /* a += i, three times */);
}

/// Scenario 3 from §8: `analogRead` in synchronous mode (the default)
/// returns a deterministic mock value immediately rather than suspending,
/// but still emits the read-request command first.
#[test]
fn sync_mode_analog_read_resolves_without_suspending() {
    let setup = compound(vec![var_decl("int", vec![declarator_with_init("v", call("analogRead", vec![int_lit(14)]))])]);
    let ast = program(vec![function("setup", "void", vec![], setup), function("loop", "void", vec![], compound(vec![]))]);

    let mut engine = engine_for(&ast, EngineOptions::default().with_sync_mode(true).with_max_loop_iterations(0));
    engine.start();

    let stream = tags(engine.command_stream());
    assert!(stream.contains(&"ANALOG_READ_REQUEST"));
    assert_eq!(engine.state(), avr_sim_core::ExecutionState::Complete);

    let var_set = engine
        .command_stream()
        .iter()
        .find(|c| c.type_tag() == "VAR_SET")
        .expect("declaration of v emits VAR_SET");
    assert_eq!(var_set.to_json()["value"], 40); // (14*37+42) % 1024
}

/// Scenario 4 from §8: `Serial.begin`/`Serial.println` surface as plain
/// `FUNCTION_CALL` commands carrying a baud rate / display message
/// respectively, never a dedicated serial command shape.
#[test]
fn serial_begin_and_println_emit_function_calls() {
    let setup = compound(vec![expr_stmt(member_call("Serial", "begin", vec![int_lit(9600)]))]);
    let loop_fn = compound(vec![expr_stmt(member_call("Serial", "println", vec![str_lit("hello")]))]);
    let ast = program(vec![function("setup", "void", vec![], setup), function("loop", "void", vec![], loop_fn)]);

    let mut engine = engine_for(&ast, EngineOptions::default().with_max_loop_iterations(1));
    engine.start();

    let calls: Vec<_> = engine.command_stream().iter().filter(|c| c.type_tag() == "FUNCTION_CALL").collect();
    let begin = calls.iter().find(|c| c.to_json()["function"] == "Serial.begin").expect("Serial.begin call recorded");
    assert_eq!(begin.to_json()["baudRate"], 9600);

    let println = calls.iter().find(|c| c.to_json()["function"] == "Serial.println").expect("Serial.println call recorded");
    assert_eq!(println.to_json()["message"], "Serial.println(\"hello\")");
}

/// Scenario 5 from §8: an infinite `while (1)` inside `setup()` hits its own
/// iteration cap. Per §4.5's loop-limit propagation policy this only ends
/// the `while` loop itself -- the enclosing scope is `Setup`, not `Loop` --
/// so a statement after it in `setup()` still runs, and `loop()` still gets
/// its own, independent iteration budget afterward.
#[test]
fn infinite_while_in_setup_only_ends_that_loop() {
    let while_loop = Node::new(NodeKind::While, Payload::None, vec![int_lit(1), compound(vec![])]);
    let setup = compound(vec![while_loop, expr_stmt(call("pinMode", vec![int_lit(13), constant("OUTPUT")]))]);
    let ast = program(vec![function("setup", "void", vec![], setup), function("loop", "void", vec![], compound(vec![]))]);

    let mut engine = engine_for(&ast, EngineOptions::default().with_max_loop_iterations(2));
    engine.start();

    let stream = tags(engine.command_stream());
    assert!(stream.contains(&"LOOP_LIMIT_REACHED"));
    // the statement after the while loop still ran, and setup/loop both
    // completed normally afterward.
    assert!(stream.contains(&"PIN_MODE"));
    assert!(stream.contains(&"SETUP_END"));
    assert_eq!(stream.last(), Some(&"PROGRAM_END"));
    assert_eq!(stream[stream.len() - 2], "PROGRAM_END");
    assert_eq!(engine.state(), avr_sim_core::ExecutionState::Complete);
}

/// Scenario 6 from §8: a user-defined function called from `loop()`, whose
/// return value flows back into a variable assignment.
#[test]
fn user_function_call_returns_value_into_caller() {
    let add_one = function(
        "addOne",
        "int",
        vec![parameter("x", "int")],
        compound(vec![return_stmt(binary("+", ident("x"), int_lit(1)))]),
    );
    let loop_fn = compound(vec![var_decl("int", vec![declarator_with_init("result", call("addOne", vec![int_lit(41)]))])]);
    let ast = program(vec![add_one, function("setup", "void", vec![], compound(vec![])), function("loop", "void", vec![], loop_fn)]);

    let mut engine = engine_for(&ast, EngineOptions::default().with_max_loop_iterations(1));
    engine.start();

    let call_cmd = engine
        .command_stream()
        .iter()
        .find(|c| c.to_json()["function"] == "addOne")
        .expect("addOne call recorded");
    assert_eq!(call_cmd.to_json()["arguments"], serde_json::json!([41]));

    let result_set = engine
        .command_stream()
        .iter()
        .find(|c| c.type_tag() == "VAR_SET" && c.to_json()["variable"] == "result")
        .expect("result declaration emits VAR_SET");
    assert_eq!(result_set.to_json()["value"], 42);
    assert!(!tags(engine.command_stream()).contains(&"ERROR"));
}

/// Per §4.5, only `while` gets a dedicated `LOOP_LIMIT_REACHED` command when
/// its iteration cap is hit -- `for` and `do-while` emit their own normal
/// phase-end command instead. An infinite `for (;;)` inside `setup()` must
/// end with a `FOR_LOOP` end-phase command, never `LOOP_LIMIT_REACHED`.
#[test]
fn infinite_for_loop_ends_with_for_loop_command_not_limit_reached() {
    let for_loop = for_stmt(
        var_decl("int", vec![declarator_with_init("i", int_lit(0))]),
        int_lit(1),
        postfix("++", ident("i")),
        compound(vec![]),
    );
    let setup = compound(vec![for_loop, expr_stmt(call("pinMode", vec![int_lit(13), constant("OUTPUT")]))]);
    let ast = program(vec![function("setup", "void", vec![], setup), function("loop", "void", vec![], compound(vec![]))]);

    let mut engine = engine_for(&ast, EngineOptions::default().with_max_loop_iterations(2));
    engine.start();

    let stream = tags(engine.command_stream());
    assert!(!stream.contains(&"LOOP_LIMIT_REACHED"));
    let for_end = engine
        .command_stream()
        .iter()
        .find(|c| c.type_tag() == "FOR_LOOP" && c.to_json()["phase"] == "end")
        .expect("FOR_LOOP end-phase command emitted on cap hit");
    assert_eq!(for_end.to_json()["iterations"], 2);
    // the statement after the loop still ran, same propagation policy as while.
    assert!(stream.contains(&"PIN_MODE"));
    assert_eq!(engine.state(), avr_sim_core::ExecutionState::Complete);
}

/// Same policy for `do-while`: hitting the cap emits the normal `DO_WHILE_LOOP`
/// end-phase command, never `LOOP_LIMIT_REACHED`.
#[test]
fn infinite_do_while_loop_ends_with_do_while_loop_command_not_limit_reached() {
    let do_while_loop = Node::new(NodeKind::DoWhile, Payload::None, vec![compound(vec![]), int_lit(1)]);
    let setup = compound(vec![do_while_loop, expr_stmt(call("pinMode", vec![int_lit(13), constant("OUTPUT")]))]);
    let ast = program(vec![function("setup", "void", vec![], setup), function("loop", "void", vec![], compound(vec![]))]);

    let mut engine = engine_for(&ast, EngineOptions::default().with_max_loop_iterations(2));
    engine.start();

    let stream = tags(engine.command_stream());
    assert!(!stream.contains(&"LOOP_LIMIT_REACHED"));
    let do_while_end = engine
        .command_stream()
        .iter()
        .find(|c| c.type_tag() == "DO_WHILE_LOOP" && c.to_json()["phase"] == "end")
        .expect("DO_WHILE_LOOP end-phase command emitted on cap hit");
    assert_eq!(do_while_end.to_json()["iterations"], 2);
    assert!(stream.contains(&"PIN_MODE"));
    assert_eq!(engine.state(), avr_sim_core::ExecutionState::Complete);
}
