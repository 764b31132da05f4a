//! The Statement Executor (§4.5): a visitor over statement/declaration
//! nodes. Returns [Flow] so callers (loops, the function invoker, the
//! top-level orchestrator) know why a statement list stopped early.

use crate::ast::{Node, NodeKind};
use crate::command::CommandPayload;
use crate::control::{ControlFrameGuard, ControlScope, StopReason};
use crate::error::EngineError;
use crate::interp::{Interpreter, TypeInfo, TypeKind};
use crate::scope::{ScopeGuard, Variable};
use crate::suspension::SuspensionCursor;
use crate::value::Value;

/// Why a statement (or statement list) stopped running before its natural
/// end, if at all.
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
    /// An external-read intrinsic suspended; unwind to the orchestrator.
    Suspend,
    /// A loop-iteration limit was hit while nested under `loop()`: unwind
    /// all the way to the orchestrator, which moves straight to program
    /// termination (§4.5's loop-limit propagation policy).
    Terminate,
}

/// How a C-style loop's `loop { ... }` driver in `exec_while`/`exec_do_while`/
/// `exec_for` stopped, before `finish_loop_exit` turns it into a [Flow].
enum LoopExit {
    Done,
    Limit,
    Propagate(Flow),
}

/// Which loop kind `finish_loop_exit` is closing out, since §4.5 only has
/// `while` emit a dedicated `LOOP_LIMIT_REACHED` command when the cap is
/// hit -- `for`/`do-while` emit their normal phase-end command either way.
enum LoopKind {
    While,
    ForOrDoWhile,
}

impl Interpreter {
    /// Run every statement in `compound`'s children in order, stopping on
    /// the first non-[Flow::Normal] result.
    pub fn exec_compound(&mut self, compound: &Node) -> Flow {
        self.exec_compound_from(compound, 0)
    }

    pub fn exec_compound_from(&mut self, compound: &Node, start: usize) -> Flow {
        for (i, child) in compound.children().iter().enumerate().skip(start) {
            match self.exec_stmt(child) {
                Flow::Normal => {}
                Flow::Suspend => {
                    if let Some(pending) = self.suspension.pending.as_mut() {
                        pending.cursor = SuspensionCursor { child_index: i };
                    }
                    self.pending_resume_node = Some(compound.clone());
                    return Flow::Suspend;
                }
                other => return other,
            }
        }
        Flow::Normal
    }

    pub fn exec_stmt(&mut self, node: &Node) -> Flow {
        match node.kind() {
            NodeKind::CompoundStatement => {
                self.scope.push();
                let flow = self.exec_compound(node);
                self.scope.pop();
                flow
            }
            NodeKind::ExpressionStatement => {
                if let Some(expr) = node.child(0) {
                    self.eval_expr(expr);
                }
                self.flow_after_possible_suspend()
            }
            NodeKind::Empty | NodeKind::Comment | NodeKind::Error => Flow::Normal,
            NodeKind::PreprocessorDirective => {
                self.report(EngineError::preprocessor("unexpected preprocessor directive"));
                Flow::Normal
            }
            NodeKind::If => self.exec_if(node),
            NodeKind::While => self.exec_while(node),
            NodeKind::DoWhile => self.exec_do_while(node),
            NodeKind::For => self.exec_for(node),
            NodeKind::RangeBasedFor => self.exec_range_for(node),
            NodeKind::Switch => self.exec_switch(node),
            NodeKind::Break => {
                self.emit(CommandPayload::BreakStatement {});
                Flow::Break
            }
            NodeKind::Continue => {
                self.emit(CommandPayload::ContinueStatement {});
                Flow::Continue
            }
            NodeKind::Return => {
                let value = node.child(0).map(|n| self.eval_expr(n)).unwrap_or(Value::Null);
                Flow::Return(value)
            }
            NodeKind::VarDeclaration => {
                self.exec_var_declaration(node);
                Flow::Normal
            }
            NodeKind::StructDeclaration => {
                self.exec_struct_declaration(node);
                Flow::Normal
            }
            NodeKind::UnionDeclaration => {
                self.exec_union_declaration(node);
                Flow::Normal
            }
            NodeKind::EnumType => {
                self.exec_enum_declaration(node);
                Flow::Normal
            }
            NodeKind::Typedef => {
                self.exec_typedef(node);
                Flow::Normal
            }
            NodeKind::Lambda => {
                self.exec_lambda(node);
                Flow::Normal
            }
            NodeKind::TemplateTypeParameter => {
                self.exec_template_type_param(node);
                Flow::Normal
            }
            NodeKind::FunctionDefinition | NodeKind::FunctionDeclaration => {
                // Registered during declaration collection; encountering one
                // mid-statement-stream (a nested/local function) is a no-op
                // beyond (re-)registering it.
                self.functions.insert(node.function_name().to_string(), node.clone());
                Flow::Normal
            }
            _ => Flow::Normal,
        }
    }

    /// After a statement that may itself have performed an external-read
    /// call (suspending), check whether suspension actually happened.
    fn flow_after_possible_suspend(&self) -> Flow {
        if self.suspension.is_waiting() {
            Flow::Suspend
        } else {
            Flow::Normal
        }
    }

    fn exec_if(&mut self, node: &Node) -> Flow {
        let cond_node = match node.child(0) {
            Some(n) => n,
            None => return Flow::Normal,
        };
        let cond = self.eval_expr(cond_node);
        let taken = cond.as_bool();
        self.emit(CommandPayload::IfStatement {
            condition: Some(cond.to_json()),
            condition_display: Some(cond.coerce_string()),
            branch: Some(if taken { "then".to_string() } else { "else".to_string() }),
        });
        if self.suspension.is_waiting() {
            return Flow::Suspend;
        }
        if taken {
            node.child(1).map(|n| self.exec_stmt(n)).unwrap_or(Flow::Normal)
        } else {
            node.child(2).map(|n| self.exec_stmt(n)).unwrap_or(Flow::Normal)
        }
    }

    fn exec_while(&mut self, node: &Node) -> Flow {
        let cond_node = match node.child(0) {
            Some(n) => n,
            None => return Flow::Normal,
        };
        let body = node.child(1);
        let limit = self.options.max_loop_iterations;
        self.emit(CommandPayload::WhileLoop { phase: Some("start".into()), iteration: None, iterations: None });
        self.control.push(ControlScope::WhileLoop);
        let mut iterations: u32 = 0;
        let exit = loop {
            if !self.eval_expr(cond_node).as_bool() {
                break LoopExit::Done;
            }
            if iterations >= limit {
                // re-evaluate once more per §4.5, then report the limit.
                let _ = self.eval_expr(cond_node);
                break LoopExit::Limit;
            }
            self.emit(CommandPayload::WhileLoop { phase: Some("iteration".into()), iteration: Some(iterations), iterations: None });
            if let Some(body) = body {
                match self.exec_stmt(body) {
                    Flow::Break => break LoopExit::Done,
                    Flow::Continue | Flow::Normal => {}
                    other => break LoopExit::Propagate(other),
                }
            }
            iterations += 1;
        };
        self.finish_loop_exit(exit, iterations, LoopKind::While, |iterations| {
            CommandPayload::WhileLoop { phase: Some("end".into()), iteration: None, iterations: Some(iterations) }
        }, "while loop exceeded maxLoopIterations")
    }

    fn exec_do_while(&mut self, node: &Node) -> Flow {
        let body = node.child(0);
        let cond_node = node.child(1);
        let limit = self.options.max_loop_iterations;
        self.emit(CommandPayload::DoWhileLoop { phase: Some("start".into()), iteration: None, iterations: None });
        self.control.push(ControlScope::DoWhileLoop);
        let mut iterations: u32 = 0;
        let exit = loop {
            if iterations >= limit {
                break LoopExit::Limit;
            }
            self.emit(CommandPayload::DoWhileLoop { phase: Some("iteration".into()), iteration: Some(iterations), iterations: None });
            if let Some(body) = body {
                match self.exec_stmt(body) {
                    Flow::Break => {
                        iterations += 1;
                        break LoopExit::Done;
                    }
                    Flow::Continue | Flow::Normal => {}
                    other => break LoopExit::Propagate(other),
                }
            }
            iterations += 1;
            let cond = cond_node.map(|n| self.eval_expr(n)).unwrap_or(Value::Bool(false));
            if !cond.as_bool() {
                break LoopExit::Done;
            }
        };
        self.finish_loop_exit(exit, iterations, LoopKind::ForOrDoWhile, |iterations| {
            CommandPayload::DoWhileLoop { phase: Some("end".into()), iteration: None, iterations: Some(iterations) }
        }, "do-while loop exceeded maxLoopIterations")
    }

    fn exec_for(&mut self, node: &Node) -> Flow {
        // children = [init, condition, increment, body]
        let init = node.child(0);
        let cond_node = node.child(1);
        let incr = node.child(2);
        let body = node.child(3);
        let limit = self.options.max_loop_iterations;

        self.scope.push();
        if let Some(init) = init {
            self.exec_stmt(init);
        }
        self.emit(CommandPayload::ForLoop { phase: Some("start".into()), iteration: None, iterations: None });
        self.control.push(ControlScope::ForLoop);
        let mut iterations: u32 = 0;
        let exit = loop {
            if let Some(cond_node) = cond_node {
                if !self.eval_expr(cond_node).as_bool() {
                    break LoopExit::Done;
                }
            }
            if iterations >= limit {
                break LoopExit::Limit;
            }
            self.emit(CommandPayload::ForLoop { phase: Some("iteration".into()), iteration: Some(iterations), iterations: None });
            if let Some(body) = body {
                match self.exec_stmt(body) {
                    Flow::Break => break LoopExit::Done,
                    Flow::Continue | Flow::Normal => {}
                    other => break LoopExit::Propagate(other),
                }
            }
            if let Some(incr) = incr {
                self.eval_expr(incr);
            }
            iterations += 1;
        };
        let result = self.finish_loop_exit(exit, iterations, LoopKind::ForOrDoWhile, |iterations| {
            CommandPayload::ForLoop { phase: Some("end".into()), iteration: None, iterations: Some(iterations) }
        }, "for loop exceeded maxLoopIterations");
        self.scope.pop();
        result
    }

    /// Shared tail for the three C-style loop kinds: emit the right
    /// terminal command, pop the control frame, and decide (per §4.5's
    /// loop-limit propagation policy) whether a limit hit should only end
    /// this loop or unwind the whole program.
    fn finish_loop_exit(
        &mut self,
        exit: LoopExit,
        iterations: u32,
        kind: LoopKind,
        end_payload: impl FnOnce(u32) -> CommandPayload,
        limit_message: &str,
    ) -> Flow {
        match exit {
            LoopExit::Done => {
                self.emit(end_payload(iterations));
                self.control.pop();
                Flow::Normal
            }
            LoopExit::Limit => {
                self.control.set_top_stop_reason(StopReason::IterationLimit);
                match kind {
                    LoopKind::While => {
                        self.emit(CommandPayload::LoopLimitReached { iterations: Some(iterations), message: Some(limit_message.to_string()) });
                    }
                    LoopKind::ForOrDoWhile => {
                        self.emit(end_payload(iterations));
                    }
                }
                let nested_under_loop = self.control.nested_under_loop();
                self.control.pop();
                if nested_under_loop { Flow::Terminate } else { Flow::Normal }
            }
            LoopExit::Propagate(flow) => {
                self.control.pop();
                flow
            }
        }
    }

    fn exec_range_for(&mut self, node: &Node) -> Flow {
        let declarator = match node.child(0) {
            Some(n) => n,
            None => return Flow::Normal,
        };
        let range_expr = match node.child(1) {
            Some(n) => n,
            None => return Flow::Normal,
        };
        let body = node.child(2);
        let var_name = declarator.declarator_name().to_string();
        let source = self.eval_expr(range_expr);
        let elements: Vec<Value> = match &source {
            Value::IntArray(a) => a.borrow().iter().map(|n| Value::Int(*n)).collect(),
            Value::DoubleArray(a) => a.borrow().iter().map(|n| Value::Double(*n)).collect(),
            Value::StringArray(a) => a.borrow().iter().map(|s| Value::string(s.clone())).collect(),
            Value::Str(s) => s.borrow().chars().map(|c| Value::Int(c as i32)).collect(),
            other => vec![other.clone()],
        };
        let capped: Vec<Value> = elements.into_iter().take(crate::consts::RANGE_FOR_SAFETY_CAP).collect();
        for element in capped {
            self.scope.push();
            self.scope.declare(&var_name, Variable::new(element, "auto"));
            let flow = body.map(|n| self.exec_stmt(n)).unwrap_or(Flow::Normal);
            self.scope.pop();
            match flow {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
                other => return other,
            }
        }
        Flow::Normal
    }

    fn exec_switch(&mut self, node: &Node) -> Flow {
        let discriminant_node = match node.child(0) {
            Some(n) => n,
            None => return Flow::Normal,
        };
        let discriminant = self.eval_expr(discriminant_node);
        self.emit(CommandPayload::SwitchStatement { discriminant: Some(discriminant.to_json()) });
        let mut matched = false;
        let mut guard = ControlFrameGuard::new(&mut self.control, ControlScope::Switch);
        let _ = &guard;
        for case in node.children().iter().skip(1) {
            let is_default = case.child(0).is_none();
            let label_value = case.child(0).map(|n| self.eval_expr(n));
            let should_execute = if matched {
                true
            } else if is_default {
                false
            } else {
                crate::value::values_equal(label_value.as_ref().unwrap_or(&Value::Null), &discriminant)
            };
            self.emit(CommandPayload::SwitchCase {
                value: label_value.map(|v| v.to_json()),
                should_execute: Some(should_execute || matched),
            });
            if should_execute {
                matched = true;
            }
            if matched {
                for stmt in case.children().iter().skip(1) {
                    match self.exec_stmt(stmt) {
                        Flow::Break => return Flow::Normal,
                        Flow::Normal => {}
                        other => return other,
                    }
                }
            }
        }
        drop(guard);
        // run default at the end if nothing matched and a default exists
        if !matched {
            for case in node.children().iter().skip(1) {
                if case.child(0).is_none() {
                    for stmt in case.children().iter().skip(1) {
                        match self.exec_stmt(stmt) {
                            Flow::Break => return Flow::Normal,
                            Flow::Normal => {}
                            other => return other,
                        }
                    }
                }
            }
        }
        Flow::Normal
    }

    fn exec_var_declaration(&mut self, node: &Node) {
        let type_node = node.child(0);
        let base_type = type_node.map(Node::text).unwrap_or("auto").to_string();
        for declarator in node.children().iter().skip(1) {
            self.declare_one(declarator, &base_type);
        }
    }

    fn declare_one(&mut self, declarator: &Node, base_type: &str) {
        let name = declarator.declarator_name().to_string();
        let is_extern = self.scope.has_in_parent(&name);
        match declarator.kind() {
            NodeKind::ArrayDeclarator => {
                let (is_const, bare_type) = split_const_qualifier(base_type);
                let dims: Vec<usize> = declarator
                    .array_dimensions()
                    .iter()
                    .map(|d| self.eval_expr(d).coerce_int().max(0) as usize)
                    .collect();
                let total: usize = dims.iter().product::<usize>().max(if dims.is_empty() { 0 } else { 1 });
                let element_size = match bare_type.as_str() {
                    "double" | "float" => 8,
                    "String" => 16,
                    _ => 4,
                };
                if !self.account_allocation(total * element_size) {
                    return;
                }
                let value = match bare_type.as_str() {
                    "double" | "float" => Value::double_array(vec![0.0; total]),
                    "String" => Value::string_array(vec![String::new(); total]),
                    _ => Value::int_array(vec![0; total]),
                };
                self.scope.declare(
                    &name,
                    Variable::new(value.clone(), format!("{}[]", bare_type)).with_const(is_const).with_global(self.scope.depth() == 1),
                );
                self.emit_declared_var_set(&name, &value, is_const, is_extern);
            }
            NodeKind::PointerDeclarator => {
                let (is_const, bare_type) = split_const_qualifier(base_type);
                let initializer = declarator.last_child().filter(|c| c.kind() != NodeKind::Declarator);
                let value = initializer.map(|n| self.eval_expr(n)).unwrap_or_else(Value::null_pointer);
                self.scope.declare(&name, Variable::new(value.clone(), format!("{}*", bare_type)).with_const(is_const));
                self.emit_declared_var_set(&name, &value, is_const, is_extern);
            }
            _ => {
                let initializer = declarator.last_child().filter(|c| c.kind() != NodeKind::Declarator);
                let raw = initializer.map(|n| self.eval_expr(n)).unwrap_or(Value::Null);
                let (is_const, bare_type) = split_const_qualifier(base_type);
                let converted = crate::value::convert_to_declared_type(&raw, &bare_type);
                self.scope.declare(&name, Variable::new(converted.clone(), bare_type).with_const(is_const).with_global(self.scope.depth() == 1));
                self.emit_declared_var_set(&name, &converted, is_const, is_extern);
            }
        }
    }

    fn emit_declared_var_set(&mut self, name: &str, value: &Value, is_const: bool, is_extern: bool) {
        let is_arduino_string = matches!(value, Value::Str(_));
        let payload_value = if is_arduino_string {
            serde_json::json!({ "value": value.coerce_string(), "type": "ArduinoString" })
        } else {
            value.to_json()
        };
        self.emit(CommandPayload::VarSet {
            variable: Some(name.to_string()),
            value: Some(payload_value),
            is_const: if is_const { Some(true) } else { None },
            is_extern: if is_extern { Some(true) } else { None },
        });
    }

    fn exec_struct_declaration(&mut self, node: &Node) {
        let name = node.text().to_string();
        let mut members = Vec::new();
        for member in node.children() {
            match member.kind() {
                NodeKind::StructMember => {
                    let member_type = member.child(0).map(Node::text).unwrap_or("auto").to_string();
                    let member_name = member.child(1).map(Node::declarator_name).unwrap_or("").to_string();
                    self.emit(CommandPayload::StructMember { name: Some(member_name.clone()), member_type: Some(member_type.clone()) });
                    members.push((member_name, member_type));
                }
                NodeKind::MultipleStructMembers => {
                    let member_type = member.child(0).map(Node::text).unwrap_or("auto").to_string();
                    let names: Vec<String> = member.children().iter().skip(1).map(|n| n.declarator_name().to_string()).collect();
                    self.emit(CommandPayload::MultipleStructMembers { names: Some(names.clone()), member_type: Some(member_type.clone()) });
                    for n in names {
                        members.push((n, member_type.clone()));
                    }
                }
                _ => {}
            }
        }
        self.types.insert(name, TypeInfo { kind: TypeKind::Struct, members });
    }

    fn exec_union_declaration(&mut self, node: &Node) {
        let name = node.text().to_string();
        self.emit(CommandPayload::UnionDefinition { name: Some(name.clone()) });
        self.emit(CommandPayload::UnionTypeRef { name: Some(name.clone()) });
        self.types.insert(name, TypeInfo { kind: TypeKind::Union, members: Vec::new() });
    }

    fn exec_enum_declaration(&mut self, node: &Node) {
        let name = node.text().to_string();
        let mut members = Vec::new();
        let mut next_value = 0i32;
        for member in node.children() {
            if member.kind() != NodeKind::EnumMember {
                continue;
            }
            let member_name = member.text().to_string();
            let value = match member.child(0) {
                Some(expr) => self.eval_expr(expr).coerce_int(),
                None => next_value,
            };
            next_value = value + 1;
            self.emit(CommandPayload::EnumMember { name: Some(member_name.clone()), value: Some(Value::Int(value).to_json()), enum_name: Some(name.clone()) });
            members.push((member_name, value.to_string()));
        }
        self.emit(CommandPayload::EnumTypeRef { name: Some(name.clone()) });
        self.types.insert(name, TypeInfo { kind: TypeKind::Enum, members });
    }

    fn exec_typedef(&mut self, node: &Node) {
        let underlying = node.child(0).map(Node::text).unwrap_or("auto").to_string();
        let alias = node.child(1).map(Node::declarator_name).unwrap_or("").to_string();
        if !alias.is_empty() {
            self.types.insert(alias, TypeInfo { kind: TypeKind::Typedef(underlying), members: Vec::new() });
        }
    }

    fn exec_lambda(&mut self, node: &Node) {
        let name = node.text().to_string();
        self.emit(CommandPayload::LambdaFunction { name: Some(name.clone()) });
        if !name.is_empty() {
            self.functions.insert(name, node.clone());
        }
    }

    fn exec_template_type_param(&mut self, node: &Node) {
        let variable = node.child(0).map(Node::declarator_name).unwrap_or("").to_string();
        let template_type = node.text().to_string();
        self.emit(CommandPayload::TemplateTypeParam { variable: Some(variable.clone()), template_type: Some(template_type.clone()) });
        if !variable.is_empty() {
            self.scope.declare(&variable, Variable::new(Value::Null, "auto").with_template_type(Some(template_type)));
        }
    }
}

/// Split a declared base-type string into its const-ness and the bare type
/// name used for conversions and array/pointer element sizing
/// (`"const int"` -> `(true, "int")`).
fn split_const_qualifier(base_type: &str) -> (bool, String) {
    let mut is_const = false;
    let rest: Vec<&str> = base_type
        .split_whitespace()
        .filter(|token| {
            if *token == "const" {
                is_const = true;
                false
            } else {
                true
            }
        })
        .collect();
    let bare = if rest.is_empty() { base_type.to_string() } else { rest.join(" ") };
    (is_const, bare)
}

#[cfg(test)]
mod const_qualifier_tests {
    use super::split_const_qualifier;

    #[test]
    fn strips_leading_const() {
        assert_eq!(split_const_qualifier("const int"), (true, "int".to_string()));
    }

    #[test]
    fn leaves_plain_type_untouched() {
        assert_eq!(split_const_qualifier("int"), (false, "int".to_string()));
    }

    #[test]
    fn handles_const_after_type() {
        assert_eq!(split_const_qualifier("int const"), (true, "int".to_string()));
    }
}
