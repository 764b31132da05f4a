//! The Function Invoker (§4.6): binds arguments to a user function's
//! parameters, runs its body in an isolated scope, converts the return value
//! to the declared return type, and enforces the recursion cap. Also the
//! single dispatch point ([Interpreter::dispatch_call]) that decides whether
//! a call name names a user function, an Arduino intrinsic, or neither.

use crate::ast::Node;
use crate::command::CommandPayload;
use crate::consts;
use crate::control::ControlScope;
use crate::error::EngineError;
use crate::exec::Flow;
use crate::interp::Interpreter;
use crate::scope::Variable;
use crate::value::{self, Value};

impl Interpreter {
    /// Resolve `name` (as produced by [Self::call_descriptor]) against user
    /// functions first, then the Arduino intrinsic surface, emitting
    /// `UnknownFunction` if neither recognizes it.
    pub fn dispatch_call(&mut self, name: &str, args: Vec<Value>) -> Value {
        if let Some(node) = self.functions.get(name).cloned() {
            return self.call_user_function(name, &node, args);
        }
        match crate::intrinsics::dispatch(self, name, args) {
            Some(value) => value,
            None => self.report(EngineError::unknown_function(name)),
        }
    }

    /// Invoke a user-defined function: bind parameters (evaluating omitted
    /// defaults in the *caller's* scope), isolate the callee from the
    /// caller's local scopes, run the body, and convert the result to the
    /// declared return type.
    pub fn call_user_function(&mut self, name: &str, node: &Node, args: Vec<Value>) -> Value {
        if self.control.user_function_depth() >= consts::MAX_RECURSION_DEPTH {
            return self.report(EngineError::stack_overflow());
        }
        let arguments_json: Vec<serde_json::Value> = args.iter().map(Value::to_json).collect();
        self.emit(CommandPayload::FunctionCall {
            function: Some(name.to_string()),
            arguments: Some(arguments_json),
            message: None,
            iteration: None,
            completed: None,
            baud_rate: None,
            data: None,
            timeout: None,
        });
        let return_type = node.function_return_type().map(Node::text).unwrap_or("void").to_string();
        let bound = match self.bind_parameters(name, node, args) {
            Some(bound) => bound,
            None => return Value::Null,
        };
        self.run_function_body(node, bound, &return_type)
    }

    /// `serialEvent` is invoked once by the orchestrator after the main loop
    /// exhausts its iteration cap (§4.5). It takes no parameters and uses a
    /// shorter `FUNCTION_CALL` shape that omits `arguments` entirely.
    pub fn invoke_serial_event(&mut self, node: &Node) -> Value {
        if self.control.user_function_depth() >= consts::MAX_RECURSION_DEPTH {
            return self.report(EngineError::stack_overflow());
        }
        self.emit(CommandPayload::FunctionCall {
            function: Some("serialEvent".to_string()),
            arguments: None,
            message: None,
            iteration: None,
            completed: None,
            baud_rate: None,
            data: None,
            timeout: None,
        });
        let return_type = node.function_return_type().map(Node::text).unwrap_or("void").to_string();
        self.run_function_body(node, Vec::new(), &return_type)
    }

    /// Evaluate each parameter's bound value in the *caller's* current scope
    /// (positional argument, or its default-value expression if the caller
    /// omitted it), before the callee's scope is isolated. Returns `None`
    /// (having already reported `TypeError`) if a required argument with no
    /// default is missing.
    fn bind_parameters(&mut self, name: &str, node: &Node, args: Vec<Value>) -> Option<Vec<(String, String, Value)>> {
        let params = node.function_params();
        let mut bound = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            let pname = param.parameter_declarator().map(Node::declarator_name).unwrap_or("").to_string();
            let ptype = param.parameter_type().map(Node::text).unwrap_or("auto").to_string();
            let value = if let Some(arg) = args.get(i) {
                arg.clone()
            } else if let Some(default) = param.parameter_default() {
                self.eval_expr(default)
            } else {
                self.report(EngineError::type_error(format!(
                    "missing required argument {} ('{}') to '{}'",
                    i, pname, name
                )));
                return None;
            };
            bound.push((pname, ptype, value));
        }
        Some(bound)
    }

    /// Isolate the callee from the caller's local scopes, bind already-
    /// evaluated parameters into a fresh frame, run the body to `return` or
    /// completion, then restore the caller's scope stack and control frame.
    fn run_function_body(&mut self, node: &Node, bound: Vec<(String, String, Value)>, return_type: &str) -> Value {
        let saved_frames = self.scope.isolate_for_call();
        self.scope.push();
        for (pname, ptype, value) in bound {
            let converted = value::convert_to_declared_type(&value, &ptype);
            self.scope.declare(&pname, Variable::new(converted, ptype));
        }
        self.control.push(ControlScope::UserFunction);
        self.call_depth += 1;
        let flow = node.function_body().map(|body| self.exec_compound(body)).unwrap_or(Flow::Normal);
        self.call_depth -= 1;
        self.control.pop();
        self.scope.pop();
        self.scope.restore_after_call(saved_frames);

        match flow {
            Flow::Return(v) if return_type == "void" => {
                let _ = v;
                Value::Null
            }
            Flow::Return(v) => value::convert_to_declared_type(&v, return_type),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeKind, Payload};
    use crate::config::EngineOptions;

    fn param(name: &str, ty: &str, default: Option<Node>) -> Node {
        let mut children = vec![
            Node::leaf(NodeKind::Type, Payload::Str(ty.into())),
            Node::leaf(NodeKind::Declarator, Payload::Str(name.into())),
        ];
        if let Some(d) = default {
            children.push(d);
        }
        Node::new(NodeKind::Parameter, Payload::None, children)
    }

    fn function(name: &str, ret: &str, params: Vec<Node>, body: Node) -> Node {
        let mut children = vec![
            Node::leaf(NodeKind::Type, Payload::Str(ret.into())),
            Node::leaf(NodeKind::Declarator, Payload::Str(name.into())),
        ];
        children.extend(params);
        children.push(body);
        Node::new(NodeKind::FunctionDefinition, Payload::None, children)
    }

    fn return_stmt(value: i64) -> Node {
        Node::new(
            NodeKind::Return,
            Payload::None,
            vec![Node::leaf(NodeKind::NumberLiteral, Payload::Int(value))],
        )
    }

    #[test]
    fn returns_converted_value() {
        let mut interp = Interpreter::new(EngineOptions::default());
        let f = function("double_it", "int", vec![param("x", "int", None)], Node::new(NodeKind::CompoundStatement, Payload::None, vec![return_stmt(6)]));
        let result = interp.call_user_function("double_it", &f, vec![Value::Int(3)]);
        assert_eq!(result.coerce_int(), 6);
    }

    #[test]
    fn missing_required_argument_reports_and_yields_null() {
        let mut interp = Interpreter::new(EngineOptions::default());
        let body = Node::new(NodeKind::CompoundStatement, Payload::None, vec![return_stmt(1)]);
        let f = function("needs_arg", "int", vec![param("x", "int", None)], body);
        let result = interp.call_user_function("needs_arg", &f, vec![]);
        assert!(matches!(result, Value::Null));
        assert_eq!(interp.emitter.stats().errors, 1);
    }

    #[test]
    fn default_value_used_when_argument_omitted() {
        let mut interp = Interpreter::new(EngineOptions::default());
        let default = Node::leaf(NodeKind::NumberLiteral, Payload::Int(9));
        let body = Node::new(NodeKind::CompoundStatement, Payload::None, vec![return_stmt(0)]);
        let f = function("with_default", "int", vec![param("x", "int", Some(default))], body);
        let result = interp.call_user_function("with_default", &f, vec![]);
        assert_eq!(result.coerce_int(), 0);
        assert_eq!(interp.emitter.stats().errors, 0);
    }

    #[test]
    fn recursion_cap_emits_stack_overflow() {
        let mut interp = Interpreter::new(EngineOptions::default());
        for _ in 0..consts::MAX_RECURSION_DEPTH {
            interp.control.push(ControlScope::UserFunction);
        }
        let body = Node::new(NodeKind::CompoundStatement, Payload::None, vec![]);
        let f = function("deep", "void", vec![], body);
        let result = interp.call_user_function("deep", &f, vec![]);
        assert!(matches!(result, Value::Null));
        assert_eq!(interp.emitter.stats().errors, 1);
    }
}
