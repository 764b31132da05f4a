//! The Scope Manager (§3.2/§3.3/§4.3): a stack of named-binding maps with
//! parent-ward lookup, const/reference/static semantics, and the shadowing
//! check used by `isExtern` on `VAR_SET`.

use crate::value::{Value, ValueCell};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A single user variable binding (§3.2).
#[derive(Clone)]
pub struct Variable {
    cell: ValueCell,
    pub type_name: String,
    pub is_const: bool,
    pub is_reference: bool,
    pub is_static: bool,
    pub is_global: bool,
    pub template_type: Option<String>,
}

impl Variable {
    pub fn new(value: Value, type_name: impl Into<String>) -> Self {
        Self {
            cell: Rc::new(RefCell::new(value)),
            type_name: type_name.into(),
            is_const: false,
            is_reference: false,
            is_static: false,
            is_global: false,
            template_type: None,
        }
    }

    /// Create a reference variable aliasing another variable's storage cell;
    /// writes through either binding are visible through both.
    pub fn new_reference(referent: &Variable, type_name: impl Into<String>) -> Self {
        Self {
            cell: Rc::clone(&referent.cell),
            type_name: type_name.into(),
            is_const: referent.is_const,
            is_reference: true,
            is_static: false,
            is_global: false,
            template_type: referent.template_type.clone(),
        }
    }

    pub fn with_const(mut self, is_const: bool) -> Self {
        self.is_const = is_const;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_global(mut self, is_global: bool) -> Self {
        self.is_global = is_global;
        self
    }

    pub fn with_template_type(mut self, template_type: Option<String>) -> Self {
        self.template_type = template_type;
        self
    }

    pub fn get(&self) -> Value {
        self.cell.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.cell.borrow_mut() = value;
    }

    /// A `Weak` handle into this variable's storage, used by unary `&` to
    /// build a [Value::Pointer].
    pub fn weak_cell(&self) -> std::rc::Weak<RefCell<Value>> {
        Rc::downgrade(&self.cell)
    }

    pub fn cell(&self) -> &ValueCell {
        &self.cell
    }
}

/// One level of the scope stack: a flat name -> Variable map.
#[derive(Default)]
pub(crate) struct ScopeFrame {
    bindings: HashMap<String, Variable>,
}

/// The full stack of lexical scopes (§3.3). The bottom frame (index 0) is
/// the root/global scope, seeded with Arduino constants before any user
/// code runs.
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { frames: vec![ScopeFrame::default()] }
    }

    pub fn push(&mut self) {
        self.frames.push(ScopeFrame::default());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "popped the root scope");
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Declare `name` in the *current* (innermost) scope. Returns `false` if
    /// the current scope already binds that name (the caller is expected to
    /// turn that into a diagnostic; the Scope Manager itself has no error
    /// channel).
    pub fn declare(&mut self, name: &str, variable: Variable) -> bool {
        let frame = self.frames.last_mut().expect("at least one scope frame");
        if frame.bindings.contains_key(name) {
            false
        } else {
            frame.bindings.insert(name.to_string(), variable);
            true
        }
    }

    /// Parent-ward lookup.
    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.frames.iter().rev().find_map(|frame| frame.bindings.get(name))
    }

    /// `true` iff `name` is bound in a scope strictly enclosing the current
    /// one (used to flag `isExtern` on a shadowing declaration).
    pub fn has_in_parent(&self, name: &str) -> bool {
        if self.frames.len() < 2 {
            return false;
        }
        self.frames[..self.frames.len() - 1].iter().rev().any(|frame| frame.bindings.contains_key(name))
    }

    /// `true` iff `name` is already bound in the current (innermost) scope.
    pub fn declared_in_current(&self, name: &str) -> bool {
        self.frames.last().map_or(false, |frame| frame.bindings.contains_key(name))
    }

    /// Assign through an existing binding, respecting reference aliasing.
    /// Returns `Err(())` if `name` is unbound (caller emits
    /// `UndefinedVariable`) so the const check stays the caller's job (it
    /// needs access to the variable to report `isConst` details anyway).
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), ()> {
        match self.lookup(name) {
            Some(var) => {
                var.set(value);
                Ok(())
            }
            None => Err(()),
        }
    }

    /// Detach every frame above the root (global) scope, leaving just the
    /// root frame behind, and return what was detached. A user-function call
    /// uses this so the callee sees only the global scope plus its own
    /// freshly pushed frame — C/C++ functions are lexically scoped to file
    /// scope, not dynamically scoped to whatever blocks the caller happened
    /// to be nested in (§4.6's "snapshots and restores the current scope's
    /// contents").
    pub fn isolate_for_call(&mut self) -> Vec<ScopeFrame> {
        self.frames.split_off(1)
    }

    /// Inverse of [Self::isolate_for_call]: drop everything pushed during the
    /// call (the callee's own frame(s) should already have been popped by the
    /// caller) and restore the caller's pre-call frames above the root.
    pub fn restore_after_call(&mut self, saved: Vec<ScopeFrame>) {
        self.frames.truncate(1);
        self.frames.extend(saved);
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that pushes a scope on construction and pops it on drop,
/// regardless of how the enclosing block is exited (normal, `break`,
/// `continue`, `return`, or an error return) -- see the design note on RAII
/// guards.
pub struct ScopeGuard<'a> {
    stack: &'a mut ScopeStack,
}

impl<'a> ScopeGuard<'a> {
    pub fn new(stack: &'a mut ScopeStack) -> Self {
        stack.push();
        Self { stack }
    }

    pub fn stack(&mut self) -> &mut ScopeStack {
        self.stack
    }
}

impl<'a> Drop for ScopeGuard<'a> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parent_scopes() {
        let mut stack = ScopeStack::new();
        stack.declare("x", Variable::new(Value::Int(1), "int"));
        stack.push();
        assert_eq!(stack.lookup("x").unwrap().get().coerce_int(), 1);
        stack.pop();
    }

    #[test]
    fn declare_rejects_duplicate_in_same_scope() {
        let mut stack = ScopeStack::new();
        assert!(stack.declare("x", Variable::new(Value::Int(1), "int")));
        assert!(!stack.declare("x", Variable::new(Value::Int(2), "int")));
    }

    #[test]
    fn has_in_parent_detects_shadowing() {
        let mut stack = ScopeStack::new();
        stack.declare("x", Variable::new(Value::Int(1), "int"));
        stack.push();
        assert!(stack.has_in_parent("x"));
        stack.declare("x", Variable::new(Value::Int(2), "int"));
        assert!(!stack.declared_in_current("y"));
        assert!(stack.declared_in_current("x"));
        stack.pop();
    }

    #[test]
    fn reference_variable_aliases_writes() {
        let mut stack = ScopeStack::new();
        stack.declare("x", Variable::new(Value::Int(1), "int"));
        let reference = Variable::new_reference(stack.lookup("x").unwrap(), "int");
        stack.push();
        stack.declare("r", reference);
        stack.lookup("r").unwrap().set(Value::Int(42));
        stack.pop();
        assert_eq!(stack.lookup("x").unwrap().get().coerce_int(), 42);
    }

    #[test]
    fn scope_guard_pops_on_drop() {
        let mut stack = ScopeStack::new();
        {
            let mut guard = ScopeGuard::new(&mut stack);
            guard.stack().declare("x", Variable::new(Value::Int(1), "int"));
            assert_eq!(guard.stack().depth(), 2);
        }
        assert_eq!(stack.depth(), 1);
        assert!(stack.lookup("x").is_none());
    }
}
