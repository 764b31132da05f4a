//! The in-memory AST node tree (§4.2). A plain tagged sum: a [NodeKind], an
//! optional scalar [Payload], and ordered children. Visitors (the expression
//! evaluator, statement executor) dispatch on `kind()` with an exhaustive
//! `match`, following the design note that prefers a tagged enum over a
//! trait-object/vtable-per-node hierarchy.

use super::kind::NodeKind;
use std::rc::Rc;

/// The scalar payload a node may carry alongside its children.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    None,
    Str(String),
    Int(i64),
    Float(f64),
    Char(char),
    Bool(bool),
}

impl Payload {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Payload::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Payload::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// One node of the decoded AST. Cheaply cloneable: the children vector is
/// shared via `Rc` so passing a node (or a child reference) around the
/// evaluator never deep-copies the subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    kind: NodeKind,
    payload: Payload,
    children: Rc<Vec<Node>>,
}

impl Node {
    pub fn new(kind: NodeKind, payload: Payload, children: Vec<Node>) -> Self {
        Self { kind, payload, children: Rc::new(children) }
    }

    pub fn leaf(kind: NodeKind, payload: Payload) -> Self {
        Self::new(kind, payload, Vec::new())
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.children.last()
    }

    /// `identifier` / `type` nodes: the string payload they carry.
    pub fn text(&self) -> &str {
        self.payload.as_str().unwrap_or("")
    }

    /// `declarator` nodes: the declared name (first child if it's an
    /// identifier-shaped leaf, else the node's own payload string).
    pub fn declarator_name(&self) -> &str {
        self.text()
    }

    /// `array-declarator` nodes: ordered dimension-size expressions (each a
    /// sub-expression node to be evaluated at declaration time), or empty
    /// for `int xs[] = {...}` where the size is inferred from the
    /// initializer.
    pub fn array_dimensions(&self) -> &[Node] {
        self.children()
    }

    /// `function-definition` nodes: `children = [return_type, declarator,
    /// param*, body]`.
    pub fn function_return_type(&self) -> Option<&Node> {
        self.child(0)
    }

    pub fn function_declarator(&self) -> Option<&Node> {
        self.child(1)
    }

    pub fn function_name(&self) -> &str {
        self.function_declarator().map(Node::declarator_name).unwrap_or("")
    }

    pub fn function_params(&self) -> &[Node] {
        let children = self.children();
        if children.len() < 3 {
            &[]
        } else {
            &children[2..children.len() - 1]
        }
    }

    pub fn function_body(&self) -> Option<&Node> {
        self.last_child()
    }

    /// `parameter` nodes: `children = [type, declarator, default?]`.
    pub fn parameter_type(&self) -> Option<&Node> {
        self.child(0)
    }

    pub fn parameter_declarator(&self) -> Option<&Node> {
        self.child(1)
    }

    pub fn parameter_default(&self) -> Option<&Node> {
        self.child(2)
    }

    /// `constant` nodes: the literal name (`HIGH`, `true`, ...).
    pub fn constant_name(&self) -> &str {
        self.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_params_excludes_return_type_declarator_and_body() {
        let f = Node::new(
            NodeKind::FunctionDefinition,
            Payload::None,
            vec![
                Node::leaf(NodeKind::Type, Payload::Str("int".into())),
                Node::leaf(NodeKind::Declarator, Payload::Str("f".into())),
                Node::leaf(NodeKind::Parameter, Payload::Str("x".into())),
                Node::leaf(NodeKind::Parameter, Payload::Str("y".into())),
                Node::leaf(NodeKind::CompoundStatement, Payload::None),
            ],
        );
        assert_eq!(f.function_params().len(), 2);
        assert_eq!(f.function_name(), "f");
    }

    #[test]
    fn function_params_empty_when_no_parameters() {
        let f = Node::new(
            NodeKind::FunctionDefinition,
            Payload::None,
            vec![
                Node::leaf(NodeKind::Type, Payload::Str("void".into())),
                Node::leaf(NodeKind::Declarator, Payload::Str("setup".into())),
                Node::leaf(NodeKind::CompoundStatement, Payload::None),
            ],
        );
        assert!(f.function_params().is_empty());
    }
}
