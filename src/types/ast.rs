use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::path::Path;
use std::sync::Arc;

use super::error::InvariantViolation;
use super::position::{Position, Relation};

/// Index of a node inside its [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Comparison operators inside `if` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "&&",
            Self::Or => "||",
        })
    }
}

/// The closed set of syntactic forms of a Data App.
///
/// Children are arena indices. Field order here is the order used by
/// traversal, structural equality, hashing and formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    DataApp {
        configuration: BTreeMap<String, String>,
        inputs: Vec<NodeId>,
        code: NodeId,
    },
    InputParameter {
        name: String,
        ty: NodeId,
        functions: Vec<NodeId>,
    },
    Block {
        statements: Vec<NodeId>,
    },
    ActivityCall {
        activity: NodeId,
        inputs: Vec<NodeId>,
        outputs: Vec<NodeId>,
    },
    IfStatement {
        conditions: Vec<NodeId>,
        branches: Vec<NodeId>,
        otherwise: Option<NodeId>,
    },
    Assignment {
        name: String,
        value: NodeId,
    },
    ReturnStatement {
        values: Vec<NodeId>,
    },
    TypeInstantiation {
        ty: NodeId,
        functions: Vec<NodeId>,
    },
    DefinitionFunction {
        name: String,
        arguments: Vec<NodeId>,
    },
    QualifiedName {
        qualifier: String,
        name: String,
    },
    VariableReference {
        name: String,
    },
    FieldAccess {
        target: NodeId,
        fields: Vec<String>,
    },
    MethodCall {
        method: String,
        arguments: Vec<NodeId>,
    },
    StringLiteral {
        value: String,
    },
    IntegerLiteral {
        value: i64,
    },
    FloatLiteral {
        value: f64,
    },
    BooleanLiteral {
        value: bool,
    },
    Comparison {
        left: NodeId,
        op: Comparator,
        right: NodeId,
    },
    Logical {
        left: NodeId,
        op: LogicalOp,
        right: NodeId,
    },
    Not {
        operand: NodeId,
    },
}

impl NodeKind {
    /// Variant name, as used in the structural string form.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataApp { .. } => "DataApp",
            Self::InputParameter { .. } => "InputParameter",
            Self::Block { .. } => "Block",
            Self::ActivityCall { .. } => "ActivityCall",
            Self::IfStatement { .. } => "IfStatement",
            Self::Assignment { .. } => "Assignment",
            Self::ReturnStatement { .. } => "ReturnStatement",
            Self::TypeInstantiation { .. } => "TypeInstantiation",
            Self::DefinitionFunction { .. } => "DefinitionFunction",
            Self::QualifiedName { .. } => "QualifiedName",
            Self::VariableReference { .. } => "VariableReference",
            Self::FieldAccess { .. } => "FieldAccess",
            Self::MethodCall { .. } => "MethodCall",
            Self::StringLiteral { .. } => "StringLiteral",
            Self::IntegerLiteral { .. } => "IntegerLiteral",
            Self::FloatLiteral { .. } => "FloatLiteral",
            Self::BooleanLiteral { .. } => "BooleanLiteral",
            Self::Comparison { .. } => "Comparison",
            Self::Logical { .. } => "Logical",
            Self::Not { .. } => "Not",
        }
    }

    /// Direct children in field order.
    #[must_use]
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Self::DataApp { inputs, code, .. } => {
                let mut out = inputs.clone();
                out.push(*code);
                out
            }
            Self::InputParameter { ty, functions, .. }
            | Self::TypeInstantiation { ty, functions } => {
                let mut out = vec![*ty];
                out.extend_from_slice(functions);
                out
            }
            Self::Block { statements } => statements.clone(),
            Self::ActivityCall {
                activity,
                inputs,
                outputs,
            } => {
                let mut out = vec![*activity];
                out.extend_from_slice(inputs);
                out.extend_from_slice(outputs);
                out
            }
            Self::IfStatement {
                conditions,
                branches,
                otherwise,
            } => {
                let mut out = conditions.clone();
                out.extend_from_slice(branches);
                out.extend(otherwise.iter().copied());
                out
            }
            Self::Assignment { value, .. } => vec![*value],
            Self::ReturnStatement { values } => values.clone(),
            Self::DefinitionFunction { arguments, .. } | Self::MethodCall { arguments, .. } => {
                arguments.clone()
            }
            Self::FieldAccess { target, .. } => vec![*target],
            Self::Comparison { left, right, .. } | Self::Logical { left, right, .. } => {
                vec![*left, *right]
            }
            Self::Not { operand } => vec![*operand],
            Self::QualifiedName { .. }
            | Self::VariableReference { .. }
            | Self::StringLiteral { .. }
            | Self::IntegerLiteral { .. }
            | Self::FloatLiteral { .. }
            | Self::BooleanLiteral { .. } => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Self::Block { .. }
                | Self::ActivityCall { .. }
                | Self::IfStatement { .. }
                | Self::Assignment { .. }
                | Self::ReturnStatement { .. }
        )
    }
}

/// One element of the arena.
#[derive(Debug, Clone)]
pub struct Node {
    file: Arc<str>,
    position: Position,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

/// Arena holding every node of one parse.
///
/// Nodes are appended children-first; pushing a node links its children's
/// `parent` back to it.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, file: &Arc<str>, position: Position, kind: NodeKind) -> NodeId {
        #[allow(clippy::cast_possible_truncation)] // arenas never approach u32::MAX nodes
        let id = NodeId(self.nodes.len() as u32);
        for child in kind.children() {
            if let Some(node) = self.nodes.get_mut(child.index()) {
                node.parent = Some(id);
            }
        }
        self.nodes.push(Node {
            file: Arc::clone(file),
            position,
            parent: None,
            kind,
        });
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Borrow a node together with its arena.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.get(id).map(|_| NodeRef { ast: self, id })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Verify parent links and child containment across the whole arena.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (index, node) in self.nodes.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let id = NodeId(index as u32);
            for child in node.kind.children() {
                let Some(child_node) = self.get(child) else {
                    return Err(InvariantViolation::DanglingChild { parent: id, child });
                };
                if child_node.parent != Some(id) {
                    return Err(InvariantViolation::ParentMismatch { node: child });
                }
                if !node.position.contains(&child_node.position) {
                    return Err(InvariantViolation::NotContained { parent: id, child });
                }
            }
            if let Some(parent) = node.parent {
                let owns = self
                    .get(parent)
                    .is_some_and(|p| p.kind.children().contains(&id));
                if !owns {
                    return Err(InvariantViolation::ParentMismatch { node: id });
                }
            }
        }
        Ok(())
    }
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

/// A node borrowed from its arena, exposing navigation and positional queries.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    pub(crate) ast: &'a Ast,
    pub(crate) id: NodeId,
}

impl<'a> NodeRef<'a> {
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn ast(&self) -> &'a Ast {
        self.ast
    }

    #[must_use]
    pub fn node(&self) -> &'a Node {
        &self.ast[self.id]
    }

    #[must_use]
    pub fn kind(&self) -> &'a NodeKind {
        &self.node().kind
    }

    #[must_use]
    pub fn file(&self) -> &'a str {
        &self.node().file
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.node().position
    }

    pub(crate) fn at(&self, id: NodeId) -> NodeRef<'a> {
        NodeRef { ast: self.ast, id }
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node().parent.map(|id| self.at(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let ast = self.ast;
        self.kind()
            .children()
            .into_iter()
            .map(move |id| NodeRef { ast, id })
    }

    /// Enclosing nodes, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        std::iter::successors(self.parent(), NodeRef::parent)
    }

    #[must_use]
    pub fn is_same_file(&self, other: &NodeRef<'_>) -> bool {
        Path::new(self.file()) == Path::new(other.file())
    }

    /// Relation between two nodes, or `None` when they live in different files.
    #[must_use]
    pub fn relation(&self, other: &NodeRef<'_>) -> Option<Relation> {
        self.is_same_file(other)
            .then(|| self.position().relation(&other.position()))
    }

    #[must_use]
    pub fn is_before(&self, other: &NodeRef<'_>) -> bool {
        self.is_same_file(other) && self.position().is_before(&other.position())
    }

    #[must_use]
    pub fn is_after(&self, other: &NodeRef<'_>) -> bool {
        self.is_same_file(other) && self.position().is_after(&other.position())
    }

    #[must_use]
    pub fn starts_before(&self, other: &NodeRef<'_>) -> bool {
        self.is_same_file(other) && self.position().starts_before(&other.position())
    }

    #[must_use]
    pub fn ends_after(&self, other: &NodeRef<'_>) -> bool {
        self.is_same_file(other) && self.position().ends_after(&other.position())
    }

    #[must_use]
    pub fn contains(&self, other: &NodeRef<'_>) -> bool {
        self.is_same_file(other) && self.position().contains(&other.position())
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", &self.kind().name())
            .field("position", &self.position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> Arc<str> {
        Arc::from(name)
    }

    fn pos(sl: u32, sc: u32, el: u32, ec: u32) -> Position {
        Position::from_coords(sl, sc, el, ec).unwrap()
    }

    fn small_block(ast: &mut Ast, f: &Arc<str>) -> NodeId {
        let name = ast.push(
            f,
            pos(2, 4, 2, 23),
            NodeKind::QualifiedName {
                qualifier: "core".into(),
                name: "PrintToConsole".into(),
            },
        );
        let arg = ast.push(
            f,
            pos(2, 24, 2, 29),
            NodeKind::StringLiteral { value: "hi".into() },
        );
        let call = ast.push(
            f,
            pos(2, 4, 2, 31),
            NodeKind::ActivityCall {
                activity: name,
                inputs: vec![arg],
                outputs: vec![],
            },
        );
        ast.push(
            f,
            pos(1, 0, 3, 1),
            NodeKind::Block {
                statements: vec![call],
            },
        )
    }

    #[test]
    fn push_links_parents() {
        let f = file("app.dapp");
        let mut ast = Ast::new();
        let block = small_block(&mut ast, &f);
        let block_ref = ast.node(block).unwrap();
        let call = block_ref.children().next().unwrap();
        assert_eq!(call.parent().map(|p| p.id()), Some(block));
        assert!(ast.check_invariants().is_ok());
        assert_eq!(call.children().count(), 2);
        let leaf = call.children().nth(1).unwrap();
        let chain: Vec<_> = leaf.ancestors().map(|n| n.kind().name()).collect();
        assert_eq!(chain, vec!["ActivityCall", "Block"]);
    }

    #[test]
    fn positional_queries_guard_files() {
        let mut ast = Ast::new();
        let a = ast.push(
            &file("a.dapp"),
            pos(1, 0, 1, 3),
            NodeKind::BooleanLiteral { value: true },
        );
        let b = ast.push(
            &file("b.dapp"),
            pos(2, 0, 2, 3),
            NodeKind::BooleanLiteral { value: false },
        );
        let (a, b) = (ast.node(a).unwrap(), ast.node(b).unwrap());
        assert!(!a.is_same_file(&b));
        assert!(!a.is_before(&b));
        assert!(!b.is_after(&a));
        assert!(!a.contains(&b));
        assert_eq!(a.relation(&b), None);
    }

    #[test]
    fn same_file_compares_paths() {
        let mut ast = Ast::new();
        let a = ast.push(
            &file("dir//app.dapp"),
            pos(1, 0, 1, 3),
            NodeKind::BooleanLiteral { value: true },
        );
        let b = ast.push(
            &file("dir/app.dapp"),
            pos(2, 0, 2, 3),
            NodeKind::BooleanLiteral { value: false },
        );
        let (a, b) = (ast.node(a).unwrap(), ast.node(b).unwrap());
        assert!(a.is_same_file(&b));
        assert!(a.is_before(&b));
        assert_eq!(b.relation(&a), Some(Relation::After));
    }

    #[test]
    fn invariant_check_flags_escaping_child() {
        let f = file("x");
        let mut ast = Ast::new();
        let leaf = ast.push(&f, pos(5, 0, 5, 2), NodeKind::IntegerLiteral { value: 1 });
        ast.push(
            &f,
            pos(1, 0, 2, 0),
            NodeKind::ReturnStatement { values: vec![leaf] },
        );
        assert!(matches!(
            ast.check_invariants(),
            Err(InvariantViolation::NotContained { .. })
        ));
    }

    #[test]
    fn children_follow_field_order() {
        let kind = NodeKind::IfStatement {
            conditions: vec![NodeId(0), NodeId(2)],
            branches: vec![NodeId(1), NodeId(3)],
            otherwise: Some(NodeId(4)),
        };
        assert_eq!(
            kind.children(),
            vec![NodeId(0), NodeId(2), NodeId(1), NodeId(3), NodeId(4)]
        );
        assert!(kind.is_statement());
    }
}
