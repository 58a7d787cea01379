//! Structural operations over AST nodes: traversal, equality, hashing and
//! the textual form.
//!
//! Every variant enumerates its own fields explicitly. `parent` never takes
//! part in any of these operations.

use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::types::{NodeId, NodeKind, NodeRef};

const MIX: u64 = 31;

/// Folds field hashes in a fixed order: `h = h * 31 + field`.
struct Mixer(u64);

impl Mixer {
    fn new(variant: &str) -> Self {
        let mut mixer = Self(0);
        mixer.field(variant);
        mixer
    }

    fn fold(&mut self, value: u64) {
        self.0 = self.0.wrapping_mul(MIX).wrapping_add(value);
    }

    fn field<T: Hash + ?Sized>(&mut self, value: &T) {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        self.fold(hasher.finish());
    }

    fn child(&mut self, node: NodeRef<'_>) {
        self.fold(node.structural_hash());
    }

    fn children(&mut self, owner: &NodeRef<'_>, ids: &[NodeId]) {
        self.field(&ids.len());
        for id in ids {
            self.child(owner.at(*id));
        }
    }
}

impl<'a> NodeRef<'a> {
    /// Depth-first pre-order visit of this node and all its descendants.
    pub fn traverse<F>(&self, mut visit: F)
    where
        F: FnMut(NodeRef<'a>),
    {
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            let node = self.at(id);
            visit(node);
            stack.extend(node.kind().children().into_iter().rev());
        }
    }

    /// Like [`traverse`](Self::traverse), but only visits nodes whose kind
    /// satisfies `predicate`.
    pub fn traverse_where<P, F>(&self, predicate: P, mut visit: F)
    where
        P: Fn(&NodeKind) -> bool,
        F: FnMut(NodeRef<'a>),
    {
        self.traverse(|node| {
            if predicate(node.kind()) {
                visit(node);
            }
        });
    }

    /// Collect all descendants (including this node) matching `predicate`.
    #[must_use]
    pub fn find_all<P>(&self, predicate: P) -> Vec<NodeRef<'a>>
    where
        P: Fn(&NodeKind) -> bool,
    {
        let mut found = Vec::new();
        self.traverse_where(predicate, |n| found.push(n));
        found
    }

    /// Structural equality. Nodes may live in different arenas.
    #[must_use]
    pub fn structural_eq(&self, other: &NodeRef<'_>) -> bool {
        let (a, b) = (self.node(), other.node());
        if !self.is_same_file(other) || a.position() != b.position() {
            return false;
        }

        use NodeKind as K;
        match (a.kind(), b.kind()) {
            (
                K::DataApp {
                    configuration: c1,
                    inputs: i1,
                    code: b1,
                },
                K::DataApp {
                    configuration: c2,
                    inputs: i2,
                    code: b2,
                },
            ) => c1 == c2 && self.eq_all(i1, other, i2) && self.eq_one(*b1, other, *b2),
            (
                K::InputParameter {
                    name: n1,
                    ty: t1,
                    functions: f1,
                },
                K::InputParameter {
                    name: n2,
                    ty: t2,
                    functions: f2,
                },
            ) => n1 == n2 && self.eq_one(*t1, other, *t2) && self.eq_all(f1, other, f2),
            (K::Block { statements: s1 }, K::Block { statements: s2 }) => {
                self.eq_all(s1, other, s2)
            }
            (
                K::ActivityCall {
                    activity: a1,
                    inputs: i1,
                    outputs: o1,
                },
                K::ActivityCall {
                    activity: a2,
                    inputs: i2,
                    outputs: o2,
                },
            ) => {
                self.eq_one(*a1, other, *a2)
                    && self.eq_all(i1, other, i2)
                    && self.eq_all(o1, other, o2)
            }
            (
                K::IfStatement {
                    conditions: c1,
                    branches: b1,
                    otherwise: e1,
                },
                K::IfStatement {
                    conditions: c2,
                    branches: b2,
                    otherwise: e2,
                },
            ) => {
                self.eq_all(c1, other, c2)
                    && self.eq_all(b1, other, b2)
                    && match (e1, e2) {
                        (Some(x), Some(y)) => self.eq_one(*x, other, *y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (K::Assignment { name: n1, value: v1 }, K::Assignment { name: n2, value: v2 }) => {
                n1 == n2 && self.eq_one(*v1, other, *v2)
            }
            (K::ReturnStatement { values: v1 }, K::ReturnStatement { values: v2 }) => {
                self.eq_all(v1, other, v2)
            }
            (
                K::TypeInstantiation {
                    ty: t1,
                    functions: f1,
                },
                K::TypeInstantiation {
                    ty: t2,
                    functions: f2,
                },
            ) => self.eq_one(*t1, other, *t2) && self.eq_all(f1, other, f2),
            (
                K::DefinitionFunction {
                    name: n1,
                    arguments: a1,
                },
                K::DefinitionFunction {
                    name: n2,
                    arguments: a2,
                },
            )
            | (
                K::MethodCall {
                    method: n1,
                    arguments: a1,
                },
                K::MethodCall {
                    method: n2,
                    arguments: a2,
                },
            ) => n1 == n2 && self.eq_all(a1, other, a2),
            (
                K::QualifiedName {
                    qualifier: q1,
                    name: n1,
                },
                K::QualifiedName {
                    qualifier: q2,
                    name: n2,
                },
            ) => q1 == q2 && n1 == n2,
            (K::VariableReference { name: n1 }, K::VariableReference { name: n2 }) => n1 == n2,
            (
                K::FieldAccess {
                    target: t1,
                    fields: f1,
                },
                K::FieldAccess {
                    target: t2,
                    fields: f2,
                },
            ) => f1 == f2 && self.eq_one(*t1, other, *t2),
            (K::StringLiteral { value: v1 }, K::StringLiteral { value: v2 }) => v1 == v2,
            (K::IntegerLiteral { value: v1 }, K::IntegerLiteral { value: v2 }) => v1 == v2,
            (K::FloatLiteral { value: v1 }, K::FloatLiteral { value: v2 }) => {
                v1.to_bits() == v2.to_bits()
            }
            (K::BooleanLiteral { value: v1 }, K::BooleanLiteral { value: v2 }) => v1 == v2,
            (
                K::Comparison {
                    left: l1,
                    op: o1,
                    right: r1,
                },
                K::Comparison {
                    left: l2,
                    op: o2,
                    right: r2,
                },
            ) => o1 == o2 && self.eq_one(*l1, other, *l2) && self.eq_one(*r1, other, *r2),
            (
                K::Logical {
                    left: l1,
                    op: o1,
                    right: r1,
                },
                K::Logical {
                    left: l2,
                    op: o2,
                    right: r2,
                },
            ) => o1 == o2 && self.eq_one(*l1, other, *l2) && self.eq_one(*r1, other, *r2),
            (K::Not { operand: x }, K::Not { operand: y }) => self.eq_one(*x, other, *y),
            _ => false,
        }
    }

    fn eq_one(&self, mine: NodeId, other: &NodeRef<'_>, theirs: NodeId) -> bool {
        self.at(mine).structural_eq(&other.at(theirs))
    }

    fn eq_all(&self, mine: &[NodeId], other: &NodeRef<'_>, theirs: &[NodeId]) -> bool {
        mine.len() == theirs.len()
            && mine
                .iter()
                .zip(theirs)
                .all(|(a, b)| self.eq_one(*a, other, *b))
    }

    /// Hash consistent with [`structural_eq`](Self::structural_eq).
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        let node = self.node();
        let mut h = Mixer::new(node.kind().name());
        h.field(Path::new(node.file()));
        h.field(&node.position());

        use NodeKind as K;
        match node.kind() {
            K::DataApp {
                configuration,
                inputs,
                code,
            } => {
                h.field(configuration);
                h.children(self, inputs);
                h.child(self.at(*code));
            }
            K::InputParameter {
                name,
                ty,
                functions,
            } => {
                h.field(name);
                h.child(self.at(*ty));
                h.children(self, functions);
            }
            K::Block { statements } => h.children(self, statements),
            K::ActivityCall {
                activity,
                inputs,
                outputs,
            } => {
                h.child(self.at(*activity));
                h.children(self, inputs);
                h.children(self, outputs);
            }
            K::IfStatement {
                conditions,
                branches,
                otherwise,
            } => {
                h.children(self, conditions);
                h.children(self, branches);
                match otherwise {
                    Some(id) => h.child(self.at(*id)),
                    None => h.field(&0u8),
                }
            }
            K::Assignment { name, value } => {
                h.field(name);
                h.child(self.at(*value));
            }
            K::ReturnStatement { values } => h.children(self, values),
            K::TypeInstantiation { ty, functions } => {
                h.child(self.at(*ty));
                h.children(self, functions);
            }
            K::DefinitionFunction { name, arguments } => {
                h.field(name);
                h.children(self, arguments);
            }
            K::MethodCall { method, arguments } => {
                h.field(method);
                h.children(self, arguments);
            }
            K::QualifiedName { qualifier, name } => {
                h.field(qualifier);
                h.field(name);
            }
            K::VariableReference { name } => h.field(name),
            K::FieldAccess { target, fields } => {
                h.child(self.at(*target));
                h.field(fields);
            }
            K::StringLiteral { value } => h.field(value),
            K::IntegerLiteral { value } => h.field(value),
            K::FloatLiteral { value } => h.field(&value.to_bits()),
            K::BooleanLiteral { value } => h.field(value),
            K::Comparison { left, op, right } => {
                h.child(self.at(*left));
                h.field(op);
                h.child(self.at(*right));
            }
            K::Logical { left, op, right } => {
                h.child(self.at(*left));
                h.field(op);
                h.child(self.at(*right));
            }
            K::Not { operand } => h.child(self.at(*operand)),
        }
        h.0
    }

    /// `Variant(field=value, ...)`, recursing into children.
    #[must_use]
    pub fn structural_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_structural(&mut out);
        out
    }

    fn write_structural(&self, out: &mut String) -> fmt::Result {
        let node = self.node();
        write!(
            out,
            "{}(file={}, position={}",
            node.kind().name(),
            node.file(),
            node.position()
        )?;

        use NodeKind as K;
        match node.kind() {
            K::DataApp {
                configuration,
                inputs,
                code,
            } => {
                out.push_str(", configuration={");
                for (i, (k, v)) in configuration.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write!(out, "{k}={v}")?;
                }
                out.push('}');
                self.write_list(out, "inputs", inputs)?;
                self.write_one(out, "code", *code)?;
            }
            K::InputParameter {
                name,
                ty,
                functions,
            } => {
                write!(out, ", name={name}")?;
                self.write_one(out, "type", *ty)?;
                self.write_list(out, "functions", functions)?;
            }
            K::Block { statements } => self.write_list(out, "statements", statements)?,
            K::ActivityCall {
                activity,
                inputs,
                outputs,
            } => {
                self.write_one(out, "activity", *activity)?;
                self.write_list(out, "inputs", inputs)?;
                self.write_list(out, "outputs", outputs)?;
            }
            K::IfStatement {
                conditions,
                branches,
                otherwise,
            } => {
                self.write_list(out, "conditions", conditions)?;
                self.write_list(out, "branches", branches)?;
                match otherwise {
                    Some(id) => self.write_one(out, "otherwise", *id)?,
                    None => out.push_str(", otherwise=null"),
                }
            }
            K::Assignment { name, value } => {
                write!(out, ", name={name}")?;
                self.write_one(out, "value", *value)?;
            }
            K::ReturnStatement { values } => self.write_list(out, "values", values)?,
            K::TypeInstantiation { ty, functions } => {
                self.write_one(out, "type", *ty)?;
                self.write_list(out, "functions", functions)?;
            }
            K::DefinitionFunction { name, arguments } => {
                write!(out, ", name={name}")?;
                self.write_list(out, "arguments", arguments)?;
            }
            K::MethodCall { method, arguments } => {
                write!(out, ", method={method}")?;
                self.write_list(out, "arguments", arguments)?;
            }
            K::QualifiedName { qualifier, name } => {
                write!(out, ", qualifier={qualifier}, name={name}")?;
            }
            K::VariableReference { name } => write!(out, ", name={name}")?,
            K::FieldAccess { target, fields } => {
                self.write_one(out, "target", *target)?;
                write!(out, ", fields=[{}]", fields.join(", "))?;
            }
            K::StringLiteral { value } => write!(out, ", value={value:?}")?,
            K::IntegerLiteral { value } => write!(out, ", value={value}")?,
            K::FloatLiteral { value } => write!(out, ", value={value}")?,
            K::BooleanLiteral { value } => write!(out, ", value={value}")?,
            K::Comparison { left, op, right } => {
                self.write_one(out, "left", *left)?;
                write!(out, ", op={op}")?;
                self.write_one(out, "right", *right)?;
            }
            K::Logical { left, op, right } => {
                self.write_one(out, "left", *left)?;
                write!(out, ", op={op}")?;
                self.write_one(out, "right", *right)?;
            }
            K::Not { operand } => self.write_one(out, "operand", *operand)?,
        }
        out.push(')');
        Ok(())
    }

    fn write_one(&self, out: &mut String, label: &str, id: NodeId) -> fmt::Result {
        write!(out, ", {label}=")?;
        self.at(id).write_structural(out)
    }

    fn write_list(&self, out: &mut String, label: &str, ids: &[NodeId]) -> fmt::Result {
        write!(out, ", {label}=[")?;
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.at(*id).write_structural(out)?;
        }
        out.push(']');
        Ok(())
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.structural_string())
    }
}
