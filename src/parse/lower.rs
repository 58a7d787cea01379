//! Lowering of concrete syntax into the [`Ast`] arena.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{Ast, NodeId, NodeKind, Point, Position};

use super::error::SyntaxError;
use super::syntax::{
    BlockSyntax, DataAppSyntax, ExprSyntax, FunctionSyntax, InputSyntax, Item, QualifiedSyntax,
    Recovered, Span, Spanned, StmtSyntax, TypeSyntax,
};

const DEFAULT_QUALIFIER: &str = "core";

/// Byte offsets of every line start, for offset to point conversion.
struct LineIndex<'s> {
    source: &'s str,
    starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    fn new(source: &'s str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, starts }
    }

    fn point(&self, offset: usize) -> Point {
        let line = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        let start = self.starts.get(line).copied().unwrap_or(0);
        let column = self
            .source
            .get(start..offset)
            .map_or(0, |text| text.chars().count());
        Point::new(to_u32(line + 1), to_u32(column))
    }

    fn position(&self, span: &Span) -> Position {
        Position::new(self.point(span.start), self.point(span.end))
            .unwrap_or_else(|_| Position::unknown())
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

pub(crate) struct Lowering<'s> {
    lines: LineIndex<'s>,
    file: Arc<str>,
    ast: Ast,
    errors: Vec<SyntaxError>,
}

impl<'s> Lowering<'s> {
    pub(crate) fn new(file: &str, source: &'s str) -> Self {
        Self {
            lines: LineIndex::new(source),
            file: Arc::from(file),
            ast: Ast::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> (Ast, Vec<SyntaxError>) {
        (self.ast, self.errors)
    }

    pub(crate) fn recovered(&mut self, recovered: &Recovered) {
        self.error(recovered.message.clone(), &recovered.span);
    }

    fn error(&mut self, message: String, span: &Span) {
        let position = self.lines.position(span);
        self.errors
            .push(SyntaxError::new(message, &*self.file, position));
    }

    fn push(&mut self, span: &Span, kind: NodeKind) -> NodeId {
        let position = self.lines.position(span);
        self.ast.push(&self.file, position, kind)
    }

    /// Keep the parsed items and report the recovered ones.
    fn items<'a, T>(&mut self, items: &'a [Item<T>]) -> Vec<&'a T> {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Ok(parsed) => kept.push(parsed),
                Err(recovered) => self.recovered(recovered),
            }
        }
        kept
    }

    // -- Data app -----------------------------------------------------------

    pub(crate) fn data_app(&mut self, app: &Spanned<DataAppSyntax>) -> NodeId {
        let mut configuration = BTreeMap::new();
        for entry in self.items(&app.node.configuration) {
            let (key, value) = &entry.node;
            if configuration.contains_key(key) {
                self.error(format!("duplicate configuration key '{key}'"), &entry.span);
            } else {
                configuration.insert(key.clone(), value.clone());
            }
        }
        let inputs = self
            .items(&app.node.inputs)
            .into_iter()
            .map(|input| self.input(input))
            .collect();
        let code = self.block(&app.node.code);
        self.push(
            &app.span,
            NodeKind::DataApp {
                configuration,
                inputs,
                code,
            },
        )
    }

    fn input(&mut self, input: &Spanned<InputSyntax>) -> NodeId {
        let InputSyntax { name, ty } = &input.node;
        let ty_node = self.qualified(&ty.name);
        let functions = self.functions(&ty.functions);
        self.push(
            &input.span,
            NodeKind::InputParameter {
                name: name.clone(),
                ty: ty_node,
                functions,
            },
        )
    }

    fn qualified(&mut self, name: &Spanned<QualifiedSyntax>) -> NodeId {
        let qualifier = name
            .node
            .qualifier
            .clone()
            .unwrap_or_else(|| DEFAULT_QUALIFIER.to_owned());
        self.push(
            &name.span,
            NodeKind::QualifiedName {
                qualifier,
                name: name.node.name.clone(),
            },
        )
    }

    fn functions(&mut self, functions: &[Spanned<FunctionSyntax>]) -> Vec<NodeId> {
        functions
            .iter()
            .map(|function| {
                let arguments = self.exprs(&function.node.arguments);
                self.push(
                    &function.span,
                    NodeKind::DefinitionFunction {
                        name: function.node.name.clone(),
                        arguments,
                    },
                )
            })
            .collect()
    }

    // -- Statements ---------------------------------------------------------

    pub(crate) fn block(&mut self, block: &Spanned<BlockSyntax>) -> NodeId {
        let statements = self
            .items(&block.node.statements)
            .into_iter()
            .map(|statement| self.statement(statement))
            .collect();
        self.push(&block.span, NodeKind::Block { statements })
    }

    fn statement(&mut self, statement: &Spanned<StmtSyntax>) -> NodeId {
        let kind = match &statement.node {
            StmtSyntax::Call {
                outputs,
                activity,
                inputs,
            } => {
                let activity = self.qualified(activity);
                let inputs = self.exprs(inputs);
                let outputs = outputs
                    .iter()
                    .map(|output| {
                        self.push(
                            &output.span,
                            NodeKind::VariableReference {
                                name: output.node.clone(),
                            },
                        )
                    })
                    .collect();
                NodeKind::ActivityCall {
                    activity,
                    inputs,
                    outputs,
                }
            }
            StmtSyntax::Assign { name, value } => {
                let value = self.instantiation(value);
                NodeKind::Assignment {
                    name: name.clone(),
                    value,
                }
            }
            StmtSyntax::If {
                conditions,
                branches,
                otherwise,
            } => {
                // lowered pairwise so node order follows the source
                let mut condition_ids = Vec::with_capacity(conditions.len());
                let mut branch_ids = Vec::with_capacity(branches.len());
                for (condition, branch) in conditions.iter().zip(branches) {
                    condition_ids.push(self.expr(condition));
                    branch_ids.push(self.block(branch));
                }
                let otherwise = otherwise.as_ref().map(|block| self.block(block));
                NodeKind::IfStatement {
                    conditions: condition_ids,
                    branches: branch_ids,
                    otherwise,
                }
            }
            StmtSyntax::Return { values } => NodeKind::ReturnStatement {
                values: self.exprs(values),
            },
        };
        self.push(&statement.span, kind)
    }

    fn instantiation(&mut self, value: &Spanned<TypeSyntax>) -> NodeId {
        let ty = self.qualified(&value.node.name);
        let functions = self.functions(&value.node.functions);
        self.push(&value.span, NodeKind::TypeInstantiation { ty, functions })
    }

    // -- Expressions --------------------------------------------------------

    fn exprs(&mut self, exprs: &[Spanned<ExprSyntax>]) -> Vec<NodeId> {
        exprs.iter().map(|expr| self.expr(expr)).collect()
    }

    fn expr(&mut self, expr: &Spanned<ExprSyntax>) -> NodeId {
        let kind = match &expr.node {
            ExprSyntax::Str(value) => NodeKind::StringLiteral {
                value: value.clone(),
            },
            ExprSyntax::Int(value) => NodeKind::IntegerLiteral { value: *value },
            ExprSyntax::Float(value) => NodeKind::FloatLiteral { value: *value },
            ExprSyntax::Bool(value) => NodeKind::BooleanLiteral { value: *value },
            ExprSyntax::Var(name) => NodeKind::VariableReference { name: name.clone() },
            ExprSyntax::Field { target, fields } => {
                let target = self.push(
                    &target.span,
                    NodeKind::VariableReference {
                        name: target.node.clone(),
                    },
                );
                NodeKind::FieldAccess {
                    target,
                    fields: fields.clone(),
                }
            }
            ExprSyntax::Method { name, arguments } => NodeKind::MethodCall {
                method: name.clone(),
                arguments: self.exprs(arguments),
            },
            ExprSyntax::Compare { left, op, right } => {
                let left = self.expr(left);
                let right = self.expr(right);
                NodeKind::Comparison {
                    left,
                    op: *op,
                    right,
                }
            }
            ExprSyntax::Logical { left, op, right } => {
                let left = self.expr(left);
                let right = self.expr(right);
                NodeKind::Logical {
                    left,
                    op: *op,
                    right,
                }
            }
            ExprSyntax::Not(operand) => NodeKind::Not {
                operand: self.expr(operand),
            },
        };
        self.push(&expr.span, kind)
    }
}
