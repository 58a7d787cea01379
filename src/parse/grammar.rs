use std::ops::Range;

use winnow::ascii::till_line_ending;
use winnow::combinator::{
    alt, cut_err, delimited, empty, fail, not, opt, preceded, repeat, separated, terminated,
};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Stateful, Stream};
use winnow::token::{any, one_of, rest, take_while};

use crate::types::{Comparator, LogicalOp};

use super::syntax::{
    BlockSyntax, DataAppSyntax, ExprSyntax, FunctionSyntax, InputSyntax, Item, QualifiedSyntax,
    Recovered, Spanned, StmtSyntax, TypeSyntax,
};

/// Deepest chain of negations, parentheses, argument lists and blocks.
const MAX_NESTING: usize = 128;

/// Parser state: how many nestable constructs enclose the current position.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Nesting {
    depth: usize,
}

pub(crate) type Input<'i> = Stateful<LocatingSlice<&'i str>, Nesting>;

fn new_input(text: &str) -> Input<'_> {
    Stateful {
        input: LocatingSlice::new(text),
        state: Nesting::default(),
    }
}

type Error = ErrMode<ContextError>;

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

fn expected_char(c: char) -> StrContext {
    StrContext::Expected(StrContextValue::CharLiteral(c))
}

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut Input<'_>) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., |c: char| c.is_whitespace()).void(),
            ("//", till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

fn offset(input: &mut Input<'_>) -> usize {
    let span: ModalResult<Range<usize>> = empty.span().parse_next(input);
    span.map_or(0, |s| s.start)
}

fn too_deep<O>(input: &mut Input<'_>) -> ModalResult<O> {
    cut_err(fail.context(StrContext::Expected(StrContextValue::Description(
        "at most 128 levels of nesting",
    ))))
    .parse_next(input)
}

/// Run `parser` one level deeper, failing once [`MAX_NESTING`] is reached.
fn nested<'i, O>(
    input: &mut Input<'i>,
    parser: fn(&mut Input<'i>) -> ModalResult<O>,
) -> ModalResult<O> {
    if input.state.depth >= MAX_NESTING {
        return too_deep(input);
    }
    input.state.depth += 1;
    let result = parser(input);
    input.state.depth -= 1;
    result
}

fn spanned<'i, O>(parser: impl Parser<Input<'i>, O, Error>) -> impl Parser<Input<'i>, Spanned<O>, Error> {
    parser.with_span().map(|(node, span)| Spanned::new(node, span))
}

// -- Identifiers & keywords -------------------------------------------------

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn ident<'i>(input: &mut Input<'i>) -> ModalResult<&'i str> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .context(expected("identifier"))
        .parse_next(input)
}

fn keyword<'i>(word: &'static str) -> impl Parser<Input<'i>, &'i str, Error> {
    terminated(word, not(one_of(is_ident_char)))
}

/// `ident ('.' ident)*`; everything before the last dot is the qualifier.
fn qualified_name(input: &mut Input<'_>) -> ModalResult<Spanned<QualifiedSyntax>> {
    spanned(separated(1.., ident, '.').map(|segments: Vec<&str>| {
        let (name, qualifier) = match segments.split_last() {
            Some((name, [])) => ((*name).to_owned(), None),
            Some((name, rest)) => ((*name).to_owned(), Some(rest.join("."))),
            None => (String::new(), None),
        };
        QualifiedSyntax { qualifier, name }
    }))
    .context(expected("qualified name"))
    .parse_next(input)
}

// -- Literals ---------------------------------------------------------------

fn string_literal(input: &mut Input<'_>) -> ModalResult<String> {
    '"'.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(expected("closing quote"))
            .parse_next(input)?;
        match ch {
            '"' => return Ok(s),
            '\\' => {
                let esc = cut_err(any).parse_next(input)?;
                match esc {
                    '"' => s.push('"'),
                    '\\' => s.push('\\'),
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    other => {
                        s.push('\\');
                        s.push(other);
                    }
                }
            }
            c => s.push(c),
        }
    }
}

fn number(input: &mut Input<'_>) -> ModalResult<ExprSyntax> {
    (
        opt('-'),
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
    )
        .take()
        .verify_map(|text: &str| {
            if text.contains('.') {
                text.parse().ok().map(ExprSyntax::Float)
            } else {
                text.parse().ok().map(ExprSyntax::Int)
            }
        })
        .parse_next(input)
}

// -- Expressions ------------------------------------------------------------

fn arguments(input: &mut Input<'_>) -> ModalResult<Vec<Spanned<ExprSyntax>>> {
    nested(input, argument_list)
}

fn argument_list(input: &mut Input<'_>) -> ModalResult<Vec<Spanned<ExprSyntax>>> {
    let arguments = separated(0.., preceded(ws, expression), (ws, ',')).parse_next(input)?;
    ws.parse_next(input)?;
    ')'.context(expected_char(')')).parse_next(input)?;
    Ok(arguments)
}

/// `name`, `name.field...` or `name(args)`.
fn reference(input: &mut Input<'_>) -> ModalResult<ExprSyntax> {
    let (name, name_span) = ident.with_span().parse_next(input)?;
    if opt('(').parse_next(input)?.is_some() {
        let arguments = cut_err(arguments).parse_next(input)?;
        return Ok(ExprSyntax::Method {
            name: name.to_owned(),
            arguments,
        });
    }
    let fields: Vec<&str> = repeat(0.., preceded('.', ident)).parse_next(input)?;
    if fields.is_empty() {
        Ok(ExprSyntax::Var(name.to_owned()))
    } else {
        Ok(ExprSyntax::Field {
            target: Spanned::new(name.to_owned(), name_span),
            fields: fields.into_iter().map(str::to_owned).collect(),
        })
    }
}

fn expression(input: &mut Input<'_>) -> ModalResult<Spanned<ExprSyntax>> {
    spanned(alt((
        string_literal.map(ExprSyntax::Str),
        keyword("true").value(ExprSyntax::Bool(true)),
        keyword("false").value(ExprSyntax::Bool(false)),
        number,
        reference,
    )))
    .context(expected("expression"))
    .parse_next(input)
}

// -- Conditions (precedence: || < && < ! < comparison) ----------------------

fn comparator(input: &mut Input<'_>) -> ModalResult<Comparator> {
    alt((
        "==".value(Comparator::Eq),
        "!=".value(Comparator::Neq),
        "<=".value(Comparator::Lte),
        ">=".value(Comparator::Gte),
        "<".value(Comparator::Lt),
        ">".value(Comparator::Gt),
    ))
    .parse_next(input)
}

fn comparison(input: &mut Input<'_>) -> ModalResult<Spanned<ExprSyntax>> {
    let left = expression(input)?;
    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if let Some(op) = opt(comparator).parse_next(input)? {
        ws.parse_next(input)?;
        let right = cut_err(expression).parse_next(input)?;
        let span = left.span.start..right.span.end;
        Ok(Spanned::new(
            ExprSyntax::Compare {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        ))
    } else {
        input.reset(&checkpoint);
        Ok(left)
    }
}

fn unary(input: &mut Input<'_>) -> ModalResult<Spanned<ExprSyntax>> {
    nested(input, negation_or_group)
}

fn negation_or_group(input: &mut Input<'_>) -> ModalResult<Spanned<ExprSyntax>> {
    alt((
        spanned(preceded(('!', ws), cut_err(unary)).map(|operand| ExprSyntax::Not(Box::new(operand)))),
        // parentheses widen the inner node's span
        spanned(delimited(('(', ws), cut_err(condition), (ws, cut_err(')'))))
            .map(|group| Spanned::new(group.node.node, group.span)),
        comparison,
    ))
    .parse_next(input)
}

fn logical_chain<'i>(
    input: &mut Input<'i>,
    token: &'static str,
    op: LogicalOp,
    operand: fn(&mut Input<'i>) -> ModalResult<Spanned<ExprSyntax>>,
) -> ModalResult<Spanned<ExprSyntax>> {
    let first = operand(input)?;
    let entered = input.state.depth;
    let rest = chain_tail(input, token, operand);
    input.state.depth = entered;
    Ok(rest?.into_iter().fold(first, |left, right| {
        let span = left.span.start..right.span.end;
        Spanned::new(
            ExprSyntax::Logical {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            span,
        )
    }))
}

/// Operands after the first; each one nests the folded tree a level deeper.
fn chain_tail<'i>(
    input: &mut Input<'i>,
    token: &'static str,
    operand: fn(&mut Input<'i>) -> ModalResult<Spanned<ExprSyntax>>,
) -> ModalResult<Vec<Spanned<ExprSyntax>>> {
    let mut operands = Vec::new();
    loop {
        let checkpoint = input.checkpoint();
        if opt((ws, token, ws)).parse_next(input)?.is_none() {
            input.reset(&checkpoint);
            return Ok(operands);
        }
        if input.state.depth >= MAX_NESTING {
            return too_deep(input);
        }
        input.state.depth += 1;
        operands.push(cut_err(operand).parse_next(input)?);
    }
}

fn and_condition(input: &mut Input<'_>) -> ModalResult<Spanned<ExprSyntax>> {
    logical_chain(input, "&&", LogicalOp::And, unary)
}

fn condition(input: &mut Input<'_>) -> ModalResult<Spanned<ExprSyntax>> {
    logical_chain(input, "||", LogicalOp::Or, and_condition)
}

// -- Types ------------------------------------------------------------------

fn definition_function(input: &mut Input<'_>) -> ModalResult<Spanned<FunctionSyntax>> {
    spanned((ident, ws, '(', cut_err(arguments)).map(|(name, (), _, arguments)| {
        FunctionSyntax {
            name: name.to_owned(),
            arguments,
        }
    }))
    .parse_next(input)
}

/// Optional `{ f(..), g(..) }` after a type name.
fn definition_functions(input: &mut Input<'_>) -> ModalResult<Vec<Spanned<FunctionSyntax>>> {
    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if opt('{').parse_next(input)?.is_none() {
        input.reset(&checkpoint);
        return Ok(Vec::new());
    }
    let functions =
        separated(0.., preceded(ws, definition_function), (ws, ',')).parse_next(input)?;
    ws.parse_next(input)?;
    cut_err('}').context(expected_char('}')).parse_next(input)?;
    Ok(functions)
}

fn type_syntax(input: &mut Input<'_>) -> ModalResult<TypeSyntax> {
    let name = qualified_name(input)?;
    let functions = definition_functions(input)?;
    Ok(TypeSyntax { name, functions })
}

// -- Statements -------------------------------------------------------------

fn semicolon(input: &mut Input<'_>) -> ModalResult<()> {
    preceded(ws, ';')
        .void()
        .context(expected_char(';'))
        .parse_next(input)
}

fn return_statement(input: &mut Input<'_>) -> ModalResult<StmtSyntax> {
    keyword("return").parse_next(input)?;
    let values = separated(0.., preceded(ws, expression), (ws, ',')).parse_next(input)?;
    cut_err(semicolon).parse_next(input)?;
    Ok(StmtSyntax::Return { values })
}

/// `( condition ) { ... }`
fn guarded_block(
    input: &mut Input<'_>,
) -> ModalResult<(Spanned<ExprSyntax>, Spanned<BlockSyntax>)> {
    ws.parse_next(input)?;
    '('.context(expected_char('(')).parse_next(input)?;
    ws.parse_next(input)?;
    let condition = condition
        .context(expected("condition"))
        .parse_next(input)?;
    ws.parse_next(input)?;
    ')'.context(expected_char(')')).parse_next(input)?;
    ws.parse_next(input)?;
    let body = block(input)?;
    Ok((condition, body))
}

fn if_statement(input: &mut Input<'_>) -> ModalResult<StmtSyntax> {
    keyword("if").parse_next(input)?;
    let (condition, body) = cut_err(guarded_block).parse_next(input)?;
    let mut conditions = vec![condition];
    let mut branches = vec![body];
    let mut otherwise = None;
    loop {
        let checkpoint = input.checkpoint();
        ws.parse_next(input)?;
        if opt(keyword("else")).parse_next(input)?.is_none() {
            input.reset(&checkpoint);
            break;
        }
        ws.parse_next(input)?;
        if opt(keyword("if")).parse_next(input)?.is_some() {
            let (condition, body) = cut_err(guarded_block).parse_next(input)?;
            conditions.push(condition);
            branches.push(body);
        } else {
            otherwise = Some(cut_err(block).parse_next(input)?);
            break;
        }
    }
    Ok(StmtSyntax::If {
        conditions,
        branches,
        otherwise,
    })
}

/// `a, b =` in front of an activity call or instantiation.
fn targets(input: &mut Input<'_>) -> ModalResult<Vec<Spanned<String>>> {
    let names = separated(
        1..,
        preceded(ws, spanned(ident.map(str::to_owned))),
        (ws, ','),
    )
    .parse_next(input)?;
    (ws, '=', not('=')).parse_next(input)?;
    Ok(names)
}

fn assignment_or_call(input: &mut Input<'_>) -> ModalResult<StmtSyntax> {
    let targets = opt(targets).parse_next(input)?;
    let activity = match targets {
        Some(_) => {
            ws.parse_next(input)?;
            cut_err(qualified_name).parse_next(input)?
        }
        None => qualified_name(input)?,
    };

    let checkpoint = input.checkpoint();
    ws.parse_next(input)?;
    if opt('(').parse_next(input)?.is_some() {
        let inputs = cut_err(arguments).parse_next(input)?;
        cut_err(semicolon).parse_next(input)?;
        return Ok(StmtSyntax::Call {
            outputs: targets.unwrap_or_default(),
            activity,
            inputs,
        });
    }
    input.reset(&checkpoint);

    let name = match targets {
        Some(mut names) if names.len() == 1 => names.remove(0).node,
        Some(_) => {
            return cut_err(fail.context(StrContext::Label("instantiation with several targets")))
                .parse_next(input)
        }
        None => return cut_err(fail.context(expected_char('('))).parse_next(input),
    };
    let start = activity.span.start;
    let functions = definition_functions(input)?;
    let end = offset(input);
    cut_err(semicolon).parse_next(input)?;
    Ok(StmtSyntax::Assign {
        name,
        value: Spanned::new(
            TypeSyntax {
                name: activity,
                functions,
            },
            start..end,
        ),
    })
}

fn statement(input: &mut Input<'_>) -> ModalResult<Spanned<StmtSyntax>> {
    spanned(alt((if_statement, return_statement, assignment_or_call)))
        .context(StrContext::Label("statement"))
        .parse_next(input)
}

// -- Error recovery ---------------------------------------------------------

fn describe(error: &Error) -> String {
    match error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => {
            let message = e.to_string().replace('\n', ", ");
            if message.is_empty() {
                "invalid syntax".to_owned()
            } else {
                message
            }
        }
        ErrMode::Incomplete(_) => "unexpected end of input".to_owned(),
    }
}

/// Skip past the next `;` at brace depth zero, past a `}` that closes a
/// nested block, or up to the `}` closing the enclosing section.
fn skip_item(input: &mut Input<'_>) {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut stop = None;
    for (index, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth == 0 => {
                stop = Some(index);
                break;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    stop = Some(index + 1);
                    break;
                }
            }
            ';' if depth == 0 => {
                stop = Some(index + 1);
                break;
            }
            _ => {}
        }
    }
    let len = stop.unwrap_or_else(|| input.eof_offset());
    input.next_slice(len);
}

/// `{ item* }` where a broken item is recorded and skipped.
fn braced_items<'i, T>(
    input: &mut Input<'i>,
    mut item: impl Parser<Input<'i>, T, Error>,
) -> ModalResult<Vec<Item<T>>> {
    '{'.context(expected_char('{')).parse_next(input)?;
    let mut items = Vec::new();
    loop {
        ws.parse_next(input)?;
        if opt('}').parse_next(input)?.is_some() {
            return Ok(items);
        }
        let start = offset(input);
        if input.eof_offset() == 0 {
            items.push(Err(Recovered {
                message: "expected '}' before end of input".to_owned(),
                span: start..start,
            }));
            return Ok(items);
        }
        let checkpoint = input.checkpoint();
        match item.parse_next(input) {
            Ok(parsed) => items.push(Ok(parsed)),
            Err(e) => {
                let failed_at = offset(input);
                input.reset(&checkpoint);
                skip_item(input);
                let end = offset(input);
                items.push(Err(Recovered {
                    message: describe(&e),
                    span: failed_at.clamp(start, end)..end,
                }));
            }
        }
    }
}

// -- Blocks & sections ------------------------------------------------------

fn block_body(input: &mut Input<'_>) -> ModalResult<BlockSyntax> {
    let statements = braced_items(input, statement)?;
    Ok(BlockSyntax { statements })
}

pub(crate) fn block(input: &mut Input<'_>) -> ModalResult<Spanned<BlockSyntax>> {
    nested(input, spanned_block)
}

fn spanned_block(input: &mut Input<'_>) -> ModalResult<Spanned<BlockSyntax>> {
    spanned(block_body).parse_next(input)
}

fn config_value(input: &mut Input<'_>) -> ModalResult<String> {
    alt((
        string_literal,
        take_while(1.., |c: char| is_ident_char(c) || c == '.' || c == '-').map(str::to_owned),
    ))
    .context(expected("configuration value"))
    .parse_next(input)
}

fn config_entry(input: &mut Input<'_>) -> ModalResult<Spanned<(String, String)>> {
    spanned(
        (ident, ws, cut_err('='), ws, cut_err(config_value), cut_err(semicolon))
            .map(|(key, (), _, (), value, ())| (key.to_owned(), value)),
    )
    .parse_next(input)
}

fn input_declaration(input: &mut Input<'_>) -> ModalResult<Spanned<InputSyntax>> {
    spanned(
        (ident, ws, cut_err(':'), ws, cut_err(type_syntax), cut_err(semicolon)).map(
            |(name, (), _, (), ty, ())| InputSyntax {
                name: name.to_owned(),
                ty,
            },
        ),
    )
    .parse_next(input)
}

fn section<'i, T>(
    input: &mut Input<'i>,
    name: &'static str,
    item: impl Parser<Input<'i>, T, Error>,
) -> ModalResult<Vec<Item<T>>> {
    if opt(keyword(name)).parse_next(input)?.is_none() {
        return Ok(Vec::new());
    }
    ws.parse_next(input)?;
    braced_items(input, item).map_err(ErrMode::cut)
}

fn data_app_body(input: &mut Input<'_>) -> ModalResult<DataAppSyntax> {
    let configuration = section(input, "app", config_entry)?;
    ws.parse_next(input)?;
    let inputs = section(input, "input", input_declaration)?;
    ws.parse_next(input)?;
    keyword("code")
        .context(StrContext::Expected(StrContextValue::StringLiteral("code")))
        .parse_next(input)?;
    ws.parse_next(input)?;
    let code = cut_err(block).parse_next(input)?;
    Ok(DataAppSyntax {
        configuration,
        inputs,
        code,
    })
}

pub(crate) fn data_app(input: &mut Input<'_>) -> ModalResult<Spanned<DataAppSyntax>> {
    spanned(data_app_body).parse_next(input)
}

// -- Top level --------------------------------------------------------------

/// Outcome of parsing one source unit.
#[derive(Debug)]
pub(crate) struct Unit<T> {
    pub(crate) root: Option<Spanned<T>>,
    pub(crate) errors: Vec<Recovered>,
}

/// Parse `text` with `root`, reporting anything left over after it.
pub(crate) fn parse_unit<T>(
    text: &str,
    root: fn(&mut Input<'_>) -> ModalResult<Spanned<T>>,
) -> Unit<T> {
    let mut input = new_input(text);
    match (ws, root).parse_next(&mut input) {
        Ok(((), node)) => {
            let mut errors = Vec::new();
            let leftover: ModalResult<((), (&str, Range<usize>))> =
                (ws, rest.with_span()).parse_next(&mut input);
            if let Ok(((), (garbage, span))) = leftover {
                if !garbage.is_empty() {
                    errors.push(Recovered {
                        message: "unexpected input after the end of the unit".to_owned(),
                        span,
                    });
                }
            }
            Unit {
                root: Some(node),
                errors,
            }
        }
        Err(e) => {
            let at = offset(&mut input);
            Unit {
                root: None,
                errors: vec![Recovered {
                    message: describe(&e),
                    span: at..at,
                }],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_block(text: &str) -> Unit<BlockSyntax> {
        parse_unit(text, block)
    }

    fn statements(unit: &Unit<BlockSyntax>) -> &[Item<Spanned<StmtSyntax>>] {
        &unit.root.as_ref().unwrap().node.statements
    }

    #[test]
    fn activity_call_with_outputs() {
        let unit = parse_block("{ a, b = core.Split(x, \",\"); }");
        assert!(unit.errors.is_empty());
        match &statements(&unit)[0] {
            Ok(Spanned {
                node: StmtSyntax::Call { outputs, activity, inputs },
                span,
            }) => {
                assert_eq!(outputs.len(), 2);
                assert_eq!(activity.node.qualifier.as_deref(), Some("core"));
                assert_eq!(activity.node.name, "Split");
                assert_eq!(inputs.len(), 2);
                assert_eq!(*span, 2..28);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn unqualified_call_has_no_qualifier() {
        let unit = parse_block("{ Print(x); }");
        match &statements(&unit)[0] {
            Ok(Spanned {
                node: StmtSyntax::Call { activity, .. },
                ..
            }) => assert_eq!(activity.node.qualifier, None),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn instantiation_with_functions() {
        let unit = parse_block("{ t = core.Text { value(\"hi\"), max(3) }; }");
        match &statements(&unit)[0] {
            Ok(Spanned {
                node: StmtSyntax::Assign { name, value },
                ..
            }) => {
                assert_eq!(name, "t");
                assert_eq!(value.node.functions.len(), 2);
                assert_eq!(value.span, 6..39);
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn condition_precedence() {
        let unit = parse_block("{ if (a || b && !c) { } }");
        match &statements(&unit)[0] {
            Ok(Spanned {
                node: StmtSyntax::If { conditions, .. },
                ..
            }) => match &conditions[0].node {
                ExprSyntax::Logical { op, right, .. } => {
                    assert_eq!(*op, LogicalOp::Or);
                    assert!(matches!(
                        right.node,
                        ExprSyntax::Logical {
                            op: LogicalOp::And,
                            ..
                        }
                    ));
                }
                other => panic!("expected ||, got {other:?}"),
            },
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn broken_statement_is_skipped() {
        let unit = parse_block("{ x = ; core.Print(y); }");
        let items = statements(&unit);
        assert_eq!(items.len(), 2);
        assert!(items[0].is_err());
        assert!(items[1].is_ok());
    }

    #[test]
    fn unclosed_block_is_reported() {
        let unit = parse_block("{ core.Print(y);");
        let items = statements(&unit);
        assert!(matches!(items.last(), Some(Err(r)) if r.message.contains('}')));
    }

    #[test]
    fn trailing_input_is_reported() {
        let unit = parse_block("{ } extra");
        assert!(unit.root.is_some());
        assert_eq!(unit.errors.len(), 1);
        assert_eq!(unit.errors[0].span, 4..9);
    }

    #[test]
    fn comments_are_whitespace() {
        let unit = parse_block("// leading\n{ // inside\n return; }");
        assert!(unit.errors.is_empty());
        assert_eq!(statements(&unit).len(), 1);
    }

    #[test]
    fn skip_stops_before_closing_brace() {
        let mut input = new_input("oops oops } rest");
        skip_item(&mut input);
        assert_eq!(**input, "} rest");
    }

    #[test]
    fn nesting_limit_is_one_recovered_error() {
        let deep = format!("{{ if ({}a == b) {{ }} x(); }}", "!".repeat(MAX_NESTING * 4));
        let unit = parse_block(&deep);
        assert_eq!(unit.errors.len(), 1);
        assert!(unit.errors[0].message.contains("levels of nesting"));
        assert_eq!(statements(&unit).len(), 2);
        assert!(statements(&unit)[1].is_ok());
    }

    #[test]
    fn depth_is_released_after_each_construct() {
        let shallow = format!("({}a){}", "(".repeat(MAX_NESTING / 2), ")".repeat(MAX_NESTING / 2));
        let text = format!("{{ if ({shallow}) {{ }} if ({shallow}) {{ }} }}");
        let unit = parse_block(&text);
        assert!(unit.errors.is_empty(), "{:?}", unit.errors);
    }

    #[test]
    fn long_logical_chains_are_bounded() {
        let chain = vec!["a"; MAX_NESTING * 2].join(" && ");
        let unit = parse_block(&format!("{{ if ({chain}) {{ }} }}"));
        assert_eq!(unit.errors.len(), 1);

        let chain = vec!["a"; MAX_NESTING / 2].join(" || ");
        let unit = parse_block(&format!("{{ if ({chain}) {{ }} }}"));
        assert!(unit.errors.is_empty());
    }

    #[test]
    fn numbers() {
        let mut input = new_input("-12");
        assert_eq!(number(&mut input).unwrap(), ExprSyntax::Int(-12));
        let mut input = new_input("2.5");
        assert_eq!(number(&mut input).unwrap(), ExprSyntax::Float(2.5));
    }
}
