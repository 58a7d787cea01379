use dataapp::{EvaluationCondition, MatchingStrategy, PermissionType, RequiredPermission};
use proptest::prelude::*;

// --- Fixed schema ---
// permissions : the file capabilities plus one URL capability
// attributes  : a small set of overlapping paths so matches are common

pub const PATHS: &[&str] = &[
    "/data",
    "/data/a",
    "/data/a/b.txt",
    "/data/../etc/passwd",
    "/etc",
    "/etc/passwd",
    "<<ALL_FILES>>",
];

const PERMISSIONS: &[PermissionType] = &[
    PermissionType::ReadFile,
    PermissionType::WriteFile,
    PermissionType::ExecuteFile,
    PermissionType::DeleteFile,
    PermissionType::UrlGet,
];

const STRATEGIES: &[MatchingStrategy] = &[
    MatchingStrategy::ExactMatch,
    MatchingStrategy::Wildcard,
    MatchingStrategy::PathExactMatch,
    MatchingStrategy::PathSubdir,
];

pub fn arb_permission() -> impl Strategy<Value = PermissionType> {
    prop::sample::select(PERMISSIONS)
}

/// A request for one of the schema paths.
pub fn arb_request() -> impl Strategy<Value = RequiredPermission> {
    (arb_permission(), prop::sample::select(&PATHS[..PATHS.len() - 1]))
        .prop_map(|(permission, path)| RequiredPermission::new(permission, path))
}

/// A grant or forbid on a schema path; occasionally a blanket condition.
pub fn arb_condition() -> impl Strategy<Value = EvaluationCondition> {
    prop_oneof![
        8 => (
            arb_permission(),
            prop::sample::select(PATHS),
            prop::sample::select(STRATEGIES),
            any::<bool>(),
        )
            .prop_map(|(permission, path, strategy, negated)| {
                EvaluationCondition::new(permission, path, strategy, negated)
            }),
        1 => Just(EvaluationCondition::grant_all()),
        1 => Just(EvaluationCondition::deny_all()),
    ]
}

pub fn arb_conditions() -> impl Strategy<Value = Vec<EvaluationCondition>> {
    prop::collection::vec(arb_condition(), 0..8)
}

// --- Data App source ---

const NAMES: &[&str] = &["a", "b", "content", "path", "_tmp1"];
const ACTIVITIES: &[&str] = &["core.ReadFile", "core.PrintToConsole", "acme.geo.Locate", "Split"];

fn arb_name() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES).prop_map(str::to_owned)
}

fn arb_expression() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_name(),
        (arb_name(), arb_name()).prop_map(|(t, f)| format!("{t}.{f}")),
        (0_i64..1000).prop_map(|n| n.to_string()),
        "[a-z ]{0,6}".prop_map(|s| format!("\"{s}\"")),
        any::<bool>().prop_map(|b| b.to_string()),
    ]
}

fn arb_condition_text() -> impl Strategy<Value = String> {
    let comparison = (
        arb_expression(),
        prop::sample::select(&["==", "!=", "<", "<=", ">", ">="][..]),
        arb_expression(),
    )
        .prop_map(|(l, op, r)| format!("{l} {op} {r}"));
    comparison.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("{a} && {b}")),
            (inner.clone(), inner.clone()).prop_map(|(a, b)| format!("({a}) || {b}")),
            inner.prop_map(|c| format!("!({c})")),
        ]
    })
}

fn arb_simple_statement() -> impl Strategy<Value = String> {
    prop_oneof![
        (
            prop::collection::vec(arb_name(), 0..3),
            prop::sample::select(ACTIVITIES),
            prop::collection::vec(arb_expression(), 0..3),
        )
            .prop_map(|(outputs, activity, inputs)| {
                let call = format!("{activity}({});", inputs.join(", "));
                if outputs.is_empty() {
                    call
                } else {
                    format!("{} = {call}", outputs.join(", "))
                }
            }),
        (arb_name(), prop::sample::select(&["core.Text", "core.UnsignedInt", "acme.Geo"][..]))
            .prop_map(|(name, ty)| format!("{name} = {ty} {{ value(1), label(\"x\") }};")),
        prop::collection::vec(arb_expression(), 0..3)
            .prop_map(|values| format!("return {};", values.join(", "))),
    ]
}

fn arb_statement() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => arb_simple_statement(),
        1 => (
            arb_condition_text(),
            prop::collection::vec(arb_simple_statement(), 0..3),
            prop::option::of(prop::collection::vec(arb_simple_statement(), 0..2)),
        )
            .prop_map(|(condition, body, otherwise)| {
                let mut text = format!("if ({condition}) {{\n{}\n}}", body.join("\n"));
                if let Some(otherwise) = otherwise {
                    text.push_str(&format!(" else {{ {} }}", otherwise.join(" ")));
                }
                text
            }),
    ]
}

/// Syntactically valid Data App source.
pub fn arb_data_app() -> impl Strategy<Value = String> {
    (
        prop::collection::vec((arb_name(), "[A-Za-z0-9]{1,6}"), 0..3),
        prop::collection::vec(arb_statement(), 0..6),
    )
        .prop_map(|(config, statements)| {
            let mut text = String::new();
            if !config.is_empty() {
                // distinct keys, so duplicates never produce errors
                let entries: Vec<String> = config
                    .iter()
                    .enumerate()
                    .map(|(i, (k, v))| format!("    {k}{i} = \"{v}\";"))
                    .collect();
                text.push_str(&format!("app {{\n{}\n}}\n", entries.join("\n")));
            }
            text.push_str("// generated\ncode {\n");
            for statement in statements {
                text.push_str("    ");
                text.push_str(&statement);
                text.push('\n');
            }
            text.push_str("}\n");
            text
        })
}

// --- Deeply nested source ---

/// A block whose single condition nests negations, parentheses, calls or
/// blocks far beyond any realistic program.
pub fn arb_deep_nesting() -> impl Strategy<Value = String> {
    (0_u8..5, 1_000_usize..20_000).prop_map(|(shape, depth)| match shape {
        0 => format!("{{ if ({}a) {{ }} }}", "!".repeat(depth)),
        1 => format!("{{ if ({}a{}) {{ }} }}", "(".repeat(depth), ")".repeat(depth)),
        2 => format!("{{ if ({}a{}) {{ }} }}", "!(".repeat(depth), ")".repeat(depth)),
        3 => format!("{{ {}{} }}", "if (a) { ".repeat(depth), "} ".repeat(depth)),
        _ => format!("{{ x = f({}a{}); }}", "f(".repeat(depth), ")".repeat(depth)),
    })
}
