use std::sync::Arc;
use std::thread;

use dataapp::policy::{GrantAll, TagConstraint};
use dataapp::{
    parse_data_app, ActivityRegistry, ExecutionContext, FailureKind, InputScope, Instance,
    Invocation, PolicyInputScope, Sandbox, TypeIdentifier, TAGS_MODULE,
};

fn text(s: &str) -> Instance {
    Instance::new(TypeIdentifier::core("Text"), s)
}

fn print(s: &str) -> Invocation {
    Invocation::new("core.PrintToConsole", InputScope::new().with("text", text(s)))
}

#[test]
fn invocations_across_threads() {
    let sandbox = Arc::new(Sandbox::new(
        Arc::new(ActivityRegistry::with_core_activities()),
        ExecutionContext::with_defaults(),
    ));
    sandbox
        .context()
        .set_tags(TAGS_MODULE, ["DEBUG"])
        .unwrap();

    let deny_debug =
        PolicyInputScope::new().with("tag", Instance::new(TypeIdentifier::core("Tag"), "DEBUG"));

    let mut handles = vec![];

    // Thread 1: pass-through policy -> success
    let sb = Arc::clone(&sandbox);
    handles.push(thread::spawn(move || {
        sb.call_activity(&print("one").with_policy(Arc::new(GrantAll), PolicyInputScope::new()))
            .is_success()
    }));

    // Thread 2: DEBUG is active -> rejected
    let sb = Arc::clone(&sandbox);
    let input = deny_debug.clone();
    handles.push(thread::spawn(move || {
        let report = sb.call_activity(&print("two").with_policy(Arc::new(TagConstraint::deny()), input));
        report.outcome().map_err(|f| f.kind) == Err(FailureKind::PreconditionRejected)
    }));

    // Thread 3: unknown activity -> not resolved
    let sb = Arc::clone(&sandbox);
    handles.push(thread::spawn(move || {
        let report = sb.call_activity(&Invocation::new("acme.Missing", InputScope::new()));
        report.outcome().is_err()
    }));

    // Thread 4: no policies -> printing needs no capability
    let sb = Arc::clone(&sandbox);
    handles.push(thread::spawn(move || sb.call_activity(&print("four")).is_success()));

    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, [true, true, true, true]);
}

#[test]
fn context_updates_are_seen_by_later_snapshots() {
    let context = ExecutionContext::with_defaults();
    let writer = context.clone();
    thread::spawn(move || writer.set_tags(TAGS_MODULE, ["PRODUCTION"]).unwrap())
        .join()
        .unwrap();
    assert!(context.snapshot().contains("TagsContextModule.PRODUCTION"));
}

#[test]
fn parsing_in_parallel() {
    let source = Arc::new(String::from(
        "app { name = Parallel; }\ncode {\n    x = core.ReadFile(path);\n    return x;\n}\n",
    ));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let source = Arc::clone(&source);
            thread::spawn(move || {
                let result = parse_data_app(&format!("t{i}.dapp"), &source);
                (result.is_ok(), result.ast.len())
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.iter().all(|(ok, _)| *ok));
    assert!(results.windows(2).all(|w| w[0].1 == w[1].1));
}
