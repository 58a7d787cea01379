use std::sync::Arc;

use dataapp::{
    ActivityRegistry, CoreTaxonomy, ExecutionContext, InputScope, Invocation, PolicyBinding,
    PolicyInputScope, PolicyRegistry, Sandbox, TypeIdentifier, TypeTaxonomy,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let taxonomy = CoreTaxonomy::new();
    let value = |ty: &str, content: &str| {
        let ty = TypeIdentifier::parse(ty).expect("bad type identifier");
        taxonomy.instantiate(&ty, content).expect("bad value")
    };

    let dir = std::env::temp_dir().join("dataapp-sandbox-demo");
    std::fs::create_dir_all(&dir).expect("cannot create demo directory");
    let note = dir.join("note.txt").display().to_string();
    let root = dir.display().to_string();

    let policies = PolicyRegistry::with_core_policies();
    let allow = |identifier: &str| {
        PolicyBinding::from_registry(
            &policies,
            identifier,
            PolicyInputScope::new()
                .with("path", value("core.Path", &root))
                .with("matchingStrategy", value("core.PathMatchingStrategy", "SUBDIR")),
        )
        .expect("unknown policy")
    };

    let sandbox = Sandbox::new(
        Arc::new(ActivityRegistry::with_core_activities()),
        ExecutionContext::with_defaults(),
    );

    let write = Invocation::new(
        "core.WriteFile",
        InputScope::new()
            .with("filePath", value("core.Path", &note))
            .with("content", value("core.Text", "hello from the sandbox")),
    )
    .with_binding(allow("core.AllowFileWrite"));
    let read = Invocation::new(
        "core.ReadFile",
        InputScope::new().with("filePath", value("core.Path", &note)),
    )
    .with_binding(allow("core.AllowFileRead"));
    // no read grant: denied
    let unguarded = Invocation::new(
        "core.ReadFile",
        InputScope::new().with("filePath", value("core.Path", &note)),
    );

    let report = sandbox.run(&[write, read, unguarded]);
    for (activity, output) in report.completed() {
        println!("{activity} -> {}", output.to_json());
    }
    match report.halted() {
        Some(failure) => println!("halted: {failure}"),
        None => println!("all steps completed"),
    }
    println!("took {:?}", report.duration());
}
