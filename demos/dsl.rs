use dataapp::{parse_data_app_file, DataAppConfig, NodeKind};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/reader.dapp");
    let result = parse_data_app_file(path);
    for error in &result.errors {
        eprintln!("{error}");
    }
    let Some(root) = result.root_ref() else {
        eprintln!("nothing to show");
        return;
    };

    println!("{root}");

    let config = DataAppConfig::from_ast(&result.ast, root.id()).expect("invalid configuration");
    println!(
        "{}.{} v{} tags={:?} periodic={}",
        config.namespace,
        config.name,
        config.version,
        config.tags,
        config.is_periodic()
    );

    for call in root.find_all(|kind| matches!(kind, NodeKind::ActivityCall { .. })) {
        let NodeKind::ActivityCall { activity, .. } = call.kind() else {
            continue;
        };
        if let Some(NodeKind::QualifiedName { qualifier, name }) =
            result.ast.get(*activity).map(|n| n.kind())
        {
            println!("{}: calls {qualifier}.{name}", call.position());
        }
    }
}
