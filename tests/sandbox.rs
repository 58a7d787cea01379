use std::fs;
use std::sync::Arc;

use dataapp::policy::GrantAll;
use dataapp::{
    ActivityRegistry, CoreTaxonomy, Decision, ExecutionContext, FailureKind, InputScope, Instance,
    Invocation, PermissionType, PolicyBinding, PolicyInputScope, PolicyRegistry, Sandbox,
    TypeIdentifier, TypeTaxonomy,
};

fn value(ty: &str, content: &str) -> Instance {
    CoreTaxonomy::new()
        .instantiate(&TypeIdentifier::parse(ty).unwrap(), content)
        .unwrap()
}

fn sandbox() -> Sandbox {
    Sandbox::new(
        Arc::new(ActivityRegistry::with_core_activities()),
        ExecutionContext::with_defaults(),
    )
    .with_clock(|| "2024-06-01T12:00:00".parse().unwrap())
}

fn file_policy(identifier: &str, path: &str, strategy: &str) -> PolicyBinding {
    PolicyBinding::from_registry(
        &PolicyRegistry::with_core_policies(),
        identifier,
        PolicyInputScope::new()
            .with("path", value("core.Path", path))
            .with("matchingStrategy", value("core.PathMatchingStrategy", strategy)),
    )
    .unwrap()
}

fn read(path: &str) -> Invocation {
    Invocation::new(
        "core.ReadFile",
        InputScope::new().with("filePath", value("core.Path", path)),
    )
}

#[test]
fn granted_read_returns_content() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("note.txt");
    fs::write(&file, "hello").unwrap();
    let root = dir.path().display().to_string();

    let call = read(&file.display().to_string())
        .with_binding(file_policy("core.AllowFileRead", &root, "SUBDIR"));
    let report = sandbox().call_activity(&call);
    let output = report.outcome().unwrap();
    assert_eq!(output.get("content").map(Instance::read), Some("hello"));

    let checks = report.permissions();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].request.permission, PermissionType::ReadFile);
    assert_eq!(checks[0].decision, Decision::Allow);
}

#[test]
fn forbidden_subtree_wins_over_grant() {
    let dir = tempfile::tempdir().unwrap();
    let secret = dir.path().join("secret");
    fs::create_dir(&secret).unwrap();
    let file = secret.join("key.txt");
    fs::write(&file, "k").unwrap();

    let call = read(&file.display().to_string())
        .with_binding(file_policy(
            "core.AllowFileRead",
            &dir.path().display().to_string(),
            "SUBDIR",
        ))
        .with_binding(file_policy(
            "core.ForbidFileRead",
            &secret.display().to_string(),
            "SUBDIR",
        ));
    let report = sandbox().call_activity(&call);
    assert_eq!(
        report.outcome().unwrap_err().kind,
        FailureKind::PermissionDenied
    );
    assert_eq!(report.permissions()[0].decision, Decision::Deny);
}

#[test]
fn grant_all_opens_writes() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.txt");
    let call = Invocation::new(
        "core.WriteFile",
        InputScope::new()
            .with("filePath", value("core.Path", &target.display().to_string()))
            .with("content", value("core.Text", "written")),
    )
    .with_policy(Arc::new(GrantAll), PolicyInputScope::new());
    assert!(sandbox().call_activity(&call).is_success());
    assert_eq!(fs::read_to_string(&target).unwrap(), "written");
}

#[test]
fn write_without_policy_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.txt");
    let call = Invocation::new(
        "core.WriteFile",
        InputScope::new()
            .with("filePath", value("core.Path", &target.display().to_string()))
            .with("content", value("core.Text", "written")),
    );
    let report = sandbox().call_activity(&call);
    assert_eq!(
        report.outcome().unwrap_err().kind,
        FailureKind::PermissionDenied
    );
    assert!(!target.exists());
}

#[test]
fn missing_file_is_a_fault() {
    let call = read("/definitely/not/here.txt").with_policy(Arc::new(GrantAll), PolicyInputScope::new());
    let report = sandbox().call_activity(&call);
    assert_eq!(report.outcome().unwrap_err().kind, FailureKind::Fault);
}

#[test]
fn run_halts_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    fs::write(&file, "a").unwrap();
    let path = file.display().to_string();

    let ok = read(&path).with_policy(Arc::new(GrantAll), PolicyInputScope::new());
    let denied = read(&path);
    let report = sandbox().run(&[ok.clone(), denied, ok]);
    assert!(!report.is_success());
    assert_eq!(report.completed().len(), 1);
    assert_eq!(report.completed()[0].0, "core.ReadFile");
    assert_eq!(report.halted().unwrap().kind, FailureKind::PermissionDenied);
}

#[test]
fn correlation_ids_are_empty_for_core_policies() {
    let call = read("/tmp/x").with_policy(Arc::new(GrantAll), PolicyInputScope::new());
    let report = sandbox().call_activity(&call);
    assert!(report.correlation_ids().is_empty());
}

#[test]
fn incomplete_file_policy_denies_the_capability() {
    let binding = PolicyBinding::from_registry(
        &PolicyRegistry::with_core_policies(),
        "core.AllowFileRead",
        PolicyInputScope::new().with("path", value("core.Path", "/data")),
    )
    .unwrap();
    let report = sandbox().call_activity(&read("/data/a.txt").with_binding(binding));
    assert_eq!(
        report.outcome().unwrap_err().kind,
        FailureKind::PermissionDenied
    );
    assert_eq!(report.permissions()[0].decision, Decision::Deny);
}
