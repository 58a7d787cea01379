use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion};
use dataapp::activity::{Activity, ActivityFault, PermissionGuard};
use dataapp::{
    ActivityRegistry, ExecutionContext, InputScope, Instance, Invocation, OutputScope,
    PermissionType, PolicyBinding, PolicyInputScope, PolicyRegistry, RequiredPermission, Sandbox,
    TypeIdentifier,
};

/// Announces a read of its `filePath` input and touches nothing.
struct Reader;

impl Activity for Reader {
    fn identifier(&self) -> &str {
        "bench.Reader"
    }

    fn run(&self, input: &InputScope, guard: &PermissionGuard) -> Result<OutputScope, ActivityFault> {
        let path = input.get("filePath").map(Instance::read).unwrap_or_default();
        guard.check(RequiredPermission::new(PermissionType::ReadFile, path))?;
        Ok(OutputScope::new())
    }
}

fn reader() -> Arc<dyn Activity> {
    Arc::new(Reader)
}

fn build_shared_sandbox() -> (Arc<Sandbox>, Invocation) {
    let mut activities = ActivityRegistry::new();
    activities.register("bench.Reader").unwrap();
    activities
        .resolve_embedded("bench.Reader", reader)
        .unwrap();
    let sandbox = Arc::new(Sandbox::new(
        Arc::new(activities),
        ExecutionContext::with_defaults(),
    ));

    let path = |p: &str| Instance::new(TypeIdentifier::core("Path"), p);
    let strategy = Instance::new(TypeIdentifier::core("PathMatchingStrategy"), "SUBDIR");
    let binding = PolicyBinding::from_registry(
        &PolicyRegistry::with_core_policies(),
        "core.AllowFileRead",
        PolicyInputScope::new()
            .with("path", path("/data"))
            .with("matchingStrategy", strategy),
    )
    .unwrap();
    let invocation = Invocation::new(
        "bench.Reader",
        InputScope::new().with("filePath", path("/data/a/b.txt")),
    )
    .with_binding(binding);

    (sandbox, invocation)
}

fn bench_throughput(c: &mut Criterion) {
    let thread_counts = [1, 2, 4, 8];

    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(5));

    for &threads in &thread_counts {
        let (sandbox, invocation) = build_shared_sandbox();
        assert!(sandbox.call_activity(&invocation).is_success());

        group.bench_function(format!("{threads}_threads"), |b| {
            b.iter_custom(|iters| {
                let per_thread = iters / threads as u64;
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let sb = Arc::clone(&sandbox);
                        let call = invocation.clone();
                        thread::spawn(move || {
                            let start = Instant::now();
                            for _ in 0..per_thread {
                                let _ = sb.call_activity(&call);
                            }
                            start.elapsed()
                        })
                    })
                    .collect();

                let mut max_elapsed = Duration::ZERO;
                for h in handles {
                    let elapsed = h.join().unwrap();
                    if elapsed > max_elapsed {
                        max_elapsed = elapsed;
                    }
                }
                max_elapsed
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
