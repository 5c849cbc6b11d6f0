//! Dispatch Path Benchmarks
//!
//! Measures the gateway overhead around a handler that does no work:
//! name resolution, argument validation, the handler call and result
//! normalization.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use mediagate::core::DispatchConfig;
use mediagate::{
    ArgType, ContentBlock, Dispatcher, Field, InvocationRequest, Module, ModuleRegistry, ToolSpec,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn echo_module(prefix: &str, tools: usize) -> Module {
    let name = prefix.trim_end_matches('_').to_string();
    (0..tools).fold(Module::new(name, prefix), |module, i| {
        module.tool(
            ToolSpec::new(format!("{prefix}echo{i}"), "Echo the text back")
                .args(ArgType::object([
                    Field::required("text", ArgType::String),
                    Field::optional("repeat", ArgType::Integer).with_default(1),
                    Field::optional("mode", ArgType::enumeration(["plain", "upper"])),
                ]))
                .handler_fn(|args, _ctx| async move {
                    let text = args.require_str("text")?.to_string();
                    Ok(vec![ContentBlock::text(text)])
                }),
        )
    })
}

fn dispatcher(modules: usize, tools_per_module: usize) -> Dispatcher {
    let mut builder = ModuleRegistry::builder();
    for m in 0..modules {
        builder
            .register(echo_module(&format!("m{m}_"), tools_per_module))
            .expect("benchmark modules register");
    }
    Dispatcher::new(Arc::new(builder.build()), DispatchConfig::default())
}

/// Resolve + validate + dispatch of a synchronous tool
fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));
    group.measurement_time(Duration::from_secs(10));

    for (modules, tools) in [(1, 4), (8, 16), (32, 32)] {
        let dispatcher = dispatcher(modules, tools);
        let label = format!("{}_tools", modules * tools);

        group.bench_with_input(BenchmarkId::new("valid", &label), &dispatcher, |b, d| {
            b.to_async(&runtime).iter(|| async {
                let request =
                    InvocationRequest::new("m0_echo0", json!({"text": "hello", "mode": "plain"}));
                std::hint::black_box(d.dispatch(request).await)
            })
        });

        group.bench_with_input(BenchmarkId::new("invalid", &label), &dispatcher, |b, d| {
            b.to_async(&runtime).iter(|| async {
                let request = InvocationRequest::new("m0_echo0", json!({"repeat": "twice"}));
                std::hint::black_box(d.dispatch(request).await)
            })
        });

        group.bench_with_input(BenchmarkId::new("unknown", &label), &dispatcher, |b, d| {
            b.to_async(&runtime).iter(|| async {
                let request = InvocationRequest::new("zz_missing", json!({}));
                std::hint::black_box(d.dispatch(request).await)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
