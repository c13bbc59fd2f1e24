//! Orchestrator and Fast Service Benchmarks
//!
//! Measures:
//! - Task assignment on a running agent (handler without delay)
//! - Cache key construction and lookups
//! - Priority queue push/pop
//! - Fast service submissions answered from the cache

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use hub_core::fast::PriorityQueue;
use hub_core::{
    AgentId, CacheKey, EventBus, FastTaskService, HandlerTable, Orchestrator, QueueConfig,
    ResultCache, SimulationConfig, TaskId, TaskKind, TaskPriority, TaskSpec,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// Benchmark inline task execution through the orchestrator
fn bench_assign_task(c: &mut Criterion) {
    let rt = runtime();
    let orchestrator = Orchestrator::with_default_agents(
        HandlerTable::simulated(&SimulationConfig::instant()),
        Arc::new(EventBus::new()),
    );
    rt.block_on(orchestrator.start());

    let mut group = c.benchmark_group("orchestrator");

    group.bench_function("assign_task_running_agent", |b| {
        let agent = AgentId::new("monitoring");
        b.iter(|| {
            rt.block_on(orchestrator.assign_task(
                &agent,
                TaskSpec::new(TaskKind::Monitoring, "bench"),
            ))
            .unwrap()
        })
    });

    group.bench_function("all_agents_status", |b| {
        b.iter(|| rt.block_on(orchestrator.all_agents_status()))
    });

    group.finish();
}

/// Benchmark canonical key construction for growing inputs
fn bench_cache_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key");

    for fields in [1usize, 10, 100] {
        let input: serde_json::Map<String, serde_json::Value> = (0..fields)
            .map(|i| (format!("field_{}", fields - i), json!({"z": i, "a": [i, i + 1]})))
            .collect();
        let input = serde_json::Value::Object(input);

        group.throughput(Throughput::Elements(fields as u64));
        group.bench_with_input(BenchmarkId::from_parameter(fields), &input, |b, input| {
            b.iter(|| CacheKey::new(TaskKind::CodeGeneration, black_box(input)))
        });
    }

    group.finish();
}

/// Benchmark cache hits and misses
fn bench_cache_lookup(c: &mut Criterion) {
    let rt = runtime();
    let cache = ResultCache::new(10_000, Duration::from_secs(300));
    let hit = CacheKey::new(TaskKind::Monitoring, &json!({"region": "eu"}));
    let miss = CacheKey::new(TaskKind::Monitoring, &json!({"region": "us"}));
    rt.block_on(cache.set(
        hit.clone(),
        hub_core::tasks::CannedReport::report_for(TaskKind::Monitoring),
    ));

    let mut group = c.benchmark_group("result_cache");

    group.bench_function("hit", |b| b.iter(|| rt.block_on(cache.get(black_box(&hit)))));
    group.bench_function("miss", |b| b.iter(|| rt.block_on(cache.get(black_box(&miss)))));
    group.bench_function("concurrent_hits_16", |b| {
        b.iter(|| {
            rt.block_on(futures::future::join_all(
                (0..16).map(|_| cache.get(&hit)),
            ))
        })
    });

    group.finish();
}

/// Benchmark priority queue throughput
fn bench_priority_queue(c: &mut Criterion) {
    let priorities = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Critical,
    ];

    let mut group = c.benchmark_group("priority_queue");

    for size in [16usize, 256, 4096] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("push_pop", size), &size, |b, &size| {
            b.iter(|| {
                let mut queue = PriorityQueue::new(size);
                for i in 0..size {
                    queue
                        .push(TaskId::new(format!("task_{}", i)), priorities[i % 4])
                        .unwrap();
                }
                while let Some(id) = queue.pop() {
                    black_box(id);
                }
            })
        });
    }

    group.finish();
}

/// Benchmark fast service submissions that hit the cache
fn bench_fast_cached_submission(c: &mut Criterion) {
    let rt = runtime();
    let service = FastTaskService::new(
        HandlerTable::fast_without_delays(),
        Arc::new(ResultCache::new(1000, Duration::from_secs(300))),
        QueueConfig::default(),
    );

    rt.block_on(async {
        service.start().await;
        if let hub_core::Submission::Accepted { task_id } = service
            .add_task(TaskKind::Development, json!({"repo": "hub"}), TaskPriority::High)
            .await
            .unwrap()
        {
            service.wait_for(&task_id).await.unwrap();
        }
    });

    c.bench_function("fast_service_cached_submission", |b| {
        b.iter(|| {
            rt.block_on(service.add_task(
                TaskKind::Development,
                json!({"repo": "hub"}),
                TaskPriority::High,
            ))
            .unwrap()
        })
    });

    rt.block_on(service.stop());
}

criterion_group!(
    benches,
    bench_assign_task,
    bench_cache_key,
    bench_cache_lookup,
    bench_priority_queue,
    bench_fast_cached_submission,
);
criterion_main!(benches);
