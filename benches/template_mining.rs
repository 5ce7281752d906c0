//! Template Mining and Posterior Query Benchmarks
//!
//! Mining is quadratic in the number of *distinct* messages; duplicates are
//! merged by the exact-match pass first. Corpora below mix both.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use faultline::bayes::BayesianModel;
use faultline::causal_graph::{CausalGraphBuilder, EvidenceWindow};
use faultline::template::TemplateSet;
use faultline::training::OccurrenceMatrix;
use std::collections::BTreeSet;
use std::time::Duration;

const SHAPES: [&str; 8] = [
    "disk full on volume",
    "link down on port",
    "oom killer invoked",
    "slow query detected",
    "heartbeat ok",
    "certificate expired",
    "queue backlog growing",
    "retrying connection",
];

/// `distinct` messages, each repeated `repeat` times
fn corpus(distinct: usize, repeat: usize) -> Vec<String> {
    (0..distinct)
        .flat_map(|i| {
            let message = format!("{} #{}", SHAPES[i % SHAPES.len()], i);
            std::iter::repeat(message).take(repeat)
        })
        .collect()
}

fn bench_mining(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_mining");
    group.measurement_time(Duration::from_secs(5));

    for distinct in [50, 200, 800] {
        let messages = corpus(distinct, 10);
        group.throughput(Throughput::Elements(messages.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(distinct),
            &messages,
            |b, messages| b.iter(|| TemplateSet::mine(black_box(messages), 0.8)),
        );
    }

    group.finish();
}

fn bench_template_lookup(c: &mut Criterion) {
    let templates = TemplateSet::mine(&corpus(400, 1), 0.8);
    let mut group = c.benchmark_group("template_lookup");
    group.throughput(Throughput::Elements(1));

    group.bench_function("matching_message", |b| {
        b.iter(|| templates.template_for(black_box("queue backlog growing #6")))
    });
    group.bench_function("unmatched_message", |b| {
        b.iter(|| templates.template_for(black_box("zzzz")))
    });

    group.finish();
}

fn bench_posterior(c: &mut Criterion) {
    let n = 24;
    let windows: Vec<EvidenceWindow> = (0..300)
        .map(|i| EvidenceWindow {
            root_template: i % 6,
            evidence_templates: (0..n).filter(|t| (t * 7 + i) % 5 == 0).collect(),
        })
        .collect();
    let graph = CausalGraphBuilder::new(3).build(&windows, n);
    let data = OccurrenceMatrix::from_windows(&windows, n);
    let model = match BayesianModel::fit(graph, &data, 5.0) {
        Ok(model) => model,
        Err(e) => panic!("benchmark model failed to fit: {}", e),
    };
    let evidence: BTreeSet<usize> = (6..12).collect();

    c.bench_function("posterior_6_evidence", |b| {
        b.iter(|| model.posterior(black_box(0), black_box(&evidence)))
    });
}

criterion_group!(benches, bench_mining, bench_template_lookup, bench_posterior);
criterion_main!(benches);
