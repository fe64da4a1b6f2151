use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use statecharts::{Chart, ChartBuilder, Interpreter};

fn flat_chart() -> Arc<Chart> {
    Arc::new(
        ChartBuilder::new("traffic_light")
            .state("green", |s| s.initial())
            .state("yellow", |s| s)
            .state("red", |s| s)
            .transition("green", |t| t.on("cycle").to("yellow"))
            .transition("yellow", |t| t.on("cycle").to("red"))
            .transition("red", |t| t.on("cycle").to("green"))
            .build()
            .expect("chart is valid"),
    )
}

fn hierarchical_chart() -> Arc<Chart> {
    Arc::new(
        ChartBuilder::new("deployment")
            .state("deploy", |s| {
                s.initial()
                    .parallel()
                    .state("build", |r| {
                        r.state("compiling", |c| c.initial())
                            .state("compiled", |c| c.final_state())
                    })
                    .state("tests", |r| {
                        r.state("running", |c| c.initial())
                            .state("passed", |c| c.final_state())
                    })
            })
            .state("released", |s| s.final_state())
            .transition("compiling", |t| t.on("finish_build").to("compiled"))
            .transition("running", |t| t.on("finish_tests").to("passed"))
            .transition("deploy", |t| t.on("done.state.deploy").to("released"))
            .build()
            .expect("chart is valid"),
    )
}

fn benchmark_flat_dispatch(c: &mut Criterion) {
    let chart = flat_chart();
    c.bench_function("flat_dispatch", |b| {
        b.iter(|| {
            let mut light = Interpreter::new(Arc::clone(&chart)).expect("sync chart");
            for _ in 0..3 {
                black_box(light.send("cycle").expect("cycle is allowed"));
            }
            light
        });
    });
}

fn benchmark_parallel_completion(c: &mut Criterion) {
    let chart = hierarchical_chart();
    c.bench_function("parallel_completion", |b| {
        b.iter(|| {
            let mut deploy = Interpreter::new(Arc::clone(&chart)).expect("sync chart");
            black_box(deploy.send("finish_build").expect("allowed"));
            black_box(deploy.send("finish_tests").expect("allowed"));
            deploy
        });
    });
}

criterion_group!(benches, benchmark_flat_dispatch, benchmark_parallel_completion);
criterion_main!(benches);
