//! # Deploy Pipeline: Parallel Regions and Completion Events
//!
//! A deployment runs two regions at once — building and testing — and the
//! release only happens when **both** have finished. This is the natural
//! shape for parallel states plus `done.state.*` aggregation:
//!
//! - Entering the parallel `deploy` state enters *every* region.
//! - Each region completes by entering its own final state, which raises
//!   `done.state.<region>` internally.
//! - When the last region completes, the interpreter raises
//!   `done.state.deploy`, and an ordinary transition on that event moves
//!   the chart to `released` — all within the same macrostep.
//!
//! Run with `RUST_LOG=statecharts=debug` to watch the interpreter's
//! microsteps and queue traffic.

use serde_json::json;
use statecharts::{Action, ChartBuilder, Interpreter};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let chart = ChartBuilder::new("pipeline")
        .state("deploy", |s| {
            s.initial()
                .parallel()
                .state("build", |r| {
                    r.state("compiling", |c| c.initial())
                        .state("compiled", |c| {
                            c.final_state().done_data(|_| json!({ "artifacts": 12 }))
                        })
                })
                .state("tests", |r| {
                    r.state("running", |c| c.initial())
                        .state("passed", |c| c.final_state())
                })
        })
        .state("released", |s| {
            s.final_state()
                .on_entry(Action::run(|_| println!("   [entry] released!")))
        })
        .transition("compiling", |t| t.on("finish_build").to("compiled"))
        .transition("running", |t| t.on("finish_tests").to("passed"))
        .transition("deploy", |t| {
            t.on("done.state.deploy").to("released").action(Action::run(
                |ctx| println!("   [action] aggregate done event `{}`", ctx.event),
            ))
        })
        .allow_event_without_transition(true)
        .build()
        .expect("the chart is well-formed");

    let mut pipeline = Interpreter::new(chart).expect("no async callbacks");
    pipeline.start().expect("initial entry succeeds");
    println!("1. After start: {:?}", pipeline.configuration().unwrap());

    pipeline.send("finish_build").expect("allowed");
    println!(
        "2. Build done, tests still running: {:?}",
        pipeline.configuration().unwrap()
    );

    // The last region to finish triggers the aggregate done event, and the
    // release happens inside this same send.
    pipeline.send("finish_tests").expect("allowed");
    println!("3. Both done: {:?}", pipeline.configuration().unwrap());
    println!("4. Terminated: {}", pipeline.is_terminated());
}
