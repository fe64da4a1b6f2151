#![cfg(feature = "async")]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pollster::block_on;
use serde_json::json;
use statecharts::{Action, AsyncInterpreter, Chart, ChartBuilder, Guard, SendError};

fn gate_chart(authorized: &Arc<AtomicBool>) -> Chart {
    let authorized_in_guard = Arc::clone(authorized);
    ChartBuilder::new("gate")
        .allow_event_without_transition(true)
        .state("closed", |s| s.initial())
        .state("open", |s| s)
        .transition("closed", |t| {
            t.on("enter")
                .to("open")
                .guard(Guard::new_async(move |_| {
                    let authorized = Arc::clone(&authorized_in_guard);
                    Box::pin(async move { authorized.load(Ordering::SeqCst) })
                }))
                .action(Action::run_async(|_| {
                    Box::pin(async { Ok(json!("entered")) })
                }))
        })
        .transition("open", |t| t.on("leave").to("closed"))
        .build()
        .expect("gate chart is valid")
}

#[test]
fn sending_before_start_is_rejected_in_async_contexts() {
    let authorized = Arc::new(AtomicBool::new(false));
    block_on(async {
        let mut gate = AsyncInterpreter::new(gate_chart(&authorized)).expect("async chart");
        assert!(matches!(
            gate.send("enter").await,
            Err(SendError::NotStarted)
        ));
    });
}

#[test]
fn async_guards_and_actions_are_awaited_in_place() {
    let authorized = Arc::new(AtomicBool::new(false));
    block_on(async {
        let mut gate = AsyncInterpreter::new(gate_chart(&authorized)).expect("async chart");
        gate.start().await.expect("start succeeds");

        // Guard denies: the event is tolerated and nothing moves.
        gate.send("enter").await.expect("tolerated");
        assert_eq!(gate.configuration().expect("started"), ["closed"]);

        authorized.store(true, Ordering::SeqCst);
        let values = gate.send("enter").await.expect("guard passes now");
        assert_eq!(gate.configuration().expect("started"), ["open"]);
        assert_eq!(values, [json!("entered")]);
    });
}

#[test]
fn the_async_interpreter_matches_sync_semantics_on_sync_charts() {
    block_on(async {
        let chart = ChartBuilder::new("traffic_light")
            .state("green", |s| s.initial())
            .state("yellow", |s| s)
            .state("red", |s| s)
            .transition("green", |t| t.on("cycle").to("yellow"))
            .transition("yellow", |t| t.on("cycle").to("red"))
            .transition("red", |t| t.on("cycle").to("green"))
            .build()
            .expect("chart is valid");

        let mut light = AsyncInterpreter::new(chart).expect("async chart");
        light.start().await.expect("start succeeds");
        for _ in 0..4 {
            light.send("cycle").await.expect("cycle is allowed");
        }
        assert_eq!(light.configuration().expect("started"), ["yellow"]);
    });
}

#[tokio::test]
async fn run_until_terminated_waits_for_delayed_events() {
    let chart = ChartBuilder::new("timer")
        .state("armed", |s| s.initial())
        .state("fired", |s| s.final_state())
        .transition("armed", |t| t.on("timeout").to("fired"))
        .build()
        .expect("timer chart is valid");

    let mut timer = AsyncInterpreter::new(chart).expect("async chart");
    timer.start().await.expect("start succeeds");
    timer
        .send_delayed("timeout", Duration::from_millis(20), None)
        .await
        .expect("scheduling succeeds");
    assert!(!timer.is_terminated());

    timer
        .run_until_terminated()
        .await
        .expect("the timer eventually fires");
    assert!(timer.is_terminated());
    assert_eq!(timer.configuration().expect("started"), ["fired"]);
}
