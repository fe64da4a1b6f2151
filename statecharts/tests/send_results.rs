use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use statecharts::{Action, ChartBuilder, Interpreter};

#[test]
fn send_returns_on_transition_values_in_invocation_order() {
    let chart = ChartBuilder::new("calculator")
        .state("ready", |s| s.initial())
        .state("computed", |s| s)
        .transition("ready", |t| {
            t.on("compute")
                .to("computed")
                .action(Action::returning(|_| json!(42)))
                .action(Action::run(|_| {}))
                .action(Action::returning(|ctx| ctx.event_data["x"].clone()))
        })
        .build()
        .expect("chart is valid");

    let mut machine = Interpreter::new(chart).expect("sync chart");
    let values = machine
        .send(statecharts::Event::new("compute").with_data(json!({ "x": 7 })))
        .expect("compute is allowed");

    // A declared callback returning nothing still contributes `Null`.
    assert_eq!(values, [json!(42), Value::Null, json!(7)]);
}

#[test]
fn before_and_after_groups_bracket_the_transition() {
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let track = |label: &str| {
        let log = Arc::clone(&log);
        let label = label.to_string();
        Action::run(move |_| log.lock().unwrap().push(label.clone()))
    };

    let chart = ChartBuilder::new("bracketed")
        .state("a", |s| s.initial().on_exit(track("exit:a")))
        .state("b", |s| s.on_entry(track("enter:b")))
        .transition("a", |t| {
            t.on("go")
                .to("b")
                .before(track("before"))
                .action(track("on"))
                .after(track("after"))
        })
        .build()
        .expect("chart is valid");

    let mut machine = Interpreter::new(chart).expect("sync chart");
    machine.send("go").expect("go is allowed");

    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["exit:a", "before", "on", "enter:b", "after"]
    );
}

#[test]
fn chained_internal_events_do_not_contribute_to_the_senders_results() {
    let chart = ChartBuilder::new("chained")
        .state("first", |s| s.initial())
        .state("second", |s| s)
        .state("third", |s| s)
        .transition("first", |t| {
            t.on("go")
                .to("second")
                .action(Action::returning(|_| json!("direct")))
                .action(Action::raise("follow_up"))
        })
        .transition("second", |t| {
            t.on("follow_up")
                .to("third")
                .action(Action::returning(|_| json!("chained")))
        })
        .build()
        .expect("chart is valid");

    let mut machine = Interpreter::new(chart).expect("sync chart");
    let values = machine.send("go").expect("go is allowed");

    // The follow-up transition fired within the same macrostep, but only
    // the directly triggered transition reports its values.
    assert_eq!(machine.configuration().expect("started"), ["third"]);
    assert_eq!(values, [json!("direct"), Value::Null]);
}
