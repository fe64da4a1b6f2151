use std::sync::{Arc, Mutex};

use statecharts::{Action, ChartBuilder, Interpreter};

fn tracking_actions() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Action) {
    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let log_handle = Arc::clone(&log);
    let track = move |label: &str| {
        let log = Arc::clone(&log_handle);
        let label = label.to_string();
        Action::run(move |_| log.lock().unwrap().push(label.clone()))
    };
    (log, track)
}

#[test]
fn self_transition_exits_and_reenters_by_default() {
    let (log, track) = tracking_actions();
    let chart = ChartBuilder::new("heartbeat")
        .state("alive", |s| {
            s.initial()
                .on_entry(track("enter"))
                .on_exit(track("exit"))
        })
        .transition("alive", |t| t.on("beat").to("alive").action(track("beat")))
        .build()
        .expect("heartbeat chart is valid");

    let mut machine = Interpreter::new(chart).expect("sync chart");
    machine.start().expect("start succeeds");
    machine.send("beat").expect("beat is allowed");

    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["enter", "exit", "beat", "enter"]
    );
}

#[test]
fn legacy_mode_skips_exit_and_entry_on_self_transitions() {
    let (log, track) = tracking_actions();
    let chart = ChartBuilder::new("heartbeat")
        .enable_self_transition_entries(false)
        .state("alive", |s| {
            s.initial()
                .on_entry(track("enter"))
                .on_exit(track("exit"))
        })
        .transition("alive", |t| t.on("beat").to("alive").action(track("beat")))
        .build()
        .expect("heartbeat chart is valid");

    let mut machine = Interpreter::new(chart).expect("sync chart");
    machine.start().expect("start succeeds");
    machine.send("beat").expect("beat is allowed");

    assert_eq!(log.lock().unwrap().as_slice(), ["enter", "beat"]);
    assert_eq!(machine.configuration().expect("started"), ["alive"]);
}

#[test]
fn callbacks_see_previous_and_new_configuration() {
    let observed: Arc<Mutex<Vec<(Vec<String>, Vec<String>)>>> = Arc::default();
    let observed_in_action = Arc::clone(&observed);

    let chart = ChartBuilder::new("observer")
        .state("a", |s| s.initial())
        .state("b", |s| s)
        .transition("a", |t| {
            t.on("go").to("b").action(Action::run(move |ctx| {
                observed_in_action.lock().unwrap().push((
                    ctx.previous_configuration.clone(),
                    ctx.new_configuration.clone(),
                ));
            }))
        })
        .build()
        .expect("observer chart is valid");

    let mut machine = Interpreter::new(chart).expect("sync chart");
    machine.send("go").expect("go is allowed");

    let observed = observed.lock().unwrap();
    assert_eq!(observed.as_slice(), [(vec!["a".to_string()], vec!["b".to_string()])]);
}

#[test]
fn atomic_configuration_update_mode_behaves_identically_from_outside() {
    let chart = ChartBuilder::new("legacy_swap")
        .atomic_configuration_update(true)
        .state("a", |s| s.initial())
        .state("b", |s| s)
        .transition("a", |t| t.on("go").to("b"))
        .transition("b", |t| t.on("back").to("a"))
        .build()
        .expect("legacy chart is valid");

    let mut machine = Interpreter::new(chart).expect("sync chart");
    machine.send("go").expect("go is allowed");
    assert_eq!(machine.configuration().expect("started"), ["b"]);
    machine.send("back").expect("back is allowed");
    assert_eq!(machine.configuration().expect("started"), ["a"]);
}
