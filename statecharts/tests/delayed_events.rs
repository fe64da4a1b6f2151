use std::time::Duration;

use statecharts::{Chart, ChartBuilder, Interpreter};

fn relay_chart() -> Chart {
    ChartBuilder::new("relay")
        .allow_event_without_transition(true)
        .state("off", |s| s.initial())
        .state("on", |s| s)
        .transition("off", |t| t.on("close").to("on"))
        .transition("on", |t| t.on("open").to("off"))
        .build()
        .expect("relay chart is valid")
}

#[test]
fn a_zero_delay_event_fires_on_the_same_drive() {
    let mut relay = Interpreter::new(relay_chart()).expect("sync chart");
    relay
        .send_delayed("close", Duration::ZERO, None)
        .expect("scheduling succeeds");
    assert_eq!(relay.configuration().expect("started"), ["on"]);
}

#[test]
fn an_unexpired_delayed_event_does_not_fire_early() {
    let mut relay = Interpreter::new(relay_chart()).expect("sync chart");
    relay
        .send_delayed("close", Duration::from_secs(3600), None)
        .expect("scheduling succeeds");
    assert_eq!(relay.configuration().expect("started"), ["off"]);
}

#[test]
fn cancelling_an_unfired_event_removes_it() {
    let mut relay = Interpreter::new(relay_chart()).expect("sync chart");
    relay
        .send_delayed("close", Duration::from_secs(3600), Some("breaker"))
        .expect("scheduling succeeds");

    assert!(relay.cancel("breaker"));
    assert!(!relay.cancel("breaker"), "cancel is idempotent");
    assert_eq!(relay.configuration().expect("started"), ["off"]);
}

#[test]
fn simultaneous_due_times_fire_in_insertion_order() {
    let mut relay = Interpreter::new(relay_chart()).expect("sync chart");
    relay.start().expect("start succeeds");
    relay
        .send_delayed("close", Duration::from_millis(5), None)
        .expect("scheduling succeeds");
    relay
        .send_delayed("open", Duration::from_millis(5), None)
        .expect("scheduling succeeds");
    assert_eq!(relay.configuration().expect("started"), ["off"]);

    std::thread::sleep(Duration::from_millis(25));
    // Both are overdue now; `close` then `open` is insertion order, so the
    // relay ends where it started.
    relay.raise_internal("tick").expect("tick is tolerated");
    assert_eq!(relay.configuration().expect("started"), ["off"]);
}
