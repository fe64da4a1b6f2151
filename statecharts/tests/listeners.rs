use std::sync::{Arc, Mutex};

use statecharts::{CallbackContext, ChartBuilder, Event, Interpreter, Listener};

#[derive(Default)]
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Listener for Recorder {
    fn on_event(&mut self, event: &Event) {
        self.log.lock().unwrap().push(format!("event:{}", event.name));
    }

    fn on_transition(&mut self, ctx: &CallbackContext) {
        self.log.lock().unwrap().push(format!(
            "transition:{}->{}",
            ctx.source.as_deref().unwrap_or("?"),
            ctx.target.as_deref().unwrap_or("?"),
        ));
    }

    fn on_entry(&mut self, state: &str, _ctx: &CallbackContext) {
        self.log.lock().unwrap().push(format!("enter:{state}"));
    }

    fn on_exit(&mut self, state: &str, _ctx: &CallbackContext) {
        self.log.lock().unwrap().push(format!("exit:{state}"));
    }
}

#[test]
fn listeners_observe_events_transitions_and_state_changes() {
    let chart = ChartBuilder::new("observed")
        .state("a", |s| s.initial())
        .state("b", |s| s)
        .transition("a", |t| t.on("go").to("b"))
        .build()
        .expect("chart is valid");

    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut machine = Interpreter::new(chart).expect("sync chart");
    machine.start().expect("start succeeds");
    machine.add_listener(Box::new(Recorder {
        log: Arc::clone(&log),
    }));

    machine.send("go").expect("go is allowed");

    assert_eq!(
        log.lock().unwrap().as_slice(),
        ["event:go", "exit:a", "transition:a->b", "enter:b"]
    );
}

#[test]
fn removed_listeners_stop_observing() {
    let chart = ChartBuilder::new("observed")
        .state("a", |s| s.initial())
        .state("b", |s| s)
        .transition("a", |t| t.on("go").to("b"))
        .transition("b", |t| t.on("back").to("a"))
        .build()
        .expect("chart is valid");

    let log: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut machine = Interpreter::new(chart).expect("sync chart");
    machine.start().expect("start succeeds");
    let id = machine.add_listener(Box::new(Recorder {
        log: Arc::clone(&log),
    }));

    machine.send("go").expect("go is allowed");
    let seen_before_removal = log.lock().unwrap().len();
    assert!(machine.remove_listener(id));
    assert!(!machine.remove_listener(id));

    machine.send("back").expect("back is allowed");
    assert_eq!(log.lock().unwrap().len(), seen_before_removal);
}
