//! # Traffic Light: Declaring and Driving a Chart
//!
//! This walk-through covers the fundamental loop of the library:
//!
//! 1. **Declare** a chart once with [`ChartBuilder`] — states, transitions,
//!    guards, actions — and freeze it with `build()`.
//! 2. **Wrap** it in an [`Interpreter`]; the chart is immutable and could
//!    back any number of interpreters.
//! 3. **Drive** it with `send(event)`. The interpreter selects the enabled
//!    transition, runs exit/transition/entry actions in order, and drains
//!    any internal events before returning (run-to-completion).
//!
//! The chart here is the classic three-state ring plus a guarded pedestrian
//! request, which shows how event payloads reach guards and actions through
//! the callback context.

use serde_json::json;
use statecharts::{Action, ChartBuilder, Event, Guard, Interpreter};

fn main() {
    let chart = ChartBuilder::new("traffic_light")
        .state("green", |s| s.initial())
        .state("yellow", |s| s)
        .state("red", |s| {
            s.on_entry(Action::run(|ctx| {
                println!("   [entry] red lit while handling `{}`", ctx.event);
            }))
        })
        .transition("green", |t| t.on("cycle").to("yellow"))
        .transition("yellow", |t| t.on("cycle").to("red"))
        .transition("red", |t| t.on("cycle").to("green"))
        // A pedestrian may force yellow from green, but only outside rush
        // hour. The guard reads the event payload.
        .transition("green", |t| {
            t.on("pedestrian")
                .to("yellow")
                .guard(Guard::new(|ctx| {
                    !ctx.event_data["rush_hour"].as_bool().unwrap_or(false)
                }))
                .action(Action::run(|_| println!("   [action] pedestrian served")))
        })
        .allow_event_without_transition(true)
        .build()
        .expect("the chart is well-formed");

    let mut light = Interpreter::new(chart).expect("no async callbacks");
    light.start().expect("initial entry succeeds");
    println!("1. After start: {:?}", light.configuration().unwrap());

    light.send("cycle").expect("cycle is allowed");
    light.send("cycle").expect("cycle is allowed");
    println!("2. After two cycles: {:?}", light.configuration().unwrap());

    light.send("cycle").expect("cycle is allowed");
    println!("3. Back to: {:?}", light.configuration().unwrap());

    // Guard holds: rush hour, the pedestrian waits. The event matches no
    // enabled transition, and this chart tolerates that.
    light
        .send(Event::new("pedestrian").with_data(json!({ "rush_hour": true })))
        .expect("tolerated");
    println!("4. Rush hour, still: {:?}", light.configuration().unwrap());

    light
        .send(Event::new("pedestrian").with_data(json!({ "rush_hour": false })))
        .expect("pedestrian is allowed");
    println!("5. Pedestrian got: {:?}", light.configuration().unwrap());

    println!("\nEvents the light would accept here: {:?}", light.allowed_events().unwrap());
}
