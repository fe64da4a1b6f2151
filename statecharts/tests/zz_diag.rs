use statecharts::{ChartBuilder, Interpreter};

#[test]
fn diag_minimal_history_start() {
    let chart = ChartBuilder::new("diag")
        .state("editor", |s| {
            s.initial()
                .state("source", |c| c.initial())
                .state("visual", |c| c)
                .shallow_history("editor_history", &["source"])
        })
        .state("settings", |s| s)
        .transition("source", |t| t.on("toggle").to("visual"))
        .transition("visual", |t| t.on("toggle").to("source"))
        .transition("editor", |t| t.on("open_settings").to("settings"))
        .transition("settings", |t| t.on("back").to("editor_history"))
        .build()
        .expect("chart valid");
    let mut i = Interpreter::new(chart).expect("sync chart");
    eprintln!("calling start");
    i.start().expect("start succeeds");
    eprintln!("started");
    assert_eq!(i.configuration().unwrap(), ["editor", "source"]);
}
