use statecharts::{Chart, ChartBuilder, Interpreter, Snapshot};

fn editor_chart() -> Chart {
    ChartBuilder::new("editor_app")
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
        .expect("editor chart is valid")
}

#[test]
fn a_snapshot_captures_configuration_and_history() {
    let mut editor = Interpreter::new(editor_chart()).expect("sync chart");
    editor.send("toggle").expect("toggle to visual");
    editor.send("open_settings").expect("open settings");

    let snapshot = editor.snapshot().expect("started");
    assert_eq!(snapshot.configuration, ["settings"]);
    assert_eq!(
        snapshot.history.get("editor_history").map(Vec::as_slice),
        Some(["visual".to_string()].as_slice())
    );
}

#[test]
fn restoring_a_snapshot_resumes_where_the_original_left_off() {
    let mut editor = Interpreter::new(editor_chart()).expect("sync chart");
    editor.send("toggle").expect("toggle to visual");
    editor.send("open_settings").expect("open settings");
    let snapshot = editor.snapshot().expect("started");

    let mut resumed =
        Interpreter::restore(editor_chart(), &snapshot).expect("snapshot matches the chart");
    assert_eq!(resumed.configuration().expect("restored"), ["settings"]);

    resumed.send("back").expect("back through restored history");
    assert_eq!(
        resumed.configuration().expect("restored"),
        ["editor", "visual"]
    );
}

#[test]
fn snapshots_round_trip_through_serde() {
    let mut editor = Interpreter::new(editor_chart()).expect("sync chart");
    editor.send("open_settings").expect("open settings");

    let snapshot = editor.snapshot().expect("started");
    let encoded = serde_json::to_string(&snapshot).expect("snapshot serializes");
    let decoded: Snapshot = serde_json::from_str(&encoded).expect("snapshot deserializes");
    assert_eq!(decoded, snapshot);
}

#[test]
fn a_snapshot_naming_unknown_states_is_rejected() {
    let snapshot = Snapshot {
        configuration: vec!["no_such_state".to_string()],
        history: Default::default(),
    };
    assert!(Interpreter::restore(editor_chart(), &snapshot).is_err());
}
