use statecharts::{ChartBuilder, DefinitionError, Guard, Interpreter};

#[test]
fn a_chart_without_an_initial_state_is_rejected() {
    let result = ChartBuilder::new("no_initial")
        .state("a", |s| s)
        .state("b", |s| s)
        .transition("a", |t| t.on("go").to("b"))
        .build();
    assert!(matches!(result, Err(DefinitionError::NoInitialState)));
}

#[test]
fn multiple_initial_states_are_rejected() {
    let result = ChartBuilder::new("two_initials")
        .state("a", |s| s.initial())
        .state("b", |s| s.initial())
        .transition("a", |t| t.on("go").to("b"))
        .build();
    assert!(matches!(
        result,
        Err(DefinitionError::MultipleInitialStates(_))
    ));
}

#[test]
fn duplicate_state_names_are_rejected() {
    let result = ChartBuilder::new("duplicates")
        .state("a", |s| s.initial())
        .state("a", |s| s)
        .build();
    assert!(matches!(result, Err(DefinitionError::DuplicateState(_))));
}

#[test]
fn unknown_transition_targets_are_rejected() {
    let result = ChartBuilder::new("dangling")
        .state("a", |s| s.initial())
        .transition("a", |t| t.on("go").to("nowhere"))
        .build();
    assert!(matches!(result, Err(DefinitionError::UnknownState(name)) if name == "nowhere"));
}

#[test]
fn transitions_from_final_states_are_rejected() {
    let result = ChartBuilder::new("undead")
        .state("a", |s| s.initial())
        .state("finished", |s| s.final_state())
        .transition("a", |t| t.on("finish").to("finished"))
        .transition("finished", |t| t.on("resurrect").to("a"))
        .build();
    assert!(matches!(
        result,
        Err(DefinitionError::TransitionFromFinal(name)) if name == "finished"
    ));
}

#[test]
fn unreachable_states_are_rejected_unless_disabled() {
    let build = |validate: bool| {
        ChartBuilder::new("island")
            .validate_disconnected_states(validate)
            .state("mainland", |s| s.initial())
            .state("island", |s| s)
            .transition("island", |t| t.on("swim").to("mainland"))
            .build()
    };
    assert!(matches!(
        build(true),
        Err(DefinitionError::UnreachableState(name)) if name == "island"
    ));
    assert!(build(false).is_ok());
}

#[test]
fn strict_states_rejects_dead_ends() {
    let result = ChartBuilder::new("trap")
        .strict_states(true)
        .state("start", |s| s.initial())
        .state("pit", |s| s)
        .transition("start", |t| t.on("fall").to("pit"))
        .build();
    assert!(matches!(
        result,
        Err(DefinitionError::DeadEndState(name)) if name == "pit"
    ));
}

#[test]
fn targetless_transitions_must_be_internal() {
    let result = ChartBuilder::new("aimless")
        .state("a", |s| s.initial())
        .transition("a", |t| t.on("ping"))
        .build();
    assert!(matches!(
        result,
        Err(DefinitionError::TargetlessExternal(_))
    ));
}

#[test]
fn history_defaults_must_be_descendants_of_the_parent() {
    let result = ChartBuilder::new("lost_history")
        .state("editor", |s| {
            s.initial()
                .state("source", |c| c.initial())
                .shallow_history("h", &["outside"])
        })
        .state("outside", |s| s)
        .transition("source", |t| t.on("leave").to("outside"))
        .transition("outside", |t| t.on("back").to("h"))
        .build();
    assert!(matches!(
        result,
        Err(DefinitionError::InvalidHistoryDefault(_, _))
    ));
}

#[test]
fn final_states_cannot_sit_directly_inside_a_parallel() {
    let result = ChartBuilder::new("bad_parallel")
        .state("both", |s| {
            s.initial()
                .parallel()
                .state("left", |r| {
                    r.state("l1", |c| c.initial())
                })
                .state("oops", |r| r.final_state())
        })
        .build();
    assert!(matches!(
        result,
        Err(DefinitionError::FinalChildOfParallel(name)) if name == "oops"
    ));
}

#[test]
fn charts_with_async_callbacks_are_rejected_by_the_sync_interpreter() {
    let chart = ChartBuilder::new("needs_await")
        .state("a", |s| s.initial())
        .state("b", |s| s)
        .transition("a", |t| {
            t.on("go")
                .to("b")
                .guard(Guard::new_async(|_| Box::pin(async { true })))
        })
        .build()
        .expect("the chart itself is valid");
    assert!(matches!(
        Interpreter::new(chart),
        Err(DefinitionError::AsyncCallbacks(_))
    ));
}
