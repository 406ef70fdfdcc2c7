use serde_json::{json, Map, Value};
use tabflow::core::config::TabflowConfig;
use tabflow::core::dataset::Dataset;
use tabflow::core::pipeline::{Pipeline, StepOutcome};
use tabflow::core::types::PipelineState;

fn values(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn dataset() -> Dataset {
    serde_json::from_value(json!({"A": [1, 2, 2], "B": [4, 5, 5]})).unwrap()
}

fn three_step_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::from_config(&TabflowConfig::default(), Some(dataset())).unwrap();
    for (name, params) in [
        ("multiply_column", json!({"column": "B", "factor": 10})),
        ("drop_duplicates", json!({})),
        ("add_constant", json!({"column": "A", "value": 1})),
    ] {
        let registered = pipeline.catalog().find(name).unwrap().clone();
        pipeline
            .add_step(registered, Some(&values(params)), None)
            .unwrap();
    }
    pipeline
}

#[test]
fn test_advance_walks_every_step() {
    let mut pipeline = three_step_pipeline();
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let StepOutcome::Advanced(first) = pipeline.advance().unwrap() else {
        panic!("expected the first step to run");
    };
    assert_eq!(first.index, 0);
    assert_eq!(pipeline.cursor(), 1);
    assert_eq!(pipeline.state(), PipelineState::Stepping);
    assert_eq!(
        pipeline.working_dataset().column("B").unwrap(),
        &[json!(40), json!(50), json!(50)]
    );

    let StepOutcome::Advanced(second) = pipeline.advance().unwrap() else {
        panic!("expected the second step to run");
    };
    assert_eq!(second.rows, 2);

    assert!(matches!(pipeline.advance().unwrap(), StepOutcome::Advanced(_)));
    assert_eq!(pipeline.state(), PipelineState::Complete);
    assert_eq!(pipeline.advance().unwrap(), StepOutcome::Complete);
    assert_eq!(pipeline.cursor(), 3);
}

#[test]
fn test_stepping_matches_full_run() {
    let mut stepped = three_step_pipeline();
    let records = stepped.advance_to_end().unwrap();
    assert_eq!(records.len(), 3);

    let mut full = three_step_pipeline();
    full.run().unwrap();

    assert_eq!(stepped.working_dataset(), full.working_dataset());
}

#[test]
fn test_start_stepping_resets_session() {
    let mut pipeline = three_step_pipeline();
    pipeline.advance_to_end().unwrap();

    pipeline.start_stepping();
    assert_eq!(pipeline.cursor(), 0);
    assert_eq!(pipeline.state(), PipelineState::Stepping);
    assert_eq!(pipeline.working_dataset(), &dataset());
}

#[test]
fn test_empty_pipeline_completes_immediately() {
    let mut pipeline = Pipeline::new(Some(dataset()));
    pipeline.start_stepping();
    assert_eq!(pipeline.state(), PipelineState::Complete);
    assert_eq!(pipeline.advance().unwrap(), StepOutcome::Complete);
}

#[test]
fn test_adding_step_after_completion_resumes() {
    let mut pipeline = three_step_pipeline();
    pipeline.advance_to_end().unwrap();

    let registered = pipeline.catalog().find("drop_columns").unwrap().clone();
    pipeline
        .add_step(registered, Some(&values(json!({"columns": ["A"]}))), None)
        .unwrap();
    assert_eq!(pipeline.state(), PipelineState::Stepping);

    let StepOutcome::Advanced(record) = pipeline.advance().unwrap() else {
        panic!("expected the new step to run");
    };
    assert_eq!(record.index, 3);
    assert_eq!(pipeline.working_dataset().column_names(), vec!["B"]);
    assert_eq!(pipeline.state(), PipelineState::Complete);
}

#[test]
fn test_failed_advance_keeps_cursor() {
    let mut pipeline = three_step_pipeline();
    pipeline.advance().unwrap();
    let registered = pipeline.catalog().find("multiply_column").unwrap().clone();
    pipeline
        .add_step(registered, Some(&values(json!({"column": "Z", "factor": 1}))), None)
        .unwrap();

    pipeline.advance().unwrap();
    pipeline.advance().unwrap();
    let err = pipeline.advance().unwrap_err();
    assert_eq!(err.code, "TF-STEP-001");
    assert_eq!(pipeline.cursor(), 3);
    assert_eq!(pipeline.state(), PipelineState::Stepping);

    pipeline.remove_step(3);
    assert_eq!(pipeline.state(), PipelineState::Complete);
}

#[test]
fn test_removing_executed_step_invalidates_session() {
    let mut pipeline = three_step_pipeline();
    pipeline.advance().unwrap();
    pipeline.advance().unwrap();

    assert!(pipeline.remove_step(0).is_some());
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(pipeline.cursor(), 0);

    pipeline.advance_to_end().unwrap();
    assert_eq!(
        pipeline.working_dataset().column("A").unwrap(),
        &[json!(2), json!(3)]
    );
    assert_eq!(
        pipeline.working_dataset().column("B").unwrap(),
        &[json!(4), json!(5)]
    );
}

#[test]
fn test_removing_pending_step_keeps_session() {
    let mut pipeline = three_step_pipeline();
    pipeline.advance().unwrap();

    pipeline.remove_step(2);
    assert_eq!(pipeline.state(), PipelineState::Stepping);
    assert_eq!(pipeline.cursor(), 1);
    assert!(pipeline.remove_step(10).is_none());
    assert_eq!(pipeline.len(), 2);
}
