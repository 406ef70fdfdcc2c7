use serde_json::{json, Map, Value};
use std::sync::Arc;
use tabflow::core::catalog::Catalog;
use tabflow::core::dataset::Dataset;
use tabflow::core::descriptor::{
    BindingStrategy, ParameterKind, RegisteredTransformation, ScriptEngine, TransformationDescriptor,
    TransformationSource,
};
use tabflow::core::types::ErrorCategory;

fn dataset() -> Dataset {
    serde_json::from_value(json!({"A": [1, 2, 3], "B": [4, 5, 6]})).unwrap()
}

fn values(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn scale() -> RegisteredTransformation {
    RegisteredTransformation::builder("scale")
        .doc("Multiply a column.")
        .dataset("data")
        .param("column", "String")
        .param_with_default("factor", "f64", json!(2))
        .build(|mut data, args| {
            let column = args.str("column")?.to_string();
            let factor = args.f64("factor")?;
            let scaled = data
                .require_column(&column)?
                .iter()
                .map(|cell| json!(cell.as_f64().unwrap_or(0.0) * factor))
                .collect();
            data.set_column(column, scaled)?;
            Ok(data)
        })
        .unwrap()
}

#[test]
fn test_descriptor_mirrors_registered_signature() {
    let descriptor = TransformationDescriptor::from_registered(&scale());

    assert_eq!(descriptor.name(), "data = scale(data, column, factor)");
    assert_eq!(descriptor.function_name(), "scale");
    assert_eq!(descriptor.documentation(), Some("Multiply a column."));
    assert_eq!(descriptor.return_annotation(), Some("Dataset"));
    assert_eq!(descriptor.parameters().len(), 3);
    assert_eq!(descriptor.user_parameters()[1].default_value, Some(json!(2)));
    assert!(!descriptor.is_scripted());
}

#[test]
fn test_invoke_with_saved_values() {
    let mut descriptor = TransformationDescriptor::from_registered(&scale());
    assert!(descriptor
        .bind(&values(json!({"column": "A", "factor": 3})))
        .is_empty());

    let output = descriptor.invoke(dataset(), &BindingStrategy::Saved).unwrap();
    assert_eq!(output.column("A").unwrap(), &[json!(3.0), json!(6.0), json!(9.0)]);
    assert_eq!(output.column("B"), dataset().column("B"));
}

#[test]
fn test_defaults_strategy_ignores_bound_values() {
    let mut descriptor = TransformationDescriptor::from_registered(&scale());
    descriptor.bind(&values(json!({"column": "A", "factor": 3})));

    let err = descriptor
        .invoke(dataset(), &BindingStrategy::Defaults)
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::StepExecutionError);

    let output = descriptor
        .invoke(
            dataset(),
            &BindingStrategy::DefaultsWithOverrides(values(json!({"column": "B"}))),
        )
        .unwrap();
    assert_eq!(output.column("B").unwrap(), &[json!(8.0), json!(10.0), json!(12.0)]);
}

#[test]
fn test_variadic_arguments() {
    let registered = RegisteredTransformation::builder("tag")
        .dataset("data")
        .variadic("labels")
        .variadic_keywords("extra")
        .build(|mut data, args| {
            let rows = data.n_rows();
            data.set_column("labels", vec![json!(args.variadic().len()); rows])?;
            data.set_column("extra", vec![json!(args.variadic_keywords().len()); rows])?;
            Ok(data)
        })
        .unwrap();
    assert_eq!(registered.parameters()[1].kind, ParameterKind::VariadicPositional);

    let mut descriptor = TransformationDescriptor::from_registered(&registered);
    assert_eq!(descriptor.name(), "data = tag(data, *labels, **extra)");

    // Variadics need no bound value.
    let output = descriptor.invoke(dataset(), &BindingStrategy::Saved).unwrap();
    assert_eq!(output.column("labels").unwrap()[0], json!(0));

    descriptor.bind(&values(json!({"labels": "x", "extra": {"a": 1, "b": 2}})));
    let output = descriptor.invoke(dataset(), &BindingStrategy::Saved).unwrap();
    assert_eq!(output.column("labels").unwrap()[0], json!(1));
    assert_eq!(output.column("extra").unwrap()[0], json!(2));

    descriptor.bind(&values(json!({"extra": [1, 2]})));
    let err = descriptor.invoke(dataset(), &BindingStrategy::Saved).unwrap_err();
    assert_eq!(err.code, "TF-STEP-001");
}

#[test]
fn test_signature_validation() {
    let err = RegisteredTransformation::builder("nothing")
        .build(|data, _| Ok(data))
        .unwrap_err();
    assert_eq!(err.code, "TF-RESOLVE-004");

    let err = RegisteredTransformation::builder("dup")
        .dataset("data")
        .param("x", "i64")
        .param("x", "i64")
        .build(|data, _| Ok(data))
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::ValidationError);
}

#[test]
fn test_registered_record_round_trip_through_catalog() {
    let mut builder = Catalog::builder();
    builder.register("Custom", scale());
    let catalog = builder.build();
    let engine = Arc::new(ScriptEngine::default());

    let mut original = TransformationDescriptor::resolve(
        TransformationSource::from(catalog.get("Custom", "scale").unwrap()),
        &engine,
        &catalog,
    )
    .unwrap()
    .with_name("Scale A");
    original.bind(&values(json!({"column": "A"})));

    let record = original.to_record();
    assert_eq!(record.origin_module.as_deref(), Some("Custom"));
    assert!(record.source_text.is_none());

    let json = serde_json::to_string(&record).unwrap();
    let restored = TransformationDescriptor::resolve(
        TransformationSource::Record(serde_json::from_str(&json).unwrap()),
        &engine,
        &catalog,
    )
    .unwrap();

    assert_eq!(restored.name(), "Scale A");
    assert_eq!(restored.parameters(), original.parameters());
    assert_eq!(
        restored.invoke(dataset(), &BindingStrategy::Saved).unwrap(),
        original.invoke(dataset(), &BindingStrategy::Saved).unwrap()
    );
}

#[test]
fn test_saved_binding_falls_back_to_declared_default() {
    let mut builder = Catalog::builder();
    builder.register("Custom", scale());
    let catalog = builder.build();
    let engine = Arc::new(ScriptEngine::default());

    let mut descriptor = TransformationDescriptor::resolve(
        TransformationSource::from(catalog.get("Custom", "scale").unwrap()),
        &engine,
        &catalog,
    )
    .unwrap();
    descriptor.bind(&values(json!({"column": "A"})));

    let output = descriptor.invoke(dataset(), &BindingStrategy::Saved).unwrap();
    assert_eq!(output.column("A").unwrap(), &[json!(2.0), json!(4.0), json!(6.0)]);

    descriptor.unbind();
    let err = descriptor.invoke(dataset(), &BindingStrategy::Saved).unwrap_err();
    assert_eq!(err.code, "TF-STEP-002");
}

#[test]
fn test_stale_native_record_is_rejected() {
    let mut builder = Catalog::builder();
    builder.register("Custom", scale());
    let catalog = builder.build();
    let engine = Arc::new(ScriptEngine::default());
    let descriptor = TransformationDescriptor::from_registered(catalog.get("Custom", "scale").unwrap());

    let mut renamed = descriptor.to_record();
    renamed.parameters[1].name = "renamed".to_string();
    let err = TransformationDescriptor::resolve(TransformationSource::Record(renamed), &engine, &catalog)
        .unwrap_err();
    assert_eq!(err.code, "TF-RESOLVE-005");
    assert!(err.message.contains("registered callable"));

    let mut truncated = descriptor.to_record();
    truncated.parameters.pop();
    let err = TransformationDescriptor::resolve(TransformationSource::Record(truncated), &engine, &catalog)
        .unwrap_err();
    assert_eq!(err.code, "TF-RESOLVE-005");

    let mut rekinded = descriptor.to_record();
    rekinded.parameters[2].kind = ParameterKind::Keyword;
    assert!(
        TransformationDescriptor::resolve(TransformationSource::Record(rekinded), &engine, &catalog)
            .is_err()
    );
}
