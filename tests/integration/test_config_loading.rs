use serial_test::serial;
use std::env;
use std::fs;
use tabflow::core::config::{ConfigLoader, TabflowConfig};
use tabflow::core::dataset::Dataset;
use tabflow::core::descriptor::{ScriptEngine, TransformationSource};
use tabflow::core::pipeline::Pipeline;
use tempfile::TempDir;

fn clear_tabflow_env() {
    for v in &[
        "TABFLOW_SCRIPT_MAX_OPERATIONS",
        "TABFLOW_SCRIPT_MAX_CALL_LEVELS",
        "TABFLOW_SCRIPT_MAX_EXPR_DEPTH",
        "TABFLOW_SCRIPT_MAX_COLLECTION_SIZE",
        "TABFLOW_PIPELINE_BUILTIN_CATALOG",
        "TABFLOW_PIPELINE_STRICT_BINDING",
    ] {
        env::remove_var(v);
    }
}

fn write_config(dir: &TempDir, content: &str) {
    fs::write(dir.path().join("tabflow.toml"), content).unwrap();
}

#[test]
#[serial]
fn test_config_loading_integration() {
    clear_tabflow_env();
    let temp_dir = TempDir::new().unwrap();
    write_config(
        &temp_dir,
        r#"
[script]
max_operations = 20000
max_call_levels = 8
max_expr_depth = 16
max_collection_size = 5000

[pipeline]
builtin_catalog = false
strict_binding = true
"#,
    );

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert_eq!(config.script.max_operations, 20000);
    assert_eq!(config.script.max_call_levels, 8);
    assert_eq!(config.script.max_expr_depth, 16);
    assert_eq!(config.script.max_collection_size, 5000);
    assert!(!config.pipeline.builtin_catalog);
    assert!(config.pipeline.strict_binding);
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_tabflow_env();
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[pipeline]\nbuiltin_catalog = false\n");

    env::set_var("TABFLOW_PIPELINE_BUILTIN_CATALOG", "true");
    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert!(config.pipeline.builtin_catalog);
    clear_tabflow_env();
}

#[test]
#[serial]
fn test_zero_limit_is_rejected() {
    clear_tabflow_env();
    let temp_dir = TempDir::new().unwrap();
    write_config(&temp_dir, "[script]\nmax_call_levels = 0\n");

    let err = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap_err();
    assert_eq!(err.code, "TF-CFG-001");
    assert!(err.message.contains("script.max_call_levels"));
}

#[test]
#[serial]
fn test_env_zero_limit_is_rejected() {
    clear_tabflow_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("TABFLOW_SCRIPT_MAX_OPERATIONS", "0");

    let result = ConfigLoader::load_from_workspace(temp_dir.path());
    clear_tabflow_env();
    assert!(result.is_err());
}

#[test]
fn test_pipeline_from_config_without_catalog() {
    let mut config = TabflowConfig::default();
    config.pipeline.builtin_catalog = false;

    let pipeline = Pipeline::from_config(&config, None).unwrap();
    assert!(pipeline.catalog().is_empty());

    let pipeline = Pipeline::from_config(&TabflowConfig::default(), None).unwrap();
    assert!(pipeline.catalog().find("multiply_column").is_some());
}

#[test]
fn test_operation_limit_stops_runaway_script() {
    let mut config = TabflowConfig::default();
    config.script.max_operations = 500;
    assert_eq!(
        ScriptEngine::with_limits(&config.script.limits()).limits(),
        &config.script.limits()
    );

    let data: Dataset = serde_json::from_value(serde_json::json!({"A": [1]})).unwrap();
    let mut pipeline = Pipeline::from_config(&config, Some(data)).unwrap();
    assert_eq!(pipeline.engine().limits().max_operations, 500);
    pipeline
        .add_step(
            TransformationSource::script("fn spin(data) { let n = 0; loop { n += 1; } data }"),
            None,
            None,
        )
        .unwrap();

    let err = pipeline.run().unwrap_err();
    assert!(err.is_step_execution_error());
    assert_eq!(pipeline.working_dataset(), pipeline.original_dataset());
}
