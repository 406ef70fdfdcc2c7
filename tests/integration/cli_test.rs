use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const ADD_ONE: &str = "/// Adds one to a column.\nfn add_one(data, col) { data[col] = data[col] + 1; data }\n";

fn tabflow(workspace: &Path, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("tabflow"))
        .args(args)
        .arg("--workspace")
        .arg(workspace)
        .output()
        .expect("should run tabflow")
}

fn stdout(output: &Output) -> &str {
    std::str::from_utf8(&output.stdout).unwrap()
}

fn stderr(output: &Output) -> &str {
    std::str::from_utf8(&output.stderr).unwrap()
}

fn write_dataset(dir: &TempDir) -> String {
    let path = dir.path().join("data.json");
    fs::write(&path, r#"{"A": [1, 2, 3], "B": [4, 5, 6]}"#).unwrap();
    path.display().to_string()
}

fn write_script(dir: &TempDir, name: &str, source: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_pipeline_commands() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("tabflow"))
        .arg("--help")
        .output()
        .expect("should run successfully");

    let text = stdout(&output);
    assert!(output.status.success());
    assert!(text.contains("PIPELINE COMMANDS"));
    assert!(text.contains("catalog"));
    assert!(text.contains("inspect"));
}

#[test]
fn test_catalog_json_lists_groups() {
    let dir = TempDir::new().unwrap();
    let output = tabflow(dir.path(), &["catalog", "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let catalog: Value = serde_json::from_str(stdout(&output)).unwrap();
    assert!(catalog.get("Data Manipulation").is_some());
    assert_eq!(catalog["Coercion"][0]["function_name"], "coerce_numeric");
}

#[test]
fn test_catalog_text_filters_group() {
    let dir = TempDir::new().unwrap();
    let output = tabflow(dir.path(), &["catalog", "--group", "Coercion"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(text.starts_with("Coercion:"));
    assert!(text.contains("  coerce_bool(data, column: String)"));
    assert!(!text.contains("multiply_column"));
}

#[test]
fn test_catalog_unknown_group_fails() {
    let dir = TempDir::new().unwrap();
    let output = tabflow(dir.path(), &["catalog", "--group", "Nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("unknown group 'Nope'"));
}

#[test]
fn test_inspect_prints_record() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "add_one.rhai", ADD_ONE);
    let output = tabflow(dir.path(), &["inspect", &script, "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let record: Value = serde_json::from_str(stdout(&output)).unwrap();
    assert_eq!(record["function_name"], "add_one");
    assert_eq!(record["name"], "data = add_one(data, col)");
    assert_eq!(record["documentation"], "Adds one to a column.");
    assert_eq!(record["parameters"][0]["declared_type"], "Dataset");
    assert_eq!(record["source_text"], ADD_ONE);
}

#[test]
fn test_run_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(&dir);
    let script = write_script(&dir, "add_one.rhai", ADD_ONE);
    let out = dir.path().join("out.json");
    let script_step = format!("@{}:col=A", script);

    let output = tabflow(
        dir.path(),
        &[
            "run",
            "--data",
            &data,
            "--step",
            "multiply_column:column=B,factor=10",
            "--step",
            &script_step,
            "--output",
            out.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Step 1: data = multiply_column(data, column, factor)"));
    assert!(text.contains("Step 2: data = add_one(data, col)"));
    assert!(text.contains("2 step(s) in"));

    let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, json!({"A": [2, 3, 4], "B": [40, 50, 60]}));
}

#[test]
fn test_run_step_by_step_reports_progress() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(&dir);

    let output = tabflow(
        dir.path(),
        &[
            "run",
            "--data",
            &data,
            "--step",
            "add_constant:column=A,value=1",
            "--step",
            "drop_columns:columns=[\"B\"]",
            "--step-by-step",
        ],
    );
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("[1/2] data = add_constant(data, column, value) -> 3 row(s) x 2 column(s)"));
    assert!(text.contains("[2/2] data = drop_columns(data, columns) -> 3 row(s) x 1 column(s)"));
    assert!(!text.contains("\"B\""));
}

#[test]
fn test_run_warns_on_unknown_parameter() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(&dir);

    let output = tabflow(
        dir.path(),
        &["run", "--data", &data, "--step", "add_constant:column=A,value=1,scale=2"],
    );
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("has no parameter named 'scale'"));
}

#[test]
fn test_run_rejects_multi_function_script() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(&dir);
    let script = write_script(&dir, "two.rhai", "fn one(data) { data }\nfn two(data) { data }\n");
    let script_step = format!("@{}", script);

    let output = tabflow(dir.path(), &["run", "--data", &data, "--step", &script_step]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("TF-RESOLVE-003"));
}

#[test]
fn test_run_reports_failing_step() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(&dir);

    let output = tabflow(
        dir.path(),
        &["run", "--data", &data, "--step", "multiply_column:column=Z,factor=2"],
    );
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("pipeline run failed"));
    assert!(err.contains("step 1"));
}

#[test]
fn test_strict_binding_from_workspace_config() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(&dir);
    fs::write(
        dir.path().join("tabflow.toml"),
        "[pipeline]\nstrict_binding = true\n",
    )
    .unwrap();

    let output = tabflow(
        dir.path(),
        &["run", "--data", &data, "--step", "add_constant:column=A,value=1,scale=2"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("TF-BIND-001"));
}
