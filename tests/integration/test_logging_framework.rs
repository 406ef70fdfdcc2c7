use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_dataset(workspace: &Path) -> String {
    let path = workspace.join("data.json");
    fs::write(&path, r#"[{"A": 1}, {"A": 1}, {"A": 2}]"#).expect("failed to write dataset");
    path.display().to_string()
}

fn write_logging_config(workspace: &Path, body: &str) {
    let dir = workspace.join(".tabflow").join("config");
    fs::create_dir_all(&dir).expect("failed to create config dir");
    fs::write(dir.join("logging.toml"), body).expect("failed to write logging config");
}

fn tabflow(workspace: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tabflow"));
    cmd.env_remove("RUST_LOG")
        .env_remove("TABFLOW_LOG_LEVEL")
        .env_remove("TABFLOW_LOG_CONSOLE")
        .current_dir(workspace);
    cmd
}

#[test]
fn file_sink_records_run_without_console() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let workspace = temp_dir.path();
    let data = write_dataset(workspace);
    write_logging_config(
        workspace,
        "[logging]\nenable_file = true\ndefault_level = \"info\"\nconsole_output = \"none\"\n",
    );

    tabflow(workspace)
        .args(["run", "--data", &data, "--step", "drop_duplicates", "--workspace"])
        .arg(workspace)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());

    let contents = fs::read_to_string(workspace.join(".tabflow").join("logs").join("tabflow.log"))
        .expect("failed to read log file");
    assert!(contents.contains("added pipeline step"));
    assert!(contents.contains("pipeline run finished"));
}

#[test]
fn env_level_reaches_console() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let workspace = temp_dir.path();
    let data = write_dataset(workspace);

    tabflow(workspace)
        .env("TABFLOW_LOG_LEVEL", "info")
        .args(["run", "--data", &data, "--step", "drop_duplicates", "--workspace"])
        .arg(workspace)
        .assert()
        .success()
        .stderr(predicate::str::contains("added pipeline step"));
}

#[test]
fn quiet_flag_silences_console() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let workspace = temp_dir.path();
    let data = write_dataset(workspace);

    tabflow(workspace)
        .env("TABFLOW_LOG_LEVEL", "info")
        .args(["--quiet", "run", "--data", &data, "--step", "drop_duplicates", "--workspace"])
        .arg(workspace)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn default_level_hides_info_events() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let workspace = temp_dir.path();

    tabflow(workspace)
        .args(["catalog", "--workspace"])
        .arg(workspace)
        .assert()
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains("Data Manipulation:"));
}

#[test]
fn invalid_console_override_fails() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let workspace = temp_dir.path();

    tabflow(workspace)
        .env("TABFLOW_LOG_CONSOLE", "speakers")
        .args(["catalog", "--workspace"])
        .arg(workspace)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid logging.console_output"));
}

#[test]
fn invalid_level_in_config_fails() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let workspace = temp_dir.path();
    write_logging_config(workspace, "[logging]\ndefault_level = \"tabflow=verbose\"\n");

    tabflow(workspace)
        .args(["catalog", "--workspace"])
        .arg(workspace)
        .assert()
        .failure()
        .stderr(predicate::str::contains("valid tracing directive"));
}
