#![allow(clippy::result_large_err)]

use super::{ConfigValidator, TabflowConfig};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::Path;
use std::str::FromStr;

pub const CONFIG_FILE_NAME: &str = "tabflow.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from workspace root (workspace/tabflow.toml).
    /// Environment variables override file values; a missing file means defaults.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<TabflowConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);
        ConfigValidator::validate(&config)?;

        tracing::debug!(path = %config_path.display(), ?config, "configuration loaded");
        Ok(config)
    }

    /// Returns Ok(None) if the file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<TabflowConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: TabflowConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("TF-CFG-001")
        })?;

        Ok(Some(config))
    }

    /// Unparseable values are ignored and the previous value kept.
    fn apply_env_overrides(config: &mut TabflowConfig) {
        override_from_env("TABFLOW_SCRIPT_MAX_OPERATIONS", &mut config.script.max_operations);
        override_from_env("TABFLOW_SCRIPT_MAX_CALL_LEVELS", &mut config.script.max_call_levels);
        override_from_env("TABFLOW_SCRIPT_MAX_EXPR_DEPTH", &mut config.script.max_expr_depth);
        override_from_env(
            "TABFLOW_SCRIPT_MAX_COLLECTION_SIZE",
            &mut config.script.max_collection_size,
        );
        override_from_env(
            "TABFLOW_PIPELINE_BUILTIN_CATALOG",
            &mut config.pipeline.builtin_catalog,
        );
        override_from_env(
            "TABFLOW_PIPELINE_STRICT_BINDING",
            &mut config.pipeline.strict_binding,
        );
    }

    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "TABFLOW_SCRIPT_MAX_OPERATIONS - Override the script operation budget (default: 5000000)",
            "TABFLOW_SCRIPT_MAX_CALL_LEVELS - Override the script call depth limit (default: 64)",
            "TABFLOW_SCRIPT_MAX_EXPR_DEPTH - Override the script expression depth limit (default: 64)",
            "TABFLOW_SCRIPT_MAX_COLLECTION_SIZE - Override the script string/array/map size limit (default: 1000000)",
            "TABFLOW_PIPELINE_BUILTIN_CATALOG - Load the built-in catalog (true/false, default: true)",
            "TABFLOW_PIPELINE_STRICT_BINDING - Reject unknown parameter names (true/false, default: false)",
        ]
    }
}

fn override_from_env<T: FromStr>(name: &str, target: &mut T) {
    let Ok(raw) = env::var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(variable = name, value = %raw, "ignoring unparseable override"),
    }
}
