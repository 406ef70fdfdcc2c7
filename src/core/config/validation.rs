#![allow(clippy::result_large_err)]

use super::TabflowConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Every script limit must be positive.
    pub fn validate(config: &TabflowConfig) -> Result<(), AppError> {
        let script = &config.script;
        let limits = [
            ("script.max_operations", script.max_operations),
            ("script.max_call_levels", script.max_call_levels as u64),
            ("script.max_expr_depth", script.max_expr_depth as u64),
            ("script.max_collection_size", script.max_collection_size as u64),
        ];

        for (key, value) in limits {
            if value == 0 {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!("{} must be greater than zero", key),
                )
                .with_code("TF-CFG-001"));
            }
        }

        Ok(())
    }
}
