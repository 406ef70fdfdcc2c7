use crate::core::descriptor::ScriptLimits;
use serde::{Deserialize, Serialize};

/// Main tabflow configuration loaded from tabflow.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TabflowConfig {
    /// Script engine limits
    #[serde(default)]
    pub script: ScriptConfig,

    /// Pipeline construction settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Resource limits applied to user scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    #[serde(default = "default_max_expr_depth")]
    pub max_expr_depth: usize,

    /// Upper bound for string length, array length and map size
    #[serde(default = "default_max_collection_size")]
    pub max_collection_size: usize,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Resolve catalog records against the bundled transformations
    #[serde(default = "default_builtin_catalog")]
    pub builtin_catalog: bool,

    /// Reject steps whose values name unknown parameters
    #[serde(default)]
    pub strict_binding: bool,
}

impl ScriptConfig {
    pub fn limits(&self) -> ScriptLimits {
        ScriptLimits {
            max_operations: self.max_operations,
            max_call_levels: self.max_call_levels,
            max_expr_depth: self.max_expr_depth,
            max_collection_size: self.max_collection_size,
        }
    }
}

fn default_max_operations() -> u64 {
    ScriptLimits::default().max_operations
}

fn default_max_call_levels() -> usize {
    ScriptLimits::default().max_call_levels
}

fn default_max_expr_depth() -> usize {
    ScriptLimits::default().max_expr_depth
}

fn default_max_collection_size() -> usize {
    ScriptLimits::default().max_collection_size
}

fn default_builtin_catalog() -> bool {
    true
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_expr_depth: default_max_expr_depth(),
            max_collection_size: default_max_collection_size(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            builtin_catalog: default_builtin_catalog(),
            strict_binding: false,
        }
    }
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
