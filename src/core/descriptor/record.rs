use crate::core::descriptor::signature::Parameter;
use serde::{Deserialize, Serialize};

/// Plain serialized form of a descriptor.
///
/// Carries everything needed to rebuild an equivalent descriptor without a
/// live callable: script records recompile `source_text`, catalog records are
/// resolved by `(origin_module, function_name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    pub name: String,
    pub function_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_module: Option<String>,
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_annotation: Option<String>,
}
