use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type recorded for the dataset slot of every transformation.
pub const DATASET_TYPE: &str = "Dataset";
/// Declared type recorded when a parameter carries no annotation.
pub const ANY_TYPE: &str = "any";

/// Role a parameter plays when arguments are bound for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Positional,
    Keyword,
    VariadicPositional,
    VariadicKeyword,
}

impl ParameterKind {
    pub fn is_variadic(self) -> bool {
        matches!(
            self,
            ParameterKind::VariadicPositional | ParameterKind::VariadicKeyword
        )
    }
}

/// One declared parameter of a transformation plus the value bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub declared_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
    pub kind: ParameterKind,
}

impl Parameter {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, declared_type: T, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            default_value: None,
            current_value: None,
            kind,
        }
    }

    pub fn positional<N: Into<String>, T: Into<String>>(name: N, declared_type: T) -> Self {
        Self::new(name, declared_type, ParameterKind::Positional)
    }

    pub fn with_default(mut self, default_value: Value) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }

    /// A parameter the caller must bind before the step can run.
    pub fn is_required(&self) -> bool {
        !self.kind.is_variadic() && self.default_value.is_none()
    }
}

/// Render `data = name(data, p1, p2)`, the display name given to steps that
/// were not explicitly named.
pub fn derive_display_name(function_name: &str, parameters: &[Parameter]) -> String {
    let rendered: Vec<String> = parameters
        .iter()
        .map(|parameter| match parameter.kind {
            ParameterKind::VariadicPositional => format!("*{}", parameter.name),
            ParameterKind::VariadicKeyword => format!("**{}", parameter.name),
            _ => parameter.name.clone(),
        })
        .collect();
    format!("data = {}({})", function_name, rendered.join(", "))
}
