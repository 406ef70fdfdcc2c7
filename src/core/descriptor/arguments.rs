use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Arguments resolved for one invocation, excluding the dataset itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArguments {
    named: IndexMap<String, Value>,
    variadic: Vec<Value>,
    variadic_keywords: Map<String, Value>,
}

impl StepArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>>(&mut self, name: K, value: Value) {
        self.named.insert(name.into(), value);
    }

    pub fn set_variadic(&mut self, values: Vec<Value>) {
        self.variadic = values;
    }

    pub fn set_variadic_keywords(&mut self, values: Map<String, Value>) {
        self.variadic_keywords = values;
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.named.keys()
    }

    pub fn variadic(&self) -> &[Value] {
        &self.variadic
    }

    pub fn variadic_keywords(&self) -> &Map<String, Value> {
        &self.variadic_keywords
    }

    pub fn require(&self, name: &str) -> Result<&Value, AppError> {
        self.named.get(name).ok_or_else(|| missing_argument(name))
    }

    pub fn str(&self, name: &str) -> Result<&str, AppError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| wrong_type(name, "a string"))
    }

    /// Numeric argument; numeric strings are accepted since editor input arrives as text.
    pub fn f64(&self, name: &str) -> Result<f64, AppError> {
        value_as_f64(self.require(name)?).ok_or_else(|| wrong_type(name, "a number"))
    }

    pub fn f64_or(&self, name: &str, fallback: f64) -> Result<f64, AppError> {
        match self.named.get(name) {
            None | Some(Value::Null) => Ok(fallback),
            Some(value) => value_as_f64(value).ok_or_else(|| wrong_type(name, "a number")),
        }
    }

    /// A list of strings; a lone string is treated as a one-element list.
    pub fn string_list(&self, name: &str) -> Result<Vec<String>, AppError> {
        self.optional_string_list(name)?
            .ok_or_else(|| missing_argument(name))
    }

    /// Like [`string_list`](Self::string_list) but `null` or absent yields `None`.
    pub fn optional_string_list(&self, name: &str) -> Result<Option<Vec<String>>, AppError> {
        match self.named.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(single)) => Ok(Some(vec![single.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| wrong_type(name, "a list of strings"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(wrong_type(name, "a list of strings")),
        }
    }
}

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn missing_argument(name: &str) -> AppError {
    AppError::new(
        ErrorCategory::StepExecutionError,
        format!("missing value for required parameter '{}'", name),
    )
    .with_code("TF-STEP-002")
    .with_suggestion(format!("bind a value for '{}' before running the step", name))
}

fn wrong_type(name: &str, expected: &str) -> AppError {
    AppError::new(
        ErrorCategory::StepExecutionError,
        format!("parameter '{}' must be {}", name, expected),
    )
    .with_code("TF-STEP-001")
}
