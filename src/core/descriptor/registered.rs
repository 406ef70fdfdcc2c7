use crate::core::dataset::Dataset;
use crate::core::descriptor::arguments::StepArguments;
use crate::core::descriptor::record::DescriptorRecord;
use crate::core::descriptor::signature::{Parameter, ParameterKind, ANY_TYPE, DATASET_TYPE};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Native transformation body: consumes the current dataset, returns the next one.
pub type NativeTransform =
    dyn Fn(Dataset, &StepArguments) -> Result<Dataset, AppError> + Send + Sync;

/// A native callable registered together with its explicit signature.
#[derive(Clone)]
pub struct RegisteredTransformation {
    pub(crate) name: String,
    pub(crate) documentation: Option<String>,
    pub(crate) origin_module: Option<String>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) return_annotation: Option<String>,
    pub(crate) callable: Arc<NativeTransform>,
}

impl fmt::Debug for RegisteredTransformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTransformation")
            .field("name", &self.name)
            .field("origin_module", &self.origin_module)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl RegisteredTransformation {
    pub fn builder<N: Into<String>>(name: N) -> RegisteredTransformationBuilder {
        RegisteredTransformationBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn origin_module(&self) -> Option<&str> {
        self.origin_module.as_deref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn return_annotation(&self) -> Option<&str> {
        self.return_annotation.as_deref()
    }

    pub fn callable(&self) -> Arc<NativeTransform> {
        Arc::clone(&self.callable)
    }

    /// Introspection record for catalog listings and caching.
    pub fn to_record(&self) -> DescriptorRecord {
        DescriptorRecord {
            name: self.name.clone(),
            function_name: self.name.clone(),
            documentation: self.documentation.clone(),
            source_text: None,
            origin_module: self.origin_module.clone(),
            parameters: self.parameters.clone(),
            return_annotation: self.return_annotation.clone(),
        }
    }
}

/// Declares a native transformation's signature in parameter order.
pub struct RegisteredTransformationBuilder {
    name: String,
    documentation: Option<String>,
    origin_module: Option<String>,
    parameters: Vec<Parameter>,
    return_annotation: Option<String>,
}

impl RegisteredTransformationBuilder {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            documentation: None,
            origin_module: None,
            parameters: Vec::new(),
            return_annotation: Some(DATASET_TYPE.to_string()),
        }
    }

    pub fn doc<T: Into<String>>(mut self, documentation: T) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn module<T: Into<String>>(mut self, module: T) -> Self {
        self.origin_module = Some(module.into());
        self
    }

    /// The dataset slot. Must be declared first.
    pub fn dataset<N: Into<String>>(mut self, name: N) -> Self {
        self.parameters
            .push(Parameter::positional(name, DATASET_TYPE));
        self
    }

    pub fn param<N: Into<String>, T: Into<String>>(mut self, name: N, declared_type: T) -> Self {
        self.parameters
            .push(Parameter::positional(name, declared_type));
        self
    }

    pub fn param_with_default<N: Into<String>, T: Into<String>>(
        mut self,
        name: N,
        declared_type: T,
        default_value: Value,
    ) -> Self {
        self.parameters
            .push(Parameter::positional(name, declared_type).with_default(default_value));
        self
    }

    pub fn keyword<N: Into<String>, T: Into<String>>(
        mut self,
        name: N,
        declared_type: T,
        default_value: Option<Value>,
    ) -> Self {
        let mut parameter = Parameter::new(name, declared_type, ParameterKind::Keyword);
        parameter.default_value = default_value;
        self.parameters.push(parameter);
        self
    }

    pub fn variadic<N: Into<String>>(mut self, name: N) -> Self {
        self.parameters.push(Parameter::new(
            name,
            ANY_TYPE,
            ParameterKind::VariadicPositional,
        ));
        self
    }

    pub fn variadic_keywords<N: Into<String>>(mut self, name: N) -> Self {
        self.parameters
            .push(Parameter::new(name, ANY_TYPE, ParameterKind::VariadicKeyword));
        self
    }

    pub fn returns<T: Into<String>>(mut self, annotation: T) -> Self {
        self.return_annotation = Some(annotation.into());
        self
    }

    pub fn build<F>(self, callable: F) -> Result<RegisteredTransformation, AppError>
    where
        F: Fn(Dataset, &StepArguments) -> Result<Dataset, AppError> + Send + Sync + 'static,
    {
        self.validate()?;
        Ok(RegisteredTransformation {
            name: self.name,
            documentation: self.documentation,
            origin_module: self.origin_module,
            parameters: self.parameters,
            return_annotation: self.return_annotation,
            callable: Arc::new(callable),
        })
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(invalid_signature(&self.name, "name must not be empty"));
        }
        let Some(first) = self.parameters.first() else {
            return Err(AppError::new(
                ErrorCategory::ResolutionError,
                format!(
                    "transformation '{}' must accept the dataset as its first parameter",
                    self.name
                ),
            )
            .with_code("TF-RESOLVE-004"));
        };
        if first.kind.is_variadic() {
            return Err(invalid_signature(
                &self.name,
                "the dataset parameter cannot be variadic",
            ));
        }

        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert(parameter.name.as_str()) {
                return Err(invalid_signature(
                    &self.name,
                    &format!("duplicate parameter '{}'", parameter.name),
                ));
            }
        }

        let count = |kind: ParameterKind| self.parameters.iter().filter(|p| p.kind == kind).count();
        if count(ParameterKind::VariadicPositional) > 1 || count(ParameterKind::VariadicKeyword) > 1 {
            return Err(invalid_signature(
                &self.name,
                "at most one variadic parameter of each kind is allowed",
            ));
        }
        if let Some(position) = self
            .parameters
            .iter()
            .position(|p| p.kind == ParameterKind::VariadicKeyword)
        {
            if position != self.parameters.len() - 1 {
                return Err(invalid_signature(
                    &self.name,
                    "the variadic keyword parameter must be declared last",
                ));
            }
        }
        Ok(())
    }
}

fn invalid_signature(name: &str, reason: &str) -> AppError {
    AppError::new(
        ErrorCategory::ValidationError,
        format!("invalid signature for transformation '{}': {}", name, reason),
    )
    .with_code("TF-SIG-001")
}
