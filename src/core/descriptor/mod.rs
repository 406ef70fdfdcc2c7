//! Transformation descriptors.
//!
//! A [`TransformationDescriptor`] is the resolved, bindable form of one
//! pipeline step. It can originate from a registered native callable, a
//! serialized [`DescriptorRecord`], or script source text defining exactly one
//! function; all three end up with the same signature model and the same
//! invocation path.

pub mod arguments;
pub mod record;
pub mod registered;
pub mod script;
pub mod signature;

pub use arguments::StepArguments;
pub use record::DescriptorRecord;
pub use registered::{NativeTransform, RegisteredTransformation, RegisteredTransformationBuilder};
pub use script::{ScriptEngine, ScriptFunction, ScriptLimits};
pub use signature::{derive_display_name, Parameter, ParameterKind, ANY_TYPE, DATASET_TYPE};

use crate::core::dataset::Dataset;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Looks up registered native callables when rehydrating records.
pub trait CallableLookup {
    fn lookup(&self, origin_module: Option<&str>, function_name: &str)
        -> Option<&RegisteredTransformation>;
}

/// The invocable half of a descriptor.
#[derive(Clone)]
pub enum Callable {
    Native(Arc<NativeTransform>),
    Script(ScriptFunction),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => f.write_str("Callable::Native"),
            Callable::Script(function) => {
                write!(f, "Callable::Script({})", function.function_name())
            }
        }
    }
}

/// Anything a pipeline step can be built from.
#[derive(Debug, Clone)]
pub enum TransformationSource {
    Registered(RegisteredTransformation),
    Record(DescriptorRecord),
    Script(String),
    Descriptor(TransformationDescriptor),
}

impl TransformationSource {
    pub fn script<T: Into<String>>(source: T) -> Self {
        TransformationSource::Script(source.into())
    }
}

impl From<RegisteredTransformation> for TransformationSource {
    fn from(value: RegisteredTransformation) -> Self {
        TransformationSource::Registered(value)
    }
}

impl From<&RegisteredTransformation> for TransformationSource {
    fn from(value: &RegisteredTransformation) -> Self {
        TransformationSource::Registered(value.clone())
    }
}

impl From<DescriptorRecord> for TransformationSource {
    fn from(value: DescriptorRecord) -> Self {
        TransformationSource::Record(value)
    }
}

impl From<TransformationDescriptor> for TransformationSource {
    fn from(value: TransformationDescriptor) -> Self {
        TransformationSource::Descriptor(value)
    }
}

/// How argument values are chosen when a descriptor is invoked.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BindingStrategy {
    /// Use the values bound on the descriptor.
    #[default]
    Saved,
    /// Ignore bound values and rely on declared defaults only.
    Defaults,
    /// Declared defaults, replaced by the given overrides where present.
    DefaultsWithOverrides(Map<String, Value>),
}

/// A supplied value whose name does not match any user parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterMismatch {
    pub step: String,
    pub parameter: String,
}

impl fmt::Display for ParameterMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step '{}' has no parameter named '{}'; value ignored",
            self.step, self.parameter
        )
    }
}

impl From<&ParameterMismatch> for AppError {
    fn from(value: &ParameterMismatch) -> Self {
        let mut error = AppError::new(ErrorCategory::ParameterMismatch, value.to_string())
            .with_code("TF-BIND-001");
        error.add_context("step", &value.step);
        error.add_context("parameter", &value.parameter);
        error
    }
}

#[derive(Debug, Clone)]
pub struct TransformationDescriptor {
    name: String,
    function_name: String,
    documentation: Option<String>,
    source_text: Option<String>,
    origin_module: Option<String>,
    parameters: Vec<Parameter>,
    return_annotation: Option<String>,
    callable: Callable,
}

impl TransformationDescriptor {
    /// Resolve any supported source into a descriptor.
    pub fn resolve(
        source: TransformationSource,
        engine: &Arc<ScriptEngine>,
        lookup: &dyn CallableLookup,
    ) -> Result<Self, AppError> {
        match source {
            TransformationSource::Registered(registered) => Ok(Self::from_registered(&registered)),
            TransformationSource::Record(record) => Self::from_record(&record, engine, lookup),
            TransformationSource::Script(text) => Self::from_source(engine, &text),
            TransformationSource::Descriptor(descriptor) => Ok(descriptor),
        }
    }

    pub fn from_registered(registered: &RegisteredTransformation) -> Self {
        Self {
            name: derive_display_name(&registered.name, &registered.parameters),
            function_name: registered.name.clone(),
            documentation: registered.documentation.clone(),
            source_text: None,
            origin_module: registered.origin_module.clone(),
            parameters: registered.parameters.clone(),
            return_annotation: registered.return_annotation.clone(),
            callable: Callable::Native(registered.callable()),
        }
    }

    /// Compile script text that defines exactly one function.
    pub fn from_source(engine: &Arc<ScriptEngine>, source: &str) -> Result<Self, AppError> {
        let compiled = engine.compile_function(source)?;
        if compiled.parameters.is_empty() {
            return Err(missing_dataset_parameter(&compiled.function_name));
        }

        let parameters: Vec<Parameter> = compiled
            .parameters
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let declared = if index == 0 { DATASET_TYPE } else { ANY_TYPE };
                Parameter::positional(name.as_str(), declared)
            })
            .collect();

        Ok(Self {
            name: derive_display_name(&compiled.function_name, &parameters),
            function_name: compiled.function_name.clone(),
            documentation: compiled.documentation.clone(),
            source_text: Some(source.to_string()),
            origin_module: None,
            parameters,
            return_annotation: None,
            callable: Callable::Script(ScriptFunction::new(Arc::clone(engine), &compiled)),
        })
    }

    /// Rebuild a descriptor from its record. Field values, including bound
    /// parameter values, are taken verbatim from the record.
    pub fn from_record(
        record: &DescriptorRecord,
        engine: &Arc<ScriptEngine>,
        lookup: &dyn CallableLookup,
    ) -> Result<Self, AppError> {
        if record.parameters.is_empty() {
            return Err(missing_dataset_parameter(&record.function_name));
        }

        let callable = match record.source_text.as_deref() {
            Some(text) => {
                let compiled = engine.compile_function(text)?;
                let declared: Vec<&str> =
                    record.parameters.iter().map(|p| p.name.as_str()).collect();
                if compiled.function_name != record.function_name
                    || compiled.parameters != declared
                {
                    return Err(unresolvable(
                        record,
                        "source text does not match the recorded signature",
                    ));
                }
                Callable::Script(ScriptFunction::new(Arc::clone(engine), &compiled))
            }
            None => {
                let registered = lookup
                    .lookup(record.origin_module.as_deref(), &record.function_name)
                    .ok_or_else(|| {
                        unresolvable(record, "no registered callable matches the record")
                    })?;
                if !signature_matches(&record.parameters, &registered.parameters) {
                    return Err(unresolvable(
                        record,
                        "recorded signature does not match the registered callable",
                    ));
                }
                Callable::Native(registered.callable())
            }
        };

        Ok(Self {
            name: record.name.clone(),
            function_name: record.function_name.clone(),
            documentation: record.documentation.clone(),
            source_text: record.source_text.clone(),
            origin_module: record.origin_module.clone(),
            parameters: record.parameters.clone(),
            return_annotation: record.return_annotation.clone(),
            callable,
        })
    }

    pub fn with_name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_name<T: Into<String>>(&mut self, name: T) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn source_text(&self) -> Option<&str> {
        self.source_text.as_deref()
    }

    pub fn origin_module(&self) -> Option<&str> {
        self.origin_module.as_deref()
    }

    pub fn return_annotation(&self) -> Option<&str> {
        self.return_annotation.as_deref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameters after the dataset slot.
    pub fn user_parameters(&self) -> &[Parameter] {
        &self.parameters[1..]
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.user_parameters().iter().find(|p| p.name == name)
    }

    pub fn is_scripted(&self) -> bool {
        matches!(self.callable, Callable::Script(_))
    }

    /// Store values on matching user parameters. Names that match nothing
    /// are reported and otherwise ignored.
    pub fn bind(&mut self, values: &Map<String, Value>) -> Vec<ParameterMismatch> {
        let mut mismatches = Vec::new();
        for (name, value) in values {
            match self.parameters[1..].iter_mut().find(|p| &p.name == name) {
                Some(parameter) => parameter.current_value = Some(value.clone()),
                None => {
                    tracing::warn!(
                        step = %self.name,
                        parameter = %name,
                        "ignoring value for unknown parameter"
                    );
                    mismatches.push(ParameterMismatch {
                        step: self.name.clone(),
                        parameter: name.clone(),
                    });
                }
            }
        }
        mismatches
    }

    /// Clear every bound value.
    pub fn unbind(&mut self) {
        for parameter in &mut self.parameters {
            parameter.current_value = None;
        }
    }

    /// Collect the arguments for one call under `strategy`.
    pub fn resolve_arguments(
        &self,
        strategy: &BindingStrategy,
    ) -> Result<(StepArguments, Vec<ParameterMismatch>), AppError> {
        let mut arguments = StepArguments::new();
        let mut mismatches = Vec::new();

        if let BindingStrategy::DefaultsWithOverrides(overrides) = strategy {
            for name in overrides.keys() {
                if self.parameter(name).is_none() {
                    mismatches.push(ParameterMismatch {
                        step: self.name.clone(),
                        parameter: name.clone(),
                    });
                }
            }
        }

        for parameter in self.user_parameters() {
            let value = match strategy {
                BindingStrategy::Saved => parameter
                    .current_value
                    .clone()
                    .or_else(|| parameter.default_value.clone()),
                BindingStrategy::Defaults => parameter.default_value.clone(),
                BindingStrategy::DefaultsWithOverrides(overrides) => overrides
                    .get(&parameter.name)
                    .cloned()
                    .or_else(|| parameter.default_value.clone()),
            };

            let Some(value) = value else {
                if *strategy == BindingStrategy::Saved && parameter.is_required() {
                    let mut error = AppError::new(
                        ErrorCategory::StepExecutionError,
                        format!(
                            "step '{}' has no value bound for required parameter '{}'",
                            self.name, parameter.name
                        ),
                    )
                    .with_code("TF-STEP-002");
                    error.add_context("parameter", &parameter.name);
                    return Err(error);
                }
                continue;
            };

            match parameter.kind {
                ParameterKind::Positional | ParameterKind::Keyword => {
                    arguments.insert(parameter.name.as_str(), value)
                }
                ParameterKind::VariadicPositional => match value {
                    Value::Array(items) => arguments.set_variadic(items),
                    Value::Null => {}
                    other => arguments.set_variadic(vec![other]),
                },
                ParameterKind::VariadicKeyword => match value {
                    Value::Object(entries) => arguments.set_variadic_keywords(entries),
                    Value::Null => {}
                    _ => {
                        return Err(AppError::new(
                            ErrorCategory::StepExecutionError,
                            format!(
                                "parameter '{}' of step '{}' must be an object",
                                parameter.name, self.name
                            ),
                        )
                        .with_code("TF-STEP-001"))
                    }
                },
            }
        }

        Ok((arguments, mismatches))
    }

    /// Invoke the callable with `dataset` in the first slot.
    pub fn invoke(&self, dataset: Dataset, strategy: &BindingStrategy) -> Result<Dataset, AppError> {
        let (arguments, mismatches) = self.resolve_arguments(strategy)?;
        for mismatch in &mismatches {
            tracing::warn!(step = %mismatch.step, parameter = %mismatch.parameter, "ignoring override for unknown parameter");
        }

        tracing::debug!(
            step = %self.name,
            function = %self.function_name,
            rows = dataset.n_rows(),
            columns = dataset.n_columns(),
            "invoking transformation"
        );

        match &self.callable {
            Callable::Native(callable) => callable(dataset, &arguments),
            Callable::Script(function) => {
                let positional: Vec<Value> = self
                    .user_parameters()
                    .iter()
                    .map(|parameter| {
                        arguments
                            .get(&parameter.name)
                            .cloned()
                            .or_else(|| parameter.default_value.clone())
                            .unwrap_or(Value::Null)
                    })
                    .collect();
                function.call(dataset, &positional)
            }
        }
    }

    pub fn to_record(&self) -> DescriptorRecord {
        DescriptorRecord {
            name: self.name.clone(),
            function_name: self.function_name.clone(),
            documentation: self.documentation.clone(),
            source_text: self.source_text.clone(),
            origin_module: self.origin_module.clone(),
            parameters: self.parameters.clone(),
            return_annotation: self.return_annotation.clone(),
        }
    }
}

fn missing_dataset_parameter(function_name: &str) -> AppError {
    AppError::new(
        ErrorCategory::ResolutionError,
        format!(
            "function '{}' takes no parameters; the dataset must be its first parameter",
            function_name
        ),
    )
    .with_code("TF-RESOLVE-004")
}

fn signature_matches(recorded: &[Parameter], registered: &[Parameter]) -> bool {
    recorded.len() == registered.len()
        && recorded
            .iter()
            .zip(registered)
            .all(|(left, right)| left.name == right.name && left.kind == right.kind)
}

fn unresolvable(record: &DescriptorRecord, reason: &str) -> AppError {
    let mut error = AppError::new(
        ErrorCategory::ResolutionError,
        format!("cannot resolve '{}': {}", record.function_name, reason),
    )
    .with_code("TF-RESOLVE-005");
    if let Some(module) = &record.origin_module {
        error.add_context("origin_module", module);
    }
    error
}
