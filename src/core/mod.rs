pub mod catalog;
pub mod config;
pub mod dataset;
pub mod descriptor;
pub mod error;
pub mod pipeline;
pub mod types;

pub use catalog::{Catalog, CatalogBuilder};
pub use config::{ConfigLoader, ConfigValidator, TabflowConfig};
pub use dataset::{Dataset, DatasetError};
pub use descriptor::{
    BindingStrategy, DescriptorRecord, Parameter, ParameterKind, ParameterMismatch,
    RegisteredTransformation, ScriptEngine, StepArguments, TransformationDescriptor,
    TransformationSource,
};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter};
pub use pipeline::{Pipeline, RunReport, StepOutcome, StepRecord};
pub use types::*;
