#![allow(clippy::result_large_err)] // Pipeline operations return AppError so step failures keep their context.

//! Ordered pipelines of transformation steps over a working dataset.
//!
//! A pipeline can be executed in one pass with [`Pipeline::run`] or one step at
//! a time with [`Pipeline::advance`]. The resumable session is tracked by an
//! explicit cursor and [`PipelineState`]:
//!
//! ```text
//! Idle --start_stepping/advance--> Stepping --last step--> Complete
//!  ^                                  |                       |
//!  +---- run / remove executed step --+---- add_step ---------+
//! ```

pub mod report;

pub use report::{RunReport, StepOutcome, StepRecord};

use crate::core::catalog::Catalog;
use crate::core::config::TabflowConfig;
use crate::core::dataset::Dataset;
use crate::core::descriptor::{
    BindingStrategy, ParameterMismatch, ScriptEngine, TransformationDescriptor,
    TransformationSource,
};
use crate::core::error::AppError;
use crate::core::types::{ErrorCategory, PipelineState};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

pub struct Pipeline {
    original: Dataset,
    working: Dataset,
    steps: Vec<TransformationDescriptor>,
    cursor: usize,
    state: PipelineState,
    engine: Arc<ScriptEngine>,
    catalog: Catalog,
    strict_binding: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Pipeline {
    /// Empty pipeline over `dataset` (or an empty table), with an empty catalog
    /// and a default script engine.
    pub fn new(dataset: Option<Dataset>) -> Self {
        Self::with_catalog(dataset, Catalog::default(), Arc::new(ScriptEngine::default()))
    }

    pub fn with_catalog(
        dataset: Option<Dataset>,
        catalog: Catalog,
        engine: Arc<ScriptEngine>,
    ) -> Self {
        let original = dataset.unwrap_or_default();
        Self {
            working: original.clone(),
            original,
            steps: Vec::new(),
            cursor: 0,
            state: PipelineState::Idle,
            engine,
            catalog,
            strict_binding: false,
        }
    }

    /// Pipeline configured from `config`: script limits, catalog and binding mode.
    pub fn from_config(config: &TabflowConfig, dataset: Option<Dataset>) -> Result<Self, AppError> {
        let catalog = if config.pipeline.builtin_catalog {
            Catalog::builtin()?
        } else {
            Catalog::default()
        };
        let engine = Arc::new(ScriptEngine::with_limits(&config.script.limits()));
        let mut pipeline = Self::with_catalog(dataset, catalog, engine);
        pipeline.strict_binding = config.pipeline.strict_binding;
        Ok(pipeline)
    }

    /// When set, unknown parameter names reject the step instead of warning.
    pub fn set_strict_binding(&mut self, strict: bool) {
        self.strict_binding = strict;
    }

    pub fn original_dataset(&self) -> &Dataset {
        &self.original
    }

    pub fn working_dataset(&self) -> &Dataset {
        &self.working
    }

    pub fn steps(&self) -> &[TransformationDescriptor] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&TransformationDescriptor> {
        self.steps.get(index)
    }

    /// Mutable access for re-binding a step; the step list itself is unchanged.
    pub fn step_mut(&mut self, index: usize) -> Option<&mut TransformationDescriptor> {
        self.steps.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn engine(&self) -> &Arc<ScriptEngine> {
        &self.engine
    }

    /// Resolve `source`, apply the display name, bind `parameter_values` and
    /// append the step. Returns the names that matched no parameter.
    pub fn add_step<S: Into<TransformationSource>>(
        &mut self,
        source: S,
        parameter_values: Option<&Map<String, Value>>,
        display_name: Option<&str>,
    ) -> Result<Vec<ParameterMismatch>, AppError> {
        let mut descriptor =
            TransformationDescriptor::resolve(source.into(), &self.engine, &self.catalog)
                .map_err(|err| {
                    tracing::warn!(code = %err.code, error = %err.message, "failed to resolve step");
                    err
                })?;

        if let Some(name) = display_name {
            descriptor.set_name(name);
        }

        let mismatches = match parameter_values {
            Some(values) => descriptor.bind(values),
            None => Vec::new(),
        };
        if self.strict_binding {
            if let Some(first) = mismatches.first() {
                return Err(AppError::from(first).with_suggestion(
                    "remove the unknown value or disable pipeline.strict_binding",
                ));
            }
        }

        tracing::info!(
            index = self.steps.len(),
            step = %descriptor.name(),
            mismatches = mismatches.len(),
            "added pipeline step"
        );
        self.steps.push(descriptor);
        if self.state == PipelineState::Complete {
            self.state = PipelineState::Stepping;
        }
        Ok(mismatches)
    }

    /// Remove the step at `index`; out-of-range indices are ignored.
    pub fn remove_step(&mut self, index: usize) -> Option<TransformationDescriptor> {
        if index >= self.steps.len() {
            tracing::debug!(index, len = self.steps.len(), "remove_step index out of range");
            return None;
        }
        let removed = self.steps.remove(index);

        if self.state != PipelineState::Idle {
            if index < self.cursor {
                tracing::info!(index, "removed an executed step; stepping session invalidated");
                self.cursor = 0;
                self.state = PipelineState::Idle;
            } else if self.cursor == self.steps.len() {
                self.state = PipelineState::Complete;
            }
        }
        Some(removed)
    }

    pub fn clear_steps(&mut self) {
        self.steps.clear();
        self.cursor = 0;
        self.state = PipelineState::Idle;
        self.working = self.original.clone();
    }

    /// Replace the dataset and drop every step.
    pub fn reset(&mut self, dataset: Option<Dataset>) {
        self.original = dataset.unwrap_or_default();
        self.clear_steps();
    }

    /// Execute every step from the original dataset.
    ///
    /// On failure the working dataset holds the last successful output and
    /// the error names the failing step.
    pub fn run(&mut self) -> Result<RunReport, AppError> {
        let span = tracing::info_span!("pipeline_run", steps = self.steps.len());
        let _guard = span.enter();

        self.cursor = 0;
        self.state = PipelineState::Idle;
        self.working = self.original.clone();

        let started = Instant::now();
        let (rows, columns) = self.original.shape();
        let mut report = RunReport::start(rows, columns);

        for index in 0..self.steps.len() {
            let record = self.execute(index)?;
            report.steps.push(record);
        }

        report.rows = self.working.n_rows();
        report.columns = self.working.n_columns();
        report.duration = started.elapsed();
        tracing::info!(summary = %report.summary(), "pipeline run finished");
        Ok(report)
    }

    /// Begin a resumable session from the original dataset.
    pub fn start_stepping(&mut self) {
        self.working = self.original.clone();
        self.cursor = 0;
        self.state = if self.steps.is_empty() {
            PipelineState::Complete
        } else {
            PipelineState::Stepping
        };
        tracing::debug!(steps = self.steps.len(), "stepping session started");
    }

    /// Execute the step at the cursor.
    pub fn advance(&mut self) -> Result<StepOutcome, AppError> {
        match self.state {
            PipelineState::Complete => return Ok(StepOutcome::Complete),
            PipelineState::Idle => self.start_stepping(),
            PipelineState::Stepping => {}
        }
        if self.cursor >= self.steps.len() {
            self.state = PipelineState::Complete;
            return Ok(StepOutcome::Complete);
        }

        let record = self.execute(self.cursor)?;
        self.cursor += 1;
        if self.cursor == self.steps.len() {
            self.state = PipelineState::Complete;
        }
        Ok(StepOutcome::Advanced(record))
    }

    /// Advance until the session completes.
    pub fn advance_to_end(&mut self) -> Result<Vec<StepRecord>, AppError> {
        let mut records = Vec::new();
        while let StepOutcome::Advanced(record) = self.advance()? {
            records.push(record);
        }
        Ok(records)
    }

    pub fn display_architecture(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| format!("Step {}: {}", index + 1, step.name()))
            .collect()
    }

    fn execute(&mut self, index: usize) -> Result<StepRecord, AppError> {
        let step = &self.steps[index];
        let started = Instant::now();
        let output = step
            .invoke(self.working.clone(), &BindingStrategy::Saved)
            .map_err(|err| step_failure(index, step.name(), err))?;

        let record = StepRecord {
            index,
            name: step.name().to_string(),
            rows: output.n_rows(),
            columns: output.n_columns(),
            duration: started.elapsed(),
        };
        tracing::debug!(
            index,
            step = %record.name,
            rows = record.rows,
            columns = record.columns,
            "step finished"
        );
        self.working = output;
        Ok(record)
    }
}

fn step_failure(index: usize, name: &str, cause: AppError) -> AppError {
    tracing::error!(index, step = %name, code = %cause.code, "step failed: {}", cause.message);
    let code = if cause.code.starts_with("TF-STEP-") {
        cause.code.clone()
    } else {
        "TF-STEP-001".to_string()
    };
    let message = format!("step {} '{}' failed: {}", index + 1, name, cause.message);
    let mut error =
        AppError::with_source(ErrorCategory::StepExecutionError, message, Box::new(cause))
            .with_code(code);
    error.add_context("step_index", &index.to_string());
    error.add_context("step_name", name);
    error
}
