use crate::cli::args::{CatalogArgs, InspectArgs, OutputFormat, RunArgs};
use crate::cli::step_spec::{StepSpec, StepTarget};
use crate::core::catalog::Catalog;
use crate::core::config::{ConfigLoader, TabflowConfig};
use crate::core::descriptor::{
    DescriptorRecord, ParameterKind, ScriptEngine, TransformationDescriptor, TransformationSource,
};
use crate::core::error::{DefaultErrorReporter, ErrorReporter};
use crate::core::pipeline::{Pipeline, StepOutcome};
use crate::utils::{load_dataset, save_dataset, JsonSerializer, Serializer, YamlSerializer};
use crate::Result;
use anyhow::{anyhow, bail, Context};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub fn catalog(args: CatalogArgs, workspace: Option<PathBuf>) -> Result<()> {
    load_config(workspace.as_deref())?;
    let catalog = Catalog::builtin()?;

    let mut records = catalog.all_records();
    if let Some(group) = &args.group {
        if !records.contains_key(group) {
            bail!(
                "unknown group '{}'; available groups: {}",
                group,
                catalog.groups().collect::<Vec<_>>().join(", ")
            );
        }
        records.retain(|name, _| name == group);
    }

    match args.format {
        OutputFormat::Text => {
            for (group, entries) in &records {
                println!("{}:", group);
                for record in entries {
                    println!("  {}", signature_line(record));
                    if let Some(doc) = &record.documentation {
                        println!("      {}", doc);
                    }
                }
            }
            Ok(())
        }
        format => print_structured(&records, format),
    }
}

pub fn inspect(args: InspectArgs, workspace: Option<PathBuf>) -> Result<()> {
    let config = load_config(workspace.as_deref())?;
    let engine = Arc::new(ScriptEngine::with_limits(&config.script.limits()));
    let source = read_script(&args.script)?;
    let record = TransformationDescriptor::from_source(&engine, &source)
        .map_err(|err| report(err, "script could not be resolved"))?
        .to_record();

    match args.format {
        OutputFormat::Text => {
            println!("name: {}", record.name);
            println!("function: {}", signature_line(&record));
            if let Some(doc) = &record.documentation {
                println!("documentation: {}", doc);
            }
            Ok(())
        }
        format => print_structured(&record, format),
    }
}

pub fn run(args: RunArgs, workspace: Option<PathBuf>) -> Result<()> {
    let config = load_config(workspace.as_deref())?;
    let dataset = load_dataset(&args.data)?;
    let mut pipeline = Pipeline::from_config(&config, Some(dataset))?;

    for spec in &args.steps {
        let source = step_source(&pipeline, spec)?;
        let mismatches = pipeline
            .add_step(source, Some(&spec.values), None)
            .map_err(|err| report(err, "step could not be added"))?;
        for mismatch in mismatches {
            eprintln!("warning: {}", mismatch);
        }
    }

    println!("Pipeline:");
    for line in pipeline.display_architecture() {
        println!("  {}", line);
    }

    let total = pipeline.len();
    if args.step_by_step {
        pipeline.start_stepping();
        loop {
            match pipeline.advance().map_err(|err| report(err, "pipeline halted"))? {
                StepOutcome::Advanced(record) => println!(
                    "[{}/{}] {} -> {} row(s) x {} column(s)",
                    record.index + 1,
                    total,
                    record.name,
                    record.rows,
                    record.columns
                ),
                StepOutcome::Complete => break,
            }
        }
    } else {
        let report = pipeline
            .run()
            .map_err(|err| report(err, "pipeline run failed"))?;
        println!("{}", report.summary());
    }

    let result = pipeline.working_dataset();
    match &args.output {
        Some(path) => {
            save_dataset(path, result)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        None => print_structured(result, args.format),
    }
}

fn load_config(workspace: Option<&Path>) -> Result<TabflowConfig> {
    match workspace {
        Some(path) => Ok(ConfigLoader::load_from_workspace(path)?),
        None => Ok(TabflowConfig::default()),
    }
}

fn step_source(pipeline: &Pipeline, spec: &StepSpec) -> Result<TransformationSource> {
    match &spec.target {
        StepTarget::Catalog(name) => pipeline
            .catalog()
            .find(name)
            .map(TransformationSource::from)
            .ok_or_else(|| anyhow!("unknown transformation '{}'; see `tabflow catalog`", name)),
        StepTarget::Script(path) => Ok(TransformationSource::script(read_script(path)?)),
    }
}

fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read script {}", path.display()))
}

/// Log a structured error and hand it back as an anyhow error.
fn report(error: crate::core::error::AppError, context: &'static str) -> anyhow::Error {
    DefaultErrorReporter::new().report_error(&error);
    anyhow::Error::new(error).context(context)
}

fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let bytes = match format {
        OutputFormat::Yaml => YamlSerializer.serialize(value)?,
        OutputFormat::Json | OutputFormat::Text => JsonSerializer.serialize(value)?,
    };
    let text = String::from_utf8(bytes).context("serialized output is not UTF-8")?;
    println!("{}", text.trim_end());
    Ok(())
}

/// `name(data, column: String, factor: f64 = 1)`
fn signature_line(record: &DescriptorRecord) -> String {
    let parameters: Vec<String> = record
        .parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| {
            let prefix = match parameter.kind {
                ParameterKind::VariadicPositional => "*",
                ParameterKind::VariadicKeyword => "**",
                _ => "",
            };
            let mut rendered = format!("{}{}", prefix, parameter.name);
            if index > 0 {
                rendered.push_str(&format!(": {}", parameter.declared_type));
            }
            if let Some(default) = &parameter.default_value {
                rendered.push_str(&format!(" = {}", default));
            }
            rendered
        })
        .collect();
    format!("{}({})", record.function_name, parameters.join(", "))
}
