use crate::core::catalog::{Catalog, CatalogBuilder};
use crate::core::dataset::Dataset;
use crate::core::descriptor::arguments::value_as_f64;
use crate::core::descriptor::{RegisteredTransformation, StepArguments};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde_json::{json, Number, Value};

pub const DATA_MANIPULATION: &str = "Data Manipulation";
pub const COERCION: &str = "Coercion";
pub const EXPLORATORY_ANALYSIS: &str = "Exploratory Analysis";

pub fn builtin_catalog() -> Result<Catalog, AppError> {
    let mut builder = CatalogBuilder::new();
    register_builtin_transformations(&mut builder)?;
    Ok(builder.build())
}

pub fn register_builtin_transformations(builder: &mut CatalogBuilder) -> Result<(), AppError> {
    builder
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("multiply_column")
                .doc("Multiply every value of a numeric column by a factor.")
                .dataset("data")
                .param("column", "String")
                .param("factor", "f64")
                .build(multiply_column)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("add_constant")
                .doc("Add a constant to every value of a numeric column.")
                .dataset("data")
                .param("column", "String")
                .param("value", "f64")
                .build(add_constant)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("replace_null")
                .doc("Replace missing values with a specified value.")
                .dataset("data")
                .param("value", "Value")
                .keyword("columns", "Option<Vec<String>>", Some(Value::Null))
                .build(replace_null)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("drop_duplicates")
                .doc("Drop duplicate rows, keeping the first occurrence.")
                .dataset("data")
                .build(drop_duplicates)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("drop_columns")
                .doc("Remove the named columns.")
                .dataset("data")
                .param("columns", "Vec<String>")
                .build(drop_columns)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("select_columns")
                .doc("Keep only the named columns, in the given order.")
                .dataset("data")
                .param("columns", "Vec<String>")
                .build(select_columns)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("rename_column")
                .doc("Rename a column in place.")
                .dataset("data")
                .param("column", "String")
                .param("new_name", "String")
                .build(rename_column)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("normalize")
                .doc("Min-max normalize the given columns into [0, 1].")
                .dataset("data")
                .param("columns", "Vec<String>")
                .build(normalize)?,
        )
        .register(
            DATA_MANIPULATION,
            RegisteredTransformation::builder("impute_missing")
                .doc("Fill missing values with the column mean.")
                .dataset("data")
                .param("columns", "Vec<String>")
                .build(impute_missing)?,
        )
        .register(
            COERCION,
            RegisteredTransformation::builder("coerce_numeric")
                .doc("Convert a column to numbers; unparseable values become null.")
                .dataset("data")
                .param("column", "String")
                .build(coerce_numeric)?,
        )
        .register(
            COERCION,
            RegisteredTransformation::builder("coerce_text")
                .doc("Convert a column to text.")
                .dataset("data")
                .param("column", "String")
                .build(coerce_text)?,
        )
        .register(
            COERCION,
            RegisteredTransformation::builder("coerce_bool")
                .doc("Convert a column to booleans by truthiness.")
                .dataset("data")
                .param("column", "String")
                .build(coerce_bool)?,
        )
        .register(
            EXPLORATORY_ANALYSIS,
            RegisteredTransformation::builder("find_missing_values")
                .doc("Keep the rows with a missing value in any of the given columns, or in any column.")
                .dataset("data")
                .keyword("columns", "Option<Vec<String>>", Some(Value::Null))
                .build(find_missing_values)?,
        );
    Ok(())
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Mul,
}

fn multiply_column(data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    map_numeric_column(data, args.str("column")?, args.f64("factor")?, Arith::Mul)
}

fn add_constant(data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    map_numeric_column(data, args.str("column")?, args.f64("value")?, Arith::Add)
}

fn map_numeric_column(
    mut data: Dataset,
    column: &str,
    operand: f64,
    op: Arith,
) -> Result<Dataset, AppError> {
    let values = data
        .require_column(column)?
        .iter()
        .map(|cell| apply_arith(column, cell, operand, op))
        .collect::<Result<Vec<_>, _>>()?;
    data.set_column(column, values)?;
    Ok(data)
}

/// Integer cells stay integers when the operand is integral and nothing overflows.
fn apply_arith(column: &str, cell: &Value, operand: f64, op: Arith) -> Result<Value, AppError> {
    let Value::Number(number) = cell else {
        return match cell {
            Value::Null => Ok(Value::Null),
            other => Err(non_numeric(column, other)),
        };
    };

    if let Some(lhs) = number.as_i64() {
        if operand.fract() == 0.0 && operand.abs() < i64::MAX as f64 {
            let rhs = operand as i64;
            let exact = match op {
                Arith::Add => lhs.checked_add(rhs),
                Arith::Mul => lhs.checked_mul(rhs),
            };
            if let Some(result) = exact {
                return Ok(json!(result));
            }
        }
    }

    let lhs = number.as_f64().ok_or_else(|| non_numeric(column, cell))?;
    let result = match op {
        Arith::Add => lhs + operand,
        Arith::Mul => lhs * operand,
    };
    Ok(float_value(result))
}

fn replace_null(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    let replacement = args.require("value")?.clone();
    let columns = match args.optional_string_list("columns")? {
        Some(columns) => columns,
        None => data.column_names(),
    };
    for column in columns {
        let values = data
            .require_column(&column)?
            .iter()
            .map(|cell| match cell {
                Value::Null => replacement.clone(),
                other => other.clone(),
            })
            .collect();
        data.set_column(column, values)?;
    }
    Ok(data)
}

fn drop_duplicates(mut data: Dataset, _args: &StepArguments) -> Result<Dataset, AppError> {
    let removed = data.drop_duplicate_rows();
    tracing::debug!(removed, "dropped duplicate rows");
    Ok(data)
}

fn drop_columns(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    let columns = args.string_list("columns")?;
    for column in &columns {
        data.require_column(column)?;
    }
    for column in &columns {
        data.remove_column(column);
    }
    Ok(data)
}

fn select_columns(data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    Ok(data.select_columns(&args.string_list("columns")?)?)
}

fn rename_column(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    data.rename_column(args.str("column")?, args.str("new_name")?)?;
    Ok(data)
}

fn normalize(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    for column in args.string_list("columns")? {
        let numbers = numeric_cells(&column, data.require_column(&column)?)?;
        let present: Vec<f64> = numbers.iter().flatten().copied().collect();
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = max - min;

        let values = numbers
            .into_iter()
            .map(|cell| match cell {
                None => Value::Null,
                Some(_) if span == 0.0 => float_value(0.0),
                Some(x) => float_value((x - min) / span),
            })
            .collect();
        data.set_column(column, values)?;
    }
    Ok(data)
}

fn impute_missing(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    for column in args.string_list("columns")? {
        let cells = data.require_column(&column)?;
        let numbers = numeric_cells(&column, cells)?;
        let present: Vec<f64> = numbers.iter().flatten().copied().collect();
        if present.is_empty() {
            tracing::warn!(column = %column, "no values to impute from");
            continue;
        }
        let mean = float_value(present.iter().sum::<f64>() / present.len() as f64);

        let values = cells
            .iter()
            .map(|cell| match cell {
                Value::Null => mean.clone(),
                other => other.clone(),
            })
            .collect();
        data.set_column(column, values)?;
    }
    Ok(data)
}

fn coerce_numeric(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    let column = args.str("column")?;
    let values = data
        .require_column(column)?
        .iter()
        .map(|cell| match cell {
            Value::Number(_) => cell.clone(),
            Value::Bool(flag) => json!(i64::from(*flag)),
            Value::String(text) => parse_number(text.trim()),
            _ => Value::Null,
        })
        .collect();
    data.set_column(column, values)?;
    Ok(data)
}

fn coerce_text(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    let column = args.str("column")?;
    let values = data
        .require_column(column)?
        .iter()
        .map(|cell| match cell {
            Value::Null | Value::String(_) => cell.clone(),
            other => Value::String(other.to_string()),
        })
        .collect();
    data.set_column(column, values)?;
    Ok(data)
}

fn coerce_bool(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    let column = args.str("column")?;
    let values = data
        .require_column(column)?
        .iter()
        .map(|cell| Value::Bool(is_truthy(cell)))
        .collect();
    data.set_column(column, values)?;
    Ok(data)
}

fn find_missing_values(mut data: Dataset, args: &StepArguments) -> Result<Dataset, AppError> {
    let columns = match args.optional_string_list("columns")? {
        Some(columns) => columns,
        None => data.column_names(),
    };
    let mut mask = vec![false; data.n_rows()];
    for column in &columns {
        for (keep, cell) in mask.iter_mut().zip(data.require_column(column)?) {
            *keep |= cell.is_null();
        }
    }
    data.retain_rows(&mask)?;
    Ok(data)
}

fn numeric_cells(column: &str, cells: &[Value]) -> Result<Vec<Option<f64>>, AppError> {
    cells
        .iter()
        .map(|cell| match cell {
            Value::Null => Ok(None),
            Value::Number(_) => Ok(value_as_f64(cell)),
            other => Err(non_numeric(column, other)),
        })
        .collect()
}

fn parse_number(text: &str) -> Value {
    if let Ok(integer) = text.parse::<i64>() {
        return json!(integer);
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}

fn non_numeric(column: &str, cell: &Value) -> AppError {
    let mut error = AppError::new(
        ErrorCategory::StepExecutionError,
        format!("column '{}' contains a non-numeric value: {}", column, cell),
    )
    .with_code("TF-STEP-001");
    error.add_context("column", column);
    error
}
