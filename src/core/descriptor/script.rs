//! Sandboxed synthesis of transformations from Rhai source text.
//!
//! Source submitted by an editor must define exactly one named function whose
//! first parameter receives the dataset as a map of column arrays. The function
//! returns that map (modified or rebuilt) and the engine turns it back into a
//! [`Dataset`].

use crate::core::dataset::Dataset;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use regex::Regex;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Scope, AST, FLOAT, INT};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number, Value};
use std::sync::{Arc, OnceLock};

/// Rhai names closures `anon$<hash>` and hoists them into the AST function table.
const ANONYMOUS_FN_PREFIX: &str = "anon$";
const SOURCE_EXCERPT_CHARS: usize = 200;

/// Resource caps applied to every script engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_collection_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 5_000_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_collection_size: 1_000_000,
        }
    }
}

/// A function recovered from source text, ready to be wrapped in a descriptor.
pub struct CompiledFunction {
    pub ast: AST,
    pub function_name: String,
    pub parameters: Vec<String>,
    pub documentation: Option<String>,
    /// Source with import lines blanked out.
    pub source: String,
}

/// Rhai engine locked down for user-supplied transformations.
pub struct ScriptEngine {
    engine: Engine,
    limits: ScriptLimits,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::with_limits(&ScriptLimits::default())
    }
}

impl ScriptEngine {
    pub fn with_limits(limits: &ScriptLimits) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_string_size(limits.max_collection_size);
        engine.set_max_array_size(limits.max_collection_size);
        engine.set_max_map_size(limits.max_collection_size);
        engine.set_module_resolver(DummyModuleResolver::new());
        engine.on_print(|_| {});
        engine.on_debug(|_, _, _| {});
        register_column_arithmetic(&mut engine);
        ScriptEngine {
            engine,
            limits: limits.clone(),
        }
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    /// Compile `source` and locate the single function it defines.
    ///
    /// Import lines are blanked before compilation so the definition stays
    /// self-contained. Top-level statements are evaluated once in a throwaway
    /// scope; any failure there is reported now rather than during a run.
    pub fn compile_function(&self, source: &str) -> Result<CompiledFunction, AppError> {
        let stripped = strip_import_lines(source);
        let ast = self.engine.compile(&stripped).map_err(|err| {
            resolution_error(
                format!("failed to compile transformation source: {}", err),
                source,
                "TF-RESOLVE-001",
            )
        })?;

        let mut functions: Vec<(String, Vec<String>)> = ast
            .iter_functions()
            .filter(|function| !function.name.starts_with(ANONYMOUS_FN_PREFIX))
            .map(|function| {
                (
                    function.name.to_string(),
                    function.params.iter().map(|param| param.to_string()).collect(),
                )
            })
            .collect();

        match functions.len() {
            0 => {
                return Err(resolution_error(
                    "transformation source does not define a function",
                    source,
                    "TF-RESOLVE-002",
                ))
            }
            1 => {}
            _ => {
                let names: Vec<&str> = functions.iter().map(|(name, _)| name.as_str()).collect();
                return Err(resolution_error(
                    format!(
                        "transformation source must define exactly one function, found {}: {}",
                        functions.len(),
                        names.join(", ")
                    ),
                    source,
                    "TF-RESOLVE-003",
                ));
            }
        }
        let (function_name, parameters) = functions.remove(0);

        let mut scope = Scope::new();
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| {
                resolution_error(
                    format!("transformation source failed during evaluation: {}", err),
                    source,
                    "TF-RESOLVE-001",
                )
            })?;

        let documentation = extract_doc_comment(&stripped, &function_name);
        tracing::debug!(function = %function_name, params = parameters.len(), "compiled script transformation");
        Ok(CompiledFunction {
            ast,
            function_name,
            parameters,
            documentation,
            source: stripped,
        })
    }

    fn call(
        &self,
        ast: &AST,
        function_name: &str,
        dataset: Dataset,
        args: Vec<Dynamic>,
    ) -> Result<Dataset, AppError> {
        let column_order = dataset.column_names();
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(dataset_to_dynamic(&dataset));
        call_args.extend(args);

        // Top-level statements already ran at compile time.
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = Scope::new();
        let result = self
            .engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, ast, function_name, call_args)
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::StepExecutionError,
                    format!("'{}' raised: {}", function_name, err),
                )
                .with_code("TF-STEP-001")
            })?;
        dynamic_to_dataset(result, &column_order).map_err(|err| err.with_context(function_name))
    }
}

/// Callable half of a script transformation.
#[derive(Clone)]
pub struct ScriptFunction {
    engine: Arc<ScriptEngine>,
    ast: Arc<AST>,
    function_name: String,
}

impl ScriptFunction {
    pub fn new(engine: Arc<ScriptEngine>, compiled: &CompiledFunction) -> Self {
        Self {
            engine,
            ast: Arc::new(compiled.ast.clone()),
            function_name: compiled.function_name.clone(),
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Call with the dataset first and the remaining values in declaration order.
    pub fn call(&self, dataset: Dataset, args: &[Value]) -> Result<Dataset, AppError> {
        let args = args.iter().map(to_dynamic).collect();
        self.engine
            .call(&self.ast, &self.function_name, dataset, args)
    }
}

/// Blank out `import`, `from ... import` and `use` lines, keeping line numbers stable.
pub fn strip_import_lines(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            if import_line_pattern().is_match(line) {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn import_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:import\s|from\s+\S+\s+import\s|use\s)").expect("import pattern is valid")
    })
}

/// Contiguous `///` lines directly above the function header.
fn extract_doc_comment(source: &str, function_name: &str) -> Option<String> {
    let header = Regex::new(&format!(
        r"^\s*(?:private\s+)?fn\s+{}\s*\(",
        regex::escape(function_name)
    ))
    .ok()?;
    let lines: Vec<&str> = source.lines().collect();
    let position = lines.iter().position(|line| header.is_match(line))?;
    let mut doc: Vec<&str> = lines[..position]
        .iter()
        .rev()
        .map(|line| line.trim())
        .take_while(|line| line.starts_with("///"))
        .map(|line| line.trim_start_matches('/').trim())
        .collect();
    if doc.is_empty() {
        return None;
    }
    doc.reverse();
    Some(doc.join("\n"))
}

fn resolution_error<M: Into<String>>(message: M, source: &str, code: &str) -> AppError {
    let excerpt: String = source.trim().chars().take(SOURCE_EXCERPT_CHARS).collect();
    let mut error = AppError::new(ErrorCategory::ResolutionError, message).with_code(code);
    error.add_context("source", &excerpt);
    error
}

fn not_a_dataset<M: Into<String>>(message: M) -> AppError {
    AppError::new(
        ErrorCategory::StepExecutionError,
        format!("step did not return a dataset: {}", message.into()),
    )
    .with_code("TF-STEP-003")
    .with_suggestion("return the data map from the transformation function")
}

fn dataset_to_dynamic(dataset: &Dataset) -> Dynamic {
    let mut map = Map::new();
    for (name, values) in dataset.columns() {
        let column: Array = values.iter().map(to_dynamic).collect();
        map.insert(name.as_str().into(), Dynamic::from_array(column));
    }
    Dynamic::from_map(map)
}

fn dynamic_to_dataset(value: Dynamic, column_order: &[String]) -> Result<Dataset, AppError> {
    let type_name = value.type_name();
    let mut map = value
        .try_cast::<Map>()
        .ok_or_else(|| not_a_dataset(format!("returned {}", type_name)))?;

    let mut columns: Vec<(String, Vec<Value>)> = Vec::with_capacity(map.len());
    for name in column_order {
        if let Some(column) = map.remove(name.as_str()) {
            columns.push((name.clone(), column_values(name, column)?));
        }
    }
    for (name, column) in map {
        let values = column_values(&name, column)?;
        columns.push((name.to_string(), values));
    }
    Dataset::from_columns(columns).map_err(|err| not_a_dataset(err.to_string()))
}

fn column_values(name: &str, column: Dynamic) -> Result<Vec<Value>, AppError> {
    let type_name = column.type_name();
    column
        .try_cast::<Array>()
        .map(|items| items.into_iter().map(from_dynamic).collect())
        .ok_or_else(|| {
            not_a_dataset(format!(
                "column '{}' is {}, expected an array",
                name, type_name
            ))
        })
}

pub(crate) fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i as INT)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f as FLOAT)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        Value::Object(map) => {
            let mut rhai_map = Map::new();
            for (key, value) in map {
                rhai_map.insert(key.as_str().into(), to_dynamic(value));
            }
            Dynamic::from_map(rhai_map)
        }
    }
}

pub(crate) fn from_dynamic(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Some(b) = value.clone().try_cast::<bool>() {
        return Value::Bool(b);
    }
    if let Some(i) = value.clone().try_cast::<INT>() {
        return Value::Number(Number::from(i));
    }
    if let Some(f) = value.clone().try_cast::<FLOAT>() {
        return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Some(c) = value.clone().try_cast::<char>() {
        return Value::String(c.to_string());
    }
    if let Some(s) = value.clone().try_cast::<String>() {
        return Value::String(s);
    }
    if let Some(arr) = value.clone().try_cast::<Array>() {
        return Value::Array(arr.into_iter().map(from_dynamic).collect());
    }
    if let Some(map) = value.try_cast::<Map>() {
        let mut json_map = JsonMap::new();
        for (key, value) in map {
            json_map.insert(key.to_string(), from_dynamic(value));
        }
        return Value::Object(json_map);
    }
    Value::Null
}

#[derive(Clone, Copy)]
enum ColumnOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ColumnOp {
    fn symbol(self) -> &'static str {
        match self {
            ColumnOp::Add => "+",
            ColumnOp::Sub => "-",
            ColumnOp::Mul => "*",
            ColumnOp::Div => "/",
        }
    }
}

/// `column <op> scalar` applied cell by cell; `()` cells stay `()`.
fn register_column_arithmetic(engine: &mut Engine) {
    for op in [ColumnOp::Add, ColumnOp::Sub, ColumnOp::Mul, ColumnOp::Div] {
        engine.register_fn(op.symbol(), move |column: Array, operand: INT| {
            apply_column_op(column, Dynamic::from(operand), op)
        });
        engine.register_fn(op.symbol(), move |column: Array, operand: FLOAT| {
            apply_column_op(column, Dynamic::from(operand), op)
        });
    }
}

fn apply_column_op(
    column: Array,
    operand: Dynamic,
    op: ColumnOp,
) -> Result<Array, Box<EvalAltResult>> {
    column
        .into_iter()
        .map(|cell| apply_cell_op(cell, &operand, op))
        .collect()
}

fn apply_cell_op(cell: Dynamic, operand: &Dynamic, op: ColumnOp) -> Result<Dynamic, Box<EvalAltResult>> {
    if cell.is_unit() {
        return Ok(Dynamic::UNIT);
    }
    if let (Some(lhs), Some(rhs)) = (cell.clone().try_cast::<INT>(), operand.clone().try_cast::<INT>()) {
        let result = match op {
            ColumnOp::Add => lhs.checked_add(rhs),
            ColumnOp::Sub => lhs.checked_sub(rhs),
            ColumnOp::Mul => lhs.checked_mul(rhs),
            ColumnOp::Div => return finite(lhs as FLOAT / rhs as FLOAT, op),
        };
        return result
            .map(Dynamic::from)
            .ok_or_else(|| format!("integer overflow in column '{}'", op.symbol()).into());
    }
    let lhs = as_float(&cell)
        .ok_or_else(|| format!("cannot apply '{}' to a {} cell", op.symbol(), cell.type_name()))?;
    let rhs = as_float(operand).unwrap_or(0.0);
    let result = match op {
        ColumnOp::Add => lhs + rhs,
        ColumnOp::Sub => lhs - rhs,
        ColumnOp::Mul => lhs * rhs,
        ColumnOp::Div => lhs / rhs,
    };
    finite(result, op)
}

/// Reject `inf` and `NaN`, which have no JSON cell form.
fn finite(result: FLOAT, op: ColumnOp) -> Result<Dynamic, Box<EvalAltResult>> {
    if result.is_finite() {
        Ok(Dynamic::from(result))
    } else if matches!(op, ColumnOp::Div) {
        Err("division by zero in column '/'".into())
    } else {
        Err(format!("non-finite result in column '{}'", op.symbol()).into())
    }
}

fn as_float(value: &Dynamic) -> Option<FLOAT> {
    value
        .clone()
        .try_cast::<FLOAT>()
        .or_else(|| value.clone().try_cast::<INT>().map(|i| i as FLOAT))
}
