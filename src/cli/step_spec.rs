//! `--step` values: `NAME[:k=v,...]` for catalog entries, `@FILE[:k=v,...]` for scripts.
//!
//! Values parse as JSON and fall back to plain strings, so `factor=10`,
//! `columns=["A","B"]` and `column=A` all work.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum StepTarget {
    Catalog(String),
    Script(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    pub target: StepTarget,
    pub values: Map<String, Value>,
}

impl FromStr for StepSpec {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (head, tail) = match spec.split_once(':') {
            Some((head, tail)) => (head.trim(), Some(tail)),
            None => (spec.trim(), None),
        };

        let target = match head.strip_prefix('@') {
            Some("") => return Err("script path after '@' is empty".to_string()),
            Some(path) => StepTarget::Script(PathBuf::from(path)),
            None if head.is_empty() => return Err("step name is empty".to_string()),
            None => StepTarget::Catalog(head.to_string()),
        };

        let mut values = Map::new();
        for pair in tail.map(split_top_level).unwrap_or_default() {
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got '{}'", pair))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("empty parameter name in '{}'", pair));
            }
            values.insert(key.to_string(), parse_value(raw.trim()));
        }

        Ok(StepSpec { target, values })
    }
}

pub fn parse_step_spec(spec: &str) -> Result<StepSpec, String> {
    spec.parse()
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Split on commas outside brackets, braces and double quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (index, ch) in input.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter().filter(|part| !part.trim().is_empty()).collect()
}
