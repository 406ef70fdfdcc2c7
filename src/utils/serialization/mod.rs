use crate::core::dataset::Dataset;
use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub trait Serializer {
    fn serialize<T: Serialize>(&self, data: &T) -> Result<Vec<u8>>;
    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T>;
}

/// Pretty-printed JSON.
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, data: &T) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(data).map_err(Into::into)
    }

    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        serde_json::from_slice(data).map_err(Into::into)
    }
}

pub struct YamlSerializer;

impl Serializer for YamlSerializer {
    fn serialize<T: Serialize>(&self, data: &T) -> Result<Vec<u8>> {
        serde_yaml::to_string(data)
            .map(String::into_bytes)
            .map_err(Into::into)
    }

    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        serde_yaml::from_slice(data).map_err(Into::into)
    }
}

pub trait FileSerializer {
    fn save_to_file<T: Serialize, S: Serializer>(
        &self,
        path: &Path,
        data: &T,
        serializer: &S,
    ) -> Result<()>;
    fn load_from_file<T: DeserializeOwned, S: Serializer>(
        &self,
        path: &Path,
        serializer: &S,
    ) -> Result<T>;
}

pub struct FileUtils;

impl FileSerializer for FileUtils {
    fn save_to_file<T: Serialize, S: Serializer>(
        &self,
        path: &Path,
        data: &T,
        serializer: &S,
    ) -> Result<()> {
        let content = serializer.serialize(data)?;
        fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }

    fn load_from_file<T: DeserializeOwned, S: Serializer>(
        &self,
        path: &Path,
        serializer: &S,
    ) -> Result<T> {
        let content = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        serializer
            .deserialize(&content)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Read a dataset stored either as a column map or as an array of row objects.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let value: Value = FileUtils.load_from_file(path, &JsonSerializer)?;
    match value {
        Value::Array(records) => Ok(Dataset::from_records(&records)?),
        Value::Object(_) => Ok(serde_json::from_value(value)?),
        other => Err(anyhow!(
            "{} must hold a column map or an array of records, found {}",
            path.display(),
            json_kind(&other)
        )),
    }
}

/// Write a dataset as a column map.
pub fn save_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    FileUtils.save_to_file(path, dataset, &JsonSerializer)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
