//! Column-major tabular dataset passed through pipelines.
//!
//! A [`Dataset`] is an ordered set of named columns whose cells are JSON values.
//! Every column holds the same number of rows; the constructors and mutators
//! enforce that so transformations can index rows freely.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Ordered column storage used for (de)serialization.
pub type ColumnMap = IndexMap<String, Vec<Value>>;

/// Shape and naming failures raised by dataset operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatasetError {
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
    #[error("row mask has {actual} entries, expected {expected}")]
    MaskLength { expected: usize, actual: usize },
    #[error("invalid record at row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },
}

impl From<DatasetError> for AppError {
    fn from(err: DatasetError) -> Self {
        AppError::new(ErrorCategory::DatasetError, err.to_string()).with_code("TF-DATA-001")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnMap", into = "ColumnMap")]
pub struct Dataset {
    columns: ColumnMap,
}

impl Dataset {
    /// An empty dataset with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from named columns, rejecting ragged input.
    pub fn from_columns<I, K>(columns: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = (K, Vec<Value>)>,
        K: Into<String>,
    {
        let mut dataset = Dataset::new();
        for (name, values) in columns {
            let name = name.into();
            if dataset.columns.contains_key(&name) {
                return Err(DatasetError::DuplicateColumn(name));
            }
            dataset.set_column(name, values)?;
        }
        Ok(dataset)
    }

    /// Build a dataset from row objects. Columns appear in first-seen order and
    /// cells missing from a row are filled with `null`.
    pub fn from_records(records: &[Value]) -> Result<Self, DatasetError> {
        let mut names: IndexMap<String, ()> = IndexMap::new();
        for (row, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| DatasetError::InvalidRecord {
                row,
                reason: "expected a JSON object".to_string(),
            })?;
            for key in object.keys() {
                names.entry(key.clone()).or_insert(());
            }
        }

        let mut columns = ColumnMap::new();
        for name in names.keys() {
            let values = records
                .iter()
                .map(|record| record.get(name).cloned().unwrap_or(Value::Null))
                .collect();
            columns.insert(name.clone(), values);
        }
        Ok(Dataset { columns })
    }

    /// Render the dataset as one JSON object per row.
    pub fn to_records(&self) -> Vec<Value> {
        (0..self.n_rows())
            .map(|index| Value::Object(self.row(index).unwrap_or_default()))
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.values().next().map(Vec::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows(), self.n_columns())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn require_column(&self, name: &str) -> Result<&[Value], DatasetError> {
        self.column(name)
            .ok_or_else(|| DatasetError::UnknownColumn(name.to_string()))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.columns.iter()
    }

    /// Insert or replace a column. Replacement keeps the column's position.
    pub fn set_column<K: Into<String>>(
        &mut self,
        name: K,
        values: Vec<Value>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        let replacing_only_column = self.columns.len() == 1 && self.columns.contains_key(&name);
        if !self.columns.is_empty() && !replacing_only_column && values.len() != self.n_rows() {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.n_rows(),
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Value>> {
        self.columns.shift_remove(name)
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), DatasetError> {
        if from == to {
            return self.require_column(from).map(|_| ());
        }
        if !self.columns.contains_key(from) {
            return Err(DatasetError::UnknownColumn(from.to_string()));
        }
        if self.columns.contains_key(to) {
            return Err(DatasetError::DuplicateColumn(to.to_string()));
        }
        self.columns = std::mem::take(&mut self.columns)
            .into_iter()
            .map(|(name, values)| {
                if name == from {
                    (to.to_string(), values)
                } else {
                    (name, values)
                }
            })
            .collect();
        Ok(())
    }

    /// Keep only the columns named, in the order given.
    pub fn select_columns(&self, names: &[String]) -> Result<Dataset, DatasetError> {
        let mut selected = ColumnMap::new();
        for name in names {
            let values = self.require_column(name)?;
            selected.insert(name.clone(), values.to_vec());
        }
        Ok(Dataset { columns: selected })
    }

    /// Keep the rows whose mask entry is `true`.
    pub fn retain_rows(&mut self, mask: &[bool]) -> Result<(), DatasetError> {
        if mask.len() != self.n_rows() {
            return Err(DatasetError::MaskLength {
                expected: self.n_rows(),
                actual: mask.len(),
            });
        }
        for values in self.columns.values_mut() {
            let mut keep = mask.iter();
            values.retain(|_| *keep.next().unwrap_or(&false));
        }
        Ok(())
    }

    /// Drop rows identical to an earlier row, keeping the first occurrence.
    pub fn drop_duplicate_rows(&mut self) -> usize {
        let mut seen = HashSet::new();
        let mask: Vec<bool> = (0..self.n_rows())
            .map(|index| {
                let key: Vec<String> = self
                    .columns
                    .values()
                    .map(|values| values[index].to_string())
                    .collect();
                seen.insert(key)
            })
            .collect();
        let removed = mask.iter().filter(|keep| !**keep).count();
        // Mask length always matches the row count here.
        let _ = self.retain_rows(&mask);
        removed
    }

    pub fn row(&self, index: usize) -> Option<Map<String, Value>> {
        if index >= self.n_rows() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|(name, values)| (name.clone(), values[index].clone()))
                .collect(),
        )
    }

    pub fn into_columns(self) -> ColumnMap {
        self.columns
    }
}

impl TryFrom<ColumnMap> for Dataset {
    type Error = DatasetError;

    fn try_from(columns: ColumnMap) -> Result<Self, Self::Error> {
        Dataset::from_columns(columns)
    }
}

impl From<Dataset> for ColumnMap {
    fn from(dataset: Dataset) -> Self {
        dataset.columns
    }
}
