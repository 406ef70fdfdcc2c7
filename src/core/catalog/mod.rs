//! Grouped registry of native transformations offered to pipeline builders.

pub mod builtins;

use crate::core::descriptor::{CallableLookup, DescriptorRecord, RegisteredTransformation};
use crate::core::error::AppError;
use indexmap::IndexMap;
use std::sync::Arc;

type Groups = IndexMap<String, IndexMap<String, RegisteredTransformation>>;

#[derive(Default)]
pub struct CatalogBuilder {
    groups: Groups,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `transformation` under `group`. The group becomes the
    /// transformation's origin module.
    ///
    /// # Panics
    ///
    /// Panics if the group already holds a transformation with the same name.
    pub fn register<G: Into<String>>(
        &mut self,
        group: G,
        mut transformation: RegisteredTransformation,
    ) -> &mut Self {
        let group = group.into();
        let name = transformation.name().to_string();
        let entries = self.groups.entry(group.clone()).or_default();
        if entries.contains_key(&name) {
            panic!("Transformation '{}' is already registered in '{}'", name, group);
        }
        transformation.origin_module = Some(group);
        entries.insert(name, transformation);
        self
    }

    pub fn build(self) -> Catalog {
        Catalog {
            groups: Arc::new(self.groups),
        }
    }
}

/// Immutable, cheaply cloned catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: Arc<Groups>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Catalog holding the bundled transformations.
    pub fn builtin() -> Result<Self, AppError> {
        builtins::builtin_catalog()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(IndexMap::is_empty)
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(IndexMap::len).sum()
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn group(&self, group: &str) -> Vec<&RegisteredTransformation> {
        self.groups
            .get(group)
            .map(|entries| entries.values().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, group: &str, name: &str) -> Option<&RegisteredTransformation> {
        self.groups.get(group)?.get(name)
    }

    /// First transformation called `name`, searching groups in registration order.
    pub fn find(&self, name: &str) -> Option<&RegisteredTransformation> {
        self.groups.values().find_map(|entries| entries.get(name))
    }

    pub fn records(&self, group: &str) -> Vec<DescriptorRecord> {
        self.group(group)
            .into_iter()
            .map(RegisteredTransformation::to_record)
            .collect()
    }

    pub fn all_records(&self) -> IndexMap<String, Vec<DescriptorRecord>> {
        self.groups
            .keys()
            .map(|group| (group.clone(), self.records(group)))
            .collect()
    }
}

impl CallableLookup for Catalog {
    fn lookup(
        &self,
        origin_module: Option<&str>,
        function_name: &str,
    ) -> Option<&RegisteredTransformation> {
        match origin_module {
            Some(module) => self.get(module, function_name),
            None => self.find(function_name),
        }
    }
}
