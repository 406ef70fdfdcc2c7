//! Utility helpers: serializers and dataset file I/O.
pub mod serialization;

pub use serialization::{
    load_dataset, save_dataset, FileSerializer, FileUtils, JsonSerializer, Serializer,
    YamlSerializer,
};
