use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataIoType {
    Gcs,
}

impl DataIoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataIoType::Gcs => "gcs",
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            DataIoType::Gcs => "gs://",
        }
    }
}

impl fmt::Display for DataIoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a job reads the payload for each work item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataInput {
    #[serde(rename = "type")]
    pub kind: DataIoType,
    pub location: String,
    #[serde(default)]
    pub file_suffix: String,
    #[serde(default)]
    pub skip_klio_existence_check: bool,
    /// Treat every work item as a ping and pass it through untouched.
    #[serde(default)]
    pub ping: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl DataInput {
    pub fn gcs(location: impl Into<String>, file_suffix: impl Into<String>) -> Self {
        Self {
            kind: DataIoType::Gcs,
            location: location.into(),
            file_suffix: file_suffix.into(),
            skip_klio_existence_check: false,
            ping: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        check_target(
            &format!("job_config.data.inputs[{}]", index),
            self.kind,
            &self.location,
            &self.file_suffix,
        )
    }
}

/// Where a job writes the result for each work item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataOutput {
    #[serde(rename = "type")]
    pub kind: DataIoType,
    pub location: String,
    #[serde(default)]
    pub file_suffix: String,
    #[serde(default)]
    pub skip_klio_existence_check: bool,
    /// Reprocess work items even when their output already exists.
    #[serde(default)]
    pub force: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl DataOutput {
    pub fn gcs(location: impl Into<String>, file_suffix: impl Into<String>) -> Self {
        Self {
            kind: DataIoType::Gcs,
            location: location.into(),
            file_suffix: file_suffix.into(),
            skip_klio_existence_check: false,
            force: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        check_target(
            &format!("job_config.data.outputs[{}]", index),
            self.kind,
            &self.location,
            &self.file_suffix,
        )
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default)]
    pub inputs: Vec<DataInput>,
    #[serde(default)]
    pub outputs: Vec<DataOutput>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn check_target(
    field: &str,
    kind: DataIoType,
    location: &str,
    file_suffix: &str,
) -> Result<(), ConfigError> {
    if location.trim().is_empty() {
        return Err(ConfigError::validation(format!(
            "{}.location cannot be empty",
            field
        )));
    }
    if !location.starts_with(kind.scheme()) {
        return Err(ConfigError::validation(format!(
            "{}.location must start with {} for type `{}`",
            field,
            kind.scheme(),
            kind
        )));
    }
    if !file_suffix.is_empty() && !file_suffix.starts_with('.') {
        return Err(ConfigError::validation(format!(
            "{}.file_suffix must start with '.'",
            field
        )));
    }
    Ok(())
}
