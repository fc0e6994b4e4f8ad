use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Experiment that switches the runner to the portable worker harness.
pub const BEAM_FN_API: &str = "beam_fn_api";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Runner {
    DirectRunner,
    DataflowRunner,
    DirectGKERunner,
}

impl Runner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runner::DirectRunner => "DirectRunner",
            Runner::DataflowRunner => "DataflowRunner",
            Runner::DirectGKERunner => "DirectGKERunner",
        }
    }

    /// Runs inside the submitting process rather than on managed workers.
    pub fn is_local(&self) -> bool {
        matches!(self, Runner::DirectRunner | Runner::DirectGKERunner)
    }
}

impl fmt::Display for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PipelineOptions {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_harness_container_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub experiments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub runner: Runner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_location: Option<String>,
    /// Any other runner option, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl PipelineOptions {
    pub fn new(runner: Runner) -> Self {
        Self {
            streaming: false,
            update: false,
            worker_harness_container_image: None,
            experiments: Vec::new(),
            project: None,
            runner,
            setup_file: None,
            requirements_file: None,
            region: None,
            temp_location: None,
            staging_location: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn has_experiment(&self, name: &str) -> bool {
        self.experiments.iter().any(|experiment| experiment == name)
    }

    pub fn fn_api_enabled(&self) -> bool {
        self.has_experiment(BEAM_FN_API)
    }

    pub fn has_packaging_files(&self) -> bool {
        self.setup_file.is_some() || self.requirements_file.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, experiment) in self.experiments.iter().enumerate() {
            if experiment.trim().is_empty() {
                return Err(ConfigError::validation(format!(
                    "pipeline_options.experiments[{}] is empty",
                    index
                )));
            }
            if self.experiments[..index].contains(experiment) {
                return Err(ConfigError::validation(format!(
                    "pipeline_options.experiments lists {:?} more than once",
                    experiment
                )));
            }
        }
        if let Some(image) = &self.worker_harness_container_image {
            if image.trim().is_empty() {
                return Err(ConfigError::validation(
                    "pipeline_options.worker_harness_container_image cannot be empty",
                ));
            }
        }
        if let Some(project) = &self.project {
            if project.trim().is_empty() {
                return Err(ConfigError::validation(
                    "pipeline_options.project cannot be empty",
                ));
            }
        }
        Ok(())
    }
}
