use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{DataConfig, DataInput, DataOutput};
use crate::events::{EventInput, EventOutput, EventsConfig};
use crate::pipeline::PipelineOptions;
use crate::ConfigError;

/// Document schema version this crate understands.
pub const SUPPORTED_VERSION: u32 = 2;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KlioConfig {
    pub version: u32,
    pub job_name: String,
    pub pipeline_options: PipelineOptions,
    pub job_config: JobConfig,
    /// Top-level keys other than the ones above, kept for the round trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    #[serde(default)]
    pub allow_non_klio_messages: bool,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_yaml::Mapping>,
    /// User-defined job settings, handed to the job code as-is.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl JobConfig {
    pub fn event_inputs(&self) -> &[EventInput] {
        &self.events.inputs
    }

    pub fn event_outputs(&self) -> &[EventOutput] {
        &self.events.outputs
    }

    pub fn data_inputs(&self) -> &[DataInput] {
        &self.data.inputs
    }

    pub fn data_outputs(&self) -> &[DataOutput] {
        &self.data.outputs
    }
}

impl KlioConfig {
    pub fn new(
        job_name: impl Into<String>,
        pipeline_options: PipelineOptions,
        job_config: JobConfig,
    ) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            job_name: job_name.into(),
            pipeline_options,
            job_config,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.pipeline_options.streaming
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_VERSION {
            return Err(ConfigError::validation(format!(
                "unsupported version {}, expected {}",
                self.version, SUPPORTED_VERSION
            )));
        }
        if self.job_name.trim().is_empty() {
            return Err(ConfigError::validation("job_name cannot be empty"));
        }
        self.pipeline_options.validate()?;

        let streaming = self.is_streaming();
        let job = &self.job_config;
        if job.events.inputs.is_empty() {
            return Err(ConfigError::validation(
                "job_config.events.inputs requires at least one event input",
            ));
        }
        for (index, input) in job.events.inputs.iter().enumerate() {
            input.validate(index, streaming)?;
        }
        for (index, output) in job.events.outputs.iter().enumerate() {
            output.validate(index, streaming)?;
        }

        if job.data.inputs.is_empty() {
            return Err(ConfigError::validation(
                "job_config.data.inputs requires at least one data input",
            ));
        }
        if job.data.outputs.is_empty() {
            return Err(ConfigError::validation(
                "job_config.data.outputs requires at least one data output",
            ));
        }
        for (index, input) in job.data.inputs.iter().enumerate() {
            input.validate(index)?;
        }
        for (index, output) in job.data.outputs.iter().enumerate() {
            output.validate(index)?;
        }

        debug!(
            job_name = %self.job_name,
            event_inputs = job.events.inputs.len(),
            data_inputs = job.data.inputs.len(),
            data_outputs = job.data.outputs.len(),
            "job config validated"
        );
        Ok(())
    }
}
