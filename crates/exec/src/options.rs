use std::path::{Path, PathBuf};

use klio_config::{KlioConfig, Runner};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::env::Env;
use crate::labels::{deployment_labels, ToolVersions};
use crate::ExecError;

/// Settings given at submission time rather than in the job document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Replaces the tag of the worker image when the portable harness is on.
    pub image_tag: Option<String>,
    pub direct_runner: bool,
    /// Overrides `pipeline_options.update` when set.
    pub update: Option<bool>,
    pub blocking: bool,
    /// Directory that relative setup and requirements files are resolved against.
    pub job_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            image_tag: None,
            direct_runner: false,
            update: None,
            blocking: false,
            job_dir: PathBuf::from("."),
        }
    }
}

impl RuntimeConfig {
    /// The submitting process has to wait for the pipeline to finish.
    pub fn waits_for_completion(&self) -> bool {
        self.direct_runner || self.blocking
    }
}

/// Runner options ready to hand to the pipeline runner, keyed by option name.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ResolvedOptions {
    values: Map<String, Value>,
}

impl ResolvedOptions {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.values
            .get("labels")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Command-line form understood by the runner: lists repeat the flag,
    /// `true` becomes a bare flag and `false` is left out.
    pub fn to_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        for (key, value) in &self.values {
            match value {
                Value::Null | Value::Bool(false) => {}
                Value::Bool(true) => flags.push(format!("--{}", key)),
                Value::Array(items) => {
                    for item in items {
                        flags.push(format!("--{}={}", key, scalar(item)));
                    }
                }
                other => flags.push(format!("--{}={}", key, scalar(other))),
            }
        }
        flags
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The portable worker harness cannot be combined with source packaging.
pub fn verify_packaging(config: &KlioConfig) -> Result<(), ExecError> {
    let options = &config.pipeline_options;
    if options.fn_api_enabled() && options.has_packaging_files() {
        return Err(ExecError::Packaging(
            "the 'beam_fn_api' experiment may not be enabled while providing \
             a setup.py file and/or a requirements.txt file"
                .to_string(),
        ));
    }
    Ok(())
}

/// `name:tag` with the image's existing tag replaced; registry ports are kept.
pub fn image_with_tag(image: &str, tag: Option<&str>) -> String {
    let Some(tag) = tag.filter(|tag| !tag.is_empty()) else {
        return image.to_string();
    };
    let name = match image.rfind(':') {
        Some(index) if !image[index..].contains('/') => &image[..index],
        _ => image,
    };
    format!("{}:{}", name, tag)
}

#[instrument(skip_all, fields(job_name = %config.job_name))]
pub fn resolve(
    config: &KlioConfig,
    runtime: &RuntimeConfig,
    versions: &ToolVersions,
    env: &dyn Env,
) -> Result<ResolvedOptions, ExecError> {
    let pipeline = &config.pipeline_options;
    let mut values = match serde_json::to_value(pipeline)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    values.retain(|_, value| !value.is_null());

    if pipeline.has_packaging_files() && values.remove("worker_harness_container_image").is_some()
    {
        debug!("dropping worker image, job is packaged from source");
    }

    values.insert("job_name".to_string(), Value::from(config.job_name.clone()));

    if let Some(update) = runtime.update {
        values.insert("update".to_string(), Value::Bool(update));
    }

    let mut labels: Vec<Value> = match values.remove("labels") {
        Some(Value::Array(existing)) => existing,
        Some(other) => {
            warn!(labels = %other, "ignoring non-list labels option");
            Vec::new()
        }
        None => Vec::new(),
    };
    labels.extend(deployment_labels(versions, env).into_iter().map(Value::from));
    values.insert("labels".to_string(), Value::Array(labels));

    if pipeline.fn_api_enabled() {
        if let Some(image) = values
            .get("worker_harness_container_image")
            .and_then(Value::as_str)
        {
            let tagged = image_with_tag(image, runtime.image_tag.as_deref());
            values.insert(
                "worker_harness_container_image".to_string(),
                Value::from(tagged),
            );
        }
    }

    if runtime.direct_runner {
        values.insert(
            "runner".to_string(),
            Value::from(Runner::DirectRunner.as_str()),
        );
    }

    for key in ["setup_file", "requirements_file"] {
        if let Some(path) = values.get(key).and_then(Value::as_str) {
            let absolute = absolutize(&runtime.job_dir, Path::new(path));
            values.insert(key.to_string(), Value::from(absolute.display().to_string()));
        }
    }

    let runner = values
        .get("runner")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    info!(
        runner,
        options = values.len(),
        "resolved pipeline options"
    );
    Ok(ResolvedOptions { values })
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
