use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::overrides::{apply_overrides, apply_templates, Override};
use crate::{ConfigError, KlioConfig};

/// File name the runner looks for when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "klio-job.yaml";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// `.json` is JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

pub trait ConfigExporter {
    fn export(&self, config: &KlioConfig, format: ConfigFormat) -> Result<Vec<u8>, ConfigError>;
}

pub struct YamlExporter;

impl ConfigExporter for YamlExporter {
    fn export(&self, config: &KlioConfig, format: ConfigFormat) -> Result<Vec<u8>, ConfigError> {
        match format {
            ConfigFormat::Yaml => Ok(to_yaml_string(config)?.into_bytes()),
            other => Err(ConfigError::validation(format!(
                "YamlExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

pub struct JsonExporter;

impl ConfigExporter for JsonExporter {
    fn export(&self, config: &KlioConfig, format: ConfigFormat) -> Result<Vec<u8>, ConfigError> {
        match format {
            ConfigFormat::Json => Ok(serde_json::to_vec_pretty(config)?),
            other => Err(ConfigError::validation(format!(
                "JsonExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

/// Adjustments applied between reading a document and parsing it.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub templates: BTreeMap<String, String>,
    pub overrides: Vec<Override>,
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<KlioConfig, ConfigError> {
    load_with(path, &LoadOptions::default())
}

pub fn load_with<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<KlioConfig, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_str(&raw, ConfigFormat::from_path(path), options)?;
    info!(path = %path.display(), job_name = %config.job_name, "loaded job config");
    Ok(config)
}

pub fn parse_str(
    raw: &str,
    format: ConfigFormat,
    options: &LoadOptions,
) -> Result<KlioConfig, ConfigError> {
    let rendered = apply_templates(raw, &options.templates)?;
    let mut document: serde_yaml::Value = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&rendered)?,
        ConfigFormat::Json => serde_json::from_str(&rendered)?,
    };
    apply_overrides(&mut document, &options.overrides)?;
    let config: KlioConfig = serde_yaml::from_value(document)?;
    config.validate()?;
    Ok(config)
}

pub fn from_yaml_str(raw: &str) -> Result<KlioConfig, ConfigError> {
    parse_str(raw, ConfigFormat::Yaml, &LoadOptions::default())
}

pub fn from_json_str(raw: &str) -> Result<KlioConfig, ConfigError> {
    parse_str(raw, ConfigFormat::Json, &LoadOptions::default())
}

pub fn to_yaml_string(config: &KlioConfig) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(config)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{DataIoType, EventIoType, Runner};

    const JOB_YAML: &str = include_str!("../../../klio-job.yaml");

    #[test]
    fn parses_shipped_document() {
        let config = from_yaml_str(JOB_YAML).unwrap();
        assert_eq!(config.job_name, "klio-audio");
        assert_eq!(config.version, 2);
        assert_eq!(config.pipeline_options.runner, Runner::DirectRunner);
        assert!(!config.pipeline_options.streaming);
        assert!(!config.job_config.allow_non_klio_messages);

        let events = config.job_config.event_inputs();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventIoType::File);
        assert!(!events[0].skip_klio_read);

        let inputs = config.job_config.data_inputs();
        let outputs = config.job_config.data_outputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(outputs.len(), 1);
        assert_eq!(inputs[0].kind, DataIoType::Gcs);
        assert_eq!(inputs[0].file_suffix, ".ogg");
        assert_eq!(outputs[0].file_suffix, ".png");
    }

    #[test]
    fn yaml_round_trip_preserves_document() {
        let config = from_yaml_str(JOB_YAML).unwrap();
        let reparsed = from_yaml_str(&to_yaml_string(&config).unwrap()).unwrap();
        assert_eq!(config, reparsed);

        let original: serde_yaml::Value = serde_yaml::from_str(JOB_YAML).unwrap();
        let emitted = serde_yaml::to_value(&config).unwrap();
        assert_eq!(original, emitted);
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let raw = JOB_YAML.replace(
            "job_config:\n",
            "job_config:\n  spectrogram:\n    n_fft: 2048\n    hop_length: 512\n",
        );
        let config = from_yaml_str(&raw).unwrap();
        let custom = config.job_config.extra.get("spectrogram").unwrap();
        assert_eq!(custom["n_fft"], serde_yaml::Value::from(2048));

        let emitted = to_yaml_string(&config).unwrap();
        assert!(emitted.contains("hop_length: 512"));
        assert_eq!(from_yaml_str(&emitted).unwrap(), config);
    }

    #[test]
    fn unknown_keys_at_every_level_survive_round_trip() {
        let raw = format!(
            "{}owner: sigint-team\n",
            JOB_YAML
                .replace("  events:\n", "  events:\n    batch_size: 10\n")
                .replace("  data:\n", "  data:\n    region: europe-west1\n")
        );
        let config = from_yaml_str(&raw).unwrap();
        assert_eq!(
            config.extra.get("owner"),
            Some(&serde_yaml::Value::from("sigint-team"))
        );
        assert_eq!(
            config.job_config.events.extra.get("batch_size"),
            Some(&serde_yaml::Value::from(10))
        );
        assert_eq!(
            config.job_config.data.extra.get("region"),
            Some(&serde_yaml::Value::from("europe-west1"))
        );

        let emitted = to_yaml_string(&config).unwrap();
        let original: serde_yaml::Value = serde_yaml::from_str(&raw).unwrap();
        let reparsed: serde_yaml::Value = serde_yaml::from_str(&emitted).unwrap();
        assert_eq!(original, reparsed);
        assert_eq!(from_yaml_str(&emitted).unwrap(), config);
    }

    #[test]
    fn json_export_reloads() {
        let config = from_yaml_str(JOB_YAML).unwrap();
        let bytes = JsonExporter.export(&config, ConfigFormat::Json).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"job_name\": \"klio-audio\""));
        assert_eq!(from_json_str(&text).unwrap(), config);
        assert!(JsonExporter.export(&config, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn missing_runner_is_rejected() {
        let raw = JOB_YAML.replace("  runner: DirectRunner\n", "");
        let err = from_yaml_str(&raw).unwrap_err().to_string();
        assert!(err.contains("runner"));
    }

    #[test]
    fn missing_job_name_is_rejected() {
        let raw = JOB_YAML.replace("job_name: klio-audio\n", "");
        assert!(from_yaml_str(&raw).is_err());
    }

    #[test]
    fn overrides_apply_before_validation() {
        let options = LoadOptions {
            overrides: vec![
                Override::parse("pipeline_options.runner=DataflowRunner").unwrap(),
                Override::parse("job_config.data.outputs.0.force=true").unwrap(),
            ],
            ..LoadOptions::default()
        };
        let config = parse_str(JOB_YAML, ConfigFormat::Yaml, &options).unwrap();
        assert_eq!(config.pipeline_options.runner, Runner::DataflowRunner);
        assert!(config.job_config.data.outputs[0].force);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load("does-not-exist/klio-job.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("job.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("klio-job.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("job")), ConfigFormat::Yaml);
    }
}
