use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Kind of source or sink that carries the job's work items.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventIoType {
    File,
    Bq,
    Avro,
    Pubsub,
}

impl EventIoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventIoType::File => "file",
            EventIoType::Bq => "bq",
            EventIoType::Avro => "avro",
            EventIoType::Pubsub => "pubsub",
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, EventIoType::Pubsub)
    }
}

impl fmt::Display for EventIoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventInput {
    #[serde(rename = "type")]
    pub kind: EventIoType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Row columns that make up a work item when reading from BigQuery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub skip_klio_read: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl EventInput {
    pub fn new(kind: EventIoType) -> Self {
        Self {
            kind,
            location: None,
            file_pattern: None,
            topic: None,
            subscription: None,
            table: None,
            columns: None,
            skip_klio_read: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn file(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::new(EventIoType::File)
        }
    }

    pub fn validate(&self, index: usize, streaming: bool) -> Result<(), ConfigError> {
        let field = format!("job_config.events.inputs[{}]", index);
        check_mode(&field, self.kind, streaming)?;
        match self.kind {
            EventIoType::File | EventIoType::Avro => {
                if blank(&self.location) && blank(&self.file_pattern) {
                    return Err(ConfigError::validation(format!(
                        "{} ({}) requires `location` or `file_pattern`",
                        field, self.kind
                    )));
                }
            }
            EventIoType::Pubsub => {
                if blank(&self.topic) && blank(&self.subscription) {
                    return Err(ConfigError::validation(format!(
                        "{} (pubsub) requires `topic` or `subscription`",
                        field
                    )));
                }
            }
            EventIoType::Bq => {
                if blank(&self.table) {
                    return Err(ConfigError::validation(format!(
                        "{} (bq) requires `table`",
                        field
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventOutput {
    #[serde(rename = "type")]
    pub kind: EventIoType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default)]
    pub skip_klio_write: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl EventOutput {
    pub fn new(kind: EventIoType) -> Self {
        Self {
            kind,
            location: None,
            file_path_prefix: None,
            topic: None,
            table: None,
            skip_klio_write: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn validate(&self, index: usize, streaming: bool) -> Result<(), ConfigError> {
        let field = format!("job_config.events.outputs[{}]", index);
        check_mode(&field, self.kind, streaming)?;
        match self.kind {
            EventIoType::Avro => Err(ConfigError::validation(format!(
                "{}: avro event outputs are not supported",
                field
            ))),
            EventIoType::File if blank(&self.location) && blank(&self.file_path_prefix) => {
                Err(ConfigError::validation(format!(
                    "{} (file) requires `location` or `file_path_prefix`",
                    field
                )))
            }
            EventIoType::Pubsub if blank(&self.topic) => Err(ConfigError::validation(format!(
                "{} (pubsub) requires `topic`",
                field
            ))),
            EventIoType::Bq if blank(&self.table) => Err(ConfigError::validation(format!(
                "{} (bq) requires `table`",
                field
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EventsConfig {
    #[serde(default)]
    pub inputs: Vec<EventInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<EventOutput>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn check_mode(field: &str, kind: EventIoType, streaming: bool) -> Result<(), ConfigError> {
    if kind.is_streaming() != streaming {
        let mode = if streaming { "streaming" } else { "batch" };
        return Err(ConfigError::validation(format!(
            "{}: event type `{}` is not available in {} mode",
            field, kind, mode
        )));
    }
    Ok(())
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_input_parses_type_and_flags() {
        let input: EventInput =
            serde_yaml::from_str("type: file\nlocation: ./ids.txt\nskip_klio_read: true\n")
                .unwrap();
        assert_eq!(input.kind, EventIoType::File);
        assert_eq!(input.location.as_deref(), Some("./ids.txt"));
        assert!(input.skip_klio_read);
        assert!(input.extra.is_empty());
    }

    #[test]
    fn event_input_requires_a_source() {
        let input = EventInput::new(EventIoType::Avro);
        assert!(input.validate(0, false).is_err());
        let input = EventInput {
            file_pattern: Some("*.avro".into()),
            ..EventInput::new(EventIoType::Avro)
        };
        assert!(input.validate(0, false).is_ok());
    }

    #[test]
    fn event_types_follow_mode() {
        let file = EventInput::file("ids.txt");
        assert!(file.validate(0, false).is_ok());
        assert!(file.validate(0, true).is_err());

        let pubsub = EventInput {
            subscription: Some("projects/p/subscriptions/s".into()),
            ..EventInput::new(EventIoType::Pubsub)
        };
        assert!(pubsub.validate(0, true).is_ok());
        let err = pubsub.validate(1, false).unwrap_err().to_string();
        assert!(err.contains("inputs[1]"));
        assert!(err.contains("batch"));
    }

    #[test]
    fn avro_outputs_are_rejected() {
        let output = EventOutput {
            location: Some("gs://bucket/out".into()),
            ..EventOutput::new(EventIoType::Avro)
        };
        assert!(output.validate(0, false).is_err());
        let text = EventOutput {
            location: Some("./out.txt".into()),
            ..EventOutput::new(EventIoType::File)
        };
        assert!(text.validate(0, false).is_ok());
    }
}
