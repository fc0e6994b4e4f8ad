use std::fmt;

use klio_config::{EventInput, EventIoType, EventOutput, KlioConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ExecError;

/// Runner transform that reads or writes event work items.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventTransform {
    ReadFromText,
    ReadFromBigQuery,
    ReadFromAvro,
    ReadFromPubSub,
    WriteToText,
    WriteToBigQuery,
    WriteToPubSub,
}

impl fmt::Display for EventTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub fn input_transform(streaming: bool, kind: EventIoType) -> Result<EventTransform, ExecError> {
    match (streaming, kind) {
        (true, EventIoType::Pubsub) => Ok(EventTransform::ReadFromPubSub),
        (false, EventIoType::File) => Ok(EventTransform::ReadFromText),
        (false, EventIoType::Bq) => Ok(EventTransform::ReadFromBigQuery),
        (false, EventIoType::Avro) => Ok(EventTransform::ReadFromAvro),
        (streaming, kind) => Err(unsupported("input", streaming, kind)),
    }
}

pub fn output_transform(streaming: bool, kind: EventIoType) -> Result<EventTransform, ExecError> {
    match (streaming, kind) {
        (true, EventIoType::Pubsub) => Ok(EventTransform::WriteToPubSub),
        (false, EventIoType::File) => Ok(EventTransform::WriteToText),
        (false, EventIoType::Bq) => Ok(EventTransform::WriteToBigQuery),
        (streaming, kind) => Err(unsupported("output", streaming, kind)),
    }
}

fn unsupported(direction: &str, streaming: bool, kind: EventIoType) -> ExecError {
    let mode = if streaming { "streaming" } else { "batch" };
    ExecError::unsupported(format!(
        "no {} event transform for `{}` in {} mode",
        direction, kind, mode
    ))
}

/// `{type}{index}` for every event input, used to keep step labels unique.
pub fn input_names(config: &KlioConfig) -> Vec<String> {
    config
        .job_config
        .event_inputs()
        .iter()
        .enumerate()
        .map(|(index, input)| format!("{}{}", input.kind, index))
        .collect()
}

/// Avro inputs may give a pattern, a location, or a pattern relative to a location.
pub fn avro_file_pattern(
    file_pattern: Option<&str>,
    location: Option<&str>,
) -> Result<String, ExecError> {
    let file_pattern = file_pattern.filter(|p| !p.is_empty());
    let location = location.filter(|l| !l.is_empty());
    match (file_pattern, location) {
        (Some(pattern), Some(location)) => Ok(format!(
            "{}/{}",
            location.trim_end_matches('/'),
            pattern
        )),
        (Some(pattern), None) => Ok(pattern.to_string()),
        (None, Some(location)) => Ok(location.to_string()),
        (None, None) => Err(ExecError::MissingConfiguration(
            "must configure at least one of the following keys when reading from avro: \
             `file_pattern`, `location`"
                .to_string(),
        )),
    }
}

/// Keyword arguments handed to the event transform.
pub trait IoKwargs {
    fn to_io_kwargs(&self) -> Result<Map<String, Value>, ExecError>;
}

impl IoKwargs for EventInput {
    fn to_io_kwargs(&self) -> Result<Map<String, Value>, ExecError> {
        let mut kwargs = Map::new();
        if self.kind == EventIoType::Avro {
            let pattern =
                avro_file_pattern(self.file_pattern.as_deref(), self.location.as_deref())?;
            kwargs.insert("file_pattern".into(), Value::from(pattern));
        } else {
            put(&mut kwargs, "location", &self.location);
            put(&mut kwargs, "file_pattern", &self.file_pattern);
        }
        put(&mut kwargs, "topic", &self.topic);
        put(&mut kwargs, "subscription", &self.subscription);
        put(&mut kwargs, "table", &self.table);
        if let Some(columns) = &self.columns {
            kwargs.insert("klio_message_columns".into(), serde_json::to_value(columns)?);
        }
        for (key, value) in &self.extra {
            kwargs.insert(key.clone(), serde_json::to_value(value)?);
        }
        Ok(kwargs)
    }
}

impl IoKwargs for EventOutput {
    fn to_io_kwargs(&self) -> Result<Map<String, Value>, ExecError> {
        let mut kwargs = Map::new();
        put(&mut kwargs, "location", &self.location);
        put(&mut kwargs, "file_path_prefix", &self.file_path_prefix);
        put(&mut kwargs, "topic", &self.topic);
        put(&mut kwargs, "table", &self.table);
        for (key, value) in &self.extra {
            kwargs.insert(key.clone(), serde_json::to_value(value)?);
        }
        Ok(kwargs)
    }
}

fn put(kwargs: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        kwargs.insert(key.to_string(), Value::from(value.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_and_streaming_mappings() {
        assert_eq!(
            input_transform(false, EventIoType::File).unwrap(),
            EventTransform::ReadFromText
        );
        assert_eq!(
            input_transform(true, EventIoType::Pubsub).unwrap(),
            EventTransform::ReadFromPubSub
        );
        assert!(input_transform(true, EventIoType::File).is_err());
        assert!(input_transform(false, EventIoType::Pubsub).is_err());
        assert!(output_transform(false, EventIoType::Avro).is_err());
        assert_eq!(
            output_transform(false, EventIoType::Bq).unwrap(),
            EventTransform::WriteToBigQuery
        );
    }

    #[test]
    fn avro_pattern_resolution() {
        assert_eq!(
            avro_file_pattern(Some("*.avro"), Some("gs://bucket/events/")).unwrap(),
            "gs://bucket/events/*.avro"
        );
        assert_eq!(avro_file_pattern(Some("*.avro"), None).unwrap(), "*.avro");
        assert_eq!(
            avro_file_pattern(None, Some("gs://bucket/events")).unwrap(),
            "gs://bucket/events"
        );
        assert!(matches!(
            avro_file_pattern(None, Some("")),
            Err(ExecError::MissingConfiguration(_))
        ));
    }

    #[test]
    fn file_input_kwargs_skip_unset_fields() {
        let input = EventInput::file("./batch_track_ids.txt");
        let kwargs = input.to_io_kwargs().unwrap();
        assert_eq!(kwargs.len(), 1);
        assert_eq!(kwargs["location"], Value::from("./batch_track_ids.txt"));
    }

    #[test]
    fn bq_input_kwargs_carry_columns_and_extras() {
        let mut input = EventInput {
            table: Some("project:dataset.tracks".into()),
            columns: Some(vec!["track_id".into()]),
            ..EventInput::new(EventIoType::Bq)
        };
        input
            .extra
            .insert("use_legacy_sql".into(), serde_yaml::Value::Bool(false));
        let kwargs = input.to_io_kwargs().unwrap();
        assert_eq!(kwargs["klio_message_columns"], serde_json::json!(["track_id"]));
        assert_eq!(kwargs["use_legacy_sql"], Value::Bool(false));
        assert!(!kwargs.contains_key("skip_klio_read"));
    }
}
