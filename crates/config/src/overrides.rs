use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::ConfigError;

static TEMPLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("template pattern compiles"));

/// Substitute every `${name}` in the raw document text with its value from
/// `vars`, before the text is parsed.
///
/// Trailing `# comments` are copied through untouched, so a placeholder that
/// only appears in a comment needs no value.
pub fn apply_templates(raw: &str, vars: &BTreeMap<String, String>) -> Result<String, ConfigError> {
    let mut missing = None;
    let mut rendered = String::with_capacity(raw.len());
    for line in raw.split_inclusive('\n') {
        let (body, comment) = line.split_at(comment_start(line).unwrap_or(line.len()));
        let filled = TEMPLATE_RE.replace_all(body, |caps: &Captures<'_>| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    caps[0].to_string()
                }
            }
        });
        rendered.push_str(&filled);
        rendered.push_str(comment);
    }
    if let Some(name) = missing {
        return Err(ConfigError::Template(name));
    }
    Ok(rendered)
}

/// Byte offset of a `#` that opens a comment, skipping quoted scalars.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    for (index, ch) in line.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if ch == '\\' => escaped = true,
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None => match ch {
                '#' if prev.map_or(true, char::is_whitespace) => return Some(index),
                '\'' | '"' if prev.map_or(true, |p| p.is_whitespace() || "[{,".contains(p)) => {
                    quote = Some(ch)
                }
                _ => {}
            },
        }
        prev = Some(ch);
    }
    None
}

/// Parse a `name=value` template argument.
pub fn parse_template_var(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::Override(raw.to_string())),
    }
}

/// A single value replaced in the parsed document, addressed by a dotted
/// path such as `job_config.data.inputs.0.location`. Numeric segments index
/// into lists.
#[derive(Clone, Debug, PartialEq)]
pub struct Override {
    pub path: Vec<String>,
    pub value: Value,
}

impl Override {
    /// `dotted.path=value`; the value is read as a YAML scalar, so `2024`
    /// becomes a number and `true` a bool. Quote it (`job_name="2024"`) to
    /// keep it a string. Anything that does not parse is taken verbatim.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let (path, value) = raw
            .split_once('=')
            .ok_or_else(|| ConfigError::Override(raw.to_string()))?;
        let path: Vec<String> = path.trim().split('.').map(str::to_string).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(ConfigError::Override(raw.to_string()));
        }
        let value = if value.is_empty() {
            Value::String(String::new())
        } else {
            serde_yaml::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
        };
        Ok(Self { path, value })
    }

    pub fn apply(&self, document: &mut Value) -> Result<(), ConfigError> {
        let mut cursor = document;
        for segment in &self.path {
            cursor = step(cursor, segment).ok_or_else(|| {
                ConfigError::Override(format!(
                    "{}: `{}` is not a mapping or list index",
                    self.path.join("."),
                    segment
                ))
            })?;
        }
        debug!(path = %self.path.join("."), "applied config override");
        *cursor = self.value.clone();
        Ok(())
    }
}

pub fn apply_overrides(document: &mut Value, overrides: &[Override]) -> Result<(), ConfigError> {
    for item in overrides {
        item.apply(document)?;
    }
    Ok(())
}

fn step<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    if value.is_null() {
        *value = Value::Mapping(Mapping::new());
    }
    match value {
        Value::Mapping(map) => {
            let key = Value::String(segment.to_string());
            if !map.contains_key(&key) {
                map.insert(key.clone(), Value::Null);
            }
            map.get_mut(&key)
        }
        Value::Sequence(items) => {
            let index: usize = segment.parse().ok()?;
            items.get_mut(index)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_fill_placeholders() {
        let mut vars = BTreeMap::new();
        vars.insert("project".to_string(), "sigint".to_string());
        let out = apply_templates("project: ${project}\nimage: gcr.io/${project}/x", &vars).unwrap();
        assert_eq!(out, "project: sigint\nimage: gcr.io/sigint/x");
    }

    #[test]
    fn missing_template_var_is_an_error() {
        let err = apply_templates("job_name: ${name}", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Template(name) if name == "name"));
    }

    #[test]
    fn templates_skip_comments() {
        let mut vars = BTreeMap::new();
        vars.insert("tag".to_string(), "v2".to_string());
        let raw = "# image: gcr.io/x:${old_tag}\n\
                   image: gcr.io/x:${tag}  # was ${old_tag}\n\
                   note: \"#${tag}\"\n";
        let out = apply_templates(raw, &vars).unwrap();
        assert_eq!(
            out,
            "# image: gcr.io/x:${old_tag}\n\
             image: gcr.io/x:v2  # was ${old_tag}\n\
             note: \"#v2\"\n"
        );
    }

    #[test]
    fn quoted_override_values_stay_strings() {
        let bare = Override::parse("job_name=2024").unwrap();
        assert_eq!(bare.value, Value::from(2024));
        let quoted = Override::parse("job_name=\"2024\"").unwrap();
        assert_eq!(quoted.value, Value::from("2024"));
        let single = Override::parse("job_name='true'").unwrap();
        assert_eq!(single.value, Value::from("true"));
    }

    #[test]
    fn override_sets_nested_scalars() {
        let mut doc: Value =
            serde_yaml::from_str("pipeline_options:\n  streaming: false\n").unwrap();
        Override::parse("pipeline_options.streaming=true")
            .unwrap()
            .apply(&mut doc)
            .unwrap();
        Override::parse("pipeline_options.project=sigint")
            .unwrap()
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc["pipeline_options"]["streaming"], Value::Bool(true));
        assert_eq!(doc["pipeline_options"]["project"], Value::from("sigint"));
    }

    #[test]
    fn override_indexes_into_lists() {
        let mut doc: Value = serde_yaml::from_str(
            "data:\n  inputs:\n    - location: gs://a\n",
        )
        .unwrap();
        Override::parse("data.inputs.0.location=gs://b")
            .unwrap()
            .apply(&mut doc)
            .unwrap();
        assert_eq!(doc["data"]["inputs"][0]["location"], Value::from("gs://b"));
        assert!(Override::parse("data.inputs.3.location=x")
            .unwrap()
            .apply(&mut doc)
            .is_err());
    }

    #[test]
    fn malformed_overrides_are_rejected() {
        assert!(Override::parse("no-equals-sign").is_err());
        assert!(Override::parse("a..b=1").is_err());
        assert!(parse_template_var("=value").is_err());
        assert_eq!(
            parse_template_var("tag=v1").unwrap(),
            ("tag".to_string(), "v1".to_string())
        );
    }
}
