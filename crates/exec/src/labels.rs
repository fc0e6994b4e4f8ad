use once_cell::sync::Lazy;
use regex::Regex;

use crate::env::Env;

/// Longest value the runner accepts for a job label.
pub const MAX_LABEL_LEN: usize = 63;

static LABEL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9_\-]+").expect("label pattern compiles"));

/// Label keys filled from the build environment, with the variable they read.
pub const ENV_LABELS: [(&str, &str); 6] = [
    ("build_id", "BUILD_ID"),
    ("organization", "ORGANIZATION"),
    ("repo", "REPOSITORY"),
    ("branch", "BRANCH_NAME"),
    ("commit_sha", "COMMIT_SHA"),
    ("klio-cli", "KLIO_CLI_VERSION"),
];

/// Versions of the tooling stamped onto every submitted job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolVersions {
    pub exec: String,
    pub core: String,
    pub lib: String,
}

impl Default for ToolVersions {
    fn default() -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();
        Self {
            exec: version.clone(),
            core: version.clone(),
            lib: version,
        }
    }
}

/// Joins the allowed runs of `value` with `-`, truncates and lowercases.
pub fn clean_label_value(value: &str) -> Option<String> {
    let joined = LABEL_CHARS
        .find_iter(value)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("-");
    if joined.is_empty() {
        return None;
    }
    Some(joined.chars().take(MAX_LABEL_LEN).collect::<String>().to_lowercase())
}

pub fn deployment_labels(versions: &ToolVersions, env: &dyn Env) -> Vec<String> {
    let mut labels = Vec::new();
    for (key, version) in [
        ("klio-exec", &versions.exec),
        ("klio-core", &versions.core),
        ("klio", &versions.lib),
    ] {
        if let Some(value) = clean_label_value(version) {
            labels.push(format!("{}={}", key, value));
        }
    }

    for (key, var) in ENV_LABELS {
        let value = env.var(var).and_then(|raw| clean_label_value(&raw));
        if let Some(value) = value {
            labels.push(format!("{}={}", key, value));
        }
    }

    let in_ci = env
        .var("CI")
        .map_or(false, |value| value.eq_ignore_ascii_case("true"));
    if in_ci {
        labels.push("deployed_by=CI".to_string());
    } else if let Some(user) = env.var("USER").filter(|user| !user.is_empty()) {
        labels.push(format!("deployed_by={}", user.to_lowercase()));
    }
    labels
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn clean_label_value_replaces_unsupported_chars() {
        assert_eq!(clean_label_value("0.1.0"), Some("0-1-0".to_string()));
        assert_eq!(
            clean_label_value("Feature/Spectrogram Job"),
            Some("feature-spectrogram-job".to_string())
        );
        assert_eq!(clean_label_value("..."), None);
        assert_eq!(clean_label_value(&"a".repeat(80)).unwrap().len(), MAX_LABEL_LEN);
    }

    #[test]
    fn labels_include_versions_and_build_env() {
        let versions = ToolVersions {
            exec: "21.2.0".into(),
            core: "21.2.0".into(),
            lib: "21.3.0rc1".into(),
        };
        let env = env(&[
            ("BRANCH_NAME", "main"),
            ("COMMIT_SHA", "ABC123"),
            ("USER", "Robin"),
        ]);
        let labels = deployment_labels(&versions, &env);
        assert_eq!(
            labels,
            vec![
                "klio-exec=21-2-0",
                "klio-core=21-2-0",
                "klio=21-3-0rc1",
                "branch=main",
                "commit_sha=abc123",
                "deployed_by=robin",
            ]
        );
    }

    #[test]
    fn ci_wins_over_user() {
        let env = env(&[("CI", "TRUE"), ("USER", "robin")]);
        let labels = deployment_labels(&ToolVersions::default(), &env);
        assert_eq!(labels.last().map(String::as_str), Some("deployed_by=CI"));
        assert!(!labels.iter().any(|label| label == "deployed_by=robin"));
    }
}
