use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use klio_config::{DataInput, DataOutput, KlioConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ExecError;

/// Steps placed between reading an event and handing it to the job.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum FilterStage {
    PingFilter,
    OutputExists,
    ForceFilter,
    InputExists,
    DropNotFound,
}

impl FilterStage {
    pub fn label(&self) -> &'static str {
        match self {
            FilterStage::PingFilter => "Ping Filter",
            FilterStage::OutputExists => "Output Exists Filter",
            FilterStage::ForceFilter => "Output Force Filter",
            FilterStage::InputExists => "Input Exists Filter",
            FilterStage::DropNotFound => "Drop Not Found Data",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Input => "Input",
            Direction::Output => "Output",
        })
    }
}

/// Per-message flags that travel with an event.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageFlags {
    pub ping: bool,
    pub force: bool,
}

/// What happens to an event after the data filters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Route {
    /// Handed to the job for processing.
    Process,
    /// Forwarded to the event output without processing.
    PassThru,
    /// Input data is missing; the event is discarded.
    Drop,
}

pub trait ExistenceCheck {
    fn exists(&self, path: &str) -> Result<bool, ExecError>;
}

/// Resolves `scheme://bucket/key` against a local mirror of the buckets.
pub struct LocalExistenceCheck {
    root: PathBuf,
}

impl LocalExistenceCheck {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn local_path(&self, path: &str) -> PathBuf {
        let relative = path.split_once("://").map_or(path, |(_, rest)| rest);
        self.root.join(relative.trim_start_matches('/'))
    }
}

impl ExistenceCheck for LocalExistenceCheck {
    fn exists(&self, path: &str) -> Result<bool, ExecError> {
        let local = self.local_path(path);
        match local.try_exists() {
            Ok(found) => Ok(found),
            Err(source) => Err(ExecError::ExistenceCheck {
                path: path.to_string(),
                source,
            }),
        }
    }
}

/// Fixed set of paths, for dry runs.
#[derive(Clone, Debug, Default)]
pub struct StaticExistenceCheck {
    paths: BTreeSet<String>,
}

impl StaticExistenceCheck {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl ExistenceCheck for StaticExistenceCheck {
    fn exists(&self, path: &str) -> Result<bool, ExecError> {
        Ok(self.paths.contains(path))
    }
}

/// `location/element` followed by the configured suffix.
pub fn data_path(location: &str, element: &str, suffix: &str) -> String {
    format!("{}/{}{}", location.trim_end_matches('/'), element, suffix)
}

#[derive(Clone, Debug, PartialEq)]
pub struct DataFilterPlan {
    input: DataInput,
    output: DataOutput,
    stages: Vec<FilterStage>,
}

impl DataFilterPlan {
    pub fn from_config(config: &KlioConfig) -> Result<Self, ExecError> {
        let job = &config.job_config;
        if job.data_inputs().len() > 1 || job.data_outputs().len() > 1 {
            return Err(ExecError::unsupported(
                "multiple data inputs and outputs are not supported",
            ));
        }
        let (input, output) = match (job.data_inputs().first(), job.data_outputs().first()) {
            (Some(input), Some(output)) => (input.clone(), output.clone()),
            _ => {
                return Err(ExecError::MissingConfiguration(
                    "a data input and a data output are required".to_string(),
                ))
            }
        };

        let mut stages = vec![FilterStage::PingFilter];
        if !output.skip_klio_existence_check {
            stages.push(FilterStage::OutputExists);
            stages.push(FilterStage::ForceFilter);
        }
        if !input.skip_klio_existence_check {
            stages.push(FilterStage::InputExists);
            stages.push(FilterStage::DropNotFound);
        }
        debug!(?stages, "planned data filters");
        Ok(Self {
            input,
            output,
            stages,
        })
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Step labels, prefixed with `[name] ` when a job reads several event inputs.
    pub fn labels(&self, prefix: Option<&str>) -> Vec<String> {
        self.stages
            .iter()
            .map(|stage| match prefix {
                Some(prefix) => format!("[{}] {}", prefix, stage.label()),
                None => stage.label().to_string(),
            })
            .collect()
    }

    pub fn checks_output(&self) -> bool {
        self.stages.contains(&FilterStage::OutputExists)
    }

    pub fn checks_input(&self) -> bool {
        self.stages.contains(&FilterStage::InputExists)
    }

    pub fn input_path(&self, element: &str) -> String {
        data_path(&self.input.location, element, &self.input.file_suffix)
    }

    pub fn output_path(&self, element: &str) -> String {
        data_path(&self.output.location, element, &self.output.file_suffix)
    }

    pub fn route(
        &self,
        element: &str,
        flags: MessageFlags,
        checker: &dyn ExistenceCheck,
    ) -> Result<Route, ExecError> {
        if flags.ping || self.input.ping {
            debug!(element, "ping, passing through");
            return Ok(Route::PassThru);
        }

        if self.checks_output() {
            let path = self.output_path(element);
            let found = checker.exists(&path)?;
            log_state(Direction::Output, found, &path);
            if found && !(flags.force || self.output.force) {
                return Ok(Route::PassThru);
            }
        }

        if self.checks_input() {
            let path = self.input_path(element);
            let found = checker.exists(&path)?;
            log_state(Direction::Input, found, &path);
            if !found {
                return Ok(Route::Drop);
            }
        }

        Ok(Route::Process)
    }
}

fn log_state(direction: Direction, found: bool, path: &str) {
    let state = if found { "found" } else { "not found" };
    info!("{} {} at {}", direction, state, path);
}
