use klio_config::KlioConfig;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::env::Env;
use crate::filters::DataFilterPlan;
use crate::labels::ToolVersions;
use crate::mapper::{input_names, input_transform, output_transform, EventTransform, IoKwargs};
use crate::options::{resolve, verify_packaging, ResolvedOptions, RuntimeConfig};
use crate::ExecError;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PlannedInput {
    pub name: String,
    /// Read step for the input, `None` when the job reads events itself.
    pub transform: Option<EventTransform>,
    pub kwargs: Map<String, Value>,
    #[serde(skip)]
    pub filters: Option<DataFilterPlan>,
    pub steps: Vec<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PlannedOutput {
    pub transform: EventTransform,
    pub kwargs: Map<String, Value>,
}

/// Everything the runner needs to assemble the job's pipeline.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExecutionPlan {
    pub job_name: String,
    pub options: ResolvedOptions,
    pub inputs: Vec<PlannedInput>,
    pub output: Option<PlannedOutput>,
    pub wait_until_finish: bool,
}

impl ExecutionPlan {
    #[instrument(skip_all, fields(job_name = %config.job_name))]
    pub fn build(
        config: &KlioConfig,
        runtime: &RuntimeConfig,
        versions: &ToolVersions,
        env: &dyn Env,
    ) -> Result<Self, ExecError> {
        config.validate()?;
        verify_packaging(config)?;
        let options = resolve(config, runtime, versions, env)?;
        let streaming = config.is_streaming();

        let event_inputs = config.job_config.event_inputs();
        let multi = event_inputs.len() > 1;
        let mut inputs = Vec::with_capacity(event_inputs.len());
        for (input, name) in event_inputs.iter().zip(input_names(config)) {
            if input.skip_klio_read {
                inputs.push(PlannedInput {
                    name,
                    transform: None,
                    kwargs: Map::new(),
                    filters: None,
                    steps: Vec::new(),
                });
                continue;
            }
            let transform = input_transform(streaming, input.kind)?;
            let filters = DataFilterPlan::from_config(config)?;
            let prefix = multi.then_some(name.as_str());
            let mut steps = vec![match prefix {
                Some(prefix) => format!("[{}] Read Event Input", prefix),
                None => "Read Event Input".to_string(),
            }];
            steps.extend(filters.labels(prefix));
            inputs.push(PlannedInput {
                kwargs: input.to_io_kwargs()?,
                name,
                transform: Some(transform),
                filters: Some(filters),
                steps,
            });
        }

        // only the first event output is written
        let output = match config.job_config.event_outputs().first() {
            Some(output) if !output.skip_klio_write => Some(PlannedOutput {
                transform: output_transform(streaming, output.kind)?,
                kwargs: output.to_io_kwargs()?,
            }),
            _ => None,
        };

        info!(
            inputs = inputs.len(),
            has_output = output.is_some(),
            "built execution plan"
        );
        Ok(Self {
            job_name: config.job_name.clone(),
            options,
            inputs,
            output,
            wait_until_finish: runtime.waits_for_completion(),
        })
    }
}
