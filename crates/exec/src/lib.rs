pub mod env;
pub mod error;
pub mod filters;
pub mod labels;
pub mod mapper;
pub mod options;
pub mod plan;

pub use crate::env::{Env, ProcessEnv};
pub use crate::error::ExecError;
pub use crate::filters::{
    DataFilterPlan, ExistenceCheck, FilterStage, LocalExistenceCheck, MessageFlags, Route,
    StaticExistenceCheck,
};
pub use crate::labels::{clean_label_value, deployment_labels, ToolVersions};
pub use crate::mapper::{EventTransform, IoKwargs};
pub use crate::options::{resolve, verify_packaging, ResolvedOptions, RuntimeConfig};
pub use crate::plan::{ExecutionPlan, PlannedInput, PlannedOutput};
