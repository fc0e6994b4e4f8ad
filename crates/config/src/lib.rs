pub mod data;
pub mod error;
pub mod events;
pub mod io;
pub mod job;
pub mod overrides;
pub mod pipeline;

pub use crate::data::{DataConfig, DataInput, DataIoType, DataOutput};
pub use crate::error::ConfigError;
pub use crate::events::{EventInput, EventIoType, EventOutput, EventsConfig};
pub use crate::io::{load, load_with, ConfigExporter, ConfigFormat, LoadOptions};
pub use crate::job::{JobConfig, KlioConfig, SUPPORTED_VERSION};
pub use crate::overrides::Override;
pub use crate::pipeline::{PipelineOptions, Runner, BEAM_FN_API};
