#[macro_use]
pub mod logger;

pub mod batch;
pub mod cli;
pub mod constants;
pub mod engine;
pub mod error;
pub mod formats;
pub mod processing;
pub mod utils;
pub mod validation;

pub use batch::{
    batch_thumbnail, collect_image_files, generate_output_path, plan_tasks, run_tasks,
    BatchSummary,
};
pub use engine::{CancelFlag, Engine, EngineCommand};
pub use error::{Result, ThumbnailError};
pub use formats::{is_image_file, resolve_extension, OutputFormat};
pub use processing::{
    plan_commands, plan_invocation, process_task, FileTask, InvocationPlan, SaveStep,
    ThumbnailOptions,
};
pub use validation::{resolve_source, SourceKind};
