pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands};
pub use handlers::{config_from_args, dispatch, run, CliContext};
pub use output::{format_summary, OutputFormat, OutputFormatter};
