//! Engine module: CLI parsing, command handling and progress rendering

pub mod arg_parser;
pub mod cli;
pub mod progress;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::{apply_cli_to_opts, handle_run, setup_opts};
pub use progress::{BarSink, ProgressEvent, ProgressRelay, ProgressSink};
