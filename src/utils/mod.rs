pub mod config;
pub mod credentials;
pub mod logger;
pub mod settings_file;
pub mod timestamp;

pub use config::*;
pub use credentials::get_access_token;
pub use logger::setup_logging;
pub use settings_file::{apply_file_to_opts, load_settings_file};
pub use timestamp::parse_timestamp;
