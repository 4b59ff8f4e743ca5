//! Pipeline components: enumeration, probing, classification, aggregation.
//!
//! Enumeration thread → member channel → probe workers → record channel → collector.

pub mod aggregate;
pub mod classify;
pub mod context;
pub mod enumerate;
pub mod error_handler;
pub mod orchestrator;
pub mod probe;
pub mod retry;
pub mod workers;

pub use aggregate::{Summary, aggregate, summarize};
pub use classify::{classify, whole_days};
pub use context::{
    ClassifyParams, EnumerationTarget, Indexed, PipelineChannels, PipelineHandles, ScanShared,
    create_pipeline_channels,
};
pub use enumerate::{
    EnumOutcome, EnumerationError, GraphEnumerator, run_enumerate_loop, spawn_enumerate_thread,
};
pub use error_handler::check_for_initial_error_or_truncation;
pub use orchestrator::{collect_records, run_pipeline, shutdown_pipeline_handles};
pub use probe::{ActivityProbe, ProbeError, ProbeOutcome, ProbeResult};
pub use retry::call_with_retry;
pub use workers::spawn_probe_workers;
