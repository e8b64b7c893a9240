pub mod config;
pub mod error;
pub mod mode;
pub mod paths;
pub mod scan;
pub mod transcode;
pub mod report;
pub mod run;

pub use config::ConvertConfig;
pub use error::ConvertError;
pub use mode::ExecutionMode;
pub use report::RunReport;
pub use run::{run, RunOptions};
pub use transcode::{TranscodeEvent, TranscodeOutcome, Transcoder};
