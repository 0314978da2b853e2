// SCHEDCMP ERROR TAXONOMY
// ONLY FATAL CONDITIONS LIVE HERE. MISSING OPTIONAL FIELDS AND CLEANUP
// FAILURES NEVER BECOME ERRORS -- THEY DEGRADE TO SENTINELS OR LOG LINES.

use std::path::PathBuf;

use crate::build::Variant;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("build stage: failed to launch `{command}`: {source}")]
    BuildSpawn {
        command: String,
        source: std::io::Error,
    },

    #[error("build stage: `make {target}` failed for scenario {scenario} ({variant}) with {status}{detail}")]
    BuildFailed {
        target: String,
        scenario: u32,
        variant: Variant,
        status: String,
        detail: String,
    },

    #[error("run stage: failed to launch `{command}`: {source}")]
    RunSpawn {
        command: String,
        source: std::io::Error,
    },

    #[error("run stage: reading output of `{command}` failed: {source}")]
    StreamRead {
        command: String,
        source: std::io::Error,
    },

    #[error("run stage: failed to parse '{field}' before '{marker}' in output of `{command}`")]
    MissingAverage {
        field: &'static str,
        marker: String,
        command: String,
    },

    #[error("interrupted by user")]
    Interrupted,

    #[error("output stage: failed to write {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BenchError>;
