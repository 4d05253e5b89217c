//! Error taxonomy for the compiler pipeline.
//!
//! Every failure mode is a deterministic input or configuration violation and
//! is raised synchronously to the immediate caller; nothing here is retried.
//! Each variant carries the triggering parameter and its value so callers can
//! surface an actionable message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeqError {
    /// A pulse placement falls outside the timeline bounds.
    #[error("pulse start {start} is outside timeline bounds [0, {length})")]
    Range { start: usize, length: usize },

    /// A marker interval's declared length does not match the timeline length.
    #[error("marker '{marker}' has length {marker_len} but timeline has length {timeline_len}")]
    LengthMismatch {
        marker: String,
        marker_len: usize,
        timeline_len: usize,
    },

    /// An external data source could not be read or is malformed.
    #[error("external data source '{source_name}': {reason}")]
    Resource { source_name: String, reason: String },

    /// Invalid parameter value (zero-length pulse, unknown sample-rate key,
    /// single waveform exceeding the per-file memory cap).
    #[error("{0}")]
    Value(String),

    /// An aggregate hardware ceiling was exceeded. `resource` names the
    /// ceiling ("waveform memory" or "program entries").
    #[error("hardware constraint violated: {resource} requires {used} but the device limit is {limit}")]
    HardwareConstraint {
        resource: &'static str,
        used: usize,
        limit: usize,
    },

    #[error("file write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type SeqResult<T> = Result<T, SeqError>;
