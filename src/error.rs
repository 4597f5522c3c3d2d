//! Error taxonomy for the reader.
//!
//! End-of-stream is never an error: block and shower reads return
//! `Ok(None)` once the source is exhausted.  Everything here is local to
//! the failing call; nothing is retried and no malformed block is skipped.

use std::io;
use thiserror::Error;

use crate::block::BlockKind;

/// Structural violation of the CORSIKA on-disk layout.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Not a CORSIKA file: {0}")]
    NotCorsika(String),
    #[error("Unrecognised record marker {marker:#x}")]
    BadRecordMarker { marker: u64 },
    #[error("Record marker mismatch at block {position}: leading {leading}, trailing {trailing}")]
    MarkerMismatch { position: u64, leading: u64, trailing: u64 },
    #[error("Thinning mismatch: requested thinned={requested}, file is thinned={detected}")]
    ThinningMismatch { requested: bool, detected: bool },
    #[error("Truncated record at block {position}: {got} of {expected} bytes")]
    Truncated { position: u64, got: usize, expected: usize },
    #[error("Unknown block sentinel {sentinel} at block {position}")]
    UnknownSentinel { position: u64, sentinel: String },
    #[error("Unexpected {found:?} block at {position} while {state}")]
    UnexpectedBlock { position: u64, found: BlockKind, state: &'static str },
    #[error("Event opened at block {header_position} not closed before {found:?} block at {position}")]
    UnterminatedEvent { header_position: u64, position: u64, found: BlockKind },
    #[error("Stream ended at block {position} where a block was expected")]
    UnexpectedEnd { position: u64 },
    #[error("Stream ended without a run trailer")]
    MissingRunTrailer,
    #[error("No run header within the first {0} blocks")]
    MissingRunHeader(u64),
    #[error("Event header count {headers} differs from event trailer count {trailers}")]
    EventCountMismatch { headers: usize, trailers: usize },
    #[error("Longitudinal block count {longitudinal} differs from event count {events}")]
    LongitudinalMismatch { longitudinal: usize, events: usize },
}

impl FormatError {
    /// Block position the error refers to, when it has one.
    pub fn position(&self) -> Option<u64> {
        match self {
            FormatError::MarkerMismatch  { position, .. }
            | FormatError::Truncated       { position, .. }
            | FormatError::UnknownSentinel { position, .. }
            | FormatError::UnexpectedBlock { position, .. }
            | FormatError::UnexpectedEnd   { position } => Some(*position),
            FormatError::UnterminatedEvent { header_position, .. } => Some(*header_position),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CorsikaError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Event index {index} out of range ({len} events)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Event number {0} not present in this run")]
    EventNotFound(u32),
    #[error("File is not open")]
    NotOpen,
    #[error("Stream is closed")]
    ClosedStream,
    #[error("No current shower: read or seek to an event first")]
    NoCurrentShower,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CorsikaError {
    pub fn is_format(&self) -> bool {
        matches!(self, CorsikaError::Format(_))
    }

    pub fn as_format(&self) -> Option<&FormatError> {
        match self {
            CorsikaError::Format(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CorsikaError>;
