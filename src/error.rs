use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A line that cannot be parsed into a [Record](crate::record::Record).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The line has no '.' separating the key from the text.
    #[error("missing '.' delimiter in line: '{line}'")]
    MissingDelimiter { line: String },
    /// The part before the delimiter is not a 64 bit signed integer.
    #[error("key is not a valid 64 bit integer in line: '{line}'")]
    InvalidKey { line: String },
    /// Nothing is left after the delimiter once trimmed.
    #[error("text is empty in line: '{line}'")]
    EmptyText { line: String },
    /// The line is not valid UTF-8. The line is reported with invalid bytes replaced.
    #[error("line is not valid UTF-8: '{line}'")]
    InvalidUtf8 { line: String },
    /// The trimmed text is longer than the allowed number of characters.
    #[error("text has {length} characters, more than {max} allowed, in line: '{line}'")]
    TextTooLong { line: String, length: usize, max: usize },
}

/// Failures of the sort pipeline. Each variant carries enough context to locate the failure
/// without parsing the message.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("malformed record, file: {path}, chunk offset: {chunk_offset}, line within chunk: {line_number}")]
    Format {
        path: PathBuf,
        chunk_offset: u64,
        line_number: usize,
        #[source]
        source: FormatError,
    },
    #[error("I/O failure, file: {path}, resume offset: {resume_offset}, records so far: {records_so_far}")]
    Io {
        path: PathBuf,
        resume_offset: u64,
        records_so_far: usize,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode chunk, file: {path}, resume offset: {resume_offset}, records so far: {records_so_far}")]
    Decode {
        path: PathBuf,
        resume_offset: u64,
        records_so_far: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("broken chunk, file: {path}, resume offset: {resume_offset}, records so far: {records_so_far}: {reason}")]
    Artifact {
        path: PathBuf,
        resume_offset: u64,
        records_so_far: usize,
        reason: String,
    },
    #[error("not enough free space to process {path}: required {required} bytes, available {available} bytes")]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },
}

impl SortError {
    pub(crate) fn io(path: &PathBuf, resume_offset: u64, records_so_far: usize, source: io::Error) -> SortError {
        SortError::Io {
            path: path.clone(),
            resume_offset,
            records_so_far,
            source,
        }
    }
}
