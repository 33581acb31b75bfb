use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::error::FormatError;
use crate::progress::ProgressHook;
use crate::record::{line_text, Record};

#[derive(Clone)]
pub(crate) struct Config {
    tmp: PathBuf,
    tasks: usize,
    queue_size: usize,
    chunk_size_bytes: Option<u64>,
    chunk_ceiling_bytes: u64,
    batch_records: usize,
    flush_records: usize,
    ignore_empty: bool,
    ignore_lines: Option<Regex>,
    endl: char,
    progress: Option<(Duration, ProgressHook)>,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tasks: usize,
        chunk_size_bytes: Option<u64>,
        chunk_ceiling_bytes: u64,
        batch_records: usize,
        flush_records: usize,
        ignore_empty: bool,
        ignore_lines: Option<Regex>,
        endl: char,
        progress: Option<(Duration, ProgressHook)>,
    ) -> Config {
        let queue_size = 4096;
        Config {
            tmp,
            tasks,
            queue_size,
            chunk_size_bytes,
            chunk_ceiling_bytes,
            batch_records,
            flush_records,
            ignore_empty,
            ignore_lines,
            endl,
            progress,
        }
    }

    /// Working directory of the current run
    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn with_tmp(mut self, tmp: PathBuf) -> Config {
        self.tmp = tmp;
        self
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn chunk_size_bytes(&self) -> Option<u64> {
        self.chunk_size_bytes
    }

    pub(crate) fn chunk_ceiling_bytes(&self) -> u64 {
        self.chunk_ceiling_bytes
    }

    pub(crate) fn batch_records(&self) -> usize {
        self.batch_records
    }

    pub(crate) fn flush_records(&self) -> usize {
        self.flush_records
    }

    pub(crate) fn endl(&self) -> char {
        self.endl
    }

    pub(crate) fn progress(&self) -> &Option<(Duration, ProgressHook)> {
        &self.progress
    }

    /// The record held by a raw line read up to and including `endl`, `None` for a skipped line
    pub(crate) fn parse_line(&self, line: &[u8], endl: u8) -> Result<Option<Record>, FormatError> {
        let text = line_text(line, endl)?;
        if self.is_ignored(text) {
            return Ok(None);
        }
        Record::parse(text).map(Some)
    }

    /// True for lines that are skipped instead of parsed
    pub(crate) fn is_ignored(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if self.ignore_empty && trimmed.is_empty() {
            return true;
        }
        match &self.ignore_lines {
            Some(r) => r.is_match(trimmed),
            None => false,
        }
    }
}
