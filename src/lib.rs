//! This crate implements an external sort for text files of numbered records, files that are too
//! large to be sorted in memory.
//!
//! Each line of the input has the form `"<key>. <text>"`, where the key is a 64 bit signed integer
//! and the text holds between 1 and 1024 characters. Lines are ordered by text, compared ignoring
//! case, and then by key.
//!
//! The input is split into line aligned chunks which are sorted concurrently and written to a
//! working directory. The sorted chunks are then read back a batch at a time and merged into the
//! output, so memory use during the merge depends on the number of chunks and the batch size,
//! not on the size of the input.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use heavy_file_sort::sort::Sort;
//!
//! // parallel record sort
//! fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut heavy_file_sort = Sort::new(input, output);
//!
//!     // set number of CPU cores the sort will attempt to use. The default is to use all
//!     // available cores. The input is split into about two chunks per task.
//!     heavy_file_sort.with_tasks(2);
//!
//!     // set the directory for intermediate results. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
//!     // directory for intermediate files, preferably on the same file system as the output result.
//!     heavy_file_sort.with_tmp_dir(tmp);
//!
//!     heavy_file_sort.sort()
//! }
//!
//! // verify the result
//! fn is_sorted(path: PathBuf) -> Result<bool, anyhow::Error> {
//!     Sort::new(path, PathBuf::new()).check()
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod sort_command;
pub(crate) mod sorted_chunk_file;
pub(crate) mod unmerged_chunk_file;
pub(crate) mod merge;

pub mod chunk_decoder;
pub mod chunk_iterator;
pub mod error;
pub mod progress;
pub mod record;
pub mod sort;
pub mod space_guard;
