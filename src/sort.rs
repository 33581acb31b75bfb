use std::cell::RefCell;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Context};
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool::ThreadPool;
use command_executor::thread_pool_builder::ThreadPoolBuilder;
use regex::Regex;
use tempfile::Builder;

use crate::chunk_decoder::{Batch, ChunkCursor, DEFAULT_BATCH_RECORDS};
use crate::chunk_iterator::{chunk_borders, endl_byte, target_chunk_size, Chunk};
use crate::config::Config;
use crate::error::SortError;
use crate::merge::{merge_chunks, PrimeCommand};
use crate::progress::{Phase, Progress, ProgressHook, ProgressReporter};
use crate::record::Record;
use crate::sort_command::SortCommand;
use crate::space_guard::{DiskSpaceGuard, SpaceGuard};
use crate::sorted_chunk_file::SortedChunkFile;

thread_local! {
    pub(crate) static RECORDS_CAPACITY: RefCell<usize> = RefCell::new(1);
    pub(crate) static CONFIG: RefCell<Option<Config>> = RefCell::new(None);
}

pub(crate) fn get_records_capacity() -> usize {
    RECORDS_CAPACITY.with(|capacity| *capacity.borrow())
}

pub(crate) fn set_records_capacity(value: usize) {
    RECORDS_CAPACITY.with(|capacity| capacity.replace(value));
}

pub(crate) fn get_tl_config() -> Result<Config, anyhow::Error> {
    CONFIG.with(
        |config| {
            config.borrow().clone()
                .ok_or_else(|| anyhow!("No configuration in thread: {}", std::thread::current().name().unwrap_or("unnamed")))
        }
    )
}

/// Per task results of a pool run, indexed by chunk. The first failure wins and makes
/// the remaining tasks skip their work.
pub(crate) struct TaskResults<T> {
    slots: Mutex<Vec<Option<T>>>,
    failure: Mutex<Option<anyhow::Error>>,
    failed: AtomicBool,
}

impl<T> TaskResults<T> {
    pub(crate) fn new(size: usize) -> TaskResults<T> {
        TaskResults {
            slots: Mutex::new((0..size).map(|_| None).collect()),
            failure: Mutex::new(None),
            failed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub(crate) fn put(&self, index: usize, value: T) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots[index] = Some(value);
    }

    pub(crate) fn fail(&self, error: anyhow::Error) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(error);
        }
        self.failed.store(true, Ordering::Release);
    }

    /// All results in index order, or the first failure
    pub(crate) fn take(&self) -> Result<Vec<T>, anyhow::Error> {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = failure.take() {
            return Err(e);
        }
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *slots)
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or_else(|| anyhow!("No result for task {}", i)))
            .collect()
    }
}

/// Sort a file of numbered text records
///
/// Each line of the input has the form `"<key>. <text>"`. The output holds the same lines ordered
/// by text, ignoring case, and then by key. Lines that compare equal keep their input order.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use heavy_file_sort::sort::Sort;
///
/// fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut heavy_file_sort = Sort::new(input, output);
///     // set number of CPU cores the sort will attempt to use. The default is to use all
///     // available cores.
///     heavy_file_sort.with_tasks(2);
///     // set the directory in which the working directory of the run is created. The default
///     // is std::env::temp_dir(). The working directory is removed when the sort returns.
///     heavy_file_sort.with_tmp_dir(tmp);
///     heavy_file_sort.sort()
/// }
/// ```
pub struct Sort {
    input: PathBuf,
    output: PathBuf,
    tmp: PathBuf,
    tasks: usize,
    chunk_size_bytes: Option<u64>,
    chunk_ceiling_bytes: u64,
    batch_records: usize,
    flush_records: usize,
    ignore_empty: bool,
    ignore_lines: Option<Regex>,
    endl: char,
    space_guard: Option<Box<dyn SpaceGuard>>,
    progress: Option<(Duration, ProgressHook)>,
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * intermediate files go to a fresh directory under std::env::temp_dir()
    /// * all CPU cores are used
    /// * the chunk size is derived from the input size, two chunks per task, at most 256 MB
    /// * sorted chunks are read back 5000 records at a time
    /// * merged records are appended to the output 1 000 000 at a time
    /// * blank lines are skipped
    /// * the line terminator is '\n'
    /// * free space is checked on the disk of the temp directory
    pub fn new(input: PathBuf, output: PathBuf) -> Sort {
        Sort {
            input,
            output,
            tmp: std::env::temp_dir(),
            tasks: 0,
            chunk_size_bytes: None,
            chunk_ceiling_bytes: 256 * 1024 * 1024,
            batch_records: DEFAULT_BATCH_RECORDS,
            flush_records: 1_000_000,
            ignore_empty: true,
            ignore_lines: None,
            endl: '\n',
            space_guard: None,
            progress: None,
        }
    }

    /// Set the directory that holds the working directory of a run. It is recommended for large
    /// files to use a directory on the same file system as the output target.
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the number of tasks. The default is zero which will result in using all system cores
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Read the input in chunks of 'chunk_size_bytes' respecting line boundaries, instead of
    /// deriving the chunk size from the input size.
    pub fn with_chunk_size_bytes(&mut self, chunk_size_bytes: u64) {
        self.chunk_size_bytes = Some(chunk_size_bytes);
    }

    /// Read the input in chunks of 'chunk_size_mb' MB respecting line boundaries
    pub fn with_chunk_size_mb(&mut self, chunk_size_mb: u64) {
        self.chunk_size_bytes = Some(chunk_size_mb * 1_000_000);
    }

    /// Upper bound for the derived chunk size
    pub fn with_chunk_ceiling_bytes(&mut self, chunk_ceiling_bytes: u64) {
        self.chunk_ceiling_bytes = chunk_ceiling_bytes;
    }

    /// Number of records read back from a sorted chunk at a time. Larger batches mean fewer reads
    /// and more memory during the merge.
    pub fn with_batch_records(&mut self, batch_records: usize) {
        self.batch_records = batch_records;
    }

    /// Number of merged records buffered before they are appended to the output
    pub fn with_flush_records(&mut self, flush_records: usize) {
        self.flush_records = flush_records;
    }

    /// Whether to skip blank lines. The default is true
    pub fn with_ignore_empty(&mut self, ignore_empty: bool) {
        self.ignore_empty = ignore_empty;
    }

    /// Specify which lines to ignore. Each line matching the regex will be ignored and will not
    /// appear in the output.
    pub fn with_ignore_lines(&mut self, r: Regex) {
        self.ignore_lines = Some(r)
    }

    /// Set line ending char - not supporting CRLF, a trailing '\r' is trimmed from the text
    pub fn with_endl(&mut self, endl: char) {
        self.endl = endl
    }

    /// Replace the free space check
    pub fn with_space_guard(&mut self, space_guard: Box<dyn SpaceGuard>) {
        self.space_guard = Some(space_guard);
    }

    /// Register a hook called with the progress of the run at most once per `interval`
    pub fn with_progress_hook(&mut self, interval: Duration, hook: ProgressHook) {
        self.progress = Some((interval, hook));
    }

    /// Sort the input into the output.
    ///
    /// Fails before touching any file when the space guard reports less free space than needed.
    pub fn sort(&self) -> Result<(), anyhow::Error> {
        let config = self.create_config();
        let input_size = self.input.metadata()
            .with_context(|| anyhow!("path: {}", self.input.display()))?
            .len();

        let disk_space_guard = DiskSpaceGuard::new(self.tmp.clone());
        let space_guard: &dyn SpaceGuard = match &self.space_guard {
            Some(space_guard) => space_guard.as_ref(),
            None => &disk_space_guard,
        };
        if !space_guard.has_sufficient_space(input_size)? {
            let error = SortError::InsufficientSpace {
                path: self.input.clone(),
                required: space_guard.required_space(input_size),
                available: space_guard.available_space()?.unwrap_or(0),
            };
            log::error!("{}", error);
            return Err(error.into());
        }

        let working_dir = Builder::new()
            .prefix("temp-")
            .tempdir_in(&self.tmp)
            .with_context(|| anyhow!("Failed to create working directory in: {}", self.tmp.display()))?;
        log::info!("Working directory: {}", working_dir.path().display());
        let config = config.with_tmp(working_dir.path().to_path_buf());

        let result = Self::internal_sort(&self.input, input_size, &config, &self.output);

        let working_dir_path = working_dir.path().to_path_buf();
        if let Err(e) = working_dir.close() {
            log::warn!("Failed to remove working directory: {}, error: {}", working_dir_path.display(), e);
        }
        result
    }

    /// Check that the input is sorted.
    ///
    /// Returns false at the first pair of lines out of order and fails on malformed lines.
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        let config = self.create_config();
        Self::internal_check(&self.input, &config)
    }

    fn create_config(&self) -> Config {
        let mut tasks = self.tasks;
        if self.tasks == 0 {
            tasks = num_cpus::get();
        }

        Config::new(
            self.tmp.clone(),
            tasks,
            self.chunk_size_bytes,
            self.chunk_ceiling_bytes,
            self.batch_records,
            self.flush_records,
            self.ignore_empty,
            self.ignore_lines.clone(),
            self.endl,
            self.progress.clone(),
        )
    }

    fn build_pool(name: &str, config: &Config) -> Result<ThreadPool, anyhow::Error> {
        let mut thread_pool_builder = ThreadPoolBuilder::new();
        let mut thread_pool = thread_pool_builder
            .with_name(name.to_string())
            .with_tasks(config.tasks())
            .with_queue_size(config.queue_size())
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()?;
        thread_pool.set_thread_local(&CONFIG, Some(config.clone()));
        Ok(thread_pool)
    }

    pub(crate) fn internal_check(path: &PathBuf, config: &Config) -> Result<bool, anyhow::Error> {
        let file = File::open(path)
            .with_context(|| anyhow!("path: {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let endl = endl_byte(config.endl())?;
        let mut line = Vec::new();
        let mut previous: Option<Record> = None;
        let mut n = 0;
        let mut checked: u64 = 0;
        loop {
            line.clear();
            let bytes = reader.read_until(endl, &mut line)
                .map_err(|e| SortError::io(path, 0, n, e))?;
            if bytes == 0 {
                break;
            }
            n += 1;
            let current = config.parse_line(&line, endl)
                .map_err(|source| SortError::Format {
                    path: path.clone(),
                    chunk_offset: 0,
                    line_number: n,
                    source,
                })?;
            let Some(current) = current else {
                continue;
            };
            if let Some(previous) = &previous {
                if previous.compare(&current) == std::cmp::Ordering::Greater {
                    log::info!("Line {} of {} is out of order: '{}' after '{}'", n, path.display(), current, previous);
                    return Ok(false);
                }
            }
            previous = Some(current);
            checked += 1;
            if checked % 1_000_000 == 0 {
                log::info!("Checked {} records", checked);
            }
        }
        Ok(true)
    }

    fn sort_chunks(chunks: Vec<Chunk>, config: &Config) -> Result<Vec<SortedChunkFile>, anyhow::Error> {
        log::info!("Sorting {} chunks with {} tasks", chunks.len(), config.tasks());
        let results = Arc::new(TaskResults::new(chunks.len()));
        let mut sorting_pool = Self::build_pool("sorting", config)?;
        for chunk in chunks {
            sorting_pool.submit(Box::new(SortCommand::new(chunk, results.clone())));
        }
        log::info!("Shutting down sorting pool");
        sorting_pool.shutdown();
        sorting_pool.join()?;
        results.take()
    }

    fn prime_cursors(sorted_files: &Vec<SortedChunkFile>, config: &Config) -> Result<Vec<ChunkCursor>, anyhow::Error> {
        let results: Arc<TaskResults<Batch>> = Arc::new(TaskResults::new(sorted_files.len()));
        let mut priming_pool = Self::build_pool("priming", config)?;
        for sorted_file in sorted_files {
            priming_pool.submit(Box::new(PrimeCommand::new(sorted_file.index(), sorted_file.path().clone(), results.clone())));
        }
        priming_pool.shutdown();
        priming_pool.join()?;

        let cursors = results.take()?
            .into_iter()
            .zip(sorted_files)
            .map(|(batch, sorted_file)| ChunkCursor::with_batch(sorted_file.index(), sorted_file.path().clone(), config.batch_records(), batch))
            .collect();
        Ok(cursors)
    }

    fn internal_sort(input: &PathBuf, input_size: u64, config: &Config, output: &PathBuf) -> Result<(), anyhow::Error> {
        log::info!("Start parallel sort, input: {}, size: {} bytes", input.display(), input_size);
        let mut reporter = ProgressReporter::new(config.progress().clone());

        let chunk_size = config.chunk_size_bytes()
            .unwrap_or_else(|| target_chunk_size(input_size, config.tasks(), config.chunk_ceiling_bytes()));
        let borders = chunk_borders(input, chunk_size, config.endl())?;
        log::info!("Found {} chunks, target chunk size: {} bytes", borders.len() - 1, chunk_size);
        let chunks: Vec<Chunk> = borders
            .windows(2)
            .enumerate()
            .map(|(i, border)| Chunk::new(i, border[0], border[1] - border[0], input.clone()))
            .collect();

        let sorted_files = Self::sort_chunks(chunks, config)?;
        let records: usize = sorted_files.iter().map(|f| f.records()).sum();
        log::info!("Total records in chunks: {}", records);
        reporter.report(Progress::new(Phase::Sorting, sorted_files.len(), records as u64));

        let cursors = Self::prime_cursors(&sorted_files, config)?;
        let merged = merge_chunks(cursors, output, config, &mut reporter)?;
        if merged != records as u64 {
            return Err(anyhow!("Merged {} records out of {}", merged, records));
        }
        log::info!("Finish parallel sort, output: {}", output.display());
        Ok(())
    }
}
