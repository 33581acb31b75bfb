use std::collections::binary_heap::PeekMut;
use std::collections::BinaryHeap;
use std::cmp::min;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use command_executor::command::Command;

use crate::chunk_decoder::{read_batch, Batch, ChunkCursor};
use crate::config::Config;
use crate::progress::{Phase, Progress, ProgressReporter};
use crate::record::Record;
use crate::sort::{get_tl_config, TaskResults};
use crate::unmerged_chunk_file::UnmergedChunkFile;

/// How often, in merged records, the merge loop checks whether progress is due
const PROGRESS_STRIDE: u64 = 4096;

/// Reads the first batch of a sorted chunk before the merge starts
pub(crate) struct PrimeCommand {
    index: usize,
    path: PathBuf,
    results: Arc<TaskResults<Batch>>,
}

impl PrimeCommand {
    pub(crate) fn new(index: usize, path: PathBuf, results: Arc<TaskResults<Batch>>) -> PrimeCommand {
        PrimeCommand {
            index,
            path,
            results,
        }
    }

    fn prime(&self) -> Result<Batch, anyhow::Error> {
        let config = get_tl_config()?;
        Ok(read_batch(&self.path, 0, config.batch_records())?)
    }
}

impl Command for PrimeCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if self.results.is_failed() {
            return Ok(());
        }
        match self.prime() {
            Ok(batch) => {
                self.results.put(self.index, batch);
            }
            Err(e) => {
                log::error!("Failed to read first batch, file: {}, error: {:#}", self.path.display(), e);
                self.results.fail(e);
            }
        }
        Ok(())
    }
}

/// Merge sorted chunks into `output`, replacing its content. Returns the number of merged records.
///
/// Records are collected into a buffer of `flush_records` records and appended to the output
/// every time the buffer fills up.
pub(crate) fn merge_chunks(
    cursors: Vec<ChunkCursor>,
    output: &PathBuf,
    config: &Config,
    reporter: &mut ProgressReporter,
) -> Result<u64, anyhow::Error> {
    let chunks = cursors.len();
    log::info!("Merging {} sorted chunks into {}", chunks, output.display());
    let output_file = File::create(output)
        .with_context(|| anyhow!("Failed to create output: {}", output.display()))?;

    let mut unmerged: BinaryHeap<UnmergedChunkFile> = cursors
        .into_iter()
        .filter(|cursor| !cursor.is_done())
        .map(UnmergedChunkFile::new)
        .collect();

    let flush_records = config.flush_records().max(1);
    let mut merged: Vec<Record> = Vec::with_capacity(min(flush_records, 1 << 16));
    let mut merged_len: u64 = 0;

    while let Some(mut current_min) = unmerged.peek_mut() {
        let record = current_min.take()
            .with_context(|| anyhow!("Merging chunk: {}", current_min.path().display()))?;
        if current_min.is_done() {
            log::debug!("Chunk {} is merged", current_min.index());
            PeekMut::pop(current_min);
        }

        if let Some(record) = record {
            merged.push(record);
            merged_len += 1;
            if merged.len() >= flush_records {
                append_records(&output_file, &mut merged, output)?;
            }
            if merged_len % PROGRESS_STRIDE == 0 {
                reporter.tick(|| Progress::new(Phase::Merging, chunks, merged_len));
            }
        }
    }
    append_records(&output_file, &mut merged, output)?;
    reporter.report(Progress::new(Phase::Merging, chunks, merged_len));

    log::info!("Finished merging sorted chunks, merged length: {} records", merged_len);
    Ok(merged_len)
}

fn append_records(output_file: &File, records: &mut Vec<Record>, output: &PathBuf) -> Result<(), anyhow::Error> {
    if records.is_empty() {
        return Ok(());
    }
    let count = records.len();
    let mut writer = BufWriter::new(output_file);
    for record in records.drain(..) {
        writeln!(writer, "{}", record)
            .with_context(|| anyhow!("Failed to write output: {}", output.display()))?;
    }
    writer.flush()
        .with_context(|| anyhow!("Failed to flush output: {}", output.display()))?;
    log::info!("Appended {} records to {}", count, output.display());
    Ok(())
}
