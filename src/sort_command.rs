use std::cmp::max;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::sync::Arc;

use command_executor::command::Command;

use crate::chunk_iterator::{endl_byte, Chunk};
use crate::config::Config;
use crate::error::SortError;
use crate::record::Record;
use crate::sort::{get_records_capacity, get_tl_config, set_records_capacity, TaskResults};
use crate::sorted_chunk_file::{write_chunk_file, SortedChunkFile};

/// Size of the blocks a chunk is read in
const READ_BLOCK: usize = 64 * 1024;

/// Sorts one chunk of the input and writes it to the working directory
pub(crate) struct SortCommand {
    chunk: Chunk,
    results: Arc<TaskResults<SortedChunkFile>>,
}

impl SortCommand {
    pub(crate) fn new(chunk: Chunk, results: Arc<TaskResults<SortedChunkFile>>) -> SortCommand {
        SortCommand {
            chunk,
            results,
        }
    }

    fn read_records(&self, config: &Config, endl: u8) -> Result<Vec<Record>, SortError> {
        let chunk = &self.chunk;
        let records_capacity = get_records_capacity();
        let mut records = Vec::with_capacity(records_capacity);

        let mut file = File::open(chunk.path())
            .map_err(|e| SortError::io(chunk.path(), chunk.offset(), 0, e))?;
        file.seek(SeekFrom::Start(chunk.offset()))
            .map_err(|e| SortError::io(chunk.path(), chunk.offset(), 0, e))?;
        let mut reader = BufReader::with_capacity(READ_BLOCK, file.take(chunk.length()));

        let mut n = 0;
        let mut line = Vec::new();
        loop {
            line.clear();
            let bytes = reader.read_until(endl, &mut line)
                .map_err(|e| SortError::io(chunk.path(), chunk.offset(), records.len(), e))?;
            if bytes == 0 {
                break;
            }
            n += 1;
            let record = config.parse_line(&line, endl)
                .map_err(|source| SortError::Format {
                    path: chunk.path().clone(),
                    chunk_offset: chunk.offset(),
                    line_number: n,
                    source,
                })?;
            let Some(record) = record else {
                continue;
            };
            records.push(record);
        }
        set_records_capacity(max(records.len(), records_capacity));
        Ok(records)
    }

    fn sort_chunk(&self) -> Result<SortedChunkFile, anyhow::Error> {
        let config = get_tl_config()?;
        let endl = endl_byte(config.endl())?;
        let mut records = self.read_records(&config, endl)?;
        // stable, equal records keep their input order
        records.sort_by(Record::compare);

        let path = config.tmp().join(format!("chunk{}.json", self.chunk.index()));
        write_chunk_file(&path, &records)?;
        log::info!(
            "Sorted chunk {}, offset: {}, length: {}, records: {}, file: {}",
            self.chunk.index(),
            self.chunk.offset(),
            self.chunk.length(),
            records.len(),
            path.display()
        );
        Ok(SortedChunkFile::new(self.chunk.index(), path, records.len()))
    }
}

impl Command for SortCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if self.results.is_failed() {
            log::info!("Skipping chunk {} after an earlier failure", self.chunk.index());
            return Ok(());
        }
        match self.sort_chunk() {
            Ok(sorted) => {
                self.results.put(self.chunk.index(), sorted);
            }
            Err(e) => {
                log::error!(
                    "Failed to sort chunk {}, file: {}, offset: {}, error: {:#}",
                    self.chunk.index(),
                    self.chunk.path().display(),
                    self.chunk.offset(),
                    e
                );
                self.results.fail(e.context(format!("chunk: {}", self.chunk.index())));
            }
        }
        Ok(())
    }
}
