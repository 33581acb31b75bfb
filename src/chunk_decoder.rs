use std::cmp::{max, min};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::error::SortError;
use crate::record::Record;

/// Default number of records decoded per batch
pub const DEFAULT_BATCH_RECORDS: usize = 5000;

const READ_BYTES_PER_RECORD: usize = 64;
const MIN_BLOCK_BYTES: usize = 16 * 1024;
const MAX_BLOCK_BYTES: usize = 16 * 1024 * 1024;

/// Records decoded by a single [read_batch] call.
#[derive(Debug)]
pub struct Batch {
    records: Vec<Record>,
    next_offset: u64,
    is_final: bool,
}

impl Batch {
    pub fn records(&self) -> &Vec<Record> {
        &self.records
    }

    /// Offset right after the last decoded record. Passing it back to [read_batch] continues
    /// with the next record.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// True once the closing bracket of the chunk was reached.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Expect {
    Open,
    FirstValue,
    Separator,
    Value,
}

/// Decode at most `limit` records of the sorted chunk file at `path`, starting at `resume_offset`.
///
/// A chunk file holds a single JSON array of records. Offset 0 is the start of the document,
/// any other offset must be one returned by a previous call, that is, right after a record.
/// Decoding from such an offset proceeds as if the array was already open and a record
/// was just read, so the next token is either ',' or ']'.
///
/// Only a bounded block of the file is read. A record cut by the end of the block is left for the
/// next call, so a batch may hold fewer than `limit` records without being final. A final
/// batch may be empty.
pub fn read_batch(path: &PathBuf, resume_offset: u64, limit: usize) -> Result<Batch, SortError> {
    let block_size = min(
        max(limit.saturating_mul(READ_BYTES_PER_RECORD), MIN_BLOCK_BYTES),
        MAX_BLOCK_BYTES,
    );
    read_batch_with_block(path, resume_offset, limit, block_size)
}

pub(crate) fn read_batch_with_block(path: &PathBuf, resume_offset: u64, limit: usize, block_size: usize) -> Result<Batch, SortError> {
    if limit == 0 {
        return Err(SortError::Artifact {
            path: path.clone(),
            resume_offset,
            records_so_far: 0,
            reason: "batch limit must be positive".to_string(),
        });
    }
    let mut file = File::open(path)
        .map_err(|e| SortError::io(path, resume_offset, 0, e))?;
    file.seek(SeekFrom::Start(resume_offset))
        .map_err(|e| SortError::io(path, resume_offset, 0, e))?;

    let mut block = Vec::new();
    let mut capacity = max(block_size, 1);
    loop {
        let at_eof = fill_block(&mut file, &mut block, capacity)
            .map_err(|e| SortError::io(path, resume_offset, 0, e))?;
        if let Some(batch) = decode_block(&block, at_eof, path, resume_offset, limit)? {
            log::debug!(
                "Decoded {} records from {}, offset: {} -> {}, final: {}",
                batch.records.len(),
                path.display(),
                resume_offset,
                batch.next_offset,
                batch.is_final
            );
            return Ok(batch);
        }
        // not even one record fits in the block
        capacity *= 2;
    }
}

/// Read until `block` holds `capacity` bytes. Returns true when the end of file was reached.
fn fill_block(file: &mut File, block: &mut Vec<u8>, capacity: usize) -> Result<bool, std::io::Error> {
    let missing = capacity.saturating_sub(block.len());
    let read = file.by_ref().take(missing as u64).read_to_end(block)?;
    Ok(read < missing)
}

fn decode_block(block: &[u8], at_eof: bool, path: &PathBuf, resume_offset: u64, limit: usize) -> Result<Option<Batch>, SortError> {
    let broken = |records_so_far: usize, reason: String| SortError::Artifact {
        path: path.clone(),
        resume_offset,
        records_so_far,
        reason,
    };

    let mut records = Vec::with_capacity(min(limit, 1024));
    let mut expect = if resume_offset == 0 { Expect::Open } else { Expect::Separator };
    let mut pos = 0;
    let mut committed = 0;

    while records.len() < limit {
        while pos < block.len() && block[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos == block.len() {
            if at_eof {
                return Err(broken(records.len(), "unexpected end of file, array is not closed".to_string()));
            }
            break;
        }

        match expect {
            Expect::Open => {
                if block[pos] != b'[' {
                    return Err(broken(0, format!("expected '[' at offset {}", resume_offset + pos as u64)));
                }
                pos += 1;
                expect = Expect::FirstValue;
            }
            Expect::FirstValue | Expect::Separator if block[pos] == b']' => {
                return Ok(Some(Batch {
                    records,
                    next_offset: resume_offset + pos as u64 + 1,
                    is_final: true,
                }));
            }
            Expect::Separator => {
                if block[pos] != b',' {
                    return Err(broken(
                        records.len(),
                        format!("expected ',' or ']' at offset {}", resume_offset + pos as u64),
                    ));
                }
                pos += 1;
                expect = Expect::Value;
            }
            Expect::FirstValue | Expect::Value => {
                let mut stream = serde_json::Deserializer::from_slice(&block[pos..]).into_iter::<Record>();
                match stream.next() {
                    Some(Ok(record)) => {
                        pos += stream.byte_offset();
                        committed = pos;
                        records.push(record);
                        expect = Expect::Separator;
                    }
                    Some(Err(e)) if e.is_eof() && !at_eof => {
                        break;
                    }
                    Some(Err(e)) => {
                        return Err(SortError::Decode {
                            path: path.clone(),
                            resume_offset,
                            records_so_far: records.len(),
                            source: e,
                        });
                    }
                    None => {
                        break;
                    }
                }
            }
        }
    }

    if records.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Batch {
            records,
            next_offset: resume_offset + committed as u64,
            is_final: false,
        }))
    }
}

/// Incremental reader over one sorted chunk file.
///
/// Holds at most one batch of records in memory. [ChunkCursor::take] reads the next batch as
/// soon as the current one is used up, so [ChunkCursor::peek] always shows the next record
/// unless the cursor is done.
#[derive(Debug)]
pub struct ChunkCursor {
    index: usize,
    path: PathBuf,
    offset: u64,
    batch: VecDeque<Record>,
    finished: bool,
    limit: usize,
}

impl ChunkCursor {
    /// Open a cursor and read its first batch.
    pub fn open(index: usize, path: PathBuf, limit: usize) -> Result<ChunkCursor, SortError> {
        let batch = read_batch(&path, 0, limit)?;
        Ok(ChunkCursor::with_batch(index, path, limit, batch))
    }

    /// Create a cursor from a first batch that was already read.
    pub(crate) fn with_batch(index: usize, path: PathBuf, limit: usize, batch: Batch) -> ChunkCursor {
        let mut cursor = ChunkCursor {
            index,
            path,
            offset: 0,
            batch: VecDeque::new(),
            finished: false,
            limit,
        };
        cursor.accept(batch);
        cursor
    }

    fn accept(&mut self, batch: Batch) {
        self.offset = batch.next_offset;
        self.finished = batch.is_final;
        self.batch = VecDeque::from(batch.records);
    }

    fn refill(&mut self) -> Result<(), SortError> {
        while self.batch.is_empty() && !self.finished {
            let batch = read_batch(&self.path, self.offset, self.limit)?;
            self.accept(batch);
        }
        Ok(())
    }

    /// Index of the chunk this cursor reads
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// The record the next [ChunkCursor::take] returns
    pub fn peek(&self) -> Option<&Record> {
        self.batch.front()
    }

    pub fn take(&mut self) -> Result<Option<Record>, SortError> {
        let record = self.batch.pop_front();
        self.refill()?;
        Ok(record)
    }

    pub fn is_done(&self) -> bool {
        self.finished && self.batch.is_empty()
    }
}
