use std::cmp::{max, min};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;

use anyhow::{anyhow, Context};

/// Size of each read while looking for the end of a line
const LOOKAHEAD_BLOCK: usize = 4096;

#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    index: usize,
    offset: u64,
    length: u64,
    path: PathBuf,
}

impl Chunk {
    pub(crate) fn new(index: usize, offset: u64, length: u64, path: PathBuf) -> Chunk {
        Chunk {
            index,
            offset,
            length,
            path,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn length(&self) -> u64 {
        self.length
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Target chunk size for a file of `file_size` bytes processed by `tasks` workers.
///
/// Aims at about two chunks per worker so that a slow chunk does not leave the other workers
/// idle at the end, but never more than `ceiling` bytes per chunk.
pub(crate) fn target_chunk_size(file_size: u64, tasks: usize, ceiling: u64) -> u64 {
    let per_task = file_size / (2 * max(tasks, 1) as u64);
    max(min(per_task, ceiling), 1)
}

/// The byte lines are terminated with. Only ASCII terminators are supported.
pub(crate) fn endl_byte(endl: char) -> Result<u8, anyhow::Error> {
    if !endl.is_ascii() {
        return Err(anyhow!("line terminator must be an ASCII character: {:?}", endl));
    }
    Ok(endl as u8)
}

/// Split the file at `path` into line aligned ranges of about `chunk_size` bytes.
///
/// The result starts with 0 and ends with the file length. Every offset in between immediately
/// follows an `endl` byte. An empty file yields `[0]`.
///
/// # Examples
/// ```
/// use std::io::Write;
/// use heavy_file_sort::chunk_iterator::chunk_borders;
///
/// let mut file = tempfile::NamedTempFile::new().unwrap();
/// file.write_all(b"1. one\n2. two\n3. three\n").unwrap();
/// let borders = chunk_borders(&file.path().to_path_buf(), 8, '\n').unwrap();
/// assert_eq!(borders, vec![0, 14, 23]);
/// ```
pub fn chunk_borders(path: &PathBuf, chunk_size: u64, endl: char) -> Result<Vec<u64>, anyhow::Error> {
    let mut borders = vec![0];
    for chunk in ChunkIterator::new(path, chunk_size, endl)? {
        let chunk = chunk?;
        borders.push(chunk.offset() + chunk.length());
    }
    Ok(borders)
}

/// Iterates over line aligned chunks of a file.
///
/// From the start of the current chunk it jumps `jump` bytes ahead and then scans forward to the
/// end of that line. The scan is not bounded: a very long line makes the chunk longer but
/// never stops the iteration early.
pub(crate) struct ChunkIterator {
    path: PathBuf,
    reader: BufReader<File>,
    length: u64,
    jump: u64,
    pos: u64,
    index: usize,
    endl: u8,
}

impl ChunkIterator {
    pub(crate) fn new(path: &PathBuf, jump: u64, endl: char) -> Result<ChunkIterator, anyhow::Error> {
        if jump == 0 {
            return Err(anyhow!("chunk size must be positive, path: {}", path.display()));
        }
        let endl = endl_byte(endl)?;
        let metadata = path.metadata()
            .with_context(|| anyhow!("path: {}", path.display()))?;
        let length = metadata.len();
        let file = File::open(path)
            .with_context(|| anyhow!("path: {}", path.display()))?;

        Ok(
            ChunkIterator {
                path: path.clone(),
                reader: BufReader::with_capacity(LOOKAHEAD_BLOCK, file),
                length,
                jump,
                pos: 0,
                index: 0,
                endl,
            }
        )
    }

    /// Offset right after the first `endl` at or after `from`, or the file length if there is none.
    fn next_line_start(&mut self, from: u64) -> Result<u64, anyhow::Error> {
        self.reader.seek(SeekFrom::Start(from))
            .with_context(|| anyhow!("Failed to seek. Path: {}, position: {}", self.path.display(), from))?;
        let mut current = from;
        loop {
            let buf = self.reader.fill_buf()
                .with_context(|| anyhow!("Failed to read. Path: {}, position: {}", self.path.display(), current))?;
            if buf.is_empty() {
                return Ok(self.length);
            }
            match buf.iter().position(|b| *b == self.endl) {
                Some(i) => {
                    return Ok(current + i as u64 + 1);
                }
                None => {
                    let n = buf.len();
                    self.reader.consume(n);
                    current += n as u64;
                }
            }
        }
    }
}

impl Iterator for ChunkIterator {
    type Item = Result<Chunk, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.length {
            return None;
        }

        let candidate = self.pos.saturating_add(self.jump);
        let border = if candidate >= self.length {
            self.length
        } else {
            match self.next_line_start(candidate) {
                Ok(border) => min(border, self.length),
                Err(e) => {
                    // stop after reporting the failure
                    self.pos = self.length;
                    return Some(Err(e));
                }
            }
        };

        let chunk = Chunk::new(self.index, self.pos, border - self.pos, self.path.clone());
        self.pos = border;
        self.index += 1;
        Some(Ok(chunk))
    }
}
