use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context};

use crate::record::Record;

/// A sorted chunk written to the working directory
#[derive(Debug, Clone)]
pub(crate) struct SortedChunkFile {
    index: usize,
    path: PathBuf,
    records: usize,
}

impl SortedChunkFile {
    pub(crate) fn new(index: usize, path: PathBuf, records: usize) -> SortedChunkFile {
        SortedChunkFile {
            index,
            path,
            records,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    pub(crate) fn records(&self) -> usize {
        self.records
    }
}

/// Write `records` as a JSON array with one record per line.
pub(crate) fn write_chunk_file(path: &PathBuf, records: &Vec<Record>) -> Result<(), anyhow::Error> {
    let file = File::create(path)
        .with_context(|| anyhow!("Failed to create chunk file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(b"[\n")?;
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            writer.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut writer, record)
            .with_context(|| anyhow!("Failed to write chunk file: {}, record: {}", path.display(), i))?;
    }
    if !records.is_empty() {
        writer.write_all(b"\n")?;
    }
    writer.write_all(b"]\n")?;
    writer.flush()
        .with_context(|| anyhow!("Failed to flush chunk file: {}", path.display()))?;
    Ok(())
}
