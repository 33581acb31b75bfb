use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use crate::chunk_decoder::ChunkCursor;

/// A chunk taking part in the merge, ordered by its next record.
///
/// Ties between chunks are broken by chunk index so that equal records leave the merge in input
/// order.
#[derive(Debug)]
pub(crate) struct UnmergedChunkFile {
    cursor: ChunkCursor,
}

impl UnmergedChunkFile {
    pub(crate) fn new(cursor: ChunkCursor) -> UnmergedChunkFile {
        UnmergedChunkFile { cursor }
    }
}

impl Deref for UnmergedChunkFile {
    type Target = ChunkCursor;

    fn deref(&self) -> &Self::Target {
        &self.cursor
    }
}

impl DerefMut for UnmergedChunkFile {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cursor
    }
}

impl Eq for UnmergedChunkFile {}

impl PartialEq<Self> for UnmergedChunkFile {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd<Self> for UnmergedChunkFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnmergedChunkFile {
    // comparison is flipped to make the smallest record the top of BinaryHeap (Max Heap)
    fn cmp(&self, other: &Self) -> Ordering {
        let heads = match (self.peek(), other.peek()) {
            (None, None) => Ordering::Equal,
            // none > some so exhausted chunks pop from BinaryHeap first
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(mine), Some(theirs)) => theirs.compare(mine),
        };
        heads.then_with(|| other.index().cmp(&self.index()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use crate::chunk_decoder::ChunkCursor;
    use crate::record::Record;
    use crate::sorted_chunk_file::write_chunk_file;
    use crate::unmerged_chunk_file::UnmergedChunkFile;

    #[test]
    fn test_heap_order() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let contents = [
            vec!["2. banana", "9. cherry"],
            vec!["5. Banana"],
            vec!["2. banana"],
            vec![],
            vec!["1. apple"],
        ];
        let mut heap = BinaryHeap::new();
        for (i, lines) in contents.iter().enumerate() {
            let records = lines.iter().map(|l| Record::parse(l)).collect::<Result<Vec<Record>, _>>()?;
            let path = dir.path().join(format!("chunk{i}.json"));
            write_chunk_file(&path, &records)?;
            heap.push(UnmergedChunkFile::new(ChunkCursor::open(i, path, 10)?));
        }

        let order: Vec<usize> = std::iter::from_fn(|| heap.pop()).map(|c| c.index()).collect();
        // the empty chunk first, then by record, equal records by chunk index
        assert_eq!(order, vec![3, 4, 0, 2, 1]);
        Ok(())
    }
}
