use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{RecordId, Result};

use super::btree_page::BTreeLeafPageRef;

/// Forward iterator over a B+ tree's leaf chain. Holds a read guard on the
/// current leaf, so entries under the cursor cannot move; the guard is
/// swapped for the next leaf's before the current one is released.
///
/// The iterator stays valid across concurrent readers but not across
/// writers splitting or merging the leaf it currently pins.
pub struct BPlusTreeIterator {
    bpm: Arc<BufferPoolManager>,
    leaf_guard: Option<ReadPageGuard>,
    index: usize,
}

impl BPlusTreeIterator {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        leaf_guard: Option<ReadPageGuard>,
        index: usize,
    ) -> Self {
        Self {
            bpm,
            leaf_guard,
            index,
        }
    }

    /// True once the iterator has run off the end of the last leaf.
    pub fn is_end(&self) -> bool {
        match &self.leaf_guard {
            None => true,
            Some(guard) => {
                let leaf = BTreeLeafPageRef::new(guard.data());
                self.index >= leaf.size() as usize && leaf.next_page_id().is_none()
            }
        }
    }

    /// Advances past the current entry and returns it, or None at the end.
    pub fn next(&mut self) -> Result<Option<(u32, RecordId)>> {
        loop {
            let Some(guard) = &self.leaf_guard else {
                return Ok(None);
            };
            let leaf = BTreeLeafPageRef::new(guard.data());

            if self.index < leaf.size() as usize {
                let entry = (leaf.key_at(self.index), leaf.value_at(self.index));
                self.index += 1;
                return Ok(Some(entry));
            }

            match leaf.next_page_id() {
                None => {
                    self.leaf_guard = None;
                    return Ok(None);
                }
                Some(next_pid) => {
                    // Latch the next leaf before letting go of this one.
                    let next_guard = self.bpm.fetch_page_read(next_pid)?;
                    self.leaf_guard = Some(next_guard);
                    self.index = 0;
                }
            }
        }
    }
}

impl Iterator for BPlusTreeIterator {
    type Item = Result<(u32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BPlusTreeIterator::next(self) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
