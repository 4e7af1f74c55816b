use std::collections::VecDeque;
use std::sync::Arc;

use log::debug;

use crate::buffer::{BufferPoolManager, ReadPageGuard, WritePageGuard};
use crate::common::{PageId, RecordId, Result, TarnError, INVALID_PAGE_ID};

use super::btree_iterator::BPlusTreeIterator;
use super::btree_page::{
    btree_page_min_size, btree_page_size_fields, btree_page_type, internal_page_capacity,
    leaf_page_capacity, BTreeHeaderPage, BTreeHeaderPageRef, BTreeInternalPage,
    BTreeInternalPageRef, BTreeLeafPage, BTreeLeafPageRef, BTreePageType,
};

/// Latches held by one tree write operation. `write_set` is the chain of
/// write guards from the shallowest still-latched ancestor down to the
/// current node; crossing a safe node clears everything above it. The
/// header guard is kept exactly as long as the operation may still change
/// the root page id.
struct Context {
    root_page_id: PageId,
    header_guard: Option<WritePageGuard>,
    write_set: VecDeque<WritePageGuard>,
}

impl Context {
    fn is_root(&self, page_id: PageId) -> bool {
        page_id == self.root_page_id
    }

    fn release_ancestors(&mut self) {
        self.write_set.clear();
        self.header_guard = None;
    }
}

/// A concurrent B+ tree index over the buffer pool. Keys are unique
/// `u32`s mapping to `RecordId`s; nodes live in pages and the root page
/// id is kept in a dedicated header page, so the index itself is freely
/// shareable across threads.
///
/// Reads latch-crab with read guards; writes descend with write guards
/// and release ancestors as soon as the current node is safe (insert: not
/// full, delete: above minimum).
pub struct BPlusTree {
    header_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    leaf_max_size: u16,
    internal_max_size: u16,
}

impl BPlusTree {
    /// Creates a new empty index, allocating its header page.
    /// `leaf_max_size` bounds leaf entries, `internal_max_size` bounds
    /// separator keys per internal node.
    pub fn new(
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: u16,
        internal_max_size: u16,
    ) -> Result<Self> {
        let (header_page_id, mut header_guard) = bpm.new_page()?;
        BTreeHeaderPage::new(header_guard.data_mut()).init();
        drop(header_guard);

        Ok(Self::open(bpm, header_page_id, leaf_max_size, internal_max_size))
    }

    /// Opens an existing index by its header page.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        header_page_id: PageId,
        leaf_max_size: u16,
        internal_max_size: u16,
    ) -> Self {
        let leaf_max_size = leaf_max_size.clamp(2, leaf_page_capacity());
        let internal_max_size = internal_max_size.clamp(2, internal_page_capacity() - 1);
        Self {
            header_page_id,
            bpm,
            leaf_max_size,
            internal_max_size,
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Child capacity of an internal page: one more than the number of
    /// separator keys it can carry.
    fn internal_child_capacity(&self) -> u16 {
        self.internal_max_size + 1
    }

    pub fn is_empty(&self) -> Result<bool> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(BTreeHeaderPageRef::new(header_guard.data()).root_page_id() == INVALID_PAGE_ID)
    }

    /// Point lookup.
    pub fn get(&self, key: u32) -> Result<Option<RecordId>> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header_guard);

        loop {
            match btree_page_type(guard.data()) {
                BTreePageType::Leaf => {
                    return Ok(BTreeLeafPageRef::new(guard.data()).lookup(key));
                }
                BTreePageType::Internal => {
                    let child = BTreeInternalPageRef::new(guard.data()).find_child(key);
                    // Assignment latches the child before the parent guard
                    // is dropped.
                    guard = self.bpm.fetch_page_read(child)?;
                }
                BTreePageType::Invalid => {
                    return Err(TarnError::IndexCorrupted(format!(
                        "unexpected page type on {}",
                        guard.page_id()
                    )));
                }
            }
        }
    }

    /// Inserts a key/value pair. Returns false when the key is already
    /// present; the tree is unchanged in that case.
    pub fn insert(&self, key: u32, value: RecordId) -> Result<bool> {
        let mut header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header_guard.data()).root_page_id();

        // Empty tree: the first insert creates a leaf root.
        if root_id == INVALID_PAGE_ID {
            let (root_pid, mut root_guard) = self.bpm.new_page()?;
            let mut leaf = BTreeLeafPage::new(root_guard.data_mut());
            leaf.init(self.leaf_max_size);
            leaf.insert(key, value);
            BTreeHeaderPage::new(header_guard.data_mut()).set_root_page_id(root_pid);
            debug!("created leaf root {}", root_pid);
            return Ok(true);
        }

        let mut ctx = Context {
            root_page_id: root_id,
            header_guard: Some(header_guard),
            write_set: VecDeque::new(),
        };

        let mut guard = self.bpm.fetch_page_write(root_id)?;
        while btree_page_type(guard.data()) == BTreePageType::Internal {
            let child_pid = BTreeInternalPageRef::new(guard.data()).find_child(key);
            ctx.write_set.push_back(guard);

            let child_guard = self.bpm.fetch_page_write(child_pid)?;
            let (size, max) = btree_page_size_fields(child_guard.data());
            if size < max {
                // A non-full child absorbs any split below it, so every
                // ancestor latch can go.
                ctx.release_ancestors();
            }
            guard = child_guard;
        }

        let (size, max) = btree_page_size_fields(guard.data());
        if size < max {
            let inserted = BTreeLeafPage::new(guard.data_mut()).insert(key, value);
            return Ok(inserted);
        }

        // Leaf is full: build the overflowed entry array, then split.
        let leaf = BTreeLeafPageRef::new(guard.data());
        let mut entries: Vec<(u32, RecordId)> = (0..leaf.size() as usize)
            .map(|i| (leaf.key_at(i), leaf.value_at(i)))
            .collect();
        let pos = entries.partition_point(|&(k, _)| k < key);
        if pos < entries.len() && entries[pos].0 == key {
            return Ok(false);
        }
        entries.insert(pos, (key, value));

        let left_count = (entries.len() + 1) / 2;
        let separator = entries[left_count].0;

        let (new_leaf_pid, mut new_leaf_guard) = self.bpm.new_page()?;
        {
            let mut old_leaf = BTreeLeafPage::new(guard.data_mut());
            let old_next = old_leaf.next_page_id();

            let mut new_leaf = BTreeLeafPage::new(new_leaf_guard.data_mut());
            new_leaf.init(self.leaf_max_size);
            new_leaf.set_entries(&entries[left_count..]);
            new_leaf.set_next_page_id(old_next);

            old_leaf.set_entries(&entries[..left_count]);
            old_leaf.set_next_page_id(Some(new_leaf_pid));
        }
        drop(new_leaf_guard);

        ctx.write_set.push_back(guard);
        self.insert_into_parent(&mut ctx, separator, new_leaf_pid)?;
        Ok(true)
    }

    /// Links a freshly split-off right sibling under the parent of the
    /// node at the back of the write set, splitting upward as needed.
    fn insert_into_parent(&self, ctx: &mut Context, key: u32, right_pid: PageId) -> Result<()> {
        let left_guard = ctx
            .write_set
            .pop_back()
            .expect("split with no latched node");
        let left_pid = left_guard.page_id();

        if ctx.is_root(left_pid) {
            let (root_pid, mut root_guard) = self.bpm.new_page()?;
            let mut root = BTreeInternalPage::new(root_guard.data_mut());
            root.init(self.internal_child_capacity());
            root.populate_new_root(left_pid, key, right_pid);

            let header_guard = ctx
                .header_guard
                .as_mut()
                .expect("header latch released before root split");
            BTreeHeaderPage::new(header_guard.data_mut()).set_root_page_id(root_pid);
            debug!("root split, new root {}", root_pid);
            return Ok(());
        }
        drop(left_guard);

        let parent_guard = ctx
            .write_set
            .back_mut()
            .expect("split reached an unlatched parent");

        let (size, max) = btree_page_size_fields(parent_guard.data());
        if size < max {
            BTreeInternalPage::new(parent_guard.data_mut()).insert(key, right_pid);
            return Ok(());
        }

        // Parent is at child capacity: split it the same way.
        let mut entries = BTreeInternalPageRef::new(parent_guard.data()).entries();
        let pos = 1 + entries[1..].partition_point(|&(k, _)| k < key);
        entries.insert(pos, (key, right_pid));

        let left_count = (entries.len() + 1) / 2;
        let promoted = entries[left_count].0;

        let (new_internal_pid, mut new_internal_guard) = self.bpm.new_page()?;
        {
            let mut new_internal = BTreeInternalPage::new(new_internal_guard.data_mut());
            new_internal.init(self.internal_child_capacity());
            new_internal.set_entries(&entries[left_count..]);
        }
        drop(new_internal_guard);

        BTreeInternalPage::new(parent_guard.data_mut()).set_entries(&entries[..left_count]);

        self.insert_into_parent(ctx, promoted, new_internal_pid)
    }

    /// Removes a key. Absent keys are ignored.
    pub fn remove(&self, key: u32) -> Result<()> {
        let header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(());
        }

        let mut ctx = Context {
            root_page_id: root_id,
            header_guard: Some(header_guard),
            write_set: VecDeque::new(),
        };

        let mut guard = self.bpm.fetch_page_write(root_id)?;
        while btree_page_type(guard.data()) == BTreePageType::Internal {
            let child_pid = BTreeInternalPageRef::new(guard.data()).find_child(key);
            ctx.write_set.push_back(guard);

            let child_guard = self.bpm.fetch_page_write(child_pid)?;
            let (size, max) = btree_page_size_fields(child_guard.data());
            if size > btree_page_min_size(max) {
                // A child above minimum absorbs any merge below it.
                ctx.release_ancestors();
            }
            guard = child_guard;
        }
        ctx.write_set.push_back(guard);

        self.delete_entry(&mut ctx, key)
    }

    /// Removes `key` from the node at the back of the write set, then
    /// rebalances upward: merge when the combined sibling fits in one
    /// node, redistribute otherwise, collapse the root when it thins out.
    fn delete_entry(&self, ctx: &mut Context, key: u32) -> Result<()> {
        let mut guard = ctx
            .write_set
            .pop_back()
            .expect("delete with no latched node");
        let page_id = guard.page_id();
        let is_leaf = btree_page_type(guard.data()) == BTreePageType::Leaf;

        if is_leaf {
            BTreeLeafPage::new(guard.data_mut()).remove(key);
        } else {
            BTreeInternalPage::new(guard.data_mut()).remove_entry_with_key(key);
        }

        let (size, max) = btree_page_size_fields(guard.data());

        if ctx.is_root(page_id) {
            if is_leaf {
                if size == 0 {
                    // Last key removed: the tree is empty again.
                    let header_guard = ctx
                        .header_guard
                        .as_mut()
                        .expect("header latch released before root collapse");
                    BTreeHeaderPage::new(header_guard.data_mut())
                        .set_root_page_id(INVALID_PAGE_ID);
                    drop(guard);
                    self.bpm.delete_page(page_id).ok();
                    debug!("tree emptied, root {} freed", page_id);
                }
            } else if size == 1 {
                // Single-child internal root: promote the child.
                let only_child = BTreeInternalPageRef::new(guard.data()).child_at(0);
                let header_guard = ctx
                    .header_guard
                    .as_mut()
                    .expect("header latch released before root collapse");
                BTreeHeaderPage::new(header_guard.data_mut()).set_root_page_id(only_child);
                drop(guard);
                self.bpm.delete_page(page_id).ok();
                debug!("root collapsed into {}", only_child);
            }
            return Ok(());
        }

        if size >= btree_page_min_size(max) {
            return Ok(());
        }

        // Underflow: consult the parent for a sibling.
        let (separator_index, separator_key, sibling_pid, current_is_left) = {
            let parent_guard = ctx
                .write_set
                .back()
                .expect("underflow with no latched parent");
            let parent = BTreeInternalPageRef::new(parent_guard.data());
            let index = parent
                .child_index(page_id)
                .expect("node missing from its parent");
            if index + 1 < parent.size() as usize {
                (index + 1, parent.key_at(index + 1), parent.child_at(index + 1), true)
            } else {
                (index, parent.key_at(index), parent.child_at(index - 1), false)
            }
        };

        let mut sibling_guard = self.bpm.fetch_page_write(sibling_pid)?;
        let (left_guard, right_guard) = if current_is_left {
            (&mut guard, &mut sibling_guard)
        } else {
            (&mut sibling_guard, &mut guard)
        };

        let (left_size, left_max) = btree_page_size_fields(left_guard.data());
        let (right_size, _) = btree_page_size_fields(right_guard.data());

        if left_size + right_size <= left_max {
            // Merge the right node into the left and drop the separator.
            if is_leaf {
                let (right_entries, right_next) = {
                    let right = BTreeLeafPageRef::new(right_guard.data());
                    let entries: Vec<_> = (0..right.size() as usize)
                        .map(|i| (right.key_at(i), right.value_at(i)))
                        .collect();
                    (entries, right.next_page_id())
                };
                let mut left = BTreeLeafPage::new(left_guard.data_mut());
                left.set_next_page_id(right_next);
                for (k, v) in right_entries {
                    left.append(k, v);
                }
            } else {
                let mut right_entries = BTreeInternalPageRef::new(right_guard.data()).entries();
                // The separator becomes the key over the right node's
                // first child.
                right_entries[0].0 = separator_key;
                let mut left = BTreeInternalPage::new(left_guard.data_mut());
                for (k, child) in right_entries {
                    left.append_entry(k, child);
                }
            }

            let right_pid = right_guard.page_id();
            // Release both child latches before recursing into the parent.
            drop(guard);
            drop(sibling_guard);
            // Best effort: a concurrent iterator may still pin the page.
            self.bpm.delete_page(right_pid).ok();
            return self.delete_entry(ctx, separator_key);
        }

        // Redistribute one entry across the sibling boundary. The parent
        // only has a separator rewritten, so everything above it can go.
        while ctx.write_set.len() > 1 {
            ctx.write_set.pop_front();
            ctx.header_guard = None;
        }

        let left_min = btree_page_min_size(left_max);
        let new_separator;

        if is_leaf {
            if left_size < left_min {
                // Move the right node's first entry left.
                let (k, v) = {
                    let right = BTreeLeafPageRef::new(right_guard.data());
                    (right.key_at(0), right.value_at(0))
                };
                BTreeLeafPage::new(left_guard.data_mut()).append(k, v);
                let mut right = BTreeLeafPage::new(right_guard.data_mut());
                right.remove(k);
                new_separator = right.key_at(0);
            } else {
                // Move the left node's last entry right.
                debug_assert!(right_size < left_min);
                let (k, v) = {
                    let left = BTreeLeafPageRef::new(left_guard.data());
                    (left.key_at(left_size as usize - 1), left.value_at(left_size as usize - 1))
                };
                BTreeLeafPage::new(left_guard.data_mut()).truncate(left_size - 1);
                BTreeLeafPage::new(right_guard.data_mut()).insert(k, v);
                new_separator = k;
            }
        } else if left_size < left_min {
            // Rotate the right node's first child left through the
            // separator.
            let (first_child, next_key) = {
                let right = BTreeInternalPageRef::new(right_guard.data());
                (right.child_at(0), right.key_at(1))
            };
            BTreeInternalPage::new(left_guard.data_mut()).append_entry(separator_key, first_child);
            BTreeInternalPage::new(right_guard.data_mut()).remove_at(0);
            new_separator = next_key;
        } else {
            // Rotate the left node's last child right.
            let (last_key, last_child) = {
                let left = BTreeInternalPageRef::new(left_guard.data());
                (left.key_at(left_size as usize - 1), left.child_at(left_size as usize - 1))
            };
            BTreeInternalPage::new(left_guard.data_mut()).truncate(left_size - 1);
            BTreeInternalPage::new(right_guard.data_mut())
                .push_front_child(separator_key, last_child);
            new_separator = last_key;
        }

        let parent_guard = ctx
            .write_set
            .back_mut()
            .expect("underflow with no latched parent");
        BTreeInternalPage::new(parent_guard.data_mut()).set_key_at(separator_index, new_separator);
        Ok(())
    }

    /// Iterator positioned at the first entry of the tree.
    pub fn begin(&self) -> Result<BPlusTreeIterator> {
        let Some(mut guard) = self.descend_leftmost()? else {
            return Ok(BPlusTreeIterator::new(Arc::clone(&self.bpm), None, 0));
        };
        loop {
            match btree_page_type(guard.data()) {
                BTreePageType::Leaf => {
                    return Ok(BPlusTreeIterator::new(Arc::clone(&self.bpm), Some(guard), 0));
                }
                BTreePageType::Internal => {
                    let child = BTreeInternalPageRef::new(guard.data()).child_at(0);
                    guard = self.bpm.fetch_page_read(child)?;
                }
                BTreePageType::Invalid => {
                    return Err(TarnError::IndexCorrupted(format!(
                        "unexpected page type on {}",
                        guard.page_id()
                    )));
                }
            }
        }
    }

    /// Iterator positioned at the first entry with key >= `key`.
    pub fn begin_at(&self, key: u32) -> Result<BPlusTreeIterator> {
        let Some(mut guard) = self.descend_leftmost()? else {
            return Ok(BPlusTreeIterator::new(Arc::clone(&self.bpm), None, 0));
        };
        loop {
            match btree_page_type(guard.data()) {
                BTreePageType::Leaf => {
                    let index = BTreeLeafPageRef::new(guard.data()).lower_bound(key);
                    return Ok(BPlusTreeIterator::new(
                        Arc::clone(&self.bpm),
                        Some(guard),
                        index,
                    ));
                }
                BTreePageType::Internal => {
                    let child = BTreeInternalPageRef::new(guard.data()).find_child(key);
                    guard = self.bpm.fetch_page_read(child)?;
                }
                BTreePageType::Invalid => {
                    return Err(TarnError::IndexCorrupted(format!(
                        "unexpected page type on {}",
                        guard.page_id()
                    )));
                }
            }
        }
    }

    /// The exhausted iterator.
    pub fn end(&self) -> BPlusTreeIterator {
        BPlusTreeIterator::new(Arc::clone(&self.bpm), None, 0)
    }

    /// Number of levels in the tree; 0 when empty. Debug utility.
    pub fn height(&self) -> Result<usize> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(0);
        }

        let mut guard = self.bpm.fetch_page_read(root_id)?;
        drop(header_guard);

        let mut height = 1;
        while btree_page_type(guard.data()) == BTreePageType::Internal {
            let child = BTreeInternalPageRef::new(guard.data()).child_at(0);
            guard = self.bpm.fetch_page_read(child)?;
            height += 1;
        }
        Ok(height)
    }

    /// Fetches the root under the header latch, or None when empty. The
    /// header latch is released once the root is latched.
    fn descend_leftmost(&self) -> Result<Option<ReadPageGuard>> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_id = BTreeHeaderPageRef::new(header_guard.data()).root_page_id();
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let guard = self.bpm.fetch_page_read(root_id)?;
        drop(header_guard);
        Ok(Some(guard))
    }
}
