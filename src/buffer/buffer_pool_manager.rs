use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::common::{FrameId, PageId, Result, TarnError, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{AccessType, BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Mapping state protected by the pool mutex. All pin-count transitions
/// happen with this lock held so the replacer never sees a pinned frame
/// as evictable.
struct PoolInner {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames not currently holding any page
    free_list: VecDeque<FrameId>,
}

/// State shared between the buffer pool manager and its page guards.
pub(crate) struct PoolState {
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    inner: Mutex<PoolInner>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
}

impl PoolState {
    /// Returns a guard's pin. When the count reaches zero the frame
    /// becomes an eviction candidate.
    pub(crate) fn release_frame(&self, frame_id: FrameId, is_dirty: bool) {
        let _inner = self.inner.lock();
        let frame = &self.frames[frame_id.as_usize()];
        if is_dirty {
            frame.set_dirty(true);
        }
        if let Some(0) = frame.unpin() {
            self.replacer.set_evictable(frame_id, true);
        }
    }
}

/// BufferPoolManager mediates all page I/O. It owns a fixed set of frames,
/// caches pages fetched from disk, tracks pin counts and dirty bits, and
/// evicts cold pages through the LRU-K replacer. Access to page contents
/// goes through the returned guards, which pin the page for their whole
/// lifetime and optionally hold its latch.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    state: Arc<PoolState>,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value
    /// for LRU-K replacement, and disk manager.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(PoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
            }),
            replacer: LruKReplacer::new(replacer_k, pool_size),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page id, installs it in a zeroed frame and
    /// returns it pinned behind a write guard. The id is only allocated
    /// once a frame has been secured, so an exhausted pool burns no ids.
    pub fn new_page(&self) -> Result<(PageId, WritePageGuard)> {
        let (page_id, frame_id) = self.install_page(None)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);

        let guard = unsafe { WritePageGuard::new(page_id, frame, Arc::clone(&self.state)) };
        Ok((page_id, guard))
    }

    /// Fetches a page and pins it without latching its contents.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(BasicPageGuard::new(page_id, frame, Arc::clone(&self.state)))
    }

    /// Fetches a page for shared read access.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(unsafe { ReadPageGuard::new(page_id, frame, Arc::clone(&self.state)) })
    }

    /// Fetches a page for exclusive write access.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        Ok(unsafe { WritePageGuard::new(page_id, frame, Arc::clone(&self.state)) })
    }

    /// Explicitly decrements a page's pin count, OR-ing in the dirty bit.
    /// Returns false when the page is not resident or not pinned; calling
    /// this after a guard has already released its pin is a no-op.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        if is_dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            None => false,
            Some(0) => {
                self.state.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
        }
    }

    /// Writes a page through to disk and clears its dirty bit. Returns
    /// false when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(TarnError::InvalidPageId(page_id));
        }

        let inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);
        trace!("flushed {}", page_id);

        Ok(true)
    }

    /// Flushes every dirty resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.state.inner.lock();

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk_scheduler.schedule_write_sync(page_id, &data)?;
                frame.set_dirty(false);
            }
        }

        Ok(())
    }

    /// Drops a page from the pool and deallocates it on disk. Refuses
    /// while the page is pinned; returns false when the page is not
    /// resident.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Err(TarnError::PageStillPinned(page_id));
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        self.disk_scheduler
            .disk_manager()
            .deallocate_page(page_id)?;

        Ok(true)
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Brings `page_id` into a frame (reading it from disk) and pins it.
    fn fetch_page(&self, page_id: PageId) -> Result<FrameId> {
        if page_id == INVALID_PAGE_ID {
            return Err(TarnError::InvalidPageId(page_id));
        }
        let (_, frame_id) = self.install_page(Some(page_id))?;
        Ok(frame_id)
    }

    /// Secures a frame and pins a page into it. `fetch` names an existing
    /// page to read from disk; `None` allocates a fresh page id once a
    /// frame is in hand and leaves the frame zeroed.
    fn install_page(&self, fetch: Option<PageId>) -> Result<(PageId, FrameId)> {
        let mut inner = self.state.inner.lock();

        loop {
            if let Some(page_id) = fetch {
                if let Some(&frame_id) = inner.page_table.get(&page_id) {
                    let frame = &self.state.frames[frame_id.as_usize()];
                    frame.pin();
                    self.state
                        .replacer
                        .record_access(frame_id, AccessType::Unknown);
                    self.state.replacer.set_evictable(frame_id, false);
                    return Ok((page_id, frame_id));
                }
            }

            let (frame_id, write_back) = self.claim_frame(&mut inner)?;

            if let Some((old_page_id, data)) = write_back {
                // The victim is unmapped, so nobody can reach it; write it
                // back without holding the pool mutex and re-check the
                // page table afterwards in case of a concurrent fetch.
                drop(inner);
                trace!("evicting {}", old_page_id);
                let result = self.disk_scheduler.schedule_write_sync(old_page_id, &data);
                inner = self.state.inner.lock();
                if let Err(e) = result {
                    inner.free_list.push_back(frame_id);
                    return Err(e);
                }
                if let Some(page_id) = fetch {
                    if inner.page_table.contains_key(&page_id) {
                        inner.free_list.push_back(frame_id);
                        continue;
                    }
                }
            }

            let frame = &self.state.frames[frame_id.as_usize()];

            let page_id = match fetch {
                Some(page_id) => {
                    // Read while the mapping is unpublished but the pool
                    // mutex is held, so a half-filled frame is never
                    // observable.
                    let mut data = [0u8; PAGE_SIZE];
                    if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
                        inner.free_list.push_back(frame_id);
                        return Err(e);
                    }
                    frame.copy_from(&data);
                    page_id
                }
                None => match self.disk_scheduler.disk_manager().allocate_page() {
                    Ok(page_id) => page_id,
                    Err(e) => {
                        inner.free_list.push_back(frame_id);
                        return Err(e);
                    }
                },
            };

            frame.set_page_id(page_id);
            frame.set_dirty(false);
            frame.pin();
            inner.page_table.insert(page_id, frame_id);
            self.state
                .replacer
                .record_access(frame_id, AccessType::Unknown);
            self.state.replacer.set_evictable(frame_id, false);

            return Ok((page_id, frame_id));
        }
    }

    /// Takes a frame from the free list, or evicts one. When the victim is
    /// dirty its page id and contents are returned for write-back; the
    /// victim's mapping is already removed.
    fn claim_frame(
        &self,
        inner: &mut PoolInner,
    ) -> Result<(FrameId, Option<(PageId, [u8; PAGE_SIZE])>)> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok((frame_id, None));
        }

        let Some(frame_id) = self.state.replacer.evict() else {
            return Err(TarnError::BufferPoolFull);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        let write_back = if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            Some((old_page_id, data))
        } else {
            None
        };

        inner.page_table.remove(&old_page_id);
        frame.reset();

        Ok((frame_id, write_back))
    }
}
