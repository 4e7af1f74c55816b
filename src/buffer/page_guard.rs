use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolState;
use super::FrameHeader;

/// Shared guts of the three guard flavors: the pin, the frame identity and
/// the dirty flag accumulated while the guard was live. Releasing is
/// idempotent so an explicit `drop_guard` followed by `Drop` is safe.
struct PageGuardCore {
    /// The page ID being guarded
    page_id: PageId,
    /// The frame holding the page, kept alive for the guard's lifetime
    frame: Arc<FrameHeader>,
    /// Pool state used to give the pin back
    state: Arc<PoolState>,
    /// Whether this guard dirtied the page
    is_dirty: bool,
    /// Whether the pin has already been returned
    released: bool,
}

impl PageGuardCore {
    fn new(page_id: PageId, frame: Arc<FrameHeader>, state: Arc<PoolState>) -> Self {
        Self {
            page_id,
            frame,
            state,
            is_dirty: false,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.state
                .release_frame(self.frame.frame_id(), self.is_dirty);
        }
    }
}

/// Guard that holds a pin on a page without latching its contents. Keeps
/// the page resident; reading or writing the bytes requires a read or
/// write guard instead.
pub struct BasicPageGuard {
    core: PageGuardCore,
}

impl BasicPageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, state: Arc<PoolState>) -> Self {
        Self {
            core: PageGuardCore::new(page_id, frame, state),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    /// Drops this guard, unpinning the page.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.core.release();
    }
}

/// RAII guard for read access to a page. Holds the page read latch and a
/// pin; both are released exactly once when the guard is dropped.
pub struct ReadPageGuard {
    core: PageGuardCore,
    /// Read latch on the page data; dropped before the pin is returned
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    /// Blocks until the page read latch is available.
    ///
    /// # Safety
    /// The `'static` lifetime is a lie told to the borrow checker: the
    /// latch guard borrows from the frame, which the core keeps alive via
    /// `Arc` for at least as long as the latch guard exists.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        state: Arc<PoolState>,
    ) -> Self {
        let data_guard = frame.data.read();
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            core: PageGuardCore::new(page_id, frame, state),
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().expect("guard already released")[..]
    }

    /// Drops this guard, releasing latch and pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        self.data_guard.take();
        self.core.release();
    }
}

/// RAII guard for exclusive access to a page. Holds the page write latch
/// and a pin; marks the page dirty on first mutable access.
pub struct WritePageGuard {
    core: PageGuardCore,
    /// Write latch on the page data; dropped before the pin is returned
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    /// Blocks until the page write latch is available.
    ///
    /// # Safety
    /// Same lifetime argument as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        state: Arc<PoolState>,
    ) -> Self {
        let data_guard = frame.data.write();
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            core: PageGuardCore::new(page_id, frame, state),
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.core.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().expect("guard already released")[..]
    }

    /// Mutable view of the page bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.core.is_dirty = true;
        &mut self.data_guard.as_mut().expect("guard already released")[..]
    }

    /// Drops this guard, releasing latch and pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // The latch must go before the pin so a waiting writer never sees
        // a latched but unpinned page.
        self.data_guard.take();
        self.core.release();
    }
}
