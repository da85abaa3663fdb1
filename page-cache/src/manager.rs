//! The buffer pool: frame allocation, page table, read-through, lazy
//! write-back, and deletion.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace, warn};

use common::api::{CacheError, CacheResult, FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};
use common::disk_manager::DiskManager;
use common::page;

use crate::lru_replacer::LruReplacer;
use crate::page_guard::{PageReadGuard, PageWriteGuard};

/// In-memory bookkeeping for one frame. The page bytes themselves live in
/// the parallel buffer array so that pinned borrows do not hold the pool
/// lock.
#[derive(Debug)]
struct FrameMeta {
    page_id: PageId,
    pin_count: u32,
    is_dirty: bool,
}

impl FrameMeta {
    fn empty() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
        }
    }

    fn reset(&mut self) {
        *self = Self::empty();
    }
}

/// Everything guarded by the pool lock: frame metadata, the page table, and
/// the free list.
#[derive(Debug)]
struct PoolInner {
    frames: Vec<FrameMeta>,
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// A fixed-size cache of 4 KiB pages over a [`DiskManager`].
///
/// At most one frame holds any given page. A page stays resident while its
/// pin count is above zero; unpinned frames are eviction candidates in
/// least-recently-used order. Dirty frames are written back when evicted,
/// flushed, or on drop of the pool; `delete_page` is the one path that
/// discards bytes instead.
///
/// Lock order is pool lock, then a frame's buffer lock, then the disk
/// manager. Guards acquire their buffer lock only after the pool lock has
/// been released; the pool itself takes a buffer lock while holding its own
/// lock only for frames with pin count zero, which no guard can be holding.
#[derive(Debug)]
pub struct BufferPoolManager {
    inner: Mutex<PoolInner>,
    buffers: Vec<RwLock<Box<[u8; PAGE_SIZE]>>>,
    replacer: LruReplacer,
    disk_manager: Arc<DiskManager>,
    pool_size: usize,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames, all initially free.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut buffers = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            frames.push(FrameMeta::empty());
            buffers.push(RwLock::new(Box::new([0u8; PAGE_SIZE])));
            free_list.push_back(i as FrameId);
        }
        debug!(pool_size, "buffer pool created");

        Self {
            inner: Mutex::new(PoolInner {
                frames,
                page_table: HashMap::new(),
                free_list,
            }),
            buffers,
            replacer: LruReplacer::new(),
            disk_manager,
            pool_size,
        }
    }

    /// Number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// The disk manager backing this pool.
    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Fetches `page_id` for shared access, reading it from disk on a miss.
    ///
    /// The returned guard holds one pin; dropping it unpins. Fails with
    /// [`CacheError::NoFrameAvailable`] when the page is not resident and
    /// every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> CacheResult<PageReadGuard<'_>> {
        let frame_id = self.pin_page(page_id)?;
        Ok(PageReadGuard::new(self, page_id, frame_id))
    }

    /// Fetches `page_id` for exclusive access, reading it from disk on a
    /// miss.
    ///
    /// Mutating through the guard marks the page dirty. Blocks while other
    /// guards for the same page are alive.
    pub fn fetch_page_mut(&self, page_id: PageId) -> CacheResult<PageWriteGuard<'_>> {
        let frame_id = self.pin_page(page_id)?;
        Ok(PageWriteGuard::new(self, page_id, frame_id))
    }

    /// Allocates a fresh page: zeroed, its id stamped into the header, and
    /// pinned for writing.
    ///
    /// The new page starts clean; it reaches disk only once the caller
    /// dirties it or flushes it explicitly.
    pub fn new_page(&self) -> CacheResult<PageWriteGuard<'_>> {
        let mut inner = self.inner.lock().unwrap();
        let frame_id = self.find_victim(&mut inner)?;
        self.evict_frame(&mut inner, frame_id)?;

        let page_id = self.disk_manager.allocate_page();
        {
            let mut buf = self.buffers[frame_id as usize].write().unwrap();
            buf.fill(0);
            page::stamp_page_id(&mut buf[..], page_id);
        }

        let meta = &mut inner.frames[frame_id as usize];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        trace!(page_id, frame_id, "allocated new page");
        drop(inner);

        Ok(PageWriteGuard::new(self, page_id, frame_id))
    }

    /// Drops one pin on `page_id`, optionally declaring it dirty.
    ///
    /// The dirty bit is sticky: unpinning with `is_dirty = false` never
    /// clears a bit set earlier. Returns `false` when the page is not
    /// resident or its pin count is already zero.
    ///
    /// Guards call this on drop; it is public for callers that manage pins
    /// by hand.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };

        let meta = &mut inner.frames[frame_id as usize];
        if meta.pin_count == 0 {
            return false;
        }
        if is_dirty {
            meta.is_dirty = true;
        }
        meta.pin_count -= 1;
        if meta.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Writes `page_id`'s full 4 KiB to disk and clears its dirty bit.
    ///
    /// The write is unconditional: a clean resident page is written too,
    /// because "the caller declared it dirty at some point" is the contract.
    /// Returns `Ok(false)` when the page is not resident.
    ///
    /// The flush takes a shared borrow of the page bytes, so a caller still
    /// holding a write guard on this page must drop it first.
    pub fn flush_page(&self, page_id: PageId) -> CacheResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };

        if inner.frames[frame_id as usize].pin_count == 0 {
            // No guard can hold this buffer, and none can appear while the
            // pool lock is held, so the borrow cannot block. The frame's
            // replacer position is left alone.
            let result = {
                let buf = self.buffers[frame_id as usize].read().unwrap();
                self.disk_manager.write_page(page_id, &buf[..])
            };
            result?;
            inner.frames[frame_id as usize].is_dirty = false;
            trace!(page_id, frame_id, "flushed page");
            return Ok(true);
        }

        // Pinned: a guard may be holding the buffer lock, so waiting for it
        // under the pool lock would deadlock against the guard's own unpin.
        // Hold a pin of our own and clear the dirty bit optimistically; a
        // writer that dirties the page after our snapshot re-sets the bit
        // when it unpins.
        inner.frames[frame_id as usize].pin_count += 1;
        inner.frames[frame_id as usize].is_dirty = false;
        drop(inner);

        let result = {
            let buf = self.buffers[frame_id as usize].read().unwrap();
            self.disk_manager.write_page(page_id, &buf[..])
        };

        let mut inner = self.inner.lock().unwrap();
        let meta = &mut inner.frames[frame_id as usize];
        if result.is_err() {
            meta.is_dirty = true;
        }
        meta.pin_count -= 1;
        if meta.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        result?;
        trace!(page_id, frame_id, "flushed page");
        Ok(true)
    }

    /// Writes every dirty resident page and clears its flag.
    pub fn flush_all_pages(&self) -> CacheResult<()> {
        let dirty: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner
                .page_table
                .iter()
                .filter(|&(_, &frame_id)| inner.frames[frame_id as usize].is_dirty)
                .map(|(&page_id, _)| page_id)
                .collect()
        };

        for page_id in dirty {
            // A page evicted since the snapshot was written back by the
            // eviction itself; `flush_page` then reports non-resident.
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Evicts `page_id` without writing it back, discarding its in-memory
    /// bytes. The on-disk copy, if any, is left untouched.
    ///
    /// Returns `true` when the page is no longer resident afterwards (a
    /// non-resident page trivially qualifies) and `false` when an active
    /// pin blocks the delete.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return true;
        };
        if inner.frames[frame_id as usize].pin_count > 0 {
            return false;
        }

        self.replacer.pin(frame_id);
        inner.page_table.remove(&page_id);
        self.buffers[frame_id as usize].write().unwrap().fill(0);
        inner.frames[frame_id as usize].reset();
        inner.free_list.push_back(frame_id);
        trace!(page_id, frame_id, "deleted page from cache");
        true
    }

    /// Pin count currently recorded for `page_id`, or `None` when the page
    /// is not resident. Read-only observability for guards and tests.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.inner.lock().unwrap();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| inner.frames[frame_id as usize].pin_count)
    }

    /// Number of frames on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.inner.lock().unwrap().free_list.len()
    }

    /// Number of resident pages.
    pub fn resident_page_count(&self) -> usize {
        self.inner.lock().unwrap().page_table.len()
    }

    pub(crate) fn buffer(&self, frame_id: FrameId) -> &RwLock<Box<[u8; PAGE_SIZE]>> {
        &self.buffers[frame_id as usize]
    }

    /// Pins `page_id` into a frame, reading it from disk on a miss, and
    /// returns the frame id with the pin count already incremented.
    fn pin_page(&self, page_id: PageId) -> CacheResult<FrameId> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            inner.frames[frame_id as usize].pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.find_victim(&mut inner)?;
        self.evict_frame(&mut inner, frame_id)?;

        let read_result = {
            let mut buf = self.buffers[frame_id as usize].write().unwrap();
            buf.fill(0);
            self.disk_manager
                .read_page(page_id, &mut buf[..])
                .map(|()| page::stamp_page_id(&mut buf[..], page_id))
        };
        if let Err(err) = read_result {
            // The frame was already disconnected from its old page; park it
            // on the free list so the partition invariant holds.
            inner.frames[frame_id as usize].reset();
            inner.free_list.push_back(frame_id);
            return Err(err.into());
        }

        let meta = &mut inner.frames[frame_id as usize];
        meta.page_id = page_id;
        meta.pin_count = 1;
        meta.is_dirty = false;
        inner.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        trace!(page_id, frame_id, "read page into frame");
        Ok(frame_id)
    }

    /// A free-list frame first, the LRU victim second. Write-back is the
    /// caller's job: only the caller knows whether a page-table erase must
    /// follow.
    fn find_victim(&self, inner: &mut PoolInner) -> CacheResult<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }
        self.replacer.victim().ok_or(CacheError::NoFrameAvailable)
    }

    /// Writes back the victim's bytes when dirty and drops its page-table
    /// entry, leaving the frame ready for reuse. No-op for frames that came
    /// off the free list.
    fn evict_frame(&self, inner: &mut PoolInner, frame_id: FrameId) -> CacheResult<()> {
        let meta = &inner.frames[frame_id as usize];
        let old_page_id = meta.page_id;
        if old_page_id == INVALID_PAGE_ID {
            return Ok(());
        }

        if meta.is_dirty {
            // The victim has pin count zero, so no guard holds this buffer.
            let buf = self.buffers[frame_id as usize].read().unwrap();
            if let Err(err) = self.disk_manager.write_page(old_page_id, &buf[..]) {
                self.replacer.unpin(frame_id);
                return Err(err.into());
            }
            debug!(page_id = old_page_id, frame_id, "wrote back dirty page on eviction");
        }

        inner.frames[frame_id as usize].is_dirty = false;
        inner.page_table.remove(&old_page_id);
        Ok(())
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(err) = self.flush_all_pages() {
            warn!(%err, "failed to flush dirty pages on shutdown");
        }
    }
}
