//! Scoped page borrows that unpin on drop.
//!
//! Guards are the only way page bytes leave the pool. A guard keeps its page
//! pinned for as long as it lives, so the frame cannot be evicted or
//! remapped under the caller; dropping the guard is the unpin. The write
//! flavor records mutation and reports the page dirty at unpin time.

use std::ops::{Deref, DerefMut};
use std::sync::{RwLockReadGuard, RwLockWriteGuard};

use common::api::{FrameId, PageId, PAGE_SIZE};
use common::page::{self, PageHeader};

use crate::manager::BufferPoolManager;

/// Shared borrow of a resident page.
///
/// Dereferences to the payload bytes (everything after the 16-byte header).
/// Several read guards for the same page may be alive at once.
pub struct PageReadGuard<'a> {
    pool: &'a BufferPoolManager,
    page_id: PageId,
    data: RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, page_id: PageId, frame_id: FrameId) -> Self {
        let data = pool.buffer(frame_id).read().unwrap();
        Self {
            pool,
            page_id,
            data,
        }
    }

    /// Identifier of the borrowed page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Decoded copy of the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::decode(&self.data[..])
    }

    /// Pin count currently recorded for this page. At least 1 while the
    /// guard is alive.
    pub fn pin_count(&self) -> u32 {
        self.pool.pin_count(self.page_id).unwrap_or(0)
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        page::payload(&self.data[..])
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, false);
    }
}

/// Exclusive borrow of a resident page.
///
/// Dereferences to the payload bytes. Any mutable access marks the page
/// dirty; the drop-time unpin carries that flag to the pool.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPoolManager,
    page_id: PageId,
    is_dirty: bool,
    data: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, page_id: PageId, frame_id: FrameId) -> Self {
        let data = pool.buffer(frame_id).write().unwrap();
        Self {
            pool,
            page_id,
            is_dirty: false,
            data,
        }
    }

    /// Identifier of the borrowed page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Decoded copy of the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::decode(&self.data[..])
    }

    /// Rewrites the domain fields of the header (version, key count, leaf
    /// flag). The page-id field stays under cache control: whatever
    /// `header.page_id` says, the borrowed page's own id is stamped.
    pub fn write_header(&mut self, mut header: PageHeader) {
        header.page_id = self.page_id;
        header.encode(&mut self.data[..]);
        self.is_dirty = true;
    }

    /// Pin count currently recorded for this page. At least 1 while the
    /// guard is alive.
    pub fn pin_count(&self) -> u32 {
        self.pool.pin_count(self.page_id).unwrap_or(0)
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        page::payload(&self.data[..])
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        page::payload_mut(&mut self.data[..])
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.is_dirty);
    }
}
