//! On-page header layout.
//!
//! Every 4 KiB page starts with a fixed 16-byte header followed by the
//! payload. The cache owns the page-id field of the header; the remaining
//! fields (version, key count, leaf flag) belong to the index layers above
//! and ride along as opaque bytes through every read and write.

use crate::api::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// Size of the on-page header in bytes. The payload starts at this offset.
pub const PAGE_HEADER_SIZE: usize = 16;

/// Bytes available to the payload of a single page.
pub const PAGE_PAYLOAD_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Decoded form of the fixed page header.
///
/// On-disk layout (little-endian): bytes 0..4 page id, 4..8 version,
/// 8..12 key count, byte 12 leaf flag, 13..16 reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_id: PageId,
    pub version: u32,
    pub key_count: u32,
    pub is_leaf: bool,
}

impl Default for PageHeader {
    fn default() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            version: 0,
            key_count: 0,
            is_leaf: false,
        }
    }
}

impl PageHeader {
    /// Decodes the header from the start of a raw page.
    pub fn decode(page: &[u8]) -> Self {
        Self {
            page_id: PageId::from_le_bytes(page[0..4].try_into().unwrap()),
            version: u32::from_le_bytes(page[4..8].try_into().unwrap()),
            key_count: u32::from_le_bytes(page[8..12].try_into().unwrap()),
            is_leaf: page[12] != 0,
        }
    }

    /// Encodes the header into the start of a raw page. Reserved bytes are
    /// zeroed.
    pub fn encode(&self, page: &mut [u8]) {
        page[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        page[4..8].copy_from_slice(&self.version.to_le_bytes());
        page[8..12].copy_from_slice(&self.key_count.to_le_bytes());
        page[12] = self.is_leaf as u8;
        page[13..PAGE_HEADER_SIZE].fill(0);
    }
}

/// Reads the page-id field without decoding the rest of the header.
pub fn read_page_id(page: &[u8]) -> PageId {
    PageId::from_le_bytes(page[0..4].try_into().unwrap())
}

/// Stamps the page-id field, leaving the other header fields untouched.
pub fn stamp_page_id(page: &mut [u8], page_id: PageId) {
    page[0..4].copy_from_slice(&page_id.to_le_bytes());
}

/// The payload bytes of a raw page.
pub fn payload(page: &[u8]) -> &[u8] {
    &page[PAGE_HEADER_SIZE..]
}

/// The payload bytes of a raw page, mutably.
pub fn payload_mut(page: &mut [u8]) -> &mut [u8] {
    &mut page[PAGE_HEADER_SIZE..]
}
