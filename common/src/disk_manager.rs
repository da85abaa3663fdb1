//! Page-granular I/O over the single backing file.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::api::{CacheResult, PageId, PAGE_SIZE};

const OPEN_RETRIES: u32 = 10;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Reads and writes 4 KiB pages at offset `page_id * PAGE_SIZE` in a single
/// backing file, and hands out page identifiers.
///
/// Reads at or past the end of the file come back zero-filled; writes extend
/// the file as needed and flush the userspace buffer before returning. All
/// operations serialize on one internal lock, so a seek paired with its read
/// or write is atomic relative to other disk manager calls.
#[derive(Debug)]
pub struct DiskManager {
    state: Mutex<DiskState>,
}

#[derive(Debug)]
struct DiskState {
    file: File,
    next_page_id: PageId,
    num_flushes: usize,
}

impl DiskManager {
    /// Opens the backing file, creating it if absent.
    ///
    /// The allocation counter resumes from the current file length, so a
    /// reopened store never re-issues an identifier that already has bytes
    /// on disk.
    pub fn new(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        let file = open_backing_file(path)?;
        let next_page_id = (file.metadata()?.len() / PAGE_SIZE as u64) as PageId;
        debug!(path = %path.display(), next_page_id, "opened backing file");

        Ok(Self {
            state: Mutex::new(DiskState {
                file,
                next_page_id,
                num_flushes: 0,
            }),
        })
    }

    /// Reads one page into `buf`.
    ///
    /// A read at or past end-of-file fills `buf` with zeros; a read that
    /// straddles end-of-file zero-fills the tail.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        let mut state = self.state.lock().unwrap();

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let file_len = state.file.seek(SeekFrom::End(0))?;
        if offset >= file_len {
            buf.fill(0);
            return Ok(());
        }

        state.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            match state.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    /// Writes one page from `buf`, extending the file if necessary, then
    /// flushes the file's userspace buffer.
    pub fn write_page(&self, page_id: PageId, buf: &[u8]) -> io::Result<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        let mut state = self.state.lock().unwrap();

        let offset = page_id as u64 * PAGE_SIZE as u64;
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(buf)?;
        state.file.flush()?;
        state.num_flushes += 1;
        Ok(())
    }

    /// Returns the next page identifier. Identifiers are never reused.
    pub fn allocate_page(&self) -> PageId {
        let mut state = self.state.lock().unwrap();
        let page_id = state.next_page_id;
        state.next_page_id += 1;
        page_id
    }

    /// Total successful `write_page` calls since this manager was opened.
    pub fn num_flushes(&self) -> usize {
        self.state.lock().unwrap().num_flushes
    }
}

/// An existing file can be transiently locked by a process that is still
/// closing it; retry briefly before giving up. A missing file is created
/// immediately.
fn open_backing_file(path: &Path) -> io::Result<File> {
    let mut attempts = OPEN_RETRIES;
    loop {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
        {
            Ok(file) => return Ok(file),
            Err(err) if attempts > 0 && path.exists() => {
                warn!(path = %path.display(), %err, "failed to open backing file, retrying");
                attempts -= 1;
                thread::sleep(OPEN_RETRY_DELAY);
            }
            Err(err) => return Err(err),
        }
    }
}
