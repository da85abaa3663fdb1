use std::fs;
use std::sync::Arc;

use common::api::PAGE_SIZE;
use common::disk_manager::DiskManager;

#[test]
fn allocate_is_monotonic_from_zero() {
    let dir = tempfile::tempdir().unwrap();
    let disk_manager = DiskManager::new(dir.path().join("test.db")).unwrap();

    assert_eq!(disk_manager.allocate_page(), 0);
    assert_eq!(disk_manager.allocate_page(), 1);
    assert_eq!(disk_manager.allocate_page(), 2);
}

#[test]
fn read_returns_written_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let disk_manager = Arc::new(DiskManager::new(dir.path().join("test.db")).unwrap());
    let page_id = disk_manager.allocate_page();

    let mut data = [0u8; PAGE_SIZE];
    for (i, byte) in data.iter_mut().enumerate() {
        *byte = i as u8;
    }
    disk_manager.write_page(page_id, &data).unwrap();

    let mut read_back = [0u8; PAGE_SIZE];
    disk_manager.read_page(page_id, &mut read_back).unwrap();
    assert_eq!(data, read_back);
}

#[test]
fn read_past_end_of_file_is_zero_filled() {
    let dir = tempfile::tempdir().unwrap();
    let disk_manager = DiskManager::new(dir.path().join("test.db")).unwrap();

    // Nothing written yet; leave garbage in the buffer to prove it is
    // overwritten.
    let mut buf = [0xFFu8; PAGE_SIZE];
    disk_manager.read_page(7, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));

    // After writing page 0, reads beyond the file end still come back
    // zeroed.
    disk_manager.write_page(0, &[1u8; PAGE_SIZE]).unwrap();
    let mut buf = [0xFFu8; PAGE_SIZE];
    disk_manager.read_page(5, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn write_extends_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let disk_manager = DiskManager::new(&path).unwrap();

    disk_manager.write_page(2, &[9u8; PAGE_SIZE]).unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 3 * PAGE_SIZE as u64);
}

#[test]
fn num_flushes_counts_every_write() {
    let dir = tempfile::tempdir().unwrap();
    let disk_manager = DiskManager::new(dir.path().join("test.db")).unwrap();
    assert_eq!(disk_manager.num_flushes(), 0);

    let data = [0u8; PAGE_SIZE];
    disk_manager.write_page(0, &data).unwrap();
    disk_manager.write_page(0, &data).unwrap();
    disk_manager.write_page(1, &data).unwrap();
    assert_eq!(disk_manager.num_flushes(), 3);
}

#[test]
fn reopen_resumes_allocation_after_existing_pages() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let disk_manager = DiskManager::new(&path).unwrap();
        assert_eq!(disk_manager.allocate_page(), 0);
        assert_eq!(disk_manager.allocate_page(), 1);
        disk_manager.write_page(0, &[1u8; PAGE_SIZE]).unwrap();
        disk_manager.write_page(1, &[2u8; PAGE_SIZE]).unwrap();
    }

    // The counter restarts from the file length, so ids 0 and 1 are never
    // reissued over live data.
    let disk_manager = DiskManager::new(&path).unwrap();
    assert_eq!(disk_manager.allocate_page(), 2);
}
