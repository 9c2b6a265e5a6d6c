//! Integration tests for the disk managers and scheduler

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use stratum::common::{PageId, StratumError, INVALID_PAGE_ID, PAGE_SIZE};
use stratum::storage::disk::{DiskManager, DiskScheduler, FileDiskManager, MemoryDiskManager};
use tempfile::NamedTempFile;

fn page_with(first: u8) -> [u8; PAGE_SIZE] {
    let mut data = [0u8; PAGE_SIZE];
    data[0] = first;
    data
}

#[test]
fn test_disk_manager_create_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = FileDiskManager::new(temp_file.path()).unwrap();

    assert_eq!(dm.num_pages(), 0);
    assert_eq!(dm.get_num_reads(), 0);
    assert_eq!(dm.get_num_writes(), 0);
}

#[test]
fn test_disk_manager_read_write_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = FileDiskManager::new(temp_file.path()).unwrap();

    let mut write_data = [0u8; PAGE_SIZE];
    for (i, byte) in write_data.iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }
    dm.write_page(PageId::new(0), &write_data).unwrap();

    let mut read_data = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(0), &mut read_data).unwrap();

    assert_eq!(write_data, read_data);
    assert_eq!(dm.num_pages(), 1);
}

#[test]
fn test_disk_manager_unwritten_page_reads_zero() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = FileDiskManager::new(temp_file.path()).unwrap();
    dm.write_page(PageId::new(1), &page_with(7)).unwrap();

    let mut data = [0xFFu8; PAGE_SIZE];
    dm.read_page(PageId::new(0), &mut data).unwrap();
    assert!(data.iter().all(|&b| b == 0));

    dm.read_page(PageId::new(9), &mut data).unwrap();
    assert!(data.iter().all(|&b| b == 0));
}

#[test]
fn test_disk_manager_rejects_invalid_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = FileDiskManager::new(temp_file.path()).unwrap();

    let mut data = [0u8; PAGE_SIZE];
    assert!(matches!(
        dm.read_page(INVALID_PAGE_ID, &mut data),
        Err(StratumError::InvalidPageId(_))
    ));
    assert!(matches!(
        dm.write_page(INVALID_PAGE_ID, &data),
        Err(StratumError::InvalidPageId(_))
    ));
}

#[test]
fn test_disk_manager_random_access() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = FileDiskManager::new(temp_file.path()).unwrap();

    let write_order = [5u32, 2, 8, 0, 7, 3, 9, 1, 6, 4];
    for &i in &write_order {
        dm.write_page(PageId::new(i), &page_with(i as u8)).unwrap();
    }

    for i in 0..10u32 {
        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(i), &mut data).unwrap();
        assert_eq!(data[0], i as u8);
    }
    assert_eq!(dm.num_pages(), 10);
}

#[test]
fn test_disk_manager_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let test_data = b"Persistence test";

    {
        let dm = FileDiskManager::new(&path).unwrap();
        let mut data = [0u8; PAGE_SIZE];
        data[..test_data.len()].copy_from_slice(test_data);
        dm.write_page(PageId::new(1), &data).unwrap();
        dm.sync().unwrap();
    }

    {
        let dm = FileDiskManager::new(&path).unwrap();
        assert_eq!(dm.num_pages(), 2);

        let mut data = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(1), &mut data).unwrap();
        assert_eq!(&data[..test_data.len()], test_data);
    }
}

#[test]
fn test_disk_manager_io_stats() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = FileDiskManager::new(temp_file.path()).unwrap();

    dm.write_page(PageId::new(0), &[0u8; PAGE_SIZE]).unwrap();
    dm.write_page(PageId::new(0), &[1u8; PAGE_SIZE]).unwrap();
    assert_eq!(dm.get_num_writes(), 2);

    let mut read_data = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(0), &mut read_data).unwrap();
    assert_eq!(dm.get_num_reads(), 1);
}

#[test]
fn test_memory_disk_manager() {
    let dm = MemoryDiskManager::new();
    dm.write_page(PageId::new(3), &page_with(3)).unwrap();
    assert!(dm.contains(PageId::new(3)));
    assert_eq!(dm.num_pages(), 4);

    let mut data = [0u8; PAGE_SIZE];
    dm.read_page(PageId::new(3), &mut data).unwrap();
    assert_eq!(data[0], 3);

    dm.deallocate_page(PageId::new(3)).unwrap();
    assert!(!dm.contains(PageId::new(3)));
    dm.read_page(PageId::new(3), &mut data).unwrap();
    assert_eq!(data[0], 0);
}

#[test]
fn test_disk_scheduler_basic() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
    let scheduler = DiskScheduler::new(dm);

    scheduler
        .write_sync(PageId::new(0), Bytes::copy_from_slice(&page_with(42)))
        .unwrap();

    let read_data = scheduler.read_sync(PageId::new(0)).unwrap();
    assert_eq!(read_data.len(), PAGE_SIZE);
    assert_eq!(read_data[0], 42);
    assert_eq!(scheduler.disk_manager().num_pages(), 1);
}

#[test]
fn test_disk_scheduler_propagates_errors() {
    let scheduler = DiskScheduler::new(Arc::new(MemoryDiskManager::new()));

    assert!(matches!(
        scheduler.read_sync(INVALID_PAGE_ID),
        Err(StratumError::InvalidPageId(_))
    ));
    // The worker keeps serving after a failed request
    scheduler
        .write_sync(PageId::new(0), Bytes::copy_from_slice(&page_with(1)))
        .unwrap();
    assert_eq!(scheduler.read_sync(PageId::new(0)).unwrap()[0], 1);
}

#[test]
fn test_disk_scheduler_concurrent_requests() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
    let scheduler = Arc::new(DiskScheduler::new(dm));

    let handles: Vec<_> = (0..10u32)
        .map(|i| {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                let data = Bytes::copy_from_slice(&page_with(i as u8 + 1));
                scheduler.write_sync(PageId::new(i), data).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..10u32 {
        let data = scheduler.read_sync(PageId::new(i)).unwrap();
        assert_eq!(data[0], i as u8 + 1);
    }
}
