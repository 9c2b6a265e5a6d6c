//! Integration tests for the buffer pool manager

use std::sync::Arc;
use std::thread;

use stratum::buffer::BufferPoolManager;
use stratum::common::{PageId, StratumError, INVALID_PAGE_ID, PAGE_SIZE};
use stratum::storage::disk::{FileDiskManager, MemoryDiskManager};
use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
    let bpm = BufferPoolManager::new(pool_size, 2, dm);
    (bpm, temp_file)
}

#[test]
fn test_buffer_pool_basic_operations() {
    let (bpm, _temp) = create_bpm(10);

    let page_id = bpm.new_page().unwrap();
    assert_eq!(page_id, PageId::new(0));
    assert_eq!(bpm.get_pin_count(page_id), Some(1));
    assert!(bpm.unpin_page(page_id, false));

    {
        let mut guard = bpm.fetch_page_write(page_id).unwrap();
        guard.data_mut()[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    {
        let guard = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(&guard.data()[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }
    assert_eq!(bpm.get_pin_count(page_id), Some(0));
}

#[test]
fn test_buffer_pool_full_until_unpinned() {
    let bpm = BufferPoolManager::new(2, 2, Arc::new(MemoryDiskManager::new()));

    let a = bpm.new_page().unwrap();
    let b = bpm.new_page().unwrap();
    assert!(matches!(bpm.new_page(), Err(StratumError::BufferPoolFull)));
    assert!(matches!(
        bpm.fetch_page(PageId::new(40)),
        Err(StratumError::BufferPoolFull)
    ));

    assert!(bpm.unpin_page(a, true));
    let c = bpm.new_page().unwrap();
    // Failed allocations did not use up ids
    assert_eq!(c, PageId::new(2));
    assert!(!bpm.is_resident(a));
    assert!(bpm.is_resident(b));
    assert!(bpm.is_resident(c));

    // Unpinning more than pinned is refused
    assert!(bpm.unpin_page(b, false));
    assert!(!bpm.unpin_page(b, false));
}

#[test]
fn test_buffer_pool_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_id;
    let test_data = b"Persistence test data";

    {
        let dm = Arc::new(FileDiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
        page_id = guard.page_id();
        guard.data_mut()[..test_data.len()].copy_from_slice(test_data);
        drop(guard);

        assert!(bpm.flush_page(page_id).unwrap());
    }

    {
        let dm = Arc::new(FileDiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        let guard = bpm.fetch_page_read(page_id).unwrap();
        assert_eq!(&guard.data()[..test_data.len()], test_data);
    }
}

#[test]
fn test_buffer_pool_flush_requires_valid_resident_page() {
    let (bpm, _temp) = create_bpm(4);

    assert!(!bpm.flush_page(INVALID_PAGE_ID).unwrap());
    assert!(!bpm.flush_page(PageId::new(3)).unwrap());
    assert!(matches!(
        bpm.fetch_page(INVALID_PAGE_ID),
        Err(StratumError::InvalidPageId(_))
    ));
}

#[test]
fn test_buffer_pool_eviction() {
    let (bpm, _temp) = create_bpm(3);

    let mut page_ids = Vec::new();
    for i in 0..3 {
        let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
        guard.data_mut()[0] = i as u8;
        page_ids.push(guard.page_id());
    }

    for &pid in &page_ids {
        assert_eq!(bpm.get_pin_count(pid), Some(0));
    }
    assert_eq!(bpm.evictable_count(), 3);

    // Pool is full of unpinned pages: one of them goes
    let new_pid = bpm.new_page().unwrap();
    assert_eq!(new_pid, PageId::new(3));
    bpm.unpin_page(new_pid, false);

    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.data()[0], i as u8);
    }
}

#[test]
fn test_buffer_pool_delete_page() {
    let (bpm, _temp) = create_bpm(10);

    let pid = {
        let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
        guard.data_mut()[0] = 42;
        guard.page_id()
    };

    let free_before = bpm.free_frame_count();
    assert!(bpm.delete_page(pid).unwrap());
    assert_eq!(bpm.get_pin_count(pid), None);
    assert_eq!(bpm.free_frame_count(), free_before + 1);

    // Deleting a page that is not resident succeeds trivially
    assert!(bpm.delete_page(pid).unwrap());
}

#[test]
fn test_buffer_pool_cannot_delete_pinned_page() {
    let (bpm, _temp) = create_bpm(10);

    let guard = bpm.new_page_guarded().unwrap().upgrade_read();
    let pid = guard.page_id();

    assert!(!bpm.delete_page(pid).unwrap());
    drop(guard);
    assert!(bpm.delete_page(pid).unwrap());
}

#[test]
fn test_buffer_pool_flush_all() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let page_ids;

    {
        let dm = Arc::new(FileDiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        page_ids = (0..5)
            .map(|i| {
                let mut guard = bpm.new_page_guarded().unwrap().upgrade_write();
                guard.data_mut()[0] = i as u8;
                guard.page_id()
            })
            .collect::<Vec<_>>();

        bpm.flush_all_pages().unwrap();
    }

    {
        let dm = Arc::new(FileDiskManager::new(&path).unwrap());
        let bpm = BufferPoolManager::new(10, 2, dm);

        for (i, &pid) in page_ids.iter().enumerate() {
            let guard = bpm.fetch_page_read(pid).unwrap();
            assert_eq!(guard.data()[0], i as u8);
        }
    }
}

#[test]
fn test_buffer_pool_concurrent_access() {
    let (bpm, _temp) = create_bpm(10);
    let bpm = Arc::new(bpm);

    let page_id = bpm.new_page_guarded().unwrap().page_id();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = bpm.fetch_page_read(page_id).unwrap();
                    let _ = guard.data()[0];
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(bpm.get_pin_count(page_id), Some(0));
}

#[test]
fn test_buffer_pool_concurrent_writers_with_eviction() {
    let (bpm, _temp) = create_bpm(4);
    let bpm = Arc::new(bpm);

    let page_ids: Vec<PageId> = (0..16)
        .map(|_| bpm.new_page_guarded().unwrap().page_id())
        .collect();

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let bpm = Arc::clone(&bpm);
            let page_ids = page_ids.clone();
            thread::spawn(move || {
                for round in 0..50u32 {
                    let pid = page_ids[((t * 7 + round) % 16) as usize];
                    loop {
                        match bpm.fetch_page_write(pid) {
                            Ok(mut guard) => {
                                let slot = (t as usize) * 4;
                                let count = u32::from_le_bytes(
                                    guard.data()[slot..slot + 4].try_into().unwrap(),
                                );
                                guard.data_mut()[slot..slot + 4]
                                    .copy_from_slice(&(count + 1).to_le_bytes());
                                break;
                            }
                            Err(e) if e.is_transient() => thread::yield_now(),
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Every increment survived however many evictions happened in between
    let mut totals = [0u32; 4];
    for &pid in &page_ids {
        let guard = bpm.fetch_page_read(pid).unwrap();
        for (t, total) in totals.iter_mut().enumerate() {
            let slot = t * 4;
            *total += u32::from_le_bytes(guard.data()[slot..slot + 4].try_into().unwrap());
        }
    }
    assert_eq!(totals, [50; 4]);
}

#[test]
fn test_buffer_pool_large_workload() {
    let (bpm, _temp) = create_bpm(5);

    let page_ids: Vec<_> = (0..20)
        .map(|_| bpm.new_page_guarded().unwrap().page_id())
        .collect();

    for &pid in &page_ids {
        let mut guard = bpm.fetch_page_write(pid).unwrap();
        guard.data_mut()[..4].copy_from_slice(&pid.as_u32().to_le_bytes());
        guard.data_mut()[PAGE_SIZE - 1] = 0x7F;
    }

    for &pid in &page_ids {
        let guard = bpm.fetch_page_read(pid).unwrap();
        let id_bytes: [u8; 4] = guard.data()[..4].try_into().unwrap();
        assert_eq!(u32::from_le_bytes(id_bytes), pid.as_u32());
        assert_eq!(guard.data()[PAGE_SIZE - 1], 0x7F);
    }
}
