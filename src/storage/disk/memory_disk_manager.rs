use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, StratumError, PAGE_SIZE};

use super::DiskManager;

/// In-memory page store, for tests and scratch indexes.
#[derive(Default)]
pub struct MemoryDiskManager {
    pages: Mutex<HashMap<PageId, Box<[u8; PAGE_SIZE]>>>,
    num_pages: AtomicU32,
    num_writes: AtomicU32,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Whether `page_id` currently has stored contents.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.lock().contains_key(&page_id)
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        match self.pages.lock().get(&page_id) {
            Some(page) => data.copy_from_slice(&page[..]),
            None => data.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");

        let mut page = Box::new([0u8; PAGE_SIZE]);
        page.copy_from_slice(data);
        self.pages.lock().insert(page_id, page);

        self.num_pages
            .fetch_max(page_id.as_u32() + 1, Ordering::SeqCst);
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }
        self.pages.lock().remove(&page_id);
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip_and_deallocate() {
        let dm = MemoryDiskManager::new();
        let mut data = [0u8; PAGE_SIZE];
        data[10] = 99;
        dm.write_page(PageId::new(2), &data).unwrap();
        assert_eq!(dm.num_pages(), 3);

        let mut out = [0u8; PAGE_SIZE];
        dm.read_page(PageId::new(2), &mut out).unwrap();
        assert_eq!(out[10], 99);

        dm.deallocate_page(PageId::new(2)).unwrap();
        assert!(!dm.contains(PageId::new(2)));
        dm.read_page(PageId::new(2), &mut out).unwrap();
        assert_eq!(out[10], 0);
    }
}
