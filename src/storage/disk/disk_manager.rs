use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, StratumError, PAGE_SIZE};

/// Page-granular persistent storage.
///
/// Page ids are dense offsets: page `n` lives at byte `n * PAGE_SIZE`. Reading a
/// page that was never written yields zeros.
pub trait DiskManager: Send + Sync {
    /// Fills `data` (exactly PAGE_SIZE bytes) with the contents of `page_id`.
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()>;

    /// Persists `data` (exactly PAGE_SIZE bytes) as the contents of `page_id`.
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Releases a page id. Space is not reclaimed.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;

    /// Number of page slots backed by storage. New page ids are handed out above this.
    fn num_pages(&self) -> u32;
}

fn check_page(page_id: PageId, len: usize) -> Result<()> {
    if !page_id.is_valid() {
        return Err(StratumError::InvalidPageId(page_id));
    }
    assert_eq!(len, PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
    Ok(())
}

/// FileDiskManager stores every page in a single database file.
pub struct FileDiskManager {
    /// The database file
    db_file: Mutex<File>,
    /// Path to the database file
    db_path: String,
    /// Highest page slot written so far (plus one)
    num_pages: AtomicU32,
    /// Number of disk reads performed
    num_reads: AtomicU32,
    /// Number of disk writes performed
    num_writes: AtomicU32,
}

impl FileDiskManager {
    /// Opens (creating if missing) the database file at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path_str = db_path.as_ref().to_string_lossy().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();
        let num_pages = file_size.div_ceil(PAGE_SIZE as u64) as u32;

        Ok(Self {
            db_file: Mutex::new(file),
            db_path: path_str,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        })
    }

    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.db_file.lock().sync_all()?;
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        check_page(page_id, data.len())?;
        let offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;

        // Short reads past the end of the file are zero-filled
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data[filled..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        check_page(page_id, data.len())?;
        let offset = (page_id.as_u32() as u64) * (PAGE_SIZE as u64);

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_pages
            .fetch_max(page_id.as_u32() + 1, Ordering::SeqCst);
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }
        Ok(())
    }

    fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::SeqCst)
    }
}

impl Drop for FileDiskManager {
    fn drop(&mut self) {
        let _ = self.db_file.get_mut().sync_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_disk_manager_new() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();
        assert_eq!(dm.num_pages(), 0);
    }

    #[test]
    fn test_read_unwritten_page_is_zeroed() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        let mut data = [7u8; PAGE_SIZE];
        dm.read_page(PageId::new(3), &mut data).unwrap();
        assert!(data.iter().all(|&b| b == 0));
        assert_eq!(dm.get_num_reads(), 1);
    }

    #[test]
    fn test_write_extends_num_pages() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        let data = [1u8; PAGE_SIZE];
        dm.write_page(PageId::new(4), &data).unwrap();
        assert_eq!(dm.num_pages(), 5);

        dm.write_page(PageId::new(1), &data).unwrap();
        assert_eq!(dm.num_pages(), 5);
    }

    #[test]
    fn test_invalid_page_id_rejected() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = FileDiskManager::new(temp_file.path()).unwrap();

        let mut data = [0u8; PAGE_SIZE];
        let err = dm
            .read_page(crate::common::INVALID_PAGE_ID, &mut data)
            .unwrap_err();
        assert!(matches!(err, StratumError::InvalidPageId(_)));
    }

    #[test]
    fn test_file_disk_manager_persistence() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let dm = FileDiskManager::new(&path).unwrap();
            let mut data = [0u8; PAGE_SIZE];
            data[0] = 123;
            dm.write_page(PageId::new(0), &data).unwrap();
        }

        {
            let dm = FileDiskManager::new(&path).unwrap();
            assert_eq!(dm.num_pages(), 1);

            let mut data = [0u8; PAGE_SIZE];
            dm.read_page(PageId::new(0), &mut data).unwrap();
            assert_eq!(data[0], 123);
        }
    }
}
