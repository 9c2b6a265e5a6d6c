//! RAII guards for page access.
//!
//! - [`BasicPageGuard`] owns one pin and takes latches only for the span of a
//!   [`BasicPageGuard::read`] or [`BasicPageGuard::write`] call.
//! - [`ReadPageGuard`] owns a pin plus the page's shared latch.
//! - [`WritePageGuard`] owns a pin plus the page's exclusive latch.
//!
//! Dropping a guard releases the latch first, then unpins the page with the
//! dirty flag the guard recorded. Guards are move-only and `drop_guard`
//! consumes them, so a released guard cannot be used again.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, PAGE_SIZE};

use super::{BufferPoolManager, FrameHeader};

type PageData = Box<[u8; PAGE_SIZE]>;

/// Guard owning one pin on a page, without holding its latch.
pub struct BasicPageGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a FrameHeader,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a> BasicPageGuard<'a> {
    /// Wraps a pin the caller already took on `frame`.
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame: &'a FrameHeader) -> Self {
        Self {
            bpm,
            page_id: frame.page_id(),
            frame,
            is_dirty: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Latches the page for reading until the returned guard drops. The
    /// latch borrows this guard, so it cannot outlive the pin.
    pub fn read(&self) -> RwLockReadGuard<'_, PageData> {
        self.frame.read_data()
    }

    /// Latches the page for writing until the returned guard drops, and marks
    /// this guard dirty.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, PageData> {
        self.is_dirty = true;
        self.frame.write_data()
    }

    /// Takes the shared latch, keeping this guard's pin.
    pub fn upgrade_read(self) -> ReadPageGuard<'a> {
        let latch = self.frame.read_data();
        ReadPageGuard {
            latch: Some(latch),
            guard: self,
        }
    }

    /// Takes the exclusive latch, keeping this guard's pin.
    pub fn upgrade_write(self) -> WritePageGuard<'a> {
        let latch = self.frame.write_data();
        WritePageGuard {
            latch: Some(latch),
            guard: self,
        }
    }

    /// Takes the exclusive latch if it is free right now. Otherwise the pin
    /// is released and None returned.
    pub fn try_upgrade_write(self) -> Option<WritePageGuard<'a>> {
        let latch = self.frame.try_write_data()?;
        Some(WritePageGuard {
            latch: Some(latch),
            guard: self,
        })
    }

    /// Releases the pin now rather than at end of scope.
    pub fn drop_guard(self) {}
}

impl Drop for BasicPageGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}

/// Guard for read-only page access.
///
/// Multiple `ReadPageGuard`s can exist for the same page simultaneously.
pub struct ReadPageGuard<'a> {
    /// Always `Some` until drop
    latch: Option<RwLockReadGuard<'a, PageData>>,
    guard: BasicPageGuard<'a>,
}

impl ReadPageGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        match &self.latch {
            Some(latch) => &***latch,
            None => unreachable!("read guard used after release"),
        }
    }

    pub fn drop_guard(self) {}
}

impl Deref for ReadPageGuard<'_> {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        // Unlatch here; the inner guard unpins when the field drops
        self.latch.take();
    }
}

/// Guard for exclusive page access. Mutable access marks the page dirty.
pub struct WritePageGuard<'a> {
    latch: Option<RwLockWriteGuard<'a, PageData>>,
    guard: BasicPageGuard<'a>,
}

impl WritePageGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.guard.page_id
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        match &self.latch {
            Some(latch) => &***latch,
            None => unreachable!("write guard used after release"),
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        self.guard.is_dirty = true;
        match &mut self.latch {
            Some(latch) => &mut ***latch,
            None => unreachable!("write guard used after release"),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.guard.is_dirty
    }

    pub fn drop_guard(self) {}
}

impl Deref for WritePageGuard<'_> {
    type Target = [u8; PAGE_SIZE];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.latch.take();
    }
}
