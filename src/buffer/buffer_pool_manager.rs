use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{ArcMutexGuard, Mutex, MutexGuard, RawMutex, RwLockWriteGuard};
use tracing::{debug, trace, warn, Span};

use crate::common::{FrameId, PageId, Result, StratumError, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Held while a page id's bytes are moving between disk and a frame.
type InFlightMarker = Arc<Mutex<()>>;
type InFlightGuard = ArcMutexGuard<RawMutex, ()>;

/// Everything guarded by the pool-wide lock.
struct PoolState {
    /// Page table: resident page id -> frame
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page
    free_list: VecDeque<FrameId>,
    /// Page ids with a write-back or load in progress
    in_flight: HashMap<PageId, InFlightMarker>,
}

type PageData = Box<[u8; PAGE_SIZE]>;

/// A frame taken for a new page, latched exclusively.
struct ClaimedFrame<'a> {
    frame_id: FrameId,
    /// Page the frame held before, and whether it was dirty
    evicted: Option<(PageId, bool)>,
    data: RwLockWriteGuard<'a, PageData>,
}

/// What a frame must do before it can serve its new page.
enum Load {
    /// Fresh page: zero the frame
    Zero,
    /// Existing page: read it from disk
    Disk,
}

/// BufferPoolManager caches disk pages in a fixed set of frames.
///
/// The page table, free list and in-flight markers sit behind one mutex. Disk
/// I/O for a replace runs outside that mutex: the evicted page id and the
/// incoming page id each get an in-flight marker, and any thread that wants
/// either id waits on the marker until the transfer finishes.
///
/// Lock order: a frame's data latch may be held while taking the pool lock
/// (guards of one page fetching another). Under the pool lock a data latch is
/// only ever try-locked, so the pool never waits on a page latch.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<FrameHeader>,
    state: Mutex<PoolState>,
    replacer: LruKReplacer,
    disk_scheduler: DiskScheduler,
    next_page_id: AtomicU32,
    span: Span,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames with an LRU-`k` replacer.
    ///
    /// Page ids are allocated after the highest page the disk already holds.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        let span = tracing::debug_span!("buffer_pool", pool_size, k);
        Self::with_span(pool_size, k, disk_manager, span)
    }

    /// Like [`BufferPoolManager::new`] but emits events under `span`.
    pub fn with_span(
        pool_size: usize,
        k: usize,
        disk_manager: Arc<dyn DiskManager>,
        span: Span,
    ) -> Self {
        let frames = (0..pool_size)
            .map(|i| FrameHeader::new(FrameId::new(i as u32)))
            .collect();
        let free_list = (0..pool_size).map(|i| FrameId::new(i as u32)).collect();
        let next_page_id = AtomicU32::new(disk_manager.num_pages());

        Self {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                in_flight: HashMap::new(),
            }),
            replacer: LruKReplacer::new(k, pool_size),
            disk_scheduler: DiskScheduler::new(disk_manager),
            next_page_id,
            span,
        }
    }

    /// Allocates a fresh, zeroed page and returns its id pinned once.
    ///
    /// Fails with [`StratumError::BufferPoolFull`] when every frame is pinned.
    pub fn new_page(&self) -> Result<PageId> {
        self.allocate().map(|(page_id, _)| page_id)
    }

    /// Claims a frame first so a full pool does not use up a page id.
    fn allocate(&self) -> Result<(PageId, FrameId)> {
        let mut state = self.state.lock();
        let claimed = self.claim_frame(&mut state)?;
        let page_id = PageId::new(self.next_page_id.fetch_add(1, Ordering::SeqCst));
        let frame_id = self.install(state, page_id, claimed, Load::Zero)?;
        trace!(parent: &self.span, page_id = %page_id, "new page");
        Ok((page_id, frame_id))
    }

    /// Pins `page_id`, reading it from disk if it is not resident, and returns its frame.
    pub fn fetch_page(&self, page_id: PageId) -> Result<&FrameHeader> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }
        let frame_id = self.bring_in(page_id)?;
        Ok(&self.frames[frame_id.as_usize()])
    }

    /// Drops one pin. `is_dirty` can only set the dirty flag, never clear it.
    ///
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        let Some(remaining) = frame.unpin() else {
            return false;
        };
        if is_dirty {
            frame.mark_dirty();
        }
        if remaining == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes a resident page to disk and clears its dirty flag.
    ///
    /// Returns `Ok(false)` for an invalid or non-resident page id. Pin count
    /// and residency are unchanged when this returns.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Ok(false);
        }

        let frame_id = {
            let state = self.state.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };
            // Pinned without counting as an access
            self.frames[frame_id.as_usize()].pin();
            self.replacer.set_evictable(frame_id, false);
            frame_id
        };
        let frame = &self.frames[frame_id.as_usize()];

        let data = {
            let latch = frame.read_data();
            frame.clear_dirty();
            Bytes::copy_from_slice(&latch[..])
        };
        let result = self.disk_scheduler.write_sync(page_id, data);
        if result.is_err() {
            frame.mark_dirty();
        }
        self.unpin_page(page_id, false);

        result?;
        trace!(parent: &self.span, page_id = %page_id, "flushed page");
        Ok(true)
    }

    /// Flushes every page resident at the time of the call.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();
        for page_id in resident {
            self.flush_page(page_id)?;
        }
        debug!(parent: &self.span, "flushed all pages");
        Ok(())
    }

    /// Removes a page from the pool and releases its id on disk.
    ///
    /// Returns `Ok(true)` if the page is not resident, `Ok(false)` if it is pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();
        // A load pins the frame, a write-back must finish first
        while let Some(marker) = state.in_flight.get(&page_id).cloned() {
            state = self.wait_in_flight(state, &marker);
        }

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        state.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset_metadata();
        state.free_list.push_back(frame_id);
        drop(state);

        self.disk_scheduler.deallocate_sync(page_id)?;
        trace!(parent: &self.span, page_id = %page_id, "deleted page");
        Ok(true)
    }

    /// Fetches a page under a guard that owns the pin but takes no latch.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(BasicPageGuard::new(self, frame))
    }

    /// Fetches a page and takes its shared latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard<'_>> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    /// Fetches a page and takes its exclusive latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard<'_>> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_write())
    }

    /// Fetches a page and takes its exclusive latch only if nobody holds it.
    ///
    /// `Ok(None)` means the latch was busy; the page is left unpinned.
    pub fn try_fetch_page_write(&self, page_id: PageId) -> Result<Option<WritePageGuard<'_>>> {
        Ok(self.fetch_page_basic(page_id)?.try_upgrade_write())
    }

    /// Allocates a page and wraps its pin in a basic guard.
    pub fn new_page_guarded(&self) -> Result<BasicPageGuard<'_>> {
        let (_, frame_id) = self.allocate()?;
        Ok(BasicPageGuard::new(self, &self.frames[frame_id.as_usize()]))
    }

    /// Pin count of a resident page, None if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of frames the replacer could evict right now.
    pub fn evictable_count(&self) -> usize {
        self.replacer.size()
    }

    fn pin_resident(&self, frame_id: FrameId) {
        self.frames[frame_id.as_usize()].pin();
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
    }

    /// Releases the pool lock, waits for a transfer to finish, and re-locks.
    fn wait_in_flight<'s>(
        &'s self,
        state: MutexGuard<'s, PoolState>,
        marker: &InFlightMarker,
    ) -> MutexGuard<'s, PoolState> {
        drop(state);
        drop(marker.lock());
        self.state.lock()
    }

    /// Makes `page_id` resident and pinned, returning its frame.
    fn bring_in(&self, page_id: PageId) -> Result<FrameId> {
        let mut state = self.state.lock();
        loop {
            if let Some(&frame_id) = state.page_table.get(&page_id) {
                self.pin_resident(frame_id);
                return Ok(frame_id);
            }
            match state.in_flight.get(&page_id).cloned() {
                Some(marker) => state = self.wait_in_flight(state, &marker),
                None => break,
            }
        }

        let claimed = self.claim_frame(&mut state)?;
        self.install(state, page_id, claimed, Load::Disk)
    }

    /// Takes a frame from the free list, or evicts one, and latches its bytes.
    ///
    /// Only try-latches: a frame whose latch outlived its pin is passed over
    /// and handed back once another frame is found.
    fn claim_frame(&self, state: &mut PoolState) -> Result<ClaimedFrame<'_>> {
        let mut skipped = Vec::new();
        let claimed = loop {
            let (frame_id, from_free_list) = match state.free_list.pop_front() {
                Some(frame_id) => (frame_id, true),
                None => match self.replacer.evict() {
                    Some(frame_id) => (frame_id, false),
                    None => break None,
                },
            };
            match self.frames[frame_id.as_usize()].try_write_data() {
                Some(data) => break Some((frame_id, from_free_list, data)),
                None => {
                    debug!(parent: &self.span, frame = frame_id.as_u32(), "frame still latched, skipped");
                    skipped.push((frame_id, from_free_list));
                }
            }
        };

        for (frame_id, from_free_list) in skipped {
            if from_free_list {
                state.free_list.push_back(frame_id);
            } else {
                self.replacer.record_access(frame_id);
                self.replacer.set_evictable(frame_id, true);
            }
        }

        let Some((frame_id, from_free_list, data)) = claimed else {
            debug!(parent: &self.span, "no evictable frame");
            return Err(StratumError::BufferPoolFull);
        };
        let evicted = if from_free_list {
            None
        } else {
            let frame = &self.frames[frame_id.as_usize()];
            let old_page_id = frame.page_id();
            state.page_table.remove(&old_page_id);
            Some((old_page_id, frame.is_dirty()))
        };
        Ok(ClaimedFrame {
            frame_id,
            evicted,
            data,
        })
    }

    /// Moves `page_id` into a claimed frame: writes back the evicted page,
    /// loads or zeroes the bytes, and publishes the page table entry.
    fn install(
        &self,
        mut state: MutexGuard<'_, PoolState>,
        page_id: PageId,
        claimed: ClaimedFrame<'_>,
        load: Load,
    ) -> Result<FrameId> {
        let ClaimedFrame {
            frame_id,
            evicted,
            mut data,
        } = claimed;
        let frame = &self.frames[frame_id.as_usize()];

        let load_marker = Self::mark_in_flight(&mut state, page_id);
        let write_back = match evicted {
            Some((old_page_id, true)) => {
                Some((old_page_id, Self::mark_in_flight(&mut state, old_page_id)))
            }
            _ => None,
        };

        frame.reset_metadata();
        frame.set_page_id(page_id);
        frame.pin();
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
        drop(state);

        if let Some((old_page_id, marker)) = write_back {
            trace!(parent: &self.span, page_id = %old_page_id, frame = frame_id.as_u32(), "writing back evicted page");
            let bytes = Bytes::copy_from_slice(&data[..]);
            if let Err(e) = self.disk_scheduler.write_sync(old_page_id, bytes) {
                warn!(parent: &self.span, page_id = %old_page_id, error = %e, "write-back failed, restoring page");
                self.restore_evicted(frame_id, page_id, old_page_id, data, load_marker, marker);
                return Err(e);
            }
            self.clear_in_flight(old_page_id, marker);
        }

        let loaded = match load {
            Load::Zero => {
                data.fill(0);
                Ok(())
            }
            Load::Disk => self
                .disk_scheduler
                .read_sync(page_id)
                .map(|bytes| data.copy_from_slice(&bytes[..PAGE_SIZE])),
        };
        drop(data);

        let mut state = self.state.lock();
        match loaded {
            Ok(()) => {
                state.page_table.insert(page_id, frame_id);
                state.in_flight.remove(&page_id);
                drop(state);
                drop(load_marker);
                Ok(frame_id)
            }
            Err(e) => {
                warn!(parent: &self.span, page_id = %page_id, error = %e, "page load failed");
                frame.reset_metadata();
                self.replacer.set_evictable(frame_id, true);
                self.replacer.remove(frame_id);
                state.free_list.push_back(frame_id);
                state.in_flight.remove(&page_id);
                drop(state);
                drop(load_marker);
                Err(e)
            }
        }
    }

    fn mark_in_flight(state: &mut PoolState, page_id: PageId) -> InFlightGuard {
        let marker: InFlightMarker = Arc::new(Mutex::new(()));
        let guard = marker.lock_arc();
        state.in_flight.insert(page_id, marker);
        guard
    }

    fn clear_in_flight(&self, page_id: PageId, guard: InFlightGuard) {
        self.state.lock().in_flight.remove(&page_id);
        drop(guard);
    }

    /// Puts an evicted page back into its frame after its write-back failed.
    fn restore_evicted(
        &self,
        frame_id: FrameId,
        page_id: PageId,
        old_page_id: PageId,
        data: RwLockWriteGuard<'_, PageData>,
        load_marker: InFlightGuard,
        write_back_marker: InFlightGuard,
    ) {
        let frame = &self.frames[frame_id.as_usize()];
        drop(data);

        let mut state = self.state.lock();
        frame.reset_metadata();
        frame.set_page_id(old_page_id);
        frame.mark_dirty();
        state.page_table.insert(old_page_id, frame_id);
        state.in_flight.remove(&page_id);
        state.in_flight.remove(&old_page_id);
        self.replacer.set_evictable(frame_id, true);
        drop(state);
        drop(load_marker);
        drop(write_back_marker);
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all_pages() {
            warn!(parent: &self.span, error = %e, "flush on shutdown failed");
        }
    }
}
