use std::marker::PhantomData;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{PageId, Result, StratumError, INVALID_PAGE_ID};

use super::btree_page::{page_type, IndexPageType};
use super::{LeafPage, Storable};

/// Forward iterator over the leaf chain.
///
/// Holds a read latch on the current leaf. Moving on latches the next leaf
/// before releasing the current one, so a concurrent merge cannot free the
/// next leaf or move its entries behind the scan. Latches are only ever taken
/// left to right along the chain. When not at the end, the position always
/// names a valid slot.
pub struct IndexIterator<'a, K, V> {
    bpm: &'a BufferPoolManager,
    guard: Option<ReadPageGuard<'a>>,
    index: usize,
    /// Error hit while stepping to the next leaf, reported on the next call
    pending: Option<StratumError>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<'a, K: Storable, V: Storable> IndexIterator<'a, K, V> {
    /// The end position.
    pub fn end(bpm: &'a BufferPoolManager) -> Self {
        Self {
            bpm,
            guard: None,
            index: 0,
            pending: None,
            _marker: PhantomData,
        }
    }

    /// Positions at `index` within the latched leaf, moving on to later
    /// leaves if that slot does not exist.
    pub(crate) fn at(bpm: &'a BufferPoolManager, guard: ReadPageGuard<'a>, index: usize) -> Result<Self> {
        let mut iter = Self {
            bpm,
            guard: Some(guard),
            index,
            pending: None,
            _marker: PhantomData,
        };
        iter.settle()?;
        Ok(iter)
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Leaf page id of the current position (INVALID at the end).
    pub fn page_id(&self) -> PageId {
        self.guard
            .as_ref()
            .map_or(INVALID_PAGE_ID, |guard| guard.page_id())
    }

    /// The entry at the current position, without advancing.
    pub fn current(&self) -> Option<(K, V)> {
        let guard = self.guard.as_ref()?;
        Some(LeafPage::<_, K, V>::new(guard.data()).item_at(self.index))
    }

    /// Skips past exhausted leaves until the position is valid or at the end.
    fn settle(&mut self) -> Result<()> {
        loop {
            let next = match &self.guard {
                None => return Ok(()),
                Some(guard) => {
                    if page_type(guard.data())? != IndexPageType::Leaf {
                        let page_id = guard.page_id();
                        self.guard = None;
                        return Err(StratumError::IndexCorrupted(format!(
                            "page {} in leaf chain is not a leaf",
                            page_id
                        )));
                    }
                    let leaf = LeafPage::<_, K, V>::new(guard.data());
                    if self.index < leaf.size() {
                        return Ok(());
                    }
                    leaf.next_page_id()
                }
            };

            let next_guard = if next.is_valid() {
                Some(self.bpm.fetch_page_read(next)?)
            } else {
                None
            };
            // Replacing the guard releases the leaf just finished
            self.guard = next_guard;
            self.index = 0;
        }
    }
}

impl<K: Storable, V: Storable> Iterator for IndexIterator<'_, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }

        let item = self.current()?;
        self.index += 1;
        if let Err(err) = self.settle() {
            self.guard = None;
            self.pending = Some(err);
        }
        Some(Ok(item))
    }
}

impl<K, V> PartialEq for IndexIterator<'_, K, V> {
    /// Two iterators are equal when they point at the same slot of the same leaf.
    fn eq(&self, other: &Self) -> bool {
        let pos = |it: &Self| it.guard.as_ref().map(|g| (g.page_id(), it.index));
        pos(self) == pos(other)
    }
}
