use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::common::{PageId, PAGE_SIZE};

use super::btree_page::{
    read_at, read_u32, shift_slots_left, shift_slots_right, write_at, write_u32, IndexPageType,
    COMMON_HEADER_SIZE, MAX_SIZE_OFFSET, PAGE_TYPE_OFFSET, SIZE_OFFSET,
};
use super::{KeyComparator, Storable};

pub const INTERNAL_PAGE_HEADER_SIZE: usize = COMMON_HEADER_SIZE;

/// Internal page view: `size` `(key, child)` slots.
///
/// The key in slot 0 is unused; child 0 covers every key below key 1. Child
/// `i` covers keys in `[key i, key i+1)`.
pub struct InternalPage<B, K> {
    data: B,
    _marker: PhantomData<fn() -> K>,
}

impl<B: AsRef<[u8]>, K: Storable> InternalPage<B, K> {
    pub fn new(data: B) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    const SLOT_SIZE: usize = K::SIZE + PageId::SIZE;

    /// Most slots a page can physically hold.
    pub fn capacity() -> usize {
        (PAGE_SIZE - INTERNAL_PAGE_HEADER_SIZE) / Self::SLOT_SIZE
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn slot_offset(index: usize) -> usize {
        INTERNAL_PAGE_HEADER_SIZE + index * Self::SLOT_SIZE
    }

    pub fn size(&self) -> usize {
        read_u32(self.bytes(), SIZE_OFFSET) as usize
    }

    pub fn max_size(&self) -> usize {
        read_u32(self.bytes(), MAX_SIZE_OFFSET) as usize
    }

    pub fn min_size(&self) -> usize {
        self.max_size().div_ceil(2)
    }

    pub fn key_at(&self, index: usize) -> K {
        read_at(self.bytes(), Self::slot_offset(index))
    }

    pub fn child_at(&self, index: usize) -> PageId {
        read_at(self.bytes(), Self::slot_offset(index) + K::SIZE)
    }

    /// Index of the child whose subtree may hold `key`: the last slot whose
    /// key is not greater than `key`, or 0.
    pub fn lookup<C: KeyComparator<K> + ?Sized>(&self, key: &K, cmp: &C) -> usize {
        let (mut lo, mut hi) = (1, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(&self.key_at(mid), key) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo - 1
    }

    pub fn child_index(&self, child: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.child_at(i) == child)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: Storable> InternalPage<B, K> {
    pub fn init(&mut self, max_size: usize) {
        let data = self.data.as_mut();
        write_u32(data, PAGE_TYPE_OFFSET, IndexPageType::Internal as u32);
        write_u32(data, SIZE_OFFSET, 0);
        write_u32(data, MAX_SIZE_OFFSET, max_size as u32);
    }

    fn set_size(&mut self, size: usize) {
        write_u32(self.data.as_mut(), SIZE_OFFSET, size as u32);
    }

    pub fn set_key_at(&mut self, index: usize, key: &K) {
        write_at(self.data.as_mut(), Self::slot_offset(index), key);
    }

    pub fn set_child_at(&mut self, index: usize, child: PageId) {
        write_at(self.data.as_mut(), Self::slot_offset(index) + K::SIZE, &child);
    }

    /// Turns an empty page into a root with two children.
    pub fn populate_new_root(&mut self, left: PageId, key: &K, right: PageId) {
        self.set_child_at(0, left);
        self.set_key_at(1, key);
        self.set_child_at(1, right);
        self.set_size(2);
    }

    /// Inserts `(key, child)` at `index`, shifting later slots right. May
    /// exceed max size by one; the caller splits.
    pub fn insert_at(&mut self, index: usize, key: &K, child: PageId) {
        let size = self.size();
        assert!(size < Self::capacity(), "internal page overflow");
        shift_slots_right(
            self.data.as_mut(),
            INTERNAL_PAGE_HEADER_SIZE,
            Self::SLOT_SIZE,
            index,
            size,
        );
        self.set_key_at(index, key);
        self.set_child_at(index, child);
        self.set_size(size + 1);
    }

    /// Removes the slot at `index`, returning its key and child.
    pub fn remove_at(&mut self, index: usize) -> (K, PageId) {
        let size = self.size();
        let removed = (self.key_at(index), self.child_at(index));
        shift_slots_left(
            self.data.as_mut(),
            INTERNAL_PAGE_HEADER_SIZE,
            Self::SLOT_SIZE,
            index,
            size,
        );
        self.set_size(size - 1);
        removed
    }

    /// Moves the upper half of the slots into the empty `right` page and
    /// returns the separator key to push up. This page keeps the larger half.
    pub fn move_half_to<B2>(&mut self, right: &mut InternalPage<B2, K>) -> K
    where
        B2: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let keep = size.div_ceil(2);

        let src = Self::slot_offset(keep)..Self::slot_offset(size);
        let dst = Self::slot_offset(0);
        let len = src.len();
        right.data.as_mut()[dst..dst + len].copy_from_slice(&self.bytes()[src]);
        right.set_size(size - keep);
        self.set_size(keep);

        // Slot 0's key is unused in the right page: it moves up
        right.key_at(0)
    }

    /// Appends every slot to `left`, this page's left sibling. `middle_key`
    /// is the parent's separator between the two and becomes slot 0's key.
    pub fn move_all_to<B2>(&mut self, left: &mut InternalPage<B2, K>, middle_key: &K)
    where
        B2: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.set_key_at(0, middle_key);
        let size = self.size();
        let left_size = left.size();
        assert!(left_size + size <= Self::capacity(), "internal merge overflow");

        let src = Self::slot_offset(0)..Self::slot_offset(size);
        let dst = Self::slot_offset(left_size);
        let len = src.len();
        left.data.as_mut()[dst..dst + len].copy_from_slice(&self.bytes()[src]);
        left.set_size(left_size + size);
        self.set_size(0);
    }

    /// Moves this page's first child to the end of `left`. Returns the new
    /// separator between `left` and this page.
    pub fn move_first_to_end_of<B2>(&mut self, left: &mut InternalPage<B2, K>, middle_key: &K) -> K
    where
        B2: AsRef<[u8]> + AsMut<[u8]>,
    {
        let new_separator = self.key_at(1);
        let (_, child) = self.remove_at(0);
        let left_size = left.size();
        left.insert_at(left_size, middle_key, child);
        new_separator
    }

    /// Moves this page's last child to the front of `right`. Returns the new
    /// separator between this page and `right`.
    pub fn move_last_to_front_of<B2>(&mut self, right: &mut InternalPage<B2, K>, middle_key: &K) -> K
    where
        B2: AsRef<[u8]> + AsMut<[u8]>,
    {
        let last = self.size() - 1;
        let (new_separator, child) = self.remove_at(last);
        right.set_key_at(0, middle_key);
        right.insert_at(0, &new_separator, child);
        new_separator
    }
}
