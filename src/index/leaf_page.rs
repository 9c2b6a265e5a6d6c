use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::common::{PageId, INVALID_PAGE_ID, PAGE_SIZE};

use super::btree_page::{
    read_at, read_u32, shift_slots_left, shift_slots_right, write_at, write_u32, IndexPageType,
    COMMON_HEADER_SIZE, MAX_SIZE_OFFSET, PAGE_TYPE_OFFSET, SIZE_OFFSET,
};
use super::{KeyComparator, Storable};

const NEXT_PAGE_ID_OFFSET: usize = COMMON_HEADER_SIZE;
pub const LEAF_PAGE_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 4;

/// Leaf page view: sorted `(key, value)` slots plus a link to the next leaf.
pub struct LeafPage<B, K, V> {
    data: B,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<B: AsRef<[u8]>, K: Storable, V: Storable> LeafPage<B, K, V> {
    pub fn new(data: B) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    const SLOT_SIZE: usize = K::SIZE + V::SIZE;

    /// Most slots a page can physically hold.
    pub fn capacity() -> usize {
        (PAGE_SIZE - LEAF_PAGE_HEADER_SIZE) / Self::SLOT_SIZE
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn slot_offset(index: usize) -> usize {
        LEAF_PAGE_HEADER_SIZE + index * Self::SLOT_SIZE
    }

    pub fn size(&self) -> usize {
        read_u32(self.bytes(), SIZE_OFFSET) as usize
    }

    pub fn max_size(&self) -> usize {
        read_u32(self.bytes(), MAX_SIZE_OFFSET) as usize
    }

    pub fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::new(read_u32(self.bytes(), NEXT_PAGE_ID_OFFSET))
    }

    pub fn key_at(&self, index: usize) -> K {
        read_at(self.bytes(), Self::slot_offset(index))
    }

    pub fn value_at(&self, index: usize) -> V {
        read_at(self.bytes(), Self::slot_offset(index) + K::SIZE)
    }

    pub fn item_at(&self, index: usize) -> (K, V) {
        (self.key_at(index), self.value_at(index))
    }

    /// Index of the first key not less than `key` (`size()` if none).
    pub fn lower_bound<C: KeyComparator<K> + ?Sized>(&self, key: &K, cmp: &C) -> usize {
        let (mut lo, mut hi) = (0, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(&self.key_at(mid), key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Exact-match lookup.
    pub fn lookup<C: KeyComparator<K> + ?Sized>(&self, key: &K, cmp: &C) -> Option<V> {
        let index = self.lower_bound(key, cmp);
        if index < self.size() && cmp.compare(&self.key_at(index), key) == Ordering::Equal {
            Some(self.value_at(index))
        } else {
            None
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: Storable, V: Storable> LeafPage<B, K, V> {
    /// Formats an empty leaf with no successor.
    pub fn init(&mut self, max_size: usize) {
        let data = self.data.as_mut();
        write_u32(data, PAGE_TYPE_OFFSET, IndexPageType::Leaf as u32);
        write_u32(data, SIZE_OFFSET, 0);
        write_u32(data, MAX_SIZE_OFFSET, max_size as u32);
        write_u32(data, NEXT_PAGE_ID_OFFSET, INVALID_PAGE_ID.as_u32());
    }

    fn set_size(&mut self, size: usize) {
        write_u32(self.data.as_mut(), SIZE_OFFSET, size as u32);
    }

    pub fn set_next_page_id(&mut self, next: PageId) {
        write_u32(self.data.as_mut(), NEXT_PAGE_ID_OFFSET, next.as_u32());
    }

    fn write_item(&mut self, index: usize, key: &K, value: &V) {
        let offset = Self::slot_offset(index);
        let data = self.data.as_mut();
        write_at(data, offset, key);
        write_at(data, offset + K::SIZE, value);
    }

    /// Inserts at `index`, shifting later slots right.
    pub fn insert_at(&mut self, index: usize, key: &K, value: &V) {
        let size = self.size();
        assert!(size < Self::capacity(), "leaf page overflow");
        shift_slots_right(
            self.data.as_mut(),
            LEAF_PAGE_HEADER_SIZE,
            Self::SLOT_SIZE,
            index,
            size,
        );
        self.write_item(index, key, value);
        self.set_size(size + 1);
    }

    /// Removes and returns the slot at `index`.
    pub fn remove_at(&mut self, index: usize) -> (K, V) {
        let size = self.size();
        let item = self.item_at(index);
        shift_slots_left(
            self.data.as_mut(),
            LEAF_PAGE_HEADER_SIZE,
            Self::SLOT_SIZE,
            index,
            size,
        );
        self.set_size(size - 1);
        item
    }

    /// Sorted insert. Returns false, leaving the page untouched, on a duplicate key.
    pub fn insert<C: KeyComparator<K> + ?Sized>(&mut self, key: &K, value: &V, cmp: &C) -> bool {
        let index = self.lower_bound(key, cmp);
        if index < self.size() && cmp.compare(&self.key_at(index), key) == Ordering::Equal {
            return false;
        }
        self.insert_at(index, key, value);
        true
    }

    /// Removes `key`. Returns false if it is absent.
    pub fn remove<C: KeyComparator<K> + ?Sized>(&mut self, key: &K, cmp: &C) -> bool {
        let index = self.lower_bound(key, cmp);
        if index < self.size() && cmp.compare(&self.key_at(index), key) == Ordering::Equal {
            self.remove_at(index);
            true
        } else {
            false
        }
    }

    /// Moves the upper half of the slots into the empty `right` page and
    /// links it in after this one. This page keeps the larger half.
    pub fn move_half_to<B2>(&mut self, right: &mut LeafPage<B2, K, V>, right_page_id: PageId)
    where
        B2: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let keep = size.div_ceil(2);
        let moved = size - keep;

        let src = Self::slot_offset(keep)..Self::slot_offset(size);
        let dst = Self::slot_offset(0);
        let len = src.len();
        right.data.as_mut()[dst..dst + len].copy_from_slice(&self.bytes()[src]);
        right.set_size(moved);
        right.set_next_page_id(self.next_page_id());

        self.set_size(keep);
        self.set_next_page_id(right_page_id);
    }

    /// Appends every slot to `left` (this page's left sibling) and unlinks this page.
    pub fn move_all_to<B2>(&mut self, left: &mut LeafPage<B2, K, V>)
    where
        B2: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let left_size = left.size();
        assert!(left_size + size <= Self::capacity(), "leaf merge overflow");

        let src = Self::slot_offset(0)..Self::slot_offset(size);
        let dst = Self::slot_offset(left_size);
        let len = src.len();
        left.data.as_mut()[dst..dst + len].copy_from_slice(&self.bytes()[src]);
        left.set_size(left_size + size);
        left.set_next_page_id(self.next_page_id());

        self.set_size(0);
    }
}
