//! Shared layout for B+Tree pages.
//!
//! Every tree page starts with the same 12-byte header:
//!
//! | offset | field                     |
//! |--------|---------------------------|
//! | 0      | page type tag (u32)       |
//! | 4      | current size (u32)        |
//! | 8      | max size (u32)            |
//!
//! Leaf pages add a next-leaf page id at offset 12. Slots follow the header as
//! a flat array of fixed-width entries. All integers are little endian.

use bytes::{Buf, BufMut};

use crate::common::{PageId, Result, StratumError, INVALID_PAGE_ID};

use super::{InternalPage, LeafPage, Storable};

pub(crate) const PAGE_TYPE_OFFSET: usize = 0;
pub(crate) const SIZE_OFFSET: usize = 4;
pub(crate) const MAX_SIZE_OFFSET: usize = 8;
pub const COMMON_HEADER_SIZE: usize = 12;

const ROOT_PAGE_ID_OFFSET: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IndexPageType {
    Invalid = 0,
    Leaf = 1,
    Internal = 2,
}

impl IndexPageType {
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            0 => Ok(IndexPageType::Invalid),
            1 => Ok(IndexPageType::Leaf),
            2 => Ok(IndexPageType::Internal),
            other => Err(StratumError::InvalidPageType(other)),
        }
    }
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    (&data[offset..offset + 4]).get_u32_le()
}

pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    let mut dst = &mut data[offset..offset + 4];
    dst.put_u32_le(value);
}

pub(crate) fn read_at<T: Storable>(data: &[u8], offset: usize) -> T {
    T::read_from(&mut &data[offset..offset + T::SIZE])
}

pub(crate) fn write_at<T: Storable>(data: &mut [u8], offset: usize, value: &T) {
    let mut dst = &mut data[offset..offset + T::SIZE];
    value.write_to(&mut dst);
}

/// Opens a gap at `index` in a slot array of `size` entries.
pub(crate) fn shift_slots_right(data: &mut [u8], base: usize, width: usize, index: usize, size: usize) {
    let start = base + index * width;
    let end = base + size * width;
    data.copy_within(start..end, start + width);
}

/// Closes the slot at `index` in a slot array of `size` entries.
pub(crate) fn shift_slots_left(data: &mut [u8], base: usize, width: usize, index: usize, size: usize) {
    let start = base + (index + 1) * width;
    let end = base + size * width;
    data.copy_within(start..end, start - width);
}

/// Reads the type tag of a tree page.
pub fn page_type(data: &[u8]) -> Result<IndexPageType> {
    IndexPageType::from_tag(read_u32(data, PAGE_TYPE_OFFSET))
}

/// A tree page, dispatched on its type tag.
pub enum BTreePage<B, K, V> {
    Internal(InternalPage<B, K>),
    Leaf(LeafPage<B, K, V>),
}

impl<B: AsRef<[u8]>, K: Storable, V: Storable> BTreePage<B, K, V> {
    /// Wraps `data`, failing if it is not an initialized leaf or internal page.
    pub fn from_data(data: B) -> Result<Self> {
        match page_type(data.as_ref())? {
            IndexPageType::Leaf => Ok(BTreePage::Leaf(LeafPage::new(data))),
            IndexPageType::Internal => Ok(BTreePage::Internal(InternalPage::new(data))),
            IndexPageType::Invalid => Err(StratumError::InvalidPageType(0)),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BTreePage::Leaf(_))
    }

    pub fn size(&self) -> usize {
        match self {
            BTreePage::Internal(page) => page.size(),
            BTreePage::Leaf(page) => page.size(),
        }
    }

    pub fn max_size(&self) -> usize {
        match self {
            BTreePage::Internal(page) => page.max_size(),
            BTreePage::Leaf(page) => page.max_size(),
        }
    }

    pub fn min_size(&self) -> usize {
        match self {
            BTreePage::Internal(page) => page.min_size(),
            BTreePage::Leaf(page) => page.min_size(),
        }
    }

    /// Whether inserting one entry below this page cannot split it.
    pub fn is_insert_safe(&self) -> bool {
        match self {
            BTreePage::Internal(page) => page.size() < page.max_size(),
            BTreePage::Leaf(page) => page.size() + 1 < page.max_size(),
        }
    }

    /// Whether removing one entry below this page cannot underflow it.
    pub fn is_remove_safe(&self, is_root: bool) -> bool {
        match (self, is_root) {
            (BTreePage::Internal(page), true) => page.size() > 2,
            (BTreePage::Leaf(page), true) => page.size() > 1,
            (page, false) => page.size() > page.min_size(),
        }
    }
}

/// The tree's header page: holds the current root page id.
pub struct HeaderPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> HeaderPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    pub fn root_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data.as_ref(), ROOT_PAGE_ID_OFFSET))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeaderPage<B> {
    pub fn init(&mut self) {
        self.set_root_page_id(INVALID_PAGE_ID);
    }

    pub fn set_root_page_id(&mut self, root: PageId) {
        write_u32(self.data.as_mut(), ROOT_PAGE_ID_OFFSET, root.as_u32());
    }
}
