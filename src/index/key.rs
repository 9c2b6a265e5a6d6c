use std::fmt;

use bytes::{Buf, BufMut};

use crate::common::{PageId, RecordId, SlotId};

/// Fixed-width type that can live in an index page slot.
pub trait Storable: Copy + Send + Sync + fmt::Debug + 'static {
    /// Encoded width in bytes
    const SIZE: usize;

    fn write_to<B: BufMut>(&self, buf: &mut B);

    fn read_from<B: Buf>(buf: &mut B) -> Self;
}

/// Builds a key or value from an integer, for test drivers and bulk loads.
pub trait FromInteger {
    fn from_integer(value: i64) -> Self;
}

macro_rules! storable_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl Storable for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn write_to<B: BufMut>(&self, buf: &mut B) {
                buf.$put(*self);
            }

            fn read_from<B: Buf>(buf: &mut B) -> Self {
                buf.$get()
            }
        }

        impl FromInteger for $ty {
            fn from_integer(value: i64) -> Self {
                value as $ty
            }
        }
    };
}

storable_int!(u32, put_u32_le, get_u32_le);
storable_int!(i32, put_i32_le, get_i32_le);
storable_int!(u64, put_u64_le, get_u64_le);
storable_int!(i64, put_i64_le, get_i64_le);

impl Storable for PageId {
    const SIZE: usize = 4;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.as_u32());
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        PageId::new(buf.get_u32_le())
    }
}

impl Storable for RecordId {
    const SIZE: usize = 6;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_le(self.page_id.as_u32());
        buf.put_u16_le(self.slot_id.as_u16());
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let page_id = PageId::new(buf.get_u32_le());
        let slot_id = SlotId::new(buf.get_u16_le());
        RecordId::new(page_id, slot_id)
    }
}

impl FromInteger for RecordId {
    /// High 32 bits become the page id, the low bits the slot.
    fn from_integer(value: i64) -> Self {
        RecordId::new(
            PageId::new((value >> 32) as u32),
            SlotId::new(value as u16),
        )
    }
}

/// Fixed-width opaque key of `N` bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub fn new(data: [u8; N]) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }

    /// Integer stored in the leading bytes (little endian, at most 8).
    pub fn to_integer(&self) -> i64 {
        let mut raw = [0u8; 8];
        let n = N.min(8);
        raw[..n].copy_from_slice(&self.data[..n]);
        i64::from_le_bytes(raw)
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> FromInteger for GenericKey<N> {
    fn from_integer(value: i64) -> Self {
        let mut data = [0u8; N];
        let n = N.min(8);
        data[..n].copy_from_slice(&value.to_le_bytes()[..n]);
        Self { data }
    }
}

impl<const N: usize> Storable for GenericKey<N> {
    const SIZE: usize = N;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.data);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let mut data = [0u8; N];
        buf.copy_to_slice(&mut data);
        Self { data }
    }
}

impl<const N: usize> fmt::Debug for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericKey<{}>({})", N, self.to_integer())
    }
}

impl<const N: usize> fmt::Display for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_integer())
    }
}
