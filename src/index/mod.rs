//! Disk-backed B+Tree index over the buffer pool.

mod b_plus_tree;
mod btree_page;
mod index_iterator;
mod internal_page;
mod key;
mod key_comparator;
mod leaf_page;
mod tree_printer;

pub use b_plus_tree::{BPlusTree, BPlusTreeConfig};
pub use btree_page::{page_type, BTreePage, HeaderPage, IndexPageType, COMMON_HEADER_SIZE};
pub use index_iterator::IndexIterator;
pub use internal_page::{InternalPage, INTERNAL_PAGE_HEADER_SIZE};
pub use key::{FromInteger, GenericKey, Storable};
pub use key_comparator::{BytewiseComparator, IntegerComparator, KeyComparator, OrdComparator};
pub use leaf_page::{LeafPage, LEAF_PAGE_HEADER_SIZE};
