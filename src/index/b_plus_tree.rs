use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use tracing::{debug, trace, warn, Span};

use crate::buffer::{BufferPoolManager, ReadPageGuard, WritePageGuard};
use crate::common::{
    PageId, Result, StratumError, INVALID_PAGE_ID, MIN_INTERNAL_MAX_SIZE, MIN_LEAF_MAX_SIZE,
    PAGE_SIZE,
};

use super::{
    BTreePage, HeaderPage, IndexIterator, InternalPage, KeyComparator, LeafPage, Storable,
};

/// Page fan-out limits for one tree.
///
/// A leaf splits as soon as it reaches `leaf_max_size`. An internal page
/// splits once it exceeds `internal_max_size`, so it needs one spare slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BPlusTreeConfig {
    pub leaf_max_size: usize,
    pub internal_max_size: usize,
}

impl BPlusTreeConfig {
    pub fn new(leaf_max_size: usize, internal_max_size: usize) -> Self {
        Self {
            leaf_max_size,
            internal_max_size,
        }
    }

    /// Largest sizes that fit a page for these key and value types.
    pub fn for_types<K: Storable, V: Storable>() -> Self {
        Self {
            leaf_max_size: LeafPage::<&[u8], K, V>::capacity(),
            internal_max_size: InternalPage::<&[u8], K>::capacity() - 1,
        }
    }

    pub fn validate<K: Storable, V: Storable>(&self) -> Result<()> {
        if self.leaf_max_size < MIN_LEAF_MAX_SIZE {
            return Err(StratumError::InvalidTreeConfig(format!(
                "leaf max size {} is below {}",
                self.leaf_max_size, MIN_LEAF_MAX_SIZE
            )));
        }
        if self.internal_max_size < MIN_INTERNAL_MAX_SIZE {
            return Err(StratumError::InvalidTreeConfig(format!(
                "internal max size {} is below {}",
                self.internal_max_size, MIN_INTERNAL_MAX_SIZE
            )));
        }
        let leaf_capacity = LeafPage::<&[u8], K, V>::capacity();
        if self.leaf_max_size > leaf_capacity {
            return Err(StratumError::InvalidTreeConfig(format!(
                "leaf max size {} exceeds page capacity {}",
                self.leaf_max_size, leaf_capacity
            )));
        }
        let internal_capacity = InternalPage::<&[u8], K>::capacity();
        if self.internal_max_size + 1 > internal_capacity {
            return Err(StratumError::InvalidTreeConfig(format!(
                "internal max size {} leaves no spare slot in page capacity {}",
                self.internal_max_size, internal_capacity
            )));
        }
        Ok(())
    }
}

/// Write latches held by one structural operation.
struct Context<'a> {
    /// Header latch, held until a node below is known to absorb the change
    header: Option<WritePageGuard<'a>>,
    root_page_id: PageId,
    /// Latched internal pages, top down, with the child slot taken from each
    write_set: Vec<(WritePageGuard<'a>, usize)>,
}

impl Context<'_> {
    fn release_all_write_locks(&mut self) {
        self.header = None;
        self.write_set.clear();
    }

    fn set_root(&mut self, root: PageId) -> Result<()> {
        let header = self.header.as_mut().ok_or_else(|| {
            StratumError::IndexCorrupted("root changed without holding the header".into())
        })?;
        HeaderPage::new(header.data_mut()).set_root_page_id(root);
        Ok(())
    }
}

/// A sibling latched ahead of a delete, and what to do with it.
struct Rebalance<'a> {
    sibling: WritePageGuard<'a>,
    sibling_on_right: bool,
    merge: bool,
}

/// Where a read-only descent should end up.
enum Descent<'k, K> {
    Leftmost,
    Key(&'k K),
}

/// Disk-backed B+Tree with unique keys.
///
/// Every operation starts at the header page to find the root. Reads crab
/// down with shared latches, dropping the parent once the child is latched.
/// Inserts and removes crab with exclusive latches and keep an ancestor only
/// while a split or merge could still reach it.
pub struct BPlusTree<K, V, C> {
    index_name: String,
    header_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
    span: Span,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: Storable,
    V: Storable,
    C: KeyComparator<K>,
{
    /// Creates an empty tree rooted at the pre-allocated `header_page_id`.
    pub fn new(
        index_name: impl Into<String>,
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        let tree = Self::open(
            index_name,
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        )?;
        {
            let mut header = tree.bpm.fetch_page_write(header_page_id)?;
            HeaderPage::new(header.data_mut()).init();
        }
        debug!(parent: &tree.span, header_page_id = %header_page_id, "created empty tree");
        Ok(tree)
    }

    /// Attaches to a tree whose header page already exists.
    pub fn open(
        index_name: impl Into<String>,
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        BPlusTreeConfig::new(leaf_max_size, internal_max_size).validate::<K, V>()?;
        let index_name = index_name.into();
        let span = tracing::debug_span!("bplus_tree", index = %index_name);

        Ok(Self {
            index_name,
            header_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
            span,
            _marker: PhantomData,
        })
    }

    /// Creates an empty tree sized by `config`.
    pub fn with_config(
        index_name: impl Into<String>,
        header_page_id: PageId,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        config: BPlusTreeConfig,
    ) -> Result<Self> {
        Self::new(
            index_name,
            header_page_id,
            bpm,
            comparator,
            config.leaf_max_size,
            config.internal_max_size,
        )
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn config(&self) -> BPlusTreeConfig {
        BPlusTreeConfig::new(self.leaf_max_size, self.internal_max_size)
    }

    pub(crate) fn bpm(&self) -> &BufferPoolManager {
        &self.bpm
    }

    pub(crate) fn comparator(&self) -> &C {
        &self.comparator
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    pub fn get_root_page_id(&self) -> Result<PageId> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(HeaderPage::new(header.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.get_root_page_id()?.is_valid())
    }

    /// Point lookup.
    pub fn get_value(&self, key: &K) -> Result<Option<V>> {
        let Some(guard) = self.find_leaf_read(Descent::Key(key))? else {
            return Ok(None);
        };
        Ok(LeafPage::<_, K, V>::new(guard.data()).lookup(key, &self.comparator))
    }

    /// Iterator from the smallest key.
    pub fn begin(&self) -> Result<IndexIterator<'_, K, V>> {
        match self.find_leaf_read(Descent::Leftmost)? {
            Some(guard) => IndexIterator::at(&self.bpm, guard, 0),
            None => Ok(self.end()),
        }
    }

    /// Iterator from the first key not less than `key`.
    pub fn begin_at(&self, key: &K) -> Result<IndexIterator<'_, K, V>> {
        match self.find_leaf_read(Descent::Key(key))? {
            Some(guard) => {
                let index = LeafPage::<_, K, V>::new(guard.data()).lower_bound(key, &self.comparator);
                IndexIterator::at(&self.bpm, guard, index)
            }
            None => Ok(self.end()),
        }
    }

    pub fn end(&self) -> IndexIterator<'_, K, V> {
        IndexIterator::end(&self.bpm)
    }

    /// Descends with shared latches, releasing each parent once its child is latched.
    ///
    /// Returns None for an empty tree or a dangling child pointer.
    fn find_leaf_read(&self, descent: Descent<'_, K>) -> Result<Option<ReadPageGuard<'_>>> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root = HeaderPage::new(header.data()).root_page_id();
        if !root.is_valid() {
            return Ok(None);
        }
        let mut guard = self.bpm.fetch_page_read(root)?;
        drop(header);

        loop {
            let child = match BTreePage::<_, K, V>::from_data(guard.data())? {
                BTreePage::Leaf(_) => None,
                BTreePage::Internal(page) => Some(match descent {
                    Descent::Leftmost => page.child_at(0),
                    Descent::Key(key) => page.child_at(page.lookup(key, &self.comparator)),
                }),
            };
            let Some(child) = child else {
                return Ok(Some(guard));
            };
            if !child.is_valid() {
                warn!(parent: &self.span, page_id = %guard.page_id(), "dangling child pointer");
                return Ok(None);
            }
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    /// Descends with exclusive latches to the leaf for `key`. Ancestors are
    /// released whenever the current page is safe for the operation.
    ///
    /// Returns None for an empty tree.
    fn find_leaf_write<'a>(
        &'a self,
        key: &K,
        header: WritePageGuard<'a>,
        is_safe: impl Fn(&BTreePage<&[u8; PAGE_SIZE], K, V>, bool) -> bool,
    ) -> Result<Option<(Context<'a>, WritePageGuard<'a>)>> {
        let root = HeaderPage::new(header.data()).root_page_id();
        if !root.is_valid() {
            return Ok(None);
        }
        let mut ctx = Context {
            header: Some(header),
            root_page_id: root,
            write_set: Vec::new(),
        };
        let mut guard = self.bpm.fetch_page_write(root)?;

        loop {
            let page = BTreePage::<_, K, V>::from_data(guard.data())?;
            let is_root = guard.page_id() == ctx.root_page_id;
            if is_safe(&page, is_root) {
                ctx.release_all_write_locks();
            }
            let step = match &page {
                BTreePage::Leaf(_) => None,
                BTreePage::Internal(internal) => {
                    let index = internal.lookup(key, &self.comparator);
                    Some((index, internal.child_at(index)))
                }
            };
            let Some((index, child)) = step else {
                return Ok(Some((ctx, guard)));
            };
            if !child.is_valid() {
                return Err(StratumError::IndexCorrupted(format!(
                    "page {} has an invalid child at slot {}",
                    guard.page_id(),
                    index
                )));
            }
            let next = self.bpm.fetch_page_write(child)?;
            ctx.write_set.push((guard, index));
            guard = next;
        }
    }

    /// Inserts a unique key. Returns false, changing nothing, if the key exists.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool> {
        let mut header = self.bpm.fetch_page_write(self.header_page_id)?;

        if !HeaderPage::new(header.data()).root_page_id().is_valid() {
            let mut root = self.bpm.new_page_guarded()?.upgrade_write();
            let root_id = root.page_id();
            let mut leaf = LeafPage::<_, K, V>::new(root.data_mut());
            leaf.init(self.leaf_max_size);
            leaf.insert(key, value, &self.comparator);
            HeaderPage::new(header.data_mut()).set_root_page_id(root_id);
            debug!(parent: &self.span, root = %root_id, "started new tree");
            return Ok(true);
        }

        let Some((mut ctx, mut leaf_guard)) =
            self.find_leaf_write(key, header, |page, _| page.is_insert_safe())?
        else {
            return Err(StratumError::IndexCorrupted("root vanished during insert".into()));
        };

        let leaf = LeafPage::<_, K, V>::new(leaf_guard.data());
        if leaf.lookup(key, &self.comparator).is_some() {
            return Ok(false);
        }

        // Allocate every page a split cascade needs before touching anything
        let mut needed = 0;
        if leaf.size() + 1 >= leaf.max_size() {
            needed += 1;
            let mut reaches_root = true;
            for (guard, _) in ctx.write_set.iter().rev() {
                let parent = InternalPage::<_, K>::new(guard.data());
                if parent.size() < parent.max_size() {
                    reaches_root = false;
                    break;
                }
                needed += 1;
            }
            if reaches_root {
                needed += 1;
            }
        }
        let mut fresh = self.allocate_pages(needed)?;

        let mut leaf = LeafPage::<_, K, V>::new(leaf_guard.data_mut());
        leaf.insert(key, value, &self.comparator);
        if leaf.size() < leaf.max_size() {
            return Ok(true);
        }

        let mut right_guard = Self::take_page(&mut fresh)?;
        let mut right_id = right_guard.page_id();
        let mut right = LeafPage::<_, K, V>::new(right_guard.data_mut());
        right.init(self.leaf_max_size);
        leaf.move_half_to(&mut right, right_id);
        let mut separator = right.key_at(0);
        let mut left_id = leaf_guard.page_id();
        trace!(parent: &self.span, left = %left_id, right = %right_id, "split leaf");
        drop(right_guard);
        drop(leaf_guard);

        loop {
            let Some((mut parent_guard, index)) = ctx.write_set.pop() else {
                let mut root_guard = Self::take_page(&mut fresh)?;
                let root_id = root_guard.page_id();
                let mut root = InternalPage::<_, K>::new(root_guard.data_mut());
                root.init(self.internal_max_size);
                root.populate_new_root(left_id, &separator, right_id);
                ctx.set_root(root_id)?;
                debug!(parent: &self.span, root = %root_id, "tree grew a level");
                return Ok(true);
            };

            let parent_id = parent_guard.page_id();
            let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());
            parent.insert_at(index + 1, &separator, right_id);
            if parent.size() <= parent.max_size() {
                return Ok(true);
            }

            let mut sibling_guard = Self::take_page(&mut fresh)?;
            let sibling_id = sibling_guard.page_id();
            let mut sibling = InternalPage::<_, K>::new(sibling_guard.data_mut());
            sibling.init(self.internal_max_size);
            separator = parent.move_half_to(&mut sibling);
            left_id = parent_id;
            right_id = sibling_id;
            trace!(parent: &self.span, left = %left_id, right = %right_id, "split internal page");
        }
    }

    /// Allocates `count` write-latched pages, or none at all.
    fn allocate_pages(&self, count: usize) -> Result<Vec<WritePageGuard<'_>>> {
        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            match self.bpm.new_page_guarded() {
                Ok(guard) => pages.push(guard.upgrade_write()),
                Err(e) => {
                    let ids: Vec<PageId> = pages.iter().map(|g| g.page_id()).collect();
                    drop(pages);
                    for page_id in ids {
                        if let Err(e) = self.bpm.delete_page(page_id) {
                            warn!(parent: &self.span, page_id = %page_id, error = %e, "failed to release reserved page");
                        }
                    }
                    debug!(parent: &self.span, count, "could not reserve pages for split");
                    return Err(e);
                }
            }
        }
        Ok(pages)
    }

    fn take_page<'a>(fresh: &mut Vec<WritePageGuard<'a>>) -> Result<WritePageGuard<'a>> {
        fresh
            .pop()
            .ok_or_else(|| StratumError::IndexCorrupted("split needed more pages than reserved".into()))
    }

    /// Removes `key`. Returns false if it was absent.
    pub fn remove(&self, key: &K) -> Result<bool> {
        loop {
            if let Some(removed) = self.try_remove(key)? {
                return Ok(removed);
            }
            thread::yield_now();
        }
    }

    /// One attempt at `remove`. Returns None, having changed nothing, when a
    /// left sibling was latched by someone else.
    ///
    /// Scans latch leaves left to right, so a left sibling is only ever
    /// try-latched while its right neighbour is held.
    fn try_remove(&self, key: &K) -> Result<Option<bool>> {
        let header = self.bpm.fetch_page_write(self.header_page_id)?;
        let Some((mut ctx, mut node_guard)) =
            self.find_leaf_write(key, header, |page, is_root| page.is_remove_safe(is_root))?
        else {
            return Ok(Some(false));
        };

        let leaf = LeafPage::<_, K, V>::new(node_guard.data());
        if leaf.lookup(key, &self.comparator).is_none() {
            return Ok(Some(false));
        }

        // Latch every sibling the fix-up will touch before changing anything
        let mut fixes: Vec<Rebalance<'_>> = Vec::new();
        let mut node_id = node_guard.page_id();
        let mut size_after = leaf.size() - 1;
        let mut min_size = leaf.min_size();
        let mut max_size = leaf.max_size();
        let mut is_leaf = true;
        let mut level = ctx.write_set.len();

        while level > 0 && node_id != ctx.root_page_id && size_after < min_size {
            let (parent_guard, index) = &ctx.write_set[level - 1];
            let index = *index;
            let parent = InternalPage::<_, K>::new(parent_guard.data());
            if parent.size() < 2 {
                return Err(StratumError::IndexCorrupted(format!(
                    "internal page {} has fewer than two children",
                    parent_guard.page_id()
                )));
            }
            let sibling_on_right = index + 1 < parent.size();
            let sibling_id = if sibling_on_right {
                parent.child_at(index + 1)
            } else {
                parent.child_at(index - 1)
            };
            let parent_id = parent_guard.page_id();
            let (parent_size, parent_min, parent_max) =
                (parent.size(), parent.min_size(), parent.max_size());

            let sibling = if sibling_on_right {
                self.bpm.fetch_page_write(sibling_id)?
            } else {
                match self.bpm.try_fetch_page_write(sibling_id)? {
                    Some(sibling) => sibling,
                    None => {
                        trace!(parent: &self.span, page_id = %sibling_id, "left sibling busy, retrying remove");
                        return Ok(None);
                    }
                }
            };
            let sibling_size = BTreePage::<_, K, V>::from_data(sibling.data())?.size();
            let merge = if is_leaf {
                size_after + sibling_size < max_size
            } else {
                size_after + sibling_size <= max_size
            };
            fixes.push(Rebalance {
                sibling,
                sibling_on_right,
                merge,
            });
            if !merge {
                break;
            }

            level -= 1;
            node_id = parent_id;
            size_after = parent_size - 1;
            min_size = parent_min;
            max_size = parent_max;
            is_leaf = false;
        }

        LeafPage::<_, K, V>::new(node_guard.data_mut()).remove(key, &self.comparator);

        let mut deleted = Vec::new();
        let mut node_is_leaf = true;
        for fix in fixes {
            let Some((mut parent_guard, index)) = ctx.write_set.pop() else {
                return Err(StratumError::IndexCorrupted("rebalance above the latched path".into()));
            };
            if fix.merge {
                let gone = if fix.sibling_on_right {
                    fix.sibling.page_id()
                } else {
                    node_guard.page_id()
                };
                deleted.push(gone);
            }
            self.rebalance(&mut node_guard, &mut parent_guard, index, fix, node_is_leaf);
            node_guard = parent_guard;
            node_is_leaf = false;
        }

        if node_guard.page_id() == ctx.root_page_id {
            let new_root = match BTreePage::<_, K, V>::from_data(node_guard.data())? {
                BTreePage::Leaf(page) if page.size() == 0 => Some(INVALID_PAGE_ID),
                BTreePage::Internal(page) if page.size() == 1 => Some(page.child_at(0)),
                _ => None,
            };
            if let Some(new_root) = new_root {
                ctx.set_root(new_root)?;
                deleted.push(node_guard.page_id());
                debug!(parent: &self.span, root = %new_root, "tree shrank a level");
            }
        }

        drop(node_guard);
        drop(ctx);
        for page_id in deleted {
            match self.bpm.delete_page(page_id) {
                Ok(true) => trace!(parent: &self.span, page_id = %page_id, "freed page"),
                Ok(false) => debug!(parent: &self.span, page_id = %page_id, "emptied page still pinned, not freed"),
                Err(e) => warn!(parent: &self.span, page_id = %page_id, error = %e, "failed to free page"),
            }
        }
        Ok(Some(true))
    }

    /// Restores `node`'s occupancy using the latched sibling: merge the right
    /// page of the pair into the left, or move one entry across.
    fn rebalance(
        &self,
        node_guard: &mut WritePageGuard<'_>,
        parent_guard: &mut WritePageGuard<'_>,
        index: usize,
        fix: Rebalance<'_>,
        node_is_leaf: bool,
    ) {
        let Rebalance {
            mut sibling,
            sibling_on_right,
            merge,
        } = fix;
        let mut parent = InternalPage::<_, K>::new(parent_guard.data_mut());
        let sep_index = if sibling_on_right { index + 1 } else { index };

        if node_is_leaf {
            let mut node = LeafPage::<_, K, V>::new(node_guard.data_mut());
            let mut sib = LeafPage::<_, K, V>::new(sibling.data_mut());
            match (sibling_on_right, merge) {
                (true, true) => sib.move_all_to(&mut node),
                (false, true) => node.move_all_to(&mut sib),
                (true, false) => {
                    let (k, v) = sib.remove_at(0);
                    node.insert_at(node.size(), &k, &v);
                    parent.set_key_at(sep_index, &sib.key_at(0));
                }
                (false, false) => {
                    let (k, v) = sib.remove_at(sib.size() - 1);
                    node.insert_at(0, &k, &v);
                    parent.set_key_at(sep_index, &k);
                }
            }
        } else {
            let middle = parent.key_at(sep_index);
            let mut node = InternalPage::<_, K>::new(node_guard.data_mut());
            let mut sib = InternalPage::<_, K>::new(sibling.data_mut());
            match (sibling_on_right, merge) {
                (true, true) => sib.move_all_to(&mut node, &middle),
                (false, true) => node.move_all_to(&mut sib, &middle),
                (true, false) => {
                    let separator = sib.move_first_to_end_of(&mut node, &middle);
                    parent.set_key_at(sep_index, &separator);
                }
                (false, false) => {
                    let separator = sib.move_last_to_front_of(&mut node, &middle);
                    parent.set_key_at(sep_index, &separator);
                }
            }
        }

        if merge {
            parent.remove_at(sep_index);
        }
        trace!(
            parent: &self.span,
            merge,
            sibling_on_right,
            leaf = node_is_leaf,
            "rebalanced after delete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RecordId;
    use crate::index::{FromInteger, GenericKey, IntegerComparator, OrdComparator};
    use crate::storage::disk::MemoryDiskManager;

    fn create_tree(leaf: usize, internal: usize) -> BPlusTree<u32, RecordId, OrdComparator> {
        let bpm = Arc::new(BufferPoolManager::new(
            64,
            2,
            Arc::new(MemoryDiskManager::new()),
        ));
        let header = bpm.new_page_guarded().unwrap().page_id();
        BPlusTree::new("test", header, bpm, OrdComparator, leaf, internal).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(BPlusTreeConfig::new(1, 3).validate::<u32, RecordId>().is_err());
        assert!(BPlusTreeConfig::new(2, 2).validate::<u32, RecordId>().is_err());
        assert!(BPlusTreeConfig::new(2, 3).validate::<u32, RecordId>().is_ok());

        let full = BPlusTreeConfig::for_types::<u32, RecordId>();
        assert!(full.validate::<u32, RecordId>().is_ok());
        assert!(BPlusTreeConfig::new(full.leaf_max_size + 1, 3)
            .validate::<u32, RecordId>()
            .is_err());
        assert!(BPlusTreeConfig::new(2, full.internal_max_size + 1)
            .validate::<u32, RecordId>()
            .is_err());
    }

    #[test]
    fn test_empty_tree() {
        let tree = create_tree(4, 4);
        assert!(tree.is_empty().unwrap());
        assert_eq!(tree.get_value(&1).unwrap(), None);
        assert!(!tree.remove(&1).unwrap());
        assert!(tree.begin().unwrap().is_end());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let tree = create_tree(4, 4);
        assert!(tree.insert(&1, &RecordId::from_integer(1)).unwrap());
        assert!(!tree.insert(&1, &RecordId::from_integer(2)).unwrap());
        assert_eq!(tree.get_value(&1).unwrap(), Some(RecordId::from_integer(1)));
    }

    #[test]
    fn test_split_grows_root() {
        let tree = create_tree(3, 3);
        for k in 1..=3u32 {
            tree.insert(&k, &RecordId::from_integer(k as i64)).unwrap();
        }
        let root = tree.get_root_page_id().unwrap();
        let guard = tree.bpm().fetch_page_read(root).unwrap();
        let page = BTreePage::<_, u32, RecordId>::from_data(guard.data()).unwrap();
        assert!(!page.is_leaf());
        assert_eq!(page.size(), 2);
    }

    #[test]
    fn test_remove_last_key_empties_tree() {
        let tree = create_tree(4, 4);
        tree.insert(&7, &RecordId::from_integer(7)).unwrap();
        let root = tree.get_root_page_id().unwrap();

        assert!(tree.remove(&7).unwrap());
        assert!(tree.is_empty().unwrap());
        assert!(!tree.bpm().is_resident(root));
    }

    #[test]
    fn test_generic_keys_with_integer_comparator() {
        let bpm = Arc::new(BufferPoolManager::new(
            32,
            2,
            Arc::new(MemoryDiskManager::new()),
        ));
        let header = bpm.new_page_guarded().unwrap().page_id();
        let tree: BPlusTree<GenericKey<8>, RecordId, _> =
            BPlusTree::new("generic", header, bpm, IntegerComparator, 3, 3).unwrap();

        for k in (-20..20i64).rev() {
            assert!(tree
                .insert(&GenericKey::from_integer(k), &RecordId::from_integer(k))
                .unwrap());
        }
        let keys: Vec<i64> = tree
            .begin()
            .unwrap()
            .map(|item| item.unwrap().0.to_integer())
            .collect();
        assert_eq!(keys, (-20..20).collect::<Vec<_>>());
    }
}
