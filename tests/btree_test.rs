//! Integration tests for B+Tree insert and lookup

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use stratum::buffer::BufferPoolManager;
use stratum::common::{PageId, RecordId, SlotId, StratumError};
use stratum::index::{BPlusTree, BPlusTreeConfig, FromInteger, GenericKey, IntegerComparator, OrdComparator};
use stratum::storage::disk::{FileDiskManager, MemoryDiskManager};
use tempfile::NamedTempFile;

type Tree = BPlusTree<i64, RecordId, OrdComparator>;

fn create_bpm(pool_size: usize) -> Arc<BufferPoolManager> {
    Arc::new(BufferPoolManager::new(
        pool_size,
        2,
        Arc::new(MemoryDiskManager::new()),
    ))
}

fn create_tree(bpm: &Arc<BufferPoolManager>, leaf: usize, internal: usize) -> Tree {
    let header = bpm.new_page_guarded().unwrap().page_id();
    BPlusTree::new("test_index", header, Arc::clone(bpm), OrdComparator, leaf, internal).unwrap()
}

fn rid(key: i64) -> RecordId {
    RecordId::from_integer(key)
}

#[test]
fn test_btree_insert_and_search() {
    let bpm = create_bpm(16);
    let tree = create_tree(&bpm, 4, 4);

    let record1 = RecordId::new(PageId::new(100), SlotId::new(0));
    let record2 = RecordId::new(PageId::new(100), SlotId::new(1));
    let record3 = RecordId::new(PageId::new(101), SlotId::new(0));

    assert!(tree.insert(&10, &record1).unwrap());
    assert!(tree.insert(&20, &record2).unwrap());
    assert!(tree.insert(&30, &record3).unwrap());

    assert_eq!(tree.get_value(&10).unwrap(), Some(record1));
    assert_eq!(tree.get_value(&20).unwrap(), Some(record2));
    assert_eq!(tree.get_value(&30).unwrap(), Some(record3));
    assert_eq!(tree.get_value(&15).unwrap(), None);
    assert!(!tree.is_empty().unwrap());
}

#[test]
fn test_btree_rejects_bad_sizes() {
    let bpm = create_bpm(4);
    let header = bpm.new_page_guarded().unwrap().page_id();

    let result: Result<Tree, _> =
        BPlusTree::new("bad", header, Arc::clone(&bpm), OrdComparator, 1, 4);
    assert!(matches!(result, Err(StratumError::InvalidTreeConfig(_))));

    let result: Result<Tree, _> =
        BPlusTree::new("bad", header, Arc::clone(&bpm), OrdComparator, 4, 2);
    assert!(matches!(result, Err(StratumError::InvalidTreeConfig(_))));

    let config = BPlusTreeConfig::for_types::<i64, RecordId>();
    let tree: Tree = BPlusTree::with_config("wide", header, bpm, OrdComparator, config).unwrap();
    assert_eq!(tree.config(), config);
}

#[test]
fn test_btree_duplicate_keys_rejected() {
    let bpm = create_bpm(16);
    let tree = create_tree(&bpm, 3, 3);

    for k in 0..20 {
        assert!(tree.insert(&k, &rid(k)).unwrap());
    }
    for k in 0..20 {
        assert!(!tree.insert(&k, &rid(k + 100)).unwrap());
        assert_eq!(tree.get_value(&k).unwrap(), Some(rid(k)));
    }
    assert_eq!(tree.check_integrity().unwrap(), 20);
}

#[test]
fn test_btree_sequential_insert_splits() {
    let bpm = create_bpm(32);
    let tree = create_tree(&bpm, 3, 3);

    let mut root_ids = Vec::new();
    for k in 1..=50 {
        tree.insert(&k, &rid(k)).unwrap();
        root_ids.push(tree.get_root_page_id().unwrap());
    }

    // The root changed at least once per level the tree grew
    root_ids.dedup();
    assert!(root_ids.len() >= 3);
    for k in 1..=50 {
        assert_eq!(tree.get_value(&k).unwrap(), Some(rid(k)));
    }
    assert_eq!(tree.check_integrity().unwrap(), 50);
}

#[test]
fn test_btree_shuffled_5000_keys() {
    let bpm = create_bpm(64);
    let tree = create_tree(&bpm, 5, 4);

    let mut keys: Vec<i64> = (1..=5000).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(0x5eed));

    for &k in &keys {
        assert!(tree.insert(&k, &rid(k)).unwrap());
    }
    for &k in &keys {
        assert_eq!(tree.get_value(&k).unwrap(), Some(rid(k)));
    }

    let scanned: Vec<i64> = tree.begin().unwrap().map(|item| item.unwrap().0).collect();
    assert_eq!(scanned, (1..=5000).collect::<Vec<_>>());
    assert_eq!(tree.check_integrity().unwrap(), 5000);

    // Nothing stays pinned between operations
    assert_eq!(bpm.get_pin_count(tree.header_page_id()).unwrap_or(0), 0);
}

#[test]
fn test_btree_generic_keys() {
    let bpm = create_bpm(32);
    let header = bpm.new_page_guarded().unwrap().page_id();
    let tree: BPlusTree<GenericKey<16>, RecordId, _> =
        BPlusTree::new("generic", header, bpm, IntegerComparator, 4, 4).unwrap();

    for k in (0..300i64).rev() {
        tree.insert(&GenericKey::from_integer(k), &rid(k)).unwrap();
    }
    for k in 0..300i64 {
        assert_eq!(tree.get_value(&GenericKey::from_integer(k)).unwrap(), Some(rid(k)));
    }
    assert_eq!(tree.check_integrity().unwrap(), 300);
}

#[test]
fn test_btree_persists_across_pools() {
    let temp_file = NamedTempFile::new().unwrap();
    let header;

    {
        let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
        let bpm = create_bpm_on(dm);
        let tree = create_tree(&bpm, 4, 4);
        header = tree.header_page_id();
        for k in 0..500 {
            tree.insert(&k, &rid(k)).unwrap();
        }
        bpm.flush_all_pages().unwrap();
    }

    let dm = Arc::new(FileDiskManager::new(temp_file.path()).unwrap());
    let bpm = create_bpm_on(dm);
    let tree: Tree = BPlusTree::open("test_index", header, bpm, OrdComparator, 4, 4).unwrap();
    assert_eq!(tree.check_integrity().unwrap(), 500);
    assert_eq!(tree.get_value(&499).unwrap(), Some(rid(499)));

    // New pages land above the ones already on disk
    assert!(tree.insert(&500, &rid(500)).unwrap());
    assert_eq!(tree.check_integrity().unwrap(), 501);
}

fn create_bpm_on(dm: Arc<FileDiskManager>) -> Arc<BufferPoolManager> {
    Arc::new(BufferPoolManager::new(32, 2, dm))
}

#[test]
fn test_btree_full_pool_leaves_tree_intact() {
    let bpm = create_bpm(6);
    let tree = create_tree(&bpm, 3, 3);

    // Three levels; the rightmost leaf holds [6, 7] and its parent has room
    for k in 0..8 {
        tree.insert(&k, &rid(k)).unwrap();
    }

    // Leave two frames: enough to latch parent and leaf, not to split
    let mut held = Vec::new();
    while let Ok(guard) = bpm.new_page_guarded() {
        held.push(guard);
    }
    held.truncate(held.len() - 2);

    assert!(matches!(
        tree.insert(&8, &rid(8)),
        Err(StratumError::BufferPoolFull)
    ));
    assert_eq!(tree.get_value(&8).unwrap(), None);

    drop(held);
    assert_eq!(tree.check_integrity().unwrap(), 8);
    assert!(tree.insert(&8, &rid(8)).unwrap());
    assert_eq!(tree.check_integrity().unwrap(), 9);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_insert_matches_btreemap(keys in prop::collection::vec(-1000i64..1000, 1..400)) {
        let bpm = create_bpm(48);
        let tree = create_tree(&bpm, 4, 3);
        let mut model = BTreeMap::new();

        for &k in &keys {
            let fresh = !model.contains_key(&k);
            prop_assert_eq!(tree.insert(&k, &rid(k)).unwrap(), fresh);
            model.entry(k).or_insert_with(|| rid(k));
        }

        let scanned: Vec<(i64, RecordId)> = tree.begin().unwrap().map(|item| item.unwrap()).collect();
        let expected: Vec<(i64, RecordId)> = model.into_iter().collect();
        prop_assert_eq!(tree.check_integrity().unwrap(), expected.len());
        prop_assert_eq!(scanned, expected);
    }
}
