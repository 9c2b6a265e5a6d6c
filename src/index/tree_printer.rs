//! Debugging aids for [`BPlusTree`]: text and Graphviz renderings, a
//! structural checker and file-driven bulk operations.
//!
//! None of these latch more than one page at a time, so they are only
//! meaningful while no writer is active.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::{Display, Write as _};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::common::{PageId, Result, StratumError, INVALID_PAGE_ID};

use super::{BPlusTree, BTreePage, FromInteger, KeyComparator, Storable};

/// Copy of one page's contents, taken under a short read latch.
enum Node<K> {
    Leaf {
        keys: Vec<K>,
        next: PageId,
        max_size: usize,
        min_size: usize,
    },
    Internal {
        /// Separator keys; `keys[i]` is the lower bound of `children[i + 1]`
        keys: Vec<K>,
        children: Vec<PageId>,
        max_size: usize,
        min_size: usize,
    },
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: Storable,
    V: Storable,
    C: KeyComparator<K>,
{
    fn snapshot(&self, page_id: PageId) -> Result<Node<K>> {
        let guard = self.bpm().fetch_page_read(page_id)?;
        Ok(match BTreePage::<_, K, V>::from_data(guard.data())? {
            BTreePage::Leaf(page) => Node::Leaf {
                keys: (0..page.size()).map(|i| page.key_at(i)).collect(),
                next: page.next_page_id(),
                max_size: page.max_size(),
                min_size: page.min_size(),
            },
            BTreePage::Internal(page) => Node::Internal {
                keys: (1..page.size()).map(|i| page.key_at(i)).collect(),
                children: (0..page.size()).map(|i| page.child_at(i)).collect(),
                max_size: page.max_size(),
                min_size: page.min_size(),
            },
        })
    }

    /// Walks the whole tree and checks its structure.
    ///
    /// Verifies key order inside pages, that keys fall between their parent's
    /// separators, page occupancy, equal leaf depth and that the leaf chain
    /// visits every leaf left to right. Returns the number of keys.
    pub fn check_integrity(&self) -> Result<usize> {
        let root = self.get_root_page_id()?;
        if !root.is_valid() {
            return Ok(0);
        }

        let mut walk = IntegrityWalk {
            leaves: Vec::new(),
            leaf_depth: None,
            keys: 0,
        };
        self.check_subtree(root, true, 0, None, None, &mut walk)?;

        for pair in walk.leaves.windows(2) {
            let (leaf, next) = (pair[0], pair[1]);
            if leaf.1 != next.0 {
                return Err(corrupted(format!(
                    "leaf {} links to {} instead of {}",
                    leaf.0, leaf.1, next.0
                )));
            }
        }
        if let Some(&(last, next)) = walk.leaves.last() {
            if next != INVALID_PAGE_ID {
                return Err(corrupted(format!("last leaf {} links to {}", last, next)));
            }
        }

        debug!(parent: self.span(), keys = walk.keys, leaves = walk.leaves.len(), "tree verified");
        Ok(walk.keys)
    }

    fn check_subtree(
        &self,
        page_id: PageId,
        is_root: bool,
        depth: usize,
        lower: Option<K>,
        upper: Option<K>,
        walk: &mut IntegrityWalk,
    ) -> Result<()> {
        let cmp = self.comparator();
        let in_range = |key: &K| {
            lower.map_or(true, |lo| cmp.compare(&lo, key) != Ordering::Greater)
                && upper.map_or(true, |hi| cmp.compare(key, &hi) == Ordering::Less)
        };
        let ascending = |keys: &[K]| {
            keys.windows(2)
                .all(|w| cmp.compare(&w[0], &w[1]) == Ordering::Less)
        };

        match self.snapshot(page_id)? {
            Node::Leaf {
                keys,
                next,
                max_size,
                min_size,
            } => {
                if keys.len() >= max_size {
                    return Err(corrupted(format!("leaf {} is full", page_id)));
                }
                let floor = if is_root { 1 } else { min_size };
                if keys.len() < floor {
                    return Err(corrupted(format!(
                        "leaf {} holds {} keys, below {}",
                        page_id,
                        keys.len(),
                        floor
                    )));
                }
                if !ascending(&keys) {
                    return Err(corrupted(format!("leaf {} keys out of order", page_id)));
                }
                if !keys.iter().all(in_range) {
                    return Err(corrupted(format!("leaf {} has keys outside its range", page_id)));
                }
                match walk.leaf_depth {
                    Some(d) if d != depth => {
                        return Err(corrupted(format!(
                            "leaf {} at depth {}, expected {}",
                            page_id, depth, d
                        )));
                    }
                    _ => walk.leaf_depth = Some(depth),
                }
                walk.keys += keys.len();
                walk.leaves.push((page_id, next));
                Ok(())
            }
            Node::Internal {
                keys,
                children,
                max_size,
                min_size,
            } => {
                let floor = if is_root { 2 } else { min_size };
                if children.len() > max_size || children.len() < floor {
                    return Err(corrupted(format!(
                        "internal page {} has {} children, allowed {}..={}",
                        page_id,
                        children.len(),
                        floor,
                        max_size
                    )));
                }
                if !ascending(&keys) || !keys.iter().all(in_range) {
                    return Err(corrupted(format!(
                        "internal page {} separators out of order",
                        page_id
                    )));
                }
                for (i, &child) in children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(keys[i - 1]) };
                    let hi = keys.get(i).copied().or(upper);
                    self.check_subtree(child, false, depth + 1, lo, hi, walk)?;
                }
                Ok(())
            }
        }
    }
}

struct IntegrityWalk {
    /// (leaf, its next pointer) in key order
    leaves: Vec<(PageId, PageId)>,
    leaf_depth: Option<usize>,
    keys: usize,
}

fn corrupted(msg: String) -> StratumError {
    StratumError::IndexCorrupted(msg)
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: Storable + Display,
    V: Storable,
    C: KeyComparator<K>,
{
    /// Renders the tree one level per line, e.g.
    ///
    /// ```text
    /// (P3: 4)
    /// [P1: 1,2,3]  [P2: 4,5]
    /// ```
    ///
    /// Internal pages show their separators, leaves their keys. An empty
    /// tree renders as `()`.
    pub fn draw_bplus_tree(&self) -> Result<String> {
        let root = self.get_root_page_id()?;
        if !root.is_valid() {
            return Ok("()".to_string());
        }

        let mut out = String::new();
        let mut level = VecDeque::from([root]);
        while !level.is_empty() {
            let mut next_level = VecDeque::new();
            let mut cells = Vec::with_capacity(level.len());
            for page_id in level {
                match self.snapshot(page_id)? {
                    Node::Leaf { keys, .. } => {
                        cells.push(format!("[P{}: {}]", page_id, join(&keys)));
                    }
                    Node::Internal { keys, children, .. } => {
                        cells.push(format!("(P{}: {})", page_id, join(&keys)));
                        next_level.extend(children);
                    }
                }
            }
            let _ = writeln!(out, "{}", cells.join("  "));
            level = next_level;
        }
        Ok(out)
    }

    /// Writes [`draw_bplus_tree`](Self::draw_bplus_tree) to `out`.
    pub fn print<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(self.draw_bplus_tree()?.as_bytes())?;
        Ok(())
    }

    /// Graphviz rendering with parent-child edges and the leaf chain.
    pub fn to_dot(&self) -> Result<String> {
        let mut out = String::from("digraph G {\n  node [shape=record];\n");
        let root = self.get_root_page_id()?;
        if root.is_valid() {
            let mut queue = VecDeque::from([root]);
            while let Some(page_id) = queue.pop_front() {
                match self.snapshot(page_id)? {
                    Node::Leaf { keys, next, .. } => {
                        let _ = writeln!(
                            out,
                            "  P{} [label=\"{}\" style=filled fillcolor=lightgreen];",
                            page_id.as_u32(),
                            join(&keys).replace(',', "|")
                        );
                        if next.is_valid() {
                            let _ = writeln!(
                                out,
                                "  P{} -> P{} [style=dashed];\n  {{rank=same P{} P{}}};",
                                page_id.as_u32(),
                                next.as_u32(),
                                page_id.as_u32(),
                                next.as_u32()
                            );
                        }
                    }
                    Node::Internal { keys, children, .. } => {
                        let mut label = String::from("<c0> ");
                        for (i, key) in keys.iter().enumerate() {
                            let _ = write!(label, "|{}|<c{}> ", key, i + 1);
                        }
                        let _ = writeln!(
                            out,
                            "  P{} [label=\"{}\" style=filled fillcolor=pink];",
                            page_id.as_u32(),
                            label
                        );
                        for (i, child) in children.iter().enumerate() {
                            let _ = writeln!(
                                out,
                                "  P{}:c{} -> P{};",
                                page_id.as_u32(),
                                i,
                                child.as_u32()
                            );
                        }
                        queue.extend(children);
                    }
                }
            }
        }
        out.push_str("}\n");
        Ok(out)
    }

    /// Writes [`to_dot`](Self::to_dot) to `path`.
    pub fn draw(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_dot()?)?;
        info!(parent: self.span(), path = %path.display(), "wrote tree graph");
        Ok(())
    }
}

fn join<K: Display>(keys: &[K]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl<K, V, C> BPlusTree<K, V, C>
where
    K: Storable + FromInteger,
    V: Storable + FromInteger,
    C: KeyComparator<K>,
{
    /// Inserts every whitespace-separated integer in the file, using it for
    /// both key and value. Returns how many were new.
    pub fn insert_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let mut inserted = 0;
        for n in read_integers(path.as_ref())? {
            if self.insert(&K::from_integer(n), &V::from_integer(n))? {
                inserted += 1;
            }
        }
        debug!(parent: self.span(), inserted, "bulk insert from file");
        Ok(inserted)
    }

    /// Removes every whitespace-separated integer in the file. Returns how
    /// many were present.
    pub fn remove_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let mut removed = 0;
        for n in read_integers(path.as_ref())? {
            if self.remove(&K::from_integer(n))? {
                removed += 1;
            }
        }
        debug!(parent: self.span(), removed, "bulk remove from file");
        Ok(removed)
    }
}

fn read_integers(path: &Path) -> Result<Vec<i64>> {
    fs::read_to_string(path)?
        .split_whitespace()
        .map(|token| {
            token.parse::<i64>().map_err(|e| {
                StratumError::from(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad integer {:?} in {}: {}", token, path.display(), e),
                ))
            })
        })
        .collect()
}
