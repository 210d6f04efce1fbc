//! Hierarchical document tree construction.
//!
//! Turns a flat, organization-scoped list of document records into an ordered
//! forest for the navigation sidebar. The builder is pure and deterministic:
//! callers rebuild the whole tree after every fetch or mutation instead of
//! patching incrementally, which keeps correctness trivial for trees of the
//! sizes a wiki sees.
//!
//! Resilience over strictness: a record whose declared parent is missing from
//! the batch is promoted to a root (an orphan, not an error), and records
//! caught in a parent cycle are likewise promoted so that the output always
//! contains every input record exactly once and no node is its own ancestor.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::DbId;

/// The fields the tree builder needs from a document record.
///
/// Implemented by the persistence layer's row type; keeps this module free of
/// any database dependency.
pub trait TreeRecord {
    fn id(&self) -> DbId;
    fn parent_id(&self) -> Option<DbId>;
    /// Sibling sort key. `None` sorts after all present keys.
    fn sort_order(&self) -> Option<i64>;
    fn name(&self) -> &str;
}

/// A document with its ordered children, as produced by [`build_tree`].
#[derive(Debug, Clone, Serialize)]
pub struct DocumentNode<T> {
    #[serde(flatten)]
    pub record: T,
    pub children: Vec<DocumentNode<T>>,
}

/// Build the ordered forest for a flat batch of records.
///
/// A record becomes a root when it has no parent, its parent is not in the
/// batch, or it sits on a parent cycle. Every sibling list (and the root
/// list) is sorted by `sort_order` ascending, falling back to
/// case-insensitive name comparison when keys are equal or absent, with id as
/// the final tiebreak for full determinism.
pub fn build_tree<T: TreeRecord>(records: Vec<T>) -> Vec<DocumentNode<T>> {
    let ids: HashSet<DbId> = records.iter().map(|r| r.id()).collect();

    // Parent pointer restricted to parents present in this batch.
    let parent_in_batch: HashMap<DbId, Option<DbId>> = records
        .iter()
        .map(|r| (r.id(), r.parent_id().filter(|p| ids.contains(p))))
        .collect();

    let on_cycle = detect_cycles(&parent_in_batch);

    // Partition indices into roots and per-parent child lists.
    let mut roots: Vec<usize> = Vec::new();
    let mut child_indices: HashMap<DbId, Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        let id = record.id();
        match parent_in_batch[&id] {
            Some(parent) if !on_cycle.contains(&id) => {
                child_indices.entry(parent).or_default().push(idx);
            }
            _ => roots.push(idx),
        }
    }

    // Move records out of the flat vec as the forest is assembled.
    let mut slots: Vec<Option<T>> = records.into_iter().map(Some).collect();
    let mut forest: Vec<DocumentNode<T>> = roots
        .into_iter()
        .map(|idx| assemble(idx, &mut slots, &child_indices))
        .collect();
    sort_siblings(&mut forest);
    forest
}

/// Linear lookup over the flat (unsorted) collection.
pub fn find_in_list<T: TreeRecord>(records: &[T], id: DbId) -> Option<&T> {
    records.iter().find(|r| r.id() == id)
}

/// Identify every record that sits on a parent cycle.
///
/// Walks parent pointers from each node with an explicit path, three-state
/// marking (0 unvisited, 1 on current path, 2 resolved). When the walk
/// re-enters the current path, the path suffix from the re-entry point is the
/// cycle. Nodes that merely hang off a cycle are not themselves cyclic: once
/// the cycle members become roots, those chains attach beneath them normally.
fn detect_cycles(parent_in_batch: &HashMap<DbId, Option<DbId>>) -> HashSet<DbId> {
    let mut state: HashMap<DbId, u8> = HashMap::new();
    let mut on_cycle: HashSet<DbId> = HashSet::new();

    for &start in parent_in_batch.keys() {
        if state.get(&start).copied() == Some(2) {
            continue;
        }
        let mut path: Vec<DbId> = Vec::new();
        let mut current = start;
        loop {
            match state.get(&current).copied() {
                Some(2) => break,
                Some(1) => {
                    let entry = path
                        .iter()
                        .position(|&p| p == current)
                        .unwrap_or(path.len() - 1);
                    on_cycle.extend(path[entry..].iter().copied());
                    break;
                }
                _ => {}
            }
            state.insert(current, 1);
            path.push(current);
            match parent_in_batch.get(&current).copied().flatten() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        for visited in path {
            state.insert(visited, 2);
        }
    }
    on_cycle
}

/// Recursively take a record out of its slot and attach its sorted children.
fn assemble<T: TreeRecord>(
    idx: usize,
    slots: &mut Vec<Option<T>>,
    child_indices: &HashMap<DbId, Vec<usize>>,
) -> DocumentNode<T> {
    let record = slots[idx].take().expect("record consumed twice");
    let mut children: Vec<DocumentNode<T>> = child_indices
        .get(&record.id())
        .map(|indices| {
            indices
                .iter()
                .map(|&child| assemble(child, slots, child_indices))
                .collect()
        })
        .unwrap_or_default();
    sort_siblings(&mut children);
    DocumentNode { record, children }
}

fn sort_siblings<T: TreeRecord>(siblings: &mut [DocumentNode<T>]) {
    siblings.sort_by(|a, b| sibling_cmp(&a.record, &b.record));
}

/// Sibling comparator: `sort_order` ascending with absent keys last, then
/// case-insensitive name, then id.
fn sibling_cmp<T: TreeRecord>(a: &T, b: &T) -> Ordering {
    let by_order = match (a.sort_order(), b.sort_order()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_order
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        .then_with(|| a.id().cmp(&b.id()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
