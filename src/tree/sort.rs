//! Sorting and filtering over the cached tree

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::RemoteEntry;

/// Sort field for directory children
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Created,
    Modified,
}

/// Sort configuration applied at every loaded depth of the tree
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SortSpec {
    pub key: SortKey,
    pub ascending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Name,
            ascending: true,
        }
    }
}

impl SortSpec {
    fn compare(&self, a: &RemoteEntry, b: &RemoteEntry) -> Ordering {
        let ordering = match self.key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Created => a.created.cmp(&b.created),
            SortKey::Modified => a.modified.cmp(&b.modified),
        };
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Sort one directory's children in place (no recursion)
pub fn sort_children(children: &mut [RemoteEntry], spec: SortSpec) {
    // Stable sort: entries comparing equal keep their relative order, so
    // re-sorting on the same key is idempotent.
    children.sort_by(|a, b| spec.compare(a, b));
}

/// Recursively sort every loaded directory under `entry` with the same
/// comparator and direction. Unloaded directories have nothing to sort and
/// are skipped; they pick up the session's sort key when they load.
pub fn sort_tree(entry: &mut RemoteEntry, spec: SortSpec) {
    if !entry.is_loaded() {
        return;
    }
    if let Some(children) = entry.children.as_mut() {
        sort_children(children, spec);
        for child in children.iter_mut().filter(|c| c.is_dir) {
            sort_tree(child, spec);
        }
    }
}

/// Flat view of every already-loaded entry (any depth) whose name contains
/// `pattern`, case-sensitively. Does not mutate the tree.
pub fn filter_tree<'a>(root: &'a RemoteEntry, pattern: &str) -> Vec<&'a RemoteEntry> {
    let mut matches = Vec::new();
    collect_matches(root, pattern, &mut matches);
    matches
}

fn collect_matches<'a>(entry: &'a RemoteEntry, pattern: &str, out: &mut Vec<&'a RemoteEntry>) {
    let Some(children) = entry.children.as_ref() else {
        return;
    };
    for child in children {
        if child.name.contains(pattern) {
            out.push(child);
        }
        if child.is_dir {
            collect_matches(child, pattern, out);
        }
    }
}
