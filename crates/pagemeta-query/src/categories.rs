//! Category aggregation over slash-delimited hierarchical paths.
//!
//! An entry naming `/Categories/A/A1` contributes one occurrence to the node
//! `/Categories/A/A1`. Each node's cumulative count is its own count plus the
//! cumulative counts of its children, so ancestors total their subtree.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use pagemeta_core::{CategoryRow, MetadataEntry};

/// Canonical form of a category path: `/seg/seg`, segments trimmed, empty
/// segments dropped. `None` when no segment remains.
pub fn normalize_path(raw: &str) -> Option<String> {
    let segments: Vec<&str> = raw
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(format!("/{}", segments.join("/")))
    }
}

/// Distinct category paths per entry, counted across entries, sorted by path.
pub fn category_rows<'a, I>(entries: I, property: &str) -> Vec<CategoryRow>
where
    I: IntoIterator<Item = &'a MetadataEntry>,
{
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for entry in entries {
        let paths: BTreeSet<String> = entry
            .property_values(property)
            .filter_map(|v| normalize_path(&v.as_text()))
            .collect();
        for path in paths {
            *counts.entry(path).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(path, count)| CategoryRow { path, count })
        .collect()
}

/// One segment of the category hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub label: String,
    /// Full path from the root, e.g. `/Categories/A`.
    pub path: String,
    /// Entries naming exactly this path.
    pub count: u64,
    /// `count` plus the cumulative counts of all children.
    pub cumulative_count: u64,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    fn new(label: &str, path: String) -> Self {
        Self {
            label: label.to_string(),
            path,
            count: 0,
            cumulative_count: 0,
            children: Vec::new(),
        }
    }

    /// Find a descendant (or this node) by normalized path.
    pub fn find(&self, path: &str) -> Option<&CategoryNode> {
        if self.path == path {
            return Some(self);
        }
        let prefix = format!("{}/", self.path);
        if !path.starts_with(&prefix) {
            return None;
        }
        self.children.iter().find_map(|c| c.find(path))
    }

    /// Depth-first pre-order walk yielding `(depth, node)`; this node is depth 0.
    pub fn flatten(&self) -> Vec<(usize, &CategoryNode)> {
        let mut out = Vec::new();
        self.walk(0, &mut out);
        out
    }

    fn walk<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a CategoryNode)>) {
        out.push((depth, self));
        for child in &self.children {
            child.walk(depth + 1, out);
        }
    }

    fn finish(&mut self) -> u64 {
        self.children.sort_by(|a, b| a.label.cmp(&b.label));
        let below: u64 = self.children.iter_mut().map(CategoryNode::finish).sum();
        self.cumulative_count = self.count + below;
        self.cumulative_count
    }
}

/// Forest of category nodes; roots are the top-level segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTree {
    pub roots: Vec<CategoryNode>,
}

impl CategoryTree {
    /// Build the forest from per-path counts.
    pub fn from_rows(rows: &[CategoryRow]) -> Self {
        let mut roots: Vec<CategoryNode> = Vec::new();

        for row in rows {
            let Some(path) = normalize_path(&row.path) else {
                continue;
            };
            let mut level = &mut roots;
            let mut current = String::new();
            let segments: Vec<&str> = path.split('/').skip(1).collect();
            let last = segments.len() - 1;

            for (i, segment) in segments.into_iter().enumerate() {
                current.push('/');
                current.push_str(segment);
                let idx = match level.iter().position(|n| n.label == segment) {
                    Some(idx) => idx,
                    None => {
                        level.push(CategoryNode::new(segment, current.clone()));
                        level.len() - 1
                    }
                };
                if i == last {
                    level[idx].count += row.count;
                }
                level = &mut level[idx].children;
            }
        }

        roots.sort_by(|a, b| a.label.cmp(&b.label));
        for root in &mut roots {
            root.finish();
        }
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, path: &str) -> Option<&CategoryNode> {
        let path = normalize_path(path)?;
        self.roots.iter().find_map(|r| r.find(&path))
    }

    /// Depth-first walk over every root.
    pub fn flatten(&self) -> Vec<(usize, &CategoryNode)> {
        self.roots.iter().flat_map(|r| r.flatten()).collect()
    }
}

/// Aggregate `property` across `entries` into a category forest.
pub fn aggregate_categories<'a, I>(entries: I, property: &str) -> CategoryTree
where
    I: IntoIterator<Item = &'a MetadataEntry>,
{
    CategoryTree::from_rows(&category_rows(entries, property))
}
