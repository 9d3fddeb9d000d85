use std::fmt::Display;
use std::hash::Hash;

use crate::internal::common::error::BatchError;
use crate::internal::common::{Map, Set};

/// Arena-indexed dependency graph. Every edge insertion is checked for cycles first.
#[derive(Debug, Clone)]
pub struct DependencyGraph<Id: Eq + Hash> {
    parents: Map<Id, Vec<Id>>,
    children: Map<Id, Vec<Id>>,
}

impl<Id: Eq + Hash> Default for DependencyGraph<Id> {
    fn default() -> Self {
        DependencyGraph {
            parents: Default::default(),
            children: Default::default(),
        }
    }
}

impl<Id: Copy + Eq + Hash + Display> DependencyGraph<Id> {
    pub fn parents(&self, id: Id) -> &[Id] {
        self.parents.get(&id).map(|p| p.as_slice()).unwrap_or_default()
    }

    pub fn children(&self, id: Id) -> &[Id] {
        self.children.get(&id).map(|c| c.as_slice()).unwrap_or_default()
    }

    pub fn has_edge(&self, parent: Id, child: Id) -> bool {
        self.children(parent).contains(&child)
    }

    pub fn edge_count(&self) -> usize {
        self.children.values().map(|c| c.len()).sum()
    }

    /// Is there a directed path from `from` to `to`? (A node reaches itself.)
    pub fn is_reachable(&self, from: Id, to: Id) -> bool {
        let mut visited: Set<Id> = Set::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if visited.insert(id) {
                stack.extend(self.children(id).iter().copied());
            }
        }
        false
    }

    /// Adds `parent -> child`. The graph is left untouched when the edge would close a cycle.
    /// Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, parent: Id, child: Id) -> Result<(), BatchError> {
        if self.has_edge(parent, child) {
            return Ok(());
        }
        if self.is_reachable(child, parent) {
            return Err(BatchError::DependencyCycle(format!(
                "edge {parent} -> {child} would create a cycle"
            )));
        }
        self.children.entry(parent).or_default().push(child);
        self.parents.entry(child).or_default().push(parent);
        Ok(())
    }

    /// Length of the longest parent chain above each of `ids`.
    ///
    /// Levels are memoized across the whole walk, so every ancestor is evaluated once.
    pub fn top_levels(&self, ids: &[Id]) -> Map<Id, u32> {
        let mut levels: Map<Id, u32> = Map::new();
        for &id in ids {
            let mut stack = vec![id];
            while let Some(&current) = stack.last() {
                if levels.contains_key(&current) {
                    stack.pop();
                    continue;
                }
                let parents = self.parents(current);
                let pending: Vec<Id> = parents
                    .iter()
                    .copied()
                    .filter(|p| !levels.contains_key(p))
                    .collect();
                if pending.is_empty() {
                    let level = parents
                        .iter()
                        .filter_map(|p| levels.get(p))
                        .map(|l| l + 1)
                        .max()
                        .unwrap_or(0);
                    levels.insert(current, level);
                    stack.pop();
                } else {
                    stack.extend(pending);
                }
            }
        }
        levels
    }
}
