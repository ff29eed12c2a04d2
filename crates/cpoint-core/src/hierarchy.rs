// ABOUTME: Parent/sub-community tree walks over an in-memory forest
// ABOUTME: Ancestor chains, deepest-first descendants, invitation join sets and owned subtrees
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! # Community Hierarchy
//!
//! Communities form a forest through a nullable `parent_community_id`. The
//! database layer loads every `(id, parent, creator)` triple in one query and
//! the membership rules walk the resulting [`CommunityForest`]:
//!
//! - joining a community joins its whole ancestor chain;
//! - leaving or deleting a community covers all its descendants, deepest first;
//! - demoting an owner walks the subtree of communities that user created.
//!
//! Stored data is not trusted to be acyclic, so every walk carries a visited set.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

/// One community as seen by the tree walks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunityNode {
    /// Community id
    pub id: i64,
    /// Parent community, if nested
    pub parent_id: Option<i64>,
    /// Current owner
    pub creator_id: Uuid,
}

/// Adjacency view of all communities
#[derive(Debug, Clone, Default)]
pub struct CommunityForest {
    nodes: HashMap<i64, CommunityNode>,
    children: HashMap<i64, Vec<i64>>,
}

impl CommunityForest {
    /// Build the forest; children are kept in ascending id order
    pub fn from_nodes(nodes: impl IntoIterator<Item = CommunityNode>) -> Self {
        let mut forest = Self::default();
        for node in nodes {
            if let Some(parent) = node.parent_id {
                forest.children.entry(parent).or_default().push(node.id);
            }
            forest.nodes.insert(node.id, node);
        }
        for kids in forest.children.values_mut() {
            kids.sort_unstable();
        }
        forest
    }

    /// Whether the community exists
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Node lookup
    #[must_use]
    pub fn node(&self, id: i64) -> Option<&CommunityNode> {
        self.nodes.get(&id)
    }

    /// Direct children of a community
    #[must_use]
    pub fn children(&self, id: i64) -> &[i64] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Ancestors of `id`, direct parent first, ending at the root.
    ///
    /// Stops at the first unknown id or at a repeated id.
    #[must_use]
    pub fn parent_chain(&self, id: i64) -> Vec<i64> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);

        while let Some(parent) = current {
            if !visited.insert(parent) {
                break;
            }
            chain.push(parent);
            current = self.nodes.get(&parent).and_then(|n| n.parent_id);
        }
        chain
    }

    /// `id` and all its descendants, deepest level first.
    ///
    /// Deleting in this order never leaves a child pointing at a removed parent.
    #[must_use]
    pub fn descendants_deepest_first(&self, id: i64) -> Vec<i64> {
        let mut levels: Vec<(usize, i64)> = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(0_usize, id)]);

        while let Some((depth, current)) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            levels.push((depth, current));
            for child in self.children(current) {
                queue.push_back((depth + 1, *child));
            }
        }

        // stable: siblings keep BFS order within a level
        levels.sort_by(|a, b| b.0.cmp(&a.0));
        levels.into_iter().map(|(_, community)| community).collect()
    }

    /// Communities joined when accepting an invitation to `target`.
    ///
    /// Order: the target, then its parents (the explicit list when given,
    /// otherwise the parent chain), then every nested community followed by
    /// its own ancestors. Duplicates keep their first position.
    #[must_use]
    pub fn join_set(
        &self,
        target: i64,
        explicit_parents: Option<&[i64]>,
        nested: &[i64],
    ) -> Vec<i64> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |community: i64| {
            if seen.insert(community) {
                ordered.push(community);
            }
        };

        push(target);
        match explicit_parents {
            Some(parents) => parents.iter().copied().for_each(&mut push),
            None => self.parent_chain(target).into_iter().for_each(&mut push),
        }
        for nested_id in nested {
            push(*nested_id);
            self.parent_chain(*nested_id).into_iter().for_each(&mut push);
        }
        ordered
    }

    /// Descendants of `root` (excluding it) reachable only through
    /// communities created by `owner`.
    #[must_use]
    pub fn owned_descendants(&self, root: i64, owner: Uuid) -> Vec<i64> {
        let mut found = Vec::new();
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);

        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                let owned = self
                    .nodes
                    .get(child)
                    .is_some_and(|n| n.creator_id == owner);
                if owned && visited.insert(*child) {
                    found.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        found
    }

    /// Whether re-parenting `id` under `new_parent` would create a loop
    #[must_use]
    pub fn would_create_cycle(&self, id: i64, new_parent: i64) -> bool {
        id == new_parent || self.parent_chain(new_parent).contains(&id)
    }

    /// Whether `ancestor` is on the parent chain of `id`
    #[must_use]
    pub fn is_ancestor(&self, ancestor: i64, id: i64) -> bool {
        self.parent_chain(id).contains(&ancestor)
    }
}
