// src/params/tree.rs

use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::error::{ComponentError, Result};

use super::weight::WeightParams;

/// Nested mapping from names to leaves.
///
/// The same topology is used twice: as a specification (`WeightTree`) and as
/// a realized value (`ArrayTree`). Keys live in a `BTreeMap` so iteration
/// order is canonical.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree<L> {
    Leaf(L),
    Node(BTreeMap<String, Tree<L>>),
}

/// Specification tree.
pub type WeightTree = Tree<WeightParams>;
/// Realized tree.
pub type ArrayTree = Tree<ArrayD<f32>>;

impl<L> Tree<L> {
    pub fn leaf(value: L) -> Self {
        Tree::Leaf(value)
    }

    pub fn node<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Tree<L>)>,
    {
        Tree::Node(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn empty() -> Self {
        Tree::Node(BTreeMap::new())
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Tree::Leaf(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Tree::Leaf(_) => 1,
            Tree::Node(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Tree::Node(children) if children.is_empty())
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Tree::Leaf(_) => Vec::new(),
            Tree::Node(children) => children.keys().map(String::as_str).collect(),
        }
    }

    /// Child sub-tree under `key`.
    pub fn get(&self, key: &str) -> Result<&Tree<L>> {
        match self {
            Tree::Node(children) => children
                .get(key)
                .ok_or_else(|| ComponentError::MissingParam { key: key.to_string() }),
            Tree::Leaf(_) => Err(ComponentError::TopologyMismatch {
                path: key.to_string(),
                reason: "expected a mapping, found a leaf".to_string(),
            }),
        }
    }

    pub fn get_leaf(&self, key: &str) -> Result<&L> {
        match self.get(key)? {
            Tree::Leaf(value) => Ok(value),
            Tree::Node(_) => Err(ComponentError::TopologyMismatch {
                path: key.to_string(),
                reason: "expected a leaf, found a mapping".to_string(),
            }),
        }
    }

    pub fn path(&self, keys: &[&str]) -> Result<&Tree<L>> {
        keys.iter().try_fold(self, |tree, key| tree.get(key))
    }

    /// All leaves with their slash-joined paths, in canonical order.
    pub fn leaves(&self) -> Vec<(String, &L)> {
        let mut out = Vec::new();
        self.collect_leaves(String::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: String, out: &mut Vec<(String, &'a L)>) {
        match self {
            Tree::Leaf(value) => out.push((prefix, value)),
            Tree::Node(children) => {
                for (key, child) in children {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}/{}", prefix, key)
                    };
                    child.collect_leaves(path, out);
                }
            }
        }
    }

    /// Same topology, leaves transformed. `f` also receives the leaf path.
    pub fn map<M, F>(&self, f: F) -> Tree<M>
    where
        F: Fn(&str, &L) -> M,
    {
        self.map_at("", &f)
    }

    fn map_at<M, F>(&self, prefix: &str, f: &F) -> Tree<M>
    where
        F: Fn(&str, &L) -> M,
    {
        match self {
            Tree::Leaf(value) => Tree::Leaf(f(prefix, value)),
            Tree::Node(children) => Tree::Node(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.map_at(&join(prefix, key), f)))
                    .collect(),
            ),
        }
    }

    pub fn try_map<M, F>(&self, f: F) -> Result<Tree<M>>
    where
        F: Fn(&str, &L) -> Result<M>,
    {
        self.try_map_at("", &f)
    }

    fn try_map_at<M, F>(&self, prefix: &str, f: &F) -> Result<Tree<M>>
    where
        F: Fn(&str, &L) -> Result<M>,
    {
        match self {
            Tree::Leaf(value) => Ok(Tree::Leaf(f(prefix, value)?)),
            Tree::Node(children) => children
                .iter()
                .map(|(key, child)| Ok((key.clone(), child.try_map_at(&join(prefix, key), f)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Tree::Node),
        }
    }

    /// Walks `self` and `other` together and fails on the first place their
    /// key sets or nesting differ. `check` is called on every leaf pair.
    pub fn check_topology<M, F>(&self, other: &Tree<M>, check: F) -> Result<()>
    where
        F: Fn(&str, &L, &M) -> Result<()>,
    {
        self.check_topology_at("", other, &check)
    }

    fn check_topology_at<M, F>(&self, prefix: &str, other: &Tree<M>, check: &F) -> Result<()>
    where
        F: Fn(&str, &L, &M) -> Result<()>,
    {
        match (self, other) {
            (Tree::Leaf(a), Tree::Leaf(b)) => check(prefix, a, b),
            (Tree::Node(a), Tree::Node(b)) => {
                if let Some(key) = a.keys().find(|k| !b.contains_key(*k)) {
                    return Err(ComponentError::TopologyMismatch {
                        path: join(prefix, key),
                        reason: "key absent from spec".to_string(),
                    });
                }
                if let Some(key) = b.keys().find(|k| !a.contains_key(*k)) {
                    return Err(ComponentError::TopologyMismatch {
                        path: join(prefix, key),
                        reason: "key missing from realized tree".to_string(),
                    });
                }
                for (key, child) in a {
                    child.check_topology_at(&join(prefix, key), &b[key], check)?;
                }
                Ok(())
            }
            (Tree::Leaf(_), Tree::Node(_)) => Err(ComponentError::TopologyMismatch {
                path: prefix.to_string(),
                reason: "expected a mapping, found a leaf".to_string(),
            }),
            (Tree::Node(_), Tree::Leaf(_)) => Err(ComponentError::TopologyMismatch {
                path: prefix.to_string(),
                reason: "expected a leaf, found a mapping".to_string(),
            }),
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

impl WeightTree {
    /// Draws every leaf from its spec. Each leaf gets a key folded from its
    /// path, so the result only depends on `key` and the topology.
    pub fn realize(&self, key: crate::random::RngKey) -> Result<ArrayTree> {
        self.try_map(|path, spec| spec.realize(key.fold_in_str(path)))
    }

    pub fn n_params(&self) -> usize {
        self.leaves().iter().map(|(_, spec)| spec.size()).sum()
    }
}

impl ArrayTree {
    pub fn get_arr(&self, key: &str) -> Result<&ArrayD<f32>> {
        self.get_leaf(key)
    }

    /// Verifies this realized tree against the spec it came from.
    pub fn check_against(&self, spec: &WeightTree) -> Result<()> {
        self.check_topology(spec, |path, arr, weight| {
            if arr.shape() != weight.shape.as_slice() {
                return Err(ComponentError::shape_mismatch(path, &weight.shape, arr.shape()));
            }
            Ok(())
        })
    }

    pub fn n_elements(&self) -> usize {
        self.leaves().iter().map(|(_, arr)| arr.len()).sum()
    }
}
