use crate::{Error, Hash256, SmallVec8};
use ethereum_hashing::hash32_concat;
use lazy_static::lazy_static;

/// Deep enough for the validator registry limit (2^40 leaves).
const MAX_TREE_DEPTH: usize = 48;

lazy_static! {
    /// `ZERO_NODES[i]` is the root of a fully-zeroed sub-tree of height `i`.
    static ref ZERO_NODES: Vec<Hash256> = {
        let mut nodes = Vec::with_capacity(MAX_TREE_DEPTH + 1);
        let mut node = Hash256::zero();
        nodes.push(node);
        for _ in 0..MAX_TREE_DEPTH {
            node = Hash256::from(hash32_concat(node.as_bytes(), node.as_bytes()));
            nodes.push(node);
        }
        nodes
    };
}

/// Cache for the Merkle tree of a single homogeneous leaf array (one SSZ list or vector field).
///
/// The tree has a fixed virtual depth; leaves beyond the occupied prefix are zero sub-trees.
/// The cache never shrinks: beacon-state list fields only ever grow or mutate in place.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct TreeHashCache {
    /// Virtual depth of the tree; up to `2^depth` leaves are addressable.
    depth: usize,
    /// Occupied leaves, as provided by the most recent recalculation.
    leaves: Vec<Hash256>,
    /// `layers[k]` holds the computed nodes `k + 1` levels above the leaves.
    layers: Vec<Vec<Hash256>>,
}

impl TreeHashCache {
    /// Create a new cache for a tree of the given `depth`, with capacity for `leaf_count`
    /// initial leaves.
    pub fn new(depth: usize, leaf_count: usize) -> Self {
        TreeHashCache {
            depth,
            leaves: Vec::with_capacity(leaf_count),
            layers: vec![Vec::new(); depth],
        }
    }

    /// Feed the current leaves through the cache, re-hashing only the paths above changed or
    /// appended leaves, and return the Merkle root.
    pub fn recalculate_merkle_root(
        &mut self,
        leaves: impl Iterator<Item = [u8; 32]>,
    ) -> Result<Hash256, Error> {
        let mut dirty: SmallVec8<usize> = SmallVec8::new();

        let mut leaf_count = 0;
        for (i, leaf) in leaves.enumerate() {
            let leaf = Hash256::from(leaf);
            match self.leaves.get_mut(i) {
                Some(existing) => {
                    if *existing != leaf {
                        *existing = leaf;
                        dirty.push(i);
                    }
                }
                None => {
                    self.leaves.push(leaf);
                    dirty.push(i);
                }
            }
            leaf_count += 1;
        }

        if leaf_count < self.leaves.len() {
            return Err(Error::CannotShrink);
        }
        let capacity = 1_usize.checked_shl(self.depth as u32);
        if capacity.map_or(false, |capacity| self.leaves.len() > capacity) {
            return Err(Error::TooManyLeaves);
        }

        let mut child_count = self.leaves.len();

        for level in 0..self.depth {
            let parent_count = (child_count + 1) / 2;

            // Promote each dirty child to its parent, deduplicating as we go; `dirty` is in
            // ascending order so equal parents are adjacent.
            let mut dirty_parents: SmallVec8<usize> = SmallVec8::new();
            for child in dirty.drain(..) {
                let parent = child / 2;
                if dirty_parents.last() != Some(&parent) {
                    dirty_parents.push(parent);
                }
            }

            // Split the borrow: children of level 0 are the leaves themselves.
            let (children, parents) = if level == 0 {
                (&self.leaves[..], &mut self.layers[0])
            } else {
                let (lower, upper) = self.layers.split_at_mut(level);
                (&lower[level - 1][..], &mut upper[0])
            };

            if parents.len() < parent_count {
                parents.resize(parent_count, Hash256::zero());
            }

            for parent in dirty_parents.iter().copied() {
                let left = children[parent * 2];
                let right = children
                    .get(parent * 2 + 1)
                    .copied()
                    .unwrap_or_else(|| zero_node(level));
                parents[parent] = Hash256::from(hash32_concat(left.as_bytes(), right.as_bytes()));
            }

            dirty = dirty_parents;
            child_count = parent_count;
        }

        if self.leaves.is_empty() {
            Ok(zero_node(self.depth))
        } else if self.depth == 0 {
            Ok(self.leaves[0])
        } else {
            Ok(self.layers[self.depth - 1][0])
        }
    }
}

fn zero_node(height: usize) -> Hash256 {
    ZERO_NODES[height]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_hash::TreeHash;

    fn u64_leaves(values: &[u64]) -> impl Iterator<Item = [u8; 32]> + '_ {
        crate::impls::packed_u64_leaves(values)
    }

    #[test]
    fn empty_tree_is_zero_subtree_root() {
        let mut cache = TreeHashCache::new(3, 0);
        let root = cache.recalculate_merkle_root(std::iter::empty()).unwrap();
        assert_eq!(root, ZERO_NODES[3]);
    }

    #[test]
    fn matches_one_shot_merkleization() {
        use ssz_types::{typenum::U32, FixedVector};

        let values: Vec<Hash256> = (0..32).map(Hash256::from_low_u64_be).collect();
        let vector = FixedVector::<Hash256, U32>::new(values.clone()).unwrap();

        let mut cache = TreeHashCache::new(5, 32);
        let root = cache
            .recalculate_merkle_root(values.iter().map(|h| h.to_fixed_bytes()))
            .unwrap();

        assert_eq!(root, vector.tree_hash_root());
    }

    #[test]
    fn incremental_update_matches_fresh_computation() {
        let mut values: Vec<u64> = (0..100).collect();

        let mut incremental = TreeHashCache::new(10, 25);
        incremental.recalculate_merkle_root(u64_leaves(&values)).unwrap();

        values[13] = 999;
        values[99] = 1000;
        values.push(1001);

        let updated = incremental.recalculate_merkle_root(u64_leaves(&values)).unwrap();

        let mut fresh = TreeHashCache::new(10, 26);
        let expected = fresh.recalculate_merkle_root(u64_leaves(&values)).unwrap();

        assert_eq!(updated, expected);
    }

    #[test]
    fn shrinking_is_an_error() {
        let values: Vec<u64> = (0..16).collect();
        let mut cache = TreeHashCache::new(4, 4);
        cache.recalculate_merkle_root(u64_leaves(&values)).unwrap();

        assert_eq!(
            cache.recalculate_merkle_root(u64_leaves(&values[..8])),
            Err(Error::CannotShrink)
        );
    }

    #[test]
    fn overfull_tree_is_an_error() {
        let values: Vec<u64> = (0..32).collect();
        // 32 values pack into 8 leaves; a depth-2 tree only addresses 4.
        let mut cache = TreeHashCache::new(2, 8);
        assert_eq!(
            cache.recalculate_merkle_root(u64_leaves(&values)),
            Err(Error::TooManyLeaves)
        );
    }
}
