//! Incremental Merkle-root computation for SSZ containers.
//!
//! A [`TreeHashCache`] remembers every internal node of the Merkle tree it produced last time.
//! On recomputation it diffs the new leaves against the stored ones and re-hashes only the paths
//! above leaves that actually changed, so the cost is proportional to the mutation footprint
//! rather than to the container length. Sub-trees to the right of the occupied leaves are
//! represented by precomputed zero-subtree roots and are never materialized.

mod cache;
mod impls;

use ethereum_types::H256 as Hash256;
use smallvec::SmallVec;

pub use crate::cache::TreeHashCache;
pub use crate::impls::int_log;

type SmallVec8<T> = SmallVec<[T; 8]>;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// Attempting to provide more than 2^depth leaves to a Merkle tree is disallowed.
    TooManyLeaves,
    /// Shrinking a Merkle tree cache by providing it with less leaves than it currently has is
    /// disallowed (for simplicity).
    CannotShrink,
}

/// Trait for types which can make use of a cache to accelerate calculation of their tree hash
/// root.
pub trait CachedTreeHash<Cache> {
    /// Create a new cache appropriate for use with values of this type.
    fn new_tree_hash_cache(&self) -> Cache;

    /// Update the cache and use it to compute the tree hash root for `self`.
    fn recalculate_tree_hash_root(&self, cache: &mut Cache) -> Result<Hash256, Error>;
}
