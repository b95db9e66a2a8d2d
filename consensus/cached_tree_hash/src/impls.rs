use crate::{CachedTreeHash, Error, Hash256, TreeHashCache};
use ssz_types::{typenum::Unsigned, FixedVector, VariableList};
use tree_hash::{mix_in_length, BYTES_PER_CHUNK};

/// Compute `ceil(log2(n))`: the depth of the smallest binary tree with at least `n` leaves.
pub fn int_log(n: usize) -> usize {
    match n.checked_next_power_of_two() {
        Some(x) => x.trailing_zeros() as usize,
        None => 8 * std::mem::size_of::<usize>(),
    }
}

/// The number of 32-byte chunks occupied by `n` packed `u64` values.
fn u64_leaf_count(n: usize) -> usize {
    let values_per_chunk = BYTES_PER_CHUNK / 8;
    (n + values_per_chunk - 1) / values_per_chunk
}

/// Pack `u64` values into 32-byte chunks, four to a chunk, zero-padded on the right.
pub(crate) fn packed_u64_leaves(values: &[u64]) -> impl Iterator<Item = [u8; 32]> + '_ {
    values.chunks(BYTES_PER_CHUNK / 8).map(|xs| {
        let mut chunk = [0; BYTES_PER_CHUNK];
        for (i, x) in xs.iter().enumerate() {
            chunk[i * 8..(i + 1) * 8].copy_from_slice(&x.to_le_bytes());
        }
        chunk
    })
}

fn hash256_leaves(values: &[Hash256]) -> impl Iterator<Item = [u8; 32]> + '_ {
    values.iter().map(|value| value.to_fixed_bytes())
}

impl<N: Unsigned> CachedTreeHash<TreeHashCache> for FixedVector<Hash256, N> {
    fn new_tree_hash_cache(&self) -> TreeHashCache {
        TreeHashCache::new(int_log(N::to_usize()), self.len())
    }

    fn recalculate_tree_hash_root(&self, cache: &mut TreeHashCache) -> Result<Hash256, Error> {
        cache.recalculate_merkle_root(hash256_leaves(self))
    }
}

impl<N: Unsigned> CachedTreeHash<TreeHashCache> for FixedVector<u64, N> {
    fn new_tree_hash_cache(&self) -> TreeHashCache {
        TreeHashCache::new(int_log(u64_leaf_count(N::to_usize())), u64_leaf_count(self.len()))
    }

    fn recalculate_tree_hash_root(&self, cache: &mut TreeHashCache) -> Result<Hash256, Error> {
        cache.recalculate_merkle_root(packed_u64_leaves(self))
    }
}

impl<N: Unsigned> CachedTreeHash<TreeHashCache> for VariableList<Hash256, N> {
    fn new_tree_hash_cache(&self) -> TreeHashCache {
        TreeHashCache::new(int_log(N::to_usize()), self.len())
    }

    fn recalculate_tree_hash_root(&self, cache: &mut TreeHashCache) -> Result<Hash256, Error> {
        Ok(mix_in_length(
            &cache.recalculate_merkle_root(hash256_leaves(self))?,
            self.len(),
        ))
    }
}

impl<N: Unsigned> CachedTreeHash<TreeHashCache> for VariableList<u64, N> {
    fn new_tree_hash_cache(&self) -> TreeHashCache {
        TreeHashCache::new(int_log(u64_leaf_count(N::to_usize())), u64_leaf_count(self.len()))
    }

    fn recalculate_tree_hash_root(&self, cache: &mut TreeHashCache) -> Result<Hash256, Error> {
        Ok(mix_in_length(
            &cache.recalculate_merkle_root(packed_u64_leaves(self))?,
            self.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz_types::typenum::{U1024, U64};
    use tree_hash::TreeHash;

    #[test]
    fn int_log_round_trips_powers_of_two() {
        assert_eq!(int_log(1), 0);
        assert_eq!(int_log(2), 1);
        assert_eq!(int_log(3), 2);
        assert_eq!(int_log(4), 2);
        assert_eq!(int_log(8192), 13);
    }

    #[test]
    fn variable_list_of_u64_matches_tree_hash() {
        let mut list = VariableList::<u64, U1024>::new((0..33).collect()).unwrap();
        let mut cache = list.new_tree_hash_cache();

        assert_eq!(
            list.recalculate_tree_hash_root(&mut cache).unwrap(),
            list.tree_hash_root()
        );

        // Mutate and extend, then ensure the cached root tracks.
        *list.get_mut(7).unwrap() = u64::MAX;
        list.push(42).unwrap();
        assert_eq!(
            list.recalculate_tree_hash_root(&mut cache).unwrap(),
            list.tree_hash_root()
        );
    }

    #[test]
    fn empty_variable_list_matches_tree_hash() {
        let list = VariableList::<u64, U1024>::new(vec![]).unwrap();
        let mut cache = list.new_tree_hash_cache();
        assert_eq!(
            list.recalculate_tree_hash_root(&mut cache).unwrap(),
            list.tree_hash_root()
        );
    }

    #[test]
    fn fixed_vector_of_roots_matches_tree_hash() {
        let mut vector = FixedVector::<Hash256, U64>::new(vec![Hash256::zero(); 64]).unwrap();
        let mut cache = vector.new_tree_hash_cache();

        assert_eq!(
            vector.recalculate_tree_hash_root(&mut cache).unwrap(),
            vector.tree_hash_root()
        );

        *vector.get_mut(63).unwrap() = Hash256::repeat_byte(0xaa);
        assert_eq!(
            vector.recalculate_tree_hash_root(&mut cache).unwrap(),
            vector.tree_hash_root()
        );
    }

    #[test]
    fn variable_list_of_roots_matches_tree_hash() {
        let list =
            VariableList::<Hash256, U1024>::new((0..5).map(Hash256::from_low_u64_be).collect())
                .unwrap();
        let mut cache = list.new_tree_hash_cache();
        assert_eq!(
            list.recalculate_tree_hash_root(&mut cache).unwrap(),
            list.tree_hash_root()
        );
    }
}
