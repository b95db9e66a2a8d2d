use crate::{Hash256, ParticipationFlags, Unsigned, VariableList};
use cached_tree_hash::{int_log, CachedTreeHash, Error, TreeHashCache};
use tree_hash::{mix_in_length, BYTES_PER_CHUNK};

/// Wrapper type allowing a cached tree hash implementation for the participation byte lists.
#[derive(Debug)]
pub struct ParticipationList<'a, N: Unsigned> {
    pub inner: &'a VariableList<ParticipationFlags, N>,
}

impl<'a, N: Unsigned> ParticipationList<'a, N> {
    pub fn new(inner: &'a VariableList<ParticipationFlags, N>) -> Self {
        Self { inner }
    }
}

impl<'a, N: Unsigned> CachedTreeHash<TreeHashCache> for ParticipationList<'a, N> {
    fn new_tree_hash_cache(&self) -> TreeHashCache {
        TreeHashCache::new(
            int_log((N::to_usize() + BYTES_PER_CHUNK - 1) / BYTES_PER_CHUNK),
            leaf_count(self.inner.len()),
        )
    }

    fn recalculate_tree_hash_root(&self, cache: &mut TreeHashCache) -> Result<Hash256, Error> {
        Ok(mix_in_length(
            &cache.recalculate_merkle_root(leaf_iter(self.inner))?,
            self.inner.len(),
        ))
    }
}

pub fn leaf_count(len: usize) -> usize {
    (len + BYTES_PER_CHUNK - 1) / BYTES_PER_CHUNK
}

pub fn leaf_iter(
    values: &[ParticipationFlags],
) -> impl Iterator<Item = [u8; BYTES_PER_CHUNK]> + ExactSizeIterator + '_ {
    values.chunks(BYTES_PER_CHUNK).map(|xs| {
        // Zero-pad chunks on the right.
        let mut chunk = [0u8; BYTES_PER_CHUNK];
        for (byte, x) in chunk.iter_mut().zip(xs) {
            *byte = x.into_u8();
        }
        chunk
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typenum::U1024;
    use tree_hash::TreeHash;

    #[test]
    fn cached_root_matches_tree_hash() {
        let mut flags = ParticipationFlags::default();
        flags.add_flag(0).unwrap();

        let mut list = VariableList::<ParticipationFlags, U1024>::new(vec![flags; 70]).unwrap();
        let mut cache = ParticipationList::new(&list).new_tree_hash_cache();

        assert_eq!(
            ParticipationList::new(&list)
                .recalculate_tree_hash_root(&mut cache)
                .unwrap(),
            list.tree_hash_root()
        );

        // Flip a byte and extend, then ensure the cached root still matches.
        list.get_mut(33).unwrap().add_flag(1).unwrap();
        list.push(ParticipationFlags::default()).unwrap();

        assert_eq!(
            ParticipationList::new(&list)
                .recalculate_tree_hash_root(&mut cache)
                .unwrap(),
            list.tree_hash_root()
        );
    }
}
