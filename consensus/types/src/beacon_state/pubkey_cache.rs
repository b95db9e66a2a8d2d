use crate::PublicKeyBytes;
use rpds::HashTrieMapSync as HashTrieMap;

type ValidatorIndex = usize;

/// A map from validator public key to registry index.
///
/// Backed by a persistent map so that clones of a state share the bulk of the cache and only pay
/// for the keys appended since the fork point.
#[allow(clippy::len_without_is_empty)]
#[derive(Debug, PartialEq, Clone, Default)]
pub struct PubkeyCache {
    /// Maintain the number of keys added to the map. It is not sufficient to just use the
    /// HashTrieMap len, as it does not increase when duplicate keys are added. Duplicate keys are
    /// used during testing.
    len: usize,
    map: HashTrieMap<PublicKeyBytes, ValidatorIndex>,
}

impl PubkeyCache {
    /// Returns the number of validator indices added to the map so far.
    pub fn len(&self) -> ValidatorIndex {
        self.len
    }

    /// Inserts a validator index into the map.
    ///
    /// The added index must equal the number of validators already added to the map. This ensures
    /// that an index is never skipped.
    pub fn insert(&mut self, pubkey: PublicKeyBytes, index: ValidatorIndex) -> bool {
        if index == self.len {
            self.map.insert_mut(pubkey, index);
            self.len = self
                .len
                .checked_add(1)
                .expect("map length cannot exceed usize");
            true
        } else {
            false
        }
    }

    /// Looks up a validator index by its public key.
    pub fn get(&self, pubkey: &PublicKeyBytes) -> Option<ValidatorIndex> {
        self.map.get(pubkey).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_order_sensitive() {
        let mut cache = PubkeyCache::default();
        let key = |b: u8| PublicKeyBytes::from([b; 48]);

        // Skipping an index is refused.
        assert!(!cache.insert(key(1), 1));
        assert!(cache.insert(key(1), 0));
        assert!(cache.insert(key(2), 1));
        assert_eq!(cache.get(&key(1)), Some(0));
        assert_eq!(cache.get(&key(2)), Some(1));
        assert_eq!(cache.get(&key(3)), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clones_share_structure() {
        let mut cache = PubkeyCache::default();
        cache.insert(PublicKeyBytes::from([9; 48]), 0);
        let snapshot = cache.clone();

        cache.insert(PublicKeyBytes::from([8; 48]), 1);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(cache.len(), 2);
    }
}
