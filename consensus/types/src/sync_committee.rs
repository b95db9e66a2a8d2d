use crate::{EthSpec, FixedVector, PublicKeyBytes};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::typenum::Unsigned;
use ssz_types::Error as SszError;
use tree_hash_derive::TreeHash;

/// The committee of validators signing beacon block roots for light clients, rotated every sync
/// committee period.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "T: EthSpec")]
pub struct SyncCommittee<T: EthSpec> {
    pub pubkeys: FixedVector<PublicKeyBytes, T::SyncCommitteeSize>,
    pub aggregate_pubkey: PublicKeyBytes,
}

impl<T: EthSpec> SyncCommittee<T> {
    /// A placeholder `SyncCommittee` of all-zero pubkeys, used when bootstrapping an Altair state
    /// before the real committees are computed.
    pub fn temporary() -> Result<Self, SszError> {
        Ok(Self {
            pubkeys: FixedVector::new(vec![
                PublicKeyBytes::empty();
                T::SyncCommitteeSize::to_usize()
            ])?,
            aggregate_pubkey: PublicKeyBytes::empty(),
        })
    }

    /// Returns `true` if `pubkey` holds a seat in this committee (possibly more than one).
    pub fn contains(&self, pubkey: &PublicKeyBytes) -> bool {
        self.pubkeys.iter().any(|committee_key| committee_key == pubkey)
    }
}

impl_test_random!(SyncCommittee<T> {
    pubkeys,
    aggregate_pubkey
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    ssz_and_tree_hash_tests!(SyncCommittee<MainnetEthSpec>);

    #[test]
    fn temporary_committee_is_all_zero() {
        let committee = SyncCommittee::<MainnetEthSpec>::temporary().unwrap();
        assert!(committee.contains(&PublicKeyBytes::empty()));
        assert_eq!(committee.pubkeys.len(), 512);
    }
}
