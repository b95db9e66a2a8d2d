use crate::{AttestationData, BitList, EthSpec};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// An attestation that has been included in the state but not yet fully processed.
///
/// Only present in phase 0 states; Altair replaces pending attestations with per-validator
/// participation flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "T: EthSpec")]
pub struct PendingAttestation<T: EthSpec> {
    pub aggregation_bits: BitList<T::MaxValidatorsPerCommittee>,
    pub data: AttestationData,
    #[serde(with = "eth2_serde_utils::quoted_u64")]
    pub inclusion_delay: u64,
    #[serde(with = "eth2_serde_utils::quoted_u64")]
    pub proposer_index: u64,
}

impl_test_random!(PendingAttestation<T> {
    aggregation_bits,
    data,
    inclusion_delay,
    proposer_index
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    ssz_and_tree_hash_tests!(PendingAttestation<MainnetEthSpec>);
}
