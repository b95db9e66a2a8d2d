use crate::{Checkpoint, Hash256, Slot};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The data upon which an attestation is based.
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct AttestationData {
    pub slot: Slot,
    #[serde(with = "eth2_serde_utils::quoted_u64")]
    pub index: u64,

    // LMD GHOST vote
    pub beacon_block_root: Hash256,

    // FFG Vote
    pub source: Checkpoint,
    pub target: Checkpoint,
}

impl_test_random!(AttestationData {
    slot,
    index,
    beacon_block_root,
    source,
    target
});

#[cfg(test)]
mod tests {
    use super::*;

    ssz_and_tree_hash_tests!(AttestationData);
}
