use crate::{EthSpec, FixedVector, Hash256};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// Historical block and state roots, accumulated into `historical_roots` once per
/// `SLOTS_PER_HISTORICAL_ROOT` slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
#[serde(bound = "T: EthSpec")]
pub struct HistoricalBatch<T: EthSpec> {
    pub block_roots: FixedVector<Hash256, T::SlotsPerHistoricalRoot>,
    pub state_roots: FixedVector<Hash256, T::SlotsPerHistoricalRoot>,
}

impl_test_random!(HistoricalBatch<T> {
    block_roots,
    state_roots
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;

    ssz_and_tree_hash_tests!(HistoricalBatch<MinimalEthSpec>);
}
