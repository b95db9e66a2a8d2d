//! Types used by the beacon chain's state-transition core.
//!
//! The two central items are [`BeaconState`] (the fork-variant Merkleized state container) and
//! [`ChainSpec`] (the per-network constants). Everything else is either an SSZ container stored
//! inside the state, or a cache derived from it.

#[macro_use]
pub mod test_utils;

pub mod attestation_data;
pub mod beacon_block_header;
pub mod beacon_state;
pub mod chain_spec;
pub mod checkpoint;
pub mod consts;
pub mod eth1_data;
pub mod eth_spec;
pub mod fork;
pub mod fork_name;
pub mod historical_batch;
pub mod participation_flags;
pub mod participation_list;
pub mod pending_attestation;
pub mod pubkey_bytes;
pub mod relative_epoch;
pub mod slot_epoch;
pub mod sync_committee;
pub mod validator;

pub use crate::attestation_data::AttestationData;
pub use crate::beacon_block_header::BeaconBlockHeader;
pub use crate::beacon_state::{
    get_active_validator_indices, AttestationDuty, BeaconCommittee, BeaconState, BeaconStateAltair,
    BeaconStateBase, BeaconTreeHashCache, CommitteeCache, Error as BeaconStateError, ExitCache,
    PubkeyCache,
};
pub use crate::chain_spec::{ChainSpec, Domain};
pub use crate::checkpoint::Checkpoint;
pub use crate::eth1_data::Eth1Data;
pub use crate::eth_spec::{EthSpec, EthSpecId, MainnetEthSpec, MinimalEthSpec};
pub use crate::fork::Fork;
pub use crate::fork_name::{ForkName, InconsistentFork};
pub use crate::historical_batch::HistoricalBatch;
pub use crate::participation_flags::ParticipationFlags;
pub use crate::participation_list::ParticipationList;
pub use crate::pending_attestation::PendingAttestation;
pub use crate::pubkey_bytes::{PublicKeyBytes, PUBLIC_KEY_BYTES_LEN};
pub use crate::relative_epoch::{Error as RelativeEpochError, RelativeEpoch};
pub use crate::slot_epoch::{Epoch, Slot};
pub use crate::sync_committee::SyncCommittee;
pub use crate::validator::Validator;

pub use ethereum_types::{H160 as Address, H256 as Hash256};
pub use ssz_types::typenum::{self, Unsigned};
pub use ssz_types::{BitList, BitVector, FixedVector, VariableList};

pub type CommitteeIndex = u64;
