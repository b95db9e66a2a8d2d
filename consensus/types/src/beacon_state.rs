use crate::*;
use ethereum_hashing::hash;
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError};
use ssz_derive::{Decode, Encode};
use std::mem;
use std::sync::Arc;
use superstruct::superstruct;
use swap_or_not_shuffle::compute_shuffled_index;
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

pub use self::committee_cache::{
    get_active_validator_indices, AttestationDuty, BeaconCommittee, CommitteeCache,
};
pub use self::exit_cache::ExitCache;
pub use self::pubkey_cache::PubkeyCache;
pub use self::tree_hash_cache::BeaconTreeHashCache;

mod committee_cache;
mod exit_cache;
mod pubkey_cache;
mod tree_hash_cache;

pub const CACHED_EPOCHS: usize = 3;
const MAX_RANDOM_BYTE: u64 = (1 << 8) - 1;

#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    EpochOutOfBounds,
    SlotOutOfBounds,
    UnknownValidator(usize),
    BalancesOutOfBounds(usize),
    InactivityScoresOutOfBounds(usize),
    ParticipationOutOfBounds(usize),
    InsufficientRandaoMixes,
    InsufficientValidators,
    UnableToShuffle,
    ShuffleIndexOutOfBounds(usize),
    CommitteeCacheUninitialized(Option<RelativeEpoch>),
    NoCommittee {
        slot: Slot,
        index: CommitteeIndex,
    },
    ExitCacheUninitialized,
    PubkeyCacheInconsistent,
    InvalidBitfield,
    InvalidPublicKeyBytes,
    NonMatchingAttestationSource,
    IncorrectStateVariant,
    RelativeEpochError(RelativeEpochError),
    ArithError(ArithError),
    SszTypesError(ssz_types::Error),
    CachedTreeHashError(cached_tree_hash::Error),
}

impl From<RelativeEpochError> for Error {
    fn from(e: RelativeEpochError) -> Error {
        Error::RelativeEpochError(e)
    }
}

impl From<ArithError> for Error {
    fn from(e: ArithError) -> Error {
        Error::ArithError(e)
    }
}

impl From<ssz_types::Error> for Error {
    fn from(e: ssz_types::Error) -> Error {
        Error::SszTypesError(e)
    }
}

impl From<cached_tree_hash::Error> for Error {
    fn from(e: cached_tree_hash::Error) -> Error {
        Error::CachedTreeHashError(e)
    }
}

/// The state of the `BeaconChain` at some slot.
///
/// The state is the Merkleized store of record for the protocol: every field below the caches is
/// part of the SSZ hash tree root that other clients must agree upon. The caches are derived
/// values which are skipped by serialization and hashing.
#[superstruct(
    variants(Base, Altair),
    variant_attributes(
        derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash),
        serde(bound = "T: EthSpec", deny_unknown_fields)
    ),
    cast_error(ty = "Error", expr = "Error::IncorrectStateVariant"),
    partial_getter_error(ty = "Error", expr = "Error::IncorrectStateVariant")
)]
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, Encode, TreeHash)]
#[serde(untagged)]
#[serde(bound = "T: EthSpec")]
#[ssz(enum_behaviour = "transparent")]
#[tree_hash(enum_behaviour = "transparent")]
pub struct BeaconState<T>
where
    T: EthSpec,
{
    // Versioning
    #[superstruct(getter(copy))]
    pub genesis_time: u64,
    #[superstruct(getter(copy))]
    pub genesis_validators_root: Hash256,
    #[superstruct(getter(copy))]
    pub slot: Slot,
    #[superstruct(getter(copy))]
    pub fork: Fork,

    // History
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: FixedVector<Hash256, T::SlotsPerHistoricalRoot>,
    pub state_roots: FixedVector<Hash256, T::SlotsPerHistoricalRoot>,
    pub historical_roots: VariableList<Hash256, T::HistoricalRootsLimit>,

    // Ethereum 1.0 chain data
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: VariableList<Eth1Data, T::SlotsPerEth1VotingPeriod>,
    #[superstruct(getter(copy))]
    pub eth1_deposit_index: u64,

    // Registry
    pub validators: VariableList<Validator, T::ValidatorRegistryLimit>,
    pub balances: VariableList<u64, T::ValidatorRegistryLimit>,

    // Randomness
    pub randao_mixes: FixedVector<Hash256, T::EpochsPerHistoricalVector>,

    // Slashings
    pub slashings: FixedVector<u64, T::EpochsPerSlashingsVector>,

    // Attestations (genesis fork only)
    #[superstruct(only(Base))]
    pub previous_epoch_attestations: VariableList<PendingAttestation<T>, T::MaxPendingAttestations>,
    #[superstruct(only(Base))]
    pub current_epoch_attestations: VariableList<PendingAttestation<T>, T::MaxPendingAttestations>,

    // Participation (Altair and later)
    #[superstruct(only(Altair))]
    pub previous_epoch_participation: VariableList<ParticipationFlags, T::ValidatorRegistryLimit>,
    #[superstruct(only(Altair))]
    pub current_epoch_participation: VariableList<ParticipationFlags, T::ValidatorRegistryLimit>,

    // Finality
    pub justification_bits: BitVector<T::JustificationBitsLength>,
    #[superstruct(getter(copy))]
    pub previous_justified_checkpoint: Checkpoint,
    #[superstruct(getter(copy))]
    pub current_justified_checkpoint: Checkpoint,
    #[superstruct(getter(copy))]
    pub finalized_checkpoint: Checkpoint,

    // Inactivity
    #[superstruct(only(Altair))]
    pub inactivity_scores: VariableList<u64, T::ValidatorRegistryLimit>,

    // Light-client sync committees
    #[superstruct(only(Altair))]
    pub current_sync_committee: Arc<SyncCommittee<T>>,
    #[superstruct(only(Altair))]
    pub next_sync_committee: Arc<SyncCommittee<T>>,

    // Caching (not in the spec)
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub committee_caches: [CommitteeCache; CACHED_EPOCHS],
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub pubkey_cache: PubkeyCache,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub exit_cache: ExitCache,
    #[serde(skip_serializing, skip_deserializing)]
    #[ssz(skip_serializing, skip_deserializing)]
    #[tree_hash(skip_hashing)]
    pub tree_hash_cache: BeaconTreeHashCache<T>,
}

impl<T: EthSpec> BeaconState<T> {
    /// Create a new state at genesis, on the genesis (phase 0) fork.
    pub fn new(genesis_time: u64, eth1_data: Eth1Data, spec: &ChainSpec) -> Self {
        BeaconState::Base(BeaconStateBase {
            // Versioning
            genesis_time,
            genesis_validators_root: Hash256::zero(),
            slot: spec.genesis_slot,
            fork: Fork {
                previous_version: spec.genesis_fork_version,
                current_version: spec.genesis_fork_version,
                epoch: T::genesis_epoch(),
            },

            // History
            latest_block_header: BeaconBlockHeader::default(),
            block_roots: FixedVector::default(),
            state_roots: FixedVector::default(),
            historical_roots: VariableList::empty(),

            // Eth1
            eth1_data,
            eth1_data_votes: VariableList::empty(),
            eth1_deposit_index: 0,

            // Validator registry
            validators: VariableList::empty(),
            balances: VariableList::empty(),

            // Randomness
            randao_mixes: FixedVector::default(),

            // Slashings
            slashings: FixedVector::default(),

            // Attestations
            previous_epoch_attestations: VariableList::empty(),
            current_epoch_attestations: VariableList::empty(),

            // Finality
            justification_bits: BitVector::new(),
            previous_justified_checkpoint: Checkpoint::default(),
            current_justified_checkpoint: Checkpoint::default(),
            finalized_checkpoint: Checkpoint::default(),

            // Caching (not in spec)
            committee_caches: [
                CommitteeCache::default(),
                CommitteeCache::default(),
                CommitteeCache::default(),
            ],
            pubkey_cache: PubkeyCache::default(),
            exit_cache: ExitCache::default(),
            tree_hash_cache: BeaconTreeHashCache::default(),
        })
    }

    /// Returns the name of the fork pertaining to `self`, checking that it matches the fork
    /// dictated by `self.slot` and the `spec`.
    pub fn fork_name(&self, spec: &ChainSpec) -> Result<ForkName, InconsistentFork> {
        let fork_at_slot = spec.fork_name_at_slot::<T>(self.slot());
        let object_fork = self.fork_name_unchecked();

        if fork_at_slot == object_fork {
            Ok(object_fork)
        } else {
            Err(InconsistentFork {
                fork_at_slot,
                object_fork,
            })
        }
    }

    /// Returns the name of the fork pertaining to `self`, without checking it against the spec.
    pub fn fork_name_unchecked(&self) -> ForkName {
        match self {
            BeaconState::Base(_) => ForkName::Base,
            BeaconState::Altair(_) => ForkName::Altair,
        }
    }

    /// SSZ decoding is fork-aware: the variant is chosen by the slot encoded in the fixed-offset
    /// portion of the bytes.
    pub fn from_ssz_bytes(bytes: &[u8], spec: &ChainSpec) -> Result<Self, DecodeError> {
        let slot_start = <u64 as Decode>::ssz_fixed_len() + <Hash256 as Decode>::ssz_fixed_len();
        let slot_end = slot_start + <Slot as Decode>::ssz_fixed_len();

        let slot_bytes = bytes
            .get(slot_start..slot_end)
            .ok_or(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: slot_end,
            })?;

        let slot = Slot::from_ssz_bytes(slot_bytes)?;

        match spec.fork_name_at_slot::<T>(slot) {
            ForkName::Base => BeaconStateBase::from_ssz_bytes(bytes).map(Self::Base),
            ForkName::Altair => BeaconStateAltair::from_ssz_bytes(bytes).map(Self::Altair),
        }
    }

    /*
     * Epochs
     */

    /// The epoch corresponding to `self.slot()`.
    pub fn current_epoch(&self) -> Epoch {
        self.slot().epoch(T::slots_per_epoch())
    }

    /// The epoch prior to `self.current_epoch()`.
    ///
    /// If the current epoch is the genesis epoch, the genesis epoch is returned.
    pub fn previous_epoch(&self) -> Epoch {
        let current_epoch = self.current_epoch();
        if current_epoch > T::genesis_epoch() {
            current_epoch - 1
        } else {
            current_epoch
        }
    }

    /// The epoch following `self.current_epoch()`.
    pub fn next_epoch(&self) -> Result<Epoch, Error> {
        Ok(self.current_epoch().safe_add(1)?)
    }

    /*
     * Active validators
     */

    /// Returns the active validator indices for the given epoch, in ascending order.
    ///
    /// This computes the list from the registry directly; use the committee cache where one is
    /// built for the epoch in question.
    pub fn get_active_validator_indices(&self, epoch: Epoch) -> Vec<usize> {
        get_active_validator_indices(self.validators(), epoch)
    }

    /// Return the churn limit for the current epoch (number of validators who can leave or join
    /// per epoch).
    ///
    /// Uses the current epoch committee cache, which must be built in advance.
    pub fn get_churn_limit(&self, spec: &ChainSpec) -> Result<u64, Error> {
        Ok(std::cmp::max(
            spec.min_per_epoch_churn_limit,
            (self
                .committee_cache(RelativeEpoch::Current)?
                .active_validator_count() as u64)
                .safe_div(spec.churn_limit_quotient)?,
        ))
    }

    /// Returns the sum of effective balances over the current epoch's active set, floored at one
    /// effective balance increment.
    ///
    /// Uses the current epoch committee cache, which must be built in advance.
    pub fn get_total_active_balance(&self, spec: &ChainSpec) -> Result<u64, Error> {
        let mut total = 0u64;
        for &index in self.committee_cache(RelativeEpoch::Current)?.shuffling() {
            total.safe_add_assign(self.get_effective_balance(index)?)?;
        }
        Ok(std::cmp::max(total, spec.effective_balance_increment))
    }

    /*
     * Block and state roots
     */

    /// Safely obtains the index for latest block roots, given some `slot`.
    fn get_latest_block_roots_index(&self, slot: Slot) -> Result<usize, Error> {
        if slot < self.slot() && self.slot() <= slot + self.block_roots().len() as u64 {
            Ok(slot.as_usize().safe_rem(self.block_roots().len())?)
        } else {
            Err(Error::SlotOutOfBounds)
        }
    }

    /// Return the block root at a recent `slot`.
    pub fn get_block_root(&self, slot: Slot) -> Result<&Hash256, Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        self.block_roots().get(i).ok_or(Error::SlotOutOfBounds)
    }

    /// Return the block root at a recent `epoch`'s starting slot.
    pub fn get_block_root_at_epoch(&self, epoch: Epoch) -> Result<&Hash256, Error> {
        self.get_block_root(epoch.start_slot(T::slots_per_epoch()))
    }

    /// Sets the block root for some given slot.
    pub fn set_block_root(&mut self, slot: Slot, block_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_block_roots_index(slot)?;
        *self
            .block_roots_mut()
            .get_mut(i)
            .ok_or(Error::SlotOutOfBounds)? = block_root;
        Ok(())
    }

    /// Safely obtains the index for latest state roots, given some `slot`.
    fn get_latest_state_roots_index(&self, slot: Slot) -> Result<usize, Error> {
        if slot < self.slot() && self.slot() <= slot + self.state_roots().len() as u64 {
            Ok(slot.as_usize().safe_rem(self.state_roots().len())?)
        } else {
            Err(Error::SlotOutOfBounds)
        }
    }

    /// Gets the state root for some slot.
    pub fn get_state_root(&self, slot: Slot) -> Result<&Hash256, Error> {
        let i = self.get_latest_state_roots_index(slot)?;
        self.state_roots().get(i).ok_or(Error::SlotOutOfBounds)
    }

    /// Sets the latest state root for slot.
    pub fn set_state_root(&mut self, slot: Slot, state_root: Hash256) -> Result<(), Error> {
        let i = self.get_latest_state_roots_index(slot)?;
        *self
            .state_roots_mut()
            .get_mut(i)
            .ok_or(Error::SlotOutOfBounds)? = state_root;
        Ok(())
    }

    /*
     * Randao
     */

    /// Return the randao mix at a recent `epoch`.
    pub fn get_randao_mix(&self, epoch: Epoch) -> Result<&Hash256, Error> {
        let current_epoch = self.current_epoch();
        let len = T::EpochsPerHistoricalVector::to_u64();

        if current_epoch < epoch + len && epoch <= current_epoch {
            self.randao_mixes()
                .get(epoch.as_usize().safe_rem(len as usize)?)
                .ok_or(Error::EpochOutOfBounds)
        } else {
            Err(Error::EpochOutOfBounds)
        }
    }

    /// Set the randao mix at a recent `epoch`.
    pub fn set_randao_mix(&mut self, epoch: Epoch, mix: Hash256) -> Result<(), Error> {
        let i = epoch
            .as_usize()
            .safe_rem(T::EpochsPerHistoricalVector::to_usize())?;
        *self
            .randao_mixes_mut()
            .get_mut(i)
            .ok_or(Error::EpochOutOfBounds)? = mix;
        Ok(())
    }

    /*
     * Slashings accumulator
     */

    /// Get the total slashed balances recorded for some `epoch`'s window slot.
    pub fn get_slashings_at(&self, epoch: Epoch) -> Result<u64, Error> {
        let i = epoch
            .as_usize()
            .safe_rem(T::EpochsPerSlashingsVector::to_usize())?;
        self.slashings().get(i).copied().ok_or(Error::EpochOutOfBounds)
    }

    /// Set the total slashed balances for some `epoch`'s window slot.
    pub fn set_slashings(&mut self, epoch: Epoch, value: u64) -> Result<(), Error> {
        let i = epoch
            .as_usize()
            .safe_rem(T::EpochsPerSlashingsVector::to_usize())?;
        *self
            .slashings_mut()
            .get_mut(i)
            .ok_or(Error::EpochOutOfBounds)? = value;
        Ok(())
    }

    /*
     * Seeds
     */

    /// Generate a seed for the given `epoch` and signature `domain_type`.
    pub fn get_seed(
        &self,
        epoch: Epoch,
        domain_type: Domain,
        spec: &ChainSpec,
    ) -> Result<Hash256, Error> {
        // The addition and subtraction here are safe: epochs are far below u64::MAX and the
        // historical vector length is non-trivial.
        let mix = {
            let i = epoch
                .safe_add(T::EpochsPerHistoricalVector::to_u64())?
                .safe_sub(spec.min_seed_lookahead.as_u64())?
                .safe_sub(1)?;
            let i_mod = i.as_usize().safe_rem(T::epochs_per_historical_vector())?;
            self.randao_mixes()
                .get(i_mod)
                .ok_or(Error::InsufficientRandaoMixes)?
        };

        let domain_bytes = spec.get_domain_constant(domain_type).to_le_bytes();
        let epoch_bytes = epoch.as_u64().to_le_bytes();

        const NUM_DOMAIN_BYTES: usize = 4;
        const NUM_EPOCH_BYTES: usize = 8;
        const NUM_MIX_BYTES: usize = 32;

        let mut preimage = [0; NUM_DOMAIN_BYTES + NUM_EPOCH_BYTES + NUM_MIX_BYTES];
        preimage[0..NUM_DOMAIN_BYTES].copy_from_slice(&domain_bytes);
        preimage[NUM_DOMAIN_BYTES..NUM_DOMAIN_BYTES + NUM_EPOCH_BYTES]
            .copy_from_slice(&epoch_bytes);
        preimage[NUM_DOMAIN_BYTES + NUM_EPOCH_BYTES..].copy_from_slice(mix.as_bytes());

        Ok(Hash256::from_slice(&hash(&preimage)))
    }

    /*
     * Validators and balances
     */

    /// Safe indexer for the `validators` list.
    pub fn get_validator(&self, validator_index: usize) -> Result<&Validator, Error> {
        self.validators()
            .get(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    /// Safe mutable indexer for the `validators` list.
    pub fn get_validator_mut(&mut self, validator_index: usize) -> Result<&mut Validator, Error> {
        self.validators_mut()
            .get_mut(validator_index)
            .ok_or(Error::UnknownValidator(validator_index))
    }

    /// Return the effective balance for a validator with the given `validator_index`.
    pub fn get_effective_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.get_validator(validator_index)
            .map(|v| v.effective_balance)
    }

    /// Get the balance of a single validator.
    pub fn get_balance(&self, validator_index: usize) -> Result<u64, Error> {
        self.balances()
            .get(validator_index)
            .copied()
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    /// Get a mutable reference to the balance of a single validator.
    pub fn get_balance_mut(&mut self, validator_index: usize) -> Result<&mut u64, Error> {
        self.balances_mut()
            .get_mut(validator_index)
            .ok_or(Error::BalancesOutOfBounds(validator_index))
    }

    /// Get the inactivity score of a single validator (Altair states only).
    pub fn get_inactivity_score(&self, validator_index: usize) -> Result<u64, Error> {
        self.inactivity_scores()?
            .get(validator_index)
            .copied()
            .ok_or(Error::InactivityScoresOutOfBounds(validator_index))
    }

    /// Get a mutable reference to the inactivity score of a single validator (Altair states
    /// only).
    pub fn get_inactivity_score_mut(&mut self, validator_index: usize) -> Result<&mut u64, Error> {
        self.inactivity_scores_mut()?
            .get_mut(validator_index)
            .ok_or(Error::InactivityScoresOutOfBounds(validator_index))
    }

    /// Return the epoch at which an activation or exit triggered in `epoch` takes effect.
    pub fn compute_activation_exit_epoch(
        &self,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<Epoch, Error> {
        Ok(epoch.safe_add(1)?.safe_add(spec.max_seed_lookahead.as_u64())?)
    }

    /// Returns `true` if `validator` is eligible for rewards, penalties and inactivity updates
    /// with respect to `previous_epoch`.
    pub fn is_eligible_validator(&self, previous_epoch: Epoch, validator: &Validator) -> bool {
        validator.is_active_at(previous_epoch)
            || (validator.slashed && previous_epoch + 1 < validator.withdrawable_epoch)
    }

    /// Returns `true` if the chain has failed to finalize for longer than the grace period.
    pub fn is_in_inactivity_leak(&self, previous_epoch: Epoch, spec: &ChainSpec) -> bool {
        (previous_epoch - self.finalized_checkpoint().epoch)
            > spec.min_epochs_to_inactivity_penalty
    }

    /*
     * Proposers
     */

    /// Returns the beacon proposer index for `slot` in the current epoch.
    pub fn get_beacon_proposer_index(&self, slot: Slot, spec: &ChainSpec) -> Result<usize, Error> {
        let epoch = slot.epoch(T::slots_per_epoch());
        if epoch != self.current_epoch() {
            return Err(Error::SlotOutOfBounds);
        }

        let seed = self.get_beacon_proposer_seed(slot, spec)?;
        let indices = self.get_active_validator_indices(epoch);
        self.compute_proposer_index(&indices, &seed, spec)
    }

    /// Compute the seed to use for the beacon proposer selection at the given `slot`.
    fn get_beacon_proposer_seed(&self, slot: Slot, spec: &ChainSpec) -> Result<Vec<u8>, Error> {
        let epoch = slot.epoch(T::slots_per_epoch());
        let mut preimage = self
            .get_seed(epoch, Domain::BeaconProposer, spec)?
            .as_bytes()
            .to_vec();
        preimage.extend_from_slice(&slot.as_u64().to_le_bytes());
        Ok(hash(&preimage))
    }

    /// Compute the proposer (not necessarily for the Beacon chain) from a list of indices, by
    /// effective-balance-weighted sampling.
    pub fn compute_proposer_index(
        &self,
        indices: &[usize],
        seed: &[u8],
        spec: &ChainSpec,
    ) -> Result<usize, Error> {
        if indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let mut i = 0;
        loop {
            let shuffled_index = compute_shuffled_index(
                i.safe_rem(indices.len())?,
                indices.len(),
                seed,
                spec.shuffle_round_count,
            )
            .ok_or(Error::UnableToShuffle)?;

            let candidate_index = *indices
                .get(shuffled_index)
                .ok_or(Error::ShuffleIndexOutOfBounds(shuffled_index))?;

            let random_byte = Self::shuffling_random_byte(i, seed)?;
            let effective_balance = self.get_effective_balance(candidate_index)?;

            if effective_balance.safe_mul(MAX_RANDOM_BYTE)?
                >= spec.max_effective_balance.safe_mul(u64::from(random_byte))?
            {
                return Ok(candidate_index);
            }
            i.safe_add_assign(1)?;
        }
    }

    /// Get a random byte from the given `seed`.
    ///
    /// Used by the proposer and sync committee selections to weight by effective balance.
    fn shuffling_random_byte(i: usize, seed: &[u8]) -> Result<u8, Error> {
        let mut preimage = seed.to_vec();
        preimage.extend_from_slice(&(i.safe_div(32)? as u64).to_le_bytes());
        let index = i.safe_rem(32)?;
        hash(&preimage)
            .get(index)
            .copied()
            .ok_or(Error::ShuffleIndexOutOfBounds(index))
    }

    /// The block root which decided the proposer shuffling for the current epoch.
    ///
    /// If the state is at its decision slot (the last slot of the prior epoch), the root is not
    /// yet in `block_roots` and the caller must supply it as `block_root`.
    pub fn proposer_shuffling_decision_root(&self, block_root: Hash256) -> Result<Hash256, Error> {
        let decision_slot = self.current_epoch().start_slot(T::slots_per_epoch()) - 1;
        if self.slot() == decision_slot {
            Ok(block_root)
        } else {
            self.get_block_root(decision_slot).map(|root| *root)
        }
    }

    /// Mutable access to the validator registry alongside read access to the balances.
    ///
    /// The two lists cannot be borrowed through the usual getters at the same time; effective
    /// balance updates need exactly this split.
    pub fn validators_and_balances_mut(
        &mut self,
    ) -> (
        &mut VariableList<Validator, T::ValidatorRegistryLimit>,
        &VariableList<u64, T::ValidatorRegistryLimit>,
    ) {
        match self {
            BeaconState::Base(state) => (&mut state.validators, &state.balances),
            BeaconState::Altair(state) => (&mut state.validators, &state.balances),
        }
    }

    /*
     * Sync committees (Altair)
     */

    /// Compute the next-period sync committee indices by hash-sampled, balance-weighted
    /// selection over the next epoch's active set.
    pub fn get_next_sync_committee_indices(&self, spec: &ChainSpec) -> Result<Vec<usize>, Error> {
        let epoch = self.next_epoch()?;

        let active_validator_indices = self.get_active_validator_indices(epoch);
        let active_validator_count = active_validator_indices.len();
        if active_validator_count == 0 {
            return Err(Error::InsufficientValidators);
        }

        let seed = self.get_seed(epoch, Domain::SyncCommittee, spec)?;

        let mut i = 0;
        let mut sync_committee_indices = Vec::with_capacity(T::SyncCommitteeSize::to_usize());
        while sync_committee_indices.len() < T::SyncCommitteeSize::to_usize() {
            let shuffled_index = compute_shuffled_index(
                i.safe_rem(active_validator_count)?,
                active_validator_count,
                seed.as_bytes(),
                spec.shuffle_round_count,
            )
            .ok_or(Error::UnableToShuffle)?;

            let candidate_index = *active_validator_indices
                .get(shuffled_index)
                .ok_or(Error::ShuffleIndexOutOfBounds(shuffled_index))?;

            let random_byte = Self::shuffling_random_byte(i, seed.as_bytes())?;
            let effective_balance = self.get_effective_balance(candidate_index)?;

            if effective_balance.safe_mul(MAX_RANDOM_BYTE)?
                >= spec.max_effective_balance.safe_mul(u64::from(random_byte))?
            {
                sync_committee_indices.push(candidate_index);
            }
            i.safe_add_assign(1)?;
        }
        Ok(sync_committee_indices)
    }

    /// Compute the next-period sync committee, including its aggregate pubkey.
    pub fn get_next_sync_committee(&self, spec: &ChainSpec) -> Result<SyncCommittee<T>, Error> {
        let sync_committee_indices = self.get_next_sync_committee_indices(spec)?;

        let pubkeys = sync_committee_indices
            .iter()
            .map(|&index| self.get_validator(index).map(|v| v.pubkey))
            .collect::<Result<Vec<_>, _>>()?;

        let aggregate_pubkey = eth_aggregate_pubkeys(&pubkeys)?;

        Ok(SyncCommittee {
            pubkeys: FixedVector::new(pubkeys)?,
            aggregate_pubkey,
        })
    }

    /*
     * Committee caches
     */

    /// Build an epoch cache, unless it is has already been built.
    pub fn build_committee_cache(
        &mut self,
        relative_epoch: RelativeEpoch,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let i = Self::committee_cache_index(relative_epoch);
        let epoch = relative_epoch.into_epoch(self.current_epoch());

        if !self.committee_caches()[i].is_initialized_at(epoch) {
            self.force_build_committee_cache(relative_epoch, spec)?;
        }

        Ok(())
    }

    /// Always builds the requested committee cache, even if it is already initialized.
    pub fn force_build_committee_cache(
        &mut self,
        relative_epoch: RelativeEpoch,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let epoch = relative_epoch.into_epoch(self.current_epoch());
        let cache = CommitteeCache::initialized(self, epoch, spec)?;
        self.committee_caches_mut()[Self::committee_cache_index(relative_epoch)] = cache;
        Ok(())
    }

    /// Build the requested committee cache from a precomputed active index list.
    ///
    /// Used at the end of an epoch transition, where the next epoch's active set has already
    /// been determined by the transition itself.
    pub fn build_committee_cache_from_indices(
        &mut self,
        relative_epoch: RelativeEpoch,
        active_indices: Vec<usize>,
        spec: &ChainSpec,
    ) -> Result<(), Error> {
        let epoch = relative_epoch.into_epoch(self.current_epoch());
        let seed = self.get_seed(epoch, Domain::BeaconAttester, spec)?;
        let cache = CommitteeCache::from_active_indices::<T>(
            active_indices,
            seed,
            epoch,
            self.validators().len(),
            spec,
        )?;
        self.committee_caches_mut()[Self::committee_cache_index(relative_epoch)] = cache;
        Ok(())
    }

    /// Advances the cache for this state into the next epoch.
    ///
    /// This should be called after an epoch transition. The `Next` cache becomes empty and is
    /// expected to be re-seeded by `build_committee_cache_from_indices` or built on demand.
    pub fn advance_caches(&mut self) {
        self.committee_caches_mut().rotate_left(1);
        self.committee_caches_mut()[Self::committee_cache_index(RelativeEpoch::Next)] =
            CommitteeCache::default();
    }

    fn committee_cache_index(relative_epoch: RelativeEpoch) -> usize {
        match relative_epoch {
            RelativeEpoch::Previous => 0,
            RelativeEpoch::Current => 1,
            RelativeEpoch::Next => 2,
        }
    }

    /// Returns the cache for some `RelativeEpoch`, returning an error if the cache has not been
    /// initialized.
    pub fn committee_cache(&self, relative_epoch: RelativeEpoch) -> Result<&CommitteeCache, Error> {
        let cache = &self.committee_caches()[Self::committee_cache_index(relative_epoch)];

        if cache.is_initialized_at(relative_epoch.into_epoch(self.current_epoch())) {
            Ok(cache)
        } else {
            Err(Error::CommitteeCacheUninitialized(Some(relative_epoch)))
        }
    }

    /// Returns `true` if the committee cache for `relative_epoch` is built and ready to use.
    pub fn committee_cache_is_initialized(&self, relative_epoch: RelativeEpoch) -> bool {
        let i = Self::committee_cache_index(relative_epoch);
        self.committee_caches()[i]
            .is_initialized_at(relative_epoch.into_epoch(self.current_epoch()))
    }

    /// Get the committee for the given `slot` and `index`.
    pub fn get_beacon_committee(
        &self,
        slot: Slot,
        index: CommitteeIndex,
    ) -> Result<BeaconCommittee, Error> {
        let epoch = slot.epoch(T::slots_per_epoch());
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        let cache = self.committee_cache(relative_epoch)?;

        cache
            .get_beacon_committee(slot, index)
            .ok_or(Error::NoCommittee { slot, index })
    }

    /// Get all of the committees for the given `slot`.
    pub fn get_beacon_committees_at_slot(&self, slot: Slot) -> Result<Vec<BeaconCommittee>, Error> {
        let epoch = slot.epoch(T::slots_per_epoch());
        let relative_epoch = RelativeEpoch::from_epoch(self.current_epoch(), epoch)?;
        let cache = self.committee_cache(relative_epoch)?;
        cache.get_beacon_committees_at_slot(slot)
    }

    /// Get the attestation duties of `validator_index` in the epoch given by `relative_epoch`.
    pub fn get_attestation_duties(
        &self,
        validator_index: usize,
        relative_epoch: RelativeEpoch,
    ) -> Result<Option<AttestationDuty>, Error> {
        let cache = self.committee_cache(relative_epoch)?;
        Ok(cache.get_attestation_duties(validator_index))
    }

    /*
     * Pubkey cache
     */

    /// Updates the pubkey cache, if required.
    ///
    /// Adds all pubkeys from the `validators` list that are not already in the cache. Will
    /// never re-add a pubkey.
    pub fn update_pubkey_cache(&mut self) -> Result<(), Error> {
        let mut pubkey_cache = mem::take(self.pubkey_cache_mut());
        for (i, validator) in self
            .validators()
            .iter()
            .enumerate()
            .skip(pubkey_cache.len())
        {
            let success = pubkey_cache.insert(validator.pubkey, i);
            if !success {
                return Err(Error::PubkeyCacheInconsistent);
            }
        }
        *self.pubkey_cache_mut() = pubkey_cache;

        Ok(())
    }

    /// If a validator with the given pubkey exists, returns its registry index.
    pub fn get_validator_index(&self, pubkey: &PublicKeyBytes) -> Option<usize> {
        self.pubkey_cache().get(pubkey)
    }

    /*
     * Exit cache
     */

    /// Build the exit cache, unless it is already built.
    pub fn build_exit_cache(&mut self, spec: &ChainSpec) -> Result<(), Error> {
        if self.exit_cache().check_initialized().is_err() {
            *self.exit_cache_mut() = ExitCache::new(self.validators(), spec)?;
        }
        Ok(())
    }

    /*
     * Tree hashing
     */

    /// Compute the tree hash root of the state without touching the cache.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }

    /// Compute the tree hash root of the state using the tree hash cache, initializing it if
    /// necessary.
    ///
    /// The first call is O(state size); subsequent calls re-hash only the paths above mutated
    /// leaves.
    pub fn update_tree_hash_cache(&mut self) -> Result<Hash256, Error> {
        // Take the cache out of `self` to release the borrow, then restore it.
        let mut cache = mem::take(self.tree_hash_cache_mut());
        let result = cache.recalculate_tree_hash_root(self);
        *self.tree_hash_cache_mut() = cache;
        Ok(result?)
    }

    /// Construct the historical batch of the most recent `SLOTS_PER_HISTORICAL_ROOT` block and
    /// state roots.
    pub fn historical_batch(&self) -> HistoricalBatch<T> {
        HistoricalBatch {
            block_roots: self.block_roots().clone(),
            state_roots: self.state_roots().clone(),
        }
    }

    /// Completely drops the `tree_hash_cache`, replacing it with a new, empty cache.
    pub fn drop_tree_hash_cache(&mut self) {
        self.tree_hash_cache_mut().uninitialize();
    }

    /// Drop all derived caches: committee, pubkey, exit and tree hash.
    pub fn drop_all_caches(&mut self) {
        *self.committee_caches_mut() = [
            CommitteeCache::default(),
            CommitteeCache::default(),
            CommitteeCache::default(),
        ];
        *self.pubkey_cache_mut() = PubkeyCache::default();
        *self.exit_cache_mut() = ExitCache::default();
        self.drop_tree_hash_cache();
    }
}

/// Aggregate an iterable of compressed public keys into a single compressed key, per
/// `eth_aggregate_pubkeys`.
fn eth_aggregate_pubkeys(pubkeys: &[PublicKeyBytes]) -> Result<PublicKeyBytes, Error> {
    let decompressed = pubkeys
        .iter()
        .map(|pubkey| {
            blst::min_pk::PublicKey::from_bytes(pubkey.as_serialized())
                .map_err(|_| Error::InvalidPublicKeyBytes)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if decompressed.is_empty() {
        return Err(Error::InsufficientValidators);
    }

    let refs = decompressed.iter().collect::<Vec<_>>();
    let aggregate = blst::min_pk::AggregatePublicKey::aggregate(&refs, true)
        .map_err(|_| Error::InvalidPublicKeyBytes)?;

    Ok(PublicKeyBytes::from(aggregate.to_public_key().compress()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinimalEthSpec;
    use ssz::Encode;

    type E = MinimalEthSpec;

    fn test_state(validator_count: usize) -> (BeaconState<E>, ChainSpec) {
        let spec = E::default_spec();
        let mut state = BeaconState::new(0, Eth1Data::default(), &spec);

        for i in 0..validator_count {
            let mut pubkey = [0; 48];
            pubkey[0..8].copy_from_slice(&(i as u64).to_le_bytes());
            state
                .validators_mut()
                .push(Validator {
                    pubkey: PublicKeyBytes::from(pubkey),
                    activation_epoch: Epoch::new(0),
                    exit_epoch: spec.far_future_epoch,
                    withdrawable_epoch: spec.far_future_epoch,
                    activation_eligibility_epoch: Epoch::new(0),
                    effective_balance: spec.max_effective_balance,
                    ..Validator::default()
                })
                .expect("registry limit far exceeds test validator count");
            state
                .balances_mut()
                .push(spec.max_effective_balance)
                .expect("registry limit far exceeds test validator count");
        }

        (state, spec)
    }

    #[test]
    fn cached_root_matches_canonical_root() {
        let (mut state, _) = test_state(16);

        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());

        // Mutate a validator and a balance, then ensure the cache tracks.
        state.get_validator_mut(3).unwrap().slashed = true;
        *state.get_balance_mut(7).unwrap() = 17;

        assert_eq!(state.update_tree_hash_cache().unwrap(), state.canonical_root());
    }

    #[test]
    fn cloned_state_has_identical_root() {
        let (mut state, _) = test_state(16);
        let root = state.update_tree_hash_cache().unwrap();

        let mut cloned = state.clone();
        assert_eq!(cloned.update_tree_hash_cache().unwrap(), root);
        assert_eq!(cloned.canonical_root(), root);
    }

    #[test]
    fn ssz_round_trip_preserves_root() {
        let (mut state, spec) = test_state(8);
        let root = state.update_tree_hash_cache().unwrap();

        let bytes = state.as_ssz_bytes();
        let mut decoded = BeaconState::<E>::from_ssz_bytes(&bytes, &spec).unwrap();

        assert_eq!(decoded.update_tree_hash_cache().unwrap(), root);

        // Caches are not carried by the encoding; compare cache-free states.
        decoded.drop_all_caches();
        let mut original = state.clone();
        original.drop_all_caches();
        assert_eq!(decoded, original);
    }

    #[test]
    fn committees_partition_the_active_set() {
        let (mut state, spec) = test_state(32);
        state.build_committee_cache(RelativeEpoch::Current, &spec).unwrap();

        let cache = state.committee_cache(RelativeEpoch::Current).unwrap();
        assert_eq!(cache.active_validator_count(), 32);

        let mut seen = vec![];
        for slot in state.current_epoch().slot_iter(E::slots_per_epoch()) {
            for committee in cache.get_beacon_committees_at_slot(slot).unwrap() {
                seen.extend_from_slice(committee.committee);
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn proposer_is_active_and_deterministic() {
        let (mut state, spec) = test_state(21);
        state.build_committee_cache(RelativeEpoch::Current, &spec).unwrap();

        let slot = state.slot();
        let index = state.get_beacon_proposer_index(slot, &spec).unwrap();
        assert!(index < 21);
        assert_eq!(state.get_beacon_proposer_index(slot, &spec).unwrap(), index);

        // Proposer lookups outside the current epoch are refused.
        assert!(state
            .get_beacon_proposer_index(slot + E::slots_per_epoch(), &spec)
            .is_err());
    }

    #[test]
    fn attestation_duties_round_trip_through_committees() {
        let (mut state, spec) = test_state(32);
        state.build_committee_cache(RelativeEpoch::Current, &spec).unwrap();

        let duty = state
            .get_attestation_duties(5, RelativeEpoch::Current)
            .unwrap()
            .expect("validator 5 is active");

        let committee = state.get_beacon_committee(duty.slot, duty.index).unwrap();
        assert_eq!(committee.committee.len(), duty.committee_len);
        assert_eq!(committee.committee[duty.committee_position], 5);
    }

    #[test]
    fn pubkey_cache_finds_every_validator() {
        let (mut state, _) = test_state(12);
        state.update_pubkey_cache().unwrap();

        for (i, validator) in state.validators().clone().iter().enumerate() {
            assert_eq!(state.get_validator_index(&validator.pubkey), Some(i));
        }
    }

    #[test]
    fn randao_mix_bounds_are_enforced() {
        let (state, _) = test_state(1);
        // Current epoch lookups succeed, future epochs fail.
        assert!(state.get_randao_mix(state.current_epoch()).is_ok());
        assert_eq!(
            state.get_randao_mix(state.current_epoch() + 1),
            Err(Error::EpochOutOfBounds)
        );
    }
}
