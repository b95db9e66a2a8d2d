use crate::{
    BeaconState, EthSpec, Hash256, ParticipationList, Unsigned, Validator,
};
use cached_tree_hash::{int_log, CachedTreeHash, Error, TreeHashCache};
use std::marker::PhantomData;
use tree_hash::{merkle_root, mix_in_length, TreeHash};

/// Incremental tree-hash cache for a whole `BeaconState`.
///
/// Each of the large list fields gets its own leaf-diffing cache; the small fixed fields are
/// cheap enough to re-hash every time. A default-constructed cache is "uninitialized" and is
/// lazily replaced by `BeaconState::update_tree_hash_cache` on first use.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct BeaconTreeHashCache<T: EthSpec> {
    inner: Option<BeaconTreeHashCacheInner<T>>,
}

impl<T: EthSpec> BeaconTreeHashCache<T> {
    pub fn new(state: &BeaconState<T>) -> Self {
        Self {
            inner: Some(BeaconTreeHashCacheInner::new(state)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    pub fn uninitialize(&mut self) {
        self.inner = None;
    }

    pub fn recalculate_tree_hash_root(&mut self, state: &BeaconState<T>) -> Result<Hash256, Error> {
        self.inner
            .get_or_insert_with(|| BeaconTreeHashCacheInner::new(state))
            .recalculate_tree_hash_root(state)
    }
}

#[derive(Debug, PartialEq, Clone)]
struct BeaconTreeHashCacheInner<T: EthSpec> {
    block_roots: TreeHashCache,
    state_roots: TreeHashCache,
    historical_roots: TreeHashCache,
    randao_mixes: TreeHashCache,
    slashings: TreeHashCache,
    validators: ValidatorsListTreeHashCache,
    balances: TreeHashCache,
    previous_epoch_participation: TreeHashCache,
    current_epoch_participation: TreeHashCache,
    inactivity_scores: TreeHashCache,
    _phantom: PhantomData<T>,
}

impl<T: EthSpec> BeaconTreeHashCacheInner<T> {
    fn new(state: &BeaconState<T>) -> Self {
        let validator_count = state.validators().len();

        // The participation and inactivity caches are created even for a phase 0 state; they stay
        // empty until the state is upgraded and then start tracking the new fields.
        let participation_depth = int_log(
            (T::ValidatorRegistryLimit::to_usize() + tree_hash::BYTES_PER_CHUNK - 1)
                / tree_hash::BYTES_PER_CHUNK,
        );
        let u64_list_depth = int_log((T::ValidatorRegistryLimit::to_usize() + 3) / 4);

        Self {
            block_roots: state.block_roots().new_tree_hash_cache(),
            state_roots: state.state_roots().new_tree_hash_cache(),
            historical_roots: state.historical_roots().new_tree_hash_cache(),
            randao_mixes: state.randao_mixes().new_tree_hash_cache(),
            slashings: state.slashings().new_tree_hash_cache(),
            validators: ValidatorsListTreeHashCache::new::<T>(state.validators()),
            balances: state.balances().new_tree_hash_cache(),
            previous_epoch_participation: TreeHashCache::new(participation_depth, validator_count),
            current_epoch_participation: TreeHashCache::new(participation_depth, validator_count),
            inactivity_scores: TreeHashCache::new(u64_list_depth, validator_count),
            _phantom: PhantomData,
        }
    }

    fn recalculate_tree_hash_root(&mut self, state: &BeaconState<T>) -> Result<Hash256, Error> {
        let mut leaves = vec![];

        match state {
            BeaconState::Base(state) => {
                leaves.extend_from_slice(state.genesis_time.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.genesis_validators_root.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.slot.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.fork.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.latest_block_header.tree_hash_root().as_bytes());
                leaves.extend_from_slice(
                    state
                        .block_roots
                        .recalculate_tree_hash_root(&mut self.block_roots)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .state_roots
                        .recalculate_tree_hash_root(&mut self.state_roots)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .historical_roots
                        .recalculate_tree_hash_root(&mut self.historical_roots)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(state.eth1_data.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.eth1_data_votes.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.eth1_deposit_index.tree_hash_root().as_bytes());
                leaves.extend_from_slice(
                    self.validators
                        .recalculate_tree_hash_root(&state.validators)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .balances
                        .recalculate_tree_hash_root(&mut self.balances)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .randao_mixes
                        .recalculate_tree_hash_root(&mut self.randao_mixes)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .slashings
                        .recalculate_tree_hash_root(&mut self.slashings)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state.previous_epoch_attestations.tree_hash_root().as_bytes(),
                );
                leaves
                    .extend_from_slice(state.current_epoch_attestations.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.justification_bits.tree_hash_root().as_bytes());
                leaves.extend_from_slice(
                    state.previous_justified_checkpoint.tree_hash_root().as_bytes(),
                );
                leaves.extend_from_slice(
                    state.current_justified_checkpoint.tree_hash_root().as_bytes(),
                );
                leaves.extend_from_slice(state.finalized_checkpoint.tree_hash_root().as_bytes());
            }
            BeaconState::Altair(state) => {
                leaves.extend_from_slice(state.genesis_time.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.genesis_validators_root.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.slot.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.fork.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.latest_block_header.tree_hash_root().as_bytes());
                leaves.extend_from_slice(
                    state
                        .block_roots
                        .recalculate_tree_hash_root(&mut self.block_roots)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .state_roots
                        .recalculate_tree_hash_root(&mut self.state_roots)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .historical_roots
                        .recalculate_tree_hash_root(&mut self.historical_roots)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(state.eth1_data.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.eth1_data_votes.tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.eth1_deposit_index.tree_hash_root().as_bytes());
                leaves.extend_from_slice(
                    self.validators
                        .recalculate_tree_hash_root(&state.validators)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .balances
                        .recalculate_tree_hash_root(&mut self.balances)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .randao_mixes
                        .recalculate_tree_hash_root(&mut self.randao_mixes)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    state
                        .slashings
                        .recalculate_tree_hash_root(&mut self.slashings)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    ParticipationList::new(&state.previous_epoch_participation)
                        .recalculate_tree_hash_root(&mut self.previous_epoch_participation)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(
                    ParticipationList::new(&state.current_epoch_participation)
                        .recalculate_tree_hash_root(&mut self.current_epoch_participation)?
                        .as_bytes(),
                );
                leaves.extend_from_slice(state.justification_bits.tree_hash_root().as_bytes());
                leaves.extend_from_slice(
                    state.previous_justified_checkpoint.tree_hash_root().as_bytes(),
                );
                leaves.extend_from_slice(
                    state.current_justified_checkpoint.tree_hash_root().as_bytes(),
                );
                leaves.extend_from_slice(state.finalized_checkpoint.tree_hash_root().as_bytes());
                leaves.extend_from_slice(
                    state
                        .inactivity_scores
                        .recalculate_tree_hash_root(&mut self.inactivity_scores)?
                        .as_bytes(),
                );
                leaves
                    .extend_from_slice(state.current_sync_committee.as_ref().tree_hash_root().as_bytes());
                leaves.extend_from_slice(state.next_sync_committee.as_ref().tree_hash_root().as_bytes());
            }
        }

        Ok(merkle_root(&leaves, 0))
    }
}

/// Cache for the validator registry list.
///
/// Per-validator roots are themselves cached so that only mutated validators are re-hashed; the
/// list cache above them then re-hashes only the dirtied paths.
#[derive(Debug, PartialEq, Clone)]
struct ValidatorsListTreeHashCache {
    list_cache: TreeHashCache,
    values: Vec<Validator>,
    roots: Vec<[u8; 32]>,
}

impl ValidatorsListTreeHashCache {
    fn new<T: EthSpec>(validators: &[Validator]) -> Self {
        Self {
            list_cache: TreeHashCache::new(
                int_log(T::ValidatorRegistryLimit::to_usize()),
                validators.len(),
            ),
            values: Vec::with_capacity(validators.len()),
            roots: Vec::with_capacity(validators.len()),
        }
    }

    fn recalculate_tree_hash_root(&mut self, validators: &[Validator]) -> Result<Hash256, Error> {
        if validators.len() < self.values.len() {
            return Err(Error::CannotShrink);
        }

        for (i, validator) in validators.iter().enumerate() {
            if self.values.get(i) != Some(validator) {
                let root = validator.tree_hash_root().to_fixed_bytes();
                if i < self.values.len() {
                    self.values[i] = validator.clone();
                    self.roots[i] = root;
                } else {
                    self.values.push(validator.clone());
                    self.roots.push(root);
                }
            }
        }

        let list_root = self
            .list_cache
            .recalculate_merkle_root(self.roots.iter().copied())?;
        Ok(mix_in_length(&list_root, validators.len()))
    }
}
