use crate::beacon_state::Error;
use crate::{
    BeaconState, ChainSpec, CommitteeIndex, Domain, Epoch, EthSpec, Hash256, Slot, Validator,
};
use std::num::NonZeroUsize;
use std::ops::Range;
use swap_or_not_shuffle::shuffle_list;

/// A spec-compliant committee of validators for a single `(slot, index)` pair.
#[derive(Debug, PartialEq, Clone)]
pub struct BeaconCommittee<'a> {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub committee: &'a [usize],
}

/// The duties of a single validator with respect to attesting, for one epoch.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct AttestationDuty {
    /// The slot during which the attester must attest.
    pub slot: Slot,
    /// The index of the committee within `slot` of which the validator is a member.
    pub index: CommitteeIndex,
    /// The position of the validator in the committee.
    pub committee_position: usize,
    /// The total number of attesters in the committee.
    pub committee_len: usize,
}

/// Computes and stores the shuffling for an epoch. Provides various getters to allow callers to
/// read the committees for the given epoch.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct CommitteeCache {
    initialized_epoch: Option<Epoch>,
    shuffling: Vec<usize>,
    /// For each validator index, its position in `shuffling` plus one (zero means "not active").
    shuffling_positions: Vec<Option<NonZeroUsize>>,
    committees_per_slot: u64,
    slots_per_epoch: u64,
}

impl CommitteeCache {
    /// Return a new, fully initialized cache for the shuffling at `epoch`.
    pub fn initialized<T: EthSpec>(
        state: &BeaconState<T>,
        epoch: Epoch,
        spec: &ChainSpec,
    ) -> Result<CommitteeCache, Error> {
        // The seed lookup will fail for epochs out of randao-mix range; check it first so the
        // error is attributable.
        let seed = state.get_seed(epoch, Domain::BeaconAttester, spec)?;
        let active_validator_indices =
            get_active_validator_indices(state.validators(), epoch);

        Self::from_active_indices::<T>(
            active_validator_indices,
            seed,
            epoch,
            state.validators().len(),
            spec,
        )
    }

    /// Build a cache from a precomputed active set.
    ///
    /// Used when rotating the caches at an epoch boundary, where the incoming epoch's active set
    /// was already derived during the transition scan.
    pub fn from_active_indices<T: EthSpec>(
        active_validator_indices: Vec<usize>,
        seed: Hash256,
        epoch: Epoch,
        validator_count: usize,
        spec: &ChainSpec,
    ) -> Result<CommitteeCache, Error> {
        if active_validator_indices.is_empty() {
            return Err(Error::InsufficientValidators);
        }

        let committees_per_slot = T::get_committee_count_per_slot(
            active_validator_indices.len(),
            spec,
        )? as u64;

        let shuffling = shuffle_list(
            active_validator_indices,
            spec.shuffle_round_count,
            seed.as_bytes(),
            false,
        )
        .ok_or(Error::UnableToShuffle)?;

        let mut shuffling_positions = vec![None; validator_count];
        for (i, &v) in shuffling.iter().enumerate() {
            *shuffling_positions
                .get_mut(v)
                .ok_or(Error::ShuffleIndexOutOfBounds(v))? = NonZeroUsize::new(i + 1);
        }

        Ok(CommitteeCache {
            initialized_epoch: Some(epoch),
            shuffling,
            shuffling_positions,
            committees_per_slot,
            slots_per_epoch: T::slots_per_epoch(),
        })
    }

    /// Returns `true` if the cache has been initialized at the supplied `epoch`.
    ///
    /// An non-initialized cache does not provide any useful information.
    pub fn is_initialized_at(&self, epoch: Epoch) -> bool {
        Some(epoch) == self.initialized_epoch
    }

    /// Returns the shuffled list of active validator indices for the initialized epoch.
    ///
    /// Note: this list is not in ascending order, it is in shuffled order.
    pub fn shuffling(&self) -> &[usize] {
        &self.shuffling
    }

    /// Returns the number of active validators in the initialized epoch.
    pub fn active_validator_count(&self) -> usize {
        self.shuffling.len()
    }

    /// Returns the total number of committees in the initialized epoch.
    pub fn epoch_committee_count(&self) -> usize {
        self.committees_per_slot as usize * self.slots_per_epoch as usize
    }

    /// Returns the number of committees per slot for this cache's epoch.
    pub fn committees_per_slot(&self) -> u64 {
        self.committees_per_slot
    }

    /// Get the Beacon committee for the given `slot` and `index`.
    ///
    /// Returns `None` if the cache is uninitialized or the inputs are out of range.
    pub fn get_beacon_committee(&self, slot: Slot, index: CommitteeIndex) -> Option<BeaconCommittee> {
        let epoch = self.initialized_epoch?;
        if !self.is_initialized_at(slot.epoch(self.slots_per_epoch)) || index >= self.committees_per_slot
        {
            return None;
        }

        let position = epoch.position(slot, self.slots_per_epoch)? as u64;
        let committee_index = position * self.committees_per_slot + index;
        let committee = self.compute_committee(committee_index as usize)?;

        Some(BeaconCommittee {
            slot,
            index,
            committee,
        })
    }

    /// Get all the Beacon committees at a given `slot`.
    pub fn get_beacon_committees_at_slot(&self, slot: Slot) -> Result<Vec<BeaconCommittee>, Error> {
        if self.initialized_epoch.is_none() {
            return Err(Error::CommitteeCacheUninitialized(None));
        }

        (0..self.committees_per_slot)
            .map(|index| {
                self.get_beacon_committee(slot, index)
                    .ok_or(Error::NoCommittee { slot, index })
            })
            .collect()
    }

    /// Returns the attestation duties for `validator_index`, if the validator is active for this
    /// cache's epoch.
    pub fn get_attestation_duties(&self, validator_index: usize) -> Option<AttestationDuty> {
        let epoch = self.initialized_epoch?;
        let position_in_shuffling = self.shuffled_position(validator_index)?;

        (0..self.epoch_committee_count()).find_map(|committee_index| {
            let range = self.compute_committee_range(committee_index)?;
            if range.contains(&position_in_shuffling) {
                let slot = epoch.start_slot(self.slots_per_epoch)
                    + committee_index as u64 / self.committees_per_slot;
                Some(AttestationDuty {
                    slot,
                    index: committee_index as u64 % self.committees_per_slot,
                    committee_position: position_in_shuffling - range.start,
                    committee_len: range.end - range.start,
                })
            } else {
                None
            }
        })
    }

    /// Returns a slice of `self.shuffling` representing the `index`'th committee in the epoch.
    fn compute_committee(&self, index: usize) -> Option<&[usize]> {
        self.shuffling.get(self.compute_committee_range(index)?)
    }

    /// Computes the range of `self.shuffling` that sources the `index`'th committee in the epoch.
    ///
    /// Committees are distributed evenly: validator `v` of the shuffling lands in committee
    /// `v * count / len`.
    fn compute_committee_range(&self, index: usize) -> Option<Range<usize>> {
        let count = self.epoch_committee_count();
        if count == 0 || index >= count {
            return None;
        }

        let num_validators = self.shuffling.len();
        let start = (num_validators * index) / count;
        let end = (num_validators * (index + 1)) / count;

        Some(start..end)
    }

    /// Returns the position of `validator_index` in the shuffling, if it is active this epoch.
    fn shuffled_position(&self, validator_index: usize) -> Option<usize> {
        self.shuffling_positions
            .get(validator_index)?
            .map(|p| p.get() - 1)
    }
}

/// Returns a list of all `validators` indices where the validator is active at the given `epoch`.
pub fn get_active_validator_indices(validators: &[Validator], epoch: Epoch) -> Vec<usize> {
    let mut active = Vec::with_capacity(validators.len());

    for (index, validator) in validators.iter().enumerate() {
        if validator.is_active_at(epoch) {
            active.push(index)
        }
    }

    active
}
