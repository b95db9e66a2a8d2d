//! Provides the `EpochSummary`, the disposable per-epoch working set shared by every sub-phase of
//! the epoch transition.
//!
//! The spec is written as many separate functions which each re-scan the validator registry; a
//! literal transcription is O(phases × N). The summary collapses this to a single scan which
//! derives, per validator, a small bitflag status plus the index lists consumed by the registry
//! and slashing phases, and flat copies of the balances for the bulk-mutating phases.
//!
//! It is created at the start of `process_epoch`, threaded through the sub-phases, and returned
//! to the caller as a record of the epoch's participation.

use crate::common::altair::BaseRewardPerIncrement;
use crate::common::get_attesting_indices;
use crate::metrics;
use crate::per_epoch_processing::Error;
use safe_arith::{ArithError, SafeArith};
use types::consts::altair::{
    TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX,
};
use types::{BeaconState, ChainSpec, Epoch, EthSpec, PendingAttestation, Unsigned};

/// The validator was not slashed at scan time.
pub const FLAG_UNSLASHED: u8 = 1 << 0;
/// The validator participates in rewards, penalties and inactivity accounting this epoch.
pub const FLAG_ELIGIBLE_ATTESTER: u8 = 1 << 1;
pub const FLAG_PREV_SOURCE_ATTESTER: u8 = 1 << 2;
pub const FLAG_PREV_TARGET_ATTESTER: u8 = 1 << 3;
pub const FLAG_PREV_HEAD_ATTESTER: u8 = 1 << 4;
pub const FLAG_CURR_SOURCE_ATTESTER: u8 = 1 << 5;
pub const FLAG_CURR_TARGET_ATTESTER: u8 = 1 << 6;
pub const FLAG_CURR_HEAD_ATTESTER: u8 = 1 << 7;

/// Per-validator participation for one epoch transition, packed into a byte.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttesterStatus {
    /// True if the validator is active in the current epoch.
    pub active: bool,
    pub flags: u8,
    /// Earliest on-chain inclusion of the validator's previous-epoch attestation, if any.
    /// Genesis fork only; Altair replaces inclusion-delay rewards with timeliness flags.
    pub inclusion_info: Option<InclusionInfo>,
}

impl AttesterStatus {
    /// True if all bits of `mask` are set.
    #[inline]
    pub fn has_flag(&self, mask: u8) -> bool {
        self.flags & mask == mask
    }

    #[inline]
    pub fn set_flag(&mut self, mask: u8) {
        self.flags |= mask;
    }

    /// Note the inclusion of an attestation by this validator, keeping whichever inclusion is
    /// the earliest.
    pub fn update_inclusion_info(&mut self, new: InclusionInfo) {
        match &mut self.inclusion_info {
            Some(info) => {
                if new.delay < info.delay {
                    *info = new;
                }
            }
            None => self.inclusion_info = Some(new),
        }
    }
}

/// The distance between an attestation's slot and the slot of the block which included it, plus
/// the proposer who included it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InclusionInfo {
    pub delay: u64,
    pub proposer_index: usize,
}

/// A balance which will never be reported below `minimum`.
///
/// Used to enforce the `EFFECTIVE_BALANCE_INCREMENT` floor on stake totals without branching at
/// each accumulation.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Balance {
    raw: u64,
    minimum: u64,
}

impl Balance {
    /// Initialize the balance to `0`, or the given `minimum`.
    pub fn zero(minimum: u64) -> Self {
        Self { raw: 0, minimum }
    }

    /// Returns the balance with respect to the initialization `minimum`.
    pub fn get(&self) -> u64 {
        std::cmp::max(self.raw, self.minimum)
    }

    pub fn safe_add_assign(&mut self, other: u64) -> Result<(), ArithError> {
        self.raw.safe_add_assign(other)
    }
}

/// Stake totals derived during the scan, all floored at one effective balance increment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StakeTotals {
    pub total_active_stake: Balance,
    pub previous_epoch_source_stake: Balance,
    pub previous_epoch_target_stake: Balance,
    pub previous_epoch_head_stake: Balance,
    pub current_epoch_target_stake: Balance,
}

impl StakeTotals {
    fn zero(spec: &ChainSpec) -> Self {
        let zero = Balance::zero(spec.effective_balance_increment);
        StakeTotals {
            total_active_stake: zero,
            previous_epoch_source_stake: zero,
            previous_epoch_target_stake: zero,
            previous_epoch_head_stake: zero,
            current_epoch_target_stake: zero,
        }
    }
}

/// Disposable working set for one epoch transition, produced by a single pass over the validator
/// registry.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub previous_epoch: Epoch,
    pub current_epoch: Epoch,

    /// Per-validator participation statuses, parallel to the registry.
    pub statuses: Vec<AttesterStatus>,
    /// Flat copy of the raw balances, mutated by rewards/penalties and slashings before being
    /// written back to the state in one rebuild.
    pub balances: Vec<u64>,

    pub stakes: StakeTotals,
    /// `EFFECTIVE_BALANCE_INCREMENT * BASE_REWARD_FACTOR / isqrt(total_active_stake)`.
    /// Only present from Altair onwards.
    pub base_reward_per_increment: Option<BaseRewardPerIncrement>,

    /// Validators reaching the midpoint of their slashing window this epoch, with their
    /// effective balances.
    pub indices_to_slash: Vec<(usize, u64)>,
    /// Validators which have deposited enough to join the activation queue.
    pub indices_eligible_for_activation_queue: Vec<usize>,
    /// Queued validators, sorted by `(activation_eligibility_epoch, index)`. The registry phase
    /// dequeues up to the churn limit of these, stopping at the finalization horizon.
    pub indices_eligible_for_activation: Vec<usize>,
    /// Active validators whose effective balance has fallen to the ejection floor.
    pub indices_to_eject: Vec<usize>,
    /// Validators which will be active in the next epoch; used to seed the incoming shuffling
    /// without a second registry scan.
    pub next_epoch_active_indices: Vec<usize>,
}

impl EpochSummary {
    /// Instantiate `Self`, performing the single scan.
    pub fn new<T: EthSpec>(state: &BeaconState<T>, spec: &ChainSpec) -> Result<Self, Error> {
        let _timer = metrics::start_timer(&metrics::PROCESS_EPOCH_SUMMARY_TIME);

        if state.validators().len() != state.balances().len() {
            return Err(Error::RegistryInconsistent {
                validators: state.validators().len(),
                balances: state.balances().len(),
            });
        }

        let current_epoch = state.current_epoch();
        let previous_epoch = state.previous_epoch();
        let next_epoch = state.next_epoch()?;
        let slashing_window_target = current_epoch
            .safe_add(T::EpochsPerSlashingsVector::to_u64().safe_div(2)?)?;

        let validator_count = state.validators().len();
        let mut statuses = Vec::with_capacity(validator_count);
        let mut total_active_stake = Balance::zero(spec.effective_balance_increment);

        let mut indices_to_slash = vec![];
        let mut indices_eligible_for_activation_queue = vec![];
        let mut indices_eligible_for_activation = vec![];
        let mut indices_to_eject = vec![];
        let mut next_epoch_active_indices = vec![];

        // Altair reads participation directly off the state, one byte per validator.
        let participation = match state {
            BeaconState::Base(_) => None,
            BeaconState::Altair(altair) => Some((
                &altair.previous_epoch_participation,
                &altair.current_epoch_participation,
            )),
        };

        for (index, validator) in state.validators().iter().enumerate() {
            let mut status = AttesterStatus::default();

            if validator.slashed {
                if slashing_window_target == validator.withdrawable_epoch {
                    indices_to_slash.push((index, validator.effective_balance));
                }
            } else {
                status.set_flag(FLAG_UNSLASHED);
            }

            if state.is_eligible_validator(previous_epoch, validator) {
                status.set_flag(FLAG_ELIGIBLE_ATTESTER);
            }

            if validator.is_active_at(current_epoch) {
                status.active = true;
                total_active_stake.safe_add_assign(validator.effective_balance)?;
            }

            // Registry bucket ladder; the branches are mutually exclusive by construction and
            // must be evaluated in this order.
            if validator.is_eligible_for_activation_queue(spec) {
                indices_eligible_for_activation_queue.push(index);
            } else if validator.activation_epoch == spec.far_future_epoch
                && validator.activation_eligibility_epoch <= current_epoch
            {
                indices_eligible_for_activation.push(index);
            } else if status.active
                && validator.exit_epoch == spec.far_future_epoch
                && validator.effective_balance <= spec.ejection_balance
            {
                indices_to_eject.push(index);
            }

            if validator.is_active_at(next_epoch) {
                next_epoch_active_indices.push(index);
            }

            // Altair participation attribution, folded into the same pass.
            if let Some((previous_participation, current_participation)) = participation {
                if validator.is_active_at(previous_epoch) {
                    let flags = previous_participation
                        .get(index)
                        .ok_or(Error::StatusOutOfBounds(index))?;
                    if flags.has_flag(TIMELY_SOURCE_FLAG_INDEX)? {
                        status.set_flag(FLAG_PREV_SOURCE_ATTESTER);
                    }
                    if flags.has_flag(TIMELY_TARGET_FLAG_INDEX)? {
                        status.set_flag(FLAG_PREV_TARGET_ATTESTER);
                    }
                    if flags.has_flag(TIMELY_HEAD_FLAG_INDEX)? {
                        status.set_flag(FLAG_PREV_HEAD_ATTESTER);
                    }
                }
                if status.active {
                    let flags = current_participation
                        .get(index)
                        .ok_or(Error::StatusOutOfBounds(index))?;
                    if flags.has_flag(TIMELY_SOURCE_FLAG_INDEX)? {
                        status.set_flag(FLAG_CURR_SOURCE_ATTESTER);
                    }
                    if flags.has_flag(TIMELY_TARGET_FLAG_INDEX)? {
                        status.set_flag(FLAG_CURR_TARGET_ATTESTER);
                    }
                    if flags.has_flag(TIMELY_HEAD_FLAG_INDEX)? {
                        status.set_flag(FLAG_CURR_HEAD_ATTESTER);
                    }
                }
            }

            statuses.push(status);
        }

        // Genesis-fork participation is recorded as pending attestations rather than flags.
        if let BeaconState::Base(_) = state {
            process_pending_attestations(state, &mut statuses, previous_epoch, current_epoch)?;
        }

        // Dequeue order for activations.
        indices_eligible_for_activation.sort_unstable_by_key(|&index| {
            (
                state
                    .validators()
                    .get(index)
                    .map(|v| v.activation_eligibility_epoch)
                    .unwrap_or_else(Epoch::max_value),
                index,
            )
        });

        // Fold the stake totals off the finished statuses.
        let mut stakes = StakeTotals::zero(spec);
        stakes.total_active_stake = total_active_stake;
        for (status, validator) in statuses.iter().zip(state.validators().iter()) {
            let effective_balance = validator.effective_balance;
            if status.has_flag(FLAG_UNSLASHED | FLAG_PREV_SOURCE_ATTESTER) {
                stakes
                    .previous_epoch_source_stake
                    .safe_add_assign(effective_balance)?;
            }
            if status.has_flag(FLAG_UNSLASHED | FLAG_PREV_TARGET_ATTESTER) {
                stakes
                    .previous_epoch_target_stake
                    .safe_add_assign(effective_balance)?;
            }
            if status.has_flag(FLAG_UNSLASHED | FLAG_PREV_HEAD_ATTESTER) {
                stakes
                    .previous_epoch_head_stake
                    .safe_add_assign(effective_balance)?;
            }
            if status.has_flag(FLAG_UNSLASHED | FLAG_CURR_TARGET_ATTESTER) {
                stakes
                    .current_epoch_target_stake
                    .safe_add_assign(effective_balance)?;
            }
        }

        let base_reward_per_increment = match state {
            BeaconState::Base(_) => None,
            BeaconState::Altair(_) => Some(BaseRewardPerIncrement::new(
                stakes.total_active_stake.get(),
                spec,
            )?),
        };

        Ok(EpochSummary {
            previous_epoch,
            current_epoch,
            statuses,
            balances: state.balances().to_vec(),
            stakes,
            base_reward_per_increment,
            indices_to_slash,
            indices_eligible_for_activation_queue,
            indices_eligible_for_activation,
            indices_to_eject,
            next_epoch_active_indices,
        })
    }

    /*
     * Stake totals, floored at one increment.
     */

    pub fn total_active_stake(&self) -> u64 {
        self.stakes.total_active_stake.get()
    }

    pub fn previous_epoch_source_attesting_balance(&self) -> u64 {
        self.stakes.previous_epoch_source_stake.get()
    }

    pub fn previous_epoch_target_attesting_balance(&self) -> u64 {
        self.stakes.previous_epoch_target_stake.get()
    }

    pub fn previous_epoch_head_attesting_balance(&self) -> u64 {
        self.stakes.previous_epoch_head_stake.get()
    }

    pub fn current_epoch_target_attesting_balance(&self) -> u64 {
        self.stakes.current_epoch_target_stake.get()
    }

    /*
     * Per-validator queries, for downstream consumers (duty trackers, reward APIs).
     */

    pub fn get_status(&self, validator_index: usize) -> Result<&AttesterStatus, Error> {
        self.statuses
            .get(validator_index)
            .ok_or(Error::StatusOutOfBounds(validator_index))
    }

    /// Always returns `false` for an unknown `validator_index`.
    pub fn is_active_unslashed_in_current_epoch(&self, validator_index: usize) -> bool {
        self.statuses
            .get(validator_index)
            .map_or(false, |s| s.active && s.has_flag(FLAG_UNSLASHED))
    }

    /// Always returns `false` for an unknown `validator_index`.
    pub fn is_previous_epoch_source_attester(&self, validator_index: usize) -> bool {
        self.statuses
            .get(validator_index)
            .map_or(false, |s| s.has_flag(FLAG_PREV_SOURCE_ATTESTER))
    }

    /// Always returns `false` for an unknown `validator_index`.
    pub fn is_previous_epoch_target_attester(&self, validator_index: usize) -> bool {
        self.statuses
            .get(validator_index)
            .map_or(false, |s| s.has_flag(FLAG_PREV_TARGET_ATTESTER))
    }

    /// Always returns `false` for an unknown `validator_index`.
    pub fn is_previous_epoch_head_attester(&self, validator_index: usize) -> bool {
        self.statuses
            .get(validator_index)
            .map_or(false, |s| s.has_flag(FLAG_PREV_HEAD_ATTESTER))
    }

    /// Updates the participation Prometheus gauges from the scan's stake totals.
    pub fn observe_metrics(&self) {
        metrics::set_gauge(
            &metrics::PARTICIPATION_CURRENT_EPOCH_ACTIVE_GWEI_TOTAL,
            self.total_active_stake() as i64,
        );
        metrics::set_gauge(
            &metrics::PARTICIPATION_PREV_EPOCH_SOURCE_ATTESTING_GWEI_TOTAL,
            self.previous_epoch_source_attesting_balance() as i64,
        );
        metrics::set_gauge(
            &metrics::PARTICIPATION_PREV_EPOCH_TARGET_ATTESTING_GWEI_TOTAL,
            self.previous_epoch_target_attesting_balance() as i64,
        );
        metrics::set_gauge(
            &metrics::PARTICIPATION_PREV_EPOCH_HEAD_ATTESTING_GWEI_TOTAL,
            self.previous_epoch_head_attesting_balance() as i64,
        );
    }
}

/// Fold the pending attestation lists of a genesis-fork state into the statuses.
///
/// Target and head votes only count when they match the state's own record of history; source
/// correctness was enforced when the attestation was included in a block.
fn process_pending_attestations<T: EthSpec>(
    state: &BeaconState<T>,
    statuses: &mut [AttesterStatus],
    previous_epoch: Epoch,
    current_epoch: Epoch,
) -> Result<(), Error> {
    let attestations = state
        .previous_epoch_attestations()?
        .iter()
        .chain(state.current_epoch_attestations()?.iter());

    for attestation in attestations {
        let data = &attestation.data;

        let committee = state.get_beacon_committee(data.slot, data.index)?;
        let attesting_indices =
            get_attesting_indices::<T>(committee.committee, &attestation.aggregation_bits)?;

        let (source_flag, target_flag, head_flag) = if data.target.epoch == current_epoch {
            (
                FLAG_CURR_SOURCE_ATTESTER,
                FLAG_CURR_TARGET_ATTESTER,
                FLAG_CURR_HEAD_ATTESTER,
            )
        } else {
            (
                FLAG_PREV_SOURCE_ATTESTER,
                FLAG_PREV_TARGET_ATTESTER,
                FLAG_PREV_HEAD_ATTESTER,
            )
        };

        let is_matching_target =
            data.target.root == *state.get_block_root_at_epoch(data.target.epoch)?;
        let is_matching_head = is_matching_target
            && data.beacon_block_root == *state.get_block_root(data.slot)?;

        for index in attesting_indices {
            let status = statuses
                .get_mut(index)
                .ok_or(Error::StatusOutOfBounds(index))?;

            // Inclusion on chain implies a matching source.
            status.set_flag(source_flag);
            if is_matching_target {
                status.set_flag(target_flag);
            }
            if is_matching_head {
                status.set_flag(head_flag);
            }

            if data.target.epoch == previous_epoch {
                status.update_inclusion_info(inclusion_info(attestation));
            }
        }
    }

    Ok(())
}

fn inclusion_info<T: EthSpec>(attestation: &PendingAttestation<T>) -> InclusionInfo {
    InclusionInfo {
        delay: attestation.inclusion_delay,
        proposer_index: attestation.proposer_index as usize,
    }
}
