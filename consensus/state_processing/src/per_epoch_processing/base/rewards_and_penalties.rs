use crate::epoch_cache::EpochCache;
use crate::metrics;
use crate::per_epoch_processing::epoch_summary::{
    FLAG_ELIGIBLE_ATTESTER, FLAG_PREV_HEAD_ATTESTER, FLAG_PREV_SOURCE_ATTESTER,
    FLAG_PREV_TARGET_ATTESTER, FLAG_UNSLASHED,
};
use crate::per_epoch_processing::{Delta, EpochSummary, Error};
use safe_arith::{ArithError, SafeArith};
use types::{BeaconState, ChainSpec, EthSpec, VariableList};

/// Combination of several deltas for a single validator.
#[derive(Default, Clone, Debug)]
struct AttestationDelta {
    source_delta: Delta,
    target_delta: Delta,
    head_delta: Delta,
    inclusion_delay_delta: Delta,
    inactivity_penalty_delta: Delta,
}

impl AttestationDelta {
    /// Flatten into a single delta.
    fn flatten(self) -> Result<Delta, Error> {
        let AttestationDelta {
            source_delta,
            target_delta,
            head_delta,
            inclusion_delay_delta,
            inactivity_penalty_delta,
        } = self;
        let mut result = Delta::default();
        for delta in [
            source_delta,
            target_delta,
            head_delta,
            inclusion_delay_delta,
            inactivity_penalty_delta,
        ] {
            result.combine(delta)?;
        }
        Ok(result)
    }
}

/// Apply attester and proposer rewards.
///
/// Deltas are computed for every validator against the pre-phase balances, then applied to the
/// summary's flat buffer and written back to the state in a single rebuild.
pub fn process_rewards_and_penalties<T: EthSpec>(
    state: &mut BeaconState<T>,
    summary: &mut EpochSummary,
    epoch_cache: &EpochCache,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if state.current_epoch() == T::genesis_epoch() {
        return Ok(());
    }

    let _timer = metrics::start_timer(&metrics::PROCESS_REWARDS_AND_PENALTIES_TIME);

    let deltas = get_attestation_deltas(state, summary, epoch_cache, spec)?;

    // Apply the deltas, erroring on overflow above but not on overflow below (saturating at 0
    // instead).
    for (index, delta) in deltas.into_iter().enumerate() {
        let delta = delta.flatten()?;
        let balance = summary
            .balances
            .get_mut(index)
            .ok_or(Error::BalancesOutOfBounds(index))?;
        *balance = balance
            .safe_add(delta.rewards)?
            .saturating_sub(delta.penalties);
    }

    *state.balances_mut() = VariableList::new(summary.balances.clone())?;

    Ok(())
}

/// Calculate the deltas for each attestation reward component for every validator.
fn get_attestation_deltas<T: EthSpec>(
    state: &BeaconState<T>,
    summary: &EpochSummary,
    epoch_cache: &EpochCache,
    spec: &ChainSpec,
) -> Result<Vec<AttestationDelta>, Error> {
    let finality_delay = (summary.previous_epoch - state.finalized_checkpoint().epoch).as_u64();
    let is_in_inactivity_leak = finality_delay > spec.min_epochs_to_inactivity_penalty;

    let total_stake = summary.total_active_stake();
    let total_increments = total_stake.safe_div(spec.effective_balance_increment)?;

    let components = [
        (
            FLAG_PREV_SOURCE_ATTESTER,
            summary.previous_epoch_source_attesting_balance(),
        ),
        (
            FLAG_PREV_TARGET_ATTESTER,
            summary.previous_epoch_target_attesting_balance(),
        ),
        (
            FLAG_PREV_HEAD_ATTESTER,
            summary.previous_epoch_head_attesting_balance(),
        ),
    ];

    let mut deltas = vec![AttestationDelta::default(); summary.statuses.len()];

    for (index, status) in summary.statuses.iter().enumerate() {
        // Is the validator eligible for rewards and penalties this epoch?
        if !status.has_flag(FLAG_ELIGIBLE_ATTESTER) {
            continue;
        }

        let base_reward = epoch_cache.get_base_reward(index)?;
        let proposer_reward = base_reward.safe_div(spec.proposer_reward_quotient)?;

        let mut delta = AttestationDelta::default();

        for ((flag, attesting_stake), component) in components.into_iter().zip([
            &mut delta.source_delta,
            &mut delta.target_delta,
            &mut delta.head_delta,
        ]) {
            if status.has_flag(flag | FLAG_UNSLASHED) {
                if is_in_inactivity_leak {
                    // Matching attesters are paid the full base reward during a leak; the
                    // inactivity penalty below claws the optimal total back.
                    component.reward(base_reward)?;
                } else {
                    let attesting_increments =
                        attesting_stake.safe_div(spec.effective_balance_increment)?;
                    component.reward(
                        base_reward
                            .safe_mul(attesting_increments)?
                            .safe_div(total_increments)?,
                    )?;
                }
            } else {
                component.penalize(base_reward)?;
            }
        }

        // Reward the earliest inclusion of the validator's previous-epoch attestation, splitting
        // a share to the including proposer.
        if status.has_flag(FLAG_UNSLASHED | FLAG_PREV_SOURCE_ATTESTER) {
            if let Some(inclusion) = status.inclusion_info {
                deltas
                    .get_mut(inclusion.proposer_index)
                    .ok_or(Error::ProposerOutOfBounds(inclusion.proposer_index))?
                    .inclusion_delay_delta
                    .reward(proposer_reward)?;

                let max_attester_reward = base_reward.safe_sub(proposer_reward)?;
                delta
                    .inclusion_delay_delta
                    .reward(max_attester_reward.safe_div(inclusion.delay)?)?;
            }
        }

        if is_in_inactivity_leak {
            // All eligible validators bleed their expected income; timely target attesters avoid
            // the quadratic term.
            delta.inactivity_penalty_delta.penalize(
                spec.base_rewards_per_epoch
                    .safe_mul(base_reward)?
                    .safe_sub(proposer_reward)?,
            )?;

            if !status.has_flag(FLAG_UNSLASHED | FLAG_PREV_TARGET_ATTESTER) {
                let effective_balance = epoch_cache.get_effective_balance(index)?;
                let penalty = u128::from(effective_balance)
                    .checked_mul(u128::from(finality_delay))
                    .ok_or(ArithError::Overflow)?
                    .checked_div(u128::from(spec.inactivity_penalty_quotient))
                    .ok_or(ArithError::DivisionByZero)?;
                delta
                    .inactivity_penalty_delta
                    .penalize(u64::try_from(penalty).map_err(|_| ArithError::Overflow)?)?;
            }
        }

        deltas
            .get_mut(index)
            .ok_or(Error::DeltaOutOfBounds(index))?
            .combine_attestation_delta(delta)?;
    }

    Ok(deltas)
}

impl AttestationDelta {
    fn combine_attestation_delta(&mut self, other: AttestationDelta) -> Result<(), Error> {
        self.source_delta.combine(other.source_delta)?;
        self.target_delta.combine(other.target_delta)?;
        self.head_delta.combine(other.head_delta)?;
        self.inclusion_delay_delta
            .combine(other.inclusion_delay_delta)?;
        self.inactivity_penalty_delta
            .combine(other.inactivity_penalty_delta)
    }
}
