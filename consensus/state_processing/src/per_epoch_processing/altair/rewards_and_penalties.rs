use crate::epoch_cache::EpochCache;
use crate::metrics;
use crate::per_epoch_processing::epoch_summary::{
    FLAG_ELIGIBLE_ATTESTER, FLAG_PREV_HEAD_ATTESTER, FLAG_PREV_SOURCE_ATTESTER,
    FLAG_PREV_TARGET_ATTESTER, FLAG_UNSLASHED,
};
use crate::per_epoch_processing::{Delta, EpochSummary, Error};
use safe_arith::{ArithError, SafeArith};
use types::consts::altair::{
    PARTICIPATION_FLAG_WEIGHTS, TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX,
    TIMELY_TARGET_FLAG_INDEX, WEIGHT_DENOMINATOR,
};
use types::{BeaconState, ChainSpec, EthSpec, VariableList};

/// Apply the Altair flag-weighted attester rewards and the inactivity penalties.
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

    let mut deltas = vec![Delta::default(); summary.statuses.len()];

    for flag_index in 0..PARTICIPATION_FLAG_WEIGHTS.len() {
        get_flag_index_deltas(&mut deltas, state, summary, epoch_cache, flag_index, spec)?;
    }

    get_inactivity_penalty_deltas(&mut deltas, state, summary, epoch_cache, spec)?;

    // Apply the deltas, erroring on overflow above but not on overflow below (saturating at 0
    // instead).
    for (index, delta) in deltas.into_iter().enumerate() {
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

/// Return the deltas for a given flag index, weighted by the participating stake.
fn get_flag_index_deltas<T: EthSpec>(
    deltas: &mut [Delta],
    state: &BeaconState<T>,
    summary: &EpochSummary,
    epoch_cache: &EpochCache,
    flag_index: usize,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let (status_flag, unslashed_participating_balance) = match flag_index {
        TIMELY_SOURCE_FLAG_INDEX => (
            FLAG_PREV_SOURCE_ATTESTER,
            summary.previous_epoch_source_attesting_balance(),
        ),
        TIMELY_TARGET_FLAG_INDEX => (
            FLAG_PREV_TARGET_ATTESTER,
            summary.previous_epoch_target_attesting_balance(),
        ),
        TIMELY_HEAD_FLAG_INDEX => (
            FLAG_PREV_HEAD_ATTESTER,
            summary.previous_epoch_head_attesting_balance(),
        ),
        _ => return Err(Error::InvalidFlagIndex(flag_index)),
    };

    let weight = get_flag_weight(flag_index)?;
    let unslashed_participating_increments =
        unslashed_participating_balance.safe_div(spec.effective_balance_increment)?;
    let active_increments = summary
        .total_active_stake()
        .safe_div(spec.effective_balance_increment)?;

    let in_inactivity_leak = state.is_in_inactivity_leak(summary.previous_epoch, spec);

    for (index, status) in summary.statuses.iter().enumerate() {
        if !status.has_flag(FLAG_ELIGIBLE_ATTESTER) {
            continue;
        }

        let base_reward = epoch_cache.get_base_reward(index)?;
        let delta = deltas
            .get_mut(index)
            .ok_or(Error::DeltaOutOfBounds(index))?;

        if status.has_flag(status_flag | FLAG_UNSLASHED) {
            if !in_inactivity_leak {
                let reward_numerator = base_reward
                    .safe_mul(weight)?
                    .safe_mul(unslashed_participating_increments)?;
                delta.reward(
                    reward_numerator.safe_div(active_increments.safe_mul(WEIGHT_DENOMINATOR)?)?,
                )?;
            }
        } else if flag_index != TIMELY_HEAD_FLAG_INDEX {
            delta.penalize(base_reward.safe_mul(weight)?.safe_div(WEIGHT_DENOMINATOR)?)?;
        }
    }
    Ok(())
}

/// Get the weight for a `flag_index` from the constant list of all weights.
fn get_flag_weight(flag_index: usize) -> Result<u64, Error> {
    PARTICIPATION_FLAG_WEIGHTS
        .get(flag_index)
        .copied()
        .ok_or(Error::InvalidFlagIndex(flag_index))
}

/// Penalize validators who failed the timely-target vote in proportion to their inactivity
/// score.
fn get_inactivity_penalty_deltas<T: EthSpec>(
    deltas: &mut [Delta],
    state: &BeaconState<T>,
    summary: &EpochSummary,
    epoch_cache: &EpochCache,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let penalty_denominator = u128::from(spec.inactivity_score_bias)
        .checked_mul(u128::from(spec.inactivity_penalty_quotient_altair))
        .ok_or(ArithError::Overflow)?;

    for (index, status) in summary.statuses.iter().enumerate() {
        if !status.has_flag(FLAG_ELIGIBLE_ATTESTER) {
            continue;
        }

        if !status.has_flag(FLAG_UNSLASHED | FLAG_PREV_TARGET_ATTESTER) {
            let effective_balance = epoch_cache.get_effective_balance(index)?;
            let penalty_numerator = u128::from(effective_balance)
                .checked_mul(u128::from(state.get_inactivity_score(index)?))
                .ok_or(ArithError::Overflow)?;
            let penalty = penalty_numerator
                .checked_div(penalty_denominator)
                .ok_or(ArithError::DivisionByZero)?;

            deltas
                .get_mut(index)
                .ok_or(Error::DeltaOutOfBounds(index))?
                .penalize(u64::try_from(penalty).map_err(|_| ArithError::Overflow)?)?;
        }
    }
    Ok(())
}
