use crate::common::decrease_balance;
use crate::metrics;
use crate::per_epoch_processing::{Error, EpochSummary};
use safe_arith::{ArithError, SafeArith};
use types::{BeaconState, ChainSpec, EthSpec};

/// Process slashings.
///
/// Applies the proportional slashing penalty to every validator which reaches the midpoint of
/// its slashing window this epoch. Both the live balances and the summary's flat buffer are
/// updated, so later phases may read either.
pub fn process_slashings<T: EthSpec>(
    state: &mut BeaconState<T>,
    summary: &mut EpochSummary,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let _timer = metrics::start_timer(&metrics::PROCESS_SLASHINGS_TIME);

    let total_balance = summary.total_active_stake();

    let sum_slashings = state
        .slashings()
        .iter()
        .copied()
        .try_fold(0u64, |sum, amount| sum.safe_add(amount))?;

    let adjusted_total_slashing_balance = std::cmp::min(
        sum_slashings.safe_mul(spec.proportional_slashing_multiplier_for_state(state))?,
        total_balance,
    );

    let increment = spec.effective_balance_increment;

    for &(index, validator_effective_balance) in &summary.indices_to_slash {
        // The penalty scales the adjusted slashing balance by the validator's share of the total
        // stake. The product runs through 128 bits: flooring before the final division would
        // erase sub-increment penalties.
        let penalty_numerator = u128::from(validator_effective_balance.safe_div(increment)?)
            .checked_mul(u128::from(adjusted_total_slashing_balance))
            .and_then(|n| n.checked_mul(u128::from(increment)))
            .ok_or(ArithError::Overflow)?;
        let penalty_wide = penalty_numerator
            .checked_div(u128::from(total_balance))
            .ok_or(ArithError::DivisionByZero)?;
        let penalty = u64::try_from(penalty_wide).map_err(|_| ArithError::Overflow)?;

        decrease_balance(state, index, penalty)?;

        let flat_balance = summary
            .balances
            .get_mut(index)
            .ok_or(Error::BalancesOutOfBounds(index))?;
        *flat_balance = flat_balance.saturating_sub(penalty);
    }

    Ok(())
}
