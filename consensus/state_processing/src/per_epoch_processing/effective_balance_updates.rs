use crate::per_epoch_processing::Error;
use safe_arith::SafeArith;
use types::{BeaconState, BeaconStateError, ChainSpec, EthSpec};

/// Adjust every validator's effective balance towards its raw balance, with hysteresis.
///
/// An update only triggers once the raw balance drifts past the downward or upward threshold,
/// preventing effective balances (and thus the whole Merkleized registry) from churning on
/// every reward cycle.
pub fn process_effective_balance_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let hysteresis_increment = spec
        .effective_balance_increment
        .safe_div(spec.hysteresis_quotient)?;
    let downward_threshold = hysteresis_increment.safe_mul(spec.hysteresis_downward_multiplier)?;
    let upward_threshold = hysteresis_increment.safe_mul(spec.hysteresis_upward_multiplier)?;

    let (validators, balances) = state.validators_and_balances_mut();

    for (index, validator) in validators.iter_mut().enumerate() {
        let balance = balances
            .get(index)
            .copied()
            .ok_or(BeaconStateError::BalancesOutOfBounds(index))?;

        let should_decrease =
            balance.safe_add(downward_threshold)? < validator.effective_balance;
        let should_increase = validator.effective_balance < spec.max_effective_balance
            && validator.effective_balance.safe_add(upward_threshold)? < balance;

        if should_decrease || should_increase {
            validator.effective_balance = std::cmp::min(
                balance.safe_sub(balance.safe_rem(spec.effective_balance_increment)?)?,
                spec.max_effective_balance,
            );
        }
    }
    Ok(())
}
