use integer_sqrt::IntegerSquareRoot;
use safe_arith::{ArithError, SafeArith};
use types::ChainSpec;

/// This type exists to avoid confusing `total_active_balance` with `base_reward_per_increment`,
/// since they are used in close proximity and the same type (`u64`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BaseRewardPerIncrement(u64);

impl BaseRewardPerIncrement {
    pub fn new(total_active_balance: u64, spec: &ChainSpec) -> Result<Self, ArithError> {
        get_base_reward_per_increment(total_active_balance, spec).map(Self)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Returns the Altair base reward for a validator with the given effective balance.
pub fn get_base_reward(
    validator_effective_balance: u64,
    base_reward_per_increment: BaseRewardPerIncrement,
    spec: &ChainSpec,
) -> Result<u64, ArithError> {
    validator_effective_balance
        .safe_div(spec.effective_balance_increment)?
        .safe_mul(base_reward_per_increment.as_u64())
}

fn get_base_reward_per_increment(
    total_active_balance: u64,
    spec: &ChainSpec,
) -> Result<u64, ArithError> {
    spec.effective_balance_increment
        .safe_mul(spec.base_reward_factor)?
        .safe_div(total_active_balance.integer_sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_linearly_with_increments() {
        let spec = ChainSpec::mainnet();
        let per_increment = BaseRewardPerIncrement::new(32_000_000_000_000, &spec).unwrap();

        let one = get_base_reward(1_000_000_000, per_increment, &spec).unwrap();
        let thirty_two = get_base_reward(32_000_000_000, per_increment, &spec).unwrap();
        assert_eq!(one * 32, thirty_two);
    }
}
