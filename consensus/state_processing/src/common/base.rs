use integer_sqrt::IntegerSquareRoot;
use safe_arith::{ArithError, SafeArith};
use types::ChainSpec;

/// The sqrt of the total active balance, precomputed once per epoch so that per-validator base
/// reward computation is two divisions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SqrtTotalActiveBalance(u64);

impl SqrtTotalActiveBalance {
    pub fn new(total_active_balance: u64) -> Self {
        Self(total_active_balance.integer_sqrt())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Returns the genesis-fork base reward for a validator with the given effective balance.
pub fn get_base_reward(
    validator_effective_balance: u64,
    sqrt_total_active_balance: SqrtTotalActiveBalance,
    spec: &ChainSpec,
) -> Result<u64, ArithError> {
    validator_effective_balance
        .safe_mul(spec.base_reward_factor)?
        .safe_div(sqrt_total_active_balance.as_u64())?
        .safe_div(spec.base_rewards_per_epoch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_is_floored_and_zero_safe() {
        assert_eq!(SqrtTotalActiveBalance::new(0).as_u64(), 0);
        assert_eq!(SqrtTotalActiveBalance::new(1).as_u64(), 1);
        assert_eq!(SqrtTotalActiveBalance::new(3).as_u64(), 1);
        assert_eq!(SqrtTotalActiveBalance::new(4).as_u64(), 2);
        assert_eq!(
            SqrtTotalActiveBalance::new(32_000_000_000_000).as_u64(),
            5_656_854
        );
    }

    #[test]
    fn base_reward_matches_hand_computation() {
        let spec = ChainSpec::mainnet();
        // 32 ETH effective, ~3.2m ETH total staked.
        let total = 3_200_000_000_000_000;
        let sqrt = SqrtTotalActiveBalance::new(total);
        let reward = get_base_reward(32_000_000_000, sqrt, &spec).unwrap();
        assert_eq!(reward, 32_000_000_000 * 64 / 56_568_542 / 4);
    }
}
