pub mod altair;
pub mod base;
pub mod effective_balance_updates;
pub mod epoch_summary;
pub mod errors;
pub mod historical_roots_update;
pub mod justification_and_finalization;
pub mod registry_updates;
pub mod resets;
pub mod slashings;
#[cfg(test)]
mod tests;

use crate::metrics;
pub use epoch_summary::{AttesterStatus, EpochSummary, InclusionInfo};
pub use errors::EpochProcessingError as Error;
pub use justification_and_finalization::process_justification_and_finalization;
pub use registry_updates::process_registry_updates;
pub use slashings::process_slashings;

pub use effective_balance_updates::process_effective_balance_updates;
pub use historical_roots_update::process_historical_roots_update;
pub use resets::{process_eth1_data_reset, process_randao_mixes_reset, process_slashings_reset};

use safe_arith::SafeArith;
use types::{BeaconState, ChainSpec, EthSpec};

/// Performs per-epoch processing on some BeaconState.
///
/// Mutates the given `BeaconState`, returning early if an error is encountered. If an error is
/// returned, a state might be "half-processed" and therefore in an invalid state.
pub fn process_epoch<T: EthSpec>(
    state: &mut BeaconState<T>,
    spec: &ChainSpec,
) -> Result<EpochSummary, Error> {
    let _timer = metrics::start_timer(&metrics::PROCESS_EPOCH_TIME);

    // Verify the `BeaconState` instantiation matches the fork at `state.slot()`.
    state
        .fork_name(spec)
        .map_err(Error::InconsistentStateFork)?;

    match state {
        BeaconState::Base(_) => base::process_epoch(state, spec),
        BeaconState::Altair(_) => altair::process_epoch(state, spec),
    }
}

/// Used to track the changes to a validator's balance.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Delta {
    pub rewards: u64,
    pub penalties: u64,
}

impl Delta {
    /// Reward with `reward`.
    pub fn reward(&mut self, reward: u64) -> Result<(), Error> {
        self.rewards = self.rewards.safe_add(reward)?;
        Ok(())
    }

    /// Penalize with `penalty`.
    pub fn penalize(&mut self, penalty: u64) -> Result<(), Error> {
        self.penalties = self.penalties.safe_add(penalty)?;
        Ok(())
    }

    /// Combine two deltas.
    pub fn combine(&mut self, other: Delta) -> Result<(), Error> {
        self.reward(other.rewards)?;
        self.penalize(other.penalties)
    }
}

#[cfg(test)]
mod delta_tests {
    use super::Delta;

    #[test]
    fn combine_sums_both_sides() {
        let mut a = Delta {
            rewards: 3,
            penalties: 1,
        };
        let b = Delta {
            rewards: 5,
            penalties: 6,
        };
        a.combine(b).unwrap();
        assert_eq!(
            a,
            Delta {
                rewards: 8,
                penalties: 7
            }
        );
    }

    #[test]
    fn overflow_is_an_error() {
        let mut delta = Delta {
            rewards: u64::MAX,
            penalties: 0,
        };
        assert!(delta.reward(1).is_err());
    }
}
