use crate::per_epoch_processing::epoch_summary::{
    FLAG_ELIGIBLE_ATTESTER, FLAG_PREV_TARGET_ATTESTER, FLAG_UNSLASHED,
};
use crate::per_epoch_processing::{EpochSummary, Error};
use safe_arith::SafeArith;
use std::cmp::min;
use types::{BeaconState, ChainSpec, EthSpec};

/// Update every eligible validator's inactivity score.
///
/// Timely target attesters tick down towards zero, everyone else accrues the bias. Outside a
/// leak the whole population additionally decays by the recovery rate, so scores built up during
/// a leak are forgiven once finality resumes.
pub fn process_inactivity_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
    summary: &EpochSummary,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if state.current_epoch() == T::genesis_epoch() {
        return Ok(());
    }

    let in_inactivity_leak = state.is_in_inactivity_leak(summary.previous_epoch, spec);

    for (index, status) in summary.statuses.iter().enumerate() {
        if !status.has_flag(FLAG_ELIGIBLE_ATTESTER) {
            continue;
        }

        let inactivity_score = state.get_inactivity_score_mut(index)?;

        if status.has_flag(FLAG_UNSLASHED | FLAG_PREV_TARGET_ATTESTER) {
            // Avoid mutating when the score is 0 and can't go any lower; the common case.
            if *inactivity_score != 0 {
                inactivity_score.safe_sub_assign(1)?;
            }
        } else {
            inactivity_score.safe_add_assign(spec.inactivity_score_bias)?;
        }

        // Decrease the score of all validators for forgiveness when not during a leak
        if !in_inactivity_leak {
            let deduction = min(spec.inactivity_score_recovery_rate, *inactivity_score);
            inactivity_score.safe_sub_assign(deduction)?;
        }
    }

    Ok(())
}
