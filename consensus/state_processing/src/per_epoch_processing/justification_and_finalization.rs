use crate::per_epoch_processing::{Error, EpochSummary};
use safe_arith::SafeArith;
use types::{BeaconState, BitVector, Checkpoint, EthSpec};

/// Update the justified and finalized checkpoints for matching target attestations.
///
/// Skipped entirely for the first two epochs after genesis, where there is not yet enough
/// history to justify anything.
pub fn process_justification_and_finalization<T: EthSpec>(
    state: &mut BeaconState<T>,
    summary: &EpochSummary,
) -> Result<(), Error> {
    if state.current_epoch() <= T::genesis_epoch().safe_add(1)? {
        return Ok(());
    }

    weigh_justification_and_finalization(
        state,
        summary.total_active_stake(),
        summary.previous_epoch_target_attesting_balance(),
        summary.current_epoch_target_attesting_balance(),
    )
}

/// Apply the Casper FFG 2/3-majority rule and the 4-bit finalization rule.
pub fn weigh_justification_and_finalization<T: EthSpec>(
    state: &mut BeaconState<T>,
    total_active_balance: u64,
    previous_target_balance: u64,
    current_target_balance: u64,
) -> Result<(), Error> {
    let previous_epoch = state.previous_epoch();
    let current_epoch = state.current_epoch();

    let old_previous_justified_checkpoint = state.previous_justified_checkpoint();
    let old_current_justified_checkpoint = state.current_justified_checkpoint();

    // Process justifications
    *state.previous_justified_checkpoint_mut() = state.current_justified_checkpoint();

    // Shift the justification bits up; bit 0 tracks the current epoch.
    let old_bits = state.justification_bits().clone();
    let mut new_bits = BitVector::new();
    for i in 1..new_bits.len() {
        new_bits
            .set(i, old_bits.get(i - 1).map_err(|_| Error::InvalidFlagIndex(i))?)
            .map_err(|_| Error::InvalidFlagIndex(i))?;
    }
    *state.justification_bits_mut() = new_bits;

    if previous_target_balance.safe_mul(3)? >= total_active_balance.safe_mul(2)? {
        *state.current_justified_checkpoint_mut() = Checkpoint {
            epoch: previous_epoch,
            root: *state.get_block_root_at_epoch(previous_epoch)?,
        };
        state
            .justification_bits_mut()
            .set(1, true)
            .map_err(|_| Error::InvalidFlagIndex(1))?;
    }

    if current_target_balance.safe_mul(3)? >= total_active_balance.safe_mul(2)? {
        *state.current_justified_checkpoint_mut() = Checkpoint {
            epoch: current_epoch,
            root: *state.get_block_root_at_epoch(current_epoch)?,
        };
        state
            .justification_bits_mut()
            .set(0, true)
            .map_err(|_| Error::InvalidFlagIndex(0))?;
    }

    let bits = state.justification_bits().clone();
    let all_bits_set = |range: std::ops::Range<usize>| -> bool {
        range
            .into_iter()
            .all(|i| bits.get(i).unwrap_or(false))
    };

    // The 2nd/3rd/4th most recent epochs are justified, the 4th was the supermajority source.
    if all_bits_set(1..4) && old_previous_justified_checkpoint.epoch + 3 == current_epoch {
        *state.finalized_checkpoint_mut() = old_previous_justified_checkpoint;
    }
    // The 2nd/3rd most recent epochs are justified, the 3rd was the supermajority source.
    if all_bits_set(1..3) && old_previous_justified_checkpoint.epoch + 2 == current_epoch {
        *state.finalized_checkpoint_mut() = old_previous_justified_checkpoint;
    }
    // The 1st/2nd/3rd most recent epochs are justified, the 3rd was the supermajority source.
    if all_bits_set(0..3) && old_current_justified_checkpoint.epoch + 2 == current_epoch {
        *state.finalized_checkpoint_mut() = old_current_justified_checkpoint;
    }
    // The 1st/2nd most recent epochs are justified, the 2nd was the supermajority source.
    if all_bits_set(0..2) && old_current_justified_checkpoint.epoch + 1 == current_epoch {
        *state.finalized_checkpoint_mut() = old_current_justified_checkpoint;
    }

    Ok(())
}
