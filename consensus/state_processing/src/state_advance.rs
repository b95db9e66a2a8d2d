//! Functions for advancing a `BeaconState` forward some number of slots without blocks (i.e.,
//! skip slots).
//!
//! These functions are not in the specification, however they're defined here to reduce code
//! duplication and protect against some easy-to-make mistakes when performing state advances.

use crate::per_slot_processing;
use types::{BeaconState, ChainSpec, EthSpec, Hash256, Slot};

#[derive(Debug, PartialEq)]
pub enum Error {
    /// The target slot must be strictly ahead of the state's slot.
    SlotBehind {
        state_slot: Slot,
        target_slot: Slot,
    },
    PerSlotProcessing(per_slot_processing::Error),
    StateRootNotProvided,
}

impl From<per_slot_processing::Error> for Error {
    fn from(e: per_slot_processing::Error) -> Error {
        Error::PerSlotProcessing(e)
    }
}

/// Advances the `state` to the given `target_slot`, assuming that there were no blocks between
/// these slots, firing the epoch transition at each epoch boundary crossed.
///
/// ## Errors
///
/// - `SlotBehind` if `target_slot <= state.slot()`.
pub fn process_slots<T: EthSpec>(
    state: &mut BeaconState<T>,
    target_slot: Slot,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if target_slot <= state.slot() {
        return Err(Error::SlotBehind {
            state_slot: state.slot(),
            target_slot,
        });
    }

    while state.slot() < target_slot {
        per_slot_processing(state, None, spec)?;
    }

    Ok(())
}

/// Advances the `state` to the given `target_slot`, assuming that there were no blocks between
/// these slots.
///
/// This is a "partial" state advance which outputs an **invalid** `BeaconState`. The state is
/// invalid because the intermediate state roots are not computed. Avoiding computing state roots
/// saves *a lot* of compute time and can be a useful optimization when a state only needs to be
/// advanced to obtain proposer/attester shuffling as they are indifferent to state roots.
///
/// For clarity, **be careful with this function as it produces invalid states**.
///
/// ## Errors
///
/// - `SlotBehind` if `target_slot <= state.slot()`.
/// - `StateRootNotProvided` if `state_root_opt.is_none()` but the latest block header requires a
///   state root.
pub fn partial_state_advance<T: EthSpec>(
    state: &mut BeaconState<T>,
    state_root_opt: Option<Hash256>,
    target_slot: Slot,
    spec: &ChainSpec,
) -> Result<(), Error> {
    if target_slot <= state.slot() {
        return Err(Error::SlotBehind {
            state_slot: state.slot(),
            target_slot,
        });
    }

    // A state root is only mandatory when a block was just applied and the state has not been
    // advanced past it: the latest block header still carries a zeroed state root, and skipping
    // the patch would write garbage into `state.block_roots`.
    let mut initial_state_root = Some(if state.slot() > state.latest_block_header().slot {
        state_root_opt.unwrap_or_else(Hash256::zero)
    } else {
        state_root_opt.ok_or(Error::StateRootNotProvided)?
    });

    while state.slot() < target_slot {
        // The real root is only relevant on the first iteration, where the header patch might
        // happen; later iterations write placeholder roots by construction.
        let state_root = initial_state_root.take().unwrap_or_else(Hash256::zero);

        per_slot_processing(state, Some(state_root), spec)?;
    }

    Ok(())
}
