use crate::per_epoch_processing::Error;
use std::mem;
use types::{BeaconState, EthSpec, ParticipationFlags, VariableList};

/// Rotate the participation byte lists: the current epoch's flags become the previous epoch's,
/// and the current list is zeroed.
pub fn process_participation_flag_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
) -> Result<(), Error> {
    *state.previous_epoch_participation_mut()? =
        mem::take(state.current_epoch_participation_mut()?);
    *state.current_epoch_participation_mut()? = VariableList::new(vec![
        ParticipationFlags::default();
        state.validators().len()
    ])?;
    Ok(())
}
