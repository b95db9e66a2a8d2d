use crate::per_epoch_processing::Error;
use types::{BeaconState, EthSpec};

/// Rotate the pending attestation lists: the current epoch's records become the previous
/// epoch's, and the current list is emptied.
pub fn process_participation_record_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
) -> Result<(), Error> {
    let base_state = state.as_base_mut()?;
    base_state.previous_epoch_attestations =
        std::mem::take(&mut base_state.current_epoch_attestations);
    Ok(())
}
