use crate::per_epoch_processing::Error;
use std::sync::Arc;
use types::{BeaconState, ChainSpec, EthSpec};

/// At sync committee period boundaries, promote the next committee and compute its successor.
pub fn process_sync_committee_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    if next_epoch.safe_rem(spec.epochs_per_sync_committee_period.as_u64())? == 0 {
        let promoted = state.next_sync_committee()?.clone();
        *state.current_sync_committee_mut()? = promoted;
        *state.next_sync_committee_mut()? = Arc::new(state.get_next_sync_committee(spec)?);
    }
    Ok(())
}
