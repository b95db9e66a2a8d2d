use crate::per_epoch_processing::Error;
use types::{BeaconState, EthSpec, Unsigned, VariableList};

pub fn process_eth1_data_reset<T: EthSpec>(state: &mut BeaconState<T>) -> Result<(), Error> {
    if state
        .slot()
        .safe_add(1)?
        .safe_rem(T::SlotsPerEth1VotingPeriod::to_u64())?
        == 0
    {
        *state.eth1_data_votes_mut() = VariableList::empty();
    }
    Ok(())
}

pub fn process_slashings_reset<T: EthSpec>(state: &mut BeaconState<T>) -> Result<(), Error> {
    let next_epoch = state.next_epoch()?;
    state.set_slashings(next_epoch, 0)?;
    Ok(())
}

pub fn process_randao_mixes_reset<T: EthSpec>(state: &mut BeaconState<T>) -> Result<(), Error> {
    let current_epoch = state.current_epoch();
    let next_epoch = state.next_epoch()?;
    state.set_randao_mix(next_epoch, *state.get_randao_mix(current_epoch)?)?;
    Ok(())
}
