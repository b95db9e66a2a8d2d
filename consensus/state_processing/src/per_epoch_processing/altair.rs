use super::{
    process_effective_balance_updates, process_eth1_data_reset,
    process_historical_roots_update, process_justification_and_finalization,
    process_randao_mixes_reset, process_registry_updates, process_slashings,
    process_slashings_reset, EpochSummary, Error,
};
use crate::epoch_cache::EpochCache;
use std::mem;
use types::{BeaconState, ChainSpec, EthSpec, RelativeEpoch};

pub mod inactivity_updates;
pub mod participation_flag_updates;
pub mod rewards_and_penalties;
pub mod sync_committee_updates;

pub use inactivity_updates::process_inactivity_updates;
pub use participation_flag_updates::process_participation_flag_updates;
pub use rewards_and_penalties::process_rewards_and_penalties;
pub use sync_committee_updates::process_sync_committee_updates;

/// The Altair epoch transition.
pub fn process_epoch<T: EthSpec>(
    state: &mut BeaconState<T>,
    spec: &ChainSpec,
) -> Result<EpochSummary, Error> {
    // Ensure the committee caches are built.
    state.build_committee_cache(RelativeEpoch::Previous, spec)?;
    state.build_committee_cache(RelativeEpoch::Current, spec)?;

    // Pre-compute per-epoch values which several phases consume.
    let epoch_cache = EpochCache::new(state, spec)?;

    // Single pass over the registry, deriving participation and the registry buckets.
    let mut summary = EpochSummary::new(state, spec)?;

    // Justification and finalization.
    process_justification_and_finalization(state, &summary)?;

    // Inactivity scores.
    process_inactivity_updates(state, &summary, spec)?;

    // Rewards and Penalties.
    process_rewards_and_penalties(state, &mut summary, &epoch_cache, spec)?;

    // Registry Updates.
    process_registry_updates(state, &summary, spec)?;

    // Slashings.
    process_slashings(state, &mut summary, spec)?;

    // Reset eth1 data votes.
    process_eth1_data_reset(state)?;

    // Update effective balances with hysteresis (lag).
    process_effective_balance_updates(state, spec)?;

    // Reset slashings
    process_slashings_reset(state)?;

    // Set randao mix
    process_randao_mixes_reset(state)?;

    // Set historical root accumulator
    process_historical_roots_update(state)?;

    // Rotate current/previous epoch participation
    process_participation_flag_updates(state)?;

    // Rotate the sync committees at period boundaries.
    process_sync_committee_updates(state, spec)?;

    // Rotate the epoch caches to suit the epoch transition, seeding the incoming shuffling from
    // the scan's next-epoch active set.
    if !state.committee_cache_is_initialized(RelativeEpoch::Next) {
        state.build_committee_cache_from_indices(
            RelativeEpoch::Next,
            mem::take(&mut summary.next_epoch_active_indices),
            spec,
        )?;
    }
    state.advance_caches();

    summary.observe_metrics();

    Ok(summary)
}
