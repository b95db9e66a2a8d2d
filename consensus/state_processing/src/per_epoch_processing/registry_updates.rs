use crate::common::initiate_validator_exit;
use crate::metrics;
use crate::per_epoch_processing::{Error, EpochSummary};
use types::{BeaconState, ChainSpec, EthSpec};

/// Performs a validator registry update, if required.
///
/// Ejections run before activations; the index lists were bucketed by the summary scan and are
/// mutually exclusive.
pub fn process_registry_updates<T: EthSpec>(
    state: &mut BeaconState<T>,
    summary: &EpochSummary,
    spec: &ChainSpec,
) -> Result<(), Error> {
    let _timer = metrics::start_timer(&metrics::PROCESS_REGISTRY_UPDATES_TIME);

    let current_epoch = state.current_epoch();

    // Eject validators whose effective balance has drained to the ejection floor.
    for &index in &summary.indices_to_eject {
        initiate_validator_exit(state, index, spec)?;
    }

    // Admit fully-funded validators to the activation queue.
    let eligibility_epoch = current_epoch.safe_add(1)?;
    for &index in &summary.indices_eligible_for_activation_queue {
        state.get_validator_mut(index)?.activation_eligibility_epoch = eligibility_epoch;
    }

    // Dequeue activations, limited by the churn and by finality: a validator only activates
    // once its queue placement is finalized.
    let churn_limit = state.get_churn_limit(spec)? as usize;
    let activation_epoch = state.compute_activation_exit_epoch(current_epoch, spec)?;
    let finalized_epoch = state.finalized_checkpoint().epoch;

    for &index in summary
        .indices_eligible_for_activation
        .iter()
        .take(churn_limit)
    {
        let validator = state.get_validator_mut(index)?;
        if validator.activation_eligibility_epoch > finalized_epoch {
            break;
        }
        validator.activation_epoch = activation_epoch;
    }

    Ok(())
}
