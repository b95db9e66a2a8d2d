#![cfg(test)]

use crate::epoch_cache::EpochCache;
use crate::per_epoch_processing::effective_balance_updates::process_effective_balance_updates;
use crate::per_epoch_processing::{process_epoch, EpochSummary};
use crate::state_advance::{process_slots, Error as StateAdvanceError};
use crate::test_utils::TestingStateBuilder;
use ssz::Encode;
use types::{
    AttestationData, BeaconState, BitList, ChainSpec, Checkpoint, Epoch, EthSpec, MinimalEthSpec,
    PendingAttestation, Slot, Unsigned,
};

type E = MinimalEthSpec;

fn base_spec() -> ChainSpec {
    E::default_spec()
}

fn altair_spec() -> ChainSpec {
    let mut spec = E::default_spec();
    spec.altair_fork_epoch = Some(Epoch::new(0));
    spec
}

fn fresh_state(validator_count: usize, spec: &ChainSpec) -> BeaconState<E> {
    TestingStateBuilder::new(validator_count, spec).build()
}

/// Every post-state must satisfy these regardless of what the transition did.
fn check_invariants(state: &BeaconState<E>, spec: &ChainSpec) {
    assert_eq!(state.validators().len(), state.balances().len());

    for validator in state.validators().iter() {
        assert!(validator.effective_balance <= spec.max_effective_balance);
        assert_eq!(
            validator.effective_balance % spec.effective_balance_increment,
            0
        );

        // Epoch ordering, treating the far-future epoch as infinity.
        assert!(validator.activation_eligibility_epoch <= validator.activation_epoch);
        assert!(validator.activation_epoch <= validator.exit_epoch);
        assert!(validator.exit_epoch <= validator.withdrawable_epoch);
    }

    assert!(state.finalized_checkpoint().epoch <= state.current_justified_checkpoint().epoch);
}

/// Construct a full-participation pending attestation for the given committee.
fn full_attestation(
    state: &BeaconState<E>,
    slot: Slot,
    index: u64,
    target_epoch: Epoch,
) -> PendingAttestation<E> {
    let committee = state.get_beacon_committee(slot, index).unwrap();

    let mut aggregation_bits = BitList::with_capacity(committee.committee.len()).unwrap();
    for i in 0..committee.committee.len() {
        aggregation_bits.set(i, true).unwrap();
    }

    PendingAttestation {
        aggregation_bits,
        data: AttestationData {
            slot,
            index,
            beacon_block_root: *state.get_block_root(slot).unwrap(),
            source: state.previous_justified_checkpoint(),
            target: Checkpoint {
                epoch: target_epoch,
                root: *state.get_block_root_at_epoch(target_epoch).unwrap(),
            },
        },
        inclusion_delay: 1,
        proposer_index: 0,
    }
}

#[test]
fn genesis_epoch_transitions_leave_finality_untouched() {
    let spec = base_spec();
    let mut state = fresh_state(16, &spec);

    // Cross the first two epoch boundaries; justification is specified as a no-op there.
    process_slots(&mut state, Epoch::new(2).start_slot(E::slots_per_epoch()), &spec).unwrap();

    assert_eq!(state.current_justified_checkpoint(), Checkpoint::default());
    assert_eq!(state.previous_justified_checkpoint(), Checkpoint::default());
    assert_eq!(state.finalized_checkpoint(), Checkpoint::default());
    check_invariants(&state, &spec);
}

#[test]
fn ideal_previous_epoch_participation_justifies_and_rewards() {
    let spec = base_spec();
    let mut state = fresh_state(64, &spec);

    // Advance to the last slot of epoch 2 without crossing into epoch 3.
    process_slots(
        &mut state,
        Epoch::new(2).end_slot(E::slots_per_epoch()),
        &spec,
    )
    .unwrap();
    let initial_balances: Vec<u64> = state.balances().to_vec();

    // Attest perfectly (correct target, correct head, inclusion delay 1) for every committee of
    // the previous epoch.
    let previous_epoch = state.previous_epoch();
    let mut attestations = vec![];
    for slot in previous_epoch.slot_iter(E::slots_per_epoch()) {
        let committees_per_slot = state
            .committee_cache(types::RelativeEpoch::Previous)
            .unwrap()
            .committees_per_slot();
        for index in 0..committees_per_slot {
            attestations.push(full_attestation(&state, slot, index, previous_epoch));
        }
    }
    for attestation in attestations {
        state
            .as_base_mut()
            .unwrap()
            .previous_epoch_attestations
            .push(attestation)
            .unwrap();
    }

    let summary = process_epoch(&mut state, &spec).unwrap();

    // The full previous-epoch stake attested to the target.
    assert_eq!(
        summary.previous_epoch_target_attesting_balance(),
        summary.total_active_stake()
    );

    // A supermajority target vote for the previous epoch justifies it.
    assert_eq!(state.current_justified_checkpoint().epoch, previous_epoch);

    // Every attester profited and nobody left the registry.
    for (index, balance) in state.balances().iter().enumerate() {
        assert!(
            *balance > initial_balances[index],
            "validator {} did not profit",
            index
        );
    }
    assert!(state
        .validators()
        .iter()
        .all(|v| v.exit_epoch == spec.far_future_epoch));

    check_invariants(&state, &spec);
}

#[test]
fn sustained_justification_finalizes() {
    let spec = base_spec();
    let mut state = fresh_state(64, &spec);

    // Run five epochs of perfect previous-epoch participation; the justification bits fill and
    // the finality rule fires.
    for _ in 0..5 {
        let end_slot = state.current_epoch().end_slot(E::slots_per_epoch());
        if state.slot() < end_slot {
            process_slots(&mut state, end_slot, &spec).unwrap();
        }

        let previous_epoch = state.previous_epoch();
        if previous_epoch > 0 {
            let committees_per_slot = state
                .committee_cache(types::RelativeEpoch::Previous)
                .unwrap()
                .committees_per_slot();
            let mut attestations = vec![];
            for slot in previous_epoch.slot_iter(E::slots_per_epoch()) {
                for index in 0..committees_per_slot {
                    attestations.push(full_attestation(&state, slot, index, previous_epoch));
                }
            }
            for attestation in attestations {
                state
                    .as_base_mut()
                    .unwrap()
                    .previous_epoch_attestations
                    .push(attestation)
                    .unwrap();
            }
        }

        // Cross the boundary, firing the epoch transition.
        process_slots(&mut state, end_slot + 1, &spec).unwrap();
    }

    assert!(state.current_justified_checkpoint().epoch > 0);
    assert!(state.finalized_checkpoint().epoch > 0);
    check_invariants(&state, &spec);
}

#[test]
fn total_inactivity_leak_grows_scores_and_blocks_finality() {
    let spec = altair_spec();
    let mut state = fresh_state(32, &spec);

    // Nobody attests for eleven epochs. The leak starts once the finality lag exceeds the
    // grace period of `min_epochs_to_inactivity_penalty` epochs.
    process_slots(
        &mut state,
        Epoch::new(11).start_slot(E::slots_per_epoch()),
        &spec,
    )
    .unwrap();

    // Leak transitions happened at epochs 6 through 10: five epochs of bias accumulation with
    // no recovery decay.
    let expected_score = 5 * spec.inactivity_score_bias;
    for index in 0..state.validators().len() {
        assert_eq!(state.get_inactivity_score(index).unwrap(), expected_score);
    }

    // No justification or finalization advanced.
    assert_eq!(state.current_justified_checkpoint().epoch, 0);
    assert_eq!(state.finalized_checkpoint().epoch, 0);

    // The non-participants bled balance.
    assert!(state.balances().iter().all(|b| *b < spec.max_effective_balance));
    check_invariants(&state, &spec);
}

#[test]
fn current_participation_is_zeroed_by_the_transition() {
    let spec = altair_spec();
    let mut state = fresh_state(16, &spec);
    process_slots(&mut state, Slot::new(E::slots_per_epoch() - 1), &spec).unwrap();

    // Mark some current-epoch participation, then run the transition.
    for flags in state.current_epoch_participation_mut().unwrap().iter_mut() {
        flags.add_flag(types::consts::altair::TIMELY_TARGET_FLAG_INDEX).unwrap();
    }
    let marked = state.current_epoch_participation().unwrap().clone();

    process_epoch(&mut state, &spec).unwrap();

    assert_eq!(*state.previous_epoch_participation().unwrap(), marked);
    assert!(state
        .current_epoch_participation()
        .unwrap()
        .iter()
        .all(|flags| flags.into_u8() == 0));
}

#[test]
fn drained_validator_is_ejected_alone() {
    let spec = base_spec();
    let mut state = fresh_state(33, &spec);
    process_slots(&mut state, Slot::new(E::slots_per_epoch() - 1), &spec).unwrap();

    // The raw balance dips just below the floor; the increment-aligned effective balance sits
    // exactly at it, which is enough to trigger the ejection.
    let drained = 7;
    state.get_validator_mut(drained).unwrap().effective_balance = spec.ejection_balance;
    *state.get_balance_mut(drained).unwrap() = spec.ejection_balance - 1;

    let current_epoch = state.current_epoch();
    let expected_exit_epoch = state
        .compute_activation_exit_epoch(current_epoch, &spec)
        .unwrap();

    process_epoch(&mut state, &spec).unwrap();

    let ejected = state.get_validator(drained).unwrap();
    assert_eq!(ejected.exit_epoch, expected_exit_epoch);
    assert_eq!(
        ejected.withdrawable_epoch,
        expected_exit_epoch + spec.min_validator_withdrawability_delay.as_u64()
    );

    for (index, validator) in state.validators().iter().enumerate() {
        if index != drained {
            assert_eq!(validator.exit_epoch, spec.far_future_epoch);
            assert_eq!(validator.withdrawable_epoch, spec.far_future_epoch);
        }
    }
    check_invariants(&state, &spec);
}

#[test]
fn activation_queue_respects_churn_and_order() {
    let spec = base_spec();
    let mut state = fresh_state(32, &spec);

    // Ten validators queued behind a finalized eligibility epoch.
    let first_pending = state.validators().len();
    for i in 0..10 {
        let mut validator = types::Validator {
            pubkey: crate::test_utils::generate_deterministic_pubkey(first_pending + i),
            effective_balance: spec.max_effective_balance,
            activation_eligibility_epoch: Epoch::new(0),
            ..types::Validator::default()
        };
        validator.withdrawal_credentials = types::Hash256::zero();
        state.validators_mut().push(validator).unwrap();
        state
            .balances_mut()
            .push(spec.max_effective_balance)
            .unwrap();
    }

    process_slots(&mut state, Slot::new(E::slots_per_epoch() - 1), &spec).unwrap();
    let expected_activation_epoch = state
        .compute_activation_exit_epoch(state.current_epoch(), &spec)
        .unwrap();

    process_epoch(&mut state, &spec).unwrap();

    // Exactly `churn_limit` validators dequeued, in ascending index order.
    let churn_limit = spec.min_per_epoch_churn_limit as usize;
    for i in 0..10 {
        let validator = state.get_validator(first_pending + i).unwrap();
        if i < churn_limit {
            assert_eq!(validator.activation_epoch, expected_activation_epoch);
        } else {
            assert_eq!(validator.activation_epoch, spec.far_future_epoch);
        }
    }

    // An unfinalized queue placement blocks the dequeue entirely.
    let mut blocked_state = fresh_state(32, &spec);
    let pending = blocked_state.validators().len();
    blocked_state
        .validators_mut()
        .push(types::Validator {
            pubkey: crate::test_utils::generate_deterministic_pubkey(pending),
            effective_balance: spec.max_effective_balance,
            activation_eligibility_epoch: Epoch::new(1),
            ..types::Validator::default()
        })
        .unwrap();
    blocked_state
        .balances_mut()
        .push(spec.max_effective_balance)
        .unwrap();

    process_slots(&mut blocked_state, Slot::new(E::slots_per_epoch() - 1), &spec).unwrap();
    process_epoch(&mut blocked_state, &spec).unwrap();
    assert_eq!(
        blocked_state.get_validator(pending).unwrap().activation_epoch,
        spec.far_future_epoch
    );
}

#[test]
fn slashing_penalty_is_proportional() {
    let spec = base_spec();
    // 100 validators of 32 ETH = 3200 ETH total stake.
    let mut state = fresh_state(100, &spec);
    process_slots(&mut state, Slot::new(E::slots_per_epoch() - 1), &spec).unwrap();

    let slashed = 3;
    let current_epoch = state.current_epoch();
    let next_epoch = state.next_epoch().unwrap();
    let halfway_epoch =
        current_epoch + <E as EthSpec>::EpochsPerSlashingsVector::to_u64() / 2;
    {
        let validator = state.get_validator_mut(slashed).unwrap();
        validator.slashed = true;
        validator.withdrawable_epoch = halfway_epoch;
    }
    // 32 ETH of slashed balance on the books, plus a stale value in the next window slot.
    state.set_slashings(current_epoch, 32_000_000_000).unwrap();
    state.set_slashings(next_epoch, 5).unwrap();

    let balance_before = state.get_balance(slashed).unwrap();
    process_epoch(&mut state, &spec).unwrap();

    // adjusted = min((32 + stale 5 gwei) * 3, 3200 ETH) = 96 ETH and change;
    // penalty  = 32 increments * adjusted / 3200 ETH = 0.96 ETH.
    let adjusted = (32_000_000_000u64 + 5) * 3;
    let expected_penalty = (u128::from(adjusted) * 32 * 1_000_000_000
        / (100 * 32_000_000_000u128)) as u64;
    assert_eq!(expected_penalty, 960_000_000);
    assert_eq!(
        state.get_balance(slashed).unwrap(),
        balance_before - expected_penalty
    );

    // The next epoch's slashings accumulator slot was zeroed.
    assert_eq!(state.get_slashings_at(next_epoch).unwrap(), 0);
}

#[test]
fn effective_balance_hysteresis() {
    let spec = base_spec();
    let mut state = fresh_state(8, &spec);

    // Within the downward threshold: no change.
    *state.get_balance_mut(0).unwrap() = 31_950_000_000;
    process_effective_balance_updates(&mut state, &spec).unwrap();
    assert_eq!(
        state.get_validator(0).unwrap().effective_balance,
        32_000_000_000
    );

    // Past the downward threshold: snap down to the increment floor.
    *state.get_balance_mut(0).unwrap() = 31_740_000_000;
    process_effective_balance_updates(&mut state, &spec).unwrap();
    assert_eq!(
        state.get_validator(0).unwrap().effective_balance,
        31_000_000_000
    );

    // Within the upward threshold: no change.
    *state.get_balance_mut(0).unwrap() = 32_200_000_000;
    process_effective_balance_updates(&mut state, &spec).unwrap();
    assert_eq!(
        state.get_validator(0).unwrap().effective_balance,
        31_000_000_000
    );

    // Past the upward threshold: snap up, capped at the maximum.
    *state.get_balance_mut(0).unwrap() = 32_500_000_000;
    process_effective_balance_updates(&mut state, &spec).unwrap();
    assert_eq!(
        state.get_validator(0).unwrap().effective_balance,
        32_000_000_000
    );

    // A zeroed validator stays zeroed.
    *state.get_balance_mut(1).unwrap() = 0;
    state.get_validator_mut(1).unwrap().effective_balance = 0;
    process_effective_balance_updates(&mut state, &spec).unwrap();
    assert_eq!(state.get_validator(1).unwrap().effective_balance, 0);
    assert_eq!(state.get_balance(1).unwrap(), 0);
}

#[test]
fn zero_active_validators_floors_the_stake() {
    let spec = base_spec();
    let mut state = fresh_state(4, &spec);
    for index in 0..4 {
        state.get_validator_mut(index).unwrap().activation_epoch = spec.far_future_epoch;
    }

    let summary = EpochSummary::new(&state, &spec).unwrap();
    assert_eq!(
        summary.total_active_stake(),
        spec.effective_balance_increment
    );
    assert_eq!(
        summary.previous_epoch_target_attesting_balance(),
        spec.effective_balance_increment
    );
}

#[test]
fn process_slots_rejects_non_advancing_targets() {
    let spec = base_spec();
    let mut state = fresh_state(8, &spec);
    process_slots(&mut state, Slot::new(3), &spec).unwrap();

    for target in [Slot::new(2), Slot::new(3)] {
        assert_eq!(
            process_slots(&mut state, target, &spec),
            Err(StateAdvanceError::SlotBehind {
                state_slot: Slot::new(3),
                target_slot: target,
            })
        );
    }
}

#[test]
fn per_slot_processing_records_roots() {
    let spec = base_spec();
    let mut state = fresh_state(8, &spec);

    process_slots(&mut state, Slot::new(3), &spec).unwrap();

    // Every prior slot has a state root and a block root recorded.
    for slot in 0..3 {
        assert!(state.get_state_root(Slot::new(slot)).is_ok());
        assert!(!state.get_block_root(Slot::new(slot)).unwrap().is_zero());
    }

    // The latest block header was patched with the genesis state root rather than left zeroed.
    assert!(!state.latest_block_header().state_root.is_zero());
}

#[test]
fn altair_fork_upgrade_translates_participation() {
    let mut spec = base_spec();
    spec.altair_fork_epoch = Some(Epoch::new(1));

    let mut state = fresh_state(32, &spec);
    process_slots(&mut state, Slot::new(E::slots_per_epoch() - 1), &spec).unwrap();
    state
        .build_committee_cache(types::RelativeEpoch::Current, &spec)
        .unwrap();

    // One perfect attestation for the first committee of epoch 0, included with delay 1.
    let attested_slot = Slot::new(4);
    let attestation = full_attestation(&state, attested_slot, 0, Epoch::new(0));
    let attesters = crate::common::get_attesting_indices::<E>(
        state
            .get_beacon_committee(attested_slot, 0)
            .unwrap()
            .committee,
        &attestation.aggregation_bits,
    )
    .unwrap();
    state
        .as_base_mut()
        .unwrap()
        .current_epoch_attestations
        .push(attestation)
        .unwrap();

    // Crossing into epoch 1 runs the transition and then the irregular upgrade.
    process_slots(&mut state, Slot::new(E::slots_per_epoch()), &spec).unwrap();

    assert!(state.as_altair().is_ok());
    assert_eq!(state.fork().current_version, spec.altair_fork_version);
    assert_eq!(state.fork().previous_version, spec.genesis_fork_version);

    // The pre-fork attestation was translated into all three timeliness flags.
    let participation = state.previous_epoch_participation().unwrap();
    for index in attesters {
        assert_eq!(participation.get(index).unwrap().into_u8(), 0b111);
    }

    // Sync committees were bootstrapped with a real aggregate.
    let sync_committee = state.current_sync_committee().unwrap();
    assert_ne!(
        sync_committee.aggregate_pubkey.as_serialized(),
        &[0; types::PUBLIC_KEY_BYTES_LEN][..]
    );
    check_invariants(&state, &spec);
}

#[test]
fn roots_survive_ssz_and_clone_round_trips() {
    let spec = altair_spec();
    let mut state = fresh_state(16, &spec);
    process_slots(&mut state, Slot::new(E::slots_per_epoch() + 2), &spec).unwrap();

    let root = state.update_tree_hash_cache().unwrap();
    assert_eq!(state.clone().update_tree_hash_cache().unwrap(), root);

    let bytes = state.as_ssz_bytes();
    let mut decoded = BeaconState::<E>::from_ssz_bytes(&bytes, &spec).unwrap();
    assert_eq!(decoded.update_tree_hash_cache().unwrap(), root);
}

#[test]
fn epoch_cache_agrees_with_the_state() {
    let spec = base_spec();
    let mut state = fresh_state(40, &spec);
    process_slots(&mut state, Slot::new(E::slots_per_epoch() - 1), &spec).unwrap();
    state
        .build_committee_cache(types::RelativeEpoch::Current, &spec)
        .unwrap();

    let cache = EpochCache::new(&state, &spec).unwrap();
    cache.check_validity(&state).unwrap();

    for slot in state.current_epoch().slot_iter(E::slots_per_epoch()) {
        assert_eq!(
            cache.get_proposer_index(slot).unwrap(),
            state.get_beacon_proposer_index(slot, &spec).unwrap()
        );
    }

    assert_eq!(cache.churn_limit(), spec.min_per_epoch_churn_limit);
    for (index, validator) in state.validators().iter().enumerate() {
        assert_eq!(
            cache.get_effective_balance(index).unwrap(),
            validator.effective_balance
        );
    }
}
