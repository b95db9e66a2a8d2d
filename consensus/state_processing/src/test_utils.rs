//! Deterministic `BeaconState` construction for tests.
//!
//! Validators get real BLS public keys (derived from their index) so that code paths which
//! decompress points, such as sync committee aggregation, work against built states.

use crate::upgrade::upgrade_to_altair;
use types::{
    BeaconState, ChainSpec, Epoch, Eth1Data, EthSpec, ForkName, Hash256, PublicKeyBytes,
    Validator,
};

/// Returns the compressed public key for the deterministic secret key at `validator_index`.
pub fn generate_deterministic_pubkey(validator_index: usize) -> PublicKeyBytes {
    let mut ikm = [0; 32];
    ikm[0..8].copy_from_slice(&(validator_index as u64 + 1).to_le_bytes());
    let secret_key =
        blst::min_pk::SecretKey::key_gen(&ikm, &[]).expect("ikm is 32 bytes");
    PublicKeyBytes::from(secret_key.sk_to_pk().compress())
}

/// Builds a state at the genesis slot with `validator_count` active, fully-funded validators.
///
/// If the spec schedules Altair at genesis, the state is upgraded before being returned.
pub struct TestingStateBuilder<T: EthSpec> {
    state: BeaconState<T>,
    spec: ChainSpec,
}

impl<T: EthSpec> TestingStateBuilder<T> {
    pub fn new(validator_count: usize, spec: &ChainSpec) -> Self {
        let eth1_data = Eth1Data {
            deposit_root: Hash256::zero(),
            deposit_count: validator_count as u64,
            block_hash: Hash256::repeat_byte(0x42),
        };

        let mut state = BeaconState::new(spec.min_genesis_time, eth1_data, spec);

        for index in 0..validator_count {
            state
                .validators_mut()
                .push(Validator {
                    pubkey: generate_deterministic_pubkey(index),
                    withdrawal_credentials: Hash256::from_low_u64_be(index as u64),
                    effective_balance: spec.max_effective_balance,
                    slashed: false,
                    activation_eligibility_epoch: Epoch::new(0),
                    activation_epoch: Epoch::new(0),
                    exit_epoch: spec.far_future_epoch,
                    withdrawable_epoch: spec.far_future_epoch,
                })
                .expect("validator count under registry limit");
            state
                .balances_mut()
                .push(spec.max_effective_balance)
                .expect("validator count under registry limit");
        }

        Self {
            state,
            spec: spec.clone(),
        }
    }

    /// Consume the builder, upgrading to Altair when the spec activates it at genesis.
    pub fn build(self) -> BeaconState<T> {
        let Self { mut state, spec } = self;

        if spec.fork_name_at_epoch(Epoch::new(0)) == ForkName::Altair {
            upgrade_to_altair(&mut state, &spec).expect("base genesis state upgrades cleanly");
        }

        state
    }
}
