use crate::{Address, BeaconState, Epoch, EthSpec, ForkName, Slot};
use serde::{Deserialize, Serialize};

/// Each of the BLS signature domains.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Domain {
    BeaconProposer,
    BeaconAttester,
    Randao,
    Deposit,
    VoluntaryExit,
    SelectionProof,
    AggregateAndProof,
    SyncCommittee,
}

/// Holds all the "constants" for a beacon chain network.
///
/// Most fields are consensus constants fixed across networks; the per-network knobs (genesis
/// parameters, fork epochs, deposit contract) are what distinguish e.g. mainnet from a testnet.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ChainSpec {
    /*
     * Constants
     */
    pub genesis_slot: Slot,
    pub far_future_epoch: Epoch,
    pub base_rewards_per_epoch: u64,

    /*
     * Misc
     */
    pub max_committees_per_slot: usize,
    pub target_committee_size: usize,
    pub min_per_epoch_churn_limit: u64,
    pub churn_limit_quotient: u64,
    pub shuffle_round_count: u8,
    pub min_genesis_active_validator_count: u64,
    pub min_genesis_time: u64,
    pub hysteresis_quotient: u64,
    pub hysteresis_downward_multiplier: u64,
    pub hysteresis_upward_multiplier: u64,

    /*
     *  Gwei values
     */
    pub min_deposit_amount: u64,
    pub max_effective_balance: u64,
    pub ejection_balance: u64,
    pub effective_balance_increment: u64,

    /*
     * Initial Values
     */
    #[serde(with = "eth2_serde_utils::bytes_4_hex")]
    pub genesis_fork_version: [u8; 4],
    #[serde(with = "eth2_serde_utils::quoted_u8")]
    pub bls_withdrawal_prefix_byte: u8,

    /*
     * Time parameters
     */
    pub genesis_delay: u64,
    pub seconds_per_slot: u64,
    pub min_attestation_inclusion_delay: u64,
    pub min_seed_lookahead: Epoch,
    pub max_seed_lookahead: Epoch,
    pub min_epochs_to_inactivity_penalty: u64,
    pub min_validator_withdrawability_delay: Epoch,
    pub shard_committee_period: u64,

    /*
     * Reward and penalty quotients
     */
    pub base_reward_factor: u64,
    pub whistleblower_reward_quotient: u64,
    pub proposer_reward_quotient: u64,
    pub inactivity_penalty_quotient: u64,
    pub min_slashing_penalty_quotient: u64,
    pub proportional_slashing_multiplier: u64,

    /*
     * Altair hard fork params
     */
    pub inactivity_penalty_quotient_altair: u64,
    pub min_slashing_penalty_quotient_altair: u64,
    pub proportional_slashing_multiplier_altair: u64,
    pub epochs_per_sync_committee_period: Epoch,
    pub inactivity_score_bias: u64,
    pub inactivity_score_recovery_rate: u64,
    #[serde(with = "eth2_serde_utils::bytes_4_hex")]
    pub altair_fork_version: [u8; 4],
    /// The Altair fork epoch is optional, with `None` representing "Altair never happens".
    pub altair_fork_epoch: Option<Epoch>,

    /*
     * Signature domains
     */
    pub(crate) domain_beacon_proposer: u32,
    pub(crate) domain_beacon_attester: u32,
    pub(crate) domain_randao: u32,
    pub(crate) domain_deposit: u32,
    pub(crate) domain_voluntary_exit: u32,
    pub(crate) domain_selection_proof: u32,
    pub(crate) domain_aggregate_and_proof: u32,
    pub(crate) domain_sync_committee: u32,

    /*
     * Deposit contract
     */
    pub deposit_chain_id: u64,
    pub deposit_network_id: u64,
    pub deposit_contract_address: Address,
}

impl ChainSpec {
    /// Returns the name of the fork which is active at `slot`.
    pub fn fork_name_at_slot<E: EthSpec>(&self, slot: Slot) -> ForkName {
        self.fork_name_at_epoch(slot.epoch(E::slots_per_epoch()))
    }

    /// Returns the name of the fork which is active at `epoch`.
    pub fn fork_name_at_epoch(&self, epoch: Epoch) -> ForkName {
        match self.altair_fork_epoch {
            Some(fork_epoch) if epoch >= fork_epoch => ForkName::Altair,
            _ => ForkName::Base,
        }
    }

    /// Returns the fork version for a named fork.
    pub fn fork_version_for_name(&self, fork_name: ForkName) -> [u8; 4] {
        match fork_name {
            ForkName::Base => self.genesis_fork_version,
            ForkName::Altair => self.altair_fork_version,
        }
    }

    /// Returns the epoch of a named fork, if it is scheduled.
    pub fn fork_epoch(&self, fork_name: ForkName) -> Option<Epoch> {
        match fork_name {
            ForkName::Base => Some(Epoch::new(0)),
            ForkName::Altair => self.altair_fork_epoch,
        }
    }

    /// For a given `BeaconState`, return the inactivity penalty quotient associated with its
    /// variant.
    pub fn inactivity_penalty_quotient_for_state<E: EthSpec>(&self, state: &BeaconState<E>) -> u64 {
        match state {
            BeaconState::Base(_) => self.inactivity_penalty_quotient,
            BeaconState::Altair(_) => self.inactivity_penalty_quotient_altair,
        }
    }

    /// For a given `BeaconState`, return the proportional slashing multiplier associated with its
    /// variant.
    pub fn proportional_slashing_multiplier_for_state<E: EthSpec>(
        &self,
        state: &BeaconState<E>,
    ) -> u64 {
        match state {
            BeaconState::Base(_) => self.proportional_slashing_multiplier,
            BeaconState::Altair(_) => self.proportional_slashing_multiplier_altair,
        }
    }

    /// Get the domain number, unmodified by the fork.
    pub fn get_domain_constant(&self, domain: Domain) -> u32 {
        match domain {
            Domain::BeaconProposer => self.domain_beacon_proposer,
            Domain::BeaconAttester => self.domain_beacon_attester,
            Domain::Randao => self.domain_randao,
            Domain::Deposit => self.domain_deposit,
            Domain::VoluntaryExit => self.domain_voluntary_exit,
            Domain::SelectionProof => self.domain_selection_proof,
            Domain::AggregateAndProof => self.domain_aggregate_and_proof,
            Domain::SyncCommittee => self.domain_sync_committee,
        }
    }

    /// Returns a `ChainSpec` compatible with the mainnet specification.
    pub fn mainnet() -> Self {
        Self {
            /*
             * Constants
             */
            genesis_slot: Slot::new(0),
            far_future_epoch: Epoch::new(u64::MAX),
            base_rewards_per_epoch: 4,

            /*
             * Misc
             */
            max_committees_per_slot: 64,
            target_committee_size: 128,
            min_per_epoch_churn_limit: 4,
            churn_limit_quotient: 65_536,
            shuffle_round_count: 90,
            min_genesis_active_validator_count: 16_384,
            min_genesis_time: 1_606_824_000, // Dec 1, 2020
            hysteresis_quotient: 4,
            hysteresis_downward_multiplier: 1,
            hysteresis_upward_multiplier: 5,

            /*
             *  Gwei values
             */
            min_deposit_amount: u64::pow(2, 0).saturating_mul(u64::pow(10, 9)),
            max_effective_balance: u64::pow(2, 5).saturating_mul(u64::pow(10, 9)),
            ejection_balance: u64::pow(2, 4).saturating_mul(u64::pow(10, 9)),
            effective_balance_increment: u64::pow(2, 0).saturating_mul(u64::pow(10, 9)),

            /*
             * Initial Values
             */
            genesis_fork_version: [0; 4],
            bls_withdrawal_prefix_byte: 0x00,

            /*
             * Time parameters
             */
            genesis_delay: 604_800, // 7 days
            seconds_per_slot: 12,
            min_attestation_inclusion_delay: 1,
            min_seed_lookahead: Epoch::new(1),
            max_seed_lookahead: Epoch::new(4),
            min_epochs_to_inactivity_penalty: 4,
            min_validator_withdrawability_delay: Epoch::new(256),
            shard_committee_period: 256,

            /*
             * Reward and penalty quotients
             */
            base_reward_factor: 64,
            whistleblower_reward_quotient: 512,
            proposer_reward_quotient: 8,
            inactivity_penalty_quotient: u64::pow(2, 26),
            min_slashing_penalty_quotient: 128,
            proportional_slashing_multiplier: 3,

            /*
             * Altair hard fork params
             */
            inactivity_penalty_quotient_altair: u64::pow(2, 24).saturating_mul(3),
            min_slashing_penalty_quotient_altair: 64,
            proportional_slashing_multiplier_altair: 2,
            epochs_per_sync_committee_period: Epoch::new(256),
            inactivity_score_bias: 4,
            inactivity_score_recovery_rate: 16,
            altair_fork_version: [0x01, 0x00, 0x00, 0x00],
            altair_fork_epoch: Some(Epoch::new(74240)),

            /*
             * Signature domains
             */
            domain_beacon_proposer: 0,
            domain_beacon_attester: 1,
            domain_randao: 2,
            domain_deposit: 3,
            domain_voluntary_exit: 4,
            domain_selection_proof: 5,
            domain_aggregate_and_proof: 6,
            domain_sync_committee: 7,

            /*
             * Deposit contract
             */
            deposit_chain_id: 1,
            deposit_network_id: 1,
            deposit_contract_address: "00000000219ab540356cbb839cbe05303d7705fa"
                .parse()
                .expect("chain spec deposit contract address"),
        }
    }

    /// Returns a `ChainSpec` compatible with the minimal specification, as used for testing.
    pub fn minimal() -> Self {
        Self {
            max_committees_per_slot: 4,
            target_committee_size: 4,
            churn_limit_quotient: 32,
            shuffle_round_count: 10,
            min_genesis_active_validator_count: 64,
            min_genesis_time: 1_578_009_600,
            genesis_delay: 300,
            seconds_per_slot: 6,
            epochs_per_sync_committee_period: Epoch::new(8),
            altair_fork_version: [0x01, 0x00, 0x00, 0x01],
            altair_fork_epoch: None,
            deposit_chain_id: 5,
            deposit_network_id: 5,
            shard_committee_period: 64,
            ..ChainSpec::mainnet()
        }
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::mainnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MainnetEthSpec;

    #[test]
    fn fork_name_at_epoch_dispatches_on_altair_epoch() {
        let mut spec = ChainSpec::mainnet();
        spec.altair_fork_epoch = Some(Epoch::new(10));

        assert_eq!(spec.fork_name_at_epoch(Epoch::new(0)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(9)), ForkName::Base);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(10)), ForkName::Altair);
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(11)), ForkName::Altair);

        spec.altair_fork_epoch = None;
        assert_eq!(spec.fork_name_at_epoch(Epoch::new(u64::MAX)), ForkName::Base);
    }

    #[test]
    fn fork_name_at_slot_uses_epoch_boundary() {
        let mut spec = ChainSpec::mainnet();
        spec.altair_fork_epoch = Some(Epoch::new(1));

        let last_base_slot = Epoch::new(0).end_slot(MainnetEthSpec::slots_per_epoch());
        assert_eq!(
            spec.fork_name_at_slot::<MainnetEthSpec>(last_base_slot),
            ForkName::Base
        );
        assert_eq!(
            spec.fork_name_at_slot::<MainnetEthSpec>(last_base_slot + 1),
            ForkName::Altair
        );
    }

    #[test]
    fn hysteresis_thresholds_are_exact_gwei() {
        let spec = ChainSpec::mainnet();
        let hysteresis_increment = spec.effective_balance_increment / spec.hysteresis_quotient;
        assert_eq!(hysteresis_increment, 250_000_000);
        assert_eq!(
            hysteresis_increment * spec.hysteresis_downward_multiplier,
            250_000_000
        );
        assert_eq!(
            hysteresis_increment * spec.hysteresis_upward_multiplier,
            1_250_000_000
        );
    }
}
