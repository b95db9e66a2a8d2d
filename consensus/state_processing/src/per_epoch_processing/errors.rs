use crate::epoch_cache::EpochCacheError;
use safe_arith::ArithError;
use types::{BeaconStateError, InconsistentFork};

#[derive(Debug, PartialEq)]
pub enum EpochProcessingError {
    /// The state broke a structural invariant before the transition began; it must be treated
    /// as corrupt.
    RegistryInconsistent { validators: usize, balances: usize },
    /// A status or delta list was shorter than the validator registry.
    DeltaOutOfBounds(usize),
    StatusOutOfBounds(usize),
    BalancesOutOfBounds(usize),
    InvalidFlagIndex(usize),
    /// An attestation referenced a proposer which does not exist.
    ProposerOutOfBounds(usize),
    BeaconStateError(BeaconStateError),
    InconsistentStateFork(InconsistentFork),
    EpochCache(EpochCacheError),
    ArithError(ArithError),
    SszTypesError(ssz_types::Error),
}

impl From<BeaconStateError> for EpochProcessingError {
    fn from(e: BeaconStateError) -> EpochProcessingError {
        EpochProcessingError::BeaconStateError(e)
    }
}

impl From<EpochCacheError> for EpochProcessingError {
    fn from(e: EpochCacheError) -> EpochProcessingError {
        EpochProcessingError::EpochCache(e)
    }
}

impl From<ArithError> for EpochProcessingError {
    fn from(e: ArithError) -> EpochProcessingError {
        EpochProcessingError::ArithError(e)
    }
}

impl From<ssz_types::Error> for EpochProcessingError {
    fn from(e: ssz_types::Error) -> EpochProcessingError {
        EpochProcessingError::SszTypesError(e)
    }
}
