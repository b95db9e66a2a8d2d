//! The beacon chain state-transition core: per-slot bookkeeping, and the epoch transition which
//! rewrites the validator registry, balances and finality data at each epoch boundary.
//!
//! All functions here are pure with respect to I/O: they mutate the state they are handed and
//! perform no reads or writes beyond it. Errors are deterministic and non-retryable; a failed
//! transition means the input state (or the block that produced it) is invalid.

pub mod common;
pub mod epoch_cache;
pub mod metrics;
pub mod per_epoch_processing;
pub mod per_slot_processing;
pub mod state_advance;
pub mod test_utils;
pub mod upgrade;

pub use epoch_cache::{EpochCache, EpochCacheError};
pub use per_epoch_processing::{
    errors::EpochProcessingError, process_epoch as per_epoch_processing, EpochSummary,
};
pub use per_slot_processing::{per_slot_processing, Error as SlotProcessingError};
pub use state_advance::{partial_state_advance, process_slots};
pub use upgrade::upgrade_to_altair;
