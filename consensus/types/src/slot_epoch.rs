//! The `Slot` and `Epoch` types are defined as new types over u64 to enforce type-safety between
//! the two.
//!
//! Both types support conversion, comparison and math operations with `u64`, but specifically not
//! with each other: an `Epoch` only becomes a `Slot` through `start_slot`/`end_slot` and a `Slot`
//! only becomes an `Epoch` through `epoch(slots_per_epoch)`.
//!
//! Operator math on `Slot` and `Epoch` is saturating, it never wraps. Consensus-critical code uses
//! the checked `safe_*` methods instead, where overflow is an error.

use crate::test_utils::TestRandom;
use rand::RngCore;
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::ops::{Add, AddAssign, Rem, Sub, SubAssign};
use std::str::FromStr;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(#[serde(with = "eth2_serde_utils::quoted_u64")] u64);

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(#[serde(with = "eth2_serde_utils::quoted_u64")] u64);

macro_rules! impl_common {
    ($type: ident) => {
        impl From<u64> for $type {
            fn from(x: u64) -> $type {
                $type(x)
            }
        }

        impl From<$type> for u64 {
            fn from(x: $type) -> u64 {
                x.0
            }
        }

        impl PartialEq<u64> for $type {
            fn eq(&self, other: &u64) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<u64> for $type {
            fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }

        impl Add<u64> for $type {
            type Output = $type;

            fn add(self, other: u64) -> $type {
                $type(self.0.saturating_add(other))
            }
        }

        impl Add<$type> for $type {
            type Output = $type;

            fn add(self, other: $type) -> $type {
                self + other.0
            }
        }

        impl AddAssign<u64> for $type {
            fn add_assign(&mut self, other: u64) {
                self.0 = self.0.saturating_add(other);
            }
        }

        impl Sub<u64> for $type {
            type Output = $type;

            fn sub(self, other: u64) -> $type {
                $type(self.0.saturating_sub(other))
            }
        }

        impl Sub<$type> for $type {
            type Output = $type;

            fn sub(self, other: $type) -> $type {
                self - other.0
            }
        }

        impl SubAssign<u64> for $type {
            fn sub_assign(&mut self, other: u64) {
                self.0 = self.0.saturating_sub(other);
            }
        }

        /// Callers must guarantee a non-zero divisor; consensus code uses `safe_rem`.
        impl Rem<u64> for $type {
            type Output = $type;

            fn rem(self, modulus: u64) -> $type {
                $type(self.0 % modulus)
            }
        }

        impl $type {
            pub const fn new(x: u64) -> $type {
                $type(x)
            }

            pub fn max_value() -> $type {
                $type(u64::MAX)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }

            pub fn as_usize(&self) -> usize {
                self.0 as usize
            }

            pub fn safe_add(self, other: u64) -> Result<$type, ArithError> {
                Ok($type(self.0.safe_add(other)?))
            }

            pub fn safe_sub(self, other: u64) -> Result<$type, ArithError> {
                Ok($type(self.0.safe_sub(other)?))
            }

            pub fn safe_mul(self, other: u64) -> Result<$type, ArithError> {
                Ok($type(self.0.safe_mul(other)?))
            }

            pub fn safe_div(self, other: u64) -> Result<$type, ArithError> {
                Ok($type(self.0.safe_div(other)?))
            }

            pub fn safe_rem(self, other: u64) -> Result<$type, ArithError> {
                Ok($type(self.0.safe_rem(other)?))
            }

            pub fn safe_add_assign(&mut self, other: u64) -> Result<(), ArithError> {
                self.0.safe_add_assign(other)
            }

            pub fn safe_sub_assign(&mut self, other: u64) -> Result<(), ArithError> {
                self.0.safe_sub_assign(other)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }

        impl FromStr for $type {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<$type, Self::Err> {
                u64::from_str(s).map($type)
            }
        }

        impl Encode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Encode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Encode>::ssz_fixed_len()
            }

            fn ssz_bytes_len(&self) -> usize {
                self.0.ssz_bytes_len()
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                self.0.ssz_append(buf)
            }
        }

        impl Decode for $type {
            fn is_ssz_fixed_len() -> bool {
                <u64 as Decode>::is_ssz_fixed_len()
            }

            fn ssz_fixed_len() -> usize {
                <u64 as Decode>::ssz_fixed_len()
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                u64::from_ssz_bytes(bytes).map($type)
            }
        }

        impl tree_hash::TreeHash for $type {
            fn tree_hash_type() -> tree_hash::TreeHashType {
                u64::tree_hash_type()
            }

            fn tree_hash_packed_encoding(&self) -> tree_hash::PackedEncoding {
                self.0.tree_hash_packed_encoding()
            }

            fn tree_hash_packing_factor() -> usize {
                u64::tree_hash_packing_factor()
            }

            fn tree_hash_root(&self) -> tree_hash::Hash256 {
                self.0.tree_hash_root()
            }
        }

        impl TestRandom for $type {
            fn random_for_test(rng: &mut impl RngCore) -> Self {
                $type::new(u64::random_for_test(rng))
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);

impl Slot {
    /// The epoch containing this slot.
    pub fn epoch(self, slots_per_epoch: u64) -> Epoch {
        Epoch::new(self.0 / slots_per_epoch)
    }
}

impl Epoch {
    /// The first slot in the epoch.
    pub fn start_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(self.0.saturating_mul(slots_per_epoch))
    }

    /// The last slot in the epoch.
    pub fn end_slot(self, slots_per_epoch: u64) -> Slot {
        Slot::new(
            self.0
                .saturating_mul(slots_per_epoch)
                .saturating_add(slots_per_epoch.saturating_sub(1)),
        )
    }

    /// Position of some slot inside this epoch, if any.
    ///
    /// E.g., the first `slot` in `epoch` is at position `0`.
    pub fn position(self, slot: Slot, slots_per_epoch: u64) -> Option<usize> {
        let start = self.start_slot(slots_per_epoch);
        let end = self.end_slot(slots_per_epoch);

        if slot >= start && slot <= end {
            slot.as_usize().checked_sub(start.as_usize())
        } else {
            None
        }
    }

    /// The sync committee period containing this epoch.
    pub fn sync_committee_period(self, epochs_per_period: u64) -> Result<u64, ArithError> {
        Ok(self.safe_div(epochs_per_period)?.as_u64())
    }

    /// Iterate over all slots in this epoch, in ascending order.
    pub fn slot_iter(&self, slots_per_epoch: u64) -> SlotIter {
        SlotIter {
            current_iteration: 0,
            epoch: *self,
            slots_per_epoch,
        }
    }
}

pub struct SlotIter {
    current_iteration: u64,
    epoch: Epoch,
    slots_per_epoch: u64,
}

impl Iterator for SlotIter {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.current_iteration >= self.slots_per_epoch {
            None
        } else {
            let start_slot = self.epoch.start_slot(self.slots_per_epoch);
            let previous = self.current_iteration;
            self.current_iteration = self.current_iteration.checked_add(1)?;
            start_slot.safe_add(previous).ok()
        }
    }
}

#[cfg(test)]
mod slot_tests {
    use super::*;
    use ssz::{Decode, Encode};

    #[test]
    fn slot_arithmetic_saturates() {
        assert_eq!(Slot::max_value() + 1, Slot::max_value());
        assert_eq!(Slot::new(0) - 1, Slot::new(0));
    }

    #[test]
    fn slot_epoch_conversion() {
        assert_eq!(Slot::new(0).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(31).epoch(32), Epoch::new(0));
        assert_eq!(Slot::new(32).epoch(32), Epoch::new(1));
    }

    #[test]
    fn max_slot_ssz() {
        let max_slot = Slot::max_value();
        assert_eq!(
            &max_slot.as_ssz_bytes(),
            &[255, 255, 255, 255, 255, 255, 255, 255]
        );
        assert_eq!(
            max_slot,
            Slot::from_ssz_bytes(&max_slot.as_ssz_bytes()).unwrap()
        );
    }
}

#[cfg(test)]
mod epoch_tests {
    use super::*;

    #[test]
    fn epoch_start_end() {
        let slots_per_epoch = 8;

        let epoch = Epoch::new(0);

        assert_eq!(epoch.start_slot(slots_per_epoch), Slot::new(0));
        assert_eq!(epoch.end_slot(slots_per_epoch), Slot::new(7));
    }

    #[test]
    fn end_slot_boundary() {
        let slots_per_epoch = 32;

        // The last epoch which can be represented by u64.
        let epoch = Epoch::new(u64::MAX / slots_per_epoch);

        // A slot number on the epoch should saturate at u64::MAX.
        assert_eq!(epoch.end_slot(slots_per_epoch), Slot::new(u64::MAX));
    }

    #[test]
    fn position() {
        let slots_per_epoch = 8;

        let epoch = Epoch::new(1);
        assert_eq!(epoch.position(Slot::new(7), slots_per_epoch), None);
        assert_eq!(epoch.position(Slot::new(8), slots_per_epoch), Some(0));
        assert_eq!(epoch.position(Slot::new(15), slots_per_epoch), Some(7));
        assert_eq!(epoch.position(Slot::new(16), slots_per_epoch), None);
    }

    #[test]
    fn slot_iter() {
        let slots_per_epoch = 8;

        let epoch = Epoch::new(1);
        let slots: Vec<Slot> = epoch.slot_iter(slots_per_epoch).collect();

        assert_eq!(slots.len(), slots_per_epoch as usize);
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(*slot, Slot::new(slots_per_epoch + i as u64));
        }
    }

    #[test]
    fn safe_arith_catches_overflow() {
        assert!(Epoch::max_value().safe_add(1).is_err());
        assert!(Epoch::new(0).safe_sub(1).is_err());
        assert!(Epoch::new(1).safe_div(0).is_err());
    }
}
