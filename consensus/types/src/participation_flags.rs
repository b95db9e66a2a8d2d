use crate::{consts::altair::NUM_FLAG_INDICES, test_utils::TestRandom, Hash256};
use rand::RngCore;
use safe_arith::{ArithError, SafeArith};
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use tree_hash::{PackedEncoding, TreeHash, TreeHashType};

/// One byte per validator, tracking which of the timely source/target/head votes the validator
/// got onto the chain during an epoch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipationFlags {
    #[serde(with = "eth2_serde_utils::quoted_u8")]
    bits: u8,
}

impl ParticipationFlags {
    pub fn add_flag(&mut self, flag_index: usize) -> Result<(), ArithError> {
        if flag_index >= NUM_FLAG_INDICES {
            return Err(ArithError::Overflow);
        }
        self.bits |= 1u8.safe_shl(flag_index as u32)?;
        Ok(())
    }

    pub fn has_flag(&self, flag_index: usize) -> Result<bool, ArithError> {
        if flag_index >= NUM_FLAG_INDICES {
            return Err(ArithError::Overflow);
        }
        let mask = 1u8.safe_shl(flag_index as u32)?;
        Ok(self.bits & mask == mask)
    }

    pub fn into_u8(self) -> u8 {
        self.bits
    }
}

/// Decode implementation that transparently behaves like the inner `u8`.
impl Decode for ParticipationFlags {
    fn is_ssz_fixed_len() -> bool {
        <u8 as Decode>::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        <u8 as Decode>::ssz_fixed_len()
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        u8::from_ssz_bytes(bytes).map(|bits| Self { bits })
    }
}

/// Encode implementation that transparently behaves like the inner `u8`.
impl Encode for ParticipationFlags {
    fn is_ssz_fixed_len() -> bool {
        <u8 as Encode>::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        <u8 as Encode>::ssz_fixed_len()
    }

    fn ssz_bytes_len(&self) -> usize {
        self.bits.ssz_bytes_len()
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        self.bits.ssz_append(buf);
    }
}

impl TreeHash for ParticipationFlags {
    fn tree_hash_type() -> TreeHashType {
        u8::tree_hash_type()
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        self.bits.tree_hash_packed_encoding()
    }

    fn tree_hash_packing_factor() -> usize {
        u8::tree_hash_packing_factor()
    }

    fn tree_hash_root(&self) -> Hash256 {
        self.bits.tree_hash_root()
    }
}

impl TestRandom for ParticipationFlags {
    fn random_for_test(rng: &mut impl RngCore) -> Self {
        let mut flags = Self::default();
        for flag_index in 0..NUM_FLAG_INDICES {
            if bool::random_for_test(rng) {
                flags.add_flag(flag_index).expect("flag index is valid");
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::altair::{
        TIMELY_HEAD_FLAG_INDEX, TIMELY_SOURCE_FLAG_INDEX, TIMELY_TARGET_FLAG_INDEX,
    };

    #[test]
    fn add_and_query_flags() {
        let mut flags = ParticipationFlags::default();
        assert!(!flags.has_flag(TIMELY_SOURCE_FLAG_INDEX).unwrap());

        flags.add_flag(TIMELY_TARGET_FLAG_INDEX).unwrap();
        assert!(flags.has_flag(TIMELY_TARGET_FLAG_INDEX).unwrap());
        assert!(!flags.has_flag(TIMELY_SOURCE_FLAG_INDEX).unwrap());
        assert!(!flags.has_flag(TIMELY_HEAD_FLAG_INDEX).unwrap());
    }

    #[test]
    fn out_of_bounds_flag_index() {
        let mut flags = ParticipationFlags::default();
        assert!(flags.add_flag(NUM_FLAG_INDICES).is_err());
        assert!(flags.has_flag(NUM_FLAG_INDICES).is_err());
    }

    #[test]
    fn ssz_behaves_like_u8() {
        use ssz::Encode;
        let mut flags = ParticipationFlags::default();
        flags.add_flag(TIMELY_SOURCE_FLAG_INDEX).unwrap();
        flags.add_flag(TIMELY_HEAD_FLAG_INDEX).unwrap();
        assert_eq!(flags.as_ssz_bytes(), flags.into_u8().as_ssz_bytes());
    }
}
