use crate::test_utils::TestRandom;
use rand::RngCore;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};
use std::fmt;
use std::hash::{Hash, Hasher};
use tree_hash::{merkle_root, Hash256, PackedEncoding, TreeHash, TreeHashType};

pub const PUBLIC_KEY_BYTES_LEN: usize = 48;

/// A BLS public key in compressed serialized form.
///
/// The bytes are never deserialized into a curve point by this crate; the epoch-transition core
/// treats keys as opaque identifiers. Point decompression only happens where an aggregate key
/// must be computed (sync committees).
#[derive(Clone, Copy)]
pub struct PublicKeyBytes([u8; PUBLIC_KEY_BYTES_LEN]);

impl PublicKeyBytes {
    /// Instantiates `Self` with all-zeros bytes (the "infinity" placeholder).
    pub fn empty() -> Self {
        Self([0; PUBLIC_KEY_BYTES_LEN])
    }

    /// Returns a slice of the raw bytes.
    pub fn as_serialized(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; PUBLIC_KEY_BYTES_LEN]> for PublicKeyBytes {
    fn from(bytes: [u8; PUBLIC_KEY_BYTES_LEN]) -> Self {
        Self(bytes)
    }
}

impl PartialEq for PublicKeyBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl Eq for PublicKeyBytes {}

impl Hash for PublicKeyBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Default for PublicKeyBytes {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", eth2_serde_utils::hex::encode(self.0))
    }
}

impl fmt::Display for PublicKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", eth2_serde_utils::hex::encode(self.0))
    }
}

impl Encode for PublicKeyBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        PUBLIC_KEY_BYTES_LEN
    }

    fn ssz_bytes_len(&self) -> usize {
        PUBLIC_KEY_BYTES_LEN
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for PublicKeyBytes {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        PUBLIC_KEY_BYTES_LEN
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != PUBLIC_KEY_BYTES_LEN {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: PUBLIC_KEY_BYTES_LEN,
            });
        }
        let mut arr = [0; PUBLIC_KEY_BYTES_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

impl TreeHash for PublicKeyBytes {
    fn tree_hash_type() -> TreeHashType {
        TreeHashType::Vector
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_packing_factor() -> usize {
        unreachable!("Vector should never be packed.")
    }

    fn tree_hash_root(&self) -> Hash256 {
        merkle_root(&self.0, 0)
    }
}

impl Serialize for PublicKeyBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&eth2_serde_utils::hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKeyBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = deserializer.deserialize_str(eth2_serde_utils::hex::PrefixedHexVisitor)?;
        Self::from_ssz_bytes(&bytes)
            .map_err(|e| serde::de::Error::custom(format!("invalid pubkey: {:?}", e)))
    }
}

impl TestRandom for PublicKeyBytes {
    fn random_for_test(rng: &mut impl RngCore) -> Self {
        Self(<[u8; PUBLIC_KEY_BYTES_LEN]>::random_for_test(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    ssz_and_tree_hash_tests!(PublicKeyBytes);

    #[test]
    fn empty_is_all_zeros() {
        assert_eq!(PublicKeyBytes::empty().as_serialized(), &[0; 48][..]);
    }

    #[test]
    fn tree_hash_root_spans_two_chunks() {
        let key = PublicKeyBytes::from([0xff; PUBLIC_KEY_BYTES_LEN]);
        // 48 bytes hash as two 32-byte chunks, the second zero-padded.
        let mut padded = [0; 64];
        padded[..48].copy_from_slice(key.as_serialized());
        assert_eq!(key.tree_hash_root(), merkle_root(&padded, 0));
    }
}
