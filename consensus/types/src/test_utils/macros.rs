/// Implements `TestRandom` for a struct, field by field.
#[macro_export]
macro_rules! impl_test_random {
    ($type: ident { $($field: ident),* $(,)? }) => {
        impl $crate::test_utils::TestRandom for $type {
            fn random_for_test(rng: &mut impl rand::RngCore) -> Self {
                Self {
                    $($field: $crate::test_utils::TestRandom::random_for_test(rng)),*
                }
            }
        }
    };
    ($type: ident <T> { $($field: ident),* $(,)? }) => {
        impl<T: $crate::EthSpec> $crate::test_utils::TestRandom for $type<T> {
            fn random_for_test(rng: &mut impl rand::RngCore) -> Self {
                Self {
                    $($field: $crate::test_utils::TestRandom::random_for_test(rng)),*
                }
            }
        }
    };
}

/// Tests that a type round-trips through SSZ and produces a tree hash root.
#[macro_export]
macro_rules! ssz_and_tree_hash_tests {
    ($type: ty) => {
        #[test]
        fn test_ssz_round_trip() {
            use ssz::{Decode, Encode};

            let original = $crate::test_utils::test_random_instance::<$type>();
            let bytes = original.as_ssz_bytes();
            let decoded = <$type>::from_ssz_bytes(&bytes).unwrap();
            assert_eq!(original, decoded);
        }

        #[test]
        fn test_tree_hash_root() {
            use tree_hash::TreeHash;

            let original = $crate::test_utils::test_random_instance::<$type>();
            let root = original.tree_hash_root();
            assert_ne!(root, $crate::Hash256::zero());
        }
    };
}
