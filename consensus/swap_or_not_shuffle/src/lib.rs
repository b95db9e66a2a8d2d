//! The "swap-or-not" shuffle, as applied to the beacon chain validator registry.
//!
//! Two entry points are exposed:
//!
//! - [`compute_shuffled_index`]: shuffle a single index. Preferable when only a handful of
//!   positions of a large list are required (e.g., proposer sampling).
//! - [`shuffle_list`]: shuffle (or un-shuffle) a whole list in-place. Orders of magnitude faster
//!   than calling `compute_shuffled_index` across an entire epoch's active set.
//!
//! Both functions are deterministic in `(seed, round count, list length)` and agree with each
//! other: un-shuffling a list places element `compute_shuffled_index(i)` at position `i`.

mod compute_shuffled_index;
mod shuffle_list;

pub use compute_shuffled_index::compute_shuffled_index;
pub use shuffle_list::shuffle_list;

const SEED_SIZE: usize = 32;
const ROUND_SIZE: usize = 1;
const POSITION_WINDOW_SIZE: usize = 4;
const PIVOT_VIEW_SIZE: usize = SEED_SIZE + ROUND_SIZE;
const TOTAL_SIZE: usize = SEED_SIZE + ROUND_SIZE + POSITION_WINDOW_SIZE;

/// A list longer than this cannot be shuffled; the position window is a `u32` of 256-position
/// chunks.
const MAX_LIST_SIZE: usize = 1 << 24;

fn bytes_to_u64(bytes: &[u8]) -> u64 {
    let mut arr = [0; 8];
    arr.copy_from_slice(&bytes[0..8]);
    u64::from_le_bytes(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Vec<u8> {
        (0_u8..32).collect()
    }

    #[test]
    fn single_index_agrees_with_list_unshuffle() {
        let list: Vec<usize> = (0..1000).collect();
        let unshuffled = shuffle_list(list.clone(), 90, &seed(), false).unwrap();

        for (i, &value) in unshuffled.iter().enumerate() {
            let shuffled_i = compute_shuffled_index(i, list.len(), &seed(), 90).unwrap();
            assert_eq!(value, list[shuffled_i]);
        }
    }

    #[test]
    fn shuffle_then_unshuffle_is_identity() {
        let list: Vec<usize> = (0..347).collect();
        let forwards = shuffle_list(list.clone(), 90, &seed(), true).unwrap();
        let back = shuffle_list(forwards, 90, &seed(), false).unwrap();
        assert_eq!(list, back);
    }

    #[test]
    fn output_is_a_permutation() {
        let list: Vec<usize> = (0..128).collect();
        let mut shuffled = shuffle_list(list.clone(), 90, &seed(), true).unwrap();
        shuffled.sort_unstable();
        assert_eq!(list, shuffled);
    }

    #[test]
    fn different_seeds_disagree() {
        let list: Vec<usize> = (0..256).collect();
        let a = shuffle_list(list.clone(), 90, &seed(), true).unwrap();
        let b = shuffle_list(list, 90, &[0xff; 32], true).unwrap();
        assert_ne!(a, b);
    }
}
