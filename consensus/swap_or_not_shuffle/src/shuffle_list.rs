use crate::{bytes_to_u64, MAX_LIST_SIZE, PIVOT_VIEW_SIZE, SEED_SIZE, TOTAL_SIZE};
use ethereum_hashing::hash;

/// A buffer of `seed ++ round ++ position_window`, the pre-image for both the pivot hash and the
/// per-window decision hashes of a shuffling round.
struct Buf([u8; TOTAL_SIZE]);

impl Buf {
    fn new(seed: &[u8]) -> Self {
        let mut buf = [0; TOTAL_SIZE];
        buf[..SEED_SIZE].copy_from_slice(seed);
        Self(buf)
    }

    fn set_round(&mut self, round: u8) {
        self.0[SEED_SIZE] = round;
    }

    /// The round pivot, determined by `seed` and `round` alone.
    fn pivot(&self, list_size: usize) -> usize {
        bytes_to_u64(&hash(&self.0[..PIVOT_VIEW_SIZE])) as usize % list_size
    }

    /// Hash for the 256-position window containing `position`. One decision bit per position.
    fn window_hash(&mut self, position: usize) -> Vec<u8> {
        self.0[PIVOT_VIEW_SIZE..].copy_from_slice(&((position >> 8) as u32).to_le_bytes());
        hash(&self.0)
    }
}

/// Shuffles an entire list in-place, using `shuffle_round_count` rounds of the swap-or-not
/// shuffle.
///
/// Shuffles if `forwards == true`, otherwise un-shuffles. The two directions are inverses:
/// `shuffle_list(shuffle_list(l, r, s, true), r, s, false) == l`, and un-shuffling places the
/// element `compute_shuffled_index(i)` at position `i`.
///
/// This is ~250x faster than computing each index individually because each 32-byte decision hash
/// is shared by a window of 256 positions.
///
/// Returns `None` under any of the following conditions:
///  - `list_size == 0`
///  - `list_size > 2**24`
///  - `list_size > usize::MAX / 2`
pub fn shuffle_list(
    mut input: Vec<usize>,
    shuffle_round_count: u8,
    seed: &[u8],
    forwards: bool,
) -> Option<Vec<usize>> {
    let list_size = input.len();

    if input.is_empty()
        || list_size > usize::MAX / 2
        || list_size > MAX_LIST_SIZE
        || seed.len() != SEED_SIZE
        || shuffle_round_count == 0
    {
        return None;
    }

    let mut buf = Buf::new(seed);
    let mut round = if forwards { 0 } else { shuffle_round_count - 1 };

    loop {
        buf.set_round(round);

        let pivot = buf.pivot(list_size);
        let mirror = (pivot + 1) >> 1;

        let mut source = buf.window_hash(pivot);
        let mut byte_v = source[(pivot & 0xff) >> 3];

        // Walk the first half of the mirrored region, swapping `i` (below the mirror) with `j`
        // (its reflection below the pivot) whenever the decision bit for `j` is set.
        for i in 0..mirror {
            let j = pivot - i;

            if j & 0xff == 0xff {
                source = buf.window_hash(j);
            }
            if j & 0x07 == 0x07 {
                byte_v = source[(j & 0xff) >> 3];
            }
            let bit_v = (byte_v >> (j & 0x07)) & 0x01;

            if bit_v == 1 {
                input.swap(i, j);
            }
        }

        // The second region mirrors around `(pivot + list_size + 1) / 2`, reflecting positions
        // above the pivot onto the tail of the list.
        let mirror = (pivot + list_size + 1) >> 1;
        let end = list_size - 1;

        let mut source = buf.window_hash(end);
        let mut byte_v = source[(end & 0xff) >> 3];

        for (loop_iter, i) in ((pivot + 1)..mirror).enumerate() {
            let j = end - loop_iter;

            if j & 0xff == 0xff {
                source = buf.window_hash(j);
            }
            if j & 0x07 == 0x07 {
                byte_v = source[(j & 0xff) >> 3];
            }
            let bit_v = (byte_v >> (j & 0x07)) & 0x01;

            if bit_v == 1 {
                input.swap(i, j);
            }
        }

        if forwards {
            round += 1;
            if round == shuffle_round_count {
                break;
            }
        } else {
            if round == 0 {
                break;
            }
            round -= 1;
        }
    }

    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_for_zero_length_list() {
        assert_eq!(None, shuffle_list(vec![], 90, &[42; 32], true));
    }

    #[test]
    fn returns_none_for_zero_rounds() {
        assert_eq!(None, shuffle_list(vec![0], 0, &[42; 32], true));
    }

    #[test]
    fn returns_none_for_bad_seed_length() {
        assert_eq!(None, shuffle_list(vec![0], 90, &[42; 31], true));
    }
}
