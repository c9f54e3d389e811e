//! Probabilistic level assignment: sample a uniform 31-bit integer and
//! count trailing zeros, clipped to `[0, STEPS - 1]`.

use rand::Rng;

use crate::node::STEPS;

/// Sample a new node's level. Level 0 has probability 1/2, level
/// `STEPS - 1` is a hard cap regardless of how many trailing zeros the
/// sample has.
pub fn sample_level() -> usize {
    sample_level_from(rand::thread_rng().gen_range(0..(1u32 << 31)))
}

fn sample_level_from(sample: u32) -> usize {
    (sample.trailing_zeros() as usize).min(STEPS - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sample_hits_the_hard_cap() {
        assert_eq!(sample_level_from(0), STEPS - 1);
    }

    #[test]
    fn odd_sample_is_level_zero() {
        assert_eq!(sample_level_from(1), 0);
        assert_eq!(sample_level_from(7), 0);
    }

    #[test]
    fn trailing_zeros_determine_level() {
        assert_eq!(sample_level_from(0b100), 2);
        assert_eq!(sample_level_from(0b1000), 3);
    }

    #[test]
    fn distribution_is_roughly_geometric() {
        let mut counts = [0u32; STEPS];
        for i in 0..100_000u32 {
            counts[sample_level_from(i.wrapping_mul(2654435761))] += 1;
        }
        // Level 0 should be roughly half of all samples.
        assert!(counts[0] > 40_000 && counts[0] < 60_000);
    }
}
