// Difficulty curve: the proof-of-work target only ever tightens, one step every EVERY_X_BLOCKS.

/// Hex characters of a block hash read as the proof-of-work value
pub const PROOF_PREFIX_LEN: usize = 14;

/// Largest value a 14 hex character prefix can hold (2^56 - 1)
pub const BASE_DIFFICULTY: u64 = (1u64 << (PROOF_PREFIX_LEN * 4)) - 1;

pub const EVERY_X_BLOCKS: u64 = 5;
pub const POW_CURVE: u32 = 5;

/// Target a block at `index` must go below.
///
/// When `index` is `None` the chain length stands in for it, which is the
/// height of the next block to be appended.
pub fn difficulty(chain_length: usize, index: Option<u64>) -> u64 {
    let n = index.unwrap_or(chain_length as u64);
    let step = (n.saturating_add(1) / EVERY_X_BLOCKS) as u128 + 1;
    let divisor = step.saturating_pow(POW_CURVE);
    (BASE_DIFFICULTY as u128 / divisor) as u64
}

/// Leading hex prefix of `hash` as an integer; unreadable hashes never meet a target
pub fn proof_value(hash: &str) -> u64 {
    hash.get(..PROOF_PREFIX_LEN)
        .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
        .unwrap_or(u64::MAX)
}

pub fn meets_target(hash: &str, target: u64) -> bool {
    proof_value(hash) < target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_difficulty_is_prefix_max() {
        assert_eq!(BASE_DIFFICULTY, 0x00ff_ffff_ffff_ffff);
        assert_eq!(proof_value("ffffffffffffff00"), BASE_DIFFICULTY);
    }

    #[test]
    fn test_curve_values() {
        assert_eq!(difficulty(0, Some(0)), BASE_DIFFICULTY);
        assert_eq!(difficulty(0, Some(3)), BASE_DIFFICULTY);
        assert_eq!(difficulty(0, Some(4)), BASE_DIFFICULTY / 32);
        assert_eq!(difficulty(0, Some(9)), BASE_DIFFICULTY / 243);
        // Chain length stands in for a missing index
        assert_eq!(difficulty(4, None), difficulty(0, Some(4)));
    }

    #[test]
    fn test_difficulty_only_tightens() {
        for n in 0..500u64 {
            assert!(difficulty(0, Some(n)) >= difficulty(0, Some(n + 5)));
            assert!(difficulty(0, Some(n)) >= difficulty(0, Some(n + 1)));
        }
    }

    #[test]
    fn test_difficulty_floors_at_zero() {
        assert_eq!(difficulty(0, Some(u64::MAX)), 0);
        assert_eq!(difficulty(0, Some(1_000_000_000)), 0);
    }

    #[test]
    fn test_proof_value() {
        assert_eq!(proof_value("00000000000001ab"), 1);
        assert_eq!(proof_value("short"), u64::MAX);
        assert_eq!(proof_value("zzzzzzzzzzzzzzzz"), u64::MAX);
        assert!(meets_target("00000000000000ff", 1));
        assert!(!meets_target("00000000000001ff", 1));
    }
}
