/// Consensus-wide monetary constants
///
/// These values are part of the network rules: two nodes with different
/// values here will reject each other's blocks.
///
/// Reward credited to the producer of a block (50 coins of 10^8 units)
pub const MINING_REWARD: i64 = 5_000_000_000;

/// Minimum difference between inputs and outputs of a regular transaction
pub const FEE_PER_TRANSACTION: i64 = 1;

/// How many pending transactions a candidate block picks up
pub const TRANSACTIONS_PER_BLOCK: usize = 2;

/// Pending pool capacity
pub const MAX_PENDING_TRANSACTIONS: usize = 1_000;

/// Utility functions for monetary sums
pub mod conversions {
    use crate::error::ValidationError;

    /// Checked sum of amounts
    pub fn checked_sum<I>(amounts: I) -> Result<i64, ValidationError>
    where
        I: IntoIterator<Item = i64>,
    {
        amounts.into_iter().try_fold(0i64, |total, amount| {
            total
                .checked_add(amount)
                .ok_or(ValidationError::AmountOverflow)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::conversions::*;
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_monetary_constants() {
        const _: () = assert!(FEE_PER_TRANSACTION < MINING_REWARD);
        const _: () = assert!(TRANSACTIONS_PER_BLOCK <= MAX_PENDING_TRANSACTIONS);
    }

    #[test]
    fn test_checked_sum() {
        assert_eq!(checked_sum(vec![1, 2, 3]), Ok(6));
        assert_eq!(checked_sum(Vec::new()), Ok(0));
        assert_eq!(
            checked_sum(vec![i64::MAX, 1]),
            Err(ValidationError::AmountOverflow)
        );
    }
}
