//! Test helpers
//!
//! Ledgers on throwaway stores, mined blocks and funded wallets.

pub mod test_utils;

pub use test_utils::*;
