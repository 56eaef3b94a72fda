//! Vault scenario suite
//!
//! End-to-end behavior of the public facade over in-memory and on-disk
//! vaults.
//!
//! - **rebalance**: document conservation while growing and shrinking
//! - **search**: scatter-gather ranking equals a brute-force scan
//! - **persistence**: reopen, config files, reset on disk
//!
//! ```bash
//! cargo test --test vault_scenarios
//! ```

mod test_utils;

mod persistence;
mod rebalance;
mod search;
