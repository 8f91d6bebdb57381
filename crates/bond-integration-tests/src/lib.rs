//! Integration test crate for the bonding protocol.
//!
//! This crate has no library code; it only contains integration tests
//! that drive the vault, staking pool and vesting ledger together against
//! an in-memory ledger and clock.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p bond-integration-tests
//! ```
