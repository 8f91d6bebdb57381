//! # bond-math
//!
//! Scaled-integer helpers shared by the vesting and reward engines.
//!
//! All amounts are `u128` base units. Products are formed in 256 bits so
//! that `amount * accumulator` never overflows before the division brings
//! the result back into range.
//!
//! ## Modules
//!
//! - [`fixed`] — `mul_div`, basis points and accumulator conversions

pub mod fixed;

pub use fixed::{bps, from_scaled, mul_div, to_scaled};

/// Error types for fixed-point arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Result does not fit in 128 bits.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Convenience result type for math operations.
pub type Result<T> = std::result::Result<T, MathError>;
