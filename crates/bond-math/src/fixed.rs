//! Fixed-point multiply/divide.
//!
//! ## Numeric contract
//!
//! ```text
//! mul_div(a, b, d) = floor(a * b / d)          (exact, 256-bit intermediate)
//! bps(x, r)        = floor(x * r / 10_000)
//! to_scaled(x, n)  = floor(x * SCALE / n)      (SCALE = 1e18)
//! from_scaled(x, a)= floor(x * a / SCALE)
//! ```
//!
//! Every result rounds toward zero, so a payout computed from these helpers
//! never exceeds the value that backs it.

use bond_types::{BPS_DENOMINATOR, SCALE};

use crate::{MathError, Result};

/// Full 256-bit product of two `u128`s as `(high, low)` halves.
fn widening_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;

    let a_lo = a & MASK;
    let a_hi = a >> 64;
    let b_lo = b & MASK;
    let b_hi = b >> 64;

    let p0 = a_lo * b_lo;
    let p1 = a_lo * b_hi;
    let p2 = a_hi * b_lo;
    let p3 = a_hi * b_hi;

    // Sum of three values below 2^64 each, fits easily.
    let mid = (p0 >> 64) + (p1 & MASK) + (p2 & MASK);

    let low = (p0 & MASK) | (mid << 64);
    let high = p3 + (p1 >> 64) + (p2 >> 64) + (mid >> 64);
    (high, low)
}

/// Compute `floor(a * b / denominator)`.
///
/// # Errors
///
/// - [`MathError::DivisionByZero`] if `denominator` is zero
/// - [`MathError::Overflow`] if the quotient does not fit in `u128`
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / denominator);
    }

    let (high, low) = widening_mul(a, b);
    if high >= denominator {
        return Err(MathError::Overflow);
    }

    // Restoring long division of (high, low) by denominator, one bit at a
    // time. `remainder < denominator` holds at the top of every iteration.
    let mut remainder = high;
    let mut quotient = 0u128;
    for bit in (0..128).rev() {
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((low >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || remainder >= denominator {
            remainder = remainder.wrapping_sub(denominator);
            quotient |= 1;
        }
    }
    Ok(quotient)
}

/// Compute `floor(amount * rate_bps / 10_000)`.
///
/// # Errors
///
/// - [`MathError::Overflow`] on overflow
pub fn bps(amount: u128, rate_bps: u32) -> Result<u128> {
    mul_div(amount, u128::from(rate_bps), BPS_DENOMINATOR)
}

/// Convert an amount spread over `denominator` units into a scaled
/// per-unit value: `floor(amount * SCALE / denominator)`.
///
/// # Errors
///
/// - [`MathError::DivisionByZero`] if `denominator` is zero
/// - [`MathError::Overflow`] on overflow
pub fn to_scaled(amount: u128, denominator: u128) -> Result<u128> {
    mul_div(amount, SCALE, denominator)
}

/// Apply a scaled per-unit value to a quantity: `floor(quantity * scaled / SCALE)`.
///
/// # Errors
///
/// - [`MathError::Overflow`] on overflow
pub fn from_scaled(quantity: u128, scaled: u128) -> Result<u128> {
    mul_div(quantity, scaled, SCALE)
}
