//! Directed-rounding binary floats for the reveal-count calculation.
//!
//! [num_reveals] finds the smallest `R` with
//! `signed_weight^R >= 2^sec_kq * proven_weight^R`. The two sides are
//! tracked as 128-bit-mantissa floats: the left side rounds every operation
//! down and the right side up, so the left is never over-estimated and the
//! right never under-estimated. Any `R` the comparison accepts therefore
//! satisfies the exact-arithmetic inequality; rounding can cost an extra
//! reveal but can never weaken the security parameter.

use crate::Error;
use core::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rounding {
    Down,
    Up,
}

/// An unsigned binary float `mantissa * 2^exponent` with a 128-bit mantissa.
///
/// Nonzero values keep the mantissa normalized (top bit set); zero is
/// represented by a zero mantissa.
#[derive(Clone, Copy, Debug)]
struct BigFloat {
    mantissa: u128,
    exponent: i64,
    rounding: Rounding,
}

impl BigFloat {
    fn from_u64(value: u64, rounding: Rounding) -> Self {
        if value == 0 {
            return Self {
                mantissa: 0,
                exponent: 0,
                rounding,
            };
        }
        let wide = u128::from(value);
        let shift = wide.leading_zeros();
        Self {
            mantissa: wide << shift,
            exponent: -i64::from(shift),
            rounding,
        }
    }

    fn pow2(power: i64, rounding: Rounding) -> Self {
        Self {
            mantissa: 1 << 127,
            exponent: power - 127,
            rounding,
        }
    }

    /// Multiply in place, rounding the 256-bit product back to 128 bits in
    /// this value's direction.
    fn mul(&mut self, other: &Self) {
        debug_assert_eq!(self.rounding, other.rounding);
        if self.mantissa == 0 || other.mantissa == 0 {
            self.mantissa = 0;
            self.exponent = 0;
            return;
        }

        // Both operands are normalized, so the product's top bit is at
        // position 254 or 255.
        let (hi, lo) = wide_mul(self.mantissa, other.mantissa);
        let (mut mantissa, discarded, shift) = if hi >> 127 != 0 {
            (hi, lo != 0, 128i64)
        } else {
            ((hi << 1) | (lo >> 127), lo << 1 != 0, 127i64)
        };
        let mut exponent = self.exponent + other.exponent + shift;
        if discarded && self.rounding == Rounding::Up {
            match mantissa.checked_add(1) {
                Some(incremented) => mantissa = incremented,
                None => {
                    mantissa = 1 << 127;
                    exponent += 1;
                }
            }
        }

        self.mantissa = mantissa;
        self.exponent = exponent;
    }

    fn ge(&self, other: &Self) -> bool {
        if other.mantissa == 0 {
            return true;
        }
        if self.mantissa == 0 {
            return false;
        }
        // Normalized mantissas put the value of `self` in
        // [2^(127+e), 2^(128+e)), so distinct exponents cannot overlap.
        match self.exponent.cmp(&other.exponent) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.mantissa >= other.mantissa,
        }
    }
}

/// Full 256-bit product of two `u128`s as `(high, low)` halves.
fn wide_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = u64::MAX as u128;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (mid << 64) | (ll & MASK);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// The smallest number of reveals `R` with
/// `signed_weight^R >= 2^sec_kq * proven_weight^R`, or
/// [Error::TooManyReveals] if `R` would exceed `bound`.
pub fn num_reveals(
    signed_weight: u64,
    proven_weight: u64,
    sec_kq: u64,
    bound: u64,
) -> Result<u64, Error> {
    let signed = BigFloat::from_u64(signed_weight, Rounding::Down);
    let proven = BigFloat::from_u64(proven_weight, Rounding::Up);
    let mut lhs = BigFloat::from_u64(1, Rounding::Down);
    let mut rhs = BigFloat::pow2(i64::try_from(sec_kq).unwrap_or(i64::MAX), Rounding::Up);

    let mut reveals = 0;
    loop {
        if lhs.ge(&rhs) {
            return Ok(reveals);
        }
        if reveals >= bound {
            return Err(Error::TooManyReveals(bound));
        }
        lhs.mul(&signed);
        rhs.mul(&proven);
        reveals += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_mul() {
        assert_eq!(wide_mul(0, u128::MAX), (0, 0));
        assert_eq!(wide_mul(1, u128::MAX), (0, u128::MAX));
        assert_eq!(wide_mul(1 << 64, 1 << 64), (1, 0));
        assert_eq!(wide_mul(u128::MAX, u128::MAX), (u128::MAX - 1, 1));
        assert_eq!(wide_mul(u128::MAX, 2), (1, u128::MAX - 1));
    }

    #[test]
    fn test_power_of_two_weights_exact() {
        // 4^R >= 2^128 first holds at R = 64; powers of two never round.
        assert_eq!(num_reveals(4, 1, 128, 1024), Ok(64));
        assert_eq!(num_reveals(2, 1, 128, 1024), Ok(128));
        assert_eq!(num_reveals(1 << 20, 1 << 10, 100, 1024), Ok(10));
    }

    #[test]
    fn test_zero_security_parameter() {
        assert_eq!(num_reveals(1000, 500, 0, 1024), Ok(0));
    }

    #[test]
    fn test_halved_weight() {
        // The weight ratio is exactly 2, so the exact bound is R = 128;
        // directed rounding may pay at most a few extra reveals.
        let reveals = num_reveals(1000, 500, 128, 1024).unwrap();
        assert!((128..=132).contains(&reveals), "reveals = {reveals}");
    }

    #[test]
    fn test_bound_exceeded() {
        // ratio 1001/1000 needs ~88k reveals for 128 bits
        assert_eq!(
            num_reveals(1001, 1000, 128, 1024),
            Err(Error::TooManyReveals(1024))
        );
    }

    #[test]
    fn test_equal_weights_never_terminate_early() {
        assert_eq!(
            num_reveals(1000, 1000, 128, 1024),
            Err(Error::TooManyReveals(1024))
        );
    }

    #[test]
    fn test_monotone_in_signed_weight() {
        // More signed weight means fewer reveals.
        let mut last = u64::MAX;
        for signed in [550u64, 600, 750, 1000, 5000, 100_000] {
            let reveals = num_reveals(signed, 500, 128, 1024).unwrap();
            assert!(reveals <= last, "signed={signed} reveals={reveals}");
            last = reveals;
        }
    }

    #[test]
    fn test_monotone_in_proven_weight() {
        // A larger proven weight cannot need fewer reveals.
        let mut last = 0;
        for proven in [1u64, 10, 100, 250, 400] {
            let reveals = num_reveals(1000, proven, 128, 1024).unwrap();
            assert!(reveals >= last, "proven={proven} reveals={reveals}");
            last = reveals;
        }
    }

    #[test]
    fn test_directed_rounding_is_sound() {
        // Check the exact inequality signed^R >= 2^kq * proven^R for the
        // returned R with plain big-integer arithmetic.
        fn holds(signed: u64, proven: u64, sec_kq: u64, reveals: u64) -> bool {
            let mut lhs: Vec<u64> = vec![1];
            let mut rhs: Vec<u64> = vec![1];
            for _ in 0..reveals {
                lhs = limb_mul(&lhs, signed);
                rhs = limb_mul(&rhs, proven);
            }
            for _ in 0..sec_kq {
                rhs = limb_mul(&rhs, 2);
            }
            limb_ge(&lhs, &rhs)
        }

        fn limb_mul(limbs: &[u64], by: u64) -> Vec<u64> {
            let mut out = Vec::with_capacity(limbs.len() + 1);
            let mut carry: u128 = 0;
            for &limb in limbs {
                let wide = u128::from(limb) * u128::from(by) + carry;
                out.push(wide as u64);
                carry = wide >> 64;
            }
            if carry > 0 {
                out.push(carry as u64);
            }
            out
        }

        fn limb_ge(a: &[u64], b: &[u64]) -> bool {
            if a.len() != b.len() {
                return a.len() > b.len();
            }
            for (&x, &y) in a.iter().rev().zip(b.iter().rev()) {
                if x != y {
                    return x > y;
                }
            }
            true
        }

        for (signed, proven, sec_kq) in [
            (1000u64, 500u64, 128u64),
            (1000, 500, 64),
            (777, 333, 100),
            (65_536, 4_096, 80),
            (3, 2, 32),
        ] {
            let reveals = num_reveals(signed, proven, sec_kq, 1024).unwrap();
            assert!(
                holds(signed, proven, sec_kq, reveals),
                "({signed}, {proven}, {sec_kq}) -> {reveals}"
            );
        }
    }
}
