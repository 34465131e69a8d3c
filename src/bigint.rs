//! Arbitrary-precision integers and the handful of sentinel constants the
//! checker's bounds arithmetic reaches for repeatedly.

use num::BigInt;
use std::sync::LazyLock;

/// All arithmetic inside the checker is mathematically exact (no
/// wraparound); `Z` is just `num::BigInt` under a short name for the
/// integer type this crate's arithmetic is built on.
pub type Z = BigInt;

#[must_use] pub fn minus_one() -> Z { Z::from(-1) }
#[must_use] pub fn zero() -> Z { Z::from(0) }
#[must_use] pub fn one() -> Z { Z::from(1) }

/// `minIdeal = -(1 << 1000)`, the lower bound of the unconstrained `ideal`
/// type used for integer literals before coercion.
#[must_use] pub fn min_ideal() -> Z { MIN_IDEAL.clone() }
/// `maxIdeal = +(1 << 1000)`.
#[must_use] pub fn max_ideal() -> Z { MAX_IDEAL.clone() }

static MIN_IDEAL: LazyLock<Z> = LazyLock::new(|| -(Z::from(1) << 1000u32));
static MAX_IDEAL: LazyLock<Z> = LazyLock::new(|| Z::from(1) << 1000u32);

/// `2^n`, used throughout the intrinsic-range and bitwise-width tables.
#[must_use] pub fn pow2(n: u32) -> Z { Z::from(1) << n }

/// Smallest `n` such that `2^n > x`, i.e. `ceil(log2(x + 1))`, used by the
/// `^` (xor) interval rule. `x` must be `>= 0`.
#[must_use] pub fn bits_to_represent(x: &Z) -> u32 {
  debug_assert!(*x >= zero(), "bits_to_represent of a negative number");
  if *x == zero() { return 0 }
  let mut n = 0u32;
  let mut acc = one();
  while acc <= *x { acc <<= 1u32; n += 1; }
  n
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ideal_bounds_are_symmetric() {
    assert_eq!(min_ideal(), -max_ideal());
  }

  #[test]
  fn bits_to_represent_examples() {
    assert_eq!(bits_to_represent(&zero()), 0);
    assert_eq!(bits_to_represent(&one()), 1);
    assert_eq!(bits_to_represent(&Z::from(2)), 2);
    assert_eq!(bits_to_represent(&Z::from(3)), 2);
    assert_eq!(bits_to_represent(&Z::from(4)), 3);
    assert_eq!(bits_to_represent(&Z::from(255)), 8);
    assert_eq!(bits_to_represent(&Z::from(256)), 9);
  }
}
