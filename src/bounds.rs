//! Closed big-integer intervals and the per-operator output-interval
//! arithmetic the expression checker folds them through.

use crate::bigint::{self, Z};
use thiserror::Error;

/// A closed interval `[lo, hi]`. Unlike the AST-level sentinel (`[nil,nil]`
/// meaning "not yet computed"), a `Bounds` value is always a concrete,
/// non-empty range; "unknown" is represented as `Option<Bounds>` at the call
/// sites that need it (see `ast.rs`'s node cache).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bounds {
  pub lo: Z,
  pub hi: Z,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArithError {
  #[error("empty bounds: lo > hi ({0} > {1})")]
  Empty(Z, Z),
  #[error("division requires a proved non-negative dividend and positive divisor")]
  DivisionPreconditionUnproved,
  #[error("modulo requires a proved non-negative dividend and positive divisor")]
  ModuloPreconditionUnproved,
  #[error("shift amount may be negative")]
  NegativeShift,
  #[error("bitwise operand may be negative")]
  NegativeBitwiseOperand,
}

impl Bounds {
  /// Construct `[lo, hi]`, rejecting empty ranges (`lo > hi`).
  pub fn new(lo: Z, hi: Z) -> Result<Self, ArithError> {
    if lo > hi { return Err(ArithError::Empty(lo, hi)) }
    Ok(Bounds { lo, hi })
  }

  /// A single-point interval `[k, k]`, used for constants.
  #[must_use] pub fn single(k: Z) -> Self { Bounds { lo: k.clone(), hi: k } }

  /// `[0, 1]`, the range of `bool` and of every comparison/`and`/`or` result.
  #[must_use] pub fn bit() -> Self { Bounds { lo: bigint::zero(), hi: bigint::one() } }

  /// `[-2^1000, 2^1000]`, the range of the unconstrained `ideal` type.
  #[must_use] pub fn ideal() -> Self { Bounds { lo: bigint::min_ideal(), hi: bigint::max_ideal() } }

  #[must_use] pub fn contains(&self, n: &Z) -> bool { self.lo <= *n && *n <= self.hi }

  /// `ContainsIntRange`: does `self` fully contain `other`?
  #[must_use] pub fn contains_int_range(&self, other: &Bounds) -> bool {
    self.lo <= other.lo && other.hi <= self.hi
  }

  /// Intersect two ranges; `Err` if the result would be empty (the ranges
  /// are disjoint).
  pub fn intersect(&self, other: &Bounds) -> Result<Bounds, ArithError> {
    Bounds::new(self.lo.clone().max(other.lo.clone()), self.hi.clone().min(other.hi.clone()))
  }

  #[must_use] pub fn is_const(&self) -> Option<&Z> { if self.lo == self.hi { Some(&self.lo) } else { None } }

  // -- unary --

  #[must_use] pub fn neg(&self) -> Bounds { Bounds { lo: -self.hi.clone(), hi: -self.lo.clone() } }
  #[must_use] pub fn pos(&self) -> Bounds { self.clone() }
  #[must_use] pub fn not(&self) -> Bounds { Bounds::bit() }

  // -- binary, exact arithmetic --

  #[must_use] pub fn add(&self, rhs: &Bounds) -> Bounds {
    Bounds { lo: &self.lo + &rhs.lo, hi: &self.hi + &rhs.hi }
  }

  /// `self - rhs`, without fact tightening. See [`Bounds::sub_tightened`]
  /// for the version used by the expression checker.
  #[must_use] pub fn sub(&self, rhs: &Bounds) -> Bounds {
    Bounds { lo: &self.lo - &rhs.hi, hi: &self.hi - &rhs.lo }
  }

  /// A known ordering between the original (syntactic) operands of a `-`,
  /// used to tighten the naive `sub` bound.
  #[must_use] pub fn sub_tightened(&self, rhs: &Bounds, known: Option<crate::ast::CmpOp>) -> Bounds {
    use crate::ast::CmpOp;
    let mut b = self.sub(rhs);
    match known {
      None => {}
      Some(CmpOp::Lt) => b.hi = b.hi.min(bigint::minus_one()),
      Some(CmpOp::Le) => b.hi = b.hi.min(bigint::zero()),
      Some(CmpOp::Ge) => b.lo = b.lo.max(bigint::zero()),
      Some(CmpOp::Gt) => b.lo = b.lo.max(bigint::one()),
      Some(CmpOp::Eq) => { b.lo = b.lo.max(bigint::zero()); b.hi = b.hi.min(bigint::zero()); }
      Some(CmpOp::Ne) => {}
    }
    if b.lo > b.hi { b.hi = b.lo.clone() } // tightening never produces an empty interval in practice
    b
  }

  #[must_use] pub fn mul(&self, rhs: &Bounds) -> Bounds {
    let ps = [&self.lo * &rhs.lo, &self.lo * &rhs.hi, &self.hi * &rhs.lo, &self.hi * &rhs.hi];
    let lo = ps.iter().min().expect("4 elements").clone();
    let hi = ps.iter().max().expect("4 elements").clone();
    Bounds { lo, hi }
  }

  /// `/`. Requires the caller to have already proved `self >= 0` and
  /// `rhs > 0` (the checker does this against the fact store before
  /// calling); this function trusts that proof and simply fails if the
  /// bounds as given don't actually satisfy it, rather than silently
  /// computing something unsound.
  pub fn try_quo(&self, rhs: &Bounds) -> Result<Bounds, ArithError> {
    if self.lo < bigint::zero() || rhs.lo <= bigint::zero() {
      return Err(ArithError::DivisionPreconditionUnproved)
    }
    Ok(Bounds { lo: &self.lo / &rhs.hi, hi: &self.hi / &rhs.lo })
  }

  /// `%`. Same preconditions as [`Bounds::try_quo`].
  pub fn try_rem(&self, rhs: &Bounds) -> Result<Bounds, ArithError> {
    if self.lo < bigint::zero() || rhs.lo <= bigint::zero() {
      return Err(ArithError::ModuloPreconditionUnproved)
    }
    Bounds::new(bigint::zero(), &rhs.hi - bigint::one())
  }

  /// `<<`. Requires `rhs >= 0` (a negative shift amount is nonsensical
  /// regardless of the type-level `[0, N-1]` range check, which the
  /// expression checker performs separately).
  pub fn try_lsh(&self, rhs: &Bounds) -> Result<Bounds, ArithError> {
    if rhs.lo < bigint::zero() { return Err(ArithError::NegativeShift) }
    let shift = |v: &Z, n: &Z| -> Z {
      let n: u32 = n.try_into().unwrap_or(u32::MAX);
      v.clone() << n
    };
    let candidates = [shift(&self.lo, &rhs.lo), shift(&self.lo, &rhs.hi),
                       shift(&self.hi, &rhs.lo), shift(&self.hi, &rhs.hi)];
    let lo = candidates.iter().min().expect("4 elements").clone();
    let hi = candidates.iter().max().expect("4 elements").clone();
    Ok(Bounds { lo, hi })
  }

  /// `~mod<<`: same as `<<`, but the result is clamped to the destination
  /// primitive type's maximum (wraparound is intentional for `~mod`
  /// operators, so the *interval* is simply capped rather than computed
  /// exactly).
  pub fn try_lsh_mod(&self, rhs: &Bounds, ty_max: &Z) -> Result<Bounds, ArithError> {
    let mut b = self.try_lsh(rhs)?;
    if b.hi > *ty_max { b.hi = ty_max.clone(); }
    if b.lo > b.hi { b.lo = b.hi.clone(); }
    Ok(b)
  }

  /// `>>`. Requires `rhs >= 0`; arithmetic shift on signed, logical on
  /// unsigned is a codegen concern, not a bounds concern (both decrease
  /// magnitude towards zero, or towards -1 for negative signed values).
  pub fn try_rsh(&self, rhs: &Bounds) -> Result<Bounds, ArithError> {
    if rhs.lo < bigint::zero() { return Err(ArithError::NegativeShift) }
    let shift = |v: &Z, n: &Z| -> Z {
      let n: u32 = n.try_into().unwrap_or(u32::MAX);
      v.clone() >> n // floor division by 2^n, for both signs
    };
    let candidates = [shift(&self.lo, &rhs.lo), shift(&self.lo, &rhs.hi),
                       shift(&self.hi, &rhs.lo), shift(&self.hi, &rhs.hi)];
    let lo = candidates.iter().min().expect("4 elements").clone();
    let hi = candidates.iter().max().expect("4 elements").clone();
    Ok(Bounds { lo, hi })
  }

  /// `&`. Requires both operands non-negative. Conservative bound: the
  /// result of a bitwise AND of two non-negative integers never exceeds
  /// the smaller operand.
  pub fn bitand(&self, rhs: &Bounds) -> Result<Bounds, ArithError> {
    self.require_nonneg(rhs)?;
    Bounds::new(bigint::zero(), self.hi.clone().min(rhs.hi.clone()))
  }

  /// `|`. Same precondition; uses the same "next power of two minus one"
  /// pessimistic bound as `^` below, which also safely bounds `|`.
  pub fn bitor(&self, rhs: &Bounds) -> Result<Bounds, ArithError> {
    self.require_nonneg(rhs)?;
    let hi = bigint::pow2(bigint::bits_to_represent(&self.hi.clone().max(rhs.hi.clone()))) - bigint::one();
    Bounds::new(self.lo.clone().max(rhs.lo.clone()).min(hi.clone()), hi)
  }

  /// `^`. `[0, 2^ceil(log2(max(lb,rb)+1)) - 1]`.
  pub fn bitxor(&self, rhs: &Bounds) -> Result<Bounds, ArithError> {
    self.require_nonneg(rhs)?;
    let hi = bigint::pow2(bigint::bits_to_represent(&self.hi.clone().max(rhs.hi.clone()))) - bigint::one();
    Bounds::new(bigint::zero(), hi)
  }

  fn require_nonneg(&self, rhs: &Bounds) -> Result<(), ArithError> {
    if self.lo < bigint::zero() || rhs.lo < bigint::zero() {
      return Err(ArithError::NegativeBitwiseOperand)
    }
    Ok(())
  }

  /// `~mod{+,-,*}`: the result is always within the destination's full
  /// primitive-type range (wraparound by construction).
  #[must_use] pub fn mod_arith(ty_lo: &Z, ty_hi: &Z) -> Bounds { Bounds { lo: ty_lo.clone(), hi: ty_hi.clone() } }

  /// `~sat{+,-}`: exact arithmetic, then saturate to `[ty_lo, ty_hi]`.
  #[must_use] pub fn saturate(&self, ty_lo: &Z, ty_hi: &Z) -> Bounds {
    Bounds { lo: self.lo.clone().clamp(ty_lo.clone(), ty_hi.clone()),
             hi: self.hi.clone().clamp(ty_lo.clone(), ty_hi.clone()) }
  }

  #[must_use] pub fn min_with(&self, rhs: &Bounds) -> Bounds {
    Bounds { lo: self.lo.clone().min(rhs.lo.clone()), hi: self.hi.clone().min(rhs.hi.clone()) }
  }

  #[must_use] pub fn max_with(&self, rhs: &Bounds) -> Bounds {
    Bounds { lo: self.lo.clone().max(rhs.lo.clone()), hi: self.hi.clone().max(rhs.hi.clone()) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::CmpOp;

  fn b(lo: i64, hi: i64) -> Bounds { Bounds::new(Z::from(lo), Z::from(hi)).unwrap() }

  #[test]
  fn add_sub_mul() {
    assert_eq!(b(1, 2).add(&b(3, 4)), b(4, 6));
    assert_eq!(b(1, 2).sub(&b(3, 4)), b(-3, -1));
    assert_eq!(b(-2, 3).mul(&b(-1, 2)), b(-4, 6));
  }

  #[test]
  fn sub_tightening_from_lt_fact() {
    // x < y  =>  x - y <= -1
    let b1 = b(0, 100).sub_tightened(&b(0, 100), Some(CmpOp::Lt));
    assert_eq!(b1.hi, Z::from(-1));
  }

  #[test]
  fn quo_rejects_unproved_precondition() {
    assert!(b(-1, 5).try_quo(&b(1, 10)).is_err());
    assert!(b(0, 5).try_quo(&b(0, 10)).is_err());
    assert!(b(0, 5).try_quo(&b(1, 10)).is_ok());
  }

  #[test]
  fn shift_bounds() {
    assert_eq!(b(0, 255).try_lsh(&b(0, 3)).unwrap(), b(0, 2040));
  }

  #[test]
  fn xor_bound_matches_spec_formula() {
    // max(lb, rb) = 6 (0b110) needs 3 bits -> [0, 7]
    assert_eq!(b(0, 6).bitxor(&b(0, 2)).unwrap(), b(0, 7));
  }

  #[test]
  fn bitwise_rejects_negative_operands() {
    assert!(b(-1, 5).bitand(&b(0, 5)).is_err());
  }

  #[test]
  fn empty_bounds_rejected() {
    assert!(Bounds::new(Z::from(5), Z::from(4)).is_err());
  }
}
