//! The fact store: an insertion-ordered sequence of boolean expressions
//! known true at the current program point, with the total operations
//! `append`, `snapshot`, `update`, and `refine`.
//!
//! Backed by `im::Vector` so that `snapshot` is O(1) (structural sharing)
//! rather than an O(n) deep copy -- the statement walker snapshots and
//! restores the store on every branch arm of an `if`/`while`, so a deep
//! copy there would be paid on every conditional in a program.

use crate::ast::{CmpOp, Expr};
use crate::bigint::Z;
use crate::bounds::Bounds;
use crate::expr_build::structurally_eq;
use im::Vector;

/// An immutable point-in-time copy of a fact store, cheap to hold onto
/// across a branch arm.
pub type Snapshot<'a> = Vector<Expr<'a>>;

#[derive(Clone, Default)]
pub struct Facts<'a> {
  facts: Vector<Expr<'a>>,
}

impl<'a> Facts<'a> {
  #[must_use] pub fn new() -> Self { Facts::default() }

  /// Seed a fresh store with a procedure's declared preconditions.
  #[must_use] pub fn seeded(preconditions: impl IntoIterator<Item = Expr<'a>>) -> Self {
    let mut f = Facts::new();
    for p in preconditions { f.append(p); }
    f
  }

  /// Add `x` unless an identical fact is already present.
  pub fn append(&mut self, x: Expr<'a>) {
    if !self.facts.iter().any(|f| structurally_eq(f, x)) {
      self.facts.push_back(x);
    }
  }

  #[must_use] pub fn snapshot(&self) -> Snapshot<'a> { self.facts.clone() }

  pub fn restore(&mut self, snapshot: Snapshot<'a>) { self.facts = snapshot; }

  /// Replace every fact `x` with `phi(x)`; facts mapped to `None` are
  /// dropped. Used by assignment checking to drop facts that mention an
  /// invalidated receiver/argument.
  pub fn update(&mut self, mut phi: impl FnMut(Expr<'a>) -> Option<Expr<'a>>) {
    self.facts = self.facts.iter().copied().filter_map(&mut phi).collect();
  }

  #[must_use] pub fn iter(&self) -> impl Iterator<Item = Expr<'a>> + '_ { self.facts.iter().copied() }
  #[must_use] pub fn len(&self) -> usize { self.facts.len() }
  #[must_use] pub fn is_empty(&self) -> bool { self.facts.is_empty() }
  #[must_use] pub fn contains(&self, x: Expr<'a>) -> bool { self.facts.iter().any(|f| structurally_eq(f, x)) }

  /// Unify a set of branch-outcome snapshots: keep only facts (by
  /// structural identity) present in *every* snapshot.
  pub fn unify(snapshots: &[Snapshot<'a>]) -> Facts<'a> {
    let mut result = Facts::new();
    let Some(first) = snapshots.first() else { return result };
    'outer: for candidate in first {
      for other in &snapshots[1..] {
        if !other.iter().any(|f| structurally_eq(f, candidate)) { continue 'outer }
      }
      result.append(candidate);
    }
    result
  }

  /// Narrow `b` for node `n` by consulting facts of the shape `n ⊙ k`
  /// (`k` constant) or `k ⊙ n`, for `⊙` in `{==, !=, <, ≤, ≥, >}`.
  /// `refine(n, b) ⊆ b` always holds since every arm below only ever
  /// tightens towards `b`'s existing endpoints.
  #[must_use] pub fn refine(&self, n: Expr<'a>, b: Bounds) -> Bounds {
    let mut b = b;
    for fact in &self.facts {
      if let Some((cmp, k)) = as_cmp_with_constant(fact, n) {
        b = apply_cmp(b, cmp, k);
      }
    }
    b
  }
}

fn apply_cmp(b: Bounds, cmp: CmpOp, k: Z) -> Bounds {
  match cmp {
    CmpOp::Eq => b.intersect(&Bounds::single(k.clone())).unwrap_or(b),
    CmpOp::Ne => exclude_point(b, &k),
    CmpOp::Lt => tighten_hi(b, &k - crate::bigint::one()),
    CmpOp::Le => tighten_hi(b, k),
    CmpOp::Ge => tighten_lo(b, k),
    CmpOp::Gt => tighten_lo(b, &k + crate::bigint::one()),
  }
}

/// If `fact` is `n ⊙ k` for constant `k`, return `(⊙, k)` as seen with `n`
/// on the left. If `fact` is the mirrored `k ⊙ n`, swap sides first so the
/// caller always reasons about `n ⊙ k`.
fn as_cmp_with_constant<'a>(fact: Expr<'a>, n: Expr<'a>) -> Option<(CmpOp, Z)> {
  let cmp = fact.op.as_cmp_op()?;
  let (l, r) = (fact.lhs()?, fact.rhs()?);
  if structurally_eq(l, n) {
    if let Some(k) = r.const_value() { return Some((cmp, k)) }
  }
  if structurally_eq(r, n) {
    if let Some(k) = l.const_value() { return Some((cmp.swap_sides(), k)) }
  }
  None
}

fn tighten_hi(mut b: Bounds, new_hi: Z) -> Bounds { b.hi = b.hi.min(new_hi); if b.lo > b.hi { b.hi = b.lo.clone() } b }
fn tighten_lo(mut b: Bounds, new_lo: Z) -> Bounds { b.lo = b.lo.max(new_lo); if b.lo > b.hi { b.lo = b.hi.clone() } b }

fn exclude_point(b: Bounds, k: &Z) -> Bounds {
  if &b.lo == k { return tighten_lo(b, k + crate::bigint::one()) }
  if &b.hi == k { return tighten_hi(b, k - crate::bigint::one()) }
  b
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::Arena;
  use crate::expr_build::{mk_cmp, mk_const, mk_ident};
  use crate::symbol::Symbol;

  fn span() -> crate::ast::Span { crate::ast::Span { file: Symbol::default(), line: 1, col: 1 } }

  #[test]
  fn append_deduplicates_by_structure() {
    let arena = Arena::new();
    let x = mk_ident(&arena, Symbol::default(), span());
    let ten = mk_const(&arena, Z::from(10), span());
    let mut f = Facts::new();
    f.append(mk_cmp(&arena, CmpOp::Lt, x, ten, span()));
    let x2 = mk_ident(&arena, Symbol::default(), span());
    let ten2 = mk_const(&arena, Z::from(10), span());
    f.append(mk_cmp(&arena, CmpOp::Lt, x2, ten2, span()));
    assert_eq!(f.len(), 1);
  }

  #[test]
  fn snapshot_restore_roundtrips() {
    let arena = Arena::new();
    let x = mk_ident(&arena, Symbol::default(), span());
    let ten = mk_const(&arena, Z::from(10), span());
    let mut f = Facts::new();
    let before = f.snapshot();
    f.append(mk_cmp(&arena, CmpOp::Lt, x, ten, span()));
    assert_eq!(f.len(), 1);
    f.restore(before);
    assert!(f.is_empty());
  }

  #[test]
  fn unify_keeps_only_common_facts() {
    let arena = Arena::new();
    let x = mk_ident(&arena, Symbol::default(), span());
    let ten = mk_const(&arena, Z::from(10), span());
    let zero = mk_const(&arena, Z::from(0), span());
    let common = mk_cmp(&arena, CmpOp::Ge, x, zero, span());

    let mut branch_a = Facts::new();
    branch_a.append(common);
    branch_a.append(mk_cmp(&arena, CmpOp::Lt, x, ten, span()));

    let mut branch_b = Facts::new();
    let common2 = mk_cmp(&arena, CmpOp::Ge, mk_ident(&arena, Symbol::default(), span()), mk_const(&arena, Z::from(0), span()), span());
    branch_b.append(common2);

    let unified = Facts::unify(&[branch_a.snapshot(), branch_b.snapshot()]);
    assert_eq!(unified.len(), 1);
    assert!(unified.contains(common));
  }

  #[test]
  fn refine_tightens_from_lt_and_ge_facts() {
    let arena = Arena::new();
    let x = mk_ident(&arena, Symbol::default(), span());
    let mut f = Facts::new();
    f.append(mk_cmp(&arena, CmpOp::Lt, x, mk_const(&arena, Z::from(10), span()), span()));
    f.append(mk_cmp(&arena, CmpOp::Ge, x, mk_const(&arena, Z::from(0), span()), span()));
    let refined = f.refine(x, Bounds::ideal());
    assert_eq!(refined, Bounds::new(Z::from(0), Z::from(9)).unwrap());
  }

  #[test]
  fn refine_handles_constant_on_the_left() {
    let arena = Arena::new();
    let x = mk_ident(&arena, Symbol::default(), span());
    let mut f = Facts::new();
    // 5 < x  <=>  x > 5
    f.append(mk_cmp(&arena, CmpOp::Lt, mk_const(&arena, Z::from(5), span()), x, span()));
    let refined = f.refine(x, Bounds::ideal());
    assert_eq!(refined.lo, Z::from(6));
  }
}
