//! The binary-comparison prover and the named reason-lemma registry used
//! by explicit `assert ... reason` statements.

use crate::ast::{CmpOp, Expr};
use crate::expr_build::structurally_eq;
use crate::facts::Facts;
use hashbrown::HashMap;

/// Does holding `have` between two expressions entail `want`? (`<` entails
/// `<=`, `>` entails `>=`, `==` entails both non-strict orders; everything
/// else needs an exact match.)
fn cmp_entails(have: CmpOp, want: CmpOp) -> bool {
  if have == want { return true }
  matches!((have, want), (CmpOp::Lt, CmpOp::Le) | (CmpOp::Gt, CmpOp::Ge) |
    (CmpOp::Eq, CmpOp::Le) | (CmpOp::Eq, CmpOp::Ge))
}

/// One hop of transitivity: does `r1` then `r2` (`a r1 mid`, `mid r2 b`)
/// entail `a want b`?
fn combine_entails(r1: CmpOp, r2: CmpOp, want: CmpOp) -> bool {
  use CmpOp::{Eq, Ge, Gt, Le, Lt};
  let strict = matches!((r1, r2), (Lt, Lt) | (Lt, Le) | (Le, Lt)) && want == Lt;
  let nonstrict = matches!((r1, r2), (Le, Le)) && want == Le;
  let strict_le = matches!((r1, r2), (Lt, Lt) | (Lt, Le) | (Le, Lt)) && want == Le;
  let strict_gt = matches!((r1, r2), (Gt, Gt) | (Gt, Ge) | (Ge, Gt)) && want == Gt;
  let nonstrict_ge = matches!((r1, r2), (Ge, Ge)) && want == Ge;
  let strict_ge = matches!((r1, r2), (Gt, Gt) | (Gt, Ge) | (Ge, Gt)) && want == Ge;
  let eq_chain = r1 == Eq && cmp_entails(r2, want);
  let eq_chain2 = r2 == Eq && cmp_entails(r1, want);
  strict || nonstrict || strict_le || strict_gt || nonstrict_ge || strict_ge || eq_chain || eq_chain2
}

/// Does a fact in `facts` directly assert `lhs op rhs` (in either written
/// order), strong enough to entail `op`?
fn direct_fact_entails<'a>(facts: &Facts<'a>, op: CmpOp, lhs: Expr<'a>, rhs: Expr<'a>) -> bool {
  facts.iter().any(|f| {
    let Some(have) = f.op.as_cmp_op() else { return false };
    let (Some(l), Some(r)) = (f.lhs(), f.rhs()) else { return false };
    (structurally_eq(l, lhs) && structurally_eq(r, rhs) && cmp_entails(have, op)) ||
    (structurally_eq(l, rhs) && structurally_eq(r, lhs) && cmp_entails(have.swap_sides(), op))
  })
}

/// Does the current cached `MBounds` of `lhs`/`rhs` alone entail `op`?
fn bounds_entail<'a>(op: CmpOp, lhs: Expr<'a>, rhs: Expr<'a>) -> bool {
  let (Some(lb), Some(rb)) = (lhs.bounds(), rhs.bounds()) else { return false };
  match op {
    CmpOp::Le => lb.hi <= rb.lo,
    CmpOp::Lt => lb.hi < rb.lo,
    CmpOp::Ge => lb.lo >= rb.hi,
    CmpOp::Gt => lb.lo > rb.hi,
    CmpOp::Eq => lb.is_const().is_some() && lb == rb,
    CmpOp::Ne => lb.hi < rb.lo || rb.hi < lb.lo || (lb.is_const().is_some() && lb != rb && rb.is_const().is_some()),
  }
}

/// `lhs op rhs` directly, i.e. without going through a transitive hop:
/// constant evaluation, bounds containment, or a literal fact.
fn direct_holds<'a>(op: CmpOp, lhs: Expr<'a>, rhs: Expr<'a>, facts: &Facts<'a>) -> bool {
  if let (Some(l), Some(r)) = (lhs.const_value(), rhs.const_value()) {
    return match op {
      CmpOp::Lt => l < r, CmpOp::Le => l <= r, CmpOp::Gt => l > r,
      CmpOp::Ge => l >= r, CmpOp::Eq => l == r, CmpOp::Ne => l != r,
    }
  }
  bounds_entail(op, lhs, rhs) || direct_fact_entails(facts, op, lhs, rhs)
}

/// Prove `lhs op rhs` from constants, cached bounds, a literal fact, or a
/// single transitive hop through a third expression present in `facts`.
#[must_use] pub fn prove_binary_op<'a>(op: CmpOp, lhs: Expr<'a>, rhs: Expr<'a>, facts: &Facts<'a>) -> bool {
  if direct_holds(op, lhs, rhs, facts) { return true }
  for mid_fact in facts.iter() {
    let Some(r1) = mid_fact.op.as_cmp_op() else { continue };
    let (Some(a), Some(mid)) = (mid_fact.lhs(), mid_fact.rhs()) else { continue };
    if !structurally_eq(a, lhs) { continue }
    for tail_fact in facts.iter() {
      let Some(r2) = tail_fact.op.as_cmp_op() else { continue };
      let (Some(mid2), Some(b)) = (tail_fact.lhs(), tail_fact.rhs()) else { continue };
      if structurally_eq(mid2, mid) && structurally_eq(b, rhs) && combine_entails(r1, r2, op) {
        return true
      }
    }
  }
  false
}

/// A reason lemma: given the assertion's own condition and the extra
/// hypothesis expressions cited alongside the reason id, decide whether
/// `facts` discharges `cond`.
pub type Lemma<'a> = fn(cond: Expr<'a>, hyps: &[Expr<'a>], facts: &Facts<'a>) -> bool;

/// `a < b` via `a < c` and `c <= b` (or any single intermediate hop already
/// covered by [`prove_binary_op`]'s own transitivity search) -- the named
/// lemma exists for cases where the intermediate hypothesis is supplied
/// inline by the assertion rather than already sitting in `F`.
fn lemma_transitivity<'a>(cond: Expr<'a>, hyps: &[Expr<'a>], facts: &Facts<'a>) -> bool {
  let Some(want) = cond.op.as_cmp_op() else { return false };
  let (Some(a), Some(b)) = (cond.lhs(), cond.rhs()) else { return false };
  for hyp in hyps {
    let Some(r1) = hyp.op.as_cmp_op() else { continue };
    let (Some(hl), Some(mid)) = (hyp.lhs(), hyp.rhs()) else { continue };
    if !structurally_eq(hl, a) { continue }
    if prove_binary_op(want, mid, b, facts) && combine_entails(r1, want, want) {
      return true
    }
    if direct_holds(r1, hl, mid, facts) && prove_binary_op(want, mid, b, facts) {
      return true
    }
  }
  false
}

/// `a == b` via antisymmetry: `a <= b` and `b <= a` both hold.
fn lemma_antisymmetry<'a>(cond: Expr<'a>, _hyps: &[Expr<'a>], facts: &Facts<'a>) -> bool {
  let (Some(a), Some(b)) = (cond.lhs(), cond.rhs()) else { return false };
  cond.op == crate::ast::Operator::Eq &&
    direct_holds(CmpOp::Le, a, b, facts) && direct_holds(CmpOp::Le, b, a, facts)
}

/// The fixed reason-lemma table, keyed by interned reason identifier.
pub struct ReasonTable<'a> {
  lemmas: HashMap<crate::symbol::Symbol, Lemma<'a>>,
}

impl<'a> ReasonTable<'a> {
  #[must_use] pub fn new(i: &mut crate::symbol::Interner) -> Self {
    let mut lemmas: HashMap<crate::symbol::Symbol, Lemma<'a>> = HashMap::new();
    lemmas.insert(i.intern("transitivity"), lemma_transitivity);
    lemmas.insert(i.intern("antisymmetry"), lemma_antisymmetry);
    ReasonTable { lemmas }
  }

  /// Dispatch `reason` against `cond`, or `None` if no such reason is
  /// registered (the caller raises `CheckError::NoSuchReason`).
  #[must_use] pub fn discharge(&self, reason: crate::symbol::Symbol, cond: Expr<'a>, hyps: &[Expr<'a>], facts: &Facts<'a>) -> Option<bool> {
    self.lemmas.get(&reason).map(|lemma| lemma(cond, hyps, facts))
  }
}
