//! Expression constructors, `invert`, `simplify`, rendering, and structural
//! (syntactic) equality.

use crate::ast::{Arena, CmpOp, Expr, ExprNode, Operator, Span};
use crate::bigint::Z;
use crate::symbol::{Interner, Symbol};
use if_chain::if_chain;
use smallvec::{smallvec, SmallVec};

fn cmp_to_op(c: CmpOp) -> Operator {
  match c {
    CmpOp::Lt => Operator::Lt, CmpOp::Le => Operator::Le,
    CmpOp::Gt => Operator::Gt, CmpOp::Ge => Operator::Ge,
    CmpOp::Eq => Operator::Eq, CmpOp::Ne => Operator::Ne,
  }
}

/// A compile-time constant literal. `ConstValue` and `MBounds` are both set
/// at construction, matching the invariant `MBounds(n) = [ConstValue(n),
/// ConstValue(n)]` -- there is no point deferring it to `bcheckExpr` for a
/// node we just built ourselves.
pub fn mk_const<'a>(arena: &'a Arena<'a>, value: Z, span: Span) -> Expr<'a> {
  let e = arena.alloc_expr(ExprNode::new(Operator::Const, None, None, None, None, smallvec![], span));
  e.set_const_value(value.clone());
  e.set_bounds(crate::bounds::Bounds::single(value));
  e
}

pub fn mk_ident<'a>(arena: &'a Arena<'a>, name: Symbol, span: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::Ident, Some(name), None, None, None, smallvec![], span))
}

pub fn mk_binary<'a>(arena: &'a Arena<'a>, op: Operator, lhs: Expr<'a>, rhs: Expr<'a>, span: Span) -> Expr<'a> {
  debug_assert!(op.is_binary());
  arena.alloc_expr(ExprNode::new(op, None, Some(lhs), None, Some(rhs), smallvec![], span))
}

pub fn mk_cmp<'a>(arena: &'a Arena<'a>, op: CmpOp, lhs: Expr<'a>, rhs: Expr<'a>, span: Span) -> Expr<'a> {
  mk_binary(arena, cmp_to_op(op), lhs, rhs, span)
}

pub fn mk_field<'a>(arena: &'a Arena<'a>, recv: Expr<'a>, field: Symbol, span: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::Field, Some(field), Some(recv), None, None, smallvec![], span))
}

pub fn mk_call<'a>(arena: &'a Arena<'a>, callee: Expr<'a>, args: SmallVec<[Expr<'a>; 2]>, span: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::Call, None, Some(callee), None, None, args, span))
}

/// `recv.length()`, the synthetic call the slicing/indexing rules use for
/// array/slice lengths when no static length is available.
pub fn mk_length_call<'a>(arena: &'a Arena<'a>, recv: Expr<'a>, length_sym: Symbol, span: Span) -> Expr<'a> {
  let callee = mk_field(arena, recv, length_sym, span);
  mk_call(arena, callee, smallvec![], span)
}

pub fn mk_and<'a>(arena: &'a Arena<'a>, args: SmallVec<[Expr<'a>; 2]>, span: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::And, None, None, None, None, args, span))
}

pub fn mk_or<'a>(arena: &'a Arena<'a>, args: SmallVec<[Expr<'a>; 2]>, span: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::Or, None, None, None, None, args, span))
}

pub fn mk_not<'a>(arena: &'a Arena<'a>, x: Expr<'a>, span: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::Not, None, Some(x), None, None, smallvec![], span))
}

/// Logical negation by De Morgan, preferring a structural inversion
/// (comparison flip, And/Or swap, double-negation elimination) over
/// wrapping in a fresh `Not` node.
pub fn invert<'a>(arena: &'a Arena<'a>, e: Expr<'a>) -> Expr<'a> {
  if_chain! {
    if let Some(cmp) = e.op.as_cmp_op();
    if let (Some(l), Some(r)) = (e.lhs(), e.rhs());
    then { return mk_cmp(arena, cmp.negate(), l, r, e.span) }
  }
  match e.op {
    Operator::Not => e.lhs().expect("Not has a child"),
    Operator::And => {
      let inverted: SmallVec<[Expr<'a>; 2]> = e.args().iter().map(|a| invert(arena, a)).collect();
      mk_or(arena, inverted, e.span)
    }
    Operator::Or => {
      let inverted: SmallVec<[Expr<'a>; 2]> = e.args().iter().map(|a| invert(arena, a)).collect();
      mk_and(arena, inverted, e.span)
    }
    _ => mk_not(arena, e, e.span),
  }
}

fn eval_binop(op: Operator, l: &Z, r: &Z) -> Option<Z> {
  use crate::bigint::{one, zero};
  Some(match op {
    Operator::Add => l + r,
    Operator::Sub => l - r,
    Operator::Mul => l * r,
    Operator::Div => { if *r == zero() { return None } l / r }
    Operator::Mod => { if *r == zero() { return None } l % r }
    Operator::Lt => if l < r { one() } else { zero() },
    Operator::Le => if l <= r { one() } else { zero() },
    Operator::Gt => if l > r { one() } else { zero() },
    Operator::Ge => if l >= r { one() } else { zero() },
    Operator::Eq => if l == r { one() } else { zero() },
    Operator::Ne => if l != r { one() } else { zero() },
    _ => return None,
  })
}

/// Constant folding and shape normalization. Idempotent: `simplify` on an
/// already-simplified node returns a structurally identical node
/// (`simplify(simplify(x)) == simplify(x)`).
pub fn simplify<'a>(arena: &'a Arena<'a>, e: Expr<'a>) -> Expr<'a> {
  if e.op == Operator::Const { return e }
  match e.op {
    Operator::Not => {
      let inner = simplify(arena, e.lhs().expect("Not has a child"));
      if inner.op == Operator::Not { return inner.lhs().expect("Not has a child") }
      if let Some(k) = inner.const_value() {
        return mk_const(arena, if k == crate::bigint::zero() { crate::bigint::one() } else { crate::bigint::zero() }, e.span)
      }
      mk_not(arena, inner, e.span)
    }
    Operator::And | Operator::Or => {
      let simplified: SmallVec<[Expr<'a>; 2]> = e.args().iter().map(|a| simplify(arena, a)).collect();
      if simplified.len() == 1 { return simplified[0] }
      let node = ExprNode::new(e.op, None, None, None, None, simplified, e.span);
      arena.alloc_expr(node)
    }
    op if op.is_binary() && op != Operator::As => {
      let l = simplify(arena, e.lhs().expect("binary has lhs"));
      let r = simplify(arena, e.rhs().expect("binary has rhs"));
      if_chain! {
        if let (Some(lk), Some(rk)) = (l.const_value(), r.const_value());
        if let Some(v) = eval_binop(op, &lk, &rk);
        then { return mk_const(arena, v, e.span) }
      }
      mk_binary(arena, op, l, r, e.span)
    }
    Operator::Neg => {
      let inner = simplify(arena, e.lhs().expect("Neg has a child"));
      if let Some(k) = inner.const_value() { return mk_const(arena, -k, e.span) }
      arena.alloc_expr(ExprNode::new(Operator::Neg, None, Some(inner), None, None, smallvec![], e.span))
    }
    _ => e,
  }
}

/// Structural (syntactic) equality of two expressions: same operator,
/// identifier, constant value, and recursively-equal children. Facts are
/// compared this way -- `simplify` should be applied before comparison so
/// that trivially different shapes (e.g. `1 + 1` vs `2`) collapse to the
/// same representation rather than being compared textually.
#[must_use] pub fn structurally_eq<'a>(a: Expr<'a>, b: Expr<'a>) -> bool {
  if a.op != b.op || a.ident != b.ident { return false }
  if a.const_value() != b.const_value() { return false }
  let opt_eq = |x: Option<Expr<'a>>, y: Option<Expr<'a>>| match (x, y) {
    (None, None) => true,
    (Some(x), Some(y)) => structurally_eq(x, y),
    _ => false,
  };
  if !opt_eq(a.lhs(), b.lhs()) || !opt_eq(a.mhs(), b.mhs()) || !opt_eq(a.rhs(), b.rhs()) { return false }
  if a.args().len() != b.args().len() { return false }
  a.args().iter().zip(b.args()).all(|(x, y)| structurally_eq(x, y))
}

/// Render an expression back to its source form, for diagnostics quoting
/// the unprovable condition in an error message.
#[must_use] pub fn render(e: Expr<'_>, interner: &Interner) -> String {
  let name = |s: Symbol| interner.string(s).to_owned();
  match e.op {
    Operator::Const => e.const_value().map_or_else(|| "?".into(), |k| k.to_string()),
    Operator::Ident => e.ident.map_or_else(|| "?".into(), name),
    Operator::Neg => format!("-{}", render(e.lhs().unwrap(), interner)),
    Operator::Pos => format!("+{}", render(e.lhs().unwrap(), interner)),
    Operator::Not => format!("!{}", render(e.lhs().unwrap(), interner)),
    Operator::As => format!("({} as _)", render(e.lhs().unwrap(), interner)),
    Operator::And => e.args().iter().map(|a| render(a, interner)).collect::<Vec<_>>().join(" and "),
    Operator::Or => e.args().iter().map(|a| render(a, interner)).collect::<Vec<_>>().join(" or "),
    Operator::Call => {
      let callee = render(e.lhs().expect("Call has a callee"), interner);
      let args = e.args().iter().map(|a| render(a, interner)).collect::<Vec<_>>().join(", ");
      format!("{callee}({args})")
    }
    Operator::Index => format!("{}[{}]", render(e.lhs().unwrap(), interner), render(e.rhs().unwrap(), interner)),
    Operator::Slice => {
      let lo = e.mhs().map_or_else(String::new, |x| render(x, interner));
      let hi = e.rhs().map_or_else(String::new, |x| render(x, interner));
      format!("{}[{lo}..{hi}]", render(e.lhs().unwrap(), interner))
    }
    Operator::Field => format!("{}.{}", render(e.lhs().unwrap(), interner), e.ident.map_or_else(|| "?".into(), name)),
    Operator::Comma => e.args().iter().map(|a| render(a, interner)).collect::<Vec<_>>().join(", "),
    _ if e.op.is_binary() => {
      let sym = match e.op {
        Operator::Add => "+", Operator::Sub => "-", Operator::Mul => "*", Operator::Div => "/",
        Operator::Mod => "%", Operator::Shl => "<<", Operator::ShlMod => "~mod<<", Operator::Shr => ">>",
        Operator::BitAnd => "&", Operator::BitOr => "|", Operator::BitXor => "^",
        Operator::Lt => "<", Operator::Le => "<=", Operator::Gt => ">", Operator::Ge => ">=",
        Operator::Eq => "==", Operator::Ne => "!=",
        Operator::ModAdd => "~mod+", Operator::ModSub => "~mod-", Operator::ModMul => "~mod*",
        Operator::SatAdd => "~sat+", Operator::SatSub => "~sat-",
        _ => "?",
      };
      format!("{} {sym} {}", render(e.lhs().unwrap(), interner), render(e.rhs().unwrap(), interner))
    }
    _ => "<?>".into(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::{Arena, Span};

  fn span() -> Span { Span { file: Symbol::default(), line: 1, col: 1 } }

  #[test]
  fn invert_is_involutive_on_comparisons() {
    let arena = Arena::new();
    let x = mk_ident(&arena, Symbol::default(), span());
    let ten = mk_const(&arena, Z::from(10), span());
    let lt = mk_cmp(&arena, CmpOp::Lt, x, ten, span());
    let dn = invert(&arena, invert(&arena, lt));
    assert!(structurally_eq(lt, dn));
  }

  #[test]
  fn invert_de_morgans_and_or() {
    let arena = Arena::new();
    let x = mk_ident(&arena, Symbol::default(), span());
    let ten = mk_const(&arena, Z::from(10), span());
    let lt = mk_cmp(&arena, CmpOp::Lt, x, ten, span());
    let ge = mk_cmp(&arena, CmpOp::Ge, x, ten, span());
    let and = mk_and(&arena, smallvec![lt, ge], span());
    let inv = invert(&arena, and);
    assert_eq!(inv.op, Operator::Or);
  }

  #[test]
  fn simplify_folds_constants() {
    let arena = Arena::new();
    let a = mk_const(&arena, Z::from(2), span());
    let b = mk_const(&arena, Z::from(3), span());
    let sum = mk_binary(&arena, Operator::Add, a, b, span());
    let folded = simplify(&arena, sum);
    assert_eq!(folded.const_value(), Some(Z::from(5)));
  }

  #[test]
  fn simplify_is_idempotent() {
    let arena = Arena::new();
    let a = mk_const(&arena, Z::from(2), span());
    let b = mk_const(&arena, Z::from(3), span());
    let sum = mk_binary(&arena, Operator::Add, a, b, span());
    let once = simplify(&arena, sum);
    let twice = simplify(&arena, once);
    assert!(structurally_eq(once, twice));
  }

  #[test]
  fn structural_eq_ignores_node_identity() {
    let arena = Arena::new();
    let x1 = mk_ident(&arena, Symbol::default(), span());
    let x2 = mk_ident(&arena, Symbol::default(), span());
    assert!(!std::ptr::eq(x1, x2));
    assert!(structurally_eq(x1, x2));
  }
}
