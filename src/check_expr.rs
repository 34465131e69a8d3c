//! The recursive expression checker that computes, refines, and caches
//! every node's `[lo,hi]` interval.

use crate::ast::{Arena, CmpOp, Expr, Operator, Proc, Ty, TypeKind};
use crate::bigint;
use crate::bounds::{ArithError, Bounds};
use crate::config::CheckConfig;
use crate::diagnostics::{CheckError, Loc};
use crate::expr_build::{mk_const, mk_ident, mk_length_call, render, structurally_eq};
use crate::facts::Facts;
use crate::prover::prove_binary_op;
use crate::symbol::{Interner, Symbol};
use crate::types::type_bounds;
use crate::well_known::WellKnown;
use hashbrown::HashMap;

/// Everything `bcheckExpr` needs beyond the node and the live fact store:
/// the arena to synthesize helper nodes in, the pre-interned builtin
/// method names, the tunable limits, a lookup from procedure name to
/// declaration (for checking call arguments against declared parameter
/// types), and the interner (for rendering diagnostic text).
pub struct Ctx<'a, 'b> {
  pub arena: &'a Arena<'a>,
  pub wk: &'b WellKnown,
  pub config: &'b CheckConfig,
  pub procs: &'b HashMap<Symbol, &'a Proc<'a>>,
  pub interner: &'b Interner,
  pub reasons: &'b crate::prover::ReasonTable<'a>,
  /// The procedure currently being checked, for `ret`'s type check against
  /// its declared return.
  pub current_proc: &'a Proc<'a>,
}

pub(crate) fn loc<'a>(ctx: &Ctx<'a, '_>, e: Expr<'a>) -> Loc { Loc::new(e.span, render(e, ctx.interner)) }

fn arith<'a>(ctx: &Ctx<'a, '_>, e: Expr<'a>, r: Result<Bounds, ArithError>) -> Result<Bounds, CheckError> {
  r.map_err(|err| match err {
    ArithError::DivisionPreconditionUnproved => CheckError::DivisionSignUnproved { at: loc(ctx, e) },
    ArithError::ModuloPreconditionUnproved => CheckError::ModuloSignUnproved { at: loc(ctx, e) },
    ArithError::NegativeShift => CheckError::ShiftAmountOutOfRange { at: loc(ctx, e), amount: render(e, ctx.interner), max: 0 },
    ArithError::NegativeBitwiseOperand => CheckError::NegativeBitwiseOperand { at: loc(ctx, e) },
    ArithError::Empty(..) => CheckError::Internal { detail: err.to_string() },
  })
}

/// A known ordering between two *syntactic* operands, read directly off
/// the live facts (used only by `-`'s tightening rule).
fn known_order<'a>(facts: &Facts<'a>, lhs: Expr<'a>, rhs: Expr<'a>) -> Option<CmpOp> {
  facts.iter().find_map(|f| {
    let cmp = f.op.as_cmp_op()?;
    let (l, r) = (f.lhs()?, f.rhs()?);
    if structurally_eq(l, lhs) && structurally_eq(r, rhs) { return Some(cmp) }
    if structurally_eq(l, rhs) && structurally_eq(r, lhs) { return Some(cmp.swap_sides()) }
    None
  })
}

/// Recurse into every present child, to cache each one's bounds, without
/// using the result. Needed when a node already carries a `ConstValue`
/// that wasn't set by one of this crate's own `mk_const`/`simplify` calls,
/// so its children would otherwise never get their own bounds cached.
fn cache_children<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, facts: &mut Facts<'a>, depth: u32) -> Result<(), CheckError> {
  for child in [n.lhs(), n.mhs(), n.rhs()].into_iter().flatten() { bcheck_expr(ctx, child, facts, depth + 1)?; }
  for &a in n.args() { bcheck_expr(ctx, a, facts, depth + 1)?; }
  Ok(())
}

fn elem_type<'a>(ty: Ty<'a>) -> Option<Ty<'a>> {
  match &ty.kind { TypeKind::Array(t, _) | TypeKind::Slice(t) | TypeKind::Table(t) => Some(*t), _ => None }
}

/// A short human-readable name for a type, for diagnostic text (`TypeKind`
/// itself carries no `Debug` impl, since its `Ty<'a>` children would need
/// one too and that way lies infinite recursion through shared types).
pub(crate) fn render_ty(ty: Ty<'_>) -> String {
  match &ty.kind {
    TypeKind::Primitive(p, _) => format!("{p:?}"),
    TypeKind::Array(_, len) => format!("array[{len}]"),
    TypeKind::Slice(_) => "slice".to_string(),
    TypeKind::Table(_) => "table".to_string(),
    TypeKind::Ptr(_) => "ptr".to_string(),
    TypeKind::NPtr(_) => "nptr".to_string(),
    TypeKind::Func => "func".to_string(),
  }
}

fn array_length<'a>(ctx: &Ctx<'a, '_>, arr: Expr<'a>) -> Expr<'a> {
  match arr.mtype().map(|t| &t.kind) {
    Some(TypeKind::Array(_, len)) => mk_const(ctx.arena, len.clone(), arr.span),
    _ => mk_length_call(ctx.arena, arr, ctx.wk.length, arr.span),
  }
}

/// Check `arg` against `param_ty`'s declared bounds: the pure-containment
/// check shared by plain assignment and call-argument checking.
pub(crate) fn check_assignment1<'a>(ctx: &Ctx<'a, '_>, facts: &mut Facts<'a>, arg: Expr<'a>, param_ty: Ty<'a>) -> Result<(), CheckError> {
  let b = bcheck_expr(ctx, arg, facts, 0)?;
  let tb = type_bounds(param_ty)?;
  if !tb.contains_int_range(&b) {
    return Err(CheckError::AssignmentOutOfBounds { at: loc(ctx, arg), rhs: render(arg, ctx.interner), lhs_ty: render_ty(param_ty) })
  }
  Ok(())
}

fn check_call<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, facts: &mut Facts<'a>, depth: u32) -> Result<Bounds, CheckError> {
  let callee = n.lhs();
  if let Some(c) = callee { bcheck_expr(ctx, c, facts, depth + 1)?; }

  // Method-call form `recv.method(args)`: `callee` is `recv`, `n.ident`
  // names the method. Bare call `f(args)`: `callee` is `None`, `n.ident`
  // names `f`.
  if let (None, Some(name)) = (callee, n.ident) {
    if let Some(proc) = ctx.procs.get(&name) {
      for (&arg, param) in n.args().iter().zip(proc.args.iter()) {
        check_assignment1(ctx, facts, arg, param.ty)?;
      }
      for &a in n.args() { bcheck_expr(ctx, a, facts, depth + 1)?; }
      let b = proc.rets.first().map_or(Ok(Bounds::ideal()), |r| type_bounds(r.ty))?;
      return Ok(b)
    }
  }

  if let (Some(recv), Some(method)) = (callee, n.ident) {
    if matches!(recv.mtype().map(|t| &t.kind), Some(TypeKind::NPtr(_))) {
      let nullptr = mk_ident(ctx.arena, ctx.wk.nullptr, n.span);
      if !prove_binary_op(CmpOp::Ne, recv, nullptr, facts) {
        return Err(CheckError::NullReceiver { at: loc(ctx, n), method: ctx.interner.string(method).to_owned() })
      }
    }
    if let Some(result) = crate::io_methods::try_io_method(ctx.arena, ctx.wk, method, recv, n.args(), facts, loc(ctx, n)) {
      return result
    }
  }

  for &a in n.args() { bcheck_expr(ctx, a, facts, depth + 1)?; }
  n.mtype().map_or(Ok(Bounds::ideal()), type_bounds)
}

fn check_index<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, facts: &mut Facts<'a>, depth: u32) -> Result<Bounds, CheckError> {
  let arr = n.lhs().ok_or_else(|| CheckError::MalformedAst { detail: "index node missing receiver".into() })?;
  let idx = n.rhs().ok_or_else(|| CheckError::MalformedAst { detail: "index node missing index".into() })?;
  bcheck_expr(ctx, arr, facts, depth + 1)?;
  bcheck_expr(ctx, idx, facts, depth + 1)?;

  let zero = mk_const(ctx.arena, bigint::zero(), n.span);
  let length = array_length(ctx, arr);
  let lower_ok = prove_binary_op(CmpOp::Ge, idx, zero, facts);
  let upper_ok = prove_binary_op(CmpOp::Lt, idx, length, facts);
  if !(lower_ok && upper_ok) {
    return Err(CheckError::IndexOutOfBounds { at: loc(ctx, n), index: render(idx, ctx.interner), length: render(length, ctx.interner) })
  }
  let elem = arr.mtype().and_then(elem_type).ok_or_else(|| CheckError::Internal { detail: "indexed receiver has no element type".into() })?;
  type_bounds(elem)
}

fn check_slice<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, facts: &mut Facts<'a>, depth: u32) -> Result<Bounds, CheckError> {
  let arr = n.lhs().ok_or_else(|| CheckError::MalformedAst { detail: "slice node missing receiver".into() })?;
  bcheck_expr(ctx, arr, facts, depth + 1)?;
  let zero = mk_const(ctx.arena, bigint::zero(), n.span);
  let length = array_length(ctx, arr);

  let i = match n.mhs() { Some(i) => { bcheck_expr(ctx, i, facts, depth + 1)?; i } None => zero };
  let j = match n.rhs() { Some(j) => { bcheck_expr(ctx, j, facts, depth + 1)?; j } None => length };

  if n.mhs().is_some() && !prove_binary_op(CmpOp::Ge, i, zero, facts) {
    return Err(CheckError::SliceOutOfBounds { at: loc(ctx, n), bound: render(i, ctx.interner) })
  }
  if !prove_binary_op(CmpOp::Le, i, j, facts) {
    return Err(CheckError::SliceOutOfBounds { at: loc(ctx, n), bound: format!("{} <= {}", render(i, ctx.interner), render(j, ctx.interner)) })
  }
  if n.rhs().is_some() && !prove_binary_op(CmpOp::Le, j, length, facts) {
    return Err(CheckError::SliceOutOfBounds { at: loc(ctx, n), bound: render(j, ctx.interner) })
  }
  match n.mtype() {
    Some(ty) => type_bounds(ty),
    None => Ok(Bounds { lo: bigint::zero(), hi: bigint::zero() }),
  }
}

/// The RHS of `<<`/`>>` must lie in `[0, N-1]` where `N` is the bit-width
/// of LHS's primitive type, and LHS must be unsigned. Types with no fixed
/// bit-width (`ideal`, `bool`, ...) are exempt -- an unshifted `ideal`
/// literal hasn't been coerced to a concrete width yet.
fn check_shift<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, rb: &Bounds) -> Result<(), CheckError> {
  let Some(l) = n.lhs() else { return Ok(()) };
  let Some(ty) = l.mtype() else { return Ok(()) };
  let TypeKind::Primitive(p, _) = &ty.kind else { return Ok(()) };
  let Some(width) = p.bit_width() else { return Ok(()) };
  if !p.is_unsigned() {
    return Err(CheckError::ShiftLhsNotUnsigned { at: loc(ctx, n) })
  }
  if rb.hi > bigint::Z::from(width - 1) {
    let amount = n.rhs().map_or_else(|| "?".into(), |r| render(r, ctx.interner));
    return Err(CheckError::ShiftAmountOutOfRange { at: loc(ctx, n), amount, max: width - 1 })
  }
  Ok(())
}

fn binary_output<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, op: Operator, lb: Bounds, rb: Bounds, facts: &Facts<'a>) -> Result<Bounds, CheckError> {
  let ty_bounds = || -> Result<Bounds, CheckError> {
    n.mtype().map_or(Err(CheckError::Internal { detail: "~mod/~sat operator node has no MType".into() }), type_bounds)
  };
  match op {
    Operator::Add => Ok(lb.add(&rb)),
    Operator::Sub => {
      let known = n.lhs().zip(n.rhs()).and_then(|(l, r)| known_order(facts, l, r));
      Ok(lb.sub_tightened(&rb, known))
    }
    Operator::Mul => Ok(lb.mul(&rb)),
    Operator::Div => arith(ctx, n, lb.try_quo(&rb)),
    Operator::Mod => arith(ctx, n, lb.try_rem(&rb)),
    Operator::Shl => { check_shift(ctx, n, &rb)?; arith(ctx, n, lb.try_lsh(&rb)) }
    Operator::ShlMod => {
      if !ctx.config.allow_mod_arith { return Err(CheckError::ModArithDisallowed { at: loc(ctx, n) }) }
      check_shift(ctx, n, &rb)?;
      let t = ty_bounds()?; arith(ctx, n, lb.try_lsh_mod(&rb, &t.hi))
    }
    Operator::Shr => { check_shift(ctx, n, &rb)?; arith(ctx, n, lb.try_rsh(&rb)) }
    Operator::BitAnd => arith(ctx, n, lb.bitand(&rb)),
    Operator::BitOr => arith(ctx, n, lb.bitor(&rb)),
    Operator::BitXor => arith(ctx, n, lb.bitxor(&rb)),
    Operator::As => Ok(lb),
    Operator::ModAdd | Operator::ModSub | Operator::ModMul => {
      if !ctx.config.allow_mod_arith { return Err(CheckError::ModArithDisallowed { at: loc(ctx, n) }) }
      let t = ty_bounds()?;
      Ok(Bounds::mod_arith(&t.lo, &t.hi))
    }
    Operator::SatAdd => { let t = ty_bounds()?; Ok(lb.add(&rb).saturate(&t.lo, &t.hi)) }
    Operator::SatSub => { let t = ty_bounds()?; Ok(lb.sub(&rb).saturate(&t.lo, &t.hi)) }
    Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge | Operator::Eq | Operator::Ne => Ok(Bounds::bit()),
    _ => unreachable!("non-binary operator routed to binary_output"),
  }
}

/// The recursive expression checker. `depth` is the current recursion
/// depth, for the `MaxExprDepth` ceiling.
pub fn bcheck_expr<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, facts: &mut Facts<'a>, depth: u32) -> Result<Bounds, CheckError> {
  if let Some(b) = n.bounds() { return Ok(b) }
  if depth > ctx.config.max_expr_depth { return Err(CheckError::RecursionDepthExceeded { at: loc(ctx, n) }) }

  if n.op != Operator::Const {
    if let Some(cv) = n.const_value() {
      cache_children(ctx, n, facts, depth)?;
      let b = Bounds::single(cv);
      n.set_bounds(b.clone());
      return refine_and_intersect(ctx, n, facts, b);
    }
  }

  let raw = match n.op {
    Operator::Const => {
      let cv = n.const_value().ok_or_else(|| CheckError::MalformedAst { detail: "Const node without a ConstValue".into() })?;
      Bounds::single(cv)
    }
    Operator::Neg | Operator::Pos | Operator::Not => {
      let child = n.lhs().ok_or_else(|| CheckError::MalformedAst { detail: "unary node missing operand".into() })?;
      let cb = bcheck_expr(ctx, child, facts, depth + 1)?;
      match n.op { Operator::Neg => cb.neg(), Operator::Pos => cb.pos(), _ => cb.not() }
    }
    op if op.is_binary() => {
      let l = n.lhs().ok_or_else(|| CheckError::MalformedAst { detail: "binary node missing lhs".into() })?;
      let r = n.rhs().ok_or_else(|| CheckError::MalformedAst { detail: "binary node missing rhs".into() })?;
      let lb = bcheck_expr(ctx, l, facts, depth + 1)?;
      let rb = bcheck_expr(ctx, r, facts, depth + 1)?;
      binary_output(ctx, n, op, lb, rb, facts)?
    }
    op if op.is_assoc() => {
      for &a in n.args() { bcheck_expr(ctx, a, facts, depth + 1)?; }
      if n.args().is_empty() { return Err(CheckError::MalformedAst { detail: "and/or node with no operands".into() }) }
      Bounds::bit()
    }
    Operator::Ident => {
      match n.mtype() {
        Some(ty) => type_bounds(ty)?,
        None => return Err(CheckError::Internal { detail: "identifier node has no MType".into() }),
      }
    }
    Operator::Call => check_call(ctx, n, facts, depth)?,
    Operator::Index => check_index(ctx, n, facts, depth)?,
    Operator::Slice => check_slice(ctx, n, facts, depth)?,
    Operator::Field => {
      if let Some(recv) = n.lhs() { bcheck_expr(ctx, recv, facts, depth + 1)?; }
      match n.mtype() {
        Some(ty) => type_bounds(ty)?,
        None => return Err(CheckError::Internal { detail: "field-access node has no MType".into() }),
      }
    }
    Operator::Comma => {
      let mut last = Bounds::ideal();
      for &a in n.args() { last = bcheck_expr(ctx, a, facts, depth + 1)?; }
      last
    }
    _ => return Err(CheckError::UnrecognizedOperator { at: loc(ctx, n), op: format!("{:?}", n.op) }),
  };

  refine_and_intersect(ctx, n, facts, raw)
}

fn refine_and_intersect<'a>(ctx: &Ctx<'a, '_>, n: Expr<'a>, facts: &Facts<'a>, raw: Bounds) -> Result<Bounds, CheckError> {
  let refined = facts.refine(n, raw);
  let final_bounds = match n.mtype() {
    None => refined,
    Some(ty) => {
      let tb = type_bounds(ty)?;
      if !tb.contains_int_range(&refined) {
        return Err(CheckError::ExpressionOutOfTypeBounds { at: loc(ctx, n), expr: render(n, ctx.interner), ty: render_ty(ty) })
      }
      refined
    }
  };
  n.set_bounds(final_bounds.clone());
  Ok(final_bounds)
}
