//! I/O-buffer and CPU-arch special-case method preconditions, plus the
//! length-fact advance they perform on success.
//!
//! These are the checker's hardcoded knowledge of a handful of builtin
//! receiver methods (buffer advance, history-window copies, SIMD slice
//! loads/stores) that an ordinary function-call type check cannot express
//! through the AST's own operator/type vocabulary alone.

use crate::ast::{Arena, Expr, PrimitiveType, Ty, TypeKind};
use crate::bigint::{self, Z};
use crate::bounds::Bounds;
use crate::diagnostics::{CheckError, Loc};
use crate::expr_build::{mk_binary, mk_const, mk_length_call, simplify, structurally_eq};
use crate::facts::Facts;
use crate::prover::prove_binary_op;
use crate::symbol::Symbol;
use crate::well_known::WellKnown;

fn is_numeric_ty(ty: Ty<'_>) -> bool {
  matches!(&ty.kind, TypeKind::Primitive(p, _) if p.is_integer())
}
fn is_io_token_ty(ty: Ty<'_>) -> bool {
  matches!(&ty.kind, TypeKind::Primitive(PrimitiveType::IoToken, _))
}
fn is_cpu_arch_ty(ty: Ty<'_>) -> bool {
  matches!(&ty.kind, TypeKind::Primitive(PrimitiveType::CpuArch, _))
}
fn is_u8_slice_ty(ty: Ty<'_>) -> bool {
  matches!(&ty.kind, TypeKind::Slice(inner) if matches!(&inner.kind, TypeKind::Primitive(PrimitiveType::U8, _)))
}

/// Shrink every fact of the shape `length_expr ⊙ r` by `advance`, which may
/// itself be a constant or a symbolic expression; the rewritten `r` is
/// `simplify`d as far as it will fold. A fact that would become invalid
/// (provably negative remaining length) is dropped rather than kept stale.
fn optimize_io_method_advance<'a>(facts: &mut Facts<'a>, arena: &'a Arena<'a>, length_expr: Expr<'a>, advance: Expr<'a>) {
  facts.update(|f| {
    let cmp = f.op.as_cmp_op()?;
    let (l, r) = (f.lhs()?, f.rhs()?);
    if !structurally_eq(l, length_expr) { return Some(f) }
    let new_r = simplify(arena, mk_binary(arena, crate::ast::Operator::Sub, r, advance, f.span));
    if let Some(k) = new_r.const_value() {
      if k < bigint::zero() { return None }
    }
    Some(crate::expr_build::mk_cmp(arena, cmp, l, new_r, f.span))
  });
}

fn require(cond: bool, at: Loc, detail: impl Into<String>, method: impl Into<String>) -> Result<(), CheckError> {
  if cond { Ok(()) } else { Err(CheckError::IoPreconditionUnproved { at, method: method.into(), detail: detail.into() }) }
}

/// Attempt to resolve `recv.method(args)` as one of the builtin special
/// cases. Returns `None` if `method` does not name a recognized builtin
/// for `recv`'s type, in which case the caller falls through to ordinary
/// function-call checking.
#[allow(clippy::too_many_arguments)]
pub fn try_io_method<'a>(
  arena: &'a Arena<'a>, wk: &WellKnown, method: Symbol, recv: Expr<'a>, args: &[Expr<'a>],
  facts: &mut Facts<'a>, at: Loc,
) -> Option<Result<Bounds, CheckError>> {
  let recv_ty = recv.mtype()?;

  if is_numeric_ty(recv_ty) {
    if method == wk.low_bits || method == wk.high_bits {
      let arg = args.first()?;
      let n = match arg.const_value() {
        Some(k) => u32::try_from(k).ok(),
        None => arg.bounds().and_then(|b| u32::try_from(b.hi).ok()),
      };
      return Some(Ok(match n {
        Some(n) => Bounds::new(bigint::zero(), bigint::pow2(n) - bigint::one()).unwrap_or_else(|_| Bounds::single(bigint::zero())),
        // `n`'s own range isn't known or doesn't fit a bit count -- the result
        // width is unbounded, so report the full ideal range rather than
        // guessing a width that could be narrower than the true result.
        None => Bounds::ideal(),
      }));
    }
    if method == wk.min || method == wk.max {
      let arg = args.first()?;
      let (rb, ab) = (recv.bounds()?, arg.bounds()?);
      return Some(Ok(if method == wk.min { rb.min_with(&ab) } else { rb.max_with(&ab) }));
    }
    return None
  }

  if is_io_token_ty(recv_ty) {
    let length = mk_length_call(arena, recv, wk.length, recv.span);
    let byte_range = |bits: u32| Bounds { lo: bigint::zero(), hi: bigint::pow2(bits) - bigint::one() };

    if method == wk.peek_u8 { return Some(Ok(byte_range(8))) }
    if method == wk.peek_u16le { return Some(Ok(byte_range(16))) }
    if method == wk.peek_u32le { return Some(Ok(byte_range(32))) }
    if method == wk.peek_u64le { return Some(Ok(byte_range(64))) }
    if method == wk.poke_u8 { return Some(Ok(Bounds::bit())) }
    if method == wk.poke_u16le || method == wk.poke_u32le || method == wk.poke_u64le { return Some(Ok(Bounds::bit())) }

    if method == wk.peek_u64le_at {
      let Some(offset) = args.first() else { return Some(Err(CheckError::MalformedAst { detail: "peek_u64le_at requires an offset argument".into() })) };
      let Some(k) = offset.const_value() else {
        return Some(Err(CheckError::IoPreconditionUnproved { at, method: "peek_u64le_at".into(), detail: "offset must be constant".into() }))
      };
      let need = mk_const(arena, &k + Z::from(8), offset.span);
      let ok = prove_binary_op(crate::ast::CmpOp::Ge, length, need, facts);
      return Some(require(ok, at, "length(recv) >= offset + 8", "peek_u64le_at")
        .map(|()| Bounds::new(bigint::zero(), bigint::pow2(64) - bigint::one()).expect("64-bit range is non-empty")))
    }

    if method == wk.write_u8_fast || method == wk.write_u16le_fast ||
       method == wk.write_u32le_fast || method == wk.write_u64le_fast ||
       method == wk.write_simple_token_fast || method == wk.write_extended_token_fast {
      let advance = if method == wk.write_u8_fast { 1 }
        else if method == wk.write_u16le_fast { 2 }
        else if method == wk.write_u32le_fast { 4 }
        else if method == wk.write_u64le_fast { 8 }
        else if method == wk.write_simple_token_fast { 1 }
        else { 2 }; // write_extended_token_fast
      let need = mk_const(arena, Z::from(advance), recv.span);
      let ok = prove_binary_op(crate::ast::CmpOp::Ge, length, need, facts);
      return Some(require(ok, at, format!("length(recv) >= {advance}"), "write_*_fast").map(|()| {
        optimize_io_method_advance(facts, arena, length, need);
        Bounds::bit()
      }))
    }

    if method == wk.skip_u32_fast {
      let (Some(&actual), Some(&worst_case)) = (args.first(), args.get(1)) else {
        return Some(Err(CheckError::MalformedAst { detail: "skip_u32_fast requires (actual, worst_case)".into() }))
      };
      let ok = prove_binary_op(crate::ast::CmpOp::Le, actual, worst_case, facts);
      return Some(require(ok, at, "actual <= worst_case", "skip_u32_fast").map(|()| {
        // A constant worst_case gives the prover a concrete number to fold
        // against; short of that, fall back to advancing by the true
        // (symbolic) amount actually consumed.
        let advance = if worst_case.const_value().is_some() { worst_case } else { actual };
        optimize_io_method_advance(facts, arena, length, advance);
        Bounds::bit()
      }))
    }

    if method == wk.can_undo_byte { return Some(Ok(Bounds::bit())) }

    if method == wk.undo_byte {
      let marker = crate::expr_build::mk_call(arena,
        crate::expr_build::mk_field(arena, recv, wk.can_undo_byte, recv.span), smallvec::smallvec![], recv.span);
      let ok = facts.contains(marker);
      return Some(require(ok, at, "recv.can_undo_byte() must already be a known fact", "undo_byte").map(|()| {
        facts.update(|f| if mentions(f, recv) { None } else { Some(f) });
        Bounds::bit()
      }))
    }

    if method == wk.limited_copy_u32_from_history_fast || method == wk.limited_copy_u32_from_history_8_byte_chunks_fast {
      let chunked = method == wk.limited_copy_u32_from_history_8_byte_chunks_fast;
      let (adj, min_distance): (Z, Z) = if chunked { (Z::from(8), Z::from(8)) } else { (bigint::zero(), bigint::one()) };
      let (Some(&up_to), Some(&distance)) = (args.first(), args.get(1)) else {
        return Some(Err(CheckError::MalformedAst { detail: "limited_copy_u32_from_history*_fast requires (up_to, distance)".into() }))
      };
      let history_length = crate::expr_build::mk_call(arena,
        crate::expr_build::mk_field(arena, recv, wk.history_length, recv.span), smallvec::smallvec![], recv.span);
      let needed = if adj == bigint::zero() { up_to } else {
        crate::expr_build::mk_binary(arena, crate::ast::Operator::Add, up_to, mk_const(arena, adj, up_to.span), up_to.span)
      };
      let ok1 = prove_binary_op(crate::ast::CmpOp::Le, needed, length, facts);
      let ok2 = prove_binary_op(crate::ast::CmpOp::Ge, distance, mk_const(arena, min_distance, distance.span), facts);
      let ok3 = prove_binary_op(crate::ast::CmpOp::Le, distance, history_length, facts);
      if !(ok1 && ok2 && ok3) {
        return Some(Err(CheckError::IoPreconditionUnproved { at, method: "limited_copy_u32_from_history_fast".into(),
          detail: "up_to/distance not within the proved history window".into() }))
      }
      return Some(Ok(Bounds::bit()).map(|b| { optimize_io_method_advance(facts, arena, length, up_to); b }))
    }

    return None
  }

  if is_u8_slice_ty(recv_ty) {
    if method == wk.peek_u8 || method == wk.peek_u16le || method == wk.peek_u32le || method == wk.peek_u64le {
      let bits = if method == wk.peek_u8 { 8 } else if method == wk.peek_u16le { 16 } else if method == wk.peek_u32le { 32 } else { 64 };
      return Some(Ok(Bounds::new(bigint::zero(), bigint::pow2(bits) - bigint::one()).expect("non-empty")))
    }
    return None
  }

  if is_cpu_arch_ty(recv_ty) {
    let slice_width = |m: Symbol| -> Option<u32> {
      if m == wk.make_slice64 || m == wk.store_slice64 { Some(8) }
      else if m == wk.make_slice128 || m == wk.store_slice128 { Some(16) }
      else if m == wk.make_slice256 || m == wk.store_slice256 { Some(32) }
      else if m == wk.make_slice512 || m == wk.store_slice512 { Some(64) }
      else { None }
    };
    if let Some(bytes) = slice_width(method) {
      let Some(&slice_arg) = args.first() else {
        return Some(Err(CheckError::MalformedAst { detail: "make/store slice method requires a slice argument".into() }))
      };
      let length = mk_length_call(arena, slice_arg, wk.length, slice_arg.span);
      let need = mk_const(arena, Z::from(bytes), slice_arg.span);
      let ok = prove_binary_op(crate::ast::CmpOp::Ge, length, need, facts);
      return Some(require(ok, at, format!("length(slice) >= {bytes}"), "make/store_slice").map(|()| {
        optimize_io_method_advance(facts, arena, length, need);
        Bounds::new(bigint::zero(), bigint::zero()).expect("placeholder slice bounds")
      }))
    }
    return None
  }

  None
}

/// Does `recv` occur anywhere inside `fact`'s expression tree? Used to drop
/// facts invalidated by a mutating call or a reassignment.
pub(crate) fn mentions<'a>(fact: Expr<'a>, recv: Expr<'a>) -> bool {
  if structurally_eq(fact, recv) { return true }
  let children = [fact.lhs(), fact.mhs(), fact.rhs()];
  children.into_iter().flatten().any(|c| mentions(c, recv)) || fact.args().iter().any(|a| mentions(a, recv))
}
