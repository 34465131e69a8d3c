//! Type-bounds lookup: the intrinsic range of every primitive type,
//! decorator placeholder ranges, and refinement intersection.

use crate::ast::{PrimitiveType, Ty, TypeKind};
use crate::bigint::{self, Z};
use crate::bounds::Bounds;
use crate::diagnostics::{CheckError, Loc};

/// `iN = [-2^(N-1), 2^(N-1)-1]`, `uN = [0, 2^N-1]`, and the handful of
/// fixed-range primitives that round out the type system.
#[must_use] pub fn primitive_intrinsic_bounds(p: PrimitiveType) -> Bounds {
  match p {
    PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 | PrimitiveType::I64 => {
      let n = p.bit_width().expect("signed int has a bit width");
      Bounds { lo: -bigint::pow2(n - 1), hi: bigint::pow2(n - 1) - bigint::one() }
    }
    PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 | PrimitiveType::U64 => {
      let n = p.bit_width().expect("unsigned int has a bit width");
      Bounds { lo: bigint::zero(), hi: bigint::pow2(n) - bigint::one() }
    }
    PrimitiveType::Bool => Bounds::bit(),
    PrimitiveType::Ideal => Bounds::ideal(),
    // I/O token, CPU-arch token, status, and the empty struct are not
    // numeric; they get a placeholder range, same as array/slice/table,
    // so every node still has some `MBounds`.
    PrimitiveType::IoToken | PrimitiveType::CpuArch | PrimitiveType::Status | PrimitiveType::EmptyStruct =>
      Bounds { lo: bigint::zero(), hi: bigint::zero() },
  }
}

/// Compute (and cache) the bounds of a type expression, recursing into
/// decorators and intersecting refinements. Refinement bound expressions
/// are assumed to already be constant-folded (`ConstValue` set) by the
/// upstream type-checking collaborator -- this crate does not itself fold
/// constants inside type expressions, only inside the value-expression AST
/// it walks (see `expr_build::simplify`).
pub fn type_bounds<'a>(ty: Ty<'a>) -> Result<Bounds, CheckError> {
  if let Some(b) = ty.cached_bounds() { return Ok(b) }
  let b = match &ty.kind {
    TypeKind::Primitive(p, refinement) => {
      let intrinsic = primitive_intrinsic_bounds(*p);
      match refinement {
        None => intrinsic,
        Some(r) => {
          let mut lo = intrinsic.lo.clone();
          let mut hi = intrinsic.hi.clone();
          if let Some(min_expr) = r.min {
            let k = const_value_or_internal(min_expr)?;
            lo = lo.max(k);
          }
          if let Some(max_expr) = r.max {
            let k = const_value_or_internal(max_expr)?;
            hi = hi.min(k);
          }
          if lo < intrinsic.lo || hi > intrinsic.hi || lo > hi {
            return Err(CheckError::RefinementOutOfBounds { at: Loc::synthetic() })
          }
          Bounds { lo, hi }
        }
      }
    }
    // Placeholder ranges for non-numeric decorated types; real length
    // comes from a `.length()` method call, not from `MBounds`.
    TypeKind::Array(..) | TypeKind::Slice(_) | TypeKind::Table(_) =>
      Bounds { lo: bigint::zero(), hi: bigint::zero() },
    TypeKind::Ptr(_) => Bounds::single(bigint::one()),
    TypeKind::NPtr(_) => Bounds::bit(),
    TypeKind::Func => Bounds::single(bigint::one()),
  };
  ty.set_cached_bounds(b.clone());
  Ok(b)
}

fn const_value_or_internal(e: crate::ast::Expr<'_>) -> Result<Z, CheckError> {
  e.const_value().ok_or(CheckError::Internal { detail: "refinement bound is not a constant expression".into() })
}

/// Is this type's bounds numeric (i.e. does `type_bounds` return an
/// interval that participates in arithmetic)? Used to decide whether a
/// variable is eligible for the numeric fact-maintenance rules on
/// assignment.
#[must_use] pub fn is_numeric(ty: Ty<'_>) -> bool {
  matches!(&ty.kind, TypeKind::Primitive(p, _) if p.is_integer() || matches!(p, PrimitiveType::Bool))
}

#[must_use] pub fn is_nullable_pointer(ty: Ty<'_>) -> bool { matches!(&ty.kind, TypeKind::NPtr(_)) }
