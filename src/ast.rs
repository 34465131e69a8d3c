//! The AST node shapes this crate checks, and the read-only accessors over
//! them.
//!
//! Nodes are arena-allocated with a single lifetime `'a` shared by every
//! node in a program: the AST is immutable and handed to us by an upstream
//! parser/resolver, so there is no ownership story to build, only borrows.
//! The three cached annotations (`ConstValue`, `MType`, `MBounds`) are the
//! one piece of post-hoc mutable state on an otherwise immutable tree, so
//! they live behind a `RefCell` rather than forcing a rebuild of the node.

use crate::bigint::Z;
use crate::bounds::Bounds;
use crate::symbol::Symbol;
use arrayvec::ArrayVec;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;

/// A location in the original source, for diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
  pub file: Symbol,
  pub line: u32,
  pub col: u32,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Every operator/node-shape the checker dispatches on. Kept as one
/// exhaustive tagged enum (Design Notes, "Sum types for operators") so that
/// an unrecognized tag is a compile error, not a silently-ignored case.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
  /// A compile-time constant; `ident` is unused, `ConstValue` carries the value.
  Const,
  /// A bare identifier; `ident` names it.
  Ident,
  Neg, Pos, Not,
  Add, Sub, Mul, Div, Mod,
  Shl, ShlMod, Shr,
  BitAnd, BitOr, BitXor,
  Lt, Le, Gt, Ge, Eq, Ne,
  /// `lhs as T`; the target type is `MType` of this node, there is no RHS slot.
  As,
  ModAdd, ModSub, ModMul,
  SatAdd, SatSub,
  /// Associative: `args` holds >= 1 operand.
  And, Or,
  /// `lhs.ident(args)` or `ident(args)` when `lhs` is absent (a bare function call).
  Call,
  /// `lhs[rhs]`.
  Index,
  /// `lhs[mhs..rhs]`; `mhs`/`rhs` are `None` when the corresponding bound was elided.
  Slice,
  /// `lhs.ident`, a field projection.
  Field,
  /// A parenthesized comma-separated list, `args`.
  Comma,
}

/// The subset of [`Operator`] that is a binary comparison, used by the
/// prover and by the `-` tightening rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp { Lt, Le, Gt, Ge, Eq, Ne }

impl CmpOp {
  #[must_use] pub fn negate(self) -> CmpOp {
    match self {
      CmpOp::Lt => CmpOp::Ge, CmpOp::Le => CmpOp::Gt,
      CmpOp::Gt => CmpOp::Le, CmpOp::Ge => CmpOp::Lt,
      CmpOp::Eq => CmpOp::Ne, CmpOp::Ne => CmpOp::Eq,
    }
  }

  #[must_use] pub fn swap_sides(self) -> CmpOp {
    match self {
      CmpOp::Lt => CmpOp::Gt, CmpOp::Gt => CmpOp::Lt,
      CmpOp::Le => CmpOp::Ge, CmpOp::Ge => CmpOp::Le,
      CmpOp::Eq => CmpOp::Eq, CmpOp::Ne => CmpOp::Ne,
    }
  }
}

impl Operator {
  #[must_use] pub fn as_cmp_op(self) -> Option<CmpOp> {
    match self {
      Operator::Lt => Some(CmpOp::Lt), Operator::Le => Some(CmpOp::Le),
      Operator::Gt => Some(CmpOp::Gt), Operator::Ge => Some(CmpOp::Ge),
      Operator::Eq => Some(CmpOp::Eq), Operator::Ne => Some(CmpOp::Ne),
      _ => None,
    }
  }

  #[must_use] pub fn is_binary(self) -> bool {
    matches!(self,
      Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod |
      Operator::Shl | Operator::ShlMod | Operator::Shr |
      Operator::BitAnd | Operator::BitOr | Operator::BitXor |
      Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge | Operator::Eq | Operator::Ne |
      Operator::As | Operator::ModAdd | Operator::ModSub | Operator::ModMul |
      Operator::SatAdd | Operator::SatSub)
  }

  #[must_use] pub fn is_unary(self) -> bool { matches!(self, Operator::Neg | Operator::Pos | Operator::Not) }
  #[must_use] pub fn is_assoc(self) -> bool { matches!(self, Operator::And | Operator::Or) }
}

#[derive(Default)]
struct ExprCache<'a> {
  const_value: Option<Z>,
  mtype: Option<Ty<'a>>,
  bounds: Option<Bounds>,
}

/// One expression node: an operator tag, an optional identifier, up to
/// three child slots, and an argument list, plus the three cached
/// annotations. The three child slots are a fixed `ArrayVec` (LHS = slot 0,
/// MHS = slot 1, RHS = slot 2).
pub struct ExprNode<'a> {
  pub op: Operator,
  pub ident: Option<Symbol>,
  slots: ArrayVec<Option<Expr<'a>>, 3>,
  args: SmallVec<[Expr<'a>; 2]>,
  pub span: Span,
  cache: RefCell<ExprCache<'a>>,
}

pub type Expr<'a> = &'a ExprNode<'a>;

impl fmt::Debug for ExprNode<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExprNode").field("op", &self.op).field("ident", &self.ident).finish_non_exhaustive()
  }
}

impl<'a> ExprNode<'a> {
  #[must_use] pub fn new(op: Operator, ident: Option<Symbol>,
    lhs: Option<Expr<'a>>, mhs: Option<Expr<'a>>, rhs: Option<Expr<'a>>,
    args: SmallVec<[Expr<'a>; 2]>, span: Span,
  ) -> Self {
    let mut slots = ArrayVec::new();
    slots.push(lhs); slots.push(mhs); slots.push(rhs);
    ExprNode { op, ident, slots, args, span, cache: RefCell::new(ExprCache::default()) }
  }

  #[must_use] pub fn lhs(&self) -> Option<Expr<'a>> { self.slots[0] }
  #[must_use] pub fn mhs(&self) -> Option<Expr<'a>> { self.slots[1] }
  #[must_use] pub fn rhs(&self) -> Option<Expr<'a>> { self.slots[2] }
  #[must_use] pub fn args(&self) -> &[Expr<'a>] { &self.args }

  #[must_use] pub fn const_value(&self) -> Option<Z> { self.cache.borrow().const_value.clone() }
  #[must_use] pub fn mtype(&self) -> Option<Ty<'a>> { self.cache.borrow().mtype }
  #[must_use] pub fn bounds(&self) -> Option<Bounds> { self.cache.borrow().bounds.clone() }

  pub(crate) fn set_const_value(&self, v: Z) { self.cache.borrow_mut().const_value = Some(v); }
  pub(crate) fn set_mtype(&self, t: Ty<'a>) { self.cache.borrow_mut().mtype = Some(t); }
  pub(crate) fn set_bounds(&self, b: Bounds) { self.cache.borrow_mut().bounds = Some(b); }

  #[must_use] pub fn is_cached(&self) -> bool { self.cache.borrow().bounds.is_some() }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PrimitiveType { I8, I16, I32, I64, U8, U16, U32, U64, Bool, Ideal, IoToken, CpuArch, Status, EmptyStruct }

impl PrimitiveType {
  #[must_use] pub fn is_integer(self) -> bool {
    matches!(self, PrimitiveType::I8 | PrimitiveType::I16 | PrimitiveType::I32 | PrimitiveType::I64 |
      PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 | PrimitiveType::U64 | PrimitiveType::Ideal)
  }
  #[must_use] pub fn is_unsigned(self) -> bool {
    matches!(self, PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32 | PrimitiveType::U64)
  }
  #[must_use] pub fn bit_width(self) -> Option<u32> {
    match self {
      PrimitiveType::I8 | PrimitiveType::U8 => Some(8),
      PrimitiveType::I16 | PrimitiveType::U16 => Some(16),
      PrimitiveType::I32 | PrimitiveType::U32 => Some(32),
      PrimitiveType::I64 | PrimitiveType::U64 => Some(64),
      _ => None,
    }
  }
}

/// A constant-expression refinement pair `T[min..max]` narrowing a
/// primitive integer type's intrinsic range.
pub struct Refinement<'a> {
  pub min: Option<Expr<'a>>,
  pub max: Option<Expr<'a>>,
}

pub enum TypeKind<'a> {
  Primitive(PrimitiveType, Option<Refinement<'a>>),
  Array(Ty<'a>, Z),
  Slice(Ty<'a>),
  Table(Ty<'a>),
  Ptr(Ty<'a>),
  NPtr(Ty<'a>),
  Func,
}

pub struct TypeNode<'a> {
  pub kind: TypeKind<'a>,
  cache: RefCell<Option<Bounds>>,
}

pub type Ty<'a> = &'a TypeNode<'a>;

impl<'a> TypeNode<'a> {
  #[must_use] pub fn new(kind: TypeKind<'a>) -> Self { TypeNode { kind, cache: RefCell::new(None) } }
  #[must_use] pub fn cached_bounds(&self) -> Option<Bounds> { self.cache.borrow().clone() }
  pub(crate) fn set_cached_bounds(&self, b: Bounds) { *self.cache.borrow_mut() = Some(b); }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssignOp { Assign, Declare, AddAssign, SubAssign, MulAssign, AndAssign, OrAssign, XorAssign, ShlAssign, ShrAssign, Interrogate }

impl AssignOp {
  /// The underlying binary operator a compound assignment (`+=`, `&=`, ...)
  /// desugars to for bounds-checking purposes.
  #[must_use] pub fn binary_form(self) -> Option<Operator> {
    match self {
      AssignOp::AddAssign => Some(Operator::Add),
      AssignOp::SubAssign => Some(Operator::Sub),
      AssignOp::MulAssign => Some(Operator::Mul),
      AssignOp::AndAssign => Some(Operator::BitAnd),
      AssignOp::OrAssign => Some(Operator::BitOr),
      AssignOp::XorAssign => Some(Operator::BitXor),
      AssignOp::ShlAssign => Some(Operator::Shl),
      AssignOp::ShrAssign => Some(Operator::Shr),
      AssignOp::Assign | AssignOp::Declare | AssignOp::Interrogate => None,
    }
  }
  /// Is this the interrogating form `=?`, which does *not* invalidate
  /// suspension-sensitive facts?
  #[must_use] pub fn is_interrogating(self) -> bool { matches!(self, AssignOp::Interrogate) }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpKind { Break, Continue }

#[derive(Default)]
pub struct WhileAsserts<'a> {
  pub pre: Vec<Expr<'a>>,
  pub inv: Vec<Expr<'a>>,
  pub post: Vec<Expr<'a>>,
}

pub enum StmtKind<'a> {
  Block(Vec<Stmt<'a>>),
  Assert { cond: Expr<'a>, reason: Option<(Symbol, Vec<Expr<'a>>)> },
  Assign { lhs: Option<Expr<'a>>, op: AssignOp, rhs: Expr<'a> },
  If { arms: Vec<(Expr<'a>, Stmt<'a>)>, else_: Option<Stmt<'a>> },
  While { label: Option<Symbol>, cond: Expr<'a>, asserts: WhileAsserts<'a>, body: Stmt<'a> },
  Iterate {
    var: Symbol, elt_ty: Ty<'a>, arr: Expr<'a>, length: Expr<'a>,
    body: Stmt<'a>, else_iterate: Option<Stmt<'a>>,
  },
  /// `is_yield` marks a coroutine suspension point (`ret yield`): unlike a
  /// plain `ret`, it doesn't make the rest of the enclosing block
  /// unreachable -- the coroutine resumes after it.
  Ret { value: Option<Expr<'a>>, is_yield: bool },
  IoBind { io: Expr<'a>, arg: Expr<'a>, body: Stmt<'a> },
  Var { name: Symbol, ty: Ty<'a> },
  Jump { label: Option<Symbol>, kind: JumpKind },
}

pub struct StmtNode<'a> {
  pub kind: StmtKind<'a>,
  pub span: Span,
}

pub type Stmt<'a> = &'a StmtNode<'a>;

// ---------------------------------------------------------------------------
// Programs and procedures
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcKind { Func, Proc, Coroutine }

pub struct Arg<'a> {
  pub name: Symbol,
  pub ty: Ty<'a>,
}

pub struct Proc<'a> {
  pub name: Symbol,
  pub kind: ProcKind,
  pub args: Vec<Arg<'a>>,
  pub rets: Vec<Arg<'a>>,
  /// The procedure's declared preconditions, seeded into the fact store
  /// before its body is checked.
  pub pre: Vec<Expr<'a>>,
  pub body: Stmt<'a>,
  pub span: Span,
}

pub struct Program<'a> {
  pub procs: Vec<Proc<'a>>,
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Owns the backing storage for every expression/type/statement node built
/// or checked in one compilation. One arena per program, under a single
/// arena-lifetime `'a` shared by the whole translation unit.
#[derive(Default)]
pub struct Arena<'a> {
  exprs: typed_arena::Arena<ExprNode<'a>>,
  types: typed_arena::Arena<TypeNode<'a>>,
  stmts: typed_arena::Arena<StmtNode<'a>>,
}

impl<'a> Arena<'a> {
  #[must_use] pub fn new() -> Self { Arena::default() }
  pub fn alloc_expr(&'a self, node: ExprNode<'a>) -> Expr<'a> { self.exprs.alloc(node) }
  pub fn alloc_type(&'a self, node: TypeNode<'a>) -> Ty<'a> { self.types.alloc(node) }
  pub fn alloc_stmt(&'a self, node: StmtNode<'a>) -> Stmt<'a> { self.stmts.alloc(node) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cmp_op_negate_is_involutive_except_identity_swap() {
    for op in [CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge, CmpOp::Eq, CmpOp::Ne] {
      assert_eq!(op.negate().negate(), op);
    }
  }

  #[test]
  fn primitive_bit_widths() {
    assert_eq!(PrimitiveType::U8.bit_width(), Some(8));
    assert_eq!(PrimitiveType::I64.bit_width(), Some(64));
    assert_eq!(PrimitiveType::Bool.bit_width(), None);
  }
}
