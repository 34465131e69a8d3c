//! `CheckError`/`CheckReport`: the `(kind, message)` diagnostic pairs this
//! crate reports, plus whole-program batching of per-procedure results.

use crate::ast::Span;
use crate::symbol::{Interner, Symbol};
use std::fmt;
use thiserror::Error;

/// A source location plus enough rendered context to reproduce the
/// `"check: "`-prefixed diagnostic text: filename, line, and the
/// source-form of the unprovable condition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loc {
  pub span: Option<Span>,
  /// The source-form of the expression/statement the diagnostic is about,
  /// already rendered to text (see `expr_build::render`).
  pub source_text: String,
}

impl Loc {
  #[must_use] pub fn new(span: Span, source_text: impl Into<String>) -> Self {
    Loc { span: Some(span), source_text: source_text.into() }
  }

  /// For diagnostics about synthesized nodes that have no direct source
  /// span (e.g. a refinement bound folded away before this crate ever saw
  /// a location for it).
  #[must_use] pub fn synthetic() -> Self { Loc { span: None, source_text: String::new() } }
}

impl fmt::Display for Loc {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.span {
      Some(sp) => write!(f, "{}:{}", sp.line, sp.col),
      None => write!(f, "<synthetic>"),
    }
  }
}

/// The five abstract error kinds, used to group/test variants without
/// matching on the full enum.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind { CannotProve, OutOfBounds, IllegalArgument, Structural, Internal }

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
  // -- cannot-prove --
  #[error("check: {at}: cannot prove {condition}")]
  CannotProve { at: Loc, condition: String },
  #[error("check: {at}: cannot prove index {index} is in bounds for length {length}")]
  IndexOutOfBounds { at: Loc, index: String, length: String },
  #[error("check: {at}: cannot prove slice bound {bound} is in range")]
  SliceOutOfBounds { at: Loc, bound: String },
  #[error("check: {at}: cannot prove receiver is non-null before calling {method}")]
  NullReceiver { at: Loc, method: String },
  #[error("check: {at}: cannot prove I/O precondition for {method}: {detail}")]
  IoPreconditionUnproved { at: Loc, method: String, detail: String },
  #[error("check: {at}: shift amount {amount} is not provably within [0, {max}]")]
  ShiftAmountOutOfRange { at: Loc, amount: String, max: u32 },

  // -- out-of-bounds --
  #[error("check: {at}: assignment of {rhs} is out of bounds for {lhs_ty}")]
  AssignmentOutOfBounds { at: Loc, rhs: String, lhs_ty: String },
  #[error("check: {at}: expression {expr} escapes the bounds of its type {ty}")]
  ExpressionOutOfTypeBounds { at: Loc, expr: String, ty: String },
  #[error("check: refinement bounds fall outside the primitive type's intrinsic range")]
  RefinementOutOfBounds { at: Loc },

  // -- illegal-argument --
  #[error("check: {at}: shift of a non-unsigned value")]
  ShiftLhsNotUnsigned { at: Loc },
  #[error("check: {at}: division requires a proved non-negative dividend and positive divisor")]
  DivisionSignUnproved { at: Loc },
  #[error("check: {at}: modulo requires a proved non-negative dividend and positive divisor")]
  ModuloSignUnproved { at: Loc },
  #[error("check: {at}: bitwise operator requires non-negative operands")]
  NegativeBitwiseOperand { at: Loc },
  #[error("check: {at}: assertion needs an explicit reason to discharge {condition}")]
  MissingReason { at: Loc, condition: String },
  #[error("check: {at}: ~mod arithmetic is disabled by configuration")]
  ModArithDisallowed { at: Loc },

  // -- structural --
  #[error("check: {at}: unrecognized operator {op:?}")]
  UnrecognizedOperator { at: Loc, op: String },
  #[error("check: {at}: unreachable code")]
  UnreachableCode { at: Loc },
  #[error("check: {at}: expression exceeds the maximum recursion depth")]
  RecursionDepthExceeded { at: Loc },
  #[error("check: {at}: if-chain has more than 10000 arms")]
  TooManyBranches { at: Loc },
  #[error("check: malformed AST: {detail}")]
  MalformedAst { detail: String },
  #[error("check: {at}: no such reason {reason}")]
  NoSuchReason { at: Loc, reason: String },

  // -- internal --
  #[error("check: internal error: {detail}")]
  Internal { detail: String },
}

impl CheckError {
  #[must_use] pub fn kind(&self) -> ErrorKind {
    match self {
      CheckError::CannotProve { .. } | CheckError::IndexOutOfBounds { .. } |
      CheckError::SliceOutOfBounds { .. } | CheckError::NullReceiver { .. } |
      CheckError::IoPreconditionUnproved { .. } | CheckError::ShiftAmountOutOfRange { .. } =>
        ErrorKind::CannotProve,
      CheckError::AssignmentOutOfBounds { .. } | CheckError::ExpressionOutOfTypeBounds { .. } |
      CheckError::RefinementOutOfBounds { .. } => ErrorKind::OutOfBounds,
      CheckError::ShiftLhsNotUnsigned { .. } | CheckError::DivisionSignUnproved { .. } |
      CheckError::ModuloSignUnproved { .. } | CheckError::NegativeBitwiseOperand { .. } |
      CheckError::MissingReason { .. } | CheckError::ModArithDisallowed { .. } => ErrorKind::IllegalArgument,
      CheckError::UnrecognizedOperator { .. } | CheckError::UnreachableCode { .. } |
      CheckError::RecursionDepthExceeded { .. } | CheckError::TooManyBranches { .. } |
      CheckError::MalformedAst { .. } | CheckError::NoSuchReason { .. } => ErrorKind::Structural,
      CheckError::Internal { .. } => ErrorKind::Internal,
    }
  }
}

/// The outcome of checking one procedure: a full success, or the *first*
/// diagnostic encountered -- every error is fatal for the current function,
/// and the first source-text of the unprovable condition is preserved.
pub type ProcResult = Result<(), CheckError>;

/// The batched result of `check_program`: one outcome per procedure, in
/// declaration order. A failure in one procedure does not stop the others
/// from being checked.
#[derive(Default)]
pub struct CheckReport {
  outcomes: Vec<(Symbol, ProcResult)>,
}

impl CheckReport {
  #[must_use] pub fn new() -> Self { CheckReport::default() }
  pub(crate) fn push(&mut self, proc: Symbol, result: ProcResult) { self.outcomes.push((proc, result)); }

  #[must_use] pub fn is_ok(&self) -> bool { self.outcomes.iter().all(|(_, r)| r.is_ok()) }
  #[must_use] pub fn failures(&self) -> impl Iterator<Item = (Symbol, &CheckError)> {
    self.outcomes.iter().filter_map(|(p, r)| r.as_ref().err().map(|e| (*p, e)))
  }
  #[must_use] pub fn outcomes(&self) -> &[(Symbol, ProcResult)] { &self.outcomes }

  /// Render every diagnostic, grouped by procedure, with its interner so
  /// procedure names print as text rather than raw `Symbol`s.
  #[must_use] pub fn render(&self, interner: &Interner) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for (proc, result) in &self.outcomes {
      match result {
        Ok(()) => { let _ = writeln!(out, "{}: ok", interner.string(*proc)); }
        Err(e) => { let _ = writeln!(out, "{}: {e}", interner.string(*proc)); }
      }
    }
    out
  }
}
