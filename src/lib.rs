//! `check_program`/`check_proc`: the whole-program orchestration entry
//! points this crate exposes to an embedder. Everything else is
//! re-exported for library callers that build their own AST and want to
//! drive the checker directly.

pub mod ast;
pub mod bigint;
pub mod bounds;
pub mod check_expr;
pub mod check_stmt;
pub mod config;
pub mod diagnostics;
pub mod expr_build;
pub mod facts;
pub mod io_methods;
pub mod prover;
pub mod symbol;
pub mod types;
pub mod well_known;

use ast::{Arena, Proc, Program};
use check_expr::Ctx;
use check_stmt::bcheck_proc_body;
use config::CheckConfig;
use diagnostics::CheckReport;
use facts::Facts;
use hashbrown::HashMap;
use prover::ReasonTable;
use symbol::{Interner, Symbol};
use well_known::WellKnown;

/// Everything `check_program` needs beyond the program/config themselves:
/// an interner to render diagnostics and intern reason-lemma/well-known
/// names, built once and shared across every procedure. A caller that
/// already has its own interner (from parsing) should intern its reason
/// ids and well-known names into it and build its own `WellKnown`/
/// `ReasonTable` instead of calling `check_program` directly -- `check_proc`
/// is exported exactly for that case.
pub struct CheckEnv<'b> {
  pub wk: WellKnown,
  pub reasons: ReasonTable<'b>,
}

impl<'b> CheckEnv<'b> {
  #[must_use] pub fn new(interner: &mut Interner) -> Self {
    CheckEnv { wk: WellKnown::new(interner), reasons: ReasonTable::new(interner) }
  }
}

/// Run the whole-program checker over `program`'s procedures, in
/// declaration order, collecting one outcome per procedure into a
/// [`CheckReport`]. A failure in one procedure does not stop the walk over
/// the rest.
#[tracing::instrument(level = "debug", skip_all, fields(procs = program.procs.len()))]
pub fn check_program<'a>(
  arena: &'a Arena<'a>,
  program: &'a Program<'a>,
  config: &CheckConfig,
  interner: &Interner,
  env: &CheckEnv<'a>,
) -> CheckReport {
  let procs: HashMap<Symbol, &'a Proc<'a>> = program.procs.iter().map(|p| (p.name, p)).collect();
  let mut report = CheckReport::new();
  for proc in &program.procs {
    let ctx = Ctx { arena, wk: &env.wk, config, procs: &procs, interner, reasons: &env.reasons, current_proc: proc };
    report.push(proc.name, check_proc(&ctx, proc));
  }
  report
}

/// Check a single procedure's body, seeding its fact store from the
/// procedure's declared preconditions: a fresh fact store is created per
/// function body. Exported separately from [`check_program`] for embedders
/// that already iterate their own program's declarations and want to
/// aggregate outcomes themselves.
#[tracing::instrument(level = "debug", skip_all, fields(proc = tracing::field::Empty))]
pub fn check_proc<'a>(ctx: &Ctx<'a, '_>, proc: &'a Proc<'a>) -> Result<(), diagnostics::CheckError> {
  tracing::Span::current().record("proc", ctx.interner.string(proc.name));
  let mut facts = Facts::seeded(proc.pre.iter().copied());
  let result = bcheck_proc_body(ctx, proc.body, &mut facts);
  if let Err(ref e) = result { tracing::debug!(error = %e, "procedure check failed"); }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use ast::{AssignOp, ExprNode, Operator, PrimitiveType, ProcKind, Span, StmtKind, StmtNode, TypeKind, TypeNode};
  use expr_build::{mk_const, mk_ident};
  use smallvec::smallvec;

  fn span() -> Span { Span { file: Symbol::default(), line: 1, col: 1 } }

  fn build_proc<'a>(arena: &'a Arena<'a>, interner: &mut Interner, name: &str, body_kind: StmtKind<'a>) -> Proc<'a> {
    let body = arena.alloc_stmt(StmtNode { kind: body_kind, span: span() });
    Proc { name: interner.intern(name), kind: ProcKind::Func, args: vec![], rets: vec![], pre: vec![], body, span: span() }
  }

  #[test]
  fn check_program_isolates_one_procedures_failure_from_another() {
    let arena = Arena::new();
    let mut interner = Interner::new();
    let env = CheckEnv::new(&mut interner);

    let ok_ident = mk_ident(&arena, interner.intern("x"), span());
    let u8_ty = arena.alloc_type(TypeNode::new(TypeKind::Primitive(PrimitiveType::U8, None)));
    ok_ident.set_mtype(u8_ty);
    let ok_assign = StmtKind::Assign { lhs: Some(ok_ident), op: AssignOp::Assign, rhs: mk_const(&arena, bigint::Z::from(5), span()) };
    let ok_proc = build_proc(&arena, &mut interner, "ok_proc", StmtKind::Block(vec![arena.alloc_stmt(StmtNode { kind: ok_assign, span: span() })]));

    let untyped = arena.alloc_expr(ExprNode::new(Operator::Ident, Some(interner.intern("y")), None, None, None, smallvec![], span()));
    let bad_assert = StmtKind::Assert { cond: untyped, reason: None };
    let bad_proc = build_proc(&arena, &mut interner, "bad_proc", StmtKind::Block(vec![arena.alloc_stmt(StmtNode { kind: bad_assert, span: span() })]));

    let program = Program { procs: vec![ok_proc, bad_proc] };
    let config = CheckConfig::default();
    let report = check_program(&arena, &program, &config, &interner, &env);

    assert!(!report.is_ok());
    assert_eq!(report.failures().count(), 1);
    let ok_name = interner.string(report.outcomes()[0].0).to_owned();
    assert_eq!(ok_name, "ok_proc");
    assert!(report.outcomes()[0].1.is_ok());
  }
}
