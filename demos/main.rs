//! Fixture-driven demonstration binary: builds a handful of hand-rolled
//! ASTs reproducing notable boundary scenarios (narrowing, shifts, slice
//! length propagation, coroutine suspension, ...) and runs them through
//! `check_program`, printing an accept/reject verdict for each. This is a
//! convenience runner for this crate's own development and test suite, not
//! the checked language's own driver -- it never reads source text.

use bcheck::ast::{
  Arena, Arg, AssignOp, CmpOp, Expr, ExprNode, Operator, PrimitiveType, Proc, ProcKind, Program,
  Span, Stmt, StmtKind, StmtNode, Ty, TypeKind, TypeNode,
};
use bcheck::bigint::Z;
use bcheck::config::CheckConfig;
use bcheck::expr_build::{mk_binary, mk_cmp, mk_const, mk_field, mk_ident, mk_length_call};
use bcheck::symbol::{Interner, Symbol};
use bcheck::{check_program, CheckEnv};
use clap::Parser;
use smallvec::smallvec;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about = "Runs a handful of hardcoded bcheck fixtures and reports their accept/reject verdicts")]
struct Cli {
  /// Only run the fixture with this name instead of the whole suite.
  #[arg(long)]
  only: Option<String>,
  /// Path to a CheckConfig TOML file overriding the defaults for every fixture.
  #[arg(long)]
  config: Option<PathBuf>,
}

fn span() -> Span { Span { file: Symbol::default(), line: 1, col: 1 } }

fn prim_ty<'a>(arena: &'a Arena<'a>, p: PrimitiveType) -> Ty<'a> {
  arena.alloc_type(TypeNode::new(TypeKind::Primitive(p, None)))
}
fn array_ty<'a>(arena: &'a Arena<'a>, elem: Ty<'a>, len: i64) -> Ty<'a> {
  arena.alloc_type(TypeNode::new(TypeKind::Array(elem, Z::from(len))))
}
fn slice_ty<'a>(arena: &'a Arena<'a>, elem: Ty<'a>) -> Ty<'a> {
  arena.alloc_type(TypeNode::new(TypeKind::Slice(elem)))
}

fn proc_with<'a>(arena: &'a Arena<'a>, name: Symbol, kind: ProcKind, args: Vec<Arg<'a>>, pre: Vec<Expr<'a>>, stmts: Vec<Stmt<'a>>) -> Proc<'a> {
  let body = arena.alloc_stmt(StmtNode { kind: StmtKind::Block(stmts), span: span() });
  Proc { name, kind, args, rets: vec![], pre, body, span: span() }
}
fn assign<'a>(arena: &'a Arena<'a>, lhs: Option<Expr<'a>>, op: AssignOp, rhs: Expr<'a>) -> Stmt<'a> {
  arena.alloc_stmt(StmtNode { kind: StmtKind::Assign { lhs, op, rhs }, span: span() })
}
fn assert_stmt<'a>(arena: &'a Arena<'a>, cond: Expr<'a>) -> Stmt<'a> {
  arena.alloc_stmt(StmtNode { kind: StmtKind::Assert { cond, reason: None }, span: span() })
}
fn if_stmt<'a>(arena: &'a Arena<'a>, cond: Expr<'a>, then: Stmt<'a>) -> Stmt<'a> {
  arena.alloc_stmt(StmtNode { kind: StmtKind::If { arms: vec![(cond, then)], else_: None }, span: span() })
}

/// A bare call `f(args)` by name -- `lhs` is `None` and `ident` carries the
/// callee, matching `check_call`/`is_impure_call`/`is_coroutine_call`'s
/// `(None, Some(name))` resolution pattern. `mk_call` in `expr_build` builds
/// the other shape, a call through a value (`lhs` is the callee expression,
/// used for `recv.method(...)`), so it isn't the right constructor here.
fn mk_bare_call<'a>(arena: &'a Arena<'a>, name: Symbol, args: smallvec::SmallVec<[Expr<'a>; 2]>, sp: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::Call, Some(name), None, None, None, args, sp))
}

/// Boundary scenario 1, accepted half: `x << 3` widens past `u8` but fits
/// the wider `u16` target it's declared into.
fn shift_into_wider_target_accepted<'a>(arena: &'a Arena<'a>, i: &mut Interner, _env: &CheckEnv<'a>) -> Program<'a> {
  let x = mk_ident(arena, i.intern("x"), span());
  x.set_mtype(prim_ty(arena, PrimitiveType::U8));
  let shifted = mk_binary(arena, Operator::Shl, x, mk_const(arena, Z::from(3), span()), span());
  let y = mk_ident(arena, i.intern("y"), span());
  y.set_mtype(prim_ty(arena, PrimitiveType::U16));
  let proc = proc_with(arena, i.intern("shift_into_wider_target"), ProcKind::Func, vec![], vec![],
    vec![assign(arena, Some(y), AssignOp::Declare, shifted)]);
  Program { procs: vec![proc] }
}

/// Boundary scenario 1, rejected half: the same shift assigned straight
/// into its own `u8`-typed operand's width escapes `[0,255]`.
fn shift_escapes_narrow_target_rejected<'a>(arena: &'a Arena<'a>, i: &mut Interner, _env: &CheckEnv<'a>) -> Program<'a> {
  let x = mk_ident(arena, i.intern("x"), span());
  x.set_mtype(prim_ty(arena, PrimitiveType::U8));
  let shifted = mk_binary(arena, Operator::Shl, x, mk_const(arena, Z::from(3), span()), span());
  let y = mk_ident(arena, i.intern("y"), span());
  y.set_mtype(prim_ty(arena, PrimitiveType::U8));
  let proc = proc_with(arena, i.intern("shift_escapes_narrow_target"), ProcKind::Func, vec![], vec![],
    vec![assign(arena, Some(y), AssignOp::Declare, shifted)]);
  Program { procs: vec![proc] }
}

/// Boundary scenario 2: `x << 9` where `x: u8` -- shift amount outside `[0,7]`.
fn shift_amount_out_of_range_rejected<'a>(arena: &'a Arena<'a>, i: &mut Interner, _env: &CheckEnv<'a>) -> Program<'a> {
  let x = mk_ident(arena, i.intern("x"), span());
  x.set_mtype(prim_ty(arena, PrimitiveType::U8));
  let shifted = mk_binary(arena, Operator::Shl, x, mk_const(arena, Z::from(9), span()), span());
  let y = mk_ident(arena, i.intern("y"), span());
  y.set_mtype(prim_ty(arena, PrimitiveType::U8));
  let proc = proc_with(arena, i.intern("shift_amount_out_of_range"), ProcKind::Func, vec![], vec![],
    vec![assign(arena, Some(y), AssignOp::Declare, shifted)]);
  Program { procs: vec![proc] }
}

/// Boundary scenario 3: `if x < 10 { assert x < 20 }` where `x: u32` --
/// dischargeable from the branch condition plus numeric comparison.
fn conditional_narrowing_accepted<'a>(arena: &'a Arena<'a>, i: &mut Interner, _env: &CheckEnv<'a>) -> Program<'a> {
  let x_sym = i.intern("x");
  let param_ty = prim_ty(arena, PrimitiveType::U32);
  let x1 = mk_ident(arena, x_sym, span());
  x1.set_mtype(param_ty);
  let cond = mk_cmp(arena, CmpOp::Lt, x1, mk_const(arena, Z::from(10), span()), span());
  let x2 = mk_ident(arena, x_sym, span());
  x2.set_mtype(param_ty);
  let assertion = mk_cmp(arena, CmpOp::Lt, x2, mk_const(arena, Z::from(20), span()), span());
  let then_body = assert_stmt(arena, assertion);
  let proc = proc_with(arena, i.intern("conditional_narrowing"), ProcKind::Func,
    vec![Arg { name: x_sym, ty: param_ty }], vec![], vec![if_stmt(arena, cond, then_body)]);
  Program { procs: vec![proc] }
}

/// Boundary scenario 4: `s = src[2..10]; assert s.length() == 8` -- the
/// assignment mints the length fact the assertion then reads back.
fn slice_length_propagation_accepted<'a>(arena: &'a Arena<'a>, i: &mut Interner, env: &CheckEnv<'a>) -> Program<'a> {
  let elem = prim_ty(arena, PrimitiveType::U8);
  let src = mk_ident(arena, i.intern("src"), span());
  src.set_mtype(array_ty(arena, elem, 20));
  let two = mk_const(arena, Z::from(2), span());
  let ten = mk_const(arena, Z::from(10), span());
  let slice_node = arena.alloc_expr(ExprNode::new(Operator::Slice, None, Some(src), Some(two), Some(ten), smallvec![], span()));
  slice_node.set_mtype(slice_ty(arena, elem));
  let s = mk_ident(arena, i.intern("s"), span());
  s.set_mtype(slice_ty(arena, elem));
  let s_len = mk_length_call(arena, s, env.wk.length, span());
  let assertion = mk_cmp(arena, CmpOp::Eq, s_len, mk_const(arena, Z::from(8), span()), span());
  let proc = proc_with(arena, i.intern("slice_length_propagation"), ProcKind::Func, vec![], vec![],
    vec![assign(arena, Some(s), AssignOp::Declare, slice_node), assert_stmt(arena, assertion)]);
  Program { procs: vec![proc] }
}

/// Boundary scenario 5, accepted half: a bare impure call with no receiver
/// and no arguments invalidates nothing, so a fact about an unrelated
/// value-typed local survives it.
fn impure_call_preserves_unrelated_fact_accepted<'a>(arena: &'a Arena<'a>, i: &mut Interner, _env: &CheckEnv<'a>) -> Program<'a> {
  let x = mk_ident(arena, i.intern("x"), span());
  x.set_mtype(prim_ty(arena, PrimitiveType::U8));
  let five = mk_const(arena, Z::from(5), span());
  let first = mk_cmp(arena, CmpOp::Eq, x, five, span());

  let helper_sym = i.intern("do_something");
  let call = mk_bare_call(arena, helper_sym, smallvec![], span());
  let y = mk_ident(arena, i.intern("y"), span());
  y.set_mtype(prim_ty(arena, PrimitiveType::Status));

  let second = mk_cmp(arena, CmpOp::Eq, x, mk_const(arena, Z::from(5), span()), span());
  let helper = proc_with(arena, helper_sym, ProcKind::Proc, vec![], vec![], vec![]);
  let main_proc = proc_with(arena, i.intern("impure_call_preserves_unrelated_fact"), ProcKind::Func, vec![], vec![first],
    vec![assert_stmt(arena, first), assign(arena, Some(y), AssignOp::Assign, call), assert_stmt(arena, second)]);
  Program { procs: vec![helper, main_proc] }
}

/// Boundary scenario 5, rejected half: the fact mentions a pass-by-ref
/// argument of the impure call, so it's invalidated and the second assert
/// has nothing left to discharge it from.
fn impure_call_drops_fact_about_its_argument_rejected<'a>(arena: &'a Arena<'a>, i: &mut Interner, env: &CheckEnv<'a>) -> Program<'a> {
  let elem = prim_ty(arena, PrimitiveType::U8);
  let buf = mk_ident(arena, i.intern("buf"), span());
  let ptr_ty = arena.alloc_type(TypeNode::new(TypeKind::Ptr(elem)));
  buf.set_mtype(ptr_ty);
  let buf_len = mk_length_call(arena, buf, env.wk.length, span());
  let four = mk_const(arena, Z::from(4), span());
  let pre_cond = mk_cmp(arena, CmpOp::Eq, buf_len, four, span());

  let helper_sym = i.intern("consume");
  let buf_arg = mk_ident(arena, i.intern("buf"), span());
  buf_arg.set_mtype(ptr_ty);
  let call = mk_bare_call(arena, helper_sym, smallvec![buf_arg], span());
  let y = mk_ident(arena, i.intern("y"), span());
  y.set_mtype(prim_ty(arena, PrimitiveType::Status));

  let post_len = mk_length_call(arena, buf, env.wk.length, span());
  let post_cond = mk_cmp(arena, CmpOp::Eq, post_len, mk_const(arena, Z::from(4), span()), span());

  let helper = proc_with(arena, helper_sym, ProcKind::Proc, vec![Arg { name: i.intern("b"), ty: ptr_ty }], vec![], vec![]);
  let main_proc = proc_with(arena, i.intern("impure_call_drops_fact_about_its_argument"), ProcKind::Func, vec![], vec![pre_cond],
    vec![assert_stmt(arena, pre_cond), assign(arena, Some(y), AssignOp::Assign, call), assert_stmt(arena, post_cond)]);
  Program { procs: vec![helper, main_proc] }
}

/// A non-interrogating call into a coroutine is a suspension point,
/// dropping facts that mention `args`. The `=?` interrogating form is
/// exactly the form this rule exempts, so this fixture uses plain `=` to
/// demonstrate the drop.
fn coroutine_suspension_drops_args_fact_rejected<'a>(arena: &'a Arena<'a>, i: &mut Interner, env: &CheckEnv<'a>) -> Program<'a> {
  let args_ty = prim_ty(arena, PrimitiveType::EmptyStruct);
  let field_sym = i.intern("n");
  let three = mk_const(arena, Z::from(3), span());

  let args1 = mk_ident(arena, env.wk.args, span());
  args1.set_mtype(args_ty);
  let field1 = mk_field(arena, args1, field_sym, span());
  field1.set_mtype(prim_ty(arena, PrimitiveType::U32));
  let pre_cond = mk_cmp(arena, CmpOp::Eq, field1, three, span());

  let coroutine_sym = i.intern("sub_coroutine");
  let call = mk_bare_call(arena, coroutine_sym, smallvec![], span());
  let y = mk_ident(arena, i.intern("y"), span());
  y.set_mtype(prim_ty(arena, PrimitiveType::Status));

  let args2 = mk_ident(arena, env.wk.args, span());
  args2.set_mtype(args_ty);
  let field2 = mk_field(arena, args2, field_sym, span());
  field2.set_mtype(prim_ty(arena, PrimitiveType::U32));
  let post_cond = mk_cmp(arena, CmpOp::Eq, field2, mk_const(arena, Z::from(3), span()), span());

  let coroutine_proc = proc_with(arena, coroutine_sym, ProcKind::Coroutine, vec![], vec![], vec![]);
  let main_proc = proc_with(arena, i.intern("coroutine_suspension_drops_args_fact"), ProcKind::Coroutine, vec![], vec![pre_cond],
    vec![assert_stmt(arena, pre_cond), assign(arena, Some(y), AssignOp::Assign, call), assert_stmt(arena, post_cond)]);
  Program { procs: vec![coroutine_proc, main_proc] }
}

type FixtureFn = for<'a> fn(&'a Arena<'a>, &mut Interner, &CheckEnv<'a>) -> Program<'a>;

const FIXTURES: &[(&str, bool, FixtureFn)] = &[
  ("shift_into_wider_target", true, shift_into_wider_target_accepted),
  ("shift_escapes_narrow_target", false, shift_escapes_narrow_target_rejected),
  ("shift_amount_out_of_range", false, shift_amount_out_of_range_rejected),
  ("conditional_narrowing", true, conditional_narrowing_accepted),
  ("slice_length_propagation", true, slice_length_propagation_accepted),
  ("impure_call_preserves_unrelated_fact", true, impure_call_preserves_unrelated_fact_accepted),
  ("impure_call_drops_fact_about_its_argument", false, impure_call_drops_fact_about_its_argument_rejected),
  ("coroutine_suspension_drops_args_fact", false, coroutine_suspension_drops_args_fact_rejected),
];

fn load_config(path: Option<&PathBuf>) -> CheckConfig {
  match path {
    None => CheckConfig::default(),
    Some(p) => {
      let text = std::fs::read_to_string(p).unwrap_or_else(|e| panic!("reading {}: {e}", p.display()));
      toml::from_str(&text).unwrap_or_else(|e| panic!("parsing {}: {e}", p.display()))
    }
  }
}

fn run_fixture(name: &str, expect_ok: bool, build: FixtureFn, config: &CheckConfig) -> bool {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);
  let program = build(&arena, &mut interner, &env);
  let report = check_program(&arena, &program, config, &interner, &env);
  let actual_ok = report.is_ok();
  let verdict = if actual_ok { "accept" } else { "reject" };
  let matched = actual_ok == expect_ok;
  println!("{name}: {verdict} [{}]", if matched { "ok" } else { "MISMATCH" });
  if !actual_ok {
    print!("{}", report.render(&interner));
  }
  matched
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  let config = load_config(cli.config.as_ref());

  let selected: Vec<_> = match &cli.only {
    Some(name) => FIXTURES.iter().filter(|(n, ..)| n == name).collect(),
    None => FIXTURES.iter().collect(),
  };
  if selected.is_empty() {
    eprintln!("no fixture named {:?}", cli.only.unwrap_or_default());
    return ExitCode::FAILURE;
  }

  let mut all_matched = true;
  for &(name, expect_ok, build) in &selected {
    all_matched &= run_fixture(name, expect_ok, build, &config);
  }
  if all_matched { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
