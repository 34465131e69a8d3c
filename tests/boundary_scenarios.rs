//! Integration tests building whole procedures through the public AST
//! constructor API and driving them through `check_program`/`check_proc`.
//!
//! These tests verify:
//!   • Every boundary scenario in this crate's testable-properties list
//!     accepts or rejects as specified (shift ranges, conditional
//!     narrowing, slice-length propagation, impure-call fact invalidation,
//!     coroutine suspension points)
//!   • `check_program` isolates one procedure's failure from another's and
//!     still fully annotates the passing one
//!   • The `MBounds` invariant (contained in the declared type's bounds)
//!     holds on an accepted procedure's checked expressions
//!   • `invert`/`simplify`'s round-trip and idempotence properties
//!   • Re-checking an already-annotated expression returns its cached
//!     bounds rather than recomputing them

use bcheck::ast::{
  Arena, Arg, AssignOp, CmpOp, Expr, ExprNode, Operator, PrimitiveType, Proc, ProcKind, Program,
  Span, Stmt, StmtKind, StmtNode, Ty, TypeKind, TypeNode,
};
use bcheck::bigint::Z;
use bcheck::check_expr::bcheck_expr;
use bcheck::config::CheckConfig;
use bcheck::expr_build::{invert, mk_binary, mk_cmp, mk_const, mk_field, mk_ident, mk_length_call, simplify, structurally_eq};
use bcheck::facts::Facts;
use bcheck::symbol::{Interner, Symbol};
use bcheck::types::type_bounds;
use bcheck::{check_program, CheckEnv};
use hashbrown::HashMap;
use smallvec::smallvec;

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

/// A bare call `f(args)`: `lhs` is `None` and `ident` carries the callee,
/// matching `check_call`/`is_impure_call`/`is_coroutine_call`'s resolution
/// pattern. `expr_build::mk_call` instead builds a call through a value
/// (`recv.method(...)`), which wouldn't resolve through `ctx.procs`.
fn mk_bare_call<'a>(arena: &'a Arena<'a>, name: Symbol, args: smallvec::SmallVec<[Expr<'a>; 2]>, sp: Span) -> Expr<'a> {
  arena.alloc_expr(ExprNode::new(Operator::Call, Some(name), None, None, None, args, sp))
}

// Building `check_program`'s other inputs (arena/interner/env) has to happen
// alongside AST construction since everything is tied to one arena's
// lifetime, so each scenario below is a single self-contained function
// rather than a shared `build` + `run` split.

#[test]
fn shift_in_range_but_escaping_its_own_type_is_rejected() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let x = mk_ident(&arena, interner.intern("x"), span());
  x.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let shifted = mk_binary(&arena, Operator::Shl, x, mk_const(&arena, Z::from(3), span()), span());
  let y = mk_ident(&arena, interner.intern("y"), span());
  y.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let proc = proc_with(&arena, interner.intern("p"), ProcKind::Func, vec![], vec![],
    vec![assign(&arena, Some(y), AssignOp::Declare, shifted)]);
  let program = Program { procs: vec![proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(!report.is_ok(), "255 << 3 == 2040 does not fit back into u8");
}

#[test]
fn shift_in_range_accepted_into_a_wider_target() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let x = mk_ident(&arena, interner.intern("x"), span());
  x.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let shifted = mk_binary(&arena, Operator::Shl, x, mk_const(&arena, Z::from(3), span()), span());
  let y = mk_ident(&arena, interner.intern("y"), span());
  y.set_mtype(prim_ty(&arena, PrimitiveType::U16));
  let proc = proc_with(&arena, interner.intern("p"), ProcKind::Func, vec![], vec![],
    vec![assign(&arena, Some(y), AssignOp::Declare, shifted)]);
  let program = Program { procs: vec![proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(report.is_ok(), "{}", report.render(&interner));
}

#[test]
fn shift_amount_out_of_range_is_rejected() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let x = mk_ident(&arena, interner.intern("x"), span());
  x.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let shifted = mk_binary(&arena, Operator::Shl, x, mk_const(&arena, Z::from(9), span()), span());
  let y = mk_ident(&arena, interner.intern("y"), span());
  y.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let proc = proc_with(&arena, interner.intern("p"), ProcKind::Func, vec![], vec![],
    vec![assign(&arena, Some(y), AssignOp::Declare, shifted)]);
  let program = Program { procs: vec![proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(!report.is_ok());
}

#[test]
fn conditional_narrowing_discharges_the_assertion_and_installs_mbounds() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let x_sym = interner.intern("x");
  let param_ty = prim_ty(&arena, PrimitiveType::U32);
  let x1 = mk_ident(&arena, x_sym, span());
  x1.set_mtype(param_ty);
  let cond = mk_cmp(&arena, CmpOp::Lt, x1, mk_const(&arena, Z::from(10), span()), span());
  let x2 = mk_ident(&arena, x_sym, span());
  x2.set_mtype(param_ty);
  let assertion = mk_cmp(&arena, CmpOp::Lt, x2, mk_const(&arena, Z::from(20), span()), span());
  let then_body = assert_stmt(&arena, assertion);
  let proc = proc_with(&arena, interner.intern("p"), ProcKind::Func,
    vec![Arg { name: x_sym, ty: param_ty }], vec![], vec![if_stmt(&arena, cond, then_body)]);
  let program = Program { procs: vec![proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(report.is_ok(), "{}", report.render(&interner));

  // every checked node's bounds are set and contained in its declared
  // type's bounds.
  for node in [x1, x2] {
    let b = node.bounds().expect("MBounds installed on a checked node");
    let tb = type_bounds(node.mtype().unwrap()).unwrap();
    assert!(tb.contains_int_range(&b), "x's bounds must stay inside u32's range");
  }
}

#[test]
fn slice_length_propagation_mints_the_length_fact_the_assert_reads_back() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let elem = prim_ty(&arena, PrimitiveType::U8);
  let src = mk_ident(&arena, interner.intern("src"), span());
  src.set_mtype(array_ty(&arena, elem, 20));
  let slice_node = arena.alloc_expr(ExprNode::new(
    Operator::Slice, None, Some(src), Some(mk_const(&arena, Z::from(2), span())), Some(mk_const(&arena, Z::from(10), span())),
    smallvec![], span(),
  ));
  slice_node.set_mtype(slice_ty(&arena, elem));
  let s = mk_ident(&arena, interner.intern("s"), span());
  s.set_mtype(slice_ty(&arena, elem));
  let s_len = mk_length_call(&arena, s, env.wk.length, span());
  let assertion = mk_cmp(&arena, CmpOp::Eq, s_len, mk_const(&arena, Z::from(8), span()), span());
  let proc = proc_with(&arena, interner.intern("p"), ProcKind::Func, vec![], vec![],
    vec![assign(&arena, Some(s), AssignOp::Declare, slice_node), assert_stmt(&arena, assertion)]);
  let program = Program { procs: vec![proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(report.is_ok(), "{}", report.render(&interner));
}

#[test]
fn impure_call_with_no_receiver_or_arguments_preserves_unrelated_facts() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let x = mk_ident(&arena, interner.intern("x"), span());
  x.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let first = mk_cmp(&arena, CmpOp::Eq, x, mk_const(&arena, Z::from(5), span()), span());

  let helper_sym = interner.intern("do_something");
  let call = mk_bare_call(&arena, helper_sym, smallvec![], span());
  let y = mk_ident(&arena, interner.intern("y"), span());
  y.set_mtype(prim_ty(&arena, PrimitiveType::Status));

  let second = mk_cmp(&arena, CmpOp::Eq, x, mk_const(&arena, Z::from(5), span()), span());
  let helper = proc_with(&arena, helper_sym, ProcKind::Proc, vec![], vec![], vec![]);
  let main_proc = proc_with(&arena, interner.intern("p"), ProcKind::Func, vec![], vec![first],
    vec![assert_stmt(&arena, first), assign(&arena, Some(y), AssignOp::Assign, call), assert_stmt(&arena, second)]);
  let program = Program { procs: vec![helper, main_proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(report.is_ok(), "{}", report.render(&interner));
}

#[test]
fn impure_call_drops_facts_about_its_pass_by_ref_argument() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let elem = prim_ty(&arena, PrimitiveType::U8);
  let ptr_ty = arena.alloc_type(TypeNode::new(TypeKind::Ptr(elem)));
  let buf = mk_ident(&arena, interner.intern("buf"), span());
  buf.set_mtype(ptr_ty);
  let pre_cond = mk_cmp(&arena, CmpOp::Eq, mk_length_call(&arena, buf, env.wk.length, span()), mk_const(&arena, Z::from(4), span()), span());

  let helper_sym = interner.intern("consume");
  let buf_arg = mk_ident(&arena, interner.intern("buf"), span());
  buf_arg.set_mtype(ptr_ty);
  let call = mk_bare_call(&arena, helper_sym, smallvec![buf_arg], span());
  let y = mk_ident(&arena, interner.intern("y"), span());
  y.set_mtype(prim_ty(&arena, PrimitiveType::Status));

  let post_cond = mk_cmp(&arena, CmpOp::Eq, mk_length_call(&arena, buf, env.wk.length, span()), mk_const(&arena, Z::from(4), span()), span());

  let helper = proc_with(&arena, helper_sym, ProcKind::Proc, vec![Arg { name: interner.intern("b"), ty: ptr_ty }], vec![], vec![]);
  let main_proc = proc_with(&arena, interner.intern("p"), ProcKind::Func, vec![], vec![pre_cond],
    vec![assert_stmt(&arena, pre_cond), assign(&arena, Some(y), AssignOp::Assign, call), assert_stmt(&arena, post_cond)]);
  let program = Program { procs: vec![helper, main_proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(!report.is_ok(), "the post-call assert has nothing left to discharge it from buf's dropped length fact");
}

/// A non-interrogating coroutine call (`=`, not `=?`) is a suspension
/// point and drops facts mentioning `args`; the interrogating form is
/// exempt from that invalidation, so this test sticks to plain `=` to
/// match the rule it's exercising.
#[test]
fn coroutine_suspension_point_drops_facts_mentioning_args() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let args_ty = prim_ty(&arena, PrimitiveType::EmptyStruct);
  let field_sym = interner.intern("n");

  let args1 = mk_ident(&arena, env.wk.args, span());
  args1.set_mtype(args_ty);
  let field1 = mk_field(&arena, args1, field_sym, span());
  field1.set_mtype(prim_ty(&arena, PrimitiveType::U32));
  let pre_cond = mk_cmp(&arena, CmpOp::Eq, field1, mk_const(&arena, Z::from(3), span()), span());

  let coroutine_sym = interner.intern("sub_coroutine");
  let call = mk_bare_call(&arena, coroutine_sym, smallvec![], span());
  let y = mk_ident(&arena, interner.intern("y"), span());
  y.set_mtype(prim_ty(&arena, PrimitiveType::Status));

  let args2 = mk_ident(&arena, env.wk.args, span());
  args2.set_mtype(args_ty);
  let field2 = mk_field(&arena, args2, field_sym, span());
  field2.set_mtype(prim_ty(&arena, PrimitiveType::U32));
  let post_cond = mk_cmp(&arena, CmpOp::Eq, field2, mk_const(&arena, Z::from(3), span()), span());

  let coroutine_proc = proc_with(&arena, coroutine_sym, ProcKind::Coroutine, vec![], vec![], vec![]);
  let main_proc = proc_with(&arena, interner.intern("p"), ProcKind::Coroutine, vec![], vec![pre_cond],
    vec![assert_stmt(&arena, pre_cond), assign(&arena, Some(y), AssignOp::Assign, call), assert_stmt(&arena, post_cond)]);
  let program = Program { procs: vec![coroutine_proc, main_proc] };

  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);
  assert!(!report.is_ok());
}

#[test]
fn check_program_isolates_failures_and_still_checks_the_passing_procedure() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);

  let x = mk_ident(&arena, interner.intern("x"), span());
  x.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let ok_proc = proc_with(&arena, interner.intern("ok"), ProcKind::Func, vec![], vec![],
    vec![assign(&arena, Some(x), AssignOp::Declare, mk_const(&arena, Z::from(5), span()))]);

  let untyped = arena.alloc_expr(ExprNode::new(Operator::Ident, Some(interner.intern("y")), None, None, None, smallvec![], span()));
  let bad_proc = proc_with(&arena, interner.intern("bad"), ProcKind::Func, vec![], vec![], vec![assert_stmt(&arena, untyped)]);

  let program = Program { procs: vec![ok_proc, bad_proc] };
  let config = CheckConfig::default();
  let report = check_program(&arena, &program, &config, &interner, &env);

  assert!(!report.is_ok());
  assert_eq!(report.failures().count(), 1);
  assert!(x.bounds().is_some(), "ok_proc's assignment target must still be annotated");
}

#[test]
fn invert_is_involutive_on_a_comparison() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let x = mk_ident(&arena, interner.intern("x"), span());
  let e = mk_cmp(&arena, CmpOp::Lt, x, mk_const(&arena, Z::from(10), span()), span());
  let back = invert(&arena, invert(&arena, e));
  assert!(structurally_eq(back, e));
}

#[test]
fn simplify_is_idempotent_on_a_foldable_expression() {
  let arena = Arena::new();
  let e = mk_binary(&arena, Operator::Add, mk_const(&arena, Z::from(1), span()), mk_const(&arena, Z::from(1), span()), span());
  let once = simplify(&arena, e);
  let twice = simplify(&arena, once);
  assert!(structurally_eq(once, twice));
  assert_eq!(once.const_value(), Some(Z::from(2)));
}

#[test]
fn rechecking_an_annotated_expression_returns_its_cached_bounds() {
  let arena = Arena::new();
  let mut interner = Interner::new();
  let env = CheckEnv::new(&mut interner);
  let procs: HashMap<Symbol, &Proc<'_>> = HashMap::new();
  let dummy_proc = proc_with(&arena, interner.intern("p"), ProcKind::Func, vec![], vec![], vec![]);
  let config = CheckConfig::default();
  let ctx = bcheck::check_expr::Ctx {
    arena: &arena, wk: &env.wk, config: &config, procs: &procs, interner: &interner,
    reasons: &env.reasons, current_proc: &dummy_proc,
  };
  let mut facts = Facts::new();

  let x = mk_ident(&arena, interner.intern("x"), span());
  x.set_mtype(prim_ty(&arena, PrimitiveType::U8));
  let first = bcheck_expr(&ctx, x, &mut facts, 0).unwrap();
  let second = bcheck_expr(&ctx, x, &mut facts, 0).unwrap();
  assert_eq!(first, second);
  assert_eq!(x.bounds(), Some(first));
}
