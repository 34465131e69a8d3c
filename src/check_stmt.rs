//! The assignment checker and the statement walker: everything that isn't
//! expression-bounds computation itself -- fact maintenance across an
//! assignment, branch snapshot/restore/unify, and loop/jump discipline.

use crate::ast::{AssignOp, CmpOp, Expr, JumpKind, Operator, Proc, ProcKind, Span, Stmt, StmtKind, Ty, TypeKind, WhileAsserts};
use crate::bigint;
use crate::bounds::Bounds;
use crate::check_expr::{bcheck_expr, loc, render_ty, Ctx};
use crate::diagnostics::{CheckError, Loc};
use crate::expr_build::{invert, mk_binary, mk_cmp, mk_const, mk_ident, mk_length_call, render, simplify, structurally_eq};
use crate::facts::{Facts, Snapshot};
use crate::io_methods::mentions;
use crate::prover::prove_binary_op;
use crate::symbol::Symbol;
use crate::types::{is_numeric, type_bounds};

/// A loop the walker is currently inside, for `break`/`continue` to find
/// the asserts they discharge.
struct LoopFrame<'a> {
  label: Option<Symbol>,
  asserts: &'a WhileAsserts<'a>,
}

fn is_mutating_builtin(ctx: &Ctx<'_, '_>, method: Symbol) -> bool {
  let wk = ctx.wk;
  method == wk.poke_u8 || method == wk.poke_u16le || method == wk.poke_u32le || method == wk.poke_u64le ||
  method == wk.write_u8_fast || method == wk.write_u16le_fast || method == wk.write_u32le_fast ||
  method == wk.write_u64le_fast || method == wk.write_simple_token_fast || method == wk.write_extended_token_fast ||
  method == wk.skip_u32_fast || method == wk.undo_byte ||
  method == wk.limited_copy_u32_from_history_fast || method == wk.limited_copy_u32_from_history_8_byte_chunks_fast ||
  method == wk.store_slice64 || method == wk.store_slice128 || method == wk.store_slice256 || method == wk.store_slice512
}

/// Is `rhs` a call whose effects must be assumed to invalidate facts about
/// its receiver/arguments? Bare calls are impure unless they resolve to a
/// declared `func`; method calls are impure iff they name one of the
/// mutating I/O builtins.
fn is_impure_call<'a>(ctx: &Ctx<'a, '_>, rhs: Expr<'a>) -> bool {
  if rhs.op != Operator::Call { return false }
  match (rhs.lhs(), rhs.ident) {
    (None, Some(name)) => ctx.procs.get(&name).is_some_and(|p| p.kind != ProcKind::Func),
    (Some(_), Some(method)) => is_mutating_builtin(ctx, method),
    _ => false,
  }
}

fn is_coroutine_call<'a>(ctx: &Ctx<'a, '_>, rhs: Expr<'a>) -> bool {
  match (rhs.lhs(), rhs.ident) {
    (None, Some(name)) => ctx.procs.get(&name).is_some_and(|p| p.kind == ProcKind::Coroutine),
    _ => false,
  }
}

fn is_value_typed(ty: Ty<'_>) -> bool {
  is_numeric(ty) || matches!(&ty.kind, TypeKind::NPtr(_))
    || matches!(&ty.kind, TypeKind::Primitive(crate::ast::PrimitiveType::Status, _))
}

fn present_in<'a>(snapshot: &Snapshot<'a>, f: Expr<'a>) -> bool {
  snapshot.iter().any(|x| structurally_eq(*x, f))
}

/// Rewrite a fact `lhs ⊙ k` (`k` a literal constant) into `lhs ⊙ (k op
/// rhs)` under `lhs op= rhs`. Facts not of that shape pass through
/// unchanged; a fact whose `rhs` (the assignment's own rhs) mentions
/// `lhs` is dropped rather than risk an unsound rewrite.
fn rewrite_additive_fact<'a>(ctx: &Ctx<'a, '_>, f: Expr<'a>, l: Expr<'a>, rhs: Expr<'a>, op: Operator) -> Option<Expr<'a>> {
  let cmp = f.op.as_cmp_op()?;
  let (fl, fr) = (f.lhs()?, f.rhs()?);
  if !structurally_eq(fl, l) { return Some(f) }
  fr.const_value()?;
  if mentions(rhs, l) { return None }
  let combined = simplify(ctx.arena, mk_binary(ctx.arena, op, fr, rhs, f.span));
  Some(mk_cmp(ctx.arena, cmp, l, combined, f.span))
}

fn max_or_min_facts<'a>(ctx: &Ctx<'a, '_>, l: Expr<'a>, rhs: Expr<'a>, facts: &mut Facts<'a>) {
  if rhs.op != Operator::Call { return }
  let Some(method) = rhs.ident else { return };
  let Some(recv) = rhs.lhs() else { return };
  if !recv.mtype().is_some_and(is_numeric) { return }
  let cmp = if method == ctx.wk.max { CmpOp::Ge } else if method == ctx.wk.min { CmpOp::Le } else { return };
  for operand in std::iter::once(recv).chain(rhs.args().iter().copied()) {
    if !mentions(operand, l) {
      facts.append(mk_cmp(ctx.arena, cmp, l, operand, rhs.span));
    }
  }
}

/// The full assignment rule: bounds-vs-declared-type check, impure-call
/// invalidation, and the per-`op` fact updates.
pub fn bcheck_assignment<'a>(ctx: &Ctx<'a, '_>, lhs: Option<Expr<'a>>, op: AssignOp, rhs: Expr<'a>, facts: &mut Facts<'a>) -> Result<(), CheckError> {
  let old_facts = if is_impure_call(ctx, rhs) { Some(facts.snapshot()) } else { None };

  let l_typ = match lhs {
    Some(l) => {
      bcheck_expr(ctx, l, facts, 0)?;
      Some(l.mtype().ok_or_else(|| CheckError::Internal { detail: "assignment lhs has no MType".into() })?)
    }
    None => None,
  };

  let check_node = match op.binary_form() {
    None => rhs,
    Some(bop) => {
      let l = lhs.ok_or_else(|| CheckError::MalformedAst { detail: "compound assignment missing lhs".into() })?;
      mk_binary(ctx.arena, bop, l, rhs, rhs.span)
    }
  };
  let rhs_bounds = bcheck_expr(ctx, check_node, facts, 0)?;
  if let Some(l_ty) = l_typ {
    let tb = type_bounds(l_ty)?;
    if !tb.contains_int_range(&rhs_bounds) {
      return Err(CheckError::AssignmentOutOfBounds { at: loc(ctx, check_node), rhs: render(check_node, ctx.interner), lhs_ty: render_ty(l_ty) })
    }
  }

  if let Some(old) = old_facts {
    if is_coroutine_call(ctx, rhs) && !op.is_interrogating() {
      let args_ident = mk_ident(ctx.arena, ctx.wk.args, rhs.span);
      let this_ident = mk_ident(ctx.arena, ctx.wk.this, rhs.span);
      facts.update(|f| if mentions(f, args_ident) || mentions(f, this_ident) { None } else { Some(f) });
    }
    let mut targets: Vec<Expr<'a>> = Vec::new();
    if let Some(recv) = rhs.lhs() { targets.push(recv); }
    for &a in rhs.args() {
      if !a.mtype().is_some_and(is_value_typed) { targets.push(a); }
    }
    facts.update(|f| {
      if targets.iter().any(|t| mentions(f, *t)) && present_in(&old, f) { None } else { Some(f) }
    });
  }

  match op {
    AssignOp::Assign | AssignOp::Declare | AssignOp::Interrogate => {
      if let Some(l) = lhs {
        facts.update(|f| if mentions(f, l) { None } else { Some(f) });
        if l.mtype().is_some_and(is_numeric) && !is_impure_call(ctx, rhs) {
          facts.append(mk_cmp(ctx.arena, CmpOp::Eq, l, simplify(ctx.arena, rhs), rhs.span));
        }
        max_or_min_facts(ctx, l, rhs, facts);
        if rhs.op == Operator::Slice {
          if let (Some(i), Some(j)) = (rhs.mhs(), rhs.rhs()) {
            if let (Some(ci), Some(cj)) = (i.const_value(), j.const_value()) {
              let len_l = mk_length_call(ctx.arena, l, ctx.wk.length, l.span);
              let diff = mk_const(ctx.arena, cj - ci, rhs.span);
              facts.append(mk_cmp(ctx.arena, CmpOp::Eq, len_l, diff, rhs.span));
            }
          }
        }
      }
    }
    AssignOp::AddAssign | AssignOp::SubAssign => {
      if let Some(l) = lhs {
        let op = if op == AssignOp::AddAssign { Operator::Add } else { Operator::Sub };
        facts.update(|f| rewrite_additive_fact(ctx, f, l, rhs, op));
      }
    }
    // Mul/And/Or/Xor/Shl/ShrAssign have no dedicated rewrite rule; fall
    // back to a loose bound derived straight from the computed interval.
    _ => {
      if let (Some(l), Some(l_ty)) = (lhs, l_typ) {
        if l.mtype().is_some_and(is_numeric) && rhs.const_value().is_none() {
          let tb = type_bounds(l_ty)?;
          if rhs_bounds.lo > tb.lo { facts.append(mk_cmp(ctx.arena, CmpOp::Ge, l, mk_const(ctx.arena, rhs_bounds.lo.clone(), rhs.span), rhs.span)); }
          if rhs_bounds.hi < tb.hi { facts.append(mk_cmp(ctx.arena, CmpOp::Le, l, mk_const(ctx.arena, rhs_bounds.hi.clone(), rhs.span), rhs.span)); }
        }
      }
    }
  }

  Ok(())
}

fn stmt_loc(s: Stmt<'_>) -> Loc { Loc::new(s.span, String::new()) }

/// Discharge an assertion: a syntactic-fact or constant-`1` short-circuit,
/// then an explicit reason lemma if named, else a direct binary-op proof
/// attempt for a bare comparison.
fn bcheck_assert<'a>(ctx: &Ctx<'a, '_>, cond: Expr<'a>, reason: &Option<(Symbol, Vec<Expr<'a>>)>, facts: &mut Facts<'a>) -> Result<(), CheckError> {
  bcheck_expr(ctx, cond, facts, 0)?;
  if facts.contains(cond) { return Ok(()) }
  if cond.const_value().as_ref() == Some(&bigint::one()) {
    facts.append(simplify(ctx.arena, cond));
    return Ok(())
  }

  let proved = match reason {
    Some((reason_id, hyps)) => match ctx.reasons.discharge(*reason_id, cond, hyps, facts) {
      Some(result) => result,
      None => return Err(CheckError::NoSuchReason { at: loc(ctx, cond), reason: ctx.interner.string(*reason_id).to_owned() }),
    },
    None => match (cond.op.as_cmp_op(), cond.lhs(), cond.rhs()) {
      (Some(op), Some(l), Some(r)) => prove_binary_op(op, l, r, facts),
      _ => return Err(CheckError::MissingReason { at: loc(ctx, cond), condition: render(cond, ctx.interner) }),
    },
  };

  if proved {
    facts.append(simplify(ctx.arena, cond));
    Ok(())
  } else {
    Err(CheckError::CannotProve { at: loc(ctx, cond), condition: render(cond, ctx.interner) })
  }
}

fn discharge_list<'a>(ctx: &Ctx<'a, '_>, list: &[Expr<'a>], facts: &mut Facts<'a>) -> Result<(), CheckError> {
  for &cond in list { bcheck_assert(ctx, cond, &None, facts)?; }
  Ok(())
}

fn assume_list<'a>(ctx: &Ctx<'a, '_>, facts: &mut Facts<'a>, list: &[Expr<'a>]) {
  for &c in list { facts.append(simplify(ctx.arena, c)); }
}

/// The `if`/`else if`/`else` rule: each arm checks under the
/// accumulated negation of every earlier condition, branches that don't
/// terminate contribute a snapshot, and the post-state is the intersection
/// of those snapshots. Returns whether every reachable path through the
/// statement terminates (a missing `else` always leaves a fall-through
/// path, so it never does).
fn bcheck_if<'a>(ctx: &Ctx<'a, '_>, arms: &[(Expr<'a>, Stmt<'a>)], else_: Option<Stmt<'a>>, facts: &mut Facts<'a>, loops: &mut Vec<LoopFrame<'a>>) -> Result<bool, CheckError> {
  if arms.len() as u32 > ctx.config.max_if_arms {
    return Err(CheckError::TooManyBranches { at: arms.first().map_or_else(Loc::synthetic, |(c, _)| loc(ctx, *c)) })
  }

  let pre = facts.snapshot();
  let mut outcomes: Vec<Snapshot<'a>> = Vec::new();
  let mut neg_accum: Vec<Expr<'a>> = Vec::new();
  let mut all_terminate = true;

  for &(cond, body) in arms {
    facts.restore(pre.clone());
    for &n in &neg_accum { facts.append(n); }
    bcheck_expr(ctx, cond, facts, 0)?;
    let is_const_true = cond.const_value().as_ref() == Some(&bigint::one());
    if !is_const_true { facts.append(simplify(ctx.arena, cond)); }
    let terminal = bcheck_stmt(ctx, body, facts, loops)?;
    if !terminal { outcomes.push(facts.snapshot()); }
    all_terminate &= terminal;
    neg_accum.push(invert(ctx.arena, cond));
  }

  match else_ {
    Some(e) => {
      facts.restore(pre);
      for &n in &neg_accum { facts.append(n); }
      let terminal = bcheck_stmt(ctx, e, facts, loops)?;
      if !terminal { outcomes.push(facts.snapshot()); }
      all_terminate &= terminal;
    }
    None => all_terminate = false,
  }

  *facts = Facts::unify(&outcomes);
  Ok(all_terminate)
}

/// The `while` rule: pre/inv are proved at entry, the body is checked from
/// scratch assuming pre+inv+cond and must re-establish pre+inv, and the
/// statement afterward sees only inv+post.
fn bcheck_while<'a>(ctx: &Ctx<'a, '_>, label: Option<Symbol>, cond: Expr<'a>, asserts: &'a WhileAsserts<'a>, body: Stmt<'a>, facts: &mut Facts<'a>, loops: &mut Vec<LoopFrame<'a>>) -> Result<(), CheckError> {
  discharge_list(ctx, &asserts.pre, facts)?;
  discharge_list(ctx, &asserts.inv, facts)?;
  bcheck_expr(ctx, cond, facts, 0)?;
  let cond_always_true = cond.const_value().as_ref() == Some(&bigint::one());

  if !cond_always_true {
    let mut post_facts = Facts::new();
    assume_list(ctx, &mut post_facts, &asserts.pre);
    assume_list(ctx, &mut post_facts, &asserts.inv);
    post_facts.append(simplify(ctx.arena, invert(ctx.arena, cond)));
    discharge_list(ctx, &asserts.post, &mut post_facts)?;
  }

  let mut body_facts = Facts::new();
  assume_list(ctx, &mut body_facts, &asserts.pre);
  assume_list(ctx, &mut body_facts, &asserts.inv);
  if !cond_always_true { body_facts.append(simplify(ctx.arena, cond)); }
  loops.push(LoopFrame { label, asserts });
  let terminal = bcheck_stmt(ctx, body, &mut body_facts, loops)?;
  loops.pop();
  if !terminal {
    discharge_list(ctx, &asserts.pre, &mut body_facts)?;
    discharge_list(ctx, &asserts.inv, &mut body_facts)?;
  }

  let mut after = Facts::new();
  assume_list(ctx, &mut after, &asserts.inv);
  assume_list(ctx, &mut after, &asserts.post);
  *facts = after;
  Ok(())
}

/// The `iterate` rule: a single-pass approximation that only tracks the
/// loop variable's `length() == declaredLength` relation, not a general
/// invariant -- a deliberately simplified rule for array/slice/table
/// traversal.
fn bcheck_iterate<'a>(
  ctx: &Ctx<'a, '_>, var: Symbol, elt_ty: Ty<'a>, arr: Expr<'a>, length: Expr<'a>,
  body: Stmt<'a>, else_iterate: Option<Stmt<'a>>, facts: &mut Facts<'a>, loops: &mut Vec<LoopFrame<'a>>,
) -> Result<(), CheckError> {
  bcheck_expr(ctx, arr, facts, 0)?;
  bcheck_expr(ctx, length, facts, 0)?;

  let var_ident = mk_ident(ctx.arena, var, arr.span);
  var_ident.set_mtype(elt_ty);
  let var_length = mk_length_call(ctx.arena, var_ident, ctx.wk.length, arr.span);

  let mut iter_facts = Facts::new();
  iter_facts.append(mk_cmp(ctx.arena, CmpOp::Eq, var_length, length, arr.span));
  bcheck_stmt(ctx, body, &mut iter_facts, loops)?;

  if let Some(tail) = else_iterate {
    let mut tail_facts = Facts::new();
    tail_facts.append(mk_cmp(ctx.arena, CmpOp::Eq, var_length, length, arr.span));
    bcheck_stmt(ctx, tail, &mut tail_facts, loops)?;
  }

  *facts = Facts::new();
  Ok(())
}

fn bcheck_ret<'a>(ctx: &Ctx<'a, '_>, value: Option<Expr<'a>>, facts: &mut Facts<'a>, at: Loc) -> Result<(), CheckError> {
  let proc = ctx.current_proc;
  match value {
    None => {
      if proc.rets.is_empty() { Ok(()) } else {
        Err(CheckError::MalformedAst { detail: "ret with no value but the procedure declares a return type".into() })
      }
    }
    Some(v) => {
      bcheck_expr(ctx, v, facts, 0)?;
      let Some(ret) = proc.rets.first() else {
        return Err(CheckError::MalformedAst { detail: "ret with a value but the procedure declares no return type".into() })
      };
      let tb = type_bounds(ret.ty)?;
      let vb = v.bounds().unwrap_or_else(Bounds::ideal);
      if !tb.contains_int_range(&vb) {
        return Err(CheckError::AssignmentOutOfBounds { at, rhs: render(v, ctx.interner), lhs_ty: render_ty(ret.ty) })
      }
      Ok(())
    }
  }
}

fn bcheck_var<'a>(ctx: &Ctx<'a, '_>, name: Symbol, ty: Ty<'a>, span: Span, facts: &mut Facts<'a>) -> Result<(), CheckError> {
  type_bounds(ty)?;
  let var_ident = mk_ident(ctx.arena, name, span);
  var_ident.set_mtype(ty);
  let zero = mk_const(ctx.arena, bigint::zero(), span);
  bcheck_assignment(ctx, Some(var_ident), AssignOp::Assign, zero, facts)
}

fn bcheck_jump<'a>(ctx: &Ctx<'a, '_>, label: Option<Symbol>, kind: JumpKind, facts: &mut Facts<'a>, loops: &[LoopFrame<'a>]) -> Result<(), CheckError> {
  let frame = match label {
    Some(l) => loops.iter().rev().find(|f| f.label == Some(l)),
    None => loops.last(),
  }.ok_or_else(|| CheckError::MalformedAst { detail: "jump targets no enclosing loop".into() })?;

  match kind {
    JumpKind::Continue => {
      discharge_list(ctx, &frame.asserts.pre, facts)?;
      discharge_list(ctx, &frame.asserts.inv, facts)?;
    }
    JumpKind::Break => discharge_list(ctx, &frame.asserts.post, facts)?,
  }
  *facts = Facts::new();
  Ok(())
}

fn bcheck_iobind<'a>(ctx: &Ctx<'a, '_>, io: Expr<'a>, arg: Expr<'a>, body: Stmt<'a>, facts: &mut Facts<'a>, loops: &mut Vec<LoopFrame<'a>>) -> Result<bool, CheckError> {
  bcheck_expr(ctx, io, facts, 0)?;
  bcheck_expr(ctx, arg, facts, 0)?;
  // No invalidation: the interaction between an io-bind body and the
  // surrounding fact store is left alone, so facts flow through untouched.
  bcheck_stmt(ctx, body, facts, loops)
}

/// Walk one statement. Returns whether control can never fall through past
/// it (`ret`, `break`/`continue`, or an `if` whose every arm -- including
/// an explicit `else` -- itself terminates).
pub fn bcheck_stmt<'a>(ctx: &Ctx<'a, '_>, s: Stmt<'a>, facts: &mut Facts<'a>, loops: &mut Vec<LoopFrame<'a>>) -> Result<bool, CheckError> {
  match &s.kind {
    StmtKind::Block(stmts) => bcheck_block(ctx, stmts, facts, loops),
    StmtKind::Assert { cond, reason } => { bcheck_assert(ctx, *cond, reason, facts)?; Ok(false) }
    StmtKind::Assign { lhs, op, rhs } => { bcheck_assignment(ctx, *lhs, *op, *rhs, facts)?; Ok(false) }
    StmtKind::If { arms, else_ } => bcheck_if(ctx, arms, *else_, facts, loops),
    StmtKind::While { label, cond, asserts, body } => { bcheck_while(ctx, *label, *cond, asserts, *body, facts, loops)?; Ok(false) }
    StmtKind::Iterate { var, elt_ty, arr, length, body, else_iterate } => {
      bcheck_iterate(ctx, *var, *elt_ty, *arr, *length, *body, *else_iterate, facts, loops)?;
      Ok(false)
    }
    StmtKind::Ret { value, is_yield } => {
      bcheck_ret(ctx, *value, facts, stmt_loc(s))?;
      if *is_yield {
        let args_ident = mk_ident(ctx.arena, ctx.wk.args, s.span);
        let this_ident = mk_ident(ctx.arena, ctx.wk.this, s.span);
        facts.update(|f| if mentions(f, args_ident) || mentions(f, this_ident) { None } else { Some(f) });
        Ok(false)
      } else {
        Ok(true)
      }
    }
    StmtKind::IoBind { io, arg, body } => bcheck_iobind(ctx, *io, *arg, *body, facts, loops),
    StmtKind::Var { name, ty } => { bcheck_var(ctx, *name, *ty, s.span, facts)?; Ok(false) }
    StmtKind::Jump { label, kind } => { bcheck_jump(ctx, *label, *kind, facts, loops)?; Ok(true) }
  }
}

/// Walk a block; a statement after one that terminates is unreachable,
/// except that `IoBind`'s body terminating does not poison the statements
/// following the `io_bind` itself, since `bcheck_stmt` only reports the
/// inner body's own reachability to its direct caller.
fn bcheck_block<'a>(ctx: &Ctx<'a, '_>, stmts: &[Stmt<'a>], facts: &mut Facts<'a>, loops: &mut Vec<LoopFrame<'a>>) -> Result<bool, CheckError> {
  let mut unreachable = false;
  for &s in stmts {
    if unreachable { return Err(CheckError::UnreachableCode { at: stmt_loc(s) }) }
    unreachable = bcheck_stmt(ctx, s, facts, loops)?;
  }
  Ok(unreachable)
}

/// Entry point for checking a procedure body: a fresh, empty loop stack
/// over the top-level block.
pub fn bcheck_proc_body<'a>(ctx: &Ctx<'a, '_>, body: Stmt<'a>, facts: &mut Facts<'a>) -> Result<(), CheckError> {
  let mut loops = Vec::new();
  bcheck_stmt(ctx, body, facts, &mut loops)?;
  Ok(())
}
