//! Exercises the compiled `bcheck-demo` binary end to end: runs it as a
//! subprocess and checks that every fixture's actual verdict matched its
//! expected one.

use std::process::Command;

#[test]
fn demo_binary_reproduces_every_boundary_scenario_verdict() {
  let exe = env!("CARGO_BIN_EXE_bcheck-demo");
  let output = Command::new(exe).output().expect("running bcheck-demo");
  let stdout = String::from_utf8(output.stdout).expect("bcheck-demo stdout is UTF-8");

  assert!(!stdout.contains("MISMATCH"), "a fixture's actual verdict diverged from its expected one:\n{stdout}");
  assert!(output.status.success(), "bcheck-demo exited non-zero:\n{stdout}");

  for fixture in [
    "shift_into_wider_target",
    "shift_escapes_narrow_target",
    "shift_amount_out_of_range",
    "conditional_narrowing",
    "slice_length_propagation",
    "impure_call_preserves_unrelated_fact",
    "impure_call_drops_fact_about_its_argument",
    "coroutine_suspension_drops_args_fact",
  ] {
    assert!(stdout.contains(fixture), "missing fixture output for {fixture}:\n{stdout}");
  }
}

#[test]
fn demo_binary_only_flag_runs_a_single_named_fixture() {
  let exe = env!("CARGO_BIN_EXE_bcheck-demo");
  let output = Command::new(exe).args(["--only", "conditional_narrowing"]).output().expect("running bcheck-demo --only");
  let stdout = String::from_utf8(output.stdout).expect("bcheck-demo stdout is UTF-8");

  assert!(output.status.success());
  assert!(stdout.contains("conditional_narrowing: accept"));
  assert!(!stdout.contains("shift_into_wider_target"));
}

#[test]
fn demo_binary_rejects_an_unknown_fixture_name() {
  let exe = env!("CARGO_BIN_EXE_bcheck-demo");
  let output = Command::new(exe).args(["--only", "no_such_fixture"]).output().expect("running bcheck-demo --only");
  assert!(!output.status.success());
}
