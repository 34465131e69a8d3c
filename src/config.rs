//! `CheckConfig`: the handful of checker tunables (recursion ceilings,
//! arm limits, modular-arithmetic opt-in), exposed as a serde/toml-loadable
//! struct so a driver can override them without a rebuild.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
  /// Recursion-depth ceiling for `bcheck_expr`. Exceeding it is a
  /// `CheckError::RecursionDepthExceeded`.
  pub max_expr_depth: u32,
  /// Hard ceiling on the number of arms in one `if`/`else if` chain.
  /// Exceeding it is a `CheckError::TooManyBranches`.
  pub max_if_arms: u32,
  /// Whether `~mod` (wraparound) arithmetic operators are permitted at
  /// all in the checked program. Some embedders disable them entirely to
  /// force `~sat` or proved-in-range arithmetic everywhere.
  pub allow_mod_arith: bool,
}

impl Default for CheckConfig {
  fn default() -> Self {
    CheckConfig { max_expr_depth: 256, max_if_arms: 10_000, allow_mod_arith: true }
  }
}
