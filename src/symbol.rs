//! A minimal string interner.
//!
//! Identifiers normally arrive pre-interned from an upstream lexer/parser;
//! this crate carries a small interner of its own with the same shape
//! (`insert(string) -> ident`, `string(ident) -> &str`) for the constructor
//! code that synthesizes fresh identifiers (e.g. a synthetic `a.length()`
//! call, or a freshly built `lhs == rhs` fact).

use bumpalo::Bump;
use hashbrown::HashMap;
use std::fmt;

/// An interned identifier. Cheap to copy, hash, and compare. The default
/// value is only meaningful as a placeholder for synthetic/test spans that
/// carry no real interned text.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl fmt::Debug for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Symbol({})", self.0) }
}

/// Owns the backing storage for every interned string. Strings are bump
/// allocated so that `Interner::string` can hand out `&str`s whose lifetime
/// matches the interner itself, without per-symbol heap allocations.
pub struct Interner {
  arena: Bump,
  map: HashMap<&'static str, Symbol>,
  strings: Vec<&'static str>,
}

impl Default for Interner {
  fn default() -> Self { Self::new() }
}

impl Interner {
  #[must_use] pub fn new() -> Self {
    Interner { arena: Bump::new(), map: HashMap::new(), strings: Vec::new() }
  }

  /// Intern `s`, returning its `Symbol`. Idempotent: interning the same
  /// string twice returns the same `Symbol`.
  pub fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&sym) = self.map.get(s) { return sym }
    // Safety-free: `alloc_str` returns a `&mut str` borrowed from `self.arena`,
    // which we keep alive for the lifetime of `self`, so extending it to
    // `'static` here is sound as long as nobody observes it past `self`'s drop.
    let allocated: &str = self.arena.alloc_str(s);
    let allocated: &'static str = unsafe { std::mem::transmute(allocated) };
    let sym = Symbol(u32::try_from(self.strings.len()).expect("too many interned symbols"));
    self.strings.push(allocated);
    self.map.insert(allocated, sym);
    sym
  }

  /// Look up the text of a previously interned symbol.
  #[must_use] pub fn string(&self, sym: Symbol) -> &str { self.strings[sym.0 as usize] }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_idempotent() {
    let mut i = Interner::new();
    let a = i.intern("recv");
    let b = i.intern("recv");
    let c = i.intern("args");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(i.string(a), "recv");
    assert_eq!(i.string(c), "args");
  }
}
