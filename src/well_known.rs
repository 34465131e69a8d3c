//! Pre-interned identifiers the checker needs to recognize by name:
//! `args`/`this` (suspension-sensitive receivers), `length`/`max`/`min`
//! (builtin method names with special-cased fact maintenance), and the
//! I/O method family names dispatched in `io_methods.rs`.

use crate::symbol::{Interner, Symbol};

macro_rules! well_known {
  ($($field:ident => $text:literal),* $(,)?) => {
    pub struct WellKnown {
      $(pub $field: Symbol,)*
    }
    impl WellKnown {
      #[must_use] pub fn new(i: &mut Interner) -> Self {
        WellKnown { $($field: i.intern($text),)* }
      }
    }
  }
}

well_known! {
  args => "args",
  this => "this",
  length => "length",
  max => "max",
  min => "min",
  nullptr => "nullptr",
  is_error => "is_error",
  low_bits => "low_bits",
  high_bits => "high_bits",
  peek_u8 => "peek_u8",
  peek_u16le => "peek_u16le",
  peek_u32le => "peek_u32le",
  peek_u64le => "peek_u64le",
  peek_u64le_at => "peek_u64le_at",
  poke_u8 => "poke_u8",
  poke_u16le => "poke_u16le",
  poke_u32le => "poke_u32le",
  poke_u64le => "poke_u64le",
  write_u8_fast => "write_u8_fast",
  write_u16le_fast => "write_u16le_fast",
  write_u32le_fast => "write_u32le_fast",
  write_u64le_fast => "write_u64le_fast",
  write_simple_token_fast => "write_simple_token_fast",
  write_extended_token_fast => "write_extended_token_fast",
  skip_u32_fast => "skip_u32_fast",
  can_undo_byte => "can_undo_byte",
  undo_byte => "undo_byte",
  limited_copy_u32_from_history_fast => "limited_copy_u32_from_history_fast",
  limited_copy_u32_from_history_8_byte_chunks_fast => "limited_copy_u32_from_history_8_byte_chunks_fast",
  history_length => "history_length",
  make_slice64 => "make_slice64",
  make_slice128 => "make_slice128",
  make_slice256 => "make_slice256",
  make_slice512 => "make_slice512",
  store_slice64 => "store_slice64",
  store_slice128 => "store_slice128",
  store_slice256 => "store_slice256",
  store_slice512 => "store_slice512",
}
