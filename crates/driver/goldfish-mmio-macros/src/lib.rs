//! Proc-macro crate for the `register_block!` register DSL.
//!
//! Generates a typed view over any `goldfish_mmio::RegisterIo` backend. The
//! backend decides how an access reaches the device (volatile MMIO, an
//! emulated register file, ...); the generated view only fixes offsets,
//! widths, access modes and value types.

mod codegen;
mod parse;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use crate::parse::RegisterBlock;

/// Generates a typed register view struct.
///
/// # Syntax
///
/// ```ignore
/// register_block! {
///     /// Doc comment for the struct.
///     pub StructName {
///         /// Doc comment for the register.
///         [offset; width; access_mode] name => OptionalBitflagsType,
///     }
/// }
/// ```
///
/// - `offset`: byte offset from the start of the window (`0x04`)
/// - `width`: `u32` or `u64`
/// - `access_mode`: `ro`, `wo` or `rw`
/// - `=> Type`: optional type with `from_bits_retain` and `.bits()`
///
/// # Generated code
///
/// `StructName<I>` wrapping a backend `I: RegisterIo`, with:
/// - `new(io)`, `io()`, `into_inner()`
/// - `SPAN`: bytes needed to cover every register, and `fits()`
/// - `name(&self)` for readable registers, `set_name(&self, v)` for
///   writable ones
#[proc_macro]
pub fn register_block(input: TokenStream) -> TokenStream {
    let block = parse_macro_input!(input as RegisterBlock);
    match codegen::generate(&block) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
