//! Code generation for `register_block!`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::parse::{RegWidth, RegisterBlock, RegisterDef};

/// Generates the view struct and its accessors.
pub fn generate(block: &RegisterBlock) -> syn::Result<TokenStream> {
    let vis = &block.vis;
    let name = &block.name;
    let attrs = &block.attrs;

    let mut span = 0usize;
    let mut methods = TokenStream::new();
    for reg in &block.registers {
        let end = reg.offset_value()? + reg.width.bytes();
        span = span.max(end);
        methods.extend(generate_read(reg));
        methods.extend(generate_write(reg));
    }

    Ok(quote! {
        #(#attrs)*
        #vis struct #name<I> {
            io: I,
        }

        impl<I: ::goldfish_mmio::RegisterIo> #name<I> {
            /// Bytes a window must span to cover every register.
            #vis const SPAN: usize = #span;

            /// Wraps a register backend.
            #vis const fn new(io: I) -> Self {
                Self { io }
            }

            /// Returns the underlying backend.
            #vis fn io(&self) -> &I {
                &self.io
            }

            /// Unwraps the backend.
            #vis fn into_inner(self) -> I {
                self.io
            }

            /// Returns `true` if the backend window covers every register.
            #vis fn fits(&self) -> bool {
                ::goldfish_mmio::RegisterIo::size(&self.io) >= Self::SPAN
            }

            #methods
        }
    })
}

fn accessors(width: RegWidth) -> (proc_macro2::Ident, proc_macro2::Ident, proc_macro2::Ident) {
    match width {
        RegWidth::U32 => (
            format_ident!("read32"),
            format_ident!("write32"),
            format_ident!("u32"),
        ),
        RegWidth::U64 => (
            format_ident!("read64"),
            format_ident!("write64"),
            format_ident!("u64"),
        ),
    }
}

/// Generates the getter for a readable register.
fn generate_read(reg: &RegisterDef) -> Option<TokenStream> {
    if !reg.access.readable() {
        return None;
    }

    let name = &reg.name;
    let offset = &reg.offset;
    let attrs = &reg.attrs;
    let (read, _, raw_ty) = accessors(reg.width);

    Some(match &reg.value_type {
        Some(ty) => quote! {
            #(#attrs)*
            #[inline]
            pub fn #name(&self) -> #ty {
                #ty::from_bits_retain(::goldfish_mmio::RegisterIo::#read(&self.io, #offset))
            }
        },
        None => quote! {
            #(#attrs)*
            #[inline]
            pub fn #name(&self) -> #raw_ty {
                ::goldfish_mmio::RegisterIo::#read(&self.io, #offset)
            }
        },
    })
}

/// Generates the setter for a writable register.
fn generate_write(reg: &RegisterDef) -> Option<TokenStream> {
    if !reg.access.writable() {
        return None;
    }

    let setter = format_ident!("set_{}", reg.name);
    let offset = &reg.offset;
    let (_, write, raw_ty) = accessors(reg.width);
    let doc = format!("Writes the `{}` register.", reg.name);

    Some(match &reg.value_type {
        Some(ty) => quote! {
            #[doc = #doc]
            #[inline]
            pub fn #setter(&self, value: #ty) {
                ::goldfish_mmio::RegisterIo::#write(&self.io, #offset, value.bits());
            }
        },
        None => quote! {
            #[doc = #doc]
            #[inline]
            pub fn #setter(&self, value: #raw_ty) {
                ::goldfish_mmio::RegisterIo::#write(&self.io, #offset, value);
            }
        },
    })
}
