//! Parsing for the `register_block!` DSL.

use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Ident, LitInt, Token, Visibility, braced, bracketed};

/// A complete register block definition.
pub struct RegisterBlock {
    /// Attributes on the struct (docs, derives are not supported).
    pub attrs: Vec<Attribute>,
    /// Visibility of the generated struct and its constructor.
    pub vis: Visibility,
    /// Name of the generated struct.
    pub name: Ident,
    /// Registers, in declaration order.
    pub registers: Vec<RegisterDef>,
}

/// Access mode for a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn readable(self) -> bool {
        self != Self::WriteOnly
    }

    pub fn writable(self) -> bool {
        self != Self::ReadOnly
    }
}

/// Width of a register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidth {
    U32,
    U64,
}

impl RegWidth {
    /// Size of the access in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

/// A single register definition.
pub struct RegisterDef {
    pub attrs: Vec<Attribute>,
    pub offset: LitInt,
    pub width: RegWidth,
    pub access: AccessMode,
    pub name: Ident,
    pub value_type: Option<Ident>,
}

impl RegisterDef {
    /// Offset as a number, rejecting misaligned registers.
    pub fn offset_value(&self) -> syn::Result<usize> {
        let offset: usize = self.offset.base10_parse()?;
        if offset % self.width.bytes() != 0 {
            return Err(syn::Error::new(
                self.offset.span(),
                format!(
                    "register `{}` at offset {offset:#x} is not {}-byte aligned",
                    self.name,
                    self.width.bytes()
                ),
            ));
        }
        Ok(offset)
    }
}

impl Parse for RegisterBlock {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        let name: Ident = input.parse()?;

        let content;
        braced!(content in input);

        let mut registers = Vec::new();
        while !content.is_empty() {
            registers.push(content.call(parse_register)?);
        }

        if registers.is_empty() {
            return Err(syn::Error::new(
                name.span(),
                "register block must define at least one register",
            ));
        }

        Ok(Self {
            attrs,
            vis,
            name,
            registers,
        })
    }
}

/// Parses `[offset; width; mode] name => Type,`.
fn parse_register(input: ParseStream) -> syn::Result<RegisterDef> {
    let attrs = input.call(Attribute::parse_outer)?;

    let layout;
    bracketed!(layout in input);

    let offset: LitInt = layout.parse()?;
    layout.parse::<Token![;]>()?;

    let width_ident: Ident = layout.parse()?;
    let width = match width_ident.to_string().as_str() {
        "u32" => RegWidth::U32,
        "u64" => RegWidth::U64,
        _ => {
            return Err(syn::Error::new(
                width_ident.span(),
                "expected register width: u32 or u64",
            ));
        }
    };

    layout.parse::<Token![;]>()?;

    let access_ident: Ident = layout.parse()?;
    let access = match access_ident.to_string().as_str() {
        "ro" => AccessMode::ReadOnly,
        "wo" => AccessMode::WriteOnly,
        "rw" => AccessMode::ReadWrite,
        _ => {
            return Err(syn::Error::new(
                access_ident.span(),
                "expected access mode: ro, wo, or rw",
            ));
        }
    };

    let name: Ident = input.parse()?;

    let value_type = if input.peek(Token![=>]) {
        input.parse::<Token![=>]>()?;
        Some(input.parse::<Ident>()?)
    } else {
        None
    };

    if !input.is_empty() {
        input.parse::<Token![,]>()?;
    }

    Ok(RegisterDef {
        attrs,
        offset,
        width,
        access,
        name,
        value_type,
    })
}
