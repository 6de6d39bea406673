//! Procedural macros for the docmodel project.
//!
//! [`accessors!`] turns a list of declared field names into a trait of named accessors
//! implemented for `docmodel::document::Document`, so application code can write
//! `person.set_name("Ada")?` instead of `person.set("name", "Ada")?`.

#[allow(unused_extern_crates)]
extern crate self as docmodel_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Ident, Token, Type, Visibility, braced,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

struct AccessorField {
    docs: Vec<Attribute>,
    localized: bool,
    name: Ident,
    ty: Option<Type>,
}

impl Parse for AccessorField {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut docs = Vec::new();
        let mut localized = false;

        for attr in input.call(Attribute::parse_outer)? {
            if attr.path().is_ident("doc") {
                docs.push(attr);
            } else if attr.path().is_ident("localized") {
                attr.meta.require_path_only()?;
                localized = true;
            } else {
                return Err(syn::Error::new_spanned(attr, "expected `#[localized]` or a doc comment"));
            }
        }

        let name: Ident = input.parse()?;
        let ty = if input.peek(Token![:]) {
            input.parse::<Token![:]>()?;
            Some(input.parse()?)
        } else {
            None
        };

        Ok(Self { docs, localized, name, ty })
    }
}

struct AccessorsInput {
    attrs: Vec<Attribute>,
    vis: Visibility,
    ident: Ident,
    fields: Punctuated<AccessorField, Token![,]>,
}

impl Parse for AccessorsInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis = input.parse()?;
        input.parse::<Token![trait]>()?;
        let ident = input.parse()?;

        let content;
        braced!(content in input);
        let fields = content.parse_terminated(AccessorField::parse, Token![,])?;

        Ok(Self { attrs, vis, ident, fields })
    }
}

/// Generates one getter/setter signature pair and its implementation.
fn expand_field(field: &AccessorField) -> (TokenStream2, TokenStream2) {
    let AccessorField { docs, localized, name, ty } = field;
    let key = name.to_string();
    let setter = format_ident!("set_{}", name);

    let (mut signatures, mut bodies) = match ty {
        Some(ty) => (
            quote! {
                #(#docs)*
                fn #name(&mut self) -> ::docmodel::error::DocumentResult<#ty>;
                fn #setter(&mut self, value: #ty) -> ::docmodel::error::DocumentResult<()>;
            },
            quote! {
                fn #name(&mut self) -> ::docmodel::error::DocumentResult<#ty> {
                    self.read::<#ty>(#key)
                }

                fn #setter(&mut self, value: #ty) -> ::docmodel::error::DocumentResult<()> {
                    self.write(#key, &value)
                }
            },
        ),
        None => (
            quote! {
                #(#docs)*
                fn #name(&mut self) -> ::docmodel::error::DocumentResult<::docmodel::bson::Bson>;
                fn #setter(&mut self, value: impl Into<::docmodel::bson::Bson>) -> ::docmodel::error::DocumentResult<()>;
            },
            quote! {
                fn #name(&mut self) -> ::docmodel::error::DocumentResult<::docmodel::bson::Bson> {
                    self.get(#key)
                }

                fn #setter(&mut self, value: impl Into<::docmodel::bson::Bson>) -> ::docmodel::error::DocumentResult<()> {
                    self.set(#key, value)
                }
            },
        ),
    };

    if *localized {
        let translations = format_ident!("{}_translations", name);
        let set_translations = format_ident!("set_{}_translations", name);

        signatures.extend(quote! {
            fn #translations(&mut self) -> ::docmodel::error::DocumentResult<::docmodel::bson::Document>;
            fn #set_translations(&mut self, translations: ::docmodel::bson::Document) -> ::docmodel::error::DocumentResult<()>;
        });
        bodies.extend(quote! {
            fn #translations(&mut self) -> ::docmodel::error::DocumentResult<::docmodel::bson::Document> {
                self.translations(#key)
            }

            fn #set_translations(&mut self, translations: ::docmodel::bson::Document) -> ::docmodel::error::DocumentResult<()> {
                self.set_translations(#key, translations)
            }
        });
    }

    (signatures, bodies)
}

/// Declares a trait of named accessors and implements it for `Document`.
///
/// Untyped fields read and write `Bson`. Typed fields (`age: i64`) go through serde, like
/// `Document::read`/`Document::write`. Fields marked `#[localized]` also get
/// `<name>_translations` and `set_<name>_translations`.
///
/// ```ignore
/// use docmodel::accessors;
///
/// accessors! {
///     pub trait PersonAccessors {
///         name,
///         age: i64,
///         #[localized]
///         title: String,
///     }
/// }
///
/// person.set_age(36)?;
/// assert_eq!(person.age()?, 36);
/// ```
#[proc_macro]
pub fn accessors(input: TokenStream) -> TokenStream {
    let AccessorsInput { attrs, vis, ident, fields } = parse_macro_input!(input as AccessorsInput);
    let (signatures, bodies): (Vec<_>, Vec<_>) = fields.iter().map(expand_field).unzip();

    quote! {
        #(#attrs)*
        #vis trait #ident {
            #(#signatures)*
        }

        impl #ident for ::docmodel::document::Document {
            #(#bodies)*
        }
    }
    .into()
}
