//! Procedural macros for dbvc
//!
//! This crate provides the `Model` derive, which describes a struct as a
//! table to the dbvc query builder.

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{
    parse_macro_input, Data, DataStruct, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type,
};

/// Derive `dbvc::query::Model` for a struct with named fields.
///
/// ```ignore
/// #[derive(Model)]
/// #[model(table = "Users")]
/// struct User {
///     #[model(column = "UserID", primary_key)]
///     id: i64,
///     #[model(column = "Email")]
///     email: String,
///     #[model(skip)]
///     cached: bool,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_model(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct ModelColumn {
    name: String,
    tag: Ident,
}

fn expand_model(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut table = name.to_string();
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = value.value();
                Ok(())
            } else {
                Err(meta.error("expected `table = \"...\"`"))
            }
        })?;
    }

    let fields = match &input.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Model can only be derived for structs with named fields",
            ))
        }
    };

    let mut columns = Vec::new();
    let mut primary_key: Option<String> = None;
    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let mut column = ident.to_string();
        let mut is_primary = false;
        let mut skip = false;

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("model")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column") {
                    let value: LitStr = meta.value()?.parse()?;
                    column = value.value();
                } else if meta.path.is_ident("primary_key") {
                    is_primary = true;
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else {
                    return Err(meta.error("expected `column = \"...\"`, `primary_key` or `skip`"));
                }
                Ok(())
            })?;
        }

        if skip {
            continue;
        }
        if is_primary {
            if primary_key.is_some() {
                return Err(syn::Error::new_spanned(ident, "only one field may be the primary key"));
            }
            primary_key = Some(column.clone());
        }
        columns.push(ModelColumn {
            name: column,
            tag: type_tag(&field.ty),
        });
    }

    let primary_key = primary_key
        .or_else(|| columns.iter().find(|c| c.name == "id").map(|c| c.name.clone()))
        .unwrap_or_default();
    let column_names: Vec<&String> = columns.iter().map(|c| &c.name).collect();
    let arms = columns.iter().map(|c| {
        let column = &c.name;
        let tag = &c.tag;
        quote! { #column => ::core::option::Option::Some(::dbvc::query::TypeTag::#tag) }
    });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::dbvc::query::Model for #name #ty_generics #where_clause {
            fn table_name(&self) -> &str {
                #table
            }

            fn columns(&self) -> ::std::vec::Vec<&str> {
                ::std::vec![#(#column_names),*]
            }

            fn column_type(&self, column: &str) -> ::core::option::Option<::dbvc::query::TypeTag> {
                match column {
                    #(#arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn primary_key(&self) -> &str {
                #primary_key
            }
        }
    })
}

/// `Int`, `Float` or `Text` for a field type; `Option<T>` is looked through
fn type_tag(ty: &Type) -> Ident {
    let tag = match ty {
        Type::Path(path) => match path.path.segments.last() {
            Some(segment) if segment.ident == "Option" => {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return type_tag(inner);
                    }
                }
                "Text"
            }
            Some(segment) => match segment.ident.to_string().as_str() {
                "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "u128" | "usize" | "bool" => "Int",
                "f32" | "f64" => "Float",
                _ => "Text",
            },
            None => "Text",
        },
        _ => "Text",
    };
    Ident::new(tag, Span::call_site())
}
