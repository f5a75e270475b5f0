use darling::ast::Data;
use darling::{FromDeriveInput, FromField};
use quote::quote;
use syn::{DeriveInput, GenericArgument, Ident, PathArguments, Type, parse_macro_input};

use proc_macro::TokenStream;

#[derive(FromField)]
#[darling(attributes(tree))]
struct TreeField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    rename: Option<String>,
    #[darling(default)]
    list: bool,
}

#[derive(FromDeriveInput)]
#[darling(attributes(tree), supports(struct_named))]
struct TreeInput {
    ident: Ident,
    generics: syn::Generics,
    data: Data<(), TreeField>,
}

/// Builds a struct from an `ebmltree` parse tree level.
///
/// Every field reads the entry named after it, or `#[tree(rename = "...")]`.
/// `Option<T>` fields are `None` when the entry is missing or does not convert;
/// other fields fall back to `Default`. `#[tree(list)]` on a `Vec<T>` collects
/// every item of a repeatable entry.
#[proc_macro_derive(FromTree, attributes(tree))]
pub fn derive_from_tree(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let input = match TreeInput::from_derive_input(&input) {
        Ok(v) => v,
        Err(e) => return TokenStream::from(e.write_errors()),
    };

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match input.data {
        Data::Struct(fields) => fields.fields,
        Data::Enum(_) => unreachable!("FromTree can only be derived for structs"),
    };

    let inits = fields.iter().filter_map(|field| {
        let ident = field.ident.as_ref()?;
        let key = field
            .rename
            .clone()
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_owned());

        let init = if field.list {
            quote! {
                tree.get(#key)
                    .map(|value| {
                        value
                            .items()
                            .iter()
                            .filter_map(::ebmltree::structs::tree::FromValue::from_value)
                            .collect()
                    })
                    .unwrap_or_default()
            }
        } else if is_option(&field.ty) {
            quote! {
                tree.get(#key).and_then(::ebmltree::structs::tree::FromValue::from_value)
            }
        } else {
            quote! {
                tree.get(#key)
                    .and_then(::ebmltree::structs::tree::FromValue::from_value)
                    .unwrap_or_default()
            }
        };

        Some(quote! { #ident: #init })
    });

    let expanded = quote! {
        impl #impl_generics ::ebmltree::structs::tree::FromTree for #name #ty_generics #where_clause {
            fn from_tree(tree: &::ebmltree::structs::tree::ParseTree) -> Self {
                Self {
                    #( #inits, )*
                }
            }
        }

        impl #impl_generics ::ebmltree::structs::tree::FromValue for #name #ty_generics #where_clause {
            fn from_value(value: &::ebmltree::structs::tree::Value) -> Option<Self> {
                value
                    .as_tree()
                    .map(<Self as ::ebmltree::structs::tree::FromTree>::from_tree)
            }
        }
    };

    TokenStream::from(expanded)
}

fn is_option(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    let Some(last) = path.path.segments.last() else {
        return false;
    };

    last.ident == "Option"
        && matches!(
            &last.arguments,
            PathArguments::AngleBracketed(args)
                if matches!(args.args.first(), Some(GenericArgument::Type(_)))
        )
}
