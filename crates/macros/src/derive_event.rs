//! Event derive macro implementation

use darling::FromDeriveInput;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{DeriveInput, Index};

use crate::parse::{category_variant, EventArgs};

/// Generate the Event implementation
pub fn derive_event(input: DeriveInput) -> TokenStream {
    match EventArgs::from_derive_input(&input).and_then(generate_impl) {
        Ok(tokens) => tokens,
        Err(e) => e.write_errors(),
    }
}

fn generate_impl(args: EventArgs) -> darling::Result<TokenStream> {
    let struct_name = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let fields = match &args.data {
        darling::ast::Data::Struct(fields) => fields,
        darling::ast::Data::Enum(_) => return Err(darling::Error::unsupported_shape("enum")),
    };

    // Cancel cell: named field or tuple index
    let cancel_fields: Vec<TokenStream> = fields
        .iter()
        .enumerate()
        .filter(|(_, field)| field.cancel)
        .map(|(index, field)| match &field.ident {
            Some(ident) => quote! { #ident },
            None => {
                let index = Index::from(index);
                quote! { #index }
            }
        })
        .collect();

    if cancel_fields.len() > 1 {
        return Err(
            darling::Error::custom("only one field may be marked #[event(cancel)]")
                .with_span(struct_name),
        );
    }

    let cancellable_fn = cancel_fields.first().map(|field| {
        quote! {
            fn cancellable(&self) -> ::core::option::Option<&dyn ::canopy_core::events::Cancellable> {
                ::core::option::Option::Some(&self.#field)
            }
        }
    });

    let category_fn = match &args.category {
        Some(category) => {
            let variant = category_variant(category)
                .ok_or_else(|| darling::Error::unknown_value(category).with_span(struct_name))?;
            let variant = format_ident!("{}", variant);
            Some(quote! {
                fn category(&self) -> ::canopy_core::events::EventCategory {
                    ::canopy_core::events::EventCategory::#variant
                }
            })
        }
        None => None,
    };

    let name_fn = args.name.as_ref().map(|name| {
        quote! {
            fn name(&self) -> &'static str {
                #name
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::canopy_core::events::Event for #struct_name #ty_generics #where_clause {
            #name_fn
            #cancellable_fn
            #category_fn
        }
    })
}
