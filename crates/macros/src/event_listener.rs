//! Listener attribute macro implementation
//!
//! Scans an inherent impl block for `#[subscribe]` methods and generates a
//! `Listener` implementation that registers each of them.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, FnArg, ImplItem, ItemImpl, ReturnType, Signature, Type};

use crate::parse::{priority_variant, SubscribeArgs};

/// Generate the listener implementation
///
/// The `#[subscribe]` attributes are stripped from the impl block even when
/// parsing fails, so the only errors reported are ours.
pub fn generate_event_listener(mut item: ItemImpl) -> TokenStream {
    let result = collect_registrations(&mut item);

    match result {
        Ok(registrations) => {
            let self_ty = &item.self_ty;
            let (impl_generics, _, where_clause) = item.generics.split_for_impl();
            quote! {
                #item

                impl #impl_generics ::canopy_core::events::Listener for #self_ty #where_clause {
                    #[allow(unused_variables)]
                    fn subscribe(registrar: &mut ::canopy_core::events::ListenerRegistrar<Self>) {
                        #(#registrations)*
                    }
                }
            }
        }
        Err(e) => {
            let errors = e.write_errors();
            quote! {
                #item
                #errors
            }
        }
    }
}

fn collect_registrations(item: &mut ItemImpl) -> darling::Result<Vec<TokenStream>> {
    let mut errors = darling::Error::accumulator();

    if item.trait_.is_some() {
        errors.push(
            darling::Error::custom("#[event_listener] must be placed on an inherent impl block")
                .with_span(&item.self_ty),
        );
    }

    let mut registrations = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };

        let (subscribe, rest): (Vec<Attribute>, Vec<Attribute>) = method
            .attrs
            .drain(..)
            .partition(|attr| attr.path().is_ident("subscribe"));
        method.attrs = rest;

        let Some(attr) = subscribe.first() else {
            continue;
        };
        if subscribe.len() > 1 {
            errors.push(
                darling::Error::custom("#[subscribe] may only appear once per method")
                    .with_span(&subscribe[1]),
            );
            continue;
        }

        let Some(args) = errors.handle(SubscribeArgs::from_attribute(attr)) else {
            continue;
        };
        let Some(options) = errors.handle(options_tokens(&args, attr)) else {
            continue;
        };

        // Methods without exactly one `&Event` parameter are not subscribers
        if let Some(registration) = registration(&method.sig, options) {
            registrations.push(registration);
        }
    }

    errors.finish_with(registrations)
}

fn options_tokens(args: &SubscribeArgs, attr: &Attribute) -> darling::Result<TokenStream> {
    let priority = match &args.priority {
        Some(priority) => priority_variant(priority)
            .ok_or_else(|| darling::Error::unknown_value(priority).with_span(attr))?,
        None => "Normal",
    };
    let priority = format_ident!("{}", priority);
    let invoked_for_cancelled = args.invoked_for_cancelled;

    Ok(quote! {
        ::canopy_core::events::SubscribeOptions::new(
            ::canopy_core::events::Priority::#priority,
            #invoked_for_cancelled,
        )
    })
}

/// Registration statement for one method, or None if its shape does not fit
fn registration(sig: &Signature, options: TokenStream) -> Option<TokenStream> {
    if sig.asyncness.is_some() || !sig.generics.params.is_empty() {
        return None;
    }

    let mut inputs = sig.inputs.iter();
    let (has_receiver, event_arg) = match (inputs.next(), inputs.next(), inputs.next()) {
        (Some(FnArg::Receiver(receiver)), Some(FnArg::Typed(arg)), None)
            if receiver.reference.is_some() && receiver.mutability.is_none() =>
        {
            (true, arg)
        }
        (Some(FnArg::Typed(arg)), None, None) => (false, arg),
        _ => return None,
    };

    let Type::Reference(reference) = &*event_arg.ty else {
        return None;
    };
    if reference.mutability.is_some() {
        return None;
    }
    let event_ty = &reference.elem;
    let method = &sig.ident;

    let register = match sig.output {
        ReturnType::Default => quote! { on::<#event_ty, _> },
        ReturnType::Type(..) => quote! { try_on::<#event_ty, _, _> },
    };
    let call = if has_receiver {
        quote! { Self::#method }
    } else {
        quote! { |_: &Self, event: &#event_ty| Self::#method(event) }
    };

    Some(quote! {
        registrar.#register(#options, #call);
    })
}
