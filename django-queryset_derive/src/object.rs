use proc_macro2 as pm2;

use crate::attributes::{endpoint_or_default, parse_django_attrs};

pub fn derive_object_type(input: syn::DeriveInput) -> pm2::TokenStream {
    let syn::DeriveInput {
        ident,
        generics,
        attrs,
        ..
    } = input;

    let meta = match parse_django_attrs(&attrs) {
        Ok(meta) => meta,
        Err(e) => return e.into_compile_error(),
    };
    let endpoint = endpoint_or_default(&meta, &ident);
    let (generics, ty_generics, wc) = generics.split_for_impl();

    quote::quote! {
        #[automatically_derived]
        impl #generics ::django_queryset::ObjectType for #ident #ty_generics #wc {
            const ENDPOINT: &'static str = #endpoint;
        }
    }
}
