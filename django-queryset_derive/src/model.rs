use proc_macro2 as pm2;

use crate::attributes::{endpoint_or_default, parse_django_attrs, DjangoMeta};

fn last_segment(ty: &syn::Type) -> Option<&syn::PathSegment> {
    match ty {
        syn::Type::Path(p) if p.qself.is_none() => p.path.segments.last(),
        _ => None,
    }
}

fn first_type_argument(segment: &syn::PathSegment) -> Option<&syn::Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        for arg in args.args.iter() {
            if let syn::GenericArgument::Type(ty) = arg {
                return Some(ty);
            }
        }
    }
    None
}

/// The `T` in `Option<T>`.
fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let segment = last_segment(ty)?;
    if segment.ident == "Option" {
        first_type_argument(segment)
    } else {
        None
    }
}

fn infer_field_type(ty: &syn::Type, pk: bool) -> Option<&'static str> {
    let name = last_segment(ty)?.ident.to_string();
    let field_type = match name.as_str() {
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" if pk => {
            "AutoField"
        }
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            "IntegerField"
        }
        "f32" | "f64" => "FloatField",
        "bool" => "BooleanField",
        "String" => "CharField",
        "NaiveDate" => "DateField",
        "NaiveDateTime" | "DateTime" => "DateTimeField",
        "Value" => "JSONField",
        "Vec" => "ArrayField",
        _ => return None,
    };
    Some(field_type)
}

struct SchemaField<'a> {
    ident: &'a syn::Ident,
    ty: &'a syn::Type,
    meta: DjangoMeta,
}

pub fn derive_model(input: syn::DeriveInput) -> pm2::TokenStream {
    let syn::DeriveInput {
        ident,
        data,
        generics,
        attrs,
        ..
    } = input;

    let (generics, ty_generics, wc) = generics.split_for_impl();

    let type_meta = match parse_django_attrs(&attrs) {
        Ok(meta) => meta,
        Err(e) => return e.into_compile_error(),
    };
    let endpoint = endpoint_or_default(&type_meta, &ident);

    let named = match data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(syn::FieldsNamed { named, .. }),
            ..
        }) => named,
        _ => {
            return syn::Error::new(
                ident.span(),
                "Model can only be derived for structs with named fields.",
            )
            .to_compile_error();
        }
    };

    let mut fields = Vec::new();
    for field in named.iter() {
        let fieldid = match field.ident.as_ref() {
            Some(fieldid) => fieldid,
            None => continue,
        };
        let meta = match parse_django_attrs(&field.attrs) {
            Ok(meta) => meta,
            Err(e) => return e.into_compile_error(),
        };
        fields.push(SchemaField {
            ident: fieldid,
            ty: &field.ty,
            meta,
        });
    }

    let pk = fields
        .iter()
        .find(|f| f.meta.pk)
        .or_else(|| fields.iter().find(|f| *f.ident == "id"));
    let pk = match pk {
        Some(pk) => pk,
        None => {
            return syn::Error::new(
                ident.span(),
                "Model needs a primary key: mark a field with #[django(pk)] or name it `id`.",
            )
            .to_compile_error();
        }
    };
    let pkid = pk.ident;
    let pktype = pk.ty;

    // Maps each id field to the foreign key field that resolves it.
    let mut foreign_keys = Vec::new();
    for field in fields.iter() {
        if let Some(key) = &field.meta.foreign_key {
            let id_field = match fields.iter().find(|f| *f.ident == key.value()) {
                Some(id_field) => id_field,
                None => {
                    return syn::Error::new_spanned(
                        key,
                        format!("no field named `{}` holds this foreign key's id", key.value()),
                    )
                    .to_compile_error();
                }
            };
            foreign_keys.push((field, id_field));
        }
    }

    let mut schemas = pm2::TokenStream::new();
    for field in fields.iter() {
        if field.meta.excluded || field.meta.foreign_key.is_some() {
            continue;
        }
        let fieldname = field
            .meta
            .name
            .clone()
            .unwrap_or_else(|| syn::LitStr::new(&field.ident.to_string(), field.ident.span()));
        let nullable = option_inner(field.ty).is_some();
        let inner = option_inner(field.ty).unwrap_or(field.ty);
        let is_pk = *field.ident == *pkid;

        let fk = foreign_keys
            .iter()
            .find(|(_, id_field)| *id_field.ident == *field.ident);

        let (field_type, related_model) = if let Some((fk_field, _)) = fk {
            let fk_type = fk_field.ty;
            let field_type = field
                .meta
                .field_type
                .clone()
                .unwrap_or_else(|| syn::Ident::new("ForeignKey", pm2::Span::call_site()));
            (
                field_type,
                quote::quote! {
                    ::core::option::Option::Some(
                        <<#fk_type as ::django_queryset::related::Related>::Target as ::django_queryset::Model>::ENDPOINT
                    )
                },
            )
        } else {
            let field_type = match &field.meta.field_type {
                Some(field_type) => field_type.clone(),
                None => match infer_field_type(inner, is_pk) {
                    Some(name) => syn::Ident::new(name, pm2::Span::call_site()),
                    None => {
                        return syn::Error::new_spanned(
                            field.ty,
                            "cannot infer the field type; add #[django(field_type = \"...\")]",
                        )
                        .to_compile_error();
                    }
                },
            };
            (field_type, quote::quote! { ::core::option::Option::None })
        };

        let read_only = field.meta.read_only || (is_pk && field_type == "AutoField");

        schemas.extend(quote::quote! {
            ::django_queryset::schema::FieldSchema {
                field_name: #fieldname,
                field_type: ::django_queryset::schema::FieldType::#field_type,
                nullable: #nullable,
                read_only: #read_only,
                related_model: #related_model,
            },
        });
    }

    let mut accessors = pm2::TokenStream::new();
    for (fk_field, id_field) in foreign_keys.iter() {
        let fkid = fk_field.ident;
        let fk_type = fk_field.ty;
        let idid = id_field.ident;
        let resolve = syn::Ident::new(&format!("resolve_{}", fkid), fkid.span());
        let set = syn::Ident::new(&format!("set_{}", fkid), fkid.span());
        let target = quote::quote! { <#fk_type as ::django_queryset::related::Related>::Target };

        let (current_id, assign_id) = if option_inner(id_field.ty).is_some() {
            (
                quote::quote! { ::core::clone::Clone::clone(&self.#idid) },
                quote::quote! { self.#idid = ::core::option::Option::Some(pk); },
            )
        } else {
            (
                quote::quote! { ::core::option::Option::Some(::core::clone::Clone::clone(&self.#idid)) },
                quote::quote! { self.#idid = pk; },
            )
        };

        accessors.extend(quote::quote! {
            /// Return the related row, fetching it by id on first use.
            pub async fn #resolve(
                &mut self,
                client: &::django_queryset::ServerClient,
            ) -> ::core::option::Option<&#target> {
                let id = #current_id;
                self.#fkid.resolve(client, id).await
            }

            /// Assign the related row, keeping the id field in step.
            pub fn #set(
                &mut self,
                value: ::django_queryset::related::RelatedRef<#target>,
            ) -> ::core::result::Result<(), ::django_queryset::related::RelatedError> {
                self.#fkid.set(value)?;
                let pk = self
                    .#fkid
                    .get()
                    .map(::django_queryset::Model::pk)
                    .or_else(|| self.#fkid.pending_id().cloned());
                if let ::core::option::Option::Some(pk) = pk {
                    #assign_id
                }
                ::core::result::Result::Ok(())
            }
        });
    }

    quote::quote! {
        #[automatically_derived]
        impl #generics ::django_queryset::Model for #ident #ty_generics #wc {
            type Pk = #pktype;
            const ENDPOINT: &'static str = #endpoint;
            const FIELD_SCHEMAS: &'static [::django_queryset::schema::FieldSchema] = &[
                #schemas
            ];

            fn pk(&self) -> Self::Pk {
                ::core::clone::Clone::clone(&self.#pkid)
            }
        }

        #[automatically_derived]
        impl #generics #ident #ty_generics #wc {
            #accessors
        }
    }
}
