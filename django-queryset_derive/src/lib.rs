use proc_macro::{self, TokenStream};

use proc_macro2 as pm2;

mod attributes;
mod model;
mod object;

/// Derive the `Model` trait.
///
/// This is only implemented for structs with named fields, which must
/// also implement `Serialize` and `Deserialize`. Each field becomes an
/// entry in `FIELD_SCHEMAS`, with a field type inferred from its Rust
/// type and `nullable` set for `Option` fields. The annotations use the
/// `django` attribute, which has the following options:
///
/// - `#[django(endpoint = "thing-child")]` On the struct: the base path
///   of the model's endpoints. Defaults to the struct name in
///   kebab-case.
///
/// - `#[django(pk)]` This field is the primary key. Without it, a field
///   named `id` is used. An integer primary key is an `AutoField`, and
///   read-only.
///
/// - `#[django(read_only)]` Mark the field read-only in its schema.
///
/// - `#[django(rename = "name")]` The field's name on the backend, if
///   it differs.
///
/// - `#[django(field_type = "EmailField")]` Use this field type rather
///   than inferring one.
///
/// - `#[django(foreign_key = "parent_id")]` On a `ForeignKey<T>` field:
///   the named field holds the related row's id. This generates
///   `resolve_<field>` and `set_<field>` methods, and the id field's
///   schema becomes a `ForeignKey` pointing at `T`'s endpoint.
///
/// - `#[django(exclude)]` Leave the field out of `FIELD_SCHEMAS`.
#[proc_macro_derive(Model, attributes(django))]
pub fn model(input: TokenStream) -> TokenStream {
    let derive: syn::DeriveInput = syn::parse_macro_input!(input);

    let res: pm2::TokenStream = model::derive_model(derive);

    res.into()
}

/// Derive the `ObjectType` trait.
///
/// The only option is `#[django(endpoint = "point-pair")]` on the type,
/// which defaults to the type name in kebab-case.
#[proc_macro_derive(ObjectType, attributes(django))]
pub fn object_type(input: TokenStream) -> TokenStream {
    let derive: syn::DeriveInput = syn::parse_macro_input!(input);

    let res: pm2::TokenStream = object::derive_object_type(derive);

    res.into()
}
