use syn::ext::IdentExt;

#[derive(Debug)]
pub enum DjangoItem {
    Endpoint(syn::LitStr),
    Rename(syn::LitStr),
    FieldType(syn::Ident),
    ForeignKey(syn::LitStr),
    PrimaryKey,
    ReadOnly,
    Ignored,
}

impl syn::parse::Parse for DjangoItem {
    fn parse(input: syn::parse::ParseStream<'_>) -> syn::Result<Self> {
        let attr = input.call(syn::Ident::parse_any)?;
        match attr.to_string().as_str() {
            "endpoint" => {
                // endpoint = "thing-child"
                let _: syn::Token![=] = input.parse()?;
                Ok(DjangoItem::Endpoint(input.parse()?))
            }
            "rename" => {
                let _: syn::Token![=] = input.parse()?;
                Ok(DjangoItem::Rename(input.parse()?))
            }
            "field_type" => {
                // field_type = "EmailField"
                let _: syn::Token![=] = input.parse()?;
                let name: syn::LitStr = input.parse()?;
                let ident = name.parse::<syn::Ident>()?;
                Ok(DjangoItem::FieldType(ident))
            }
            "foreign_key" => {
                // foreign_key = "parent_id"
                let _: syn::Token![=] = input.parse()?;
                Ok(DjangoItem::ForeignKey(input.parse()?))
            }
            "pk" => Ok(DjangoItem::PrimaryKey),
            "read_only" => Ok(DjangoItem::ReadOnly),
            "exclude" => Ok(DjangoItem::Ignored),
            _ => Err(syn::Error::new_spanned(
                attr,
                "unsupported django attribute",
            )),
        }
    }
}

#[derive(Debug, Default)]
pub struct DjangoMeta {
    pub endpoint: Option<syn::LitStr>,
    pub name: Option<syn::LitStr>,
    pub field_type: Option<syn::Ident>,
    pub foreign_key: Option<syn::LitStr>,
    pub pk: bool,
    pub read_only: bool,
    pub excluded: bool,
}

impl syn::parse::Parse for DjangoMeta {
    fn parse(input: syn::parse::ParseStream<'_>) -> syn::Result<Self> {
        let mut meta = DjangoMeta::default();
        let punc =
            syn::punctuated::Punctuated::<DjangoItem, syn::Token![,]>::parse_terminated(input)?;

        for item in punc {
            match item {
                DjangoItem::Endpoint(endpoint) => meta.endpoint = Some(endpoint),
                DjangoItem::Rename(name) => meta.name = Some(name),
                DjangoItem::FieldType(ty) => meta.field_type = Some(ty),
                DjangoItem::ForeignKey(key) => meta.foreign_key = Some(key),
                DjangoItem::PrimaryKey => meta.pk = true,
                DjangoItem::ReadOnly => meta.read_only = true,
                DjangoItem::Ignored => meta.excluded = true,
            }
        }

        Ok(meta)
    }
}

/// Collect every `#[django(...)]` attribute in `attrs` into one
/// [`DjangoMeta`]; later attributes override earlier ones.
pub fn parse_django_attrs(attrs: &[syn::Attribute]) -> syn::Result<DjangoMeta> {
    let mut meta = DjangoMeta::default();
    for attr in attrs.iter() {
        if attr.path.is_ident("django") {
            let parsed = attr.parse_args::<DjangoMeta>()?;
            meta.endpoint = parsed.endpoint.or(meta.endpoint);
            meta.name = parsed.name.or(meta.name);
            meta.field_type = parsed.field_type.or(meta.field_type);
            meta.foreign_key = parsed.foreign_key.or(meta.foreign_key);
            meta.pk |= parsed.pk;
            meta.read_only |= parsed.read_only;
            meta.excluded |= parsed.excluded;
        }
    }
    Ok(meta)
}

/// The endpoint named in `meta`, or the type name in kebab-case.
pub fn endpoint_or_default(meta: &DjangoMeta, ident: &syn::Ident) -> syn::LitStr {
    use heck::ToKebabCase;

    match &meta.endpoint {
        Some(endpoint) => endpoint.clone(),
        None => syn::LitStr::new(&ident.to_string().to_kebab_case(), ident.span()),
    }
}
