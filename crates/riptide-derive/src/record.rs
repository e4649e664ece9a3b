//! Implementation of `#[derive(Record)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Ident, LitInt, LitStr, Type};

/// Field metadata extracted from the struct definition.
struct FieldInfo {
    ident: Ident,
    ty: Type,
    column_name: String,
    key_order: Option<u32>,
    event_time: Option<EventTime>,
    processing_time: bool,
    decimal: Option<(u8, u8)>,
    is_nullable: bool,
    is_option: bool,
}

struct EventTime {
    format: Option<String>,
}

/// Topic hints from the struct-level `#[topic(...)]` attribute.
#[derive(Default)]
struct TopicAttr {
    name: Option<String>,
    partitions: Option<u32>,
    replication: Option<u16>,
}

pub fn expand_record(input: DeriveInput) -> Result<TokenStream, Error> {
    let name = &input.ident;
    let type_name = name.to_string();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let topic = parse_topic_attr(&input)?;

    let mut field_infos = Vec::new();

    for field in fields {
        let ident = field.ident.clone().unwrap();
        let ty = field.ty.clone();

        let mut column_name = ident.to_string();
        let mut key_order = None;
        let mut event_time = None;
        let mut processing_time = false;
        let mut decimal = None;
        let mut is_nullable = false;

        for attr in &field.attrs {
            if attr.path().is_ident("key") {
                // `#[key]` defaults to order 0; `#[key(2)]` declares it.
                key_order = Some(match &attr.meta {
                    syn::Meta::Path(_) => 0,
                    _ => attr.parse_args::<LitInt>()?.base10_parse::<u32>()?,
                });
            } else if attr.path().is_ident("event_time") {
                event_time = Some(match &attr.meta {
                    syn::Meta::Path(_) => EventTime { format: None },
                    _ => EventTime {
                        format: Some(attr.parse_args::<LitStr>()?.value()),
                    },
                });
            } else if attr.path().is_ident("processing_time") {
                processing_time = true;
            } else if attr.path().is_ident("decimal") {
                let mut precision = None;
                let mut scale = None;
                attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("precision") {
                        precision = Some(meta.value()?.parse::<LitInt>()?.base10_parse::<u8>()?);
                        Ok(())
                    } else if meta.path.is_ident("scale") {
                        scale = Some(meta.value()?.parse::<LitInt>()?.base10_parse::<u8>()?);
                        Ok(())
                    } else {
                        Err(meta.error("expected `precision` or `scale`"))
                    }
                })?;
                let precision = precision
                    .ok_or_else(|| Error::new_spanned(attr, "decimal requires `precision`"))?;
                let scale =
                    scale.ok_or_else(|| Error::new_spanned(attr, "decimal requires `scale`"))?;
                decimal = Some((precision, scale));
            } else if attr.path().is_ident("column") {
                column_name = attr.parse_args::<LitStr>()?.value();
            } else if attr.path().is_ident("nullable") {
                is_nullable = true;
            }
        }

        if event_time.is_some() && processing_time {
            return Err(Error::new_spanned(
                field,
                "a field cannot be both event_time and processing_time",
            ));
        }

        let is_option = is_option_type(&ty);
        if is_option {
            is_nullable = true;
            if key_order.is_some() {
                return Err(Error::new_spanned(
                    field,
                    "key fields cannot be Option; keys must always be present",
                ));
            }
        }

        field_infos.push(FieldInfo {
            ident,
            ty,
            column_name,
            key_order,
            event_time,
            processing_time,
            decimal,
            is_nullable,
            is_option,
        });
    }

    let field_specs = field_infos.iter().map(|f| {
        let field_name = f.ident.to_string();
        let ty_expr = field_type_expr(f);
        let mut spec = quote! {
            riptide_core::metadata::FieldSpec::new(#field_name, #ty_expr)
        };
        if f.column_name != field_name {
            let column = &f.column_name;
            spec = quote! { #spec.with_column(#column) };
        }
        if f.is_nullable {
            spec = quote! { #spec.nullable() };
        }
        if let Some(order) = f.key_order {
            spec = quote! { #spec.key(#order) };
        }
        if let Some(et) = &f.event_time {
            let format = match &et.format {
                Some(fmt) => quote! { Some(#fmt.to_string()) },
                None => quote! { None },
            };
            spec = quote! { #spec.event_time(#format) };
        } else if f.processing_time {
            spec = quote! { #spec.processing_time() };
        }
        spec
    });

    // Resolve key order at macro time so key_parts needs no sorting at
    // runtime. Stable sort keeps declaration position as the tie-break.
    let mut key_fields: Vec<&FieldInfo> = field_infos
        .iter()
        .filter(|f| f.key_order.is_some())
        .collect();
    key_fields.sort_by_key(|f| f.key_order.unwrap_or_default());
    let key_parts = key_fields.iter().map(|f| {
        let ident = &f.ident;
        quote! { self.#ident.to_string() }
    });

    let topic_hints_impl = topic_hints_impl(&topic);

    let expanded = quote! {
        impl riptide_core::metadata::Record for #name {
            fn type_name() -> &'static str {
                #type_name
            }

            fn fields() -> ::std::vec::Vec<riptide_core::metadata::FieldSpec> {
                vec![
                    #(#field_specs),*
                ]
            }

            #topic_hints_impl

            fn key_parts(&self) -> ::std::vec::Vec<::std::string::String> {
                vec![
                    #(#key_parts),*
                ]
            }
        }
    };

    Ok(expanded)
}

fn parse_topic_attr(input: &DeriveInput) -> Result<TopicAttr, Error> {
    let mut topic = TopicAttr::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("topic") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                topic.name = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("partitions") {
                topic.partitions = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                Ok(())
            } else if meta.path.is_ident("replicas") {
                topic.replication = Some(meta.value()?.parse::<LitInt>()?.base10_parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `name`, `partitions`, or `replicas`"))
            }
        })?;
    }
    Ok(topic)
}

fn topic_hints_impl(topic: &TopicAttr) -> TokenStream {
    if topic.name.is_none() && topic.partitions.is_none() && topic.replication.is_none() {
        // The trait default (empty hints) suffices.
        return TokenStream::new();
    }
    let name = option_tokens(topic.name.as_ref().map(|n| quote! { #n.to_string() }));
    let partitions = option_tokens(topic.partitions.map(|p| quote! { #p }));
    let replication = option_tokens(topic.replication.map(|r| quote! { #r }));
    quote! {
        fn topic_hints() -> riptide_core::metadata::TopicHints {
            riptide_core::metadata::TopicHints {
                name: #name,
                partitions: #partitions,
                replication: #replication,
            }
        }
    }
}

fn option_tokens(value: Option<TokenStream>) -> TokenStream {
    match value {
        Some(inner) => quote! { ::std::option::Option::Some(#inner) },
        None => quote! { ::std::option::Option::None },
    }
}

/// The `FieldType` expression for a field, honoring `#[decimal]`.
fn field_type_expr(f: &FieldInfo) -> TokenStream {
    if let Some((precision, scale)) = f.decimal {
        return quote! {
            riptide_core::schema::FieldType::Decimal {
                precision: #precision,
                scale: #scale,
            }
        };
    }
    let ty = &f.ty;
    quote! {
        <#ty as riptide_core::schema::ToFieldType>::field_type()
    }
}

/// Check if a type is `Option<T>`.
fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}
