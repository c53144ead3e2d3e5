extern crate proc_macro;

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned, ToTokens};
use syn::spanned::Spanned;
use syn::*;

const SHARED_STATE: &str = "global_dependencies";

#[proc_macro_derive(Context, attributes(cx))]
pub fn derive_context(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_context(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

#[proc_macro_derive(Schema, attributes(schema))]
pub fn derive_schema(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_schema(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn named_fields(input: &DeriveInput) -> Result<&FieldsNamed> {
    let strukt = match &input.data {
        Data::Struct(s) => s,
        Data::Enum(_) => return Err(Error::new_spanned(input, "expected struct, found enum")),
        Data::Union(_) => return Err(Error::new_spanned(input, "expected struct, found union")),
    };

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics.params,
            "generic parameters are not supported",
        ));
    }

    match &strukt.fields {
        Fields::Named(fields) => Ok(fields),
        Fields::Unnamed(_) => Err(Error::new_spanned(
            &strukt.fields,
            "tuple structs are not supported",
        )),
        Fields::Unit => Err(Error::new_spanned(
            &strukt.fields,
            "unit structs are not supported",
        )),
    }
}

fn expand_context(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let fields = named_fields(&input)?;

    let mut params = Vec::with_capacity(fields.named.len());
    let mut extracted = Vec::with_capacity(fields.named.len());

    for field in &fields.named {
        let ident = field.ident.as_ref().unwrap();
        let field_name = ident.to_string();
        let ty = &field.ty;

        if field_name == SHARED_STATE {
            if let Some(attr) = field.attrs.iter().find(|attr| attr.path.is_ident("cx")) {
                return Err(Error::new_spanned(
                    attr,
                    "the shared state parameter cannot be renamed",
                ));
            }

            params.push(quote! {
                ::quill::ParamDescriptor::shared_state(#field_name)
            });
            extracted.push(quote_spanned! { ty.span() =>
                #ident: ::quill::extract::shared_state(req),
            });
            continue;
        }

        let key = rename(field)?.unwrap_or_else(|| field_name.clone());

        params.push(quote_spanned! { ty.span() =>
            ::quill::ParamDescriptor::of::<#ty>(#field_name)
        });
        extracted.push(quote_spanned! { ty.span() =>
            #ident: <#ty as ::quill::Extractor>::extract(req, #key).await?,
        });
    }

    Ok(quote! {
        impl ::quill::Context for #name {
            fn params() -> ::std::vec::Vec<::quill::ParamDescriptor> {
                ::std::vec![#(#params),*]
            }

            fn extract<'quill_request>(
                req: &'quill_request ::quill::Request,
            ) -> ::quill::BoxFuture<'quill_request, ::std::result::Result<Self, ::quill::Rejection>>
            {
                ::std::boxed::Box::pin(async move {
                    ::std::result::Result::Ok(#name { #(#extracted)* })
                })
            }
        }
    })
}

fn rename(field: &Field) -> Result<Option<String>> {
    let mut renamed = None;

    for attr in &field.attrs {
        if !attr.path.is_ident("cx") {
            continue;
        }

        let meta = match attr.parse_meta()? {
            Meta::List(list) => list,
            _ => return Err(bad_cx(attr)),
        };

        for nested in &meta.nested {
            match nested {
                NestedMeta::Meta(Meta::NameValue(MetaNameValue {
                    path,
                    lit: Lit::Str(lit),
                    ..
                })) if path.is_ident("name") => renamed = Some(lit.value()),
                _ => return Err(bad_cx(nested)),
            }
        }
    }

    Ok(renamed)
}

fn bad_cx(tokens: impl ToTokens) -> Error {
    Error::new_spanned(tokens, "expected #[cx(name = \"...\")]")
}

enum FieldDefault {
    Trait,
    Path(ExprPath),
}

fn expand_schema(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let fields = named_fields(&input)?;

    let mut idents = Vec::with_capacity(fields.named.len());
    let mut keys = Vec::with_capacity(fields.named.len());
    let mut decoded = Vec::with_capacity(fields.named.len());
    let mut partial = Vec::with_capacity(fields.named.len());
    let mut required = Vec::new();

    for field in &fields.named {
        let ident = field.ident.as_ref().unwrap();
        let key = ident.to_string();
        let ty = &field.ty;
        let inner = option_inner(ty);

        let decode = match (default(field)?, inner) {
            (None, Some(inner)) => quote_spanned! { ty.span() =>
                ::quill::schema::field_opt::<#inner>(&mut __quill_object, #key, &mut __quill_errors)
            },
            (None, None) => quote_spanned! { ty.span() =>
                ::quill::schema::field::<#ty>(&mut __quill_object, #key, &mut __quill_errors)
            },
            (Some(FieldDefault::Trait), _) => quote_spanned! { ty.span() =>
                ::quill::schema::field_or_else::<#ty, _>(
                    &mut __quill_object,
                    #key,
                    <#ty as ::std::default::Default>::default,
                    &mut __quill_errors,
                )
            },
            (Some(FieldDefault::Path(path)), _) => quote_spanned! { ty.span() =>
                ::quill::schema::field_or_else::<#ty, _>(
                    &mut __quill_object,
                    #key,
                    #path,
                    &mut __quill_errors,
                )
            },
        };

        // the partial value holds `None` for every field that failed to decode
        let constraints = field
            .attrs
            .iter()
            .filter(|attr| attr.path.is_ident("validate"));

        if inner.is_some() {
            decoded.push(quote! { #ident: #decode.unwrap_or_default(), });
            partial.push(quote! { #(#constraints)* #ident: #ty, });
        } else {
            decoded.push(quote! { #ident: #decode, });
            partial.push(quote! { #(#constraints)* #ident: Option<#ty>, });
            required.push(ident);
        }

        idents.push(ident);
        keys.push(key);
    }

    let from_object = if idents.is_empty() {
        quote! {
            fn from_object(
                _: ::quill::schema::Object,
            ) -> ::std::result::Result<Self, ::quill::FieldErrors> {
                ::quill::schema::validate(#name {})
            }
        }
    } else {
        let build = quote! { ::quill::schema::validate(#name { #(#idents),* }) };

        let finish = if required.is_empty() {
            build
        } else {
            quote! {
                match (#(#required,)*) {
                    (#(::std::option::Option::Some(#required),)*) => #build,
                    _ => ::std::result::Result::Err(__quill_errors),
                }
            }
        };

        quote! {
            fn from_object(
                mut __quill_object: ::quill::schema::Object,
            ) -> ::std::result::Result<Self, ::quill::FieldErrors> {
                #[derive(::validator::Validate)]
                struct __QuillPartial {
                    #(#partial)*
                }

                let mut __quill_errors = ::quill::FieldErrors::new();
                let __quill_partial = __QuillPartial { #(#decoded)* };

                ::quill::schema::check(&__quill_partial, &[#(#keys),*], &mut __quill_errors);
                if !__quill_errors.is_empty() {
                    return ::std::result::Result::Err(__quill_errors);
                }

                let __QuillPartial { #(#idents),* } = __quill_partial;
                #finish
            }
        }
    };

    Ok(quote! {
        impl ::quill::Schema for #name {
            #from_object
        }

        impl ::quill::Extractor for #name {
            const KIND: ::quill::ParamKind = ::quill::ParamKind::Body(::quill::BodyKind::Schema);

            fn extract<'quill_request>(
                req: &'quill_request ::quill::Request,
                _: &'static str,
            ) -> ::quill::BoxFuture<'quill_request, ::std::result::Result<Self, ::quill::Rejection>>
            {
                ::std::boxed::Box::pin(async move { ::quill::extract::schema::<Self>(req) })
            }
        }

        impl ::quill::Respond for #name {
            type Error = ::quill::__private::serde_json::Error;

            fn respond(self) -> ::std::result::Result<::quill::Response, Self::Error> {
                ::quill::respond::json(&self)
            }
        }
    })
}

// `Option<T>` fields may be absent. Returns `T`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let path = match ty {
        Type::Path(TypePath { qself: None, path }) => path,
        _ => return None,
    };

    let segment = path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }

    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first()? {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

fn default(field: &Field) -> Result<Option<FieldDefault>> {
    let mut default = None;

    for attr in &field.attrs {
        if !attr.path.is_ident("schema") {
            continue;
        }

        let meta = match attr.parse_meta()? {
            Meta::List(list) => list,
            _ => return Err(bad_schema(attr)),
        };

        for nested in &meta.nested {
            match nested {
                NestedMeta::Meta(Meta::Path(path)) if path.is_ident("default") => {
                    default = Some(FieldDefault::Trait);
                }
                NestedMeta::Meta(Meta::NameValue(MetaNameValue {
                    path,
                    lit: Lit::Str(lit),
                    ..
                })) if path.is_ident("default") => {
                    default = Some(FieldDefault::Path(lit.parse()?));
                }
                _ => return Err(bad_schema(nested)),
            }
        }
    }

    Ok(default)
}

fn bad_schema(tokens: impl ToTokens) -> Error {
    Error::new_spanned(
        tokens,
        "expected #[schema(default)] or #[schema(default = \"path\")]",
    )
}
