//! Implementation of the `#[derive(FlagSet)]` and `#[derive(ArgSet)]` macros.
//!
//! Both generate a `komandir::Schema` implementation: `describe_fields()`
//! lists every attributed field with its metadata and its type as written,
//! and `assign()` converts a bound value into the field through
//! `komandir::FromValue`.
//!
//! Only the marker attribute selects fields; visibility is not consulted, so
//! private fields take part like public ones. An attributed field without
//! `name` is described but skipped at introspection.
//!
//! Field types are only checked at run time, when the schema is
//! introspected. A field of an unsupported type gets no `assign` arm, so the
//! derive still compiles and the error surfaces as `UnsupportedFieldType`.
//! `custom` fields are converted through `komandir::FlagValue` instead.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    spanned::Spanned, Data, DeriveInput, Error, Fields, GenericArgument, PathArguments, Result,
    Type,
};

use super::attrs::parse_field_attrs;

/// Which derive is being expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Flags,
    Args,
}

impl SchemaKind {
    fn marker(self) -> &'static str {
        match self {
            SchemaKind::Flags => "flag",
            SchemaKind::Args => "arg",
        }
    }

    fn derive_name(self) -> &'static str {
        match self {
            SchemaKind::Flags => "FlagSet",
            SchemaKind::Args => "ArgSet",
        }
    }
}

const SCALARS: &[&str] = &[
    "bool", "String", "i8", "i16", "i32", "i64", "isize", "u8", "u16", "u32", "u64", "usize",
    "f32", "f64", "Duration",
];

/// Main implementation of both schema derives.
pub fn schema_derive_impl(input: DeriveInput, kind: SchemaKind) -> Result<TokenStream> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    format!(
                        "{} can only be derived for structs with named fields",
                        kind.derive_name()
                    ),
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                format!("{} can only be derived for structs", kind.derive_name()),
            ))
        }
    };

    let mut descriptors: Vec<TokenStream> = Vec::new();
    let mut assign_arms: Vec<TokenStream> = Vec::new();

    for field in fields.iter() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;

        let Some(attr) = parse_field_attrs(&field.attrs, kind.marker())? else {
            continue;
        };
        if kind == SchemaKind::Args {
            attr.reject_for_args()?;
        }

        let ident = field_name.to_string();
        let ident = ident.strip_prefix("r#").unwrap_or(&ident).to_string();
        let name = optional(attr.name.as_deref());
        let ty = &field.ty;
        let declared_type: String = quote!(#ty)
            .to_string()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let aliases = &attr.aliases;
        let choices = &attr.choices;
        let desc = optional(attr.desc.as_deref());
        let env = optional(attr.env.as_deref());
        let default = optional(attr.default.as_deref());
        let custom = if attr.custom {
            quote!(::core::option::Option::Some(::komandir::CustomKind::of::<#ty>()))
        } else {
            quote!(::core::option::Option::None)
        };

        descriptors.push(quote! {
            ::komandir::FieldDescriptor::new(
                #ident,
                #declared_type,
                ::komandir::FieldTags {
                    name: #name,
                    aliases: ::std::vec![#(#aliases),*],
                    description: #desc,
                    env: #env,
                    default: #default,
                    choices: ::std::vec![#(#choices),*],
                    custom: #custom,
                },
            )
        });

        if attr.custom {
            assign_arms.push(quote! {
                #ident => {
                    self.#field_name = ::komandir::from_custom::<#ty>(value)?;
                    ::core::result::Result::Ok(())
                }
            });
        } else if is_supported(ty) {
            assign_arms.push(quote! {
                #ident => {
                    self.#field_name = <#ty as ::komandir::FromValue>::from_value(value)?;
                    ::core::result::Result::Ok(())
                }
            });
        }
    }

    let expanded = quote! {
        impl #impl_generics ::komandir::Schema for #struct_name #ty_generics #where_clause {
            fn describe_fields() -> ::std::vec::Vec<::komandir::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            #[allow(unused_variables)]
            fn assign(
                &mut self,
                field: &str,
                value: ::komandir::Value,
            ) -> ::core::result::Result<(), ::komandir::ValueError> {
                match field {
                    #(#assign_arms)*
                    _ => ::core::result::Result::Err(::komandir::ValueError::UnknownField {
                        field: ::std::string::ToString::to_string(field),
                    }),
                }
            }
        }
    };

    Ok(expanded)
}

fn optional(value: Option<&str>) -> TokenStream {
    match value {
        Some(value) => quote!(::core::option::Option::Some(#value)),
        None => quote!(::core::option::Option::None),
    }
}

/// The type's last path segment, with its generic arguments.
fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn is_scalar(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| {
        matches!(segment.arguments, PathArguments::None)
            && SCALARS.contains(&segment.ident.to_string().as_str())
    })
}

/// True for scalar types and `Vec<scalar>`.
fn is_supported(ty: &Type) -> bool {
    if is_scalar(ty) {
        return true;
    }
    let Some(segment) = last_segment(ty) else {
        return false;
    };
    if segment.ident != "Vec" {
        return false;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => {
            matches!(args.args.first(), Some(GenericArgument::Type(inner)) if is_scalar(inner))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(input: DeriveInput, kind: SchemaKind) -> String {
        schema_derive_impl(input, kind).unwrap().to_string()
    }

    #[test]
    fn test_supported_types() {
        let supported: Vec<Type> = vec![
            parse_quote!(bool),
            parse_quote!(String),
            parse_quote!(u16),
            parse_quote!(std::time::Duration),
            parse_quote!(Vec<String>),
            parse_quote!(::std::vec::Vec<i64>),
        ];
        for ty in &supported {
            assert!(is_supported(ty), "{}", quote!(#ty));
        }

        let unsupported: Vec<Type> = vec![
            parse_quote!(PathBuf),
            parse_quote!(Option<String>),
            parse_quote!(Vec<PathBuf>),
            parse_quote!(Vec<Vec<String>>),
            parse_quote!(&'static str),
        ];
        for ty in &unsupported {
            assert!(!is_supported(ty), "{}", quote!(#ty));
        }
    }

    #[test]
    fn test_flag_set_expansion() {
        let input: DeriveInput = parse_quote! {
            struct Flags {
                #[flag(name = "migration-dir", alias = "dir", env = "MIGRATION_DIR")]
                dir: String,
                #[flag]
                dry_run: bool,
                cache: u32,
            }
        };
        let out = expand(input, SchemaKind::Flags);

        assert!(out.contains("\"migration-dir\""));
        assert!(out.contains("\"MIGRATION_DIR\""));
        // No name is invented for a bare marker.
        assert!(out.contains("\"dry_run\""));
        assert!(!out.contains("\"dry-run\""));
        // Fields without the attribute are not described.
        assert!(!out.contains("\"cache\""));
    }

    #[test]
    fn test_unsupported_type_gets_no_assign_arm() {
        let input: DeriveInput = parse_quote! {
            struct Flags {
                #[flag(name = "path")]
                path: PathBuf,
            }
        };
        let out = expand(input, SchemaKind::Flags);
        assert!(out.contains("\"PathBuf\""));
        assert!(!out.contains("FromValue"));
    }

    #[test]
    fn test_custom_field_uses_flag_value() {
        let input: DeriveInput = parse_quote! {
            struct Flags {
                #[flag(name = "level", custom)]
                level: Level,
            }
        };
        let out = expand(input, SchemaKind::Flags);
        assert!(out.contains("CustomKind"));
        assert!(out.contains("from_custom"));
        assert!(!out.contains("FromValue"));
    }

    #[test]
    fn test_arg_set_rejects_env() {
        let input: DeriveInput = parse_quote! {
            struct Args {
                #[arg(name = "target", env = "TARGET")]
                target: String,
            }
        };
        let err = schema_derive_impl(input, SchemaKind::Args).unwrap_err();
        assert!(err.to_string().contains("not supported on positional arguments"));
    }

    #[test]
    fn test_arg_set_ignores_flag_attributes() {
        let input: DeriveInput = parse_quote! {
            struct Args {
                #[flag(name = "verbose")]
                verbose: bool,
                #[arg(name = "target")]
                target: String,
            }
        };
        let out = expand(input, SchemaKind::Args);
        assert!(out.contains("\"target\""));
        assert!(!out.contains("\"verbose\""));
    }

    #[test]
    fn test_rejects_tuple_structs_and_enums() {
        let input: DeriveInput = parse_quote! {
            struct Flags(bool);
        };
        let err = schema_derive_impl(input, SchemaKind::Flags).unwrap_err();
        assert!(err.to_string().contains("named fields"));

        let input: DeriveInput = parse_quote! {
            enum Flags { A, B }
        };
        let err = schema_derive_impl(input, SchemaKind::Args).unwrap_err();
        assert!(err.to_string().contains("ArgSet can only be derived for structs"));
    }
}
