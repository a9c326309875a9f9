//! Attribute parsing for the `FlagSet` and `ArgSet` derive macros.
//!
//! Both derives read the same key set:
//!
//! ```text
//! #[flag(name = "migration-dir", alias = "dir", desc = "...", env = "MIGRATION_DIR",
//!        default = "migrations", choices("a", "b"))]
//! #[arg(name = "direction", desc = "...", default = "up", choices("up", "down"))]
//! #[flag(name = "level", custom)]
//! ```
//!
//! `alias` may repeat. `custom` marks a field whose type implements
//! `komandir::FlagValue`. Keys that make no sense for positional arguments are
//! rejected by [`FieldAttr::reject_for_args`].

use proc_macro2::Span;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Error, Expr, ExprLit, Lit, LitStr, Meta, Result, Token,
};

/// Field-level attributes from `#[flag(...)]` or `#[arg(...)]`.
#[derive(Debug, Clone)]
pub struct FieldAttr {
    pub name: Option<String>,
    pub aliases: Vec<String>,
    pub desc: Option<String>,
    pub env: Option<String>,
    pub default: Option<String>,
    pub choices: Vec<String>,
    pub custom: bool,
    /// Span of each key, for error reporting.
    pub keys: Vec<(String, Span)>,
}

impl Default for FieldAttr {
    fn default() -> Self {
        FieldAttr {
            name: None,
            aliases: Vec::new(),
            desc: None,
            env: None,
            default: None,
            choices: Vec::new(),
            custom: false,
            keys: Vec::new(),
        }
    }
}

impl FieldAttr {
    /// Errors on keys that only apply to flags.
    pub fn reject_for_args(&self) -> Result<()> {
        for (key, span) in &self.keys {
            if key == "alias" || key == "env" {
                return Err(Error::new(
                    *span,
                    format!("`{}` is not supported on positional arguments", key),
                ));
            }
        }
        Ok(())
    }
}

fn string_value(value: &Expr, key: &str) -> Result<String> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        _ => Err(Error::new(
            value.span(),
            format!("{} must be a string literal", key),
        )),
    }
}

impl Parse for FieldAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = FieldAttr::default();

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                // name = "...", alias = "...", etc.
                Meta::NameValue(nv) => {
                    let key = nv
                        .path
                        .get_ident()
                        .map(|ident| ident.to_string())
                        .unwrap_or_default();
                    let value = string_value(&nv.value, &key)?;
                    match key.as_str() {
                        "name" => attr.name = Some(value),
                        "alias" => attr.aliases.push(value),
                        "desc" => attr.desc = Some(value),
                        "env" => attr.env = Some(value),
                        "default" => attr.default = Some(value),
                        _ => {
                            return Err(Error::new(
                                nv.path.span(),
                                "unknown attribute. Expected: name, alias, desc, env, default, choices(...) or custom",
                            ))
                        }
                    }
                    attr.keys.push((key, nv.path.span()));
                }

                // choices("a", "b")
                Meta::List(list) if list.path.is_ident("choices") => {
                    let values = list
                        .parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated)?;
                    if values.is_empty() {
                        return Err(Error::new(list.span(), "choices must not be empty"));
                    }
                    attr.choices = values.iter().map(LitStr::value).collect();
                    attr.keys.push(("choices".to_string(), list.path.span()));
                }

                // custom
                Meta::Path(path) if path.is_ident("custom") => {
                    attr.custom = true;
                    attr.keys.push(("custom".to_string(), path.span()));
                }

                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown attribute. Expected: name = \"...\", alias = \"...\", desc = \"...\", env = \"...\", default = \"...\", choices(...) or custom",
                    ));
                }
            }
        }

        Ok(attr)
    }
}

/// Extracts the `#[<marker>(...)]` attribute from a field, if present.
///
/// A bare `#[flag]` yields default attributes, which carry no name.
pub fn parse_field_attrs(attrs: &[Attribute], marker: &str) -> Result<Option<FieldAttr>> {
    for attr in attrs {
        if !attr.path().is_ident(marker) {
            continue;
        }
        return match &attr.meta {
            Meta::Path(_) => Ok(Some(FieldAttr::default())),
            _ => attr.parse_args::<FieldAttr>().map(Some),
        };
    }
    Ok(None)
}
