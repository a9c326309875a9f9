//! Argument classification.
//!
//! The [`Tokenizer`] walks a raw argument list once, left to right, and
//! classifies each entry as a flag reference (with its value, if any) or a
//! positional token:
//!
//! ```text
//! --name value     long flag, value from the next token
//! --name=value     long flag, inline value
//! --switch         boolean flag, no value consumed
//! -a value         alias reference, same value rules
//! --               end of flags; everything after is positional
//! anything else    positional
//! ```
//!
//! It is an iterator so the dispatcher can stop at the first positional token
//! (the candidate subcommand name) without classifying the rest; [`tokenize`]
//! drives it to completion.

use crate::error::{Error, Result};
use crate::schema::FlagSpec;

/// A flag reference resolved against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagToken {
    /// Canonical name of the matched flag.
    pub name: &'static str,
    /// The reference as typed, without any inline value (`--dir`, `-v`).
    pub spelled: String,
    /// The value, inline or from the next token. `None` for a bare switch.
    pub value: Option<String>,
    /// Index of the reference in the argument list.
    pub index: usize,
}

/// One classified entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Flag(FlagToken),
    Positional {
        index: usize,
        value: String,
        /// True when the token came after a bare `--`.
        literal: bool,
    },
}

/// The result of classifying a whole argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub flags: Vec<FlagToken>,
    pub positionals: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Long,
    Short,
}

/// Single-pass classifier over an argument list.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    args: &'a [String],
    specs: &'a [FlagSpec],
    cursor: usize,
    terminated: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(args: &'a [String], specs: &'a [FlagSpec]) -> Self {
        Self {
            args,
            specs,
            cursor: 0,
            terminated: false,
        }
    }

    fn lookup(&self, key: &str, prefix: Prefix) -> Option<&'a FlagSpec> {
        let specs = self.specs;
        let by_name = || specs.iter().find(|spec| spec.name == key);
        let by_alias = || specs.iter().find(|spec| spec.has_alias(key));
        match prefix {
            Prefix::Long => by_name().or_else(by_alias),
            Prefix::Short => by_alias().or_else(by_name),
        }
    }

    fn flag(&mut self, index: usize, body: &str, prefix: Prefix) -> Result<Token> {
        let (key, inline) = match body.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (body, None),
        };
        let dashes = match prefix {
            Prefix::Long => "--",
            Prefix::Short => "-",
        };
        let spelled = format!("{dashes}{key}");

        let spec = match self.lookup(key, prefix) {
            Some(spec) if !key.is_empty() => spec,
            _ => return Err(Error::UnknownFlag { flag: spelled }),
        };

        let value = match inline {
            Some(value) => Some(value),
            None if spec.is_switch() => None,
            None => {
                let value = self.args.get(self.cursor).cloned().ok_or_else(|| {
                    Error::MissingFlagValue {
                        name: spec.name.to_string(),
                    }
                })?;
                self.cursor += 1;
                Some(value)
            }
        };

        Ok(Token::Flag(FlagToken {
            name: spec.name,
            spelled,
            value,
            index,
        }))
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        let args = self.args;
        loop {
            let index = self.cursor;
            let arg = args.get(index)?;
            self.cursor += 1;

            if self.terminated {
                return Some(Ok(Token::Positional {
                    index,
                    value: arg.clone(),
                    literal: true,
                }));
            }

            if arg == "--" {
                self.terminated = true;
                continue;
            }

            let result = if let Some(body) = arg.strip_prefix("--") {
                self.flag(index, body, Prefix::Long)
            } else if let Some(body) = arg.strip_prefix('-').filter(|body| !body.is_empty()) {
                self.flag(index, body, Prefix::Short)
            } else {
                Ok(Token::Positional {
                    index,
                    value: arg.clone(),
                    literal: false,
                })
            };

            // Nothing after an error is meaningful.
            if result.is_err() {
                self.cursor = self.args.len();
            }
            return Some(result);
        }
    }
}

/// Classifies a whole argument list against a flag schema.
pub fn tokenize(args: &[String], specs: &[FlagSpec]) -> Result<Tokens> {
    let mut tokens = Tokens::default();
    for token in Tokenizer::new(args, specs) {
        match token? {
            Token::Flag(flag) => tokens.flags.push(flag),
            Token::Positional { value, .. } => tokens.positionals.push(value),
        }
    }
    Ok(tokens)
}
