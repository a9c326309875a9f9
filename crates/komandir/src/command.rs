//! Command nodes and dispatch.
//!
//! A [`Command`] owns a flag schema, an argument schema, its children, its
//! hooks and its action. A tree is declared once with the builder methods and
//! run with [`Command::exec`]:
//!
//! ```text
//! exec(ctx, argv)
//!   → prepare the whole tree (introspect every node's schemas)
//!   → walk down: the first positional token selects a child, if one matches
//!   → parse the target (tokenize, bind, assign into the records)
//!   → pre hook → action → post hook
//!   → discard specs and bindings
//! ```
//!
//! Flags written before a subcommand name are parsed against the parent's flag
//! schema. The child sees them through [`Command::inherited_flag`].
//!
//! # Example
//!
//! ```rust
//! use komandir::{Command, Context};
//!
//! let mut root = Command::<(), ()>::new("migrate").subcommand(
//!     Command::<(), ()>::new("status")
//!         .alias("st")
//!         .action(|_ctx, cmd| {
//!             assert_eq!(cmd.path(), ["migrate", "status"]);
//!             Ok(())
//!         }),
//! );
//!
//! root.exec(&Context::background(), ["st"])?;
//! # Ok::<(), komandir::Error>(())
//! ```

use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::bind::{apply, bind_args, bind_flags, Bindings, ParsedValue};
use crate::context::Context;
use crate::env::{EnvReader, RealEnv};
use crate::error::{Error, Result};
use crate::hooks::{run_hook, Hook, HookPhase};
use crate::schema::{introspect_args, introspect_flags, ArgSpec, FlagSpec, Schema};
use crate::tokenize::{tokenize, Token, Tokenizer};

/// Where a node is in its per-invocation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Declared; no specs yet.
    Unprepared,
    /// Specs introspected.
    Prepared,
    /// Flags (and, for the target, arguments) bound.
    Parsed,
    /// Hooks and action running.
    Executing,
    /// The invocation that went through this node has returned.
    Done,
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandState::Unprepared => write!(f, "unprepared"),
            CommandState::Prepared => write!(f, "prepared"),
            CommandState::Parsed => write!(f, "parsed"),
            CommandState::Executing => write!(f, "executing"),
            CommandState::Done => write!(f, "done"),
        }
    }
}

/// What a node inherits from the nodes above it during dispatch.
#[derive(Clone)]
pub struct Scope {
    env: Arc<dyn EnvReader>,
    inherited: Vec<Bindings>,
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            env: Arc::new(RealEnv),
            inherited: Vec::new(),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("inherited", &self.inherited)
            .finish_non_exhaustive()
    }
}

/// A command node with its schema types erased.
///
/// Implemented by every [`Command`]; children are stored as `Box<dyn Node>`
/// so one parent can own children with different schemas.
pub trait Node {
    fn name(&self) -> &str;

    fn aliases(&self) -> &[String];

    fn short_description(&self) -> &str;

    /// Exact, case-sensitive match against the name and aliases.
    fn matches_name(&self, candidate: &str) -> bool {
        self.name() == candidate || self.aliases().iter().any(|alias| alias == candidate)
    }

    fn state(&self) -> CommandState;

    /// The command path from the root, e.g. `["migrate", "create"]`.
    fn path(&self) -> &[String];

    fn subcommands(&self) -> &[Box<dyn Node>];

    /// Introspects this node and every descendant.
    fn prepare_at(&mut self, parent_path: &[String]) -> Result<()>;

    /// Tokenizes and binds this node's own flags and arguments.
    fn parse_args(&mut self, args: &[String]) -> Result<()>;

    /// Resolves the target below this node and runs it.
    fn dispatch(&mut self, ctx: &Context, args: &[String], scope: Scope) -> Result<()>;

    /// Drops everything bound during the invocation.
    fn finish(&mut self);
}

type Action<F, A> = Box<dyn Fn(&Context, &Command<F, A>) -> anyhow::Result<()>>;

/// A node of the command tree, parameterized by its flag and argument schemas.
pub struct Command<F: Schema = (), A: Schema = ()> {
    name: String,
    aliases: Vec<String>,
    short: String,
    pre: Option<Box<dyn Hook>>,
    post: Option<Box<dyn Hook>>,
    action: Option<Action<F, A>>,
    children: Vec<Box<dyn Node>>,
    env: Option<Arc<dyn EnvReader>>,

    state: CommandState,
    on_path: bool,
    path: Vec<String>,
    flag_specs: Vec<FlagSpec>,
    arg_specs: Vec<ArgSpec>,
    flags: F,
    args: A,
    flag_bindings: Bindings,
    arg_bindings: Bindings,
    inherited: Vec<Bindings>,
}

impl<F: Schema, A: Schema> Command<F, A> {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: vec![name.clone()],
            name,
            aliases: Vec::new(),
            short: String::new(),
            pre: None,
            post: None,
            action: None,
            children: Vec::new(),
            env: None,
            state: CommandState::Unprepared,
            on_path: false,
            flag_specs: Vec::new(),
            arg_specs: Vec::new(),
            flags: F::default(),
            args: A::default(),
            flag_bindings: Bindings::default(),
            arg_bindings: Bindings::default(),
            inherited: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// One-line description.
    pub fn short(mut self, description: impl Into<String>) -> Self {
        self.short = description.into();
        self
    }

    /// Runs before the action. An error skips the action and the post hook.
    pub fn pre<H>(self, hook: H) -> Self
    where
        H: Fn(&Context) -> anyhow::Result<()> + 'static,
    {
        self.pre_hook(hook)
    }

    /// Runs after the action, whether or not it succeeded.
    pub fn post<H>(self, hook: H) -> Self
    where
        H: Fn(&Context) -> anyhow::Result<()> + 'static,
    {
        self.post_hook(hook)
    }

    /// Like [`pre`](Self::pre), for any [`Hook`] implementation.
    pub fn pre_hook(mut self, hook: impl Hook + 'static) -> Self {
        self.pre = Some(Box::new(hook));
        self
    }

    /// Like [`post`](Self::post), for any [`Hook`] implementation.
    pub fn post_hook(mut self, hook: impl Hook + 'static) -> Self {
        self.post = Some(Box::new(hook));
        self
    }

    pub fn action<G>(mut self, action: G) -> Self
    where
        G: Fn(&Context, &Self) -> anyhow::Result<()> + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }

    /// Adds a child. Children are matched in the order they were added.
    pub fn subcommand<N: Node + 'static>(mut self, child: N) -> Self {
        self.children.push(Box::new(child));
        self
    }

    /// Reads environment fallbacks for this node and its descendants from
    /// `reader` instead of the process environment.
    pub fn env_reader(mut self, reader: Arc<dyn EnvReader>) -> Self {
        self.env = Some(reader);
        self
    }

    /// Introspects this node and its whole subtree.
    ///
    /// Idempotent: a node that is already prepared keeps its specs.
    pub fn prepare(&mut self) -> Result<()> {
        self.prepare_at(&[])
    }

    /// Tokenizes `args` and binds this node's flags and arguments.
    ///
    /// Only valid on a prepared node; a second call is `InvalidState`.
    pub fn parse<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        self.parse_args(&args)
    }

    /// Runs the command tree against `args` (without the program name).
    ///
    /// Blank arguments are dropped first. Specs and bindings are discarded
    /// when this returns, whatever the outcome.
    pub fn exec<I, S>(&mut self, ctx: &Context, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args
            .into_iter()
            .map(Into::into)
            .filter(|arg: &String| !arg.trim().is_empty())
            .collect();

        let result = self
            .prepare()
            .and_then(|()| self.dispatch(ctx, &args, Scope::default()));
        self.finish();
        result
    }

    /// [`exec`](Self::exec) with the process arguments.
    ///
    /// An argument that is not valid UTF-8 is `InvalidEncoding`; nothing is
    /// prepared or run.
    pub fn exec_os(&mut self, ctx: &Context) -> Result<()> {
        let args = utf8_args(std::env::args_os().skip(1))?;
        self.exec(ctx, args)
    }

    /// The populated flag record.
    pub fn flags(&self) -> &F {
        &self.flags
    }

    /// The populated argument record.
    pub fn args(&self) -> &A {
        &self.args
    }

    pub fn flag_value(&self, name: &str) -> Option<&ParsedValue> {
        self.flag_bindings.get(name)
    }

    pub fn arg_value(&self, name: &str) -> Option<&ParsedValue> {
        self.arg_bindings.get(name)
    }

    pub fn flag_bindings(&self) -> &Bindings {
        &self.flag_bindings
    }

    pub fn arg_bindings(&self) -> &Bindings {
        &self.arg_bindings
    }

    /// A flag bound on an ancestor, nearest ancestor first.
    pub fn inherited_flag(&self, name: &str) -> Option<&ParsedValue> {
        self.inherited
            .iter()
            .rev()
            .find_map(|bindings| bindings.get(name))
    }

    pub fn flag_specs(&self) -> &[FlagSpec] {
        &self.flag_specs
    }

    pub fn arg_specs(&self) -> &[ArgSpec] {
        &self.arg_specs
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    pub fn subcommands(&self) -> &[Box<dyn Node>] {
        &self.children
    }

    fn display_path(&self) -> String {
        self.path.join(" ")
    }

    fn expect_state(&self, expected: CommandState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                command: self.display_path(),
                expected,
                found: self.state,
            })
        }
    }

    fn reset(&mut self) {
        self.flag_specs.clear();
        self.arg_specs.clear();
        self.flags = F::default();
        self.args = A::default();
        self.flag_bindings = Bindings::default();
        self.arg_bindings = Bindings::default();
        self.inherited.clear();
    }

    fn parse_with(&mut self, args: &[String], env_reader: &dyn EnvReader) -> Result<()> {
        self.expect_state(CommandState::Prepared)?;

        let tokens = tokenize(args, &self.flag_specs)?;
        let flag_bindings = bind_flags(&self.flag_specs, &tokens.flags, env_reader)?;
        let arg_bindings = bind_args(&self.arg_specs, &tokens.positionals)?;
        apply(&mut self.flags, &self.flag_specs, &flag_bindings)?;
        apply(&mut self.args, &self.arg_specs, &arg_bindings)?;

        debug!(
            command = %self.display_path(),
            flags = flag_bindings.len(),
            args = arg_bindings.len(),
            "parsed"
        );
        self.flag_bindings = flag_bindings;
        self.arg_bindings = arg_bindings;
        self.state = CommandState::Parsed;
        Ok(())
    }

    /// Binds only the flags written before a subcommand name.
    fn parse_prefix(&mut self, prefix: &[String], env_reader: &dyn EnvReader) -> Result<()> {
        self.expect_state(CommandState::Prepared)?;

        let tokens = tokenize(prefix, &self.flag_specs)?;
        let flag_bindings = bind_flags(&self.flag_specs, &tokens.flags, env_reader)?;
        apply(&mut self.flags, &self.flag_specs, &flag_bindings)?;

        self.flag_bindings = flag_bindings;
        self.state = CommandState::Parsed;
        Ok(())
    }

    /// Finds the child named by the first positional token.
    ///
    /// Returns the token's index and the child's index. Tokens after `--`
    /// never select a child.
    fn select_child(&self, args: &[String]) -> Result<Option<(usize, usize)>> {
        if self.children.is_empty() {
            return Ok(None);
        }

        for token in Tokenizer::new(args, &self.flag_specs) {
            match token? {
                Token::Flag(_) => continue,
                Token::Positional { literal: true, .. } => break,
                Token::Positional { index, value, .. } => {
                    return Ok(self
                        .children
                        .iter()
                        .position(|child| child.matches_name(&value))
                        .map(|child| (index, child)));
                }
            }
        }
        Ok(None)
    }

    fn run(&mut self, ctx: &Context) -> Result<()> {
        if self.action.is_none() {
            return Err(Error::MissingAction {
                command: self.display_path(),
            });
        }

        self.state = CommandState::Executing;
        debug!(command = %self.display_path(), "running pre hook");
        run_hook(self.pre.as_deref(), HookPhase::Pre, ctx)?;

        debug!(command = %self.display_path(), "running action");
        let outcome = match &self.action {
            Some(action) => action(ctx, self).map_err(Error::Action),
            None => Ok(()),
        };

        debug!(command = %self.display_path(), "running post hook");
        let post = run_hook(self.post.as_deref(), HookPhase::Post, ctx);

        self.state = CommandState::Done;
        outcome?;
        post?;
        Ok(())
    }
}

impl<F: Schema, A: Schema> Node for Command<F, A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn aliases(&self) -> &[String] {
        &self.aliases
    }

    fn short_description(&self) -> &str {
        &self.short
    }

    fn state(&self) -> CommandState {
        self.state
    }

    fn path(&self) -> &[String] {
        &self.path
    }

    fn subcommands(&self) -> &[Box<dyn Node>] {
        &self.children
    }

    fn prepare_at(&mut self, parent_path: &[String]) -> Result<()> {
        self.path = parent_path
            .iter()
            .cloned()
            .chain(std::iter::once(self.name.clone()))
            .collect();

        if matches!(self.state, CommandState::Unprepared | CommandState::Done) {
            self.reset();
            self.flag_specs = introspect_flags::<F>()?;
            self.arg_specs = introspect_args::<A>()?;
            self.state = CommandState::Prepared;
            debug!(
                command = %self.display_path(),
                flags = self.flag_specs.len(),
                args = self.arg_specs.len(),
                "prepared"
            );
        }

        for child in &mut self.children {
            child.prepare_at(&self.path)?;
        }
        Ok(())
    }

    fn parse_args(&mut self, args: &[String]) -> Result<()> {
        let env_reader = self.env.clone().unwrap_or_else(|| Arc::new(RealEnv));
        self.parse_with(args, env_reader.as_ref())
    }

    fn dispatch(&mut self, ctx: &Context, args: &[String], scope: Scope) -> Result<()> {
        self.on_path = true;
        let env_reader = self.env.clone().unwrap_or(scope.env);
        self.inherited = scope.inherited;

        match self.select_child(args)? {
            Some((index, child)) => {
                self.parse_prefix(&args[..index], env_reader.as_ref())?;

                let mut inherited = self.inherited.clone();
                inherited.push(self.flag_bindings.clone());

                let target = &mut self.children[child];
                debug!(
                    command = %self.path.join(" "),
                    child = target.name(),
                    "dispatching to subcommand"
                );
                target.dispatch(
                    ctx,
                    &args[index + 1..],
                    Scope {
                        env: env_reader,
                        inherited,
                    },
                )
            }
            None => {
                self.parse_with(args, env_reader.as_ref())?;
                self.run(ctx)
            }
        }
    }

    fn finish(&mut self) {
        self.reset();
        self.state = if self.on_path {
            CommandState::Done
        } else {
            CommandState::Unprepared
        };
        self.on_path = false;
        for child in &mut self.children {
            child.finish();
        }
    }
}

impl<F: Schema, A: Schema> fmt::Debug for Command<F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("state", &self.state)
            .field("path", &self.path)
            .field("subcommands", &self.children.len())
            .finish_non_exhaustive()
    }
}

/// Converts process arguments, rejecting the first one that is not UTF-8.
/// Positions count from 1, the first argument after the program name.
fn utf8_args<I: IntoIterator<Item = OsString>>(args: I) -> Result<Vec<String>> {
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            arg.into_string().map_err(|raw| Error::InvalidEncoding {
                position: index + 1,
                value: raw.to_string_lossy().into_owned(),
            })
        })
        .collect()
}
