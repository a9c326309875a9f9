//! `migrate`: a small database-migration front end built on komandir.
//!
//! ```text
//! migrate [--migration-dir DIR] [-v] [-V] [up|down]
//! migrate status
//! migrate create [--timeout 30s] <name> [tags...]
//! ```
//!
//! The commands only report what they would do. Logging goes to stderr and
//! is controlled by `RUST_LOG`.

use std::process::ExitCode;
use std::time::Duration;

use komandir::{ArgSet, Command, Context, ErrorKind, FlagSet};
use tracing::{debug, error};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Default, FlagSet)]
struct MigrateFlags {
    #[flag(
        name = "migration-dir",
        alias = "dir",
        desc = "migration directory",
        env = "MIGRATION_DIR",
        default = "migrations"
    )]
    migration_directory: String,

    #[flag(name = "verbose", alias = "v", desc = "verbose output")]
    verbose: bool,

    #[flag(name = "version", alias = "V", desc = "version information")]
    version: bool,
}

#[derive(Debug, Default, ArgSet)]
struct MigrateArgs {
    #[arg(
        name = "direction",
        desc = "migration direction",
        choices("up", "down"),
        default = "up"
    )]
    direction: String,
}

#[derive(Debug, Default, FlagSet)]
struct CreateFlags {
    #[flag(name = "timeout", desc = "lock timeout", default = "30s")]
    timeout: Duration,
}

#[derive(Debug, Default, ArgSet)]
struct CreateArgs {
    #[arg(name = "name", desc = "migration name")]
    name: String,

    #[arg(name = "tags", desc = "labels for the new migration")]
    tags: Vec<String>,
}

fn migrate_plan(flags: &MigrateFlags, args: &MigrateArgs) -> String {
    if flags.version {
        return format!("migrate {}", env!("CARGO_PKG_VERSION"));
    }
    let mut plan = format!(
        "migrating {} using {}",
        args.direction, flags.migration_directory
    );
    if flags.verbose {
        plan.push_str(" (verbose)");
    }
    plan
}

fn create_plan(dir: &str, flags: &CreateFlags, args: &CreateArgs) -> String {
    let mut plan = format!(
        "creating {}/{}.sql (lock timeout {:?})",
        dir, args.name, flags.timeout
    );
    if !args.tags.is_empty() {
        plan.push_str(&format!(" tagged {}", args.tags.join(", ")));
    }
    plan
}

/// The migration directory bound on the root, as seen from a subcommand.
fn inherited_dir<F: komandir::Schema, A: komandir::Schema>(cmd: &Command<F, A>) -> String {
    cmd.inherited_flag("migration-dir")
        .and_then(|v| v.typed.as_str())
        .unwrap_or("migrations")
        .to_string()
}

fn reject_cancelled(ctx: &Context) -> anyhow::Result<()> {
    anyhow::ensure!(!ctx.is_cancelled(), "cancelled before start");
    anyhow::ensure!(!ctx.is_expired(), "deadline passed before start");
    Ok(())
}

fn command() -> Command<MigrateFlags, MigrateArgs> {
    let status = Command::<(), ()>::new("status")
        .alias("st")
        .short("show applied and pending migrations")
        .action(|_ctx, cmd| {
            println!("status of {}", inherited_dir(cmd));
            Ok(())
        });

    let create = Command::<CreateFlags, CreateArgs>::new("create")
        .short("create a new migration")
        .action(|_ctx, cmd| {
            println!("{}", create_plan(&inherited_dir(cmd), cmd.flags(), cmd.args()));
            Ok(())
        });

    Command::<MigrateFlags, MigrateArgs>::new("migrate")
        .short("apply or roll back migrations")
        .pre(reject_cancelled)
        .action(|_ctx, cmd| {
            debug!(flags = ?cmd.flags(), args = ?cmd.args(), "migrate");
            println!("{}", migrate_plan(cmd.flags(), cmd.args()));
            Ok(())
        })
        .subcommand(status)
        .subcommand(create)
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Usage | ErrorKind::Schema => 2,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let mut cmd = command();
    match cmd.exec_os(&Context::background()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = %err.kind(), "migrate failed");
            eprintln!("migrate: {err}");
            ExitCode::from(exit_code(err.kind()))
        }
    }
}
