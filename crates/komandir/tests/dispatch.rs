//! End-to-end dispatch scenarios on derived schemas.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use komandir::{
    ArgSet, Command, CommandState, Context, Error, ErrorKind, FlagSet, HookPhase, MockEnv, Node,
    ValueSource,
};

#[derive(Debug, Default, Clone, PartialEq, FlagSet)]
struct ServeFlags {
    #[flag(name = "port", alias = "p", env = "PORT", default = "5")]
    port: u16,
    #[flag(name = "verbose", alias = "v")]
    verbose: bool,
    #[flag(name = "host")]
    host: String,
}

#[derive(Debug, Default, Clone, PartialEq, ArgSet)]
struct ServeArgs {
    #[arg(name = "root")]
    root: String,
}

#[derive(Debug, Default, Clone, PartialEq, FlagSet)]
struct ChildFlags {
    #[flag(name = "x")]
    x: i64,
}

type Seen<T> = Rc<RefCell<Option<T>>>;

fn seen<T>() -> Seen<T> {
    Rc::new(RefCell::new(None))
}

fn serve(env: MockEnv, seen: &Seen<(ServeFlags, ValueSource)>) -> Command<ServeFlags, ServeArgs> {
    let seen = Rc::clone(seen);
    Command::<ServeFlags, ServeArgs>::new("serve")
        .env_reader(Arc::new(env))
        .action(move |_, cmd| {
            let source = cmd.flag_value("port").map(|v| v.source);
            *seen.borrow_mut() = Some((cmd.flags().clone(), source.unwrap_or(ValueSource::Zero)));
            Ok(())
        })
}

// =============================================================================
// Binding
// =============================================================================

#[test]
fn test_inline_and_separate_values_bind_identically() {
    let inline = seen();
    serve(MockEnv::new(), &inline)
        .exec(&Context::background(), ["--host=example.org", "www"])
        .unwrap();

    let separate = seen();
    serve(MockEnv::new(), &separate)
        .exec(&Context::background(), ["--host", "example.org", "www"])
        .unwrap();

    assert_eq!(*inline.borrow(), *separate.borrow());
    assert_eq!(inline.borrow().as_ref().unwrap().0.host, "example.org");
}

#[test]
fn test_switch_forms() {
    let cases: [(&[&str], bool); 4] = [
        (&["--verbose", "www"], true),
        (&["--verbose=false", "www"], false),
        (&["-v=1", "www"], true),
        (&["www"], false),
    ];

    for (args, expected) in cases {
        let seen = seen();
        serve(MockEnv::new(), &seen)
            .exec(&Context::background(), args.iter().copied())
            .unwrap();
        assert_eq!(seen.borrow().as_ref().unwrap().0.verbose, expected, "{args:?}");
    }
}

#[test]
fn test_precedence() {
    let with_env = || MockEnv::new().with_var("PORT", "7");

    let seen_all = seen();
    serve(with_env(), &seen_all)
        .exec(&Context::background(), ["--port", "9", "www"])
        .unwrap();
    assert_eq!(
        seen_all.borrow().as_ref().map(|(f, s)| (f.port, *s)),
        Some((9, ValueSource::Explicit))
    );

    let seen_env = seen();
    serve(with_env(), &seen_env)
        .exec(&Context::background(), ["www"])
        .unwrap();
    assert_eq!(
        seen_env.borrow().as_ref().map(|(f, s)| (f.port, *s)),
        Some((7, ValueSource::Environment))
    );

    let seen_default = seen();
    serve(MockEnv::new(), &seen_default)
        .exec(&Context::background(), ["www"])
        .unwrap();
    assert_eq!(
        seen_default.borrow().as_ref().map(|(f, s)| (f.port, *s)),
        Some((5, ValueSource::Default))
    );
}

#[test]
fn test_empty_env_counts_as_unset() {
    let seen = seen();
    serve(MockEnv::new().with_var("PORT", ""), &seen)
        .exec(&Context::background(), ["www"])
        .unwrap();
    assert_eq!(seen.borrow().as_ref().unwrap().0.port, 5);
}

#[test]
fn test_invalid_env_value() {
    let seen = seen();
    let err = serve(MockEnv::new().with_var("PORT", "http"), &seen)
        .exec(&Context::background(), ["www"])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFlagValue { ref name, ref value, .. }
        if name == "port" && value == "http"));
    assert!(seen.borrow().is_none());
}

#[test]
fn test_out_of_range_value() {
    let seen = seen();
    let err = serve(MockEnv::new(), &seen)
        .exec(&Context::background(), ["--port", "70000", "www"])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFlagValue { ref name, .. } if name == "port"));
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[derive(Debug, Default, FlagSet)]
struct LimitFlags {
    #[flag(name = "max-bytes", env = "MAX_BYTES")]
    max_bytes: u64,
    #[flag(name = "offset")]
    offset: i64,
}

#[test]
fn test_unsigned_64_bit_range() {
    let bound = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&bound);
    let mut cmd = Command::<LimitFlags, ()>::new("limit")
        .env_reader(Arc::new(MockEnv::new().with_var("MAX_BYTES", "0xffffffffffffffff")))
        .action(move |_, cmd| {
            *sink.borrow_mut() = Some((cmd.flags().max_bytes, cmd.flags().offset));
            Ok(())
        });

    cmd.exec(&Context::background(), ["--offset", "-9223372036854775808"])
        .unwrap();
    assert_eq!(*bound.borrow(), Some((u64::MAX, i64::MIN)));

    cmd.exec(&Context::background(), ["--max-bytes", "18446744073709551615"])
        .unwrap();
    assert_eq!(*bound.borrow(), Some((u64::MAX, 0)));

    let err = cmd
        .exec(&Context::background(), ["--offset", "18446744073709551615"])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFlagValue { ref name, .. } if name == "offset"));

    let err = cmd
        .exec(&Context::background(), ["--max-bytes", "-1"])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidFlagValue { ref name, .. } if name == "max-bytes"));
}

// =============================================================================
// Usage errors
// =============================================================================

#[test]
fn test_unknown_flag_never_runs_action() {
    let seen = seen();
    let err = serve(MockEnv::new(), &seen)
        .exec(&Context::background(), ["--bogus"])
        .unwrap_err();
    assert!(matches!(err, Error::UnknownFlag { ref flag } if flag == "--bogus"));
    assert!(err.is_usage_error());
    assert!(seen.borrow().is_none());
}

#[test]
fn test_missing_flag_value() {
    let seen = seen();
    let err = serve(MockEnv::new(), &seen)
        .exec(&Context::background(), ["www", "--host"])
        .unwrap_err();
    assert!(matches!(err, Error::MissingFlagValue { ref name } if name == "host"));
}

#[test]
fn test_unexpected_argument() {
    let seen = seen();
    let err = serve(MockEnv::new(), &seen)
        .exec(&Context::background(), ["www", "extra"])
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedArgument { ref value } if value == "extra"));
}

#[test]
fn test_missing_argument_before_any_hook() {
    let hooks = Rc::new(RefCell::new(Vec::new()));
    let pre_hooks = Rc::clone(&hooks);

    let mut cmd = Command::<ServeFlags, ServeArgs>::new("serve")
        .env_reader(Arc::new(MockEnv::new()))
        .pre(move |_: &Context| -> anyhow::Result<()> {
            pre_hooks.borrow_mut().push("pre");
            Ok(())
        })
        .action(|_, _| Ok(()));

    let err = cmd.exec(&Context::background(), ["-v"]).unwrap_err();
    assert!(matches!(err, Error::MissingArgument { ref name } if name == "root"));
    assert!(hooks.borrow().is_empty());
}

// =============================================================================
// Subcommands
// =============================================================================

fn tree(ran: &Rc<RefCell<Vec<String>>>) -> Command<ServeFlags, ()> {
    let root_ran = Rc::clone(ran);
    let child_ran = Rc::clone(ran);

    Command::<ServeFlags, ()>::new("r")
        .env_reader(Arc::new(MockEnv::new()))
        .action(move |_, _| {
            root_ran.borrow_mut().push("R".into());
            Ok(())
        })
        .subcommand(
            Command::<ChildFlags, ()>::new("child")
                .alias("c")
                .short("the child")
                .action(move |_, cmd| {
                    let verbose = cmd
                        .inherited_flag("verbose")
                        .and_then(|v| v.typed.as_bool())
                        .unwrap_or(false);
                    child_ran
                        .borrow_mut()
                        .push(format!("C x={} verbose={}", cmd.flags().x, verbose));
                    Ok(())
                }),
        )
}

#[test]
fn test_child_runs_instead_of_root() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    tree(&ran)
        .exec(&Context::background(), ["c", "--x", "1"])
        .unwrap();
    assert_eq!(*ran.borrow(), vec!["C x=1 verbose=false"]);
}

#[test]
fn test_root_runs_without_child_name() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    tree(&ran).exec(&Context::background(), ["-v"]).unwrap();
    assert_eq!(*ran.borrow(), vec!["R"]);
}

#[test]
fn test_parent_flags_before_child_name() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    tree(&ran)
        .exec(&Context::background(), ["-v", "--port", "8", "child", "--x=2"])
        .unwrap();
    assert_eq!(*ran.borrow(), vec!["C x=2 verbose=true"]);
}

#[test]
fn test_child_flag_before_child_name_is_unknown() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    let err = tree(&ran)
        .exec(&Context::background(), ["--x", "1", "child"])
        .unwrap_err();
    assert!(matches!(err, Error::UnknownFlag { .. }));
    assert!(ran.borrow().is_empty());
}

#[test]
fn test_child_name_is_case_sensitive() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    let err = tree(&ran)
        .exec(&Context::background(), ["Child"])
        .unwrap_err();
    assert!(matches!(err, Error::UnexpectedArgument { ref value } if value == "Child"));
}

#[test]
fn test_tree_introspection() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    let mut root = tree(&ran);
    root.prepare().unwrap();

    let child = &root.subcommands()[0];
    assert_eq!(child.name(), "child");
    assert_eq!(child.aliases(), ["c"]);
    assert_eq!(child.short_description(), "the child");
    assert_eq!(child.path(), ["r", "child"]);
    assert_eq!(child.state(), CommandState::Prepared);
    assert_eq!(root.flag_specs().len(), 3);
}

#[test]
fn test_tree_is_reusable() {
    let ran = Rc::new(RefCell::new(Vec::new()));
    let mut root = tree(&ran);

    root.exec(&Context::background(), ["c", "--x", "1"]).unwrap();
    root.exec(&Context::background(), ["child", "--x", "2"]).unwrap();
    root.exec(&Context::background(), Vec::<String>::new()).unwrap();

    assert_eq!(
        *ran.borrow(),
        vec!["C x=1 verbose=false", "C x=2 verbose=false", "R"]
    );
}

// =============================================================================
// Hooks and context
// =============================================================================

#[test]
fn test_hooks_see_the_same_context() {
    struct RequestId(u32);

    let log = Rc::new(RefCell::new(Vec::new()));
    let pre_log = Rc::clone(&log);
    let post_log = Rc::clone(&log);
    let action_log = Rc::clone(&log);

    let mut cmd = Command::<(), ()>::new("run")
        .pre(move |ctx: &Context| -> anyhow::Result<()> {
            pre_log
                .borrow_mut()
                .push(format!("pre {}", ctx.value_required::<RequestId>()?.0));
            Ok(())
        })
        .post(move |ctx: &Context| -> anyhow::Result<()> {
            post_log
                .borrow_mut()
                .push(format!("post {}", ctx.value_required::<RequestId>()?.0));
            Ok(())
        })
        .action(move |ctx, _| {
            action_log
                .borrow_mut()
                .push(format!("action {}", ctx.value_required::<RequestId>()?.0));
            Ok(())
        });

    let ctx = Context::background().with_value(RequestId(7));
    cmd.exec(&ctx, Vec::<String>::new()).unwrap();
    assert_eq!(*log.borrow(), vec!["pre 7", "action 7", "post 7"]);
}

#[test]
fn test_pre_hook_can_reject_a_cancelled_context() {
    let mut cmd = Command::<(), ()>::new("run")
        .pre(|ctx: &Context| -> anyhow::Result<()> {
            anyhow::ensure!(!ctx.is_done(), "cancelled");
            Ok(())
        })
        .action(|_, _| panic!("action ran"));

    let ctx = Context::background();
    ctx.cancel_handle().cancel();

    let err = cmd.exec(&ctx, Vec::<String>::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Hook);
    assert!(matches!(err, Error::Hook(ref hook) if hook.phase == HookPhase::Pre));
}

#[test]
fn test_action_sees_deadline() {
    let mut cmd = Command::<(), ()>::new("run").action(|ctx, _| {
        anyhow::ensure!(ctx.deadline().is_some(), "no deadline");
        anyhow::ensure!(!ctx.is_expired(), "expired");
        Ok(())
    });

    let ctx = Context::background().with_timeout(Duration::from_secs(60));
    cmd.exec(&ctx, Vec::<String>::new()).unwrap();
}

#[test]
fn test_action_error_is_returned_unchanged() {
    #[derive(Debug, thiserror::Error)]
    #[error("lock held by {0}")]
    struct LockHeld(u32);

    let mut cmd = Command::<(), ()>::new("run").action(|_, _| Err(LockHeld(42).into()));

    let err = cmd.exec(&Context::background(), Vec::<String>::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Action);
    let source = err.as_action_error().unwrap();
    assert_eq!(source.downcast_ref::<LockHeld>().map(|l| l.0), Some(42));
}
