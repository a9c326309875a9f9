//! Property tests for the tokenizer and binder.

use proptest::prelude::*;

use komandir::{bind_flags, introspect_flags, tokenize, FlagSet, FlagSpec, MockEnv, Value};

#[derive(Debug, Default, FlagSet)]
struct Flags {
    #[flag(name = "name", alias = "n")]
    name: String,
    #[flag(name = "count", alias = "c")]
    count: i64,
    #[flag(name = "verbose", alias = "v")]
    verbose: bool,
}

fn specs() -> Vec<FlagSpec> {
    introspect_flags::<Flags>().unwrap()
}

// Strategy for argument lists mixing known flags, values and positionals
fn arg_strategy() -> impl Strategy<Value = Vec<String>> {
    let arg = prop_oneof![
        Just("--name".to_string()),
        Just("-n".to_string()),
        Just("--count".to_string()),
        Just("-v".to_string()),
        Just("--verbose=false".to_string()),
        Just("--".to_string()),
        Just("--unknown".to_string()),
        "[a-z0-9]{1,6}",
        "-?[0-9]{1,4}",
    ];
    prop::collection::vec(arg, 0..12)
}

proptest! {
    #[test]
    fn test_tokenize_is_deterministic(args in arg_strategy()) {
        let specs = specs();
        let first = tokenize(&args, &specs);
        let second = tokenize(&args, &specs);
        prop_assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn test_inline_and_separate_values_are_equivalent(value in "[a-zA-Z0-9 ./=-]{0,16}") {
        let specs = specs();
        let inline = vec![format!("--name={value}")];
        let separate = vec!["--name".to_string(), value.clone()];

        let inline = tokenize(&inline, &specs).unwrap();
        let separate = tokenize(&separate, &specs).unwrap();
        prop_assert_eq!(&inline.flags[0].value, &separate.flags[0].value);
        prop_assert_eq!(&inline.positionals, &separate.positionals);

        let env = MockEnv::new();
        let inline = bind_flags(&specs, &inline.flags, &env).unwrap();
        let separate = bind_flags(&specs, &separate.flags, &env).unwrap();
        prop_assert_eq!(inline.typed("name"), Some(&Value::String(value.clone())));
        prop_assert_eq!(inline, separate);
    }

    #[test]
    fn test_positionals_survive_in_order(words in prop::collection::vec("[a-z]{1,8}", 0..8)) {
        let specs = specs();
        let mut args = vec!["-v".to_string()];
        args.extend(words.iter().cloned());

        let tokens = tokenize(&args, &specs).unwrap();
        prop_assert_eq!(tokens.positionals, words);
    }

    #[test]
    fn test_everything_after_double_dash_is_positional(tail in arg_strategy()) {
        let specs = specs();
        let mut args = vec!["--".to_string()];
        args.extend(tail.iter().cloned());

        let tokens = tokenize(&args, &specs).unwrap();
        prop_assert!(tokens.flags.is_empty());
        prop_assert_eq!(tokens.positionals, tail);
    }

    #[test]
    fn test_integer_values_roundtrip(n in any::<i64>()) {
        let specs = specs();
        let args = vec!["--count".to_string(), n.to_string()];
        let tokens = tokenize(&args, &specs).unwrap();
        let bindings = bind_flags(&specs, &tokens.flags, &MockEnv::new()).unwrap();
        prop_assert_eq!(bindings.typed("count"), Some(&Value::Integer(n.into())));
    }
}
