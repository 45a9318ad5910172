use proptest::prelude::*;
use scriptctx::helpers::{format_timestamp_in, sprintf};
use scriptctx::{Environment, ScriptContext};
use serde_json::{json, Value};

proptest! {
    /// sprintf must return Ok or Err for any format string, never panic.
    #[test]
    fn sprintf_does_not_panic(fmt in "\\PC*", n in any::<i64>(), s in "\\PC*") {
        let _ = sprintf(&fmt, &[json!(n), json!(s)]);
    }

    /// Width and precision of any size are either honoured or rejected.
    #[test]
    fn sprintf_survives_any_field_size(
        width in any::<u64>(),
        prec in any::<u64>(),
        verb in prop::sample::select(vec!['d', 's', 'f', 'e', 'g', 'x', 'q']),
    ) {
        let fmt = format!("%{width}.{prec}{verb}");
        let _ = sprintf(&fmt, &[json!(1)]);
    }
}

proptest! {
    /// Text without directives passes through unchanged.
    #[test]
    fn sprintf_plain_text_is_identity(s in "[^%]*") {
        prop_assert_eq!(sprintf(&s, &[]).unwrap(), s);
    }
}

proptest! {
    /// Invalid patterns are reported, not panicked on.
    #[test]
    fn format_timestamp_does_not_panic(secs in -10_000_000_000i64..10_000_000_000i64, pat in "\\PC*") {
        let _ = format_timestamp_in(&chrono::Utc, secs, Some(&pat));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A value placed in the environment reads back unchanged through env().
    #[test]
    fn env_round_trip(
        key in "[a-z][a-z0-9_]{0,12}",
        int in any::<i64>(),
        text in "\\PC{0,32}",
        flag in any::<bool>(),
    ) {
        let value = json!({"int": int, "text": text, "flag": flag, "list": [int, flag]});
        let ctx = ScriptContext::new(Environment::new().with(key.clone(), value.clone())).unwrap();
        let code = format!("env({key:?})");
        prop_assert_eq!(ctx.eval(&code).unwrap(), value);
        prop_assert_eq!(ctx.eval("env('__absent__')").unwrap(), Value::Null);
    }
}
