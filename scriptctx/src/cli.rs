//! Command-line front end of the demo binary.
//!
//! Usage:
//!   scriptctx [--env <file>] [--set NAME=VALUE]... [--cached] <file> [<func> [<arg>...]]
//!
//! The script runs with a small set of demo bindings (`add`, `a`, `m`) and
//! the demo environment (`TZ`, `age`), extended by `--env` and `--set`.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::cache::ContextCache;
use crate::config::{self, ContextConfig};
use crate::context::ScriptContext;
use crate::env::Environment;
use crate::error::{Result, ScriptError};
use crate::value::{Binding, Vars};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "scriptctx", version, about = "Run a Lua script with host bindings")]
pub struct CliArgs {
    /// Lua script to evaluate.
    pub file: PathBuf,

    /// Function to call after the script has run.
    pub func: Option<String>,

    /// Arguments for FUNC, each parsed as JSON (bare words become strings).
    /// Defaults to `1 3`.
    pub args: Vec<String>,

    /// Environment file (`name = value` lines) merged over the demo environment.
    #[arg(short, long, value_name = "FILE")]
    pub env: Option<PathBuf>,

    /// Extra environment entry; may be repeated.
    #[arg(short, long = "set", value_name = "NAME=VALUE", value_parser = config::parse_assignment)]
    pub set: Vec<(String, Value)>,

    /// Load through the process-wide context cache instead of a one-off context.
    /// The script's own return value is discarded in this mode, so without
    /// FUNC the result is `null`.
    #[arg(long)]
    pub cached: bool,
}

/// Struct-like demo value, exposed to scripts as `a`.
#[derive(Debug, Serialize)]
struct Person {
    name: String,
    age: i64,
}

/// The demo native bindings.
pub fn demo_vars() -> Vars {
    let mut vars = Vars::new();
    vars.insert(
        "add".into(),
        Binding::func(|args| {
            let a = int_arg(args, 0)?;
            let b = int_arg(args, 1)?;
            Ok(json!(a + b))
        }),
    );
    if let Ok(a) = Binding::serialize(&Person { name: "rosbit".into(), age: 10 }) {
        vars.insert("a".into(), a);
    }
    vars.insert(
        "m".into(),
        Binding::value(json!({
            "p": { "n": "name", "a": 10 },
            "a": [1, 2, 3],
        })),
    );
    vars
}

pub fn demo_env() -> Environment {
    Environment::new().with("TZ", "Asia/Shanghai").with("age", 10)
}

fn int_arg(args: &[Value], idx: usize) -> std::result::Result<i64, String> {
    args.get(idx)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("argument #{} must be an integer", idx + 1))
}

/// Assemble the environment: demo entries, then `--env`, then `--set`.
pub fn build_env(args: &CliArgs) -> Result<Environment> {
    let mut env = demo_env();
    if let Some(path) = &args.env {
        let (file_env, errors) =
            config::load_env_file(path).map_err(|e| ScriptError::file_access(path, e))?;
        for e in errors {
            warn!(file = %path.display(), "{e}");
        }
        env.extend(file_env);
    }
    for (name, value) in &args.set {
        env.set(name.clone(), value.clone());
    }
    Ok(env)
}

/// Run the script as requested and return the value to print.
pub fn run(args: &CliArgs) -> Result<Value> {
    let env = build_env(args)?;
    let vars = demo_vars();

    let (ctx, mut result) = if args.cached {
        let (ctx, _) = ContextCache::global().get_or_load_with_env(&args.file, env, Some(&vars))?;
        (ctx, Value::Null)
    } else {
        let ctx = ScriptContext::with_config(env, ContextConfig::default())?;
        ctx.add_vars(&vars)?;
        let result = ctx.eval_file(&args.file)?;
        (std::sync::Arc::new(ctx), result)
    };

    if let Some(func) = &args.func {
        let call_args = if args.args.is_empty() {
            vec![json!(1), json!(3)]
        } else {
            args.args
                .iter()
                .map(|a| config::parse_value(a).map_err(|message| ScriptError::Call {
                    name: func.clone(),
                    message,
                }))
                .collect::<Result<Vec<_>>>()?
        };
        result = ctx.call_func(func, &call_args)?;
    }
    Ok(result)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
