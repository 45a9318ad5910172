//! Callback bridge installed into every fresh Lua instance.
//!
//! # Lua API
//!
//! | Lua                                   | Effect                                        |
//! |---------------------------------------|-----------------------------------------------|
//! | `call(name, ...)` / `js.call(...)`    | Invoke a registered native function           |
//! | `env(name)` / `js.env(name)`          | Read the context environment → value or nil   |
//! | `print(...)`, `console.log(...)` etc. | Write one space-joined line to the print sink |
//! | `formatTimestamp(secs [, pattern])`   | Local time, strftime pattern                  |
//! | `sprintf(fmt, ...)`                   | printf-style formatting                       |
//!
//! `call` and `env` both route through the single native dispatcher `_cb_`.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use mlua::prelude::*;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ContextConfig;
use crate::env::Environment;
use crate::helpers;
use crate::value::{self, Binding, FieldNaming, NativeFn};

/// Native functions reachable through `call(name, ...)`, per instance.
pub(crate) type NativeRegistry = Arc<RwLock<HashMap<String, NativeFn>>>;

const PRELUDE: &str = r#"
function _CALL(name, ...)
    return _cb_(name, "call", table.pack(...))
end

function _GETENV(name)
    return _cb_(name, "env")
end

call = _CALL
env = _GETENV
js = { call = _CALL, env = _GETENV }
console = { log = print, info = print, warn = print, error = print }
"#;

// ── BridgeOp ──────────────────────────────────────────────────────────────────

/// Operation requested through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOp {
    /// Invoke a named native function.
    Call,
    /// Read a named environment value.
    Env,
}

impl FromStr for BridgeOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "call" => Ok(BridgeOp::Call),
            "env" => Ok(BridgeOp::Env),
            other => Err(format!("unknown bridge operation {other:?}")),
        }
    }
}

// ── Installation ──────────────────────────────────────────────────────────────

/// Install the dispatcher, the fixed natives and the prelude into `lua`.
pub(crate) fn install(
    lua: &Lua,
    env: &Arc<Environment>,
    registry: &NativeRegistry,
    config: &ContextConfig,
) -> LuaResult<()> {
    let globals = lua.globals();

    // dump() — log the environment
    {
        let env = Arc::clone(env);
        let dump: NativeFn = Arc::new(move |_: &[Value]| {
            info!(env = ?env, "dump");
            Ok(Value::Null)
        });
        registry.write().insert("dump".to_owned(), dump);
    }

    // _cb_(name, op [, args]) → value | nil
    {
        let env = Arc::clone(env);
        let registry = Arc::clone(registry);
        let naming = config.field_naming.clone();
        globals.set(
            "_cb_",
            lua.create_function(
                move |lua, (name, op, args): (Option<String>, String, Option<LuaTable>)| {
                    let op: BridgeOp = op.parse().map_err(LuaError::RuntimeError)?;
                    let name = name.unwrap_or_default();
                    dispatch(lua, op, &name, args, &env, &registry, &naming)
                },
            )?,
        )?;
    }

    // print(...) — one line to the sink
    {
        let sink = Arc::clone(&config.print);
        globals.set(
            "print",
            lua.create_function(move |_, args: LuaMultiValue| {
                let line = args.into_iter().map(|v| display(&v)).collect::<Vec<_>>().join(" ");
                sink(&line);
                Ok(())
            })?,
        )?;
    }

    // formatTimestamp(secs [, pattern]) → string
    globals.set(
        "formatTimestamp",
        lua.create_function(|_, (secs, pattern): (i64, Option<String>)| {
            helpers::format_timestamp(secs, pattern.as_deref()).map_err(LuaError::RuntimeError)
        })?,
    )?;

    // sprintf(fmt, ...) → string
    globals.set(
        "sprintf",
        lua.create_function(|_, (fmt, args): (String, LuaMultiValue)| {
            let args = value::export_all(args).map_err(LuaError::RuntimeError)?;
            helpers::sprintf(&fmt, &args).map_err(LuaError::RuntimeError)
        })?,
    )?;

    lua.load(PRELUDE).set_name("=prelude").exec()
}

/// Install one host binding as a global.  Functions are also registered for
/// `call(name, ...)`; rebinding a name to a plain value unregisters it.
pub(crate) fn bind(
    lua: &Lua,
    registry: &NativeRegistry,
    name: &str,
    binding: &Binding,
    naming: &FieldNaming,
) -> LuaResult<()> {
    match binding {
        Binding::Func(f) => {
            registry.write().insert(name.to_owned(), Arc::clone(f));
        }
        Binding::Value(_) => {
            registry.write().remove(name);
        }
    }
    lua.globals().set(name, value::binding_to_lua(lua, name, binding, naming)?)
}

fn dispatch(
    lua: &Lua,
    op: BridgeOp,
    name: &str,
    args: Option<LuaTable>,
    env: &Environment,
    registry: &NativeRegistry,
    naming: &FieldNaming,
) -> LuaResult<LuaValue> {
    match op {
        BridgeOp::Call => {
            let args = match args {
                Some(t) => packed_args(&t)?,
                None => Vec::new(),
            };
            // Clone out so the registry lock is not held while the native runs.
            let func = registry.read().get(name).cloned();
            match func {
                Some(f) => {
                    let out = f(&args).map_err(|e| LuaError::RuntimeError(format!("{name}: {e}")))?;
                    value::to_lua(lua, &out, naming)
                }
                None => {
                    warn!(callback = name, ?args, "call to unknown native function");
                    Ok(LuaValue::Nil)
                }
            }
        }
        BridgeOp::Env => match env.lookup(name) {
            Some(v) => value::to_lua(lua, v, naming),
            None => Ok(LuaValue::Nil),
        },
    }
}

/// Most values a Lua call can pass (`LUAI_MAXSTACK`).
const MAX_PACKED_ARGS: i64 = 1_000_000;

/// Unpack a `table.pack(...)` result, keeping interior nils.
fn packed_args(t: &LuaTable) -> LuaResult<Vec<Value>> {
    let n = match t.raw_get::<Option<i64>>("n")? {
        Some(n) if n > MAX_PACKED_ARGS => {
            return Err(LuaError::RuntimeError(format!("argument count {n} out of range")));
        }
        Some(n) => n.max(0) as usize,
        None => t.raw_len(),
    };
    let mut args = Vec::with_capacity(n.min(t.raw_len()));
    for i in 1..=n {
        let v: LuaValue = t.raw_get(i as i64)?;
        args.push(value::export(&v).map_err(LuaError::RuntimeError)?);
    }
    Ok(args)
}

/// `print` rendering of a single Lua value.
fn display(v: &LuaValue) -> String {
    match v {
        LuaValue::Nil => "nil".to_owned(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(f) => format!("{f:?}"),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        LuaValue::Table(_) => match value::export(v) {
            Ok(exported) => helpers::display(&exported),
            Err(_) => "table".to_owned(),
        },
        other => other.type_name().to_owned(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
