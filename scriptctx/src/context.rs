//! Concurrency-safe interpreter context.
//!
//! A [`ScriptContext`] owns one Lua 5.4 instance behind a mutex.  Every
//! public operation holds the lock for its whole duration, script execution
//! included, so operations on one context never interleave.
//!
//! The lock is not reentrant.  A native function invoked by a script runs
//! while the lock is held and must not call back into the same context; doing
//! so deadlocks.
//!
//! | Operation                         | Instance                 | Error            |
//! |-----------------------------------|--------------------------|------------------|
//! | [`load_file`] / [`load_script`]   | replaced with a fresh one | `Load`          |
//! | [`eval`] / [`eval_file`]          | reused, state accumulates | `Eval`          |
//! | [`call_func`]                     | reused                   | `NotAFunction`, `Call` |
//! | [`bind_func`]                     | reused                   | `Export`         |
//! | [`get_global`]                    | reused                   | `GetGlobal`      |
//!
//! [`load_file`]: ScriptContext::load_file
//! [`load_script`]: ScriptContext::load_script
//! [`eval`]: ScriptContext::eval
//! [`eval_file`]: ScriptContext::eval_file
//! [`call_func`]: ScriptContext::call_func
//! [`bind_func`]: ScriptContext::bind_func
//! [`get_global`]: ScriptContext::get_global

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use mlua::prelude::*;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::bridge::{self, NativeRegistry};
use crate::config::ContextConfig;
use crate::env::Environment;
use crate::error::{Result, ScriptError};
use crate::value::{self, Binding, Vars};

// ── Instance ──────────────────────────────────────────────────────────────────

/// One interpreter instance plus the natives registered into it.
struct Instance {
    lua: Lua,
    natives: NativeRegistry,
    /// Bumped every time the instance is replaced.
    generation: u64,
}

impl Instance {
    fn new(env: &Arc<Environment>, config: &ContextConfig, generation: u64) -> LuaResult<Self> {
        let lua = Lua::new();
        let natives = NativeRegistry::default();
        bridge::install(&lua, env, &natives, config)?;
        Ok(Self { lua, natives, generation })
    }

    fn add_vars(&self, vars: &Vars, config: &ContextConfig) -> LuaResult<()> {
        for (name, binding) in vars {
            self.add_var(name, binding, config)?;
        }
        Ok(())
    }

    fn add_var(&self, name: &str, binding: &Binding, config: &ContextConfig) -> LuaResult<()> {
        bridge::bind(&self.lua, &self.natives, name, binding, &config.field_naming)
    }

    fn marshal_args(&self, args: &[Value], config: &ContextConfig) -> LuaResult<LuaMultiValue> {
        args.iter()
            .map(|a| value::to_lua(&self.lua, a, &config.field_naming))
            .collect()
    }
}

// ── ScriptContext ─────────────────────────────────────────────────────────────

/// An embedded-script execution environment: interpreter instance,
/// environment table, bridge bindings and the lock serializing them.
pub struct ScriptContext {
    state: Mutex<Instance>,
    env: Arc<Environment>,
    config: ContextConfig,
}

impl ScriptContext {
    /// Create a context with the bridge installed and no script loaded.
    pub fn new(env: impl Into<Arc<Environment>>) -> Result<Self> {
        Self::with_config(env, ContextConfig::default())
    }

    pub fn with_config(env: impl Into<Arc<Environment>>, config: ContextConfig) -> Result<Self> {
        let env = env.into();
        let instance = Instance::new(&env, &config, 0)?;
        Ok(Self { state: Mutex::new(instance), env, config })
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Number of times the instance has been replaced by a load.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    // ── Loading ───────────────────────────────────────────────────────────

    /// Read `path` and [`load_script`](Self::load_script) it.  The chunk is
    /// named after the path so error messages point at the file.
    pub fn load_file(&self, path: &Path, vars: Option<&Vars>) -> Result<()> {
        let source =
            std::fs::read_to_string(path).map_err(|e| ScriptError::file_access(path, e))?;
        self.load_named(&format!("@{}", path.display()), &source, vars)
    }

    /// Replace the instance with a fresh one, install `vars`, and run
    /// `source`.
    ///
    /// The old instance is discarded before the source runs, so after a
    /// failed load the context holds an instance with only the bridge (and
    /// `vars`) installed.
    pub fn load_script(&self, source: &str, vars: Option<&Vars>) -> Result<()> {
        self.load_named("=script", source, vars)
    }

    fn load_named(&self, chunk_name: &str, source: &str, vars: Option<&Vars>) -> Result<()> {
        let load_err = |e: LuaError| ScriptError::Load {
            name: chunk_name.trim_start_matches(['@', '=']).to_owned(),
            message: e.to_string(),
        };

        let mut state = self.state.lock();
        let generation = state.generation + 1;
        *state = Instance::new(&self.env, &self.config, generation).map_err(load_err)?;
        if let Some(vars) = vars {
            state.add_vars(vars, &self.config).map_err(load_err)?;
        }
        state.lua.load(source).set_name(chunk_name).exec().map_err(load_err)?;
        debug!(chunk = chunk_name, generation, "script loaded");
        Ok(())
    }

    // ── Eval ──────────────────────────────────────────────────────────────

    /// Run `source` against the current instance without resetting it and
    /// return the exported value of the chunk (`Null` if it returns nothing).
    ///
    /// Both expressions (`1 + 2`) and statement blocks are accepted.
    pub fn eval(&self, source: &str) -> Result<Value> {
        let state = self.state.lock();
        Self::eval_locked(&state, "=eval", source)
    }

    /// [`eval`](Self::eval) after installing `vars` into the current instance.
    pub fn eval_with(&self, source: &str, vars: &Vars) -> Result<Value> {
        let state = self.state.lock();
        state
            .add_vars(vars, &self.config)
            .map_err(|e| ScriptError::Eval { message: e.to_string() })?;
        Self::eval_locked(&state, "=eval", source)
    }

    /// Read `path` and [`eval`](Self::eval) it.
    pub fn eval_file(&self, path: &Path) -> Result<Value> {
        let source =
            std::fs::read_to_string(path).map_err(|e| ScriptError::file_access(path, e))?;
        let state = self.state.lock();
        Self::eval_locked(&state, &format!("@{}", path.display()), &source)
    }

    fn eval_locked(state: &Instance, chunk_name: &str, source: &str) -> Result<Value> {
        let v: LuaValue = state
            .lua
            .load(source)
            .set_name(chunk_name)
            .eval()
            .map_err(|e| ScriptError::Eval { message: e.to_string() })?;
        value::export(&v).map_err(|message| ScriptError::Export {
            name: "eval result".into(),
            message,
        })
    }

    // ── Calls ─────────────────────────────────────────────────────────────

    /// Call the global script function `name` with `args`.
    pub fn call_func(&self, name: &str, args: &[Value]) -> Result<Value> {
        let state = self.state.lock();
        let func = match state.lua.globals().get::<LuaValue>(name) {
            Ok(LuaValue::Function(f)) => f,
            _ => return Err(ScriptError::NotAFunction { name: name.to_owned() }),
        };
        Self::invoke(&state, name, &func, args, &self.config)
    }

    /// [`call_func`](Self::call_func), deserializing the result into `R`.
    pub fn call_func_as<R: DeserializeOwned>(&self, name: &str, args: &[Value]) -> Result<R> {
        let v = self.call_func(name, args)?;
        deserialize_result(name, v)
    }

    fn invoke(
        state: &Instance,
        name: &str,
        func: &LuaFunction,
        args: &[Value],
        config: &ContextConfig,
    ) -> Result<Value> {
        let call_err = |e: LuaError| ScriptError::Call {
            name: name.to_owned(),
            message: e.to_string(),
        };
        let lua_args = state.marshal_args(args, config).map_err(call_err)?;
        let v: LuaValue = func.call(lua_args).map_err(call_err)?;
        value::export(&v).map_err(|message| ScriptError::Export { name: name.to_owned(), message })
    }

    // ── Binding ───────────────────────────────────────────────────────────

    /// Export the global script function `name` as a handle callable
    /// directly from Rust.
    ///
    /// The handle is tied to the current instance: after the context is
    /// reloaded, calling it fails with a stale-binding [`ScriptError::Call`].
    pub fn bind_func(&self, name: &str) -> Result<BoundFunc<'_>> {
        let state = self.state.lock();
        match state.lua.globals().get::<LuaValue>(name) {
            Ok(LuaValue::Function(func)) => Ok(BoundFunc {
                ctx: self,
                name: name.to_owned(),
                func,
                generation: state.generation,
            }),
            Ok(LuaValue::Nil) => Err(ScriptError::Export {
                name: name.to_owned(),
                message: "global is not defined".into(),
            }),
            Ok(other) => Err(ScriptError::Export {
                name: name.to_owned(),
                message: format!("expected a function, found {}", other.type_name()),
            }),
            Err(e) => Err(ScriptError::Export { name: name.to_owned(), message: e.to_string() }),
        }
    }

    /// [`bind_func`](Self::bind_func) for several names; fails on the first
    /// that cannot be bound.
    pub fn bind_funcs<'a, I, S>(&'a self, names: I) -> Result<HashMap<String, BoundFunc<'a>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|n| {
                let n = n.as_ref();
                self.bind_func(n).map(|f| (n.to_owned(), f))
            })
            .collect()
    }

    // ── Globals ───────────────────────────────────────────────────────────

    /// Read and export the global `name` (`Null` when undefined).
    ///
    /// Any failure inside the interpreter, including a panic, is reported as
    /// [`ScriptError::GetGlobal`] instead of unwinding past the context.
    pub fn get_global(&self, name: &str) -> Result<Value> {
        let state = self.state.lock();
        let read = panic::catch_unwind(AssertUnwindSafe(|| -> std::result::Result<Value, String> {
            let v: LuaValue = state.lua.globals().get(name).map_err(|e| e.to_string())?;
            value::export(&v)
        }));
        let fault = |message: String| ScriptError::GetGlobal { name: name.to_owned(), message };
        match read {
            Ok(result) => result.map_err(fault),
            Err(payload) => Err(fault(format!("recovered panic: {}", panic_message(&*payload)))),
        }
    }

    /// Install `vars` into the current instance; last write wins.
    pub fn add_vars(&self, vars: &Vars) -> Result<()> {
        let state = self.state.lock();
        state.add_vars(vars, &self.config)?;
        Ok(())
    }

    pub fn add_var(&self, name: &str, binding: impl Into<Binding>) -> Result<()> {
        let state = self.state.lock();
        state.add_var(name, &binding.into(), &self.config)?;
        Ok(())
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("env", &self.env)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn deserialize_result<R: DeserializeOwned>(name: &str, v: Value) -> Result<R> {
    serde_json::from_value(v).map_err(|e| ScriptError::Export {
        name: name.to_owned(),
        message: e.to_string(),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

// ── BoundFunc ─────────────────────────────────────────────────────────────────

/// A script function exported by [`ScriptContext::bind_func`].
///
/// Calls go through the owning context's lock like every other operation.
pub struct BoundFunc<'a> {
    ctx: &'a ScriptContext,
    name: String,
    func: LuaFunction,
    generation: u64,
}

impl BoundFunc<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value> {
        let state = self.ctx.state.lock();
        if state.generation != self.generation {
            return Err(ScriptError::Call {
                name: self.name.clone(),
                message: "stale binding: the context was reloaded".into(),
            });
        }
        ScriptContext::invoke(&state, &self.name, &self.func, args, &self.ctx.config)
    }

    pub fn call_as<R: DeserializeOwned>(&self, args: &[Value]) -> Result<R> {
        let v = self.call(args)?;
        deserialize_result(&self.name, v)
    }
}

impl std::fmt::Debug for BoundFunc<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundFunc")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn make_ctx() -> ScriptContext {
        let env = Environment::new().with("TZ", "Asia/Shanghai").with("age", 10);
        ScriptContext::new(env).unwrap()
    }

    fn demo_vars() -> Vars {
        let mut vars = Vars::new();
        vars.insert(
            "add".into(),
            Binding::func(|args| {
                let a = args.first().and_then(Value::as_i64).unwrap_or(0);
                let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            }),
        );
        vars.insert("m".into(), Binding::value(json!({"p": {"n": "name", "a": 10}})));
        vars
    }

    // ── load ──────────────────────────────────────────────────────────────

    #[test]
    fn load_script_defines_functions() {
        let ctx = make_ctx();
        ctx.load_script("function ping() return 'pong' end", None).unwrap();
        assert_eq!(ctx.call_func("ping", &[]).unwrap(), json!("pong"));
    }

    #[test]
    fn load_installs_vars() {
        let ctx = make_ctx();
        ctx.load_script("function f(x) return add(x, m.p.a) end", Some(&demo_vars()))
            .unwrap();
        assert_eq!(ctx.call_func("f", &[json!(5)]).unwrap(), json!(15));
    }

    #[test]
    fn load_resets_previous_globals() {
        let ctx = make_ctx();
        ctx.load_script("function old() return 1 end", None).unwrap();
        ctx.load_script("function new() return 2 end", None).unwrap();
        assert!(matches!(
            ctx.call_func("old", &[]),
            Err(ScriptError::NotAFunction { .. })
        ));
        assert_eq!(ctx.call_func("new", &[]).unwrap(), json!(2));
        assert_eq!(ctx.generation(), 2);
    }

    #[test]
    fn failed_load_leaves_no_script_globals() {
        let ctx = make_ctx();
        ctx.load_script("function good() return 1 end", None).unwrap();
        let err = ctx.load_script("function broken( return end", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
        let err = ctx.call_func("good", &[]).unwrap_err();
        assert_eq!(err.to_string(), "function good is not found in script");
        // the bridge survives the failed load
        assert_eq!(ctx.eval("js.env('age')").unwrap(), json!(10));
    }

    #[test]
    fn runtime_error_during_load_is_a_load_error() {
        let ctx = make_ctx();
        let err = ctx.load_script("error('boom')", None).unwrap_err();
        assert!(matches!(err, ScriptError::Load { .. }));
        assert!(err.to_string().contains("boom"), "{err}");
    }

    #[test]
    fn load_missing_file_is_file_access() {
        let ctx = make_ctx();
        let err = ctx.load_file(Path::new("/no/such/script.lua"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileAccess);
    }

    #[test]
    fn load_file_names_the_chunk_after_the_path() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "local x = = 1").unwrap();
        let ctx = make_ctx();
        let err = ctx.load_file(f.path(), None).unwrap_err();
        let ScriptError::Load { name, .. } = &err else { panic!("unexpected: {err:?}") };
        assert_eq!(name, &f.path().display().to_string());
    }

    // ── eval ──────────────────────────────────────────────────────────────

    #[test]
    fn eval_accumulates_state() {
        let ctx = make_ctx();
        ctx.eval("counter = 1").unwrap();
        ctx.eval("counter = counter + 1").unwrap();
        assert_eq!(ctx.eval("counter").unwrap(), json!(2));
    }

    #[test]
    fn eval_error_keeps_prior_globals() {
        let ctx = make_ctx();
        ctx.load_script("function keep() return 'kept' end", None).unwrap();
        let err = ctx.eval("this is not lua").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Eval);
        assert_eq!(ctx.call_func("keep", &[]).unwrap(), json!("kept"));
    }

    #[test]
    fn eval_statements_without_result_is_null() {
        let ctx = make_ctx();
        assert_eq!(ctx.eval("local a = 1").unwrap(), Value::Null);
    }

    #[test]
    fn eval_with_installs_vars() {
        let ctx = make_ctx();
        assert_eq!(ctx.eval_with("add(20, 22)", &demo_vars()).unwrap(), json!(42));
    }

    #[test]
    fn eval_file_does_not_reset() {
        use std::io::Write;
        let ctx = make_ctx();
        ctx.eval("base = 40").unwrap();
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "return base + 2").unwrap();
        assert_eq!(ctx.eval_file(f.path()).unwrap(), json!(42));
    }

    #[test]
    fn bridge_scenario() {
        let ctx = make_ctx();
        ctx.add_vars(&demo_vars()).unwrap();
        assert_eq!(ctx.eval("js.call('add', 1, 3)").unwrap(), json!(4));
        assert_eq!(ctx.eval("js.env('age')").unwrap(), json!(10));
        assert_eq!(ctx.eval("js.env('missing')").unwrap(), Value::Null);
    }

    // ── call_func ─────────────────────────────────────────────────────────

    #[test]
    fn call_func_marshals_arguments() {
        let ctx = make_ctx();
        ctx.load_script("function sum(t) local s = 0 for _, v in ipairs(t) do s = s + v end return s end", None)
            .unwrap();
        assert_eq!(ctx.call_func("sum", &[json!([1, 2, 3])]).unwrap(), json!(6));
        let n: i64 = ctx.call_func_as("sum", &[json!([4, 5])]).unwrap();
        assert_eq!(n, 9);
    }

    #[test]
    fn call_non_function_global() {
        let ctx = make_ctx();
        ctx.eval("value = 3").unwrap();
        let err = ctx.call_func("value", &[]).unwrap_err();
        assert!(matches!(err, ScriptError::NotAFunction { .. }));
    }

    #[test]
    fn runtime_error_in_call() {
        let ctx = make_ctx();
        ctx.load_script("function fail() error('nope') end", None).unwrap();
        let err = ctx.call_func("fail", &[]).unwrap_err();
        let ScriptError::Call { name, message } = &err else { panic!("unexpected: {err:?}") };
        assert_eq!(name, "fail");
        assert!(message.contains("nope"));
    }

    #[test]
    fn native_error_surfaces_in_call() {
        let ctx = make_ctx();
        let mut vars = Vars::new();
        vars.insert("explode".into(), Binding::func(|_| Err("kaboom".into())));
        ctx.load_script("function go() return explode() end", Some(&vars)).unwrap();
        let err = ctx.call_func("go", &[]).unwrap_err();
        assert!(err.to_string().contains("explode: kaboom"), "{err}");
    }

    // ── bind_func ─────────────────────────────────────────────────────────

    #[test]
    fn bound_function_is_callable() {
        let ctx = make_ctx();
        ctx.load_script("function mul(a, b) return a * b end", None).unwrap();
        let mul = ctx.bind_func("mul").unwrap();
        assert_eq!(mul.name(), "mul");
        let v: i64 = mul.call_as(&[json!(6), json!(7)]).unwrap();
        assert_eq!(v, 42);
        assert_eq!(mul.call(&[json!(2), json!(3)]).unwrap(), json!(6));
    }

    #[test]
    fn bind_missing_or_non_function() {
        let ctx = make_ctx();
        ctx.eval("answer = 42").unwrap();
        assert_eq!(ctx.bind_func("nothing").unwrap_err().kind(), ErrorKind::Export);
        let err = ctx.bind_func("answer").unwrap_err();
        assert!(err.to_string().contains("expected a function"), "{err}");
    }

    #[test]
    fn bind_funcs_all_or_error() {
        let ctx = make_ctx();
        ctx.load_script("function a() return 'a' end function b() return 'b' end", None)
            .unwrap();
        let funcs = ctx.bind_funcs(["a", "b"]).unwrap();
        assert_eq!(funcs["b"].call(&[]).unwrap(), json!("b"));
        assert!(ctx.bind_funcs(["a", "c"]).is_err());
    }

    #[test]
    fn bound_function_goes_stale_on_reload() {
        let ctx = make_ctx();
        ctx.load_script("function f() return 1 end", None).unwrap();
        let f = ctx.bind_func("f").unwrap();
        ctx.load_script("function f() return 2 end", None).unwrap();
        let err = f.call(&[]).unwrap_err();
        assert!(err.to_string().contains("stale binding"), "{err}");
        assert_eq!(ctx.bind_func("f").unwrap().call(&[]).unwrap(), json!(2));
    }

    // ── get_global / add_var ──────────────────────────────────────────────

    #[test]
    fn get_global_values() {
        let ctx = make_ctx();
        ctx.eval("t = {name = 'rosbit', age = 10}").unwrap();
        assert_eq!(ctx.get_global("t").unwrap(), json!({"name": "rosbit", "age": 10}));
        assert_eq!(ctx.get_global("undefined_thing").unwrap(), Value::Null);
    }

    #[test]
    fn get_global_unexportable_is_an_error() {
        let ctx = make_ctx();
        let err = ctx.get_global("print").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalFault);
        // the context is still usable afterwards
        assert_eq!(ctx.eval("1 + 1").unwrap(), json!(2));
    }

    #[test]
    fn panic_while_reading_a_global_is_recovered() {
        let ctx = make_ctx();
        ctx.add_var("boom", Binding::func(|_| panic!("host fault"))).unwrap();
        ctx.eval("kept = 1\nsetmetatable(_G, {__index = function() return boom() end})")
            .unwrap();

        let err = ctx.get_global("x").unwrap_err();
        assert!(matches!(err, ScriptError::GetGlobal { .. }), "{err}");
        assert!(err.to_string().contains("recovered panic: host fault"), "{err}");

        assert_eq!(ctx.get_global("kept").unwrap(), json!(1));
        ctx.eval("setmetatable(_G, nil)").unwrap();
        assert_eq!(ctx.get_global("x").unwrap(), Value::Null);
        assert_eq!(ctx.eval("kept + 1").unwrap(), json!(2));
    }

    #[test]
    fn hostile_helper_arguments_are_eval_errors() {
        let ctx = make_ctx();
        let err = ctx.eval("sprintf('%18446744073709551615d', 1)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Eval);
        assert!(err.to_string().contains("width too large"), "{err}");
        let err = ctx.eval("_cb_('dump', 'call', {n = math.maxinteger})").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Eval);
        assert_eq!(ctx.eval("1 + 1").unwrap(), json!(2));
    }

    #[test]
    fn add_var_last_write_wins() {
        let ctx = make_ctx();
        ctx.add_var("x", json!(1)).unwrap();
        ctx.add_var("x", json!("two")).unwrap();
        assert_eq!(ctx.get_global("x").unwrap(), json!("two"));
    }

    #[test]
    fn add_var_does_not_survive_a_load() {
        let ctx = make_ctx();
        ctx.add_var("x", json!(1)).unwrap();
        ctx.load_script("y = 2", None).unwrap();
        assert_eq!(ctx.get_global("x").unwrap(), Value::Null);
        assert_eq!(ctx.get_global("y").unwrap(), json!(2));
    }

    #[test]
    fn environment_is_shared_not_copied() {
        let env = Arc::new(Environment::new().with("k", "v"));
        let ctx = ScriptContext::new(Arc::clone(&env)).unwrap();
        assert!(Arc::ptr_eq(ctx.environment(), &env));
    }
}
