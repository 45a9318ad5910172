//! Embeddable Lua script contexts.
//!
//! [`ScriptContext`] wraps one Lua 5.4 interpreter behind a lock and exposes
//! load / eval / call / bind operations plus a callback bridge through which
//! scripts reach host functions (`call(name, ...)`) and a read-only
//! environment (`env(name)`).  [`ContextCache`] maps script paths to loaded
//! contexts and rebuilds them when a file's modification time changes.
//!
//! ```no_run
//! use scriptctx::{Binding, ContextCache, Environment, Vars};
//! use serde_json::json;
//!
//! let mut vars = Vars::new();
//! vars.insert("add".into(), Binding::func(|args| {
//!     let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
//!     Ok(json!(sum))
//! }));
//!
//! let env = Environment::new().with("age", 10);
//! let (ctx, _status) = ContextCache::global()
//!     .get_or_load_with_env("handler.lua", env, Some(&vars))?;
//! let result = ctx.call_func("handle", &[json!(1), json!(3)])?;
//! # Ok::<(), scriptctx::ScriptError>(())
//! ```

pub mod bridge;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod helpers;
pub mod value;

pub use bridge::BridgeOp;
pub use cache::{ContextCache, LoadStatus};
pub use config::ContextConfig;
pub use context::{BoundFunc, ScriptContext};
pub use env::Environment;
pub use error::{ErrorKind, Result, ScriptError};
pub use value::{Binding, FieldNaming, NativeFn, Vars};
