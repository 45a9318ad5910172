//! Host-side bindings and conversion between native values and Lua values.
//!
//! The native value representation is [`serde_json::Value`].  Conversion
//! into Lua is total; conversion out of Lua ("export") fails for values with
//! no JSON shape (functions, userdata, threads, cyclic tables).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mlua::prelude::*;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Nesting limit when exporting tables; a self-referencing table hits it.
const MAX_EXPORT_DEPTH: usize = 64;

/// A host function callable from script.  Failures become Lua runtime errors.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Named bindings installed into an instance as globals.
pub type Vars = HashMap<String, Binding>;

// ── Binding ───────────────────────────────────────────────────────────────────

/// A native value or function exposed to script under a global name.
#[derive(Clone)]
pub enum Binding {
    Value(Value),
    Func(NativeFn),
}

impl Binding {
    pub fn value(v: impl Into<Value>) -> Self {
        Binding::Value(v.into())
    }

    /// Bind any serializable host value.  Struct field names follow serde
    /// (so `#[serde(rename = "...")]` controls them) and are then passed
    /// through the context's [`FieldNaming`] policy.
    pub fn serialize<T: Serialize>(v: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(v).map(Binding::Value)
    }

    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Binding::Func(Arc::new(f))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Binding::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<Value> for Binding {
    fn from(v: Value) -> Self {
        Binding::Value(v)
    }
}

// ── FieldNaming ───────────────────────────────────────────────────────────────

/// How object keys of native values appear to scripts.
#[derive(Clone, Default)]
pub enum FieldNaming {
    /// Keys exactly as serialized.
    #[default]
    AsSerialized,
    /// Lower-case the first character of every key (`UserName` -> `userName`).
    LowerFirst,
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl FieldNaming {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        FieldNaming::Custom(Arc::new(f))
    }

    pub fn apply(&self, key: &str) -> String {
        match self {
            FieldNaming::AsSerialized => key.to_owned(),
            FieldNaming::LowerFirst => {
                let mut chars = key.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            FieldNaming::Custom(f) => f(key),
        }
    }
}

impl fmt::Debug for FieldNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldNaming::AsSerialized => f.write_str("AsSerialized"),
            FieldNaming::LowerFirst => f.write_str("LowerFirst"),
            FieldNaming::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ── Native -> Lua ─────────────────────────────────────────────────────────────

/// Convert a native value into a Lua value.  `null` becomes `nil`; arrays
/// become 1-based sequences.
pub(crate) fn to_lua(lua: &Lua, value: &Value, naming: &FieldNaming) -> LuaResult<LuaValue> {
    Ok(match value {
        Value::Null => LuaValue::Nil,
        Value::Bool(b) => LuaValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => LuaValue::Integer(i),
            None => LuaValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => LuaValue::String(lua.create_string(s)?),
        Value::Array(items) => {
            let tbl = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                tbl.raw_set(i as i64 + 1, to_lua(lua, item, naming)?)?;
            }
            LuaValue::Table(tbl)
        }
        Value::Object(map) => {
            let tbl = lua.create_table()?;
            for (k, v) in map {
                tbl.raw_set(naming.apply(k), to_lua(lua, v, naming)?)?;
            }
            LuaValue::Table(tbl)
        }
    })
}

/// Wrap a native function as a Lua function.  `name` only labels errors.
pub(crate) fn native_to_lua(
    lua: &Lua,
    name: &str,
    f: NativeFn,
    naming: FieldNaming,
) -> LuaResult<LuaFunction> {
    let name = name.to_owned();
    lua.create_function(move |lua, args: LuaMultiValue| {
        let args = export_all(args).map_err(LuaError::RuntimeError)?;
        let out = f(&args).map_err(|e| LuaError::RuntimeError(format!("{name}: {e}")))?;
        to_lua(lua, &out, &naming)
    })
}

pub(crate) fn binding_to_lua(
    lua: &Lua,
    name: &str,
    binding: &Binding,
    naming: &FieldNaming,
) -> LuaResult<LuaValue> {
    match binding {
        Binding::Value(v) => to_lua(lua, v, naming),
        Binding::Func(f) => Ok(LuaValue::Function(native_to_lua(
            lua,
            name,
            Arc::clone(f),
            naming.clone(),
        )?)),
    }
}

// ── Lua -> native ("export") ──────────────────────────────────────────────────

/// Export a Lua value into its native representation.
pub fn export(value: &LuaValue) -> Result<Value, String> {
    export_depth(value, 0)
}

pub(crate) fn export_all(values: impl IntoIterator<Item = LuaValue>) -> Result<Vec<Value>, String> {
    values.into_iter().map(|v| export(&v)).collect()
}

fn export_depth(value: &LuaValue, depth: usize) -> Result<Value, String> {
    if depth > MAX_EXPORT_DEPTH {
        return Err("table nesting too deep (cyclic table?)".into());
    }
    match value {
        LuaValue::Nil => Ok(Value::Null),
        LuaValue::Boolean(b) => Ok(Value::Bool(*b)),
        LuaValue::Integer(i) => Ok(Value::from(*i)),
        LuaValue::Number(f) => Ok(Number::from_f64(*f).map_or(Value::Null, Value::Number)),
        LuaValue::String(s) => Ok(Value::String(s.to_string_lossy().to_string())),
        LuaValue::Table(t) => export_table(t, depth),
        other => Err(format!("cannot export a {} value", other.type_name())),
    }
}

fn export_table(t: &LuaTable, depth: usize) -> Result<Value, String> {
    let len = t.raw_len();
    let mut pairs = Vec::new();
    for pair in t.pairs::<LuaValue, LuaValue>() {
        pairs.push(pair.map_err(|e| e.to_string())?);
    }

    // A table whose keys are exactly 1..=len is a sequence.
    let is_sequence = len > 0
        && pairs.len() == len
        && pairs
            .iter()
            .all(|(k, _)| matches!(k, LuaValue::Integer(i) if *i >= 1 && *i as usize <= len));
    if is_sequence {
        let mut items = vec![Value::Null; len];
        for (k, v) in &pairs {
            if let LuaValue::Integer(i) = k {
                items[*i as usize - 1] = export_depth(v, depth + 1)?;
            }
        }
        return Ok(Value::Array(items));
    }
    export_object(pairs, depth)
}

fn export_object(pairs: Vec<(LuaValue, LuaValue)>, depth: usize) -> Result<Value, String> {
    let mut map = Map::new();
    for (k, v) in pairs {
        let key = match &k {
            LuaValue::String(s) => s.to_string_lossy().to_string(),
            LuaValue::Integer(i) => i.to_string(),
            LuaValue::Number(f) => f.to_string(),
            LuaValue::Boolean(b) => b.to_string(),
            other => return Err(format!("cannot export a table keyed by {}", other.type_name())),
        };
        map.insert(key, export_depth(&v, depth + 1)?);
    }
    Ok(Value::Object(map))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
