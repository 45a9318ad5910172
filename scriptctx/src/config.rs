//! Context configuration and the environment-file loader.
//!
//! An environment file is line oriented:
//!
//! | Line                     | Action                                   |
//! |--------------------------|------------------------------------------|
//! | `name = value`           | set an entry (value parsed as JSON)      |
//! | `name = "two words"`     | quoted string, `\"` escapes allowed      |
//! | `name = bare words`      | anything that isn't JSON is a string     |
//! | Lines starting with `;` or `#` | comment, ignored                   |
//!
//! Malformed lines are reported with their line number and skipped, so a
//! partly broken file still yields the entries that parsed.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::env::Environment;
use crate::value::FieldNaming;

// ── ContextConfig ─────────────────────────────────────────────────────────────

/// Destination of `print` / `console.*` output, one call per line.
pub type PrintSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Settings applied to every interpreter instance a context creates.
#[derive(Clone)]
pub struct ContextConfig {
    /// How object keys of native values appear to scripts.
    pub field_naming: FieldNaming,
    /// Where `print` writes.  Defaults to stdout.
    pub print: PrintSink,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            field_naming: FieldNaming::default(),
            print: Arc::new(|line| println!("{line}")),
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_naming(mut self, naming: FieldNaming) -> Self {
        self.field_naming = naming;
        self
    }

    pub fn with_print<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.print = Arc::new(sink);
        self
    }
}

impl fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextConfig")
            .field("field_naming", &self.field_naming)
            .finish_non_exhaustive()
    }
}

// ── Environment files ─────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading an environment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Parse an environment file body.
pub fn load_env_str(s: &str) -> (Environment, Vec<ConfigError>) {
    let mut env = Environment::new();
    let mut errors = Vec::new();

    for (i, raw) in s.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        match parse_assignment(line) {
            Ok((name, value)) => env.set(name, value),
            Err(message) => errors.push(ConfigError { line: lineno, message }),
        }
    }

    (env, errors)
}

/// Read and parse an environment file from disk.
pub fn load_env_file(path: &Path) -> std::io::Result<(Environment, Vec<ConfigError>)> {
    let s = std::fs::read_to_string(path)?;
    Ok(load_env_str(&s))
}

/// Parse one `name=value` pair, as given in a file line or on the command line.
pub fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let Some((name, value)) = s.split_once('=') else {
        return Err(format!("expected name=value, got {s:?}"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err("missing name before '='".into());
    }
    if name.chars().any(|c| c.is_whitespace()) {
        return Err(format!("invalid name {name:?}"));
    }
    Ok((name.to_owned(), parse_value(value.trim())?))
}

/// JSON when it parses, otherwise a (possibly quoted) plain string.
pub fn parse_value(s: &str) -> Result<Value, String> {
    if let Ok(v) = serde_json::from_str::<Value>(s) {
        return Ok(v);
    }
    if let Some(rest) = s.strip_prefix('"') {
        return unquote(rest).map(Value::String);
    }
    Ok(Value::String(s.to_owned()))
}

/// Undo `\x` escapes up to the closing quote; `rest` follows the opening quote.
fn unquote(rest: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = rest.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => break,
            },
            '"' => {
                return if chars.as_str().trim().is_empty() {
                    Ok(out)
                } else {
                    Err(format!("trailing text after closing quote: {:?}", chars.as_str()))
                };
            }
            c => out.push(c),
        }
    }
    Err("unterminated quoted string".into())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
