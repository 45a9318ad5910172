//! File-to-context cache with modification-time invalidation.
//!
//! One lock guards the whole table and is held across stat, file read and
//! context construction.  Lookups for every path are therefore serialized,
//! which rules out two callers racing to rebuild the same stale entry.  A slow
//! load blocks lookups of unrelated paths too; scripts are expected to change
//! rarely compared to how often they are looked up.
//!
//! Staleness is decided by modification-time equality alone.  An edit that
//! leaves the timestamp unchanged (coarse filesystem resolution) is not
//! detected.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::context::ScriptContext;
use crate::env::Environment;
use crate::error::{Result, ScriptError};
use crate::value::Vars;

/// Whether [`ContextCache::get_or_load`] built a context or reused one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Freshly built, either first sight of the path or after a change.
    Built,
    /// Served from the cache; the file was unchanged.
    Cached,
}

impl LoadStatus {
    pub fn is_cached(self) -> bool {
        self == LoadStatus::Cached
    }
}

struct CacheEntry {
    context: Arc<ScriptContext>,
    /// Modification time of the file the context was built from.
    modified: SystemTime,
}

/// Table of path -> loaded context.
///
/// Entries live as long as the cache; there is no eviction.
pub struct ContextCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
    config: ContextConfig,
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextCache {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// A cache whose contexts are all built with `config`.
    pub fn with_config(config: ContextConfig) -> Self {
        Self { entries: Mutex::new(HashMap::new()), config }
    }

    /// The process-wide cache, created on first call.  Later calls return
    /// the same instance with its entries intact.
    pub fn global() -> &'static ContextCache {
        static GLOBAL: OnceLock<ContextCache> = OnceLock::new();
        GLOBAL.get_or_init(ContextCache::new)
    }

    /// [`get_or_load_with_env`](Self::get_or_load_with_env) with an empty
    /// environment.
    pub fn get_or_load(
        &self,
        path: impl AsRef<Path>,
        vars: Option<&Vars>,
    ) -> Result<(Arc<ScriptContext>, LoadStatus)> {
        self.get_or_load_with_env(path, Environment::new(), vars)
    }

    /// Return the context for `path`, loading it on first use and rebuilding
    /// it when the file's modification time differs from the recorded one.
    ///
    /// `env` is only used when the path has no entry yet; a rebuild keeps the
    /// environment of the context it replaces.  `vars` are installed on every
    /// build.
    ///
    /// Failures never modify the table: a failed first load stores nothing,
    /// and a failed rebuild keeps the previous context and timestamp, so the
    /// last good script stays reachable.
    pub fn get_or_load_with_env(
        &self,
        path: impl AsRef<Path>,
        env: impl Into<Arc<Environment>>,
        vars: Option<&Vars>,
    ) -> Result<(Arc<ScriptContext>, LoadStatus)> {
        let path = path.as_ref();
        let mut entries = self.entries.lock();

        // Stat before reading so the recorded time never postdates the
        // content that was loaded.
        let modified = modification_time(path)?;

        let entry = match entries.entry(path.to_owned()) {
            Entry::Vacant(slot) => {
                let context = self.build(path, env.into(), vars)?;
                debug!(path = %path.display(), "context built");
                slot.insert(CacheEntry { context: Arc::clone(&context), modified });
                return Ok((context, LoadStatus::Built));
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if entry.modified == modified {
            return Ok((Arc::clone(&entry.context), LoadStatus::Cached));
        }

        let env = Arc::clone(entry.context.environment());
        match self.build(path, env, vars) {
            Ok(context) => {
                debug!(path = %path.display(), "context rebuilt after change");
                entry.context = Arc::clone(&context);
                entry.modified = modified;
                Ok((context, LoadStatus::Built))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rebuild failed; keeping previous context");
                Err(e)
            }
        }
    }

    fn build(
        &self,
        path: &Path,
        env: Arc<Environment>,
        vars: Option<&Vars>,
    ) -> Result<Arc<ScriptContext>> {
        let context = ScriptContext::with_config(env, self.config.clone())?;
        context.load_file(path, vars)?;
        Ok(Arc::new(context))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.lock().contains_key(path.as_ref())
    }
}

fn modification_time(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| ScriptError::file_access(path, e))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
