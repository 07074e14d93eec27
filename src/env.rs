//! Session state: the environment view and the pieces builtins mutate.

use std::collections::HashMap;
use std::env as stdenv;
use std::io;
use std::path::PathBuf;

use crate::history::History;

/// Read-mostly view of the process environment captured at startup.
///
/// `PATH`, `HOME` and `HISTFILE` are the variables the shell itself reads.
/// The working directory lives in the kernel: `cd` calls `chdir` so forked
/// children inherit it, and `pwd` asks the OS rather than caching a path.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshots the variables of the current process at shell startup.
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars().collect(),
        }
    }

    /// Value of `key` for this session.
    ///
    /// A session-local override wins; anything not overridden is read live
    /// from the process environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        match self.vars.get(key) {
            Some(value) => Some(value.clone()),
            None => stdenv::var(key).ok(),
        }
    }

    /// Overrides `key` for this session without touching the real process
    /// environment.
    pub fn set_var(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    /// The history file path, when `HISTFILE` is set and non-empty.
    pub fn histfile(&self) -> Option<PathBuf> {
        self.get_var("HISTFILE")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a command may read or mutate while it runs.
#[derive(Debug, Default)]
pub struct Session {
    pub env: Environment,
    pub history: History,
}

impl Session {
    /// Builds a session from the process environment, loading the history
    /// file when one is configured. A missing file is not an error.
    pub fn new() -> Self {
        let env = Environment::new();
        let mut history = History::new();
        if let Some(path) = env.histfile() {
            if path.exists() {
                let _ = history.load_startup(&path);
            }
        }
        Self { env, history }
    }

    /// Writes the whole history buffer to `HISTFILE`, if configured.
    pub fn persist_history(&mut self) -> io::Result<()> {
        match self.env.histfile() {
            Some(path) => self.history.write_to(&path),
            None => Ok(()),
        }
    }
}
