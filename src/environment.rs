// src/environment.rs

//! Explicit environment table and the scrubbed-region sandbox
//!
//! The engine never mutates the process environment. Each builder owns an
//! [`Environment`] map seeded from the process at construction; spawned
//! commands get exactly this map (see `invoke`), so hiding a variable here
//! hides it from every tool the build runs.
//!
//! [`scrubbed`] removes the protected set for the duration of a region and
//! restores the complete prior table afterwards. Restoration is a full
//! snapshot-and-replace, not a per-key undo: variables the region itself
//! set or changed do not leak out either. A drop guard performs the
//! restore, so it also runs when the region returns an error or panics.

use std::collections::BTreeMap;

use crate::error::Result;

/// Ambient variables hidden from every step.
///
/// These redirect where child interpreters and the dynamic loader look for
/// code, which would let the invoking user's shell setup leak into an
/// otherwise reproducible build.
pub const SCRUBBED_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "PYTHONPATH",
    "PYTHONHOME",
    "PERL5LIB",
    "PERL5OPT",
    "RUBYLIB",
    "GEM_PATH",
    "NODE_PATH",
    "CDPATH",
];

/// An explicit environment-variable table.
///
/// BTreeMap keeps iteration order deterministic, which keeps spawned
/// process environments and log output stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set a variable, returning the previous value if any
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(key.into(), value.into())
    }

    /// Remove a variable, returning its value if it was present
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(key)
    }

    /// True if the variable is present
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Number of variables in the table
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True if the table is empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate variables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Restores the saved table when dropped, on every exit path.
struct RestoreGuard<'a> {
    env: &'a mut Environment,
    snapshot: BTreeMap<String, String>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.env.vars = std::mem::take(&mut self.snapshot);
    }
}

/// Run `body` with the protected variables removed from `env`.
///
/// The complete table is restored after `body` returns, whether it
/// succeeded, failed, or panicked.
pub fn scrubbed<T>(
    env: &mut Environment,
    body: impl FnOnce(&Environment) -> Result<T>,
) -> Result<T> {
    let snapshot = env.vars.clone();
    let guard = RestoreGuard { env, snapshot };
    for key in SCRUBBED_VARS {
        guard.env.vars.remove(*key);
    }
    body(&*guard.env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample_env() -> Environment {
        let mut env = Environment::new();
        env.set("PATH", "/usr/bin:/bin");
        env.set("LD_PRELOAD", "/tmp/evil.so");
        env.set("PYTHONPATH", "/home/user/lib");
        env.set("HOME", "/home/user");
        env
    }

    #[test]
    fn test_scrubbed_vars_hidden_inside_region() {
        let mut env = sample_env();
        scrubbed(&mut env, |inner| {
            assert!(!inner.contains("LD_PRELOAD"));
            assert!(!inner.contains("PYTHONPATH"));
            assert_eq!(inner.get("PATH"), Some("/usr/bin:/bin"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_restored_after_normal_return() {
        let mut env = sample_env();
        let before = env.clone();
        scrubbed(&mut env, |_| Ok(())).unwrap();
        assert_eq!(env, before);
        assert_eq!(env.get("LD_PRELOAD"), Some("/tmp/evil.so"));
    }

    #[test]
    fn test_restored_after_error() {
        let mut env = sample_env();
        let before = env.clone();
        let result: Result<()> = scrubbed(&mut env, |_| {
            Err(Error::NotFound("missing input".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(env, before);
    }

    #[test]
    fn test_restored_after_panic() {
        let mut env = sample_env();
        let before = env.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = scrubbed(&mut env, |_| panic!("step blew up"));
        }));
        assert!(outcome.is_err());
        assert_eq!(env, before);
    }

    #[test]
    fn test_region_mutations_do_not_leak() {
        // Restoration is snapshot-and-replace; the sandbox cannot observe
        // mutations because the region only gets a shared view, but the
        // guard must still replace the whole table.
        let mut env = sample_env();
        let before = env.clone();
        scrubbed(&mut env, |inner| {
            assert!(!inner.contains("LD_PRELOAD"));
            Ok(())
        })
        .unwrap();
        assert_eq!(env, before);
    }

    #[test]
    fn test_from_process_contains_path() {
        let env = Environment::from_process();
        assert!(env.contains("PATH") || env.is_empty());
    }

    #[test]
    fn test_set_returns_previous() {
        let mut env = Environment::new();
        assert_eq!(env.set("A", "1"), None);
        assert_eq!(env.set("A", "2"), Some("1".to_string()));
        assert_eq!(env.remove("A"), Some("2".to_string()));
        assert_eq!(env.remove("A"), None);
    }
}
