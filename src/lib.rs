// src/lib.rs

//! Galley: the build-step execution engine behind source recipes
//!
//! A recipe declares an ordered list of build steps (shell commands,
//! interpreter invocations, file operations, template renders) for one
//! software unit. Galley executes that list in order with:
//!
//! - **Fingerprinting**: a SHA-256 content digest over step descriptions
//!   and referenced patch/template bytes, usable as a cache key by an
//!   external caching layer
//! - **Retries**: bounded re-attempts with exponential backoff for the
//!   two transient failure kinds (non-zero exit, timeout)
//! - **Environment isolation**: loader/interpreter redirection variables
//!   are hidden from every step and the full table restored afterwards
//!
//! Execution is single-threaded and strictly sequential; later steps
//! routinely depend on filesystem state produced by earlier ones. The
//! build halts at the first step whose final outcome is a failure, and
//! partial side effects are left in place (no rollback).

pub mod cache;
pub mod config;
pub mod environment;
mod error;
pub mod fingerprint;
pub mod galley;
pub mod invoke;
pub mod observer;
pub mod recipe;
pub mod retry;
pub mod search;
pub mod step;
pub mod template;

pub use cache::FingerprintCache;
pub use config::BuildConfig;
pub use environment::{Environment, SCRUBBED_VARS};
pub use error::{Error, FailureKind, Result};
pub use galley::{BuildReport, BuildState, Galley};
pub use invoke::{CommandOutput, CommandSpec};
pub use observer::{BuildEvent, BuildObserver, CallbackObserver, LogObserver, SilentObserver};
pub use recipe::{parse_recipe, parse_recipe_file, validate_recipe, Recipe};
pub use search::SearchPath;
pub use step::{AuxiliaryInputs, Step, StepAction, StepContext, StepList};
