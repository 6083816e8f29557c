// src/step.rs

//! Steps, the ordered step list, and auxiliary inputs
//!
//! A [`Step`] is one atomic unit of build work: a human-readable
//! description plus an action bound at creation time. The description does
//! double duty as the step's fingerprint component and its log/timing
//! label, so it should say what the step does, not where its inputs
//! happen to live on this machine.
//!
//! [`StepList`] is append-only. There is no removal or reordering
//! operation; execution order is append order.

use std::path::Path;
use std::time::Duration;

use crate::environment::Environment;
use crate::error::Result;
use crate::invoke::{self, CommandSpec};

/// Execution context handed to each step's action.
///
/// Holds the scrubbed environment view, the working directory relative
/// paths resolve against, and the default command timeout.
pub struct StepContext<'a> {
    pub env: &'a Environment,
    pub workdir: &'a Path,
    pub timeout: Duration,
}

/// The two ways a step can execute.
///
/// This is a closed union: every step either invokes an external process
/// or runs an in-process operation. Both go through [`Step::execute`].
pub enum StepAction {
    /// Run an external command through the shell
    Command(CommandSpec),
    /// Run an arbitrary in-process operation
    Callback(Box<dyn Fn(&StepContext) -> Result<()> + Send>),
}

impl std::fmt::Debug for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(spec) => f.debug_tuple("Command").field(&spec.command).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// One atomic unit of build work. Immutable once appended to a list.
#[derive(Debug)]
pub struct Step {
    description: String,
    action: StepAction,
}

impl Step {
    /// Create a step from a description and an action
    pub fn new(description: impl Into<String>, action: StepAction) -> Self {
        Self {
            description: description.into(),
            action,
        }
    }

    /// The step's label, used for fingerprinting, logging, and timing
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the step's action against the given context
    pub fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        match &self.action {
            StepAction::Command(spec) => {
                invoke::run_command(&self.description, spec, ctx).map(|_| ())
            }
            StepAction::Callback(f) => f(ctx),
        }
    }
}

/// Append-only ordered sequence of steps
#[derive(Debug, Default)]
pub struct StepList {
    steps: Vec<Step>,
}

impl StepList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the end of the list
    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if no steps have been declared
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate steps in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Descriptions in insertion order
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.description())
    }
}

/// File inputs referenced by declared steps, consumed only by the
/// fingerprint engine. Two separate ordered lists: patches, then
/// templates, each in declaration order.
#[derive(Debug, Clone, Default)]
pub struct AuxiliaryInputs {
    patches: Vec<std::path::PathBuf>,
    templates: Vec<std::path::PathBuf>,
}

impl AuxiliaryInputs {
    /// Register a patch file
    pub fn add_patch(&mut self, path: impl Into<std::path::PathBuf>) {
        self.patches.push(path.into());
    }

    /// Register a template file
    pub fn add_template(&mut self, path: impl Into<std::path::PathBuf>) {
        self.templates.push(path.into());
    }

    /// Patch paths in declaration order
    pub fn patches(&self) -> &[std::path::PathBuf] {
        &self.patches
    }

    /// Template paths in declaration order
    pub fn templates(&self) -> &[std::path::PathBuf] {
        &self.templates
    }

    /// True if no auxiliary files were registered
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && self.templates.is_empty()
    }
}
