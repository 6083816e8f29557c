// src/galley.rs

//! The builder: step declaration, fingerprinting, and the build loop
//!
//! A [`Galley`] is created once per software unit. During the declaration
//! phase it accumulates steps (and auxiliary inputs for patch and
//! template steps); `build()` then runs every step in declaration order,
//! each wrapped in the environment sandbox inside the retry supervisor,
//! and stops at the first step whose final outcome is a failure.
//!
//! The fingerprint is memoized and forced at the very start of `build()`,
//! before the first step runs, so a digest-time failure (an auxiliary
//! input that went missing) surfaces before any side effect occurs.
//!
//! A builder runs once. Restarting a build means constructing a new
//! instance; mutating the step list after the fingerprint has been
//! computed is a contract violation this type documents but does not
//! guard against.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::environment::{self, Environment};
use crate::error::{Error, Result};
use crate::fingerprint;
use crate::invoke::CommandSpec;
use crate::observer::BuildObserver;
use crate::retry;
use crate::search::SearchPath;
use crate::step::{AuxiliaryInputs, Step, StepAction, StepContext, StepList};
use crate::template;

/// Lifecycle of a builder instance. One-way, no re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Where the build runs: a scratch directory owned by the builder, or a
/// caller-provided one.
#[derive(Debug)]
enum WorkDir {
    Temp(TempDir),
    Fixed(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Fixed(path) => path,
        }
    }
}

/// Summary of a completed build
#[derive(Debug)]
pub struct BuildReport {
    pub name: String,
    pub fingerprint: String,
    pub steps_run: usize,
    /// Per-step elapsed time, in execution order
    pub timings: Vec<(String, Duration)>,
    pub total: Duration,
}

/// The build-step executor for one software unit
pub struct Galley {
    name: String,
    config: BuildConfig,
    env: Environment,
    search: SearchPath,
    steps: StepList,
    aux: AuxiliaryInputs,
    fingerprint: Option<String>,
    state: BuildState,
    workdir: WorkDir,
}

impl Galley {
    /// Create a builder with a scratch working directory.
    pub fn new(name: impl Into<String>, config: BuildConfig) -> Result<Self> {
        let name = name.into();
        let workdir = if config.keep_workdir {
            let path = std::env::temp_dir().join(format!("galley-{}", name));
            fs::create_dir_all(&path)?;
            WorkDir::Fixed(path)
        } else {
            WorkDir::Temp(TempDir::new()?)
        };
        Ok(Self::with_workdir_inner(name, config, workdir))
    }

    /// Create a builder that runs in `workdir` (created if missing).
    pub fn with_workdir(
        name: impl Into<String>,
        config: BuildConfig,
        workdir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let workdir = workdir.into();
        fs::create_dir_all(&workdir)?;
        Ok(Self::with_workdir_inner(name.into(), config, WorkDir::Fixed(workdir)))
    }

    fn with_workdir_inner(name: String, config: BuildConfig, workdir: WorkDir) -> Self {
        let mut env = Environment::from_process();
        env.set("MAKEFLAGS", format!("-j{}", config.jobs));

        let search = SearchPath::new(config.search_roots.clone());

        Self {
            name,
            config,
            env,
            search,
            steps: StepList::new(),
            aux: AuxiliaryInputs::default(),
            fingerprint: None,
            state: BuildState::NotStarted,
            workdir,
        }
    }

    /// The software unit this builder belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory relative step paths resolve against
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Current lifecycle state
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Declared steps, in execution order
    pub fn steps(&self) -> &StepList {
        &self.steps
    }

    /// Auxiliary inputs registered so far
    pub fn auxiliary_inputs(&self) -> &AuxiliaryInputs {
        &self.aux
    }

    /// The builder's environment table, for pre-build adjustments
    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    // ------------------------------------------------------------------
    // Declaration surface
    // ------------------------------------------------------------------

    /// Append a raw step
    pub fn step(&mut self, description: impl Into<String>, action: StepAction) {
        self.steps.push(Step::new(description, action));
    }

    /// Append a shell command step; the command text is the description
    pub fn run(&mut self, command: impl Into<String>) {
        let command = command.into();
        self.step(command.clone(), StepAction::Command(CommandSpec::shell(command)));
    }

    /// Append a shell command step running in a subdirectory of the
    /// workdir
    pub fn run_in(&mut self, dir: impl Into<PathBuf>, command: impl Into<String>) {
        let dir = dir.into();
        let command = command.into();
        let description = format!("{} (in {})", command, dir.display());
        self.step(
            description,
            StepAction::Command(CommandSpec::shell(command).in_dir(dir)),
        );
    }

    /// Append an interpreter invocation on a script file
    pub fn interpreter(&mut self, program: &str, script: impl Into<String>) {
        let command = format!("{} {}", program, script.into());
        self.step(command.clone(), StepAction::Command(CommandSpec::shell(command)));
    }

    /// Append a step that creates a directory (and parents) under the
    /// workdir
    pub fn create_dir(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        let description = format!("mkdir {}", path.display());
        self.step(
            description,
            StepAction::Callback(Box::new(move |ctx| {
                fs::create_dir_all(ctx.workdir.join(&path))?;
                Ok(())
            })),
        );
    }

    /// Append a step that writes a file under the workdir
    pub fn create_file(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        let path = path.into();
        let contents = contents.into();
        let description = format!("create {}", path.display());
        self.step(
            description,
            StepAction::Callback(Box::new(move |ctx| {
                let dest = ctx.workdir.join(&path);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, &contents)?;
                Ok(())
            })),
        );
    }

    /// Append a patch-application step.
    ///
    /// The patch file is resolved through the search roots now (a miss is
    /// a declaration error) and its contents feed the fingerprint. The
    /// description carries the declared name, not the resolved path, so
    /// fingerprints agree across machines with different roots.
    pub fn apply_patch(&mut self, name: impl AsRef<Path>, strip: u32) -> Result<()> {
        let name = name.as_ref();
        let resolved = self.search.find(name, &self.name)?;
        self.aux.add_patch(resolved.clone());

        let description = format!("apply patch {} (-p{})", name.display(), strip);
        let command = format!("patch -p{} -i {}", strip, resolved.display());
        self.step(description, StepAction::Command(CommandSpec::shell(command)));
        Ok(())
    }

    /// Append a template-render step.
    ///
    /// The template is resolved through the search roots now and its
    /// contents feed the fingerprint. At execution time it is read again,
    /// rendered with `vars` (unresolved placeholders are fatal), and
    /// written to `dest` under the workdir.
    pub fn render_template(
        &mut self,
        name: impl AsRef<Path>,
        dest: impl Into<PathBuf>,
        vars: BTreeMap<String, String>,
    ) -> Result<()> {
        let name = name.as_ref();
        let dest = dest.into();
        let resolved = self.search.find(name, &self.name)?;
        self.aux.add_template(resolved.clone());

        let description = format!("render template {} -> {}", name.display(), dest.display());
        self.step(
            description,
            StepAction::Callback(Box::new(move |ctx| {
                let raw = fs::read_to_string(&resolved)?;
                let rendered = template::render(&raw, &vars)?;
                let out = ctx.workdir.join(&dest);
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&out, rendered)?;
                Ok(())
            })),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fingerprint and execution
    // ------------------------------------------------------------------

    /// The recipe's content digest, memoized for the builder's lifetime.
    pub fn fingerprint(&mut self) -> Result<String> {
        if let Some(digest) = &self.fingerprint {
            return Ok(digest.clone());
        }
        let digest = fingerprint::compute(&self.steps, &self.aux)?;
        debug!("{}: fingerprint {:.16}", self.name, digest);
        self.fingerprint = Some(digest.clone());
        Ok(digest)
    }

    /// Run every declared step in order.
    ///
    /// Aborts at the first step whose final outcome (after the retry
    /// budget) is a failure; side effects of earlier steps are left in
    /// place, no rollback is attempted.
    pub fn build(&mut self, observer: &dyn BuildObserver) -> Result<BuildReport> {
        if self.state != BuildState::NotStarted {
            return Err(Error::AlreadyRan(self.name.clone()));
        }
        self.state = BuildState::Running;

        // Force the digest before any side effect
        let digest = match self.fingerprint() {
            Ok(digest) => digest,
            Err(err) => {
                self.state = BuildState::Failed;
                return Err(err);
            }
        };

        let total = self.steps.len();
        observer.on_build_started(&self.name, &digest, total);
        info!("Building {} ({} steps)", self.name, total);

        let build_start = Instant::now();
        let max_attempts = self.config.max_attempts;
        let timeout = self.config.step_timeout;
        let workdir = self.workdir.path().to_path_buf();

        let mut timings = Vec::with_capacity(total);
        let mut failure: Option<Error> = None;

        let steps = &self.steps;
        let env = &mut self.env;

        for (index, step) in steps.iter().enumerate() {
            observer.on_step_started(step.description(), index, total);
            let step_start = Instant::now();

            let result = retry::with_retries(max_attempts, observer, step.description(), || {
                environment::scrubbed(env, |scrubbed| {
                    let ctx = StepContext {
                        env: scrubbed,
                        workdir: &workdir,
                        timeout,
                    };
                    step.execute(&ctx)
                })
            });

            let elapsed = step_start.elapsed();
            match result {
                Ok(()) => {
                    observer.on_step_completed(step.description(), elapsed);
                    debug!("{}: {:.2}s", step.description(), elapsed.as_secs_f64());
                    timings.push((step.description().to_string(), elapsed));
                }
                Err(err) => {
                    let attempts = if err.is_retryable() { max_attempts + 1 } else { 1 };
                    observer.on_step_failed(step.description(), attempts, &err);
                    failure = Some(Error::StepFailed {
                        description: step.description().to_string(),
                        attempts,
                        source: Box::new(err),
                    });
                    break;
                }
            }
        }

        if let Some(err) = failure {
            self.state = BuildState::Failed;
            return Err(err);
        }

        let total_elapsed = build_start.elapsed();
        self.state = BuildState::Completed;
        observer.on_build_completed(&self.name, total_elapsed);
        info!(
            "{}: completed {} step(s) in {:.2}s",
            self.name,
            total,
            total_elapsed.as_secs_f64()
        );

        Ok(BuildReport {
            name: self.name.clone(),
            fingerprint: digest,
            steps_run: total,
            timings,
            total: total_elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::SilentObserver;
    use tempfile::TempDir;

    fn test_config(roots: Vec<PathBuf>) -> BuildConfig {
        BuildConfig::default()
            .with_max_attempts(0)
            .with_step_timeout(Duration::from_secs(30))
            .with_search_roots(roots)
    }

    #[test]
    fn test_zero_step_build_succeeds() {
        let mut g = Galley::new("empty", test_config(vec![])).unwrap();
        let report = g.build(&SilentObserver).unwrap();
        assert_eq!(report.steps_run, 0);
        assert_eq!(report.fingerprint, fingerprint::EMPTY_FINGERPRINT);
        assert_eq!(g.state(), BuildState::Completed);
    }

    #[test]
    fn test_second_build_rejected() {
        let mut g = Galley::new("once", test_config(vec![])).unwrap();
        g.build(&SilentObserver).unwrap();
        let err = g.build(&SilentObserver).unwrap_err();
        assert!(matches!(err, Error::AlreadyRan(name) if name == "once"));
    }

    #[test]
    fn test_fingerprint_memoized() {
        let root = TempDir::new().unwrap();
        let tmpl = root.path().join("app.conf.in");
        std::fs::write(&tmpl, "port=%(port)s\n").unwrap();

        let mut g = Galley::new("memo", test_config(vec![root.path().to_path_buf()])).unwrap();
        g.render_template(
            "app.conf.in",
            "app.conf",
            BTreeMap::from([("port".to_string(), "80".to_string())]),
        )
        .unwrap();

        let first = g.fingerprint().unwrap();
        // Deleting the template after the digest exists must not change it
        std::fs::remove_file(&tmpl).unwrap();
        let second = g.fingerprint().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_digest_failure_surfaces_before_side_effects() {
        let root = TempDir::new().unwrap();
        let tmpl = root.path().join("app.conf.in");
        std::fs::write(&tmpl, "x=1\n").unwrap();

        let mut g = Galley::new("early", test_config(vec![root.path().to_path_buf()])).unwrap();
        g.create_file("should-not-exist", "nope");
        g.render_template("app.conf.in", "app.conf", BTreeMap::new())
            .unwrap();

        // Template vanishes between declaration and build
        std::fs::remove_file(&tmpl).unwrap();

        let workdir = g.workdir().to_path_buf();
        let err = g.build(&SilentObserver).unwrap_err();
        assert!(matches!(err, Error::Fingerprint(_)));
        assert_eq!(g.state(), BuildState::Failed);
        assert!(!workdir.join("should-not-exist").exists());
    }

    #[test]
    fn test_file_steps_run_under_workdir() {
        let mut g = Galley::new("files", test_config(vec![])).unwrap();
        g.create_dir("A");
        g.create_file("A/x", "contents");
        let report = g.build(&SilentObserver).unwrap();
        assert_eq!(report.steps_run, 2);
        assert_eq!(report.timings.len(), 2);
        assert!(g.workdir().join("A/x").is_file());
    }

    #[test]
    fn test_missing_patch_is_declaration_error() {
        let root = TempDir::new().unwrap();
        let mut g = Galley::new("patchy", test_config(vec![root.path().to_path_buf()])).unwrap();
        let err = g.apply_patch("ghost.patch", 1).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        // Nothing was appended for the failed declaration
        assert!(g.steps().is_empty());
        assert!(g.auxiliary_inputs().is_empty());
    }

    #[test]
    fn test_failure_identifies_step_and_attempts() {
        let mut g = Galley::new("failing", test_config(vec![])).unwrap();
        g.create_dir("ok");
        g.step(
            "explode",
            StepAction::Callback(Box::new(|_| Err(Error::NotFound("boom".to_string())))),
        );
        g.create_dir("never");

        let workdir = g.workdir().to_path_buf();
        let err = g.build(&SilentObserver).unwrap_err();
        match err {
            Error::StepFailed {
                description,
                attempts,
                ..
            } => {
                assert_eq!(description, "explode");
                assert_eq!(attempts, 1);
            }
            other => panic!("expected StepFailed, got {:?}", other),
        }
        // Earlier side effects remain, later steps never ran
        assert!(workdir.join("ok").is_dir());
        assert!(!workdir.join("never").exists());
        assert_eq!(g.state(), BuildState::Failed);
    }

    #[test]
    fn test_scrubbed_vars_hidden_from_command_steps() {
        let mut g = Galley::new("scrub", test_config(vec![])).unwrap();
        g.env_mut().set("LD_PRELOAD", "/tmp/evil.so");
        g.run("test -z \"$LD_PRELOAD\"");
        g.build(&SilentObserver).unwrap();
        // Restored in the builder's own table after the build
        assert_eq!(g.env_mut().get("LD_PRELOAD"), Some("/tmp/evil.so"));
    }

    #[test]
    fn test_makeflags_exported() {
        let config = test_config(vec![]);
        let jobs = config.jobs;
        let mut g = Galley::new("jobs", config).unwrap();
        g.run(format!("test \"$MAKEFLAGS\" = \"-j{}\"", jobs));
        g.build(&SilentObserver).unwrap();
    }
}
