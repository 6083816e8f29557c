// src/recipe.rs

//! TOML recipe front-end
//!
//! Recipes are TOML files describing how to build one software unit:
//! package identity, substitution variables, patches, templates, and the
//! named build phases. Parsing a recipe and lowering it onto a builder
//! are separate operations so embedders with their own declaration
//! surface can skip this module entirely.
//!
//! # Example
//!
//! ```toml
//! [package]
//! name = "hello"
//! version = "2.12"
//!
//! [variables]
//! prefix = "/usr"
//!
//! [[patches]]
//! file = "hello-getopt.patch"
//! strip = 1
//!
//! [[templates]]
//! file = "hello.conf.in"
//! dest = "etc/hello.conf"
//!
//! [build]
//! configure = "./configure --prefix=%(prefix)s"
//! make = "make"
//! install = "make install DESTDIR=%(destdir)s"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::galley::Galley;
use crate::template;

/// A parsed recipe file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package identity
    pub package: PackageSection,

    /// Variables available for `%(key)s` substitution in commands and
    /// templates
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Patches to apply before the build phases, in order
    #[serde(default)]
    pub patches: Vec<PatchEntry>,

    /// Templates to render before the build phases, in order
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,

    /// Build phase commands
    #[serde(default)]
    pub build: BuildSection,
}

/// Package identity section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
}

/// One patch declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Path relative to the search roots
    pub file: String,
    /// Strip level passed to patch (-pN)
    #[serde(default = "default_strip")]
    pub strip: u32,
}

fn default_strip() -> u32 {
    1
}

/// One template declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// Path relative to the search roots
    pub file: String,
    /// Destination relative to the workdir
    pub dest: String,
}

/// Named build phases, run in the order declared here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub setup: Option<String>,
    #[serde(default)]
    pub configure: Option<String>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub install: Option<String>,
    #[serde(default)]
    pub post_install: Option<String>,
}

impl BuildSection {
    /// Phase commands in execution order
    fn phases(&self) -> impl Iterator<Item = &String> {
        [
            &self.setup,
            &self.configure,
            &self.make,
            &self.check,
            &self.install,
            &self.post_install,
        ]
        .into_iter()
        .flatten()
    }

    /// True if no phase declares a command
    pub fn is_empty(&self) -> bool {
        self.phases().next().is_none()
    }
}

impl Recipe {
    /// Substitution table: built-ins (name, version) plus the recipe's
    /// variables
    fn substitution_vars(&self, workdir: &Path) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.insert("name".to_string(), self.package.name.clone());
        vars.insert("version".to_string(), self.package.version.clone());
        vars.insert("destdir".to_string(), workdir.join("destdir").display().to_string());
        vars
    }

    /// Lower this recipe onto a fresh builder: patches, then templates,
    /// then the build phases.
    pub fn into_galley(&self, config: BuildConfig) -> Result<Galley> {
        let galley = Galley::new(self.package.name.as_str(), config)?;
        self.lower(galley)
    }

    /// Lower this recipe onto a builder using a caller-provided workdir.
    pub fn into_galley_at(
        &self,
        config: BuildConfig,
        workdir: impl Into<std::path::PathBuf>,
    ) -> Result<Galley> {
        let galley = Galley::with_workdir(self.package.name.as_str(), config, workdir)?;
        self.lower(galley)
    }

    fn lower(&self, mut galley: Galley) -> Result<Galley> {
        let vars = self.substitution_vars(galley.workdir());

        for patch in &self.patches {
            galley.apply_patch(&patch.file, patch.strip)?;
        }

        for tmpl in &self.templates {
            galley.render_template(&tmpl.file, &tmpl.dest, vars.clone())?;
        }

        for command in self.build.phases() {
            galley.run(template::substitute(command, &vars));
        }

        Ok(galley)
    }
}

/// Parse a recipe from TOML text
pub fn parse_recipe(contents: &str) -> Result<Recipe> {
    let recipe: Recipe =
        toml::from_str(contents).map_err(|e| Error::Parse(format!("invalid recipe: {}", e)))?;
    validate_recipe(&recipe)?;
    Ok(recipe)
}

/// Parse a recipe from a file
pub fn parse_recipe_file(path: impl AsRef<Path>) -> Result<Recipe> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::NotFound(format!("recipe {} unreadable: {}", path.display(), e))
    })?;
    parse_recipe(&contents)
}

/// Reject recipes that cannot possibly build
pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    if recipe.package.name.is_empty() {
        return Err(Error::Parse("package.name must not be empty".to_string()));
    }
    if recipe.package.version.is_empty() {
        return Err(Error::Parse("package.version must not be empty".to_string()));
    }
    if recipe.package.name.contains('/') {
        return Err(Error::Parse(format!(
            "package.name {:?} must not contain '/'",
            recipe.package.name
        )));
    }
    Ok(())
}
