// src/fingerprint.rs

//! Content-addressed recipe fingerprinting
//!
//! The fingerprint is a SHA-256 digest over the recipe's observable
//! content: every step description in list order, then the byte contents
//! of every auxiliary file (patches in declaration order, then
//! templates). It is the cache key an external build-caching layer uses
//! to decide whether a previous artifact can be reused, so it must be
//! pure: no wall-clock time, process ids, or filesystem metadata feed it,
//! only recipe text and file bytes.
//!
//! An unreadable auxiliary file is a fatal error. Skipping it would let
//! two different recipes share a digest, which makes the cache unsound.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::step::{AuxiliaryInputs, StepList};

/// Hex SHA-256 of empty input; the digest of a recipe with no steps and
/// no auxiliary files.
pub const EMPTY_FINGERPRINT: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Compute the digest for a step list and its auxiliary inputs.
pub fn compute(steps: &StepList, aux: &AuxiliaryInputs) -> Result<String> {
    let mut hasher = Sha256::new();

    for description in steps.descriptions() {
        hasher.update(description.as_bytes());
        hasher.update(b"\n");
    }

    for path in aux.patches() {
        feed_file(&mut hasher, path)?;
    }
    for path in aux.templates() {
        feed_file(&mut hasher, path)?;
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn feed_file(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let contents = fs::read(path).map_err(|e| {
        Error::Fingerprint(format!(
            "auxiliary input {} is unreadable: {}",
            path.display(),
            e
        ))
    })?;
    hasher.update(&contents);
    Ok(())
}
