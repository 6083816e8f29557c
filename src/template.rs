// src/template.rs

//! `%(name)s` variable substitution
//!
//! Two entry points with the same replacement rules but different
//! strictness:
//! - [`substitute`] replaces known variables and leaves anything else
//!   alone; used for command strings, where stray `%` is common.
//! - [`render`] additionally rejects leftover `%(...)s` markers; used for
//!   template files, where an unresolved placeholder means the recipe
//!   forgot a variable.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Replace `%(key)s` markers with values from `vars`. Unknown markers
/// are left untouched.
pub fn substitute(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("%({})s", key), value);
    }
    result
}

/// Like [`substitute`], but an unresolved `%(...)s` marker is an error.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let result = substitute(template, vars);
    if let Some(start) = result.find("%(") {
        let tail = &result[start..];
        let marker = tail
            .find(")s")
            .map(|end| &tail[..end + 2])
            .unwrap_or(tail);
        return Err(Error::Template(format!(
            "unresolved placeholder {:?}",
            marker
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_replaces_known_markers() {
        let v = vars(&[("name", "nginx"), ("version", "1.24.0")]);
        let out = substitute("tar xf %(name)s-%(version)s.tar.gz", &v);
        assert_eq!(out, "tar xf nginx-1.24.0.tar.gz");
    }

    #[test]
    fn test_substitute_leaves_unknown_markers() {
        let v = vars(&[("name", "nginx")]);
        let out = substitute("%(name)s %(missing)s", &v);
        assert_eq!(out, "nginx %(missing)s");
    }

    #[test]
    fn test_substitute_leaves_shell_percent_alone() {
        let v = vars(&[]);
        assert_eq!(substitute("date +%s", &v), "date +%s");
    }

    #[test]
    fn test_render_rejects_unresolved() {
        let v = vars(&[("name", "nginx")]);
        let err = render("listen %(port)s;", &v).unwrap_err();
        match err {
            Error::Template(msg) => assert!(msg.contains("%(port)s")),
            other => panic!("expected Template error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_accepts_fully_resolved() {
        let v = vars(&[("port", "8080")]);
        assert_eq!(render("listen %(port)s;", &v).unwrap(), "listen 8080;");
    }
}
