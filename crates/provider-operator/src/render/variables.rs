//! `${VAR}` token substitution over raw manifest text, run before YAML
//! parsing so it works uniformly across every document kind. Values come
//! from the provider's `configSecret` (highest priority), the operator's
//! own environment, and a small set of built-in defaults.

use crate::util::errors::{Error, StdError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitutes every `${VAR}` token found in `vars`; tokens with no entry
/// in `vars` are left untouched so a missing optional variable does not
/// corrupt the surrounding document.
pub fn substitute(text: &str, vars: &BTreeMap<String, String>) -> String {
    TOKEN
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            vars.get(name).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names of every `${VAR}` token referenced in `text`, for preflight
/// validation of required-but-unset variables.
pub fn referenced_variables(text: &str) -> Vec<String> {
    TOKEN.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Like [`substitute`], but fails the render instead of emitting a document
/// with a dangling `${VAR}` token inside it.
pub fn substitute_required(text: &str, vars: &BTreeMap<String, String>) -> Result<String, Error> {
    let mut missing: Vec<String> = referenced_variables(text).into_iter().filter(|name| !vars.contains_key(name)).collect();
    missing.sort();
    missing.dedup();
    if !missing.is_empty() {
        return Err(Error::StdError(StdError::Fetch(format!(
            "unresolved required variable(s): {}",
            missing.join(", ")
        ))));
    }
    Ok(substitute(text, vars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_tokens_and_leaves_unknown_ones() {
        let mut vars = BTreeMap::new();
        vars.insert("NAMESPACE".to_string(), "capi-system".to_string());
        let out = substitute("namespace: ${NAMESPACE}, extra: ${UNKNOWN}", &vars);
        assert_eq!(out, "namespace: capi-system, extra: ${UNKNOWN}");
    }

    #[test]
    fn collects_referenced_variable_names() {
        let names = referenced_variables("${A}-${B}-${A}");
        assert_eq!(names, vec!["A", "B", "A"]);
    }

    #[test]
    fn substitute_required_fails_on_unresolved_variable() {
        let vars = BTreeMap::new();
        let err = substitute_required("namespace: ${NAMESPACE}", &vars).unwrap_err();
        assert!(err.to_string().contains("NAMESPACE"));
    }

    #[test]
    fn substitute_required_succeeds_when_fully_resolved() {
        let mut vars = BTreeMap::new();
        vars.insert("NAMESPACE".to_string(), "capi-system".to_string());
        let out = substitute_required("namespace: ${NAMESPACE}", &vars).unwrap();
        assert_eq!(out, "namespace: capi-system");
    }
}
