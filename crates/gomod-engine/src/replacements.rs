//! Applies user-supplied `go.mod` replace directives and checks that every
//! one of them actually took effect.

use std::collections::HashSet;

use gomod_core::{EngineError, ProcessRunner, RunParams, cmd};

use crate::types::Replacement;

/// Invokes `go mod edit -replace <name>=<new_name>@<version>` for every
/// requested replacement, returning the set of module names that were
/// requested (for later reconciliation against the set actually honored by
/// `go list`).
pub fn apply<R: ProcessRunner>(
    runner: &R,
    params: &RunParams,
    replacements: &[Replacement],
) -> Result<HashSet<String>, EngineError> {
    let mut requested = HashSet::new();

    for r in replacements {
        requested.insert(r.name.clone());
        tracing::info!(
            from = %r.name,
            to = %r.replacement_path(),
            version = %r.version,
            "applying the gomod replacement"
        );
        runner.run(
            &cmd([
                "go".to_string(),
                "mod".to_string(),
                "edit".to_string(),
                "-replace".to_string(),
                format!("{}={}@{}", r.name, r.replacement_path(), r.version),
            ]),
            params,
        )?;
    }

    Ok(requested)
}

/// Fails if any requested replacement was not observed as honored, i.e. did
/// not survive into the module graph `go list` reports.
pub fn reconcile(requested: &HashSet<String>, honored: &HashSet<String>) -> Result<(), EngineError> {
    let mut unused: Vec<&String> = requested.difference(honored).collect();
    if unused.is_empty() {
        return Ok(());
    }
    unused.sort();
    let names = unused
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    Err(EngineError::package_rejected(
        format!("The following gomod dependency replacements don't apply: {names}"),
        Some("Dependency replacements are deprecated! Please don't use them.".to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomod_core::process::fake::{Scripted, ScriptedRunner};
    use std::path::Path;

    fn params() -> RunParams {
        RunParams::new(Path::new("."), std::collections::HashMap::new())
    }

    #[test]
    fn apply_invokes_go_mod_edit_replace_per_entry() {
        let runner = ScriptedRunner::new(vec![Scripted::Ok(String::new()), Scripted::Ok(String::new())]);
        let replacements = vec![
            Replacement {
                name: "example.com/a".into(),
                new_name: None,
                version: "v1.2.3".into(),
            },
            Replacement {
                name: "example.com/b".into(),
                new_name: Some("example.com/b-fork".into()),
                version: "v0.1.0".into(),
            },
        ];

        let requested = apply(&runner, &params(), &replacements).unwrap();

        assert_eq!(requested.len(), 2);
        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0],
            vec!["go", "mod", "edit", "-replace", "example.com/a=example.com/a@v1.2.3"]
        );
        assert_eq!(
            calls[1],
            vec!["go", "mod", "edit", "-replace", "example.com/b=example.com/b-fork@v0.1.0"]
        );
    }

    #[test]
    fn reconcile_passes_when_everything_requested_was_honored() {
        let mut requested = HashSet::new();
        requested.insert("a".to_string());
        let honored = requested.clone();
        assert!(reconcile(&requested, &honored).is_ok());
    }

    #[test]
    fn reconcile_rejects_unused_replacement() {
        let mut requested = HashSet::new();
        requested.insert("a".to_string());
        let err = reconcile(&requested, &HashSet::new()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains('a'), "{msg}");
    }
}
