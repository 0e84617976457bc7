//! Parses the two textual shapes the Go toolchain reports dependencies in:
//! `go list -m -f '{{.String}}' all` module lines, and the concatenated JSON
//! objects from `go list -deps -json`.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Deserializer as JsonDeserializer;

use gomod_core::EngineError;

use crate::types::{ComponentKind, ModuleRecord, ReplacesRef};

/// One parsed `go list -m -f '{{.String}}' all` line, already resolved to the
/// module that is actually used (the right-hand side of any `=>` replace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedModuleLines {
    pub modules: Vec<ModuleRecord>,
    /// Names of user-requested replacements that were observed applied.
    pub honored: HashSet<String>,
}

/// Parses module lines in the `.String` template format:
/// `<name> <version> [=> <replace>]`, where `<replace>` is either
/// `<name> <version>` or a local path.
///
/// `requested` is the set of module names the caller asked to replace; only
/// replaces matching one of those names are recorded on [`ModuleRecord::replaces`]
/// (pre-existing `replace` directives in `go.mod` are Go's own business and
/// carry no meaning here).
pub fn parse_m_lines(text: &str, requested: &HashSet<String>) -> ParsedModuleLines {
    let mut modules = Vec::new();
    let mut honored = HashSet::new();

    for line in text.lines() {
        let parts: Vec<&str> = line.split(' ').collect();

        let mut replaces = None;
        let resolved: Vec<&str> = if parts.len() == 4 && parts[2] == "=>" {
            // k8s.io/metrics v0.0.0 => ./staging/src/k8s.io/metrics
            vec![parts[0], parts[3]]
        } else if parts.len() == 5 && parts[2] == "=>" {
            // github.com/pkg/errors v0.8.0 => github.com/pkg/errors v0.8.1
            let (old_name, old_version) = (parts[0], parts[1]);
            if requested.contains(old_name) {
                honored.insert(old_name.to_string());
                replaces = Some(ReplacesRef {
                    kind: ComponentKind::Gomod,
                    name: old_name.to_string(),
                    version: old_version.to_string(),
                });
            }
            parts[3..].to_vec()
        } else {
            parts
        };

        if resolved.len() == 2 {
            modules.push(ModuleRecord {
                kind: ComponentKind::Gomod,
                name: resolved[0].to_string(),
                version: resolved[1].to_string(),
                replaces,
            });
        } else {
            tracing::warn!(line, "unexpected go module output");
        }
    }

    ParsedModuleLines { modules, honored }
}

/// A single `go list -deps -json` record, trimmed to the fields used
/// downstream. `Module`/`Deps`/`Standard` are all optional in the toolchain's
/// own output.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingEntry {
    #[serde(rename = "ImportPath")]
    pub import_path: String,
    #[serde(rename = "Module")]
    pub module: Option<ModuleRef>,
    #[serde(rename = "Deps")]
    pub deps: Option<Vec<String>>,
    #[serde(rename = "Standard")]
    pub standard: Option<bool>,
}

/// The `Module` field of a `go list -deps -json` record.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleRef {
    #[serde(rename = "Version")]
    pub version: Option<String>,
    #[serde(rename = "Replace")]
    pub replace: Option<ModuleReplace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleReplace {
    #[serde(rename = "Path")]
    pub path: Option<String>,
    #[serde(rename = "Version")]
    pub version: Option<String>,
}

impl ModuleRef {
    /// Version to attribute to a package under this module: a replace's
    /// version if set, else its path (for a local replace), else the
    /// module's own version.
    pub fn dep_version(&self) -> Option<String> {
        if let Some(replace) = &self.replace {
            replace.version.clone().or_else(|| replace.path.clone())
        } else {
            self.version.clone()
        }
    }
}

/// Streams `go list -deps -json`'s concatenated JSON objects into an
/// import-path keyed map, the same shape `_load_list_deps` produces.
pub fn parse_deps_json(text: &str) -> Result<HashMap<String, ListingEntry>, EngineError> {
    let mut package_info = HashMap::new();
    for value in JsonDeserializer::from_str(text).into_iter::<ListingEntry>() {
        let entry = value?;
        package_info.insert(entry.import_path.clone(), entry);
    }
    Ok(package_info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_module_line() {
        let parsed = parse_m_lines("github.com/pkg/errors v0.9.1", &HashSet::new());
        assert_eq!(parsed.modules.len(), 1);
        assert_eq!(parsed.modules[0].name, "github.com/pkg/errors");
        assert_eq!(parsed.modules[0].version, "v0.9.1");
        assert!(parsed.modules[0].replaces.is_none());
    }

    #[test]
    fn parses_local_path_replace() {
        let parsed = parse_m_lines(
            "k8s.io/metrics v0.0.0 => ./staging/src/k8s.io/metrics",
            &HashSet::new(),
        );
        assert_eq!(parsed.modules[0].name, "k8s.io/metrics");
        assert_eq!(parsed.modules[0].version, "./staging/src/k8s.io/metrics");
        assert!(parsed.modules[0].replaces.is_none());
    }

    #[test]
    fn parses_requested_module_replace_and_marks_honored() {
        let mut requested = HashSet::new();
        requested.insert("github.com/pkg/errors".to_string());

        let parsed = parse_m_lines(
            "github.com/pkg/errors v0.8.0 => github.com/pkg/errors v0.8.1",
            &requested,
        );

        assert_eq!(parsed.modules[0].name, "github.com/pkg/errors");
        assert_eq!(parsed.modules[0].version, "v0.8.1");
        let replaces = parsed.modules[0].replaces.as_ref().unwrap();
        assert_eq!(replaces.name, "github.com/pkg/errors");
        assert_eq!(replaces.version, "v0.8.0");
        assert!(parsed.honored.contains("github.com/pkg/errors"));
    }

    #[test]
    fn ignores_preexisting_replace_not_requested_by_user() {
        let parsed = parse_m_lines(
            "github.com/pkg/errors v0.8.0 => github.com/pkg/errors v0.8.1",
            &HashSet::new(),
        );
        assert!(parsed.modules[0].replaces.is_none());
        assert!(parsed.honored.is_empty());
    }

    #[test]
    fn warns_and_skips_unexpected_line_shape() {
        let parsed = parse_m_lines("this line makes no sense at all", &HashSet::new());
        assert!(parsed.modules.is_empty());
    }

    #[test]
    fn parses_concatenated_json_stream() {
        let text = r#"{"ImportPath":"a","Standard":true}
{"ImportPath":"b","Module":{"Path":"example.com/b","Version":"v1.0.0"},"Deps":["a"]}"#;
        let parsed = parse_deps_json(text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["a"].standard, Some(true));
        assert_eq!(parsed["b"].deps.as_deref(), Some(&["a".to_string()][..]));
        assert_eq!(
            parsed["b"].module.as_ref().unwrap().dep_version(),
            Some("v1.0.0".to_string())
        );
    }

    #[test]
    fn dep_version_prefers_replace_version_then_path_then_module_version() {
        let by_version = ModuleRef {
            version: Some("v1.0.0".into()),
            replace: Some(ModuleReplace {
                path: Some("./local".into()),
                version: Some("v1.2.0".into()),
            }),
        };
        assert_eq!(by_version.dep_version(), Some("v1.2.0".into()));

        let by_path = ModuleRef {
            version: Some("v1.0.0".into()),
            replace: Some(ModuleReplace {
                path: Some("./local".into()),
                version: None,
            }),
        };
        assert_eq!(by_path.dep_version(), Some("./local".into()));

        let by_module_version = ModuleRef {
            version: Some("v1.0.0".into()),
            replace: None,
        };
        assert_eq!(by_module_version.dep_version(), Some("v1.0.0".into()));
    }
}
