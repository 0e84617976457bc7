//! The data model shared across every resolution stage.
//!
//! [`ModuleRecord`] and [`PackageRecord`] mirror the two component kinds the
//! resolved output is made of; everything upstream of the Fetcher (the
//! listing, the vendor manifest, the version oracle) deals in plainer,
//! stage-local shapes defined in their own modules.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One Go module pre-fetch request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Directory containing the `go.mod` to resolve.
    pub source_dir: PathBuf,
    /// Directory the resolved sources and cache are written under.
    pub output_dir: PathBuf,
    /// Subpaths within `source_dir` holding additional `go.mod` files, for
    /// multi-module repositories. Empty means "just `source_dir` itself".
    pub subpaths: Vec<String>,
    /// User-supplied `go.mod` replace directives to apply before resolving.
    pub replacements: Vec<Replacement>,
    /// Behavioral switches requested for this resolve.
    pub flags: HashSet<Flag>,
}

impl Request {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            subpaths: vec![String::from(".")],
            replacements: Vec::new(),
            flags: HashSet::new(),
        }
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// A behavioral switch a caller can request for a resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Force `go mod vendor`/`go mod tidy` as if `vendor/modules.txt` were
    /// present, regardless of what's actually on disk.
    GomodVendor,
    /// Like `GomodVendor`, but fail instead of silently re-vendoring when the
    /// tree's vendor directory would change.
    GomodVendorCheck,
    /// Run the Go toolchain with `CGO_ENABLED=0`.
    CgoDisable,
    /// Run `go mod tidy` even when `go.sum` looks complete.
    ForceGomodTidy,
}

/// A user-requested `go.mod` replace directive.
#[derive(Debug, Clone)]
pub struct Replacement {
    /// Module path being replaced.
    pub name: String,
    /// Replacement module path, if different from `name`.
    pub new_name: Option<String>,
    /// Version (or local path) to replace with.
    pub version: String,
}

impl Replacement {
    /// The module path `go mod edit -replace` should target on the right-hand side.
    pub fn replacement_path(&self) -> &str {
        self.new_name.as_deref().unwrap_or(&self.name)
    }
}

/// A resolved reference to another module the one being replaced points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacesRef {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub name: String,
    pub version: String,
}

/// The two kinds of resolved component the spec's output is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Gomod,
    GoPackage,
}

/// A resolved Go module: the unit `go.sum` pins and the download cache keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces: Option<ReplacesRef>,
}

impl ModuleRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: ComponentKind::Gomod,
            name: name.into(),
            version: version.into(),
            replaces: None,
        }
    }
}

/// A resolved Go package: an importable path within a module.
///
/// `version` is `None` for standard-library packages, which carry no module
/// of their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            kind: ComponentKind::GoPackage,
            name: name.into(),
            version,
        }
    }

    pub fn is_local(&self) -> bool {
        self.version.as_deref().is_some_and(|v| v.starts_with('.'))
    }
}
