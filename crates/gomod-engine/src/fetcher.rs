//! Fans a [`Request`] out across its subpaths, resolving each module
//! directory and flattening the results into one package list.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gomod_core::ProcessRunner;

use crate::config::EngineConfig;
use crate::resolver::{Resolver, download_cache_subdir};
use crate::types::{ComponentKind, ModuleRecord, PackageRecord, Request};

/// One resolved component (a module or a package) with its position in the
/// repository and the dependencies that justify it.
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    pub kind: ComponentKind,
    pub name: String,
    pub version: Option<String>,
    /// Path to this component relative to the request's source directory.
    pub path: String,
    pub dependencies: Vec<Dependency>,
}

/// A dependency of a [`FetchedPackage`]: either a module (for a top-level
/// module entry) or a package (for an individual import).
#[derive(Debug, Clone)]
pub enum Dependency {
    Module(ModuleRecord),
    Package(PackageRecord),
}

/// The full output of fetching a request: every resolved component plus the
/// environment a later build step should set to see the merged cache.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub packages: Vec<FetchedPackage>,
    pub environment_variables: HashMap<String, String>,
}

impl FetchResult {
    fn empty() -> Self {
        Self {
            packages: Vec::new(),
            environment_variables: HashMap::new(),
        }
    }
}

/// Resolves every subpath in `request` and flattens the results.
///
/// # Errors
/// - [`gomod_core::EngineError::PackageRejected`] if `go.mod` is missing at
///   one or more requested subpaths.
/// - [`gomod_core::EngineError::UnsupportedFeature`] if replacements are
///   requested alongside more than one subpath.
#[tracing::instrument(skip_all, fields(source_dir = %request.source_dir.display()))]
pub fn fetch<R: ProcessRunner>(
    runner: &R,
    config: &EngineConfig,
    request: &Request,
) -> Result<FetchResult, gomod_core::EngineError> {
    if request.subpaths.is_empty() {
        return Ok(FetchResult::empty());
    }

    let missing = find_missing_gomod_files(&request.source_dir, &request.subpaths);
    if !missing.is_empty() {
        let joined = missing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(gomod_core::EngineError::package_rejected(
            format!("The go.mod file must be present for the Go module(s) at: {joined}"),
            Some("Please double-check that you have specified correct paths to your Go modules".to_string()),
        ));
    }

    if request.subpaths.len() > 1 && !request.replacements.is_empty() {
        return Err(gomod_core::EngineError::UnsupportedFeature(
            "Dependency replacements are only supported for a single go module path.".to_string(),
        ));
    }

    let git_dir = request.source_dir.clone();
    let download_cache_dir = download_cache_subdir(&request.output_dir);
    let resolver = Resolver::new(runner, config);

    let mut packages = Vec::new();

    for subpath in &request.subpaths {
        tracing::info!(subpath, "fetching the gomod dependencies at subpath");
        let app_dir = request.source_dir.join(subpath);

        let gomod = resolver.resolve(
            &app_dir,
            &git_dir,
            subpath,
            &request.replacements,
            &request.flags,
            &download_cache_dir,
        )?;

        packages.push(FetchedPackage {
            kind: ComponentKind::Gomod,
            name: gomod.module.name.clone(),
            version: Some(gomod.module.version.clone()),
            path: subpath.clone(),
            dependencies: gomod.module_deps.into_iter().map(Dependency::Module).collect(),
        });

        for pkg in gomod.packages {
            let package_subpath = crate::localpath::path_to_subpackage(&gomod.module.name, &pkg.package.name)
                .map(|suffix| normalize_join(subpath, suffix))
                .unwrap_or_else(|_| subpath.clone());

            packages.push(FetchedPackage {
                kind: ComponentKind::GoPackage,
                name: pkg.package.name,
                version: pkg.package.version,
                path: package_subpath,
                dependencies: pkg.deps.into_iter().map(Dependency::Package).collect(),
            });
        }
    }

    let mut environment_variables = HashMap::new();
    environment_variables.insert("GOPATH".to_string(), "deps/gomod".to_string());
    environment_variables.insert("GOCACHE".to_string(), "deps/gomod".to_string());
    environment_variables.insert("GOMODCACHE".to_string(), "deps/gomod/pkg/mod".to_string());
    environment_variables.extend(config.default_environment_overrides.clone());

    Ok(FetchResult {
        packages,
        environment_variables,
    })
}

fn find_missing_gomod_files(source_dir: &Path, subpaths: &[String]) -> Vec<PathBuf> {
    subpaths
        .iter()
        .map(|subpath| source_dir.join(subpath).join("go.mod"))
        .filter(|p| !p.exists())
        .collect()
}

/// Joins `subpath` (from source_dir to a module) with `suffix` (from the
/// module to a package inside it), collapsing any `.`/empty segments.
fn normalize_join(subpath: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return subpath.to_string();
    }
    if subpath == "." || subpath.is_empty() {
        return suffix.to_string();
    }
    format!("{subpath}/{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn empty_subpaths_yields_empty_result() {
        let mut request = Request::new("/tmp/nonexistent", "/tmp/nonexistent-out");
        request.subpaths.clear();
        let runner = gomod_core::process::fake::ScriptedRunner::new(vec![]);
        let result = fetch(&runner, &EngineConfig::default(), &request).unwrap();
        assert!(result.packages.is_empty());
    }

    #[test]
    fn missing_gomod_file_is_rejected() {
        let src = tempdir().unwrap();
        let mut request = Request::new(src.path(), src.path().join("out"));
        request.subpaths = vec![".".to_string()];

        let runner = gomod_core::process::fake::ScriptedRunner::new(vec![]);
        let err = fetch(&runner, &EngineConfig::default(), &request).unwrap_err();
        assert!(matches!(err, gomod_core::EngineError::PackageRejected { .. }));
    }

    #[test]
    fn multiple_subpaths_with_replacements_is_unsupported() {
        let src = tempdir().unwrap();
        fs::write(src.path().join("go.mod"), "module example.com/a\n").unwrap();
        fs::create_dir_all(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub").join("go.mod"), "module example.com/a/sub\n").unwrap();

        let mut request = Request::new(src.path(), src.path().join("out"));
        request.subpaths = vec![".".to_string(), "sub".to_string()];
        request.replacements.push(crate::types::Replacement {
            name: "example.com/x".into(),
            new_name: None,
            version: "v1.0.0".into(),
        });

        let runner = gomod_core::process::fake::ScriptedRunner::new(vec![]);
        let err = fetch(&runner, &EngineConfig::default(), &request).unwrap_err();
        assert!(matches!(err, gomod_core::EngineError::UnsupportedFeature(_)));
    }

    #[test]
    fn normalize_join_handles_dot_subpath() {
        assert_eq!(normalize_join(".", "bar"), "bar");
        assert_eq!(normalize_join("sub", "bar"), "sub/bar");
        assert_eq!(normalize_join("sub", ""), "sub");
    }
}
