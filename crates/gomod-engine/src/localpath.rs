//! Rewrites local (`replace ... => ./path`) dependency versions from
//! module-relative paths into full paths from the repository root, and
//! rejects local paths that would escape it.

use std::path::Path;

use gomod_core::EngineError;

use crate::types::{ModuleRecord, PackageRecord};

/// Fails if any local dependency path (a version starting with `.`) is
/// absolute or climbs outside the repository via `..`.
pub fn vet_local_deps<'a>(versions: impl IntoIterator<Item = &'a str>) -> Result<(), EngineError> {
    for version in versions {
        vet_one(version)?;
    }
    Ok(())
}

fn vet_one(version: &str) -> Result<(), EngineError> {
    if version.is_empty() {
        return Ok(()); // go stdlib
    }

    if version.starts_with('.') && Path::new(version).components().any(|c| c.as_os_str() == "..") {
        return Err(EngineError::UnsupportedFeature(format!(
            "Path to gomod dependency contains '..': {version}."
        )));
    }

    if version.starts_with('/') || has_windows_drive_root(version) {
        return Err(EngineError::UnsupportedFeature(format!(
            "Absolute paths to gomod dependencies are not supported: {version}"
        )));
    }

    Ok(())
}

/// Rejects a `C:\...`-shaped absolute Windows path, mirroring
/// `PureWindowsPath(version).root` without depending on Windows path parsing.
fn has_windows_drive_root(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Rewrites each local package dependency's version from the module-relative
/// path `go list` reports into the full path from the repository root, by
/// joining the owning module's local path with the package's path inside it.
pub fn set_full_local_dep_relpaths(
    pkg_deps: &mut [PackageRecord],
    main_module_deps: &[ModuleRecord],
) -> Result<(), EngineError> {
    let locally_replaced: Vec<&str> = main_module_deps
        .iter()
        .filter(|m| m.version.starts_with('.'))
        .map(|m| m.name.as_str())
        .collect();

    for dep in pkg_deps.iter_mut() {
        let Some(dep_path) = dep.version.clone() else {
            continue;
        };
        if !dep_path.starts_with('.') {
            continue;
        }

        let dep_module_name = match_parent_module(&dep.name, locally_replaced.iter().copied())
            .ok_or_else(|| {
                EngineError::package_rejected(
                    format!("could not find parent Go module for local dependency: {}", dep.name),
                    None,
                )
            })?;

        let suffix = path_to_subpackage(dep_module_name, &dep.name)?;
        if !suffix.is_empty() {
            dep.version = Some(join_path(&dep_path, &suffix));
        }
    }

    Ok(())
}

fn join_path(base: &str, suffix: &str) -> String {
    let mut joined = String::from(base);
    if !joined.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(suffix);
    joined
}

/// Relative path from `parent_name` to `subpackage_name`, empty when they're
/// identical.
pub fn path_to_subpackage<'a>(parent_name: &str, subpackage_name: &'a str) -> Result<&'a str, EngineError> {
    if !contains_package(parent_name, subpackage_name) {
        return Err(EngineError::package_rejected(
            format!("package {subpackage_name} does not belong to {parent_name}"),
            None,
        ));
    }
    Ok(subpackage_name[parent_name.len()..].trim_start_matches('/'))
}

/// True if `package_name` is `parent_name` itself or `{parent_name}/...`.
pub fn contains_package(parent_name: &str, package_name: &str) -> bool {
    if !package_name.starts_with(parent_name) {
        return false;
    }
    if package_name.len() > parent_name.len() {
        return package_name.as_bytes()[parent_name.len()] == b'/';
    }
    true
}

/// Finds the longest module name in `module_names` for which
/// `contains_package(module_name, package_name)` holds.
pub fn match_parent_module<'a>(
    package_name: &str,
    module_names: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    module_names
        .into_iter()
        .filter(|m| contains_package(m, package_name))
        .max_by_key(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_package_rejects_sibling_with_shared_prefix() {
        assert!(!contains_package("example.com/foo", "example.com/foobar"));
    }

    #[test]
    fn contains_package_accepts_subpackage() {
        assert!(contains_package("example.com/foo", "example.com/foo/bar"));
    }

    #[test]
    fn contains_package_accepts_identical_names() {
        assert!(contains_package("example.com/foo", "example.com/foo"));
    }

    #[test]
    fn path_to_subpackage_is_empty_for_identical_names() {
        assert_eq!(path_to_subpackage("example.com/foo", "example.com/foo").unwrap(), "");
    }

    #[test]
    fn path_to_subpackage_strips_parent_and_slash() {
        assert_eq!(
            path_to_subpackage("example.com/foo", "example.com/foo/bar").unwrap(),
            "bar"
        );
    }

    #[test]
    fn path_to_subpackage_errors_when_not_contained() {
        assert!(path_to_subpackage("example.com/foo", "example.com/bar").is_err());
    }

    #[test]
    fn match_parent_module_picks_longest_match() {
        let modules = ["example.com", "example.com/sub"];
        let found = match_parent_module("example.com/sub/pkg", modules);
        assert_eq!(found, Some("example.com/sub"));
    }

    #[test]
    fn vet_local_deps_allows_plain_relative_path() {
        assert!(vet_local_deps(["./vendor/pkg"]).is_ok());
    }

    #[test]
    fn vet_local_deps_rejects_dotdot_escape() {
        let err = vet_local_deps(["../outside"]).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFeature(_)));
    }

    #[test]
    fn vet_local_deps_rejects_absolute_unix_path() {
        assert!(vet_local_deps(["/etc/passwd"]).is_err());
    }

    #[test]
    fn vet_local_deps_rejects_windows_drive_path() {
        assert!(vet_local_deps(["C:\\deps"]).is_err());
    }

    #[test]
    fn vet_local_deps_allows_stdlib_empty_version() {
        assert!(vet_local_deps([""]).is_ok());
    }

    #[test]
    fn set_full_local_dep_relpaths_rewrites_to_repo_relative_path() {
        let module_deps = vec![ModuleRecord::new("example.com/local", "./staging/local")];
        let mut pkg_deps = vec![PackageRecord::new(
            "example.com/local/pkg",
            Some("./staging/local".to_string()),
        )];

        set_full_local_dep_relpaths(&mut pkg_deps, &module_deps).unwrap();

        assert_eq!(pkg_deps[0].version.as_deref(), Some("./staging/local/pkg"));
    }

    #[test]
    fn set_full_local_dep_relpaths_leaves_module_root_package_untouched() {
        let module_deps = vec![ModuleRecord::new("example.com/local", "./staging/local")];
        let mut pkg_deps = vec![PackageRecord::new(
            "example.com/local",
            Some("./staging/local".to_string()),
        )];

        set_full_local_dep_relpaths(&mut pkg_deps, &module_deps).unwrap();

        assert_eq!(pkg_deps[0].version.as_deref(), Some("./staging/local"));
    }
}
