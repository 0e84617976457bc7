//! Orchestrates one `go.mod` tree through the full resolve sequence:
//! replace directives, download-or-vendor, `go list`, and the local-path and
//! replacement bookkeeping that turns raw toolchain output into records.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use gomod_core::{EngineError, ProcessRunner, RunParams, ScopedGoCache, cache_merge, cmd, run_params_with_inherited_path};

use crate::config::EngineConfig;
use crate::types::{Flag, ModuleRecord, PackageRecord, Replacement};
use crate::{listing, localpath, replacements, vendor, version};

/// A resolved Go package together with the package-level dependencies that
/// justify why it needs what it needs.
#[derive(Debug, Clone)]
pub struct PackageWithDeps {
    pub package: PackageRecord,
    pub deps: Vec<PackageRecord>,
}

/// The full result of resolving one `go.mod` tree.
#[derive(Debug, Clone)]
pub struct GomodResult {
    pub module: ModuleRecord,
    pub module_deps: Vec<ModuleRecord>,
    pub packages: Vec<PackageWithDeps>,
}

/// Resolves a single Go module directory.
pub struct Resolver<'a, R: ProcessRunner> {
    runner: &'a R,
    config: &'a EngineConfig,
}

impl<'a, R: ProcessRunner> Resolver<'a, R> {
    pub fn new(runner: &'a R, config: &'a EngineConfig) -> Self {
        Self { runner, config }
    }

    /// Resolves the module rooted at `app_dir`, part of the Git repository
    /// at `git_dir`. `subpath` is `app_dir`'s path relative to `git_dir`
    /// (`"."` for the repository root), used to scope versioning to the
    /// right module when a single repository holds several. `download_cache_dir`
    /// is where the downloaded module cache is merged to on success
    /// (vendored resolves leave it untouched except for creating it, so
    /// callers always find it present).
    #[tracing::instrument(skip_all, fields(subpath))]
    pub fn resolve(
        &self,
        app_dir: &Path,
        git_dir: &Path,
        subpath: &str,
        replacements_requested: &[Replacement],
        flags: &HashSet<Flag>,
        download_cache_dir: &Path,
    ) -> Result<GomodResult, EngineError> {
        let scoped = ScopedGoCache::open(self.runner)?;
        let params = run_params(self.config, scoped.path(), app_dir, flags);

        let requested_names = replacements::apply(self.runner, &params, replacements_requested)?;

        let (should_vendor, can_make_changes) =
            should_vendor_deps(flags, app_dir, self.config.gomod_strict_vendor)?;

        if should_vendor {
            vendor_deps(
                self.runner,
                &params,
                can_make_changes,
                git_dir,
                self.config.gomod_download_max_tries,
            )?;
        } else {
            tracing::info!("downloading the gomod dependencies");
            self.runner.run_download(
                &cmd(["go", "mod", "download"]),
                &params,
                self.config.gomod_download_max_tries,
            )?;
        }

        if flags.contains(&Flag::ForceGomodTidy) || !replacements_requested.is_empty() {
            self.runner.run(&cmd(["go", "mod", "tidy"]), &params)?;
        }

        let module_name = self
            .runner
            .run(&cmd(["go", "list", "-m"]), &params)?
            .trim()
            .to_string();

        let module_lines_text = if should_vendor {
            vendor::module_lines_from_modules_txt(app_dir)?.join("\n")
        } else {
            self.runner.run(
                &cmd([
                    "go",
                    "list",
                    "-mod",
                    "readonly",
                    "-m",
                    "-f",
                    "{{ if not .Main }}{{ .String }}{{ end }}",
                    "all",
                ]),
                &params,
            )?
        };

        let parsed = listing::parse_m_lines(&module_lines_text, &requested_names);
        replacements::reconcile(&requested_names, &parsed.honored)?;

        let version_subpath = (subpath != ".").then_some(subpath);
        let module_version = version::golang_version(git_dir, &module_name, None, true, version_subpath)?;
        let module = ModuleRecord::new(module_name, module_version.clone());

        if should_vendor {
            std::fs::create_dir_all(download_cache_dir)?;
        } else {
            let tmp_cache = scoped.path().join("pkg").join("mod").join("cache").join("download");
            cache_merge::merge_into(&tmp_cache, download_cache_dir)?;
        }

        let go_list_prefix: &[&str] = if should_vendor {
            &["go", "list"]
        } else {
            &["go", "list", "-mod", "readonly"]
        };

        tracing::info!("retrieving the list of packages");
        let package_list: Vec<String> = self
            .runner
            .run(&cmd(go_list_prefix.iter().copied().chain(["-find", "./..."])), &params)?
            .lines()
            .map(str::to_string)
            .collect();

        tracing::info!("retrieving the list of package level dependencies");
        let deps_json = self.runner.run(
            &cmd(go_list_prefix.iter().copied().chain(["-e", "-deps", "-json", "./..."])),
            &params,
        )?;
        let package_info = listing::parse_deps_json(&deps_json)?;

        let mut processed: HashSet<String> = HashSet::new();
        let mut packages = Vec::new();

        for pkg_name in package_list {
            if processed.contains(&pkg_name) {
                // Already listed as a dependency of an earlier top-level package.
                tracing::debug!(package = %pkg_name, "package already listed as a dependency, skipping");
                continue;
            }

            let mut pkg_deps = Vec::new();
            if let Some(entry) = package_info.get(&pkg_name) {
                for dep_name in entry.deps.iter().flatten() {
                    processed.insert(dep_name.clone());
                    let dep_info = package_info.get(dep_name);
                    let version = match dep_info {
                        Some(d) if d.standard == Some(true) => None,
                        Some(d) => d
                            .module
                            .as_ref()
                            .and_then(|m| m.dep_version())
                            .or_else(|| Some(module_version.clone())),
                        None => Some(module_version.clone()),
                    };
                    pkg_deps.push(PackageRecord::new(dep_name.clone(), version));
                }
            }

            let pkg = PackageRecord::new(pkg_name, Some(module_version.clone()));
            packages.push(PackageWithDeps { package: pkg, deps: pkg_deps });
        }

        localpath::vet_local_deps(parsed.modules.iter().map(|m| m.version.as_str()))?;
        for pkg in &mut packages {
            localpath::vet_local_deps(pkg.deps.iter().map(|p| p.version.as_deref().unwrap_or("")))?;
            localpath::set_full_local_dep_relpaths(&mut pkg.deps, &parsed.modules)?;
        }

        Ok(GomodResult {
            module,
            module_deps: parsed.modules,
            packages,
        })
    }
}

fn run_params(config: &EngineConfig, cache_dir: &Path, app_dir: &Path, flags: &HashSet<Flag>) -> RunParams {
    let mut env: HashMap<String, String> = HashMap::new();
    env.insert("GOPATH".into(), cache_dir.display().to_string());
    env.insert("GO111MODULE".into(), "on".into());
    env.insert("GOCACHE".into(), cache_dir.display().to_string());
    env.insert("GOMODCACHE".into(), cache_dir.join("pkg").join("mod").display().to_string());
    if let Some(proxy) = &config.goproxy_url {
        env.insert("GOPROXY".into(), proxy.clone());
    }
    if flags.contains(&Flag::CgoDisable) {
        env.insert("CGO_ENABLED".into(), "0".into());
    }
    run_params_with_inherited_path(app_dir, env)
}

/// Decides whether to vendor dependencies, and if so, whether Cachi2-style
/// changes to the vendor directory are allowed:
/// - `gomod-vendor-check` => vendor, only if the vendor dir doesn't already exist
/// - `gomod-vendor` => vendor, always allowed to change it
/// - neither, but `strict` and a vendor dir exists => reject the request
fn should_vendor_deps(flags: &HashSet<Flag>, app_dir: &Path, strict: bool) -> Result<(bool, bool), EngineError> {
    let vendor_dir = app_dir.join("vendor");

    if flags.contains(&Flag::GomodVendorCheck) {
        return Ok((true, !vendor_dir.exists()));
    }
    if flags.contains(&Flag::GomodVendor) {
        return Ok((true, true));
    }

    if strict && vendor_dir.is_dir() {
        return Err(EngineError::package_rejected(
            "The \"gomod-vendor\" or \"gomod-vendor-check\" flag must be set when your repository has vendored dependencies.",
            Some(
                "Consider removing the vendor/ directory and letting dependencies download \
                 instead.\nIf you do want to keep using vendoring, please pass one of the required flags."
                    .to_string(),
            ),
        ));
    }

    Ok((false, false))
}

fn vendor_deps<R: ProcessRunner>(
    runner: &R,
    params: &RunParams,
    can_make_changes: bool,
    git_dir: &Path,
    max_tries: u32,
) -> Result<(), EngineError> {
    tracing::info!("vendoring the gomod dependencies");
    runner.run_download(&cmd(["go", "mod", "vendor"]), params, max_tries)?;

    if !can_make_changes && vendor::vendor_changed(git_dir, &params.cwd)? {
        return Err(EngineError::package_rejected(
            "The content of the vendor directory is not consistent with go.mod. Please check the logs for more details.",
            Some(
                "Please try running `go mod vendor` and committing the changes.\n\
                 Note that you may need to force-add ignored files in the vendor/ dir.\n\
                 Also consider whether you really want the -check variant of the flag."
                    .to_string(),
            ),
        ));
    }

    Ok(())
}

/// Re-exported for callers that only need the path helper, e.g. tests building fixtures.
pub fn download_cache_subdir(output_dir: &Path) -> PathBuf {
    output_dir
        .join("deps")
        .join("gomod")
        .join("pkg")
        .join("mod")
        .join("cache")
        .join("download")
}
