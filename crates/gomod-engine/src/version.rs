//! Reproduces `go list`'s module versioning rules against a Git checkout.
//!
//! When a commit carries a semantic-version tag matching the module's major
//! version, that tag *is* the version. Otherwise a pseudo-version is
//! synthesized from the nearest ancestor tag, the commit time, and the
//! commit hash, exactly as `go mod download` would report it.

use git2::{Commit, Repository};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use time::OffsetDateTime;

use gomod_core::EngineError;

static MODULE_MAJOR_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:.+/v)(?P<major>\d+)$").expect("valid regex"));

const TIMESTAMP_FORMAT: &[time::format_description::FormatItem<'_>] =
    time::macros::format_description!("[year][month][day][hour][minute][second]");

/// Determines `module_name`'s version at `commit_sha` (or `HEAD`), in the
/// `vX.Y.Z` or pseudo-version format `go list` would report.
///
/// `update_tags` fetches `origin`'s tags first, so a shallow or stale clone
/// still sees tags pushed after it was cloned.
pub fn golang_version(
    git_dir: &std::path::Path,
    module_name: &str,
    commit_sha: Option<&str>,
    update_tags: bool,
    subpath: Option<&str>,
) -> Result<String, EngineError> {
    let repo = Repository::open(git_dir)?;
    let module_major_version = MODULE_MAJOR_VERSION
        .captures(module_name)
        .and_then(|c| c.name("major"))
        .and_then(|m| m.as_str().parse::<u64>().ok());

    if update_tags {
        let mut remote = repo.find_remote("origin").map_err(|e| {
            EngineError::FetchFailure(format!(
                "failed to fetch the tags on the Git repository for {module_name}: {e}"
            ))
        })?;
        remote
            .fetch(&["+refs/tags/*:refs/tags/*"], None, None)
            .map_err(|e| {
                EngineError::FetchFailure(format!(
                    "failed to fetch the tags on the Git repository for {module_name}: {e}"
                ))
            })?;
    }

    // Prefer v1.x.x tags but fall back to v0.x.x if both are present.
    let majors_to_try: Vec<u64> = match module_major_version {
        Some(m) => vec![m],
        None => vec![1, 0],
    };

    let commit = match commit_sha {
        Some(sha) => repo.find_commit(git2::Oid::from_str(sha)?)?,
        None => repo.head()?.peel_to_commit()?,
    };

    for major in &majors_to_try {
        if let Some((tag_name, _)) = highest_semver_tag(&repo, &commit, *major, false, subpath)? {
            tracing::debug!(tag = %tag_name, commit = %commit.id(), "using semantic version tag for commit");
            return Ok(match subpath {
                Some(sp) => tag_name.replacen(&format!("{sp}/"), "", 1),
                None => tag_name,
            });
        }
    }

    tracing::debug!(commit = %commit.id(), "no semantic version tag was found on the commit");

    for major in &majors_to_try {
        if let Some((tag_name, version)) = highest_semver_tag(&repo, &commit, *major, true, subpath)? {
            tracing::debug!(tag = %tag_name, commit = %commit.id(), "using semantic version tag as pseudo-base");
            let pseudo = pseudo_version(&commit, Some(&version), module_major_version)?;
            tracing::debug!(pseudo_version = %pseudo, commit = %commit.id(), "computed pseudo-version");
            return Ok(pseudo);
        }
    }

    tracing::debug!("no valid semantic version tag was found, falling back to v0 pseudo-version");
    pseudo_version(&commit, None, module_major_version)
}

/// Finds the highest semver-tag on (or reachable from, if `all_reachable`)
/// `target` whose major version matches `major`, constrained to tags
/// prefixed `{subpath}/v` (or just `v` when there's no subpath).
fn highest_semver_tag(
    repo: &Repository,
    target: &Commit,
    major: u64,
    all_reachable: bool,
    subpath: Option<&str>,
) -> Result<Option<(String, Version)>, EngineError> {
    let prefix = match subpath {
        Some(sp) => format!("{sp}/v"),
        None => "v".to_string(),
    };

    let mut highest: Option<(String, Version)> = None;

    for name in repo.tag_names(None)?.iter().flatten() {
        if !name.starts_with(&prefix) {
            continue;
        }

        let Ok(reference) = repo.find_reference(&format!("refs/tags/{name}")) else {
            continue;
        };
        let Ok(tag_commit) = reference.peel_to_commit() else {
            continue;
        };
        let tag_commit_id = tag_commit.id();

        let reachable = if all_reachable {
            tag_commit_id == target.id()
                || repo
                    .graph_descendant_of(target.id(), tag_commit_id)
                    .unwrap_or(false)
        } else {
            tag_commit_id == target.id()
        };
        if !reachable {
            continue;
        }

        let version = match semantic_version_from_tag(name, &prefix) {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!(tag = %name, "not a semantic version tag");
                continue;
            }
        };
        if version.major != major {
            continue;
        }

        if highest.as_ref().is_none_or(|(_, h)| &version > h) {
            highest = Some((name.to_string(), version));
        }
    }

    Ok(highest)
}

/// Strips a tag's `{subpath}/v` or `v` prefix and parses what remains as semver.
fn semantic_version_from_tag(tag_name: &str, prefix: &str) -> Result<Version, semver::Error> {
    Version::parse(&tag_name[prefix.len()..])
}

/// Builds the `vX.Y.Z-yyyymmddhhmmss-abcdefabcdef`-shaped pseudo-version.
///
/// `base`, if given, is the highest semver tag reachable from `commit`; it
/// determines whether the synthesized version bumps the patch number
/// (release tag) or reuses the prerelease identifier (prerelease tag).
/// Without a base, the module's declared major version (or 0) is used.
fn pseudo_version(
    commit: &Commit,
    base: Option<&Version>,
    module_major_version: Option<u64>,
) -> Result<String, EngineError> {
    let commit_timestamp = format_commit_time(commit)?;
    let commit_hash = &commit.id().to_string()[..12];

    let Some(base) = base else {
        return Ok(format!(
            "v{}.0.0-{commit_timestamp}-{commit_hash}",
            module_major_version.unwrap_or(0)
        ));
    };

    if !base.pre.is_empty() {
        // v2.2.0-alpha -> v2.2.0-alpha.0.yyyymmddhhmmss-hash
        Ok(format!("v{base}.0.{commit_timestamp}-{commit_hash}"))
    } else {
        // v1.2.3 -> v1.2.4-0.yyyymmddhhmmss-hash
        let mut bumped = base.clone();
        bumped.patch += 1;
        bumped.pre = Prerelease::EMPTY;
        bumped.build = BuildMetadata::EMPTY;
        Ok(format!("v{bumped}-0.{commit_timestamp}-{commit_hash}"))
    }
}

fn format_commit_time(commit: &Commit) -> Result<String, EngineError> {
    let when = OffsetDateTime::from_unix_timestamp(commit.time().seconds()).map_err(|e| {
        EngineError::unexpected_format(format!("commit has an invalid timestamp: {e}"), None)
    })?;
    when.format(TIMESTAMP_FORMAT).map_err(|e| {
        EngineError::unexpected_format(format!("failed to format commit timestamp: {e}"), None)
    })
}
