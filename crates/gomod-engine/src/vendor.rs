//! Parses `vendor/modules.txt` and detects whether vendoring changed a tree
//! that wasn't supposed to change.

use std::path::Path;

use git2::{DiffOptions, Repository};

use gomod_core::EngineError;

/// Classifies and extracts the module lines from `vendor/modules.txt`,
/// dropping modules that contributed no packages (`go mod vendor` won't
/// actually download those).
///
/// `modules.txt` holds lines in one of four shapes, always in this order
/// (2 and 3 are optional, repeated per module; 4 only ever trails the file):
/// 1. `# <module> <version> [=> <replace>]`
/// 2. `## <markers>`
/// 3. `<package>`
/// 4. `# <module> => <replace>`
pub fn module_lines_from_modules_txt(app_dir: &Path) -> Result<Vec<String>, EngineError> {
    let modules_txt = app_dir.join("vendor").join("modules.txt");
    let text = std::fs::read_to_string(&modules_txt)?;
    parse_modules_txt(&text)
}

fn parse_modules_txt(text: &str) -> Result<Vec<String>, EngineError> {
    let unexpected_format_solution = Some(
        "Does `go mod vendor` make any changes to modules.txt?\n\
         If not, please let the maintainers know that this fails to parse valid modules.txt"
            .to_string(),
    );

    let mut module_lines: Vec<String> = Vec::new();
    let mut has_packages: std::collections::HashSet<usize> = std::collections::HashSet::new();

    for line in text.lines() {
        if !line.starts_with('#') {
            // a package line
            if module_lines.is_empty() {
                return Err(EngineError::unexpected_format(
                    format!("vendor/modules.txt: package has no parent module: {line}"),
                    unexpected_format_solution,
                ));
            }
            has_packages.insert(module_lines.len() - 1);
        } else if let Some(rest) = line.strip_prefix("# ") {
            module_lines.push(rest.to_string());
        } else if !line.starts_with("##") {
            return Err(EngineError::unexpected_format(
                format!("vendor/modules.txt: unexpected format: {line:?}"),
                unexpected_format_solution,
            ));
        }
    }

    Ok(module_lines
        .into_iter()
        .enumerate()
        .filter(|(i, _)| has_packages.contains(i))
        .map(|(_, line)| line)
        .collect())
}

/// True if the vendor directory (or `vendor/modules.txt` specifically) has
/// uncommitted changes relative to the index, including untracked files.
///
/// `app_dir` is the module's directory; `git_dir` is the repository root.
pub fn vendor_changed(git_dir: &Path, app_dir: &Path) -> Result<bool, EngineError> {
    let repo = Repository::open(git_dir)?;
    let vendor_rel = app_dir
        .strip_prefix(git_dir)
        .unwrap_or(app_dir)
        .join("vendor");
    let modules_txt_rel = vendor_rel.join("modules.txt");

    if diff_has_changes(&repo, &modules_txt_rel)? {
        tracing::error!(path = %modules_txt_rel.display(), "modules.txt changed after vendoring");
        return Ok(true);
    }

    if diff_has_changes(&repo, &vendor_rel)? {
        tracing::error!(path = %vendor_rel.display(), "vendor directory changed after vendoring");
        return Ok(true);
    }

    Ok(false)
}

fn diff_has_changes(repo: &Repository, rel_path: &Path) -> Result<bool, EngineError> {
    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .pathspec(rel_path.to_string_lossy().as_ref());

    let diff = repo.diff_index_to_workdir(None, Some(&mut opts))?;
    Ok(diff.deltas().len() > 0)
}
