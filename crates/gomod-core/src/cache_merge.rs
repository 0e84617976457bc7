//! Merges a toolchain-local module download cache into a caller-visible one.
//!
//! The merge is additive: an existing destination file always wins, except
//! for `list` files next to a `list.lock` sibling in the source, which are
//! merged line-by-line so that every process that ever downloaded a version
//! stays represented.

use std::fs;
use std::path::Path;

/// Recursively merges `src` into `dst`, creating `dst` if needed.
pub fn merge_into(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !src.exists() {
        return Ok(());
    }
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            merge_into(&src_path, &dst_path)?;
            continue;
        }

        if dst_path.exists() {
            if is_mergeable_list_file(&src_path) {
                merge_list_files(&src_path, &dst_path)?;
            }
            continue;
        }

        fs::copy(&src_path, &dst_path)?;
    }

    Ok(())
}

/// A `list` file is merged (rather than left alone) only when its sibling
/// `list.lock` exists at the source, per Go's own download-cache protocol.
fn is_mergeable_list_file(src_path: &Path) -> bool {
    src_path.file_name().and_then(|n| n.to_str()) == Some("list") && {
        let lock = src_path.with_file_name("list.lock");
        lock.exists()
    }
}

/// Rewrites `dst` with the sorted, deduplicated, non-empty union of the
/// rstripped lines from `src` and `dst`.
fn merge_list_files(src: &Path, dst: &Path) -> std::io::Result<()> {
    let src_lines = fs::read_to_string(src)?;
    let dst_lines = fs::read_to_string(dst)?;

    let mut merged: Vec<&str> = src_lines
        .lines()
        .chain(dst_lines.lines())
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    merged.sort_unstable();
    merged.dedup();

    let mut content = merged.join("\n");
    if !merged.is_empty() {
        content.push('\n');
    }
    fs::write(dst, content)
}
