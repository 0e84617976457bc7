//! A temporary directory scoped to one resolve, doubling as GOPATH/GOCACHE/GOMODCACHE.
//!
//! The Go module cache marks its files read-only, which defeats a plain
//! recursive directory removal. [`ScopedGoCache`] runs `go clean -modcache`
//! against the directory before letting the wrapped [`tempfile::TempDir`]
//! delete it, and does so unconditionally on drop — including during panic
//! unwinding.

use std::path::Path;

use tempfile::TempDir;

use crate::process::{ProcessRunner, RunParams, cmd};

/// Owns a fresh temporary directory for the duration of one resolve.
///
/// Dropping the value invokes `go clean -modcache` (best effort, errors are
/// logged and swallowed) and then removes the directory.
pub struct ScopedGoCache<'a, R: ProcessRunner> {
    dir: Option<TempDir>,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> ScopedGoCache<'a, R> {
    /// Creates a new scoped cache directory under the system temp dir.
    pub fn open(runner: &'a R) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("gomod-prefetch-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "opened scoped go cache");
        Ok(Self {
            dir: Some(dir),
            runner,
        })
    }

    /// Path to the scoped directory.
    pub fn path(&self) -> &Path {
        self.dir.as_ref().expect("dir present until drop").path()
    }
}

impl<R: ProcessRunner> Drop for ScopedGoCache<'_, R> {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        let mut env = std::collections::HashMap::new();
        env.insert("GOPATH".to_string(), dir.path().display().to_string());
        env.insert("GOCACHE".to_string(), dir.path().display().to_string());
        let params = RunParams::new(dir.path(), env);

        if let Err(e) = self
            .runner
            .run(&cmd(["go", "clean", "-modcache"]), &params)
        {
            tracing::warn!(error = %e, path = %dir.path().display(), "go clean -modcache failed during cache teardown, removing directory anyway");
        }

        // `dir`'s own Drop now removes the directory tree; this happens even
        // if the clean command above failed.
    }
}
