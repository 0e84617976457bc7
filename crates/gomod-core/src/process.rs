//! External command execution with an injected, explicit environment.
//!
//! [`ProcessRunner`] is the seam the rest of the engine is tested against:
//! production code drives [`SystemProcessRunner`], tests drive a scripted
//! fake, and neither the Resolver nor the Fetcher know the difference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};

use crate::error::EngineError;

/// Working directory and environment for one subprocess invocation.
///
/// The inherited process environment is **not** forwarded; only the
/// variables present in `env` reach the child process. Callers that want
/// `PATH` available must inject it explicitly.
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
}

impl RunParams {
    pub fn new(cwd: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        Self {
            cwd: cwd.into(),
            env,
        }
    }
}

/// Executes external commands under a caller-controlled environment.
///
/// Implementations must return captured stdout on a zero exit status, and
/// raise [`EngineError::GoModFailure`] otherwise.
pub trait ProcessRunner {
    /// Runs `cmd` with `params`, returning stdout as text.
    fn run(&self, cmd: &[String], params: &RunParams) -> Result<String, EngineError>;

    /// Runs a download-shaped command with deterministic exponential backoff.
    ///
    /// Retries only on [`EngineError::GoModFailure`], with delays
    /// `1s, 2s, 4s, ...` and no jitter, up to `max_tries` total attempts.
    /// On final failure the returned error names how many attempts were made.
    fn run_download(
        &self,
        cmd: &[String],
        params: &RunParams,
        max_tries: u32,
    ) -> Result<String, EngineError>
    where
        Self: Sized,
    {
        let attempts = AtomicUsize::new(0);
        let retries = max_tries.saturating_sub(1);

        let op = || {
            attempts.fetch_add(1, Ordering::SeqCst);
            self.run(cmd, params)
        };

        // ExponentialBuilder has no jitter unless `.with_jitter()` is called,
        // which gives the deterministic 1s, 2s, 4s, ... schedule the spec requires.
        let builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(1))
            .with_factor(2.0)
            .with_max_times(retries as usize);

        op.retry(builder)
            .when(|e| matches!(e, EngineError::GoModFailure { .. }))
            .call()
            .map_err(|_| {
                let command = cmd.join(" ");
                let made = attempts.load(Ordering::SeqCst);
                EngineError::GoModFailure {
                    command: format!("{command} (tried {made} times)"),
                    rc: -1,
                }
            })
    }
}

/// Spawns real subprocesses via [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, cmd: &[String], params: &RunParams) -> Result<String, EngineError> {
        let Some((program, args)) = cmd.split_first() else {
            return Err(EngineError::gomod_failure(cmd, -1));
        };

        tracing::debug!(command = %cmd.join(" "), cwd = %params.cwd.display(), "running command");

        let output = Command::new(program)
            .args(args)
            .current_dir(&params.cwd)
            .env_clear()
            .envs(&params.env)
            .output()?;

        if !output.status.success() {
            let rc = output.status.code().unwrap_or(-1);
            tracing::error!(command = %cmd.join(" "), rc, "command failed");
            return Err(EngineError::gomod_failure(cmd, rc));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| EngineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

/// Builds a subprocess command vector from string-like parts.
pub fn cmd(parts: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    parts.into_iter().map(Into::into).collect()
}

/// Convenience for building a [`RunParams`] with a `PATH` carried through
/// from the current process environment, as the spec requires.
pub fn run_params_with_inherited_path(cwd: impl Into<PathBuf>, mut env: HashMap<String, String>) -> RunParams {
    if let Ok(path) = std::env::var("PATH") {
        env.entry("PATH".to_string()).or_insert(path);
    }
    RunParams::new(cwd, env)
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    //! A scripted [`ProcessRunner`] for deterministic unit tests.
    use super::*;
    use std::cell::RefCell;

    /// Response scripted for one invocation of [`ScriptedRunner`].
    pub enum Scripted {
        Ok(String),
        Fail(i32),
    }

    /// Replays a fixed sequence of responses, one per call to `run`,
    /// matched in FIFO order regardless of which command is requested.
    pub struct ScriptedRunner {
        responses: RefCell<std::collections::VecDeque<Scripted>>,
        pub calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub fn new(responses: Vec<Scripted>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, cmd: &[String], _params: &RunParams) -> Result<String, EngineError> {
            self.calls.borrow_mut().push(cmd.to_vec());
            match self.responses.borrow_mut().pop_front() {
                Some(Scripted::Ok(out)) => Ok(out),
                Some(Scripted::Fail(rc)) => Err(EngineError::gomod_failure(cmd, rc)),
                None => Err(EngineError::gomod_failure(cmd, -1)),
            }
        }
    }
}
