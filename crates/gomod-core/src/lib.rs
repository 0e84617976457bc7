//! Process execution, scoped caching, and error primitives shared by the
//! gomod resolution engine.
//!
//! This crate has no notion of Go modules itself — it provides the generic
//! infrastructure ([`process`], [`scoped_cache`], [`cache_merge`], [`error`])
//! that [`gomod_engine`](https://docs.rs/gomod-engine) builds the actual
//! resolution logic on top of.

pub mod cache_merge;
pub mod error;
pub mod process;
pub mod scoped_cache;

pub use error::{EngineError, Result};
pub use process::{ProcessRunner, RunParams, SystemProcessRunner, cmd, run_params_with_inherited_path};
pub use scoped_cache::ScopedGoCache;

#[cfg(any(test, feature = "test-util"))]
pub use process::fake;
