//! Error types for tinypack
//!
//! Library code returns these typed errors; the binary wraps them in
//! `anyhow` for reporting.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// No candidate location exists for a dependency identifier
#[derive(Debug, Error)]
#[error("cannot resolve module '{identifier}' (tried {})", display_candidates(.candidates))]
pub struct ResolutionError {
    pub identifier: String,
    /// Every location that was checked, in search order
    pub candidates: Vec<PathBuf>,
}

fn display_candidates(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        return "no locations".to_owned();
    }
    candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The source of a module could not be read or parsed
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {}: {error}", .path.display())]
    Read { path: PathBuf, error: io::Error },

    #[error("syntax error in {}: {message}", .path.display())]
    Syntax { path: PathBuf, message: String },
}

/// The module parsed but could not be turned into executable code
#[derive(Debug, Error)]
#[error("failed to transform {}: {message}", .path.display())]
pub struct TransformError {
    pub path: PathBuf,
    pub message: String,
}

/// Stage of a per-module build at which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Resolve,
    Parse,
    Transform,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => write!(f, "resolve"),
            Self::Parse => write!(f, "parse"),
            Self::Transform => write!(f, "transform"),
        }
    }
}

/// Underlying cause of a failed module build
#[derive(Debug, Error)]
pub enum BuildFailure {
    #[error(transparent)]
    Resolve(#[from] ResolutionError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl BuildFailure {
    pub fn stage(&self) -> BuildStage {
        match self {
            Self::Resolve(_) => BuildStage::Resolve,
            Self::Parse(_) => BuildStage::Parse,
            Self::Transform(_) => BuildStage::Transform,
        }
    }
}

/// A single module failed to build
///
/// For non-entry modules this is a diagnostic, not a fatal error: the graph
/// builder records it and carries on.
#[derive(Debug, Error)]
#[error("error building module '{identifier}' ({} stage): {failure}", .failure.stage())]
pub struct ModuleBuildError {
    pub identifier: String,
    /// Known once resolution succeeded
    pub resolved_path: Option<PathBuf>,
    pub failure: BuildFailure,
}

impl ModuleBuildError {
    pub fn stage(&self) -> BuildStage {
        self.failure.stage()
    }
}

/// Fatal graph construction errors
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("entry module '{}' could not be built", .0.identifier)]
    Entry(#[source] ModuleBuildError),
}

/// Writing the bundle failed
#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("failed to create output directory {}: {error}", .path.display())]
    CreateDirectory { path: PathBuf, error: io::Error },

    #[error("failed to write bundle to {}: {error}", .path.display())]
    Write { path: PathBuf, error: io::Error },
}

/// Configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {error}", .path.display())]
    Read { path: PathBuf, error: io::Error },

    #[error("invalid config file {}: {error}", .path.display())]
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },

    #[error("no entry module given (pass --entry or set `entry` in tinypack.toml)")]
    MissingEntry,
}
