//! Build configuration
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional `tinypack.toml`, and command line overrides. Relative paths are
//! interpreted against the working directory of the build, not the location
//! of the config file.

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use log::debug;
use serde::Deserialize;

use crate::{
    error::ConfigError,
    resolver::{DEFAULT_EXTENSION, DEFAULT_SOURCE_ROOT, ResolverConfig},
};

/// File looked up in the working directory when no config path is given
pub const CONFIG_FILE_NAME: &str = "tinypack.toml";

/// How far the graph builder follows dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Traversal {
    /// Worklist to a fixed point; every identifier is built once
    #[default]
    Closure,
    /// The entry's direct dependencies only, one build per listing
    Shallow,
}

/// Where the bundle is written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dist"),
            filename: "bundle.js".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Identifier of the entry module
    pub entry: Option<String>,
    pub output: OutputConfig,
    pub source_root: PathBuf,
    pub extensions: Vec<String>,
    pub traversal: Traversal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            entry: None,
            output: OutputConfig::default(),
            source_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
            extensions: vec![DEFAULT_EXTENSION.to_owned()],
            traversal: Traversal::default(),
        }
    }
}

/// Command line values that replace config file values when present
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub entry: Option<String>,
    pub output_path: Option<PathBuf>,
    pub output_filename: Option<String>,
    pub source_root: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub traversal: Option<Traversal>,
}

impl Config {
    /// Parse a config document
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|error| ConfigError::Parse {
            path: origin.to_path_buf(),
            error,
        })
    }

    /// Load a config file that must exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&contents, path)
    }

    /// Load `tinypack.toml` from `working_directory`, or defaults if absent
    pub fn discover(working_directory: &Path) -> Result<Self, ConfigError> {
        let path = working_directory.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            debug!("No {CONFIG_FILE_NAME} in {}, using defaults", working_directory.display());
            Ok(Self::default())
        }
    }

    /// Apply command line overrides on top of this configuration
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(entry) = overrides.entry {
            self.entry = Some(entry);
        }
        if let Some(path) = overrides.output_path {
            self.output.path = path;
        }
        if let Some(filename) = overrides.output_filename {
            self.output.filename = filename;
        }
        if let Some(source_root) = overrides.source_root {
            self.source_root = source_root;
        }
        if !overrides.extensions.is_empty() {
            self.extensions = overrides.extensions;
        }
        if let Some(traversal) = overrides.traversal {
            self.traversal = traversal;
        }
    }

    /// Entry identifier, which has no default
    pub fn entry(&self) -> Result<&str, ConfigError> {
        self.entry.as_deref().ok_or(ConfigError::MissingEntry)
    }

    pub fn resolver_config(&self, working_directory: &Path) -> ResolverConfig {
        ResolverConfig {
            working_directory: working_directory.to_path_buf(),
            source_root: self.source_root.clone(),
            extensions: self.extensions.clone(),
        }
    }

    /// Full path of the bundle file
    pub fn output_file(&self, working_directory: &Path) -> PathBuf {
        working_directory
            .join(&self.output.path)
            .join(&self.output.filename)
    }
}
