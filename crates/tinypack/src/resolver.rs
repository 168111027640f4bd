use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::{debug, trace};

use crate::error::ResolutionError;

/// Default directory, relative to the working directory, that non-entry
/// modules are resolved from
pub const DEFAULT_SOURCE_ROOT: &str = "src";

/// Default extension appended to bare identifiers
pub const DEFAULT_EXTENSION: &str = "js";

/// Explicit resolver inputs
///
/// Everything the resolver looks at is carried here, nothing is read from the
/// process environment, so a resolver can be pointed at any directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Directory identifiers are first interpreted against
    pub working_directory: PathBuf,
    /// Conventional source root, relative to `working_directory` unless absolute
    pub source_root: PathBuf,
    /// Extensions appended to identifiers, tried in order (without leading dot)
    pub extensions: Vec<String>,
}

impl ResolverConfig {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            source_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
            extensions: vec![DEFAULT_EXTENSION.to_owned()],
        }
    }

    /// Absolute (or working-directory based) path of the source root
    pub fn source_directory(&self) -> PathBuf {
        self.working_directory.join(&self.source_root)
    }
}

/// Maps a dependency identifier to exactly one module file
///
/// Candidates are tried in a fixed order and the first regular file wins:
/// 1. `<cwd>/<identifier>`
/// 2. `<cwd>/<identifier>.<ext>`
/// 3. `<cwd>/<source_root>/<identifier>`
/// 4. `<cwd>/<source_root>/<identifier>.<ext>`
/// 5. `<base>/<identifier>`
/// 6. `<base>/<identifier>.<ext>`
///
/// The graph builder resolves the entry without a base directory and every
/// other module with the source root as base. Identifiers are therefore never
/// resolved relative to the module that requires them: `require("./b")`
/// inside `src/lib/a.js` looks for `src/b.js`, not `src/lib/b.js`.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    config: ResolverConfig,
}

impl ModuleResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Base directory used for every non-entry module
    pub fn source_directory(&self) -> PathBuf {
        self.config.source_directory()
    }

    /// All locations checked for `identifier`, in priority order
    ///
    /// Duplicate locations (e.g. when `base_directory` is the source root)
    /// are listed once, at their first position.
    pub fn candidates(&self, identifier: &str, base_directory: Option<&Path>) -> Vec<PathBuf> {
        if identifier.is_empty() {
            return Vec::new();
        }

        let mut unique = IndexSet::new();
        let source_directory = self.config.source_directory();
        let mut roots = vec![self.config.working_directory.as_path(), source_directory.as_path()];
        if let Some(base) = base_directory {
            roots.push(base);
        }

        for root in roots {
            let bare = root.join(identifier);
            let with_extensions: Vec<PathBuf> = self
                .config
                .extensions
                .iter()
                .map(|ext| append_extension(&bare, ext))
                .collect();
            unique.insert(bare);
            unique.extend(with_extensions);
        }

        unique.into_iter().collect()
    }

    /// Resolve `identifier` to a concrete module file
    pub fn resolve(
        &self,
        identifier: &str,
        base_directory: Option<&Path>,
    ) -> Result<PathBuf, ResolutionError> {
        let candidates = self.candidates(identifier, base_directory);

        for candidate in &candidates {
            trace!("Checking {} for '{identifier}'", candidate.display());
            if candidate.is_file() {
                debug!("Resolved '{identifier}' to {}", candidate.display());
                return Ok(candidate.clone());
            }
        }

        Err(ResolutionError {
            identifier: identifier.to_owned(),
            candidates,
        })
    }
}

/// Append `.ext` to the full path, keeping any dots already in the file name
fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".");
    raw.push(extension.trim_start_matches('.'));
    PathBuf::from(raw)
}
