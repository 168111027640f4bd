//! Builds the set of modules reachable from an entry point
//!
//! Each module is resolved, parsed, scanned for `require` calls and
//! transformed through a [`ModuleCompiler`]. A broken dependency does not stop
//! the build: it is recorded as a diagnostic and left out of the bundle. Only
//! a broken entry module is fatal.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use log::{debug, trace, warn};
use rustc_hash::FxHashSet;

use crate::{
    compiler::ModuleCompiler,
    config::Traversal,
    error::{BuildError, BuildFailure, ModuleBuildError},
    resolver::ModuleResolver,
};

/// One built (or failed) module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Identifier as written by the importer, never normalized
    pub identifier: String,
    pub resolved_path: Option<PathBuf>,
    /// Raw `require` arguments in source order, duplicates included
    pub dependencies: Vec<String>,
    /// `None` when the module failed to build
    pub compiled_code: Option<String>,
}

impl ModuleRecord {
    fn failed(error: &ModuleBuildError) -> Self {
        Self {
            identifier: error.identifier.clone(),
            resolved_path: error.resolved_path.clone(),
            dependencies: Vec::new(),
            compiled_code: None,
        }
    }

    pub fn is_built(&self) -> bool {
        self.compiled_code.is_some()
    }
}

/// Modules in discovery order plus the non-fatal failures met on the way
#[derive(Debug, Default)]
pub struct BuildSet {
    records: Vec<ModuleRecord>,
    diagnostics: Vec<ModuleBuildError>,
}

impl BuildSet {
    pub fn records(&self) -> &[ModuleRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter()
    }

    /// Non-entry modules that failed to build
    pub fn diagnostics(&self) -> &[ModuleBuildError] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identifiers in insertion order, repeated if built more than once
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.identifier.as_str())
    }

    pub fn get(&self, identifier: &str) -> Option<&ModuleRecord> {
        self.records
            .iter()
            .find(|record| record.identifier == identifier)
    }

    fn push(&mut self, record: ModuleRecord) {
        self.records.push(record);
    }
}

/// Drives resolution and compilation from an entry module
#[derive(Debug)]
pub struct GraphBuilder<'a, C: ModuleCompiler> {
    resolver: &'a ModuleResolver,
    compiler: &'a C,
    traversal: Traversal,
}

impl<'a, C: ModuleCompiler> GraphBuilder<'a, C> {
    pub fn new(resolver: &'a ModuleResolver, compiler: &'a C) -> Self {
        Self {
            resolver,
            compiler,
            traversal: Traversal::default(),
        }
    }

    #[must_use]
    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    /// Build every module reachable from `entry`
    pub fn build(&self, entry: &str) -> Result<BuildSet, BuildError> {
        debug!("Building graph from entry '{entry}' ({:?} traversal)", self.traversal);

        let entry_record = self.build_module(entry, None).map_err(BuildError::Entry)?;
        let source_directory = self.resolver.source_directory();

        let build_set = match self.traversal {
            Traversal::Closure => self.expand_closure(entry_record, &source_directory),
            Traversal::Shallow => self.expand_shallow(entry_record, &source_directory),
        };

        debug!(
            "Graph complete: {} module(s), {} failure(s)",
            build_set.len(),
            build_set.diagnostics.len()
        );
        Ok(build_set)
    }

    /// Resolve, parse, scan and transform one module
    ///
    /// The entry is resolved without a base directory, everything else from
    /// the source root.
    pub fn build_module(
        &self,
        identifier: &str,
        base_directory: Option<&Path>,
    ) -> Result<ModuleRecord, ModuleBuildError> {
        let fail = |resolved_path: Option<&Path>, failure: BuildFailure| ModuleBuildError {
            identifier: identifier.to_owned(),
            resolved_path: resolved_path.map(Path::to_path_buf),
            failure,
        };

        let resolved_path = self
            .resolver
            .resolve(identifier, base_directory)
            .map_err(|e| fail(None, e.into()))?;
        let ast = self
            .compiler
            .parse(&resolved_path)
            .map_err(|e| fail(Some(resolved_path.as_path()), e.into()))?;
        let dependencies = self.compiler.dependencies(&ast);
        let compiled_code = self
            .compiler
            .transform(&ast)
            .map_err(|e| fail(Some(resolved_path.as_path()), e.into()))?;

        trace!("Built '{identifier}' with dependencies {dependencies:?}");
        Ok(ModuleRecord {
            identifier: identifier.to_owned(),
            resolved_path: Some(resolved_path),
            dependencies,
            compiled_code: Some(compiled_code),
        })
    }

    /// Breadth-first worklist with a visited set; terminates on cycles
    fn expand_closure(&self, entry_record: ModuleRecord, source_directory: &Path) -> BuildSet {
        let mut build_set = BuildSet::default();
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();

        visited.insert(entry_record.identifier.clone());
        enqueue_unvisited(&entry_record.dependencies, &mut visited, &mut queue);
        build_set.push(entry_record);

        while let Some(identifier) = queue.pop_front() {
            let record = self.build_dependency(&identifier, source_directory, &mut build_set);
            enqueue_unvisited(&record.dependencies, &mut visited, &mut queue);
            build_set.push(record);
        }

        build_set
    }

    /// The entry's direct dependencies, each listing built again
    fn expand_shallow(&self, entry_record: ModuleRecord, source_directory: &Path) -> BuildSet {
        let mut build_set = BuildSet::default();
        let dependencies = entry_record.dependencies.clone();
        build_set.push(entry_record);

        for identifier in &dependencies {
            let record = self.build_dependency(identifier, source_directory, &mut build_set);
            build_set.push(record);
        }

        build_set
    }

    /// Build a non-entry module, downgrading failure to a diagnostic
    fn build_dependency(
        &self,
        identifier: &str,
        source_directory: &Path,
        build_set: &mut BuildSet,
    ) -> ModuleRecord {
        match self.build_module(identifier, Some(source_directory)) {
            Ok(record) => record,
            Err(error) => {
                warn!("{error}");
                let record = ModuleRecord::failed(&error);
                build_set.diagnostics.push(error);
                record
            }
        }
    }
}

fn enqueue_unvisited(
    dependencies: &[String],
    visited: &mut FxHashSet<String>,
    queue: &mut VecDeque<String>,
) {
    for dependency in dependencies {
        if visited.insert(dependency.clone()) {
            queue.push_back(dependency.clone());
        }
    }
}
