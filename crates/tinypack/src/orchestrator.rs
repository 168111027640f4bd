//! Ties configuration, graph construction and emission together

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    code_generator::{self, BundleDescriptor},
    compiler::{JsCompiler, ModuleCompiler},
    config::Config,
    graph_builder::{BuildSet, GraphBuilder},
    resolver::ModuleResolver,
};

/// Outcome of a successful bundling run
#[derive(Debug)]
pub struct BuildReport {
    pub output_file: PathBuf,
    pub descriptor: BundleDescriptor,
    /// Every module visited, including the ones that failed
    pub build_set: BuildSet,
}

#[derive(Debug)]
pub struct BundleOrchestrator<C: ModuleCompiler = JsCompiler> {
    config: Config,
    working_directory: PathBuf,
    compiler: C,
}

impl BundleOrchestrator {
    pub fn new(config: Config, working_directory: impl Into<PathBuf>) -> Self {
        Self::with_compiler(config, working_directory, JsCompiler)
    }
}

impl<C: ModuleCompiler> BundleOrchestrator<C> {
    pub fn with_compiler(config: Config, working_directory: impl Into<PathBuf>, compiler: C) -> Self {
        Self {
            config,
            working_directory: working_directory.into(),
            compiler,
        }
    }

    /// Build the module graph from the configured entry
    pub fn build(&self) -> Result<BuildSet> {
        let entry = self.config.entry()?;
        let resolver = ModuleResolver::new(self.config.resolver_config(&self.working_directory));
        info!("Bundling entry '{entry}' from {}", self.working_directory.display());

        let build_set = GraphBuilder::new(&resolver, &self.compiler)
            .with_traversal(self.config.traversal)
            .build(entry)
            .context("bundling aborted")?;

        if !build_set.diagnostics().is_empty() {
            warn!(
                "{} module(s) failed to build and were left out of the bundle",
                build_set.diagnostics().len()
            );
        }
        Ok(build_set)
    }

    /// Build and write the bundle to the configured output file
    pub fn bundle(&self) -> Result<BuildReport> {
        let build_set = self.build()?;
        let entry = self.config.entry()?;
        let output_file = self.config.output_file(&self.working_directory);

        let descriptor = code_generator::emit(&build_set, entry, &output_file)
            .with_context(|| format!("failed to emit bundle for entry '{entry}'"))?;

        Ok(BuildReport {
            output_file,
            descriptor,
            build_set,
        })
    }

    /// Build and render the bundle without touching the output directory
    pub fn bundle_to_string(&self) -> Result<(String, BuildSet)> {
        let build_set = self.build()?;
        let descriptor = BundleDescriptor::from_build_set(self.config.entry()?, &build_set);
        Ok((code_generator::render(&descriptor), build_set))
    }
}
