//! tinypack bundles a tree of CommonJS modules into a single script
//!
//! The pipeline has three stages: [`resolver`] maps identifiers to files,
//! [`graph_builder`] walks `require` dependencies from an entry module, and
//! [`code_generator`] renders the built modules behind a small loader.

pub mod code_generator;
pub mod compiler;
pub mod config;
pub mod error;
pub mod graph_builder;
pub mod orchestrator;
pub mod resolver;
