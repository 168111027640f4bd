//! Parsing, dependency extraction and transformation of a single module
//!
//! The graph builder only talks to [`ModuleCompiler`]; [`JsCompiler`] is the
//! default implementation backed by the oxc parser.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::trace;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;

use crate::error::{ParseError, TransformError};

/// Maximum number of parser diagnostics carried into a [`ParseError`]
const MAX_REPORTED_DIAGNOSTICS: usize = 3;

/// Collaborator that turns a module file into dependencies and code
pub trait ModuleCompiler {
    /// Parsed representation of one module
    type Ast;

    /// Read and parse the module at `path`
    fn parse(&self, path: &Path) -> Result<Self::Ast, ParseError>;

    /// Identifiers passed to `require`, in source order
    fn dependencies(&self, ast: &Self::Ast) -> Vec<String>;

    /// Executable code for the module body
    fn transform(&self, ast: &Self::Ast) -> Result<String, TransformError>;
}

/// A parsed JavaScript module
///
/// oxc's AST lives in an arena that cannot outlive the parse call, so the
/// facts the bundler needs are collected while it is alive and kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedModule {
    pub path: PathBuf,
    pub source: String,
    /// Byte offset where code starts (after a hashbang line, if any)
    pub body_start: usize,
    pub requires: Vec<String>,
}

impl ScannedModule {
    /// Source text without the hashbang line
    pub fn body(&self) -> &str {
        if self.body_start == 0 {
            return &self.source;
        }
        self.source[self.body_start..].trim_start_matches(['\r', '\n'])
    }
}

/// Default [`ModuleCompiler`] for CommonJS sources
///
/// Code is passed through unchanged apart from dropping a leading hashbang,
/// which is not valid inside the factory function the bundle wraps it in.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsCompiler;

impl JsCompiler {
    /// Parse `source` as if it had been read from `path`
    pub fn scan(&self, path: &Path, source: String) -> Result<ScannedModule, ParseError> {
        let (requires, body_start) = {
            let allocator = Allocator::default();
            let options = ParseOptions {
                // The factory wrapper makes a top-level `return` legal
                allow_return_outside_function: true,
                ..ParseOptions::default()
            };
            let parsed = Parser::new(&allocator, &source, SourceType::cjs())
                .with_options(options)
                .parse();

            if parsed.panicked || !parsed.errors.is_empty() {
                let mut message = parsed
                    .errors
                    .iter()
                    .take(MAX_REPORTED_DIAGNOSTICS)
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                if message.is_empty() {
                    message = "unrecoverable syntax error".to_owned();
                }
                return Err(ParseError::Syntax {
                    path: path.to_path_buf(),
                    message,
                });
            }
            if parsed.module_record.has_module_syntax {
                return Err(ParseError::Syntax {
                    path: path.to_path_buf(),
                    message: "import/export declarations are not supported, use require()"
                        .to_owned(),
                });
            }

            let mut collector = RequireCollector::default();
            collector.visit_program(&parsed.program);
            let body_start = parsed
                .program
                .hashbang
                .as_ref()
                .map_or(0, |hashbang| hashbang.span.end as usize);
            (collector.requires, body_start)
        };

        trace!("{}: requires {:?}", path.display(), requires);
        Ok(ScannedModule {
            path: path.to_path_buf(),
            source,
            body_start,
            requires,
        })
    }
}

impl ModuleCompiler for JsCompiler {
    type Ast = ScannedModule;

    fn parse(&self, path: &Path) -> Result<ScannedModule, ParseError> {
        let source = fs::read_to_string(path).map_err(|error| ParseError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        self.scan(path, source)
    }

    fn dependencies(&self, ast: &ScannedModule) -> Vec<String> {
        ast.requires.clone()
    }

    fn transform(&self, ast: &ScannedModule) -> Result<String, TransformError> {
        Ok(ast.body().to_owned())
    }
}

/// Collects `require("...")` call sites
///
/// Only calls whose callee is the bare identifier `require` and whose first
/// argument is a string literal count; anything computed is invisible to a
/// static scan.
#[derive(Debug, Default)]
struct RequireCollector {
    requires: Vec<String>,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if call.callee.is_specific_id("require")
            && let Some(Argument::StringLiteral(literal)) = call.arguments.first()
        {
            self.requires.push(literal.value.as_str().to_owned());
        }
        walk::walk_call_expression(self, call);
    }
}
