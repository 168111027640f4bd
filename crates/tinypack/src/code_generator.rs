//! Bundle rendering and emission
//!
//! A bundle is one self-executing script: a factory table keyed by module
//! identifier, a small `require` loader that runs factories on demand, and a
//! call that loads the entry. Rendering is a pure function of the
//! [`BundleDescriptor`], so the same build set always produces the same bytes.

use std::{
    fmt::Write as _,
    fs,
    io::Write as _,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, info};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{error::EmissionError, graph_builder::BuildSet};

/// Loader prelude, everything up to the entry call
const LOADER_PRELUDE: &str = r#"(function (modules) {
  function require(identifier) {
    var factory = Object.prototype.hasOwnProperty.call(modules, identifier) ? modules[identifier] : undefined;
    if (typeof factory !== "function") {
      throw new Error("Module not found: " + identifier);
    }
    var module = { exports: {} };
    factory(require, module, module.exports);
    return module.exports;
  }

"#;

/// What goes into a bundle: the entry and one factory body per identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleDescriptor {
    entry_identifier: String,
    /// Keyed by identifier in first-seen order
    factories: IndexMap<String, String>,
}

impl BundleDescriptor {
    pub fn new(entry_identifier: impl Into<String>) -> Self {
        Self {
            entry_identifier: entry_identifier.into(),
            factories: IndexMap::new(),
        }
    }

    /// Collect factories from every built module
    ///
    /// Failed modules and modules that compiled to nothing are left out. When
    /// an identifier was built more than once the last body wins, but the key
    /// keeps the position of its first occurrence.
    pub fn from_build_set(entry_identifier: impl Into<String>, build_set: &BuildSet) -> Self {
        let mut descriptor = Self::new(entry_identifier);
        for record in build_set.iter() {
            match record.compiled_code.as_deref() {
                Some(code) if !code.is_empty() => {
                    descriptor.insert(record.identifier.clone(), code.to_owned());
                }
                Some(_) => debug!("Skipping '{}': empty module body", record.identifier),
                None => debug!("Skipping '{}': module failed to build", record.identifier),
            }
        }
        descriptor
    }

    /// Add or replace the factory body for `identifier`
    pub fn insert(&mut self, identifier: String, code: String) -> Option<String> {
        self.factories.insert(identifier, code)
    }

    pub fn entry_identifier(&self) -> &str {
        &self.entry_identifier
    }

    pub fn factories(&self) -> &IndexMap<String, String> {
        &self.factories
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

/// Render `descriptor` as bundle text
///
/// Identifiers are written as JSON string literals, which are also valid
/// JavaScript string literals, so quotes and backslashes survive intact.
pub fn render(descriptor: &BundleDescriptor) -> String {
    let body_len: usize = descriptor.factories.values().map(String::len).sum();
    let mut output = String::with_capacity(LOADER_PRELUDE.len() + body_len + 256);

    output.push_str(LOADER_PRELUDE);
    // Writing to a String cannot fail
    let _ = writeln!(
        output,
        "  require({});",
        js_string(descriptor.entry_identifier())
    );
    output.push_str("})({\n");

    for (identifier, code) in &descriptor.factories {
        let _ = writeln!(
            output,
            "  {}: function (require, module, exports) {{",
            js_string(identifier)
        );
        output.push_str(code);
        if !code.ends_with('\n') {
            output.push('\n');
        }
        output.push_str("  },\n");
    }

    output.push_str("});\n");
    output
}

/// Render the bundle for `build_set` and write it to `output_file`
///
/// Missing parent directories are created. The file is written to a temporary
/// sibling and renamed into place, so readers never see a partial bundle.
pub fn emit(
    build_set: &BuildSet,
    entry_identifier: &str,
    output_file: &Path,
) -> Result<BundleDescriptor, EmissionError> {
    let descriptor = BundleDescriptor::from_build_set(entry_identifier, build_set);
    let bundle = render(&descriptor);

    write_atomically(output_file, bundle.as_bytes())?;

    info!(
        "Wrote bundle with {} module(s) to {}",
        descriptor.factories.len(),
        output_file.display()
    );
    Ok(descriptor)
}

fn write_atomically(output_file: &Path, contents: &[u8]) -> Result<(), EmissionError> {
    let directory = match output_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(|error| EmissionError::CreateDirectory {
        path: directory.clone(),
        error,
    })?;

    let write_error = |error| EmissionError::Write {
        path: output_file.to_path_buf(),
        error,
    };

    let mut temp = NamedTempFile::new_in(&directory).map_err(write_error)?;
    temp.write_all(contents).map_err(write_error)?;
    // Temporary files are created owner-only; a bundle should be readable
    // like any other build artifact
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(write_error)?;
    }
    temp.persist(output_file)
        .map_err(|persist_error| write_error(persist_error.error))?;
    Ok(())
}

fn js_string(value: &str) -> String {
    Value::from(value).to_string()
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn descriptor(entry: &str, factories: &[(&str, &str)]) -> BundleDescriptor {
        let mut descriptor = BundleDescriptor::new(entry);
        for (identifier, code) in factories {
            descriptor.insert((*identifier).to_owned(), (*code).to_owned());
        }
        descriptor
    }

    #[test]
    fn test_render_bundle_layout() {
        let bundle = render(&descriptor(
            "main",
            &[
                ("main", "const utils = require(\"utils\");\nutils.greet();\n"),
                ("utils", "exports.greet = function () {};"),
            ],
        ));

        assert_snapshot!(bundle, @r#"
        (function (modules) {
          function require(identifier) {
            var factory = Object.prototype.hasOwnProperty.call(modules, identifier) ? modules[identifier] : undefined;
            if (typeof factory !== "function") {
              throw new Error("Module not found: " + identifier);
            }
            var module = { exports: {} };
            factory(require, module, module.exports);
            return module.exports;
          }

          require("main");
        })({
          "main": function (require, module, exports) {
        const utils = require("utils");
        utils.greet();
          },
          "utils": function (require, module, exports) {
        exports.greet = function () {};
          },
        });
        "#);
    }

    #[test]
    fn test_render_without_factories() {
        let bundle = render(&BundleDescriptor::new("main"));
        assert!(bundle.ends_with("  require(\"main\");\n})({\n});\n"));
    }

    #[test]
    fn test_identifiers_are_escaped() {
        let bundle = render(&descriptor("we\"ird", &[("back\\slash", "x();")]));
        assert!(bundle.contains("require(\"we\\\"ird\");"));
        assert!(bundle.contains("\"back\\\\slash\": function (require, module, exports) {"));
    }

    #[test]
    fn test_duplicate_identifier_keeps_first_position() {
        let mut descriptor = descriptor("main", &[("a", "first();"), ("b", "b();")]);
        assert_eq!(
            descriptor.insert("a".to_owned(), "second();".to_owned()),
            Some("first();".to_owned())
        );

        assert_eq!(descriptor.identifiers().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(descriptor.factories()["a"], "second();");
        let bundle = render(&descriptor);
        assert!(!bundle.contains("first();"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let descriptor = descriptor("main", &[("main", "require('x');"), ("x", "1;")]);
        assert_eq!(render(&descriptor), render(&descriptor.clone()));
    }

    fn write_project(root: &Path, files: &[(&str, &str)]) {
        for (relative, contents) in files {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().expect("file has a parent"))
                .expect("failed to create directory");
            fs::write(path, contents).expect("failed to write module");
        }
    }

    fn build_set_for(root: &Path, entry: &str) -> BuildSet {
        use crate::{
            compiler::JsCompiler,
            graph_builder::GraphBuilder,
            resolver::{ModuleResolver, ResolverConfig},
        };

        let resolver = ModuleResolver::new(ResolverConfig::new(root));
        GraphBuilder::new(&resolver, &JsCompiler)
            .build(entry)
            .expect("entry should build")
    }

    #[test]
    fn test_failed_and_empty_modules_are_skipped() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        write_project(
            temp_dir.path(),
            &[
                ("src/main.js", "require('empty'); require('missing');"),
                ("src/empty.js", ""),
            ],
        );
        let build_set = build_set_for(temp_dir.path(), "main");
        assert_eq!(build_set.len(), 3);

        let descriptor = BundleDescriptor::from_build_set("main", &build_set);
        assert_eq!(descriptor.identifiers().collect::<Vec<_>>(), vec!["main"]);
        assert_eq!(descriptor.entry_identifier(), "main");
    }

    #[test]
    fn test_emit_creates_output_directory() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        write_project(
            temp_dir.path(),
            &[
                ("src/main.js", "require('utils');"),
                ("src/utils.js", "module.exports = 1;"),
            ],
        );
        let build_set = build_set_for(temp_dir.path(), "main");
        let output_file = temp_dir.path().join("dist/nested/bundle.js");

        let descriptor = emit(&build_set, "main", &output_file).expect("emit should succeed");

        let written = fs::read_to_string(&output_file).expect("bundle written");
        assert_eq!(written, render(&descriptor));
        assert!(written.contains("\"utils\": function (require, module, exports) {"));
        // No temporary files are left behind
        let entries = fs::read_dir(temp_dir.path().join("dist/nested"))
            .expect("output directory exists")
            .count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_emit_overwrites_previous_bundle() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        write_project(temp_dir.path(), &[("src/main.js", "run();")]);
        let build_set = build_set_for(temp_dir.path(), "main");
        let output_file = temp_dir.path().join("bundle.js");
        fs::write(&output_file, "stale").expect("failed to write stale bundle");

        emit(&build_set, "main", &output_file).expect("emit should succeed");
        let written = fs::read_to_string(&output_file).expect("bundle written");
        assert!(written.contains("run();"));
        assert!(!written.contains("stale"));
    }

    #[test]
    fn test_emit_fails_when_parent_is_a_file() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        write_project(temp_dir.path(), &[("src/main.js", "run();")]);
        let blocker = temp_dir.path().join("dist");
        fs::write(&blocker, "not a directory").expect("failed to write blocker");
        let build_set = build_set_for(temp_dir.path(), "main");

        let err = emit(&build_set, "main", &blocker.join("bundle.js"))
            .expect_err("emit should fail");
        assert!(matches!(err, EmissionError::CreateDirectory { .. }));
    }
}
