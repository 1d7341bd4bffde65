//! Documentation extraction for a single source directory.
//!
//! [`DocExtractor`] is the seam between package discovery and documentation parsing. The crate ships
//! [`GoDocExtractor`], a line-oriented reader of gofmt-formatted Go sources that recovers the package
//! clause, imports, exported top-level declarations, examples and notes without a full parser.

use super::{Declaration, Note, Package};
use crate::Result;
use core::fmt::Debug;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::LazyLock;

static PACKAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^package\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?://\s*import\s+"([^"]+)")?"#).expect("invalid regex"));
static QUOTED_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("invalid regex"));
static NOTE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Z][A-Z]+)\(([^)]+)\):?\s*(.*)$").expect("invalid regex"));
static FUNC_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^func\s+([A-Za-z_][A-Za-z0-9_]*)\s*[\[(]").expect("invalid regex"));
static EXAMPLE_PARAMS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^func\s+Example[A-Za-z0-9_]*\s*\(\s*\)").expect("invalid regex"));

/// One source file handed to an extractor
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub data: Vec<u8>,
    pub browse_url: String,
}

/// A directory of source files that may form a package
#[derive(Debug, Clone)]
pub struct SourceDirectory {
    pub path: PathBuf,
    pub import_path: String,
    pub browse_url: String,
    pub files: Vec<SourceFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Found(Box<Package>),

    /// The directory is not a package at this import path, for example because its canonical import
    /// path lives on another host
    NotFound(String),
}

/// Turns a source directory into package metadata
pub trait DocExtractor: Debug + Send + Sync {
    fn extract(&self, dir: &SourceDirectory) -> Result<ExtractOutcome>;
}

/// Default extractor for Go sources
#[derive(Debug, Clone, Copy, Default)]
pub struct GoDocExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Const,
    Var,
    Func,
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Import,
    Decl(DeclKind),
}

#[derive(Debug, Default)]
struct ScannedFile {
    package: Option<String>,
    import_comment: Option<String>,
    package_doc: String,
    imports: Vec<String>,
    decls: Vec<(DeclKind, Declaration)>,
    examples: Vec<Declaration>,
    notes: Vec<Note>,
}

impl DocExtractor for GoDocExtractor {
    fn extract(&self, dir: &SourceDirectory) -> Result<ExtractOutcome> {
        let mut files: Vec<&SourceFile> = dir.files.iter().filter(|f| is_go_source(&f.name)).collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let scanned: Vec<(&SourceFile, ScannedFile)> = files
            .into_iter()
            .map(|f| (f, scan_file(&f.name, &String::from_utf8_lossy(&f.data))))
            .collect();

        // Package names declared by non-test files, with the files declaring them
        let mut names: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (file, scan) in &scanned {
            if let Some(package) = &scan.package
                && !is_test_file(&file.name)
            {
                names.entry(package.as_str()).or_default().push(file.name.as_str());
            }
        }

        let mut errors = Vec::new();
        if names.len() > 1 {
            let found: Vec<String> = names.iter().map(|(pkg, files)| format!("{pkg} ({})", files.join(", "))).collect();
            errors.push(format!("multiple packages in directory: {}", found.join("; ")));
        }
        drop(names);

        let Some(name) = scanned
            .iter()
            .filter(|(file, _)| !is_test_file(&file.name))
            .find_map(|(_, scan)| scan.package.clone())
        else {
            return Ok(ExtractOutcome::NotFound(format!("no buildable Go source files in '{}'", dir.path.display())));
        };

        if let Some(canonical) = scanned
            .iter()
            .filter(|(file, _)| !is_test_file(&file.name))
            .find_map(|(_, scan)| scan.import_comment.as_deref())
            && canonical != dir.import_path
        {
            return Ok(ExtractOutcome::NotFound(format!(
                "'{}' declares canonical import path '{canonical}'",
                dir.import_path
            )));
        }

        let mut package = Package {
            import_path: dir.import_path.clone(),
            browse_url: dir.browse_url.clone(),
            is_command: name == "main",
            errors,
            ..Package::default()
        };

        let x_test_name = format!("{name}_test");
        let mut imports = BTreeSet::new();
        let mut test_imports = BTreeSet::new();
        let mut x_test_imports = BTreeSet::new();

        for (file, scan) in scanned {
            if is_test_file(&file.name) {
                if scan.package.as_deref() == Some(x_test_name.as_str()) {
                    package.x_test_files.push(file.name.clone());
                    x_test_imports.extend(scan.imports);
                } else {
                    package.test_files.push(file.name.clone());
                    test_imports.extend(scan.imports);
                }

                package.examples.extend(scan.examples);
                package.notes.extend(scan.notes);
                continue;
            }

            if scan.package.as_deref() != Some(name.as_str()) {
                continue;
            }

            package.files.push(file.name.clone());
            imports.extend(scan.imports);
            package.notes.extend(scan.notes);

            if package.doc.is_empty() && !scan.package_doc.is_empty() {
                package.doc = scan.package_doc;
            }

            for (kind, decl) in scan.decls {
                match kind {
                    DeclKind::Const => package.consts.push(decl),
                    DeclKind::Var => package.vars.push(decl),
                    DeclKind::Func => package.funcs.push(decl),
                    DeclKind::Type => package.types.push(decl),
                }
            }
        }

        package.synopsis = synopsis(&package.doc);
        package.name = name;
        package.imports = imports.into_iter().collect();
        package.test_imports = test_imports.into_iter().collect();
        package.x_test_imports = x_test_imports.into_iter().collect();

        for decls in [
            &mut package.consts,
            &mut package.vars,
            &mut package.funcs,
            &mut package.types,
            &mut package.examples,
        ] {
            decls.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Ok(ExtractOutcome::Found(Box::new(package)))
    }
}

/// Whether a file name is a Go source file that takes part in a build
#[must_use]
pub fn is_go_source(name: &str) -> bool {
    name.ends_with(".go") && !name.starts_with('_') && !name.starts_with('.')
}

fn is_test_file(name: &str) -> bool {
    name.ends_with("_test.go")
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// First sentence of a package comment, on a single line
fn synopsis(doc: &str) -> String {
    let paragraph = doc.split("\n\n").next().unwrap_or_default();
    let text = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");

    match text.find(". ") {
        Some(end) => text.get(..=end).unwrap_or_default().to_string(),
        None => text,
    }
}

/// Identifiers at the start of a declaration line, as in `A, B = 1, 2` or `Name struct {`
fn leading_identifiers(line: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = line.trim_start();

    loop {
        let len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map_or(rest.len(), |(i, _)| i);

        let Some((ident, tail)) = rest.split_at_checked(len) else {
            break;
        };

        if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
            break;
        }

        names.push(ident);

        let tail = tail.trim_start();
        match tail.strip_prefix(',') {
            Some(next) => rest = next.trim_start(),
            None => break,
        }
    }

    names
}

fn comment_text(line: &str) -> Option<&str> {
    let text = line.trim_start().strip_prefix("//")?;
    Some(text.strip_prefix(' ').unwrap_or(text))
}

#[expect(clippy::too_many_lines, reason = "single pass over a file keeps the scanner state in one place")]
fn scan_file(file_name: &str, text: &str) -> ScannedFile {
    let mut scan = ScannedFile::default();
    let mut pending_doc: Vec<String> = Vec::new();
    let mut in_block_comment = false;
    let mut group: Option<(Group, String)> = None;
    let is_test = is_test_file(file_name);

    let declaration = |name: &str, doc: String| Declaration {
        name: name.to_string(),
        doc,
        file: file_name.to_string(),
    };

    for raw in text.lines() {
        let line = raw.trim_end();

        if in_block_comment {
            if let Some((inside, _)) = line.split_once("*/") {
                pending_doc.push(inside.trim().to_string());
                in_block_comment = false;
            } else {
                pending_doc.push(line.trim().to_string());
            }
            continue;
        }

        if line.trim().is_empty() {
            pending_doc.clear();
            continue;
        }

        if let Some(comment) = comment_text(line) {
            if let Some(captures) = NOTE_REGEX.captures(comment.trim()) {
                scan.notes.push(Note {
                    kind: captures[1].to_string(),
                    uid: captures[2].to_string(),
                    body: captures[3].trim().to_string(),
                });
            }

            if !comment.starts_with("go:") && !comment.starts_with("+build") {
                pending_doc.push(comment.to_string());
            }
            continue;
        }

        if let Some(block) = line.trim_start().strip_prefix("/*") {
            if let Some((inside, _)) = block.split_once("*/") {
                pending_doc.push(inside.trim().to_string());
            } else {
                pending_doc.push(block.trim().to_string());
                in_block_comment = true;
            }
            continue;
        }

        let doc = pending_doc.join("\n").trim().to_string();
        pending_doc.clear();

        if let Some((kind, group_doc)) = &group {
            if line.starts_with(')') {
                group = None;
                continue;
            }

            // Entries sit at exactly one level of indentation
            let Some(entry) = line.strip_prefix('\t').filter(|s| !s.starts_with(char::is_whitespace)) else {
                continue;
            };

            match kind {
                Group::Import => {
                    if let Some(captures) = QUOTED_REGEX.captures(entry) {
                        scan.imports.push(captures[1].to_string());
                    }
                }
                Group::Decl(kind) => {
                    let entry_doc = if doc.is_empty() { group_doc.clone() } else { doc };
                    for name in leading_identifiers(entry).into_iter().filter(|n| is_exported(n)) {
                        scan.decls.push((*kind, declaration(name, entry_doc.clone())));
                    }
                }
            }
            continue;
        }

        // Top-level declarations are never indented in gofmt output
        if line.starts_with(char::is_whitespace) {
            continue;
        }

        if let Some(captures) = PACKAGE_REGEX.captures(line) {
            scan.package = Some(captures[1].to_string());
            scan.import_comment = captures.get(2).map(|m| m.as_str().to_string());
            scan.package_doc = doc;
            continue;
        }

        let Some((keyword, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let rest = rest.trim_start();

        match keyword {
            "import" => {
                if rest.starts_with('(') {
                    group = Some((Group::Import, String::new()));
                } else if let Some(captures) = QUOTED_REGEX.captures(rest) {
                    scan.imports.push(captures[1].to_string());
                }
            }
            "const" | "var" | "type" => {
                let kind = match keyword {
                    "const" => DeclKind::Const,
                    "var" => DeclKind::Var,
                    _ => DeclKind::Type,
                };

                if rest.starts_with('(') {
                    // `const ()` closes on the same line
                    if !rest.trim_end().ends_with(')') {
                        group = Some((Group::Decl(kind), doc));
                    }
                } else {
                    for name in leading_identifiers(rest).into_iter().filter(|n| is_exported(n)) {
                        scan.decls.push((kind, declaration(name, doc.clone())));
                    }
                }
            }
            "func" => {
                // Methods start with a receiver and are documented with their type
                let Some(captures) = FUNC_REGEX.captures(line) else {
                    continue;
                };
                let name = &captures[1];

                if is_test {
                    if let Some(suffix) = name.strip_prefix("Example")
                        && (suffix.is_empty() || suffix.starts_with(|c: char| c.is_uppercase() || c == '_'))
                        && EXAMPLE_PARAMS_REGEX.is_match(line)
                    {
                        scan.examples.push(declaration(suffix.trim_start_matches('_'), doc));
                    }
                } else if is_exported(name) {
                    scan.decls.push((DeclKind::Func, declaration(name, doc)));
                }
            }
            _ => {}
        }
    }

    scan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(import_path: &str, files: &[(&str, &str)]) -> SourceDirectory {
        SourceDirectory {
            path: PathBuf::from("/tmp/pkg"),
            import_path: import_path.to_string(),
            browse_url: "https://github.com/acme/widgets/tree/main".to_string(),
            files: files
                .iter()
                .map(|(name, data)| SourceFile {
                    name: (*name).to_string(),
                    data: data.as_bytes().to_vec(),
                    browse_url: format!("https://github.com/acme/widgets/blob/main/{name}"),
                })
                .collect(),
        }
    }

    fn found(outcome: ExtractOutcome) -> Package {
        match outcome {
            ExtractOutcome::Found(package) => *package,
            ExtractOutcome::NotFound(reason) => panic!("expected a package, got not found: {reason}"),
        }
    }

    const WIDGETS: &str = r#"// Copyright 2024 Acme.

// Package widgets builds widgets. It also sells them.
//
// More detail here.
package widgets

import (
	"fmt"
	str "strings"
)

import "os"

// MaxSize is the largest widget.
const MaxSize = 10

const (
	// Small widgets.
	Small = iota
	Large
	hidden
)

// Default is the default widget.
var Default, Other = New(), New()

// Widget is a thing.
type Widget struct {
	Name string
}

// New makes a widget.
func New() *Widget {
	return &Widget{}
}

// Name is a method and is not listed as a function.
func (w *Widget) Name() string {
	return fmt.Sprint(str.ToUpper(w.Name), os.Args)
}

func helper() {}

// BUG(alice): widgets are square.
"#;

    #[test]
    fn test_extracts_package() {
        let outcome = GoDocExtractor
            .extract(&dir("github.com/acme/widgets", &[("widgets.go", WIDGETS)]))
            .unwrap();
        let package = found(outcome);

        assert_eq!(package.name, "widgets");
        assert_eq!(package.import_path, "github.com/acme/widgets");
        assert_eq!(package.synopsis, "Package widgets builds widgets.");
        assert!(package.doc.starts_with("Package widgets builds widgets. It also sells them."));
        assert!(!package.doc.contains("Copyright"));
        assert!(!package.is_command);
        assert_eq!(package.files, vec!["widgets.go"]);
        assert_eq!(package.imports, vec!["fmt", "os", "strings"]);

        let names = |decls: &[Declaration]| decls.iter().map(|d| d.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&package.consts), vec!["Large", "MaxSize", "Small"]);
        assert_eq!(names(&package.vars), vec!["Default", "Other"]);
        assert_eq!(names(&package.types), vec!["Widget"]);
        assert_eq!(names(&package.funcs), vec!["New"]);
        assert_eq!(package.funcs[0].doc, "New makes a widget.");
        assert_eq!(package.consts.iter().find(|d| d.name == "Small").unwrap().doc, "Small widgets.");

        assert_eq!(package.notes.len(), 1);
        assert_eq!(package.notes[0].kind, "BUG");
        assert_eq!(package.notes[0].uid, "alice");
        assert_eq!(package.notes[0].body, "widgets are square.");
        assert!(package.errors.is_empty());
    }

    #[test]
    fn test_classifies_test_files() {
        let files = [
            ("widgets.go", "package widgets\n"),
            ("widgets_test.go", "package widgets\n\nimport \"testing\"\n"),
            (
                "example_test.go",
                "package widgets_test\n\nimport \"github.com/acme/widgets\"\n\n// Shows use.\nfunc ExampleNew() {\n}\n\nfunc Example() {}\n\nfunc Examplefoo() {}\n",
            ),
        ];
        let package = found(GoDocExtractor.extract(&dir("github.com/acme/widgets", &files)).unwrap());

        assert_eq!(package.files, vec!["widgets.go"]);
        assert_eq!(package.test_files, vec!["widgets_test.go"]);
        assert_eq!(package.x_test_files, vec!["example_test.go"]);
        assert_eq!(package.test_imports, vec!["testing"]);
        assert_eq!(package.x_test_imports, vec!["github.com/acme/widgets"]);

        let examples: Vec<_> = package.examples.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(examples, vec!["", "New"]);
        assert_eq!(package.examples[1].doc, "Shows use.");
    }

    #[test]
    fn test_command_package() {
        let package = found(GoDocExtractor.extract(&dir("github.com/acme/tool", &[("main.go", "package main\n\nfunc main() {}\n")])).unwrap());
        assert!(package.is_command);
        assert!(package.funcs.is_empty());
    }

    #[test]
    fn test_mismatched_import_comment_is_not_found() {
        let files = [("yaml.go", "package yaml // import \"gopkg.in/yaml.v2\"\n")];
        let outcome = GoDocExtractor.extract(&dir("github.com/go-yaml/yaml", &files)).unwrap();
        assert!(matches!(outcome, ExtractOutcome::NotFound(_)));

        let package = found(GoDocExtractor.extract(&dir("gopkg.in/yaml.v2", &files)).unwrap());
        assert_eq!(package.name, "yaml");
    }

    #[test]
    fn test_multiple_packages_reported() {
        let files = [("a.go", "package alpha\n"), ("b.go", "package beta\n")];
        let package = found(GoDocExtractor.extract(&dir("github.com/acme/mixed", &files)).unwrap());
        assert_eq!(package.name, "alpha");
        assert_eq!(package.files, vec!["a.go"]);
        assert_eq!(package.errors.len(), 1);
        assert!(package.errors[0].contains("alpha (a.go)"));
        assert!(package.errors[0].contains("beta (b.go)"));
    }

    #[test]
    fn test_test_only_directory_is_not_found() {
        let files = [("x_test.go", "package x\n")];
        let outcome = GoDocExtractor.extract(&dir("github.com/acme/x", &files)).unwrap();
        assert!(matches!(outcome, ExtractOutcome::NotFound(_)));
    }

    #[test]
    fn test_ignored_file_names() {
        assert!(is_go_source("widgets.go"));
        assert!(is_go_source("widgets_test.go"));
        assert!(!is_go_source("_widgets.go"));
        assert!(!is_go_source(".widgets.go"));
        assert!(!is_go_source("widgets.go.orig"));

        let files = [("_ignored.go", "package ignored\n"), ("real.go", "package real\n")];
        let package = found(GoDocExtractor.extract(&dir("github.com/acme/real", &files)).unwrap());
        assert_eq!(package.name, "real");
        assert_eq!(package.files, vec!["real.go"]);
    }

    #[test]
    fn test_non_utf8_read_lossily() {
        let mut data = b"// Package latin says \xe9t\xe9.\npackage latin\n".to_vec();
        data.push(b'\n');
        let directory = SourceDirectory {
            path: PathBuf::from("/tmp/latin"),
            import_path: "github.com/acme/latin".into(),
            browse_url: String::new(),
            files: vec![SourceFile {
                name: "latin.go".into(),
                data,
                browse_url: String::new(),
            }],
        };

        let package = found(GoDocExtractor.extract(&directory).unwrap());
        assert_eq!(package.name, "latin");
        assert!(package.doc.starts_with("Package latin says"));
    }

    #[test]
    fn test_block_comment_package_doc() {
        let files = [("doc.go", "/*\nPackage blocky does things.\n*/\npackage blocky\n")];
        let package = found(GoDocExtractor.extract(&dir("github.com/acme/blocky", &files)).unwrap());
        assert_eq!(package.synopsis, "Package blocky does things.");
    }

    #[test]
    fn test_build_constraints_not_in_doc() {
        let files = [("a.go", "//go:build linux\n// Package a is here.\npackage a\n")];
        let package = found(GoDocExtractor.extract(&dir("github.com/acme/a", &files)).unwrap());
        assert_eq!(package.doc, "Package a is here.");
    }

    #[test]
    fn test_leading_identifiers() {
        assert_eq!(leading_identifiers("A, B = 1, 2"), vec!["A", "B"]);
        assert_eq!(leading_identifiers("Name struct {"), vec!["Name"]);
        assert_eq!(leading_identifiers("x int"), vec!["x"]);
        assert!(leading_identifiers("} ").is_empty());
        assert!(leading_identifiers("1 + 2").is_empty());
    }

    #[test]
    fn test_synopsis() {
        assert_eq!(synopsis("Package x does y. Then z."), "Package x does y.");
        assert_eq!(synopsis("Package x does y"), "Package x does y");
        assert_eq!(synopsis("Package x\ndoes y.\n\nSecond paragraph."), "Package x does y.");
        assert_eq!(synopsis(""), "");
    }
}
