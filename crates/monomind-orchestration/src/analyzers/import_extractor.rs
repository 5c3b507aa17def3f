//! Textual import extraction, one strategy per language
//!
//! Extraction is a heuristic: each strategy matches import statements line by
//! line with regular expressions. Known limitations:
//!
//! - imports assembled at runtime (string concatenation, `importlib`, computed
//!   `require` arguments) are invisible;
//! - statements inside block comments or multi-line strings are picked up;
//! - a JS/TS `import {` whose `from` clause sits on a later line is found only
//!   through that later `from '...'` line;
//! - the standard-library lists are short allow-lists, so uncommon stdlib
//!   packages show up as external edges.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::models::Language;

/// Per-file state carried between lines
#[derive(Debug, Default, Clone)]
pub struct ScanState {
    /// Inside a parenthesised (Go) import block
    pub in_import_block: bool,
}

/// Language-specific import matching
pub trait ImportStrategy: Send + Sync {
    /// Language this strategy handles
    fn language(&self) -> Language;

    /// Scans one line and appends any imported identifiers
    fn scan_line(&self, line: &str, state: &mut ScanState, imports: &mut Vec<String>);

    /// Whether the identifier names a standard-library package
    fn is_standard_library(&self, identifier: &str) -> bool;
}

/// Identifiers that point at a path relative to the importing file
pub fn is_local_import(identifier: &str) -> bool {
    identifier.starts_with('.') || identifier.starts_with('/')
}

/// Dispatches extraction to the strategy registered for a language
#[derive(Clone)]
pub struct ImportExtractor {
    strategies: HashMap<Language, Arc<dyn ImportStrategy>>,
}

impl ImportExtractor {
    /// Creates an extractor with no strategies
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Creates an extractor with the built-in go, javascript, typescript and python strategies
    pub fn with_default_strategies() -> Self {
        let mut extractor = Self::new();
        extractor.register(Arc::new(GoStrategy));
        extractor.register(Arc::new(EcmaScriptStrategy::new(Language::JavaScript)));
        extractor.register(Arc::new(EcmaScriptStrategy::new(Language::TypeScript)));
        extractor.register(Arc::new(PythonStrategy));
        extractor
    }

    /// Registers a strategy, replacing any previous one for the same language
    pub fn register(&mut self, strategy: Arc<dyn ImportStrategy>) {
        self.strategies.insert(strategy.language(), strategy);
    }

    pub fn supports(&self, language: Language) -> bool {
        self.strategies.contains_key(&language)
    }

    /// Extracts imported identifiers from a reader, one line at a time
    ///
    /// Local imports and standard-library packages are dropped. Invalid UTF-8
    /// is decoded lossily.
    pub fn extract<R: BufRead>(&self, mut reader: R, language: Language) -> io::Result<BTreeSet<String>> {
        let mut found = BTreeSet::new();
        let Some(strategy) = self.strategies.get(&language) else {
            return Ok(found);
        };

        let mut state = ScanState::default();
        let mut buf = Vec::new();
        let mut imports = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);

            strategy.scan_line(line, &mut state, &mut imports);
            for identifier in imports.drain(..) {
                if is_local_import(&identifier) || strategy.is_standard_library(&identifier) {
                    continue;
                }
                found.insert(identifier);
            }
        }

        Ok(found)
    }

    /// Extracts imports from an in-memory string
    pub fn extract_str(&self, content: &str, language: Language) -> BTreeSet<String> {
        // Reading from a byte slice cannot fail
        self.extract(content.as_bytes(), language).unwrap_or_default()
    }

    /// Extracts imports from a file on disk
    pub fn extract_file(&self, path: &Path, language: Language) -> io::Result<BTreeSet<String>> {
        let file = File::open(path)?;
        self.extract(BufReader::new(file), language)
    }
}

impl Default for ImportExtractor {
    fn default() -> Self {
        Self::with_default_strategies()
    }
}

impl std::fmt::Debug for ImportExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<_> = self.strategies.keys().collect();
        languages.sort();
        f.debug_struct("ImportExtractor")
            .field("languages", &languages)
            .finish()
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid import regex"))
}

/// Strips a trailing `//` comment, ignoring `//` inside quotes
fn strip_line_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev = '\0';
    for (idx, ch) in line.char_indices() {
        match quote {
            Some(q) if ch == q && prev != '\\' => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' || ch == '`' => quote = Some(ch),
            None if ch == '/' && prev == '/' => return &line[..idx - 1],
            None => {}
        }
        prev = ch;
    }
    line
}

/// Go: single-line imports and parenthesised import blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct GoStrategy;

const GO_STDLIB: &[&str] = &[
    "archive", "bufio", "bytes", "cmp", "compress", "container", "context", "crypto",
    "database", "debug", "embed", "encoding", "errors", "expvar", "flag", "fmt", "go",
    "hash", "html", "image", "index", "io", "iter", "log", "maps", "math", "mime", "net",
    "os", "path", "plugin", "reflect", "regexp", "runtime", "slices", "sort", "strconv",
    "strings", "sync", "syscall", "testing", "text", "time", "unicode", "unique", "unsafe",
    "C",
];

impl GoStrategy {
    fn single_import() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r#"^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#)
    }

    fn block_open() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*import\s*\(")
    }

    fn quoted() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r#""([^"]+)""#)
    }

    /// Collects quoted paths from a block segment, returning true if the block closed
    fn scan_block_segment(segment: &str, imports: &mut Vec<String>) -> bool {
        let segment = strip_line_comment(segment);
        let (body, closed) = match segment.find(')') {
            Some(end) => (&segment[..end], true),
            None => (segment, false),
        };
        for caps in Self::quoted().captures_iter(body) {
            imports.push(caps[1].to_string());
        }
        closed
    }
}

impl ImportStrategy for GoStrategy {
    fn language(&self) -> Language {
        Language::Go
    }

    fn scan_line(&self, line: &str, state: &mut ScanState, imports: &mut Vec<String>) {
        if state.in_import_block {
            if Self::scan_block_segment(line, imports) {
                state.in_import_block = false;
            }
            return;
        }

        if let Some(caps) = Self::single_import().captures(line) {
            imports.push(caps[1].to_string());
        } else if let Some(open) = Self::block_open().find(line) {
            state.in_import_block = !Self::scan_block_segment(&line[open.end()..], imports);
        }
    }

    fn is_standard_library(&self, identifier: &str) -> bool {
        let root = identifier.split('/').next().unwrap_or(identifier);
        GO_STDLIB.contains(&root)
    }
}

/// JavaScript and TypeScript: ES module syntax and CommonJS `require`
#[derive(Debug, Clone, Copy)]
pub struct EcmaScriptStrategy {
    language: Language,
}

const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "crypto",
    "dgram", "dns", "events", "fs", "http", "http2", "https", "module", "net", "os", "path",
    "perf_hooks", "process", "querystring", "readline", "stream", "string_decoder",
    "timers", "tls", "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

impl EcmaScriptStrategy {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    fn patterns() -> &'static [Regex; 4] {
        static RE: OnceLock<[Regex; 4]> = OnceLock::new();
        RE.get_or_init(|| {
            [
                // import x from 'm' / export { x } from 'm' / `} from 'm'`
                Regex::new(r#"\bfrom\s+['"]([^'"]+)['"]"#),
                // import 'm'
                Regex::new(r#"^\s*import\s+['"]([^'"]+)['"]"#),
                // require('m')
                Regex::new(r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#),
                // import('m')
                Regex::new(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#),
            ]
            .map(|re| re.expect("Invalid import regex"))
        })
    }
}

impl ImportStrategy for EcmaScriptStrategy {
    fn language(&self) -> Language {
        self.language
    }

    fn scan_line(&self, line: &str, _state: &mut ScanState, imports: &mut Vec<String>) {
        let trimmed = line.trim_start();
        if trimmed.starts_with("//") || trimmed.starts_with('*') || trimmed.starts_with("/*") {
            return;
        }
        let code = strip_line_comment(line);
        for pattern in Self::patterns() {
            for caps in pattern.captures_iter(code) {
                imports.push(caps[1].to_string());
            }
        }
    }

    fn is_standard_library(&self, identifier: &str) -> bool {
        if identifier.starts_with("node:") {
            return true;
        }
        let root = identifier.split('/').next().unwrap_or(identifier);
        NODE_BUILTINS.contains(&root)
    }
}

/// Python: `import a.b, c as d` and `from a.b import c`
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonStrategy;

const PYTHON_STDLIB: &[&str] = &[
    "__future__", "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect",
    "builtins", "calendar", "collections", "concurrent", "contextlib", "copy", "csv",
    "ctypes", "dataclasses", "datetime", "decimal", "enum", "functools", "gc", "glob",
    "hashlib", "heapq", "hmac", "http", "importlib", "inspect", "io", "itertools", "json",
    "logging", "math", "multiprocessing", "operator", "os", "pathlib", "pickle", "platform",
    "pprint", "queue", "random", "re", "shutil", "signal", "socket", "sqlite3", "string",
    "struct", "subprocess", "sys", "tempfile", "textwrap", "threading", "time", "timeit",
    "traceback", "types", "typing", "unittest", "urllib", "uuid", "warnings", "weakref",
    "xml", "zipfile",
];

impl PythonStrategy {
    fn from_import() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*from\s+(\.*[\w.]*)\s+import\b")
    }

    fn plain_import() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        regex(&RE, r"^\s*import\s+(.+)$")
    }
}

impl ImportStrategy for PythonStrategy {
    fn language(&self) -> Language {
        Language::Python
    }

    fn scan_line(&self, line: &str, _state: &mut ScanState, imports: &mut Vec<String>) {
        let code = line.split('#').next().unwrap_or(line);

        if let Some(caps) = Self::from_import().captures(code) {
            imports.push(caps[1].to_string());
            return;
        }

        if let Some(caps) = Self::plain_import().captures(code) {
            for clause in caps[1].split(',') {
                let name = clause
                    .trim()
                    .trim_matches(|c| c == '(' || c == ')')
                    .split_whitespace()
                    .next()
                    .unwrap_or("");
                if !name.is_empty() {
                    imports.push(name.to_string());
                }
            }
        }
    }

    fn is_standard_library(&self, identifier: &str) -> bool {
        let root = identifier.split('.').next().unwrap_or(identifier);
        PYTHON_STDLIB.contains(&root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(content: &str, language: Language) -> Vec<String> {
        ImportExtractor::with_default_strategies()
            .extract_str(content, language)
            .into_iter()
            .collect()
    }

    #[test]
    fn test_go_single_and_aliased_imports() {
        let src = r#"
package main

import "fmt"
import log "github.com/sirupsen/logrus"
import _ "example.com/mono/libs/db"
"#;
        assert_eq!(
            extract(src, Language::Go),
            vec!["example.com/mono/libs/db", "github.com/sirupsen/logrus"]
        );
    }

    #[test]
    fn test_go_import_block_spans_lines() {
        let src = r#"
import (
    "fmt"
    "net/http"

    "example.com/mono/libs/auth" // auth helpers
    cfg "example.com/mono/libs/config"
)

func main() { fmt.Println("import (\"not/an/import\")") }
"#;
        assert_eq!(
            extract(src, Language::Go),
            vec!["example.com/mono/libs/auth", "example.com/mono/libs/config"]
        );
    }

    #[test]
    fn test_go_single_line_block() {
        let src = r#"import ( "strings"; "example.com/x/y" )"#;
        assert_eq!(extract(src, Language::Go), vec!["example.com/x/y"]);
    }

    #[test]
    fn test_javascript_import_forms() {
        let src = r#"
import React from 'react';
import { api } from "@acme/api-client";
import './styles.css';
import 'polyfill';
export { thing } from 'shared-utils';
const lodash = require('lodash');
const fs = require('fs');
const lazy = () => import('charts');
// import ignored from 'commented-out';
"#;
        assert_eq!(
            extract(src, Language::JavaScript),
            vec!["@acme/api-client", "charts", "lodash", "polyfill", "react", "shared-utils"]
        );
    }

    #[test]
    fn test_typescript_filters_node_builtins() {
        let src = r#"
import { readFile } from 'node:fs/promises';
import path from 'path';
import type { Config } from '../config';
import { Client } from 'pg';
"#;
        assert_eq!(extract(src, Language::TypeScript), vec!["pg"]);
    }

    #[test]
    fn test_python_import_forms() {
        let src = r#"
import os
import requests, numpy as np
import billing.models
from utils import helpers
from . import sibling
from .models import User
from collections import defaultdict  # stdlib
"#;
        assert_eq!(
            extract(src, Language::Python),
            vec!["billing.models", "numpy", "requests", "utils"]
        );
    }

    #[test]
    fn test_unknown_language_yields_nothing() {
        assert!(extract("import foo", Language::Unsupported).is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let mut bytes = b"import requests\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(b"import flask\n");

        let found = ImportExtractor::with_default_strategies()
            .extract(bytes.as_slice(), Language::Python)
            .unwrap();
        assert!(found.contains("requests"));
        assert!(found.contains("flask"));
    }

    #[test]
    fn test_local_import_filter() {
        assert!(is_local_import("./util"));
        assert!(is_local_import("../shared"));
        assert!(is_local_import(".models"));
        assert!(!is_local_import("lodash"));
    }

    #[test]
    fn test_custom_strategy_registration() {
        struct Everything;
        impl ImportStrategy for Everything {
            fn language(&self) -> Language {
                Language::Python
            }
            fn scan_line(&self, line: &str, _: &mut ScanState, imports: &mut Vec<String>) {
                if !line.trim().is_empty() {
                    imports.push(line.trim().to_string());
                }
            }
            fn is_standard_library(&self, _: &str) -> bool {
                false
            }
        }

        let mut extractor = ImportExtractor::with_default_strategies();
        extractor.register(Arc::new(Everything));
        let found = extractor.extract_str("alpha\nbeta\n", Language::Python);
        assert_eq!(found.len(), 2);
    }
}
