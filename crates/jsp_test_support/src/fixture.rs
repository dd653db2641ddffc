//! Golden translation fixtures.
//!
//! Each fixture is a directory holding `case.toml`, a `web/` tree used as
//! the web-application root, and for cases that translate an expected
//! `dom.txt` snapshot.

use jsp::{JspConfigManager, JspOptions};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const EXPECTED_DOM_FORMAT_V1: &str = "jsp-dom-v1";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CaseManifest {
    entry: String,
    /// Translator options as `name = "value"` properties.
    options: BTreeMap<String, String>,
    config: JspConfigManager,
    /// Substring of the expected error message.
    expect_error: Option<String>,
    dependencies: Option<Vec<String>>,
    encoding: Option<String>,
    is_xml: Option<bool>,
}

pub struct ExpectedDom {
    pub ignore_ids: bool,
    pub lines: Vec<String>,
}

pub enum Expectation {
    Dom(ExpectedDom),
    Error(String),
}

pub struct JspCase {
    pub name: String,
    pub web_root: PathBuf,
    pub entry: String,
    pub options: JspOptions,
    pub config: JspConfigManager,
    pub expectation: Expectation,
    pub dependencies: Option<Vec<String>>,
    pub encoding: Option<String>,
    pub is_xml: Option<bool>,
}

pub fn load_cases(root: &Path) -> Vec<JspCase> {
    let mut entries: Vec<_> = fs::read_dir(root)
        .unwrap_or_else(|err| panic!("failed to read fixture root {root:?}: {err}"))
        .filter_map(Result::ok)
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut cases = Vec::new();
    for entry in entries {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        cases.push(load_case(name, &path));
    }
    cases
}

fn load_case(name: String, dir: &Path) -> JspCase {
    let manifest_path = dir.join("case.toml");
    let content = fs::read_to_string(&manifest_path)
        .unwrap_or_else(|err| panic!("failed to read {manifest_path:?}: {err}"));
    let manifest: CaseManifest = toml::from_str(&content)
        .unwrap_or_else(|err| panic!("invalid case manifest {manifest_path:?}: {err}"));
    assert!(
        manifest.entry.starts_with('/'),
        "entry of '{name}' must be a web-application path starting with '/'"
    );

    let web_root = dir.join("web");
    assert!(web_root.is_dir(), "fixture '{name}' has no web/ directory");

    let dom_path = dir.join("dom.txt");
    let expectation = match manifest.expect_error {
        Some(message) => {
            assert!(
                !dom_path.exists(),
                "fixture '{name}' expects an error but has a dom.txt"
            );
            Expectation::Error(message)
        }
        None => Expectation::Dom(parse_expected_dom(&dom_path)),
    };

    let options = JspOptions::from_properties(
        manifest
            .options
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    );

    JspCase {
        name,
        web_root,
        entry: manifest.entry,
        options,
        config: manifest.config,
        expectation,
        dependencies: manifest.dependencies,
        encoding: manifest.encoding,
        is_xml: manifest.is_xml,
    }
}

/// Read a `dom.txt` snapshot: `# key: value` headers, then snapshot lines
/// starting with `#document`.
pub fn parse_expected_dom(path: &Path) -> ExpectedDom {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read expected DOM file {path:?}: {err}"));
    let mut headers = BTreeMap::<String, String>::new();
    let mut lines = Vec::new();

    for raw_line in content.lines() {
        let line = raw_line.trim_end();
        if line.is_empty() {
            continue;
        }
        if lines.is_empty() && line != "#document" {
            if let Some(stripped) = line.strip_prefix('#') {
                let Some((key, value)) = stripped.split_once(':') else {
                    continue;
                };
                let key = key.trim().to_ascii_lowercase();
                assert!(
                    matches!(key.as_str(), "format" | "ignore_ids"),
                    "unsupported header '{key}' in {path:?}"
                );
                if headers.insert(key.clone(), value.trim().to_string()).is_some() {
                    panic!("duplicate header '{key}' in {path:?}");
                }
                continue;
            }
        }
        lines.push(line.to_string());
    }

    assert_eq!(
        headers.get("format").map(String::as_str),
        Some(EXPECTED_DOM_FORMAT_V1),
        "missing or unsupported format header in {path:?}"
    );
    assert!(
        lines.first().map(String::as_str) == Some("#document"),
        "expected DOM file {path:?} must start with #document"
    );
    let ignore_ids = match headers.get("ignore_ids").map(String::as_str) {
        None | Some("false") => false,
        Some("true") => true,
        Some(other) => panic!("invalid boolean '{other}' for ignore_ids in {path:?}"),
    };
    ExpectedDom { ignore_ids, lines }
}
