//! Artifact classification
//!
//! Every scanned file is either a source map (a JSON object with integer
//! `version` 3 and a string `mappings` field) or a generated-file candidate.
//! Source maps may point at their generated file through the `file` field;
//! generated files may point at their map through a `sourceMappingURL`
//! directive in their trailing comments.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::checksum::Checksum;

/// A build output that may reference its source map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFileEntry {
    pub url: Url,
    pub path: PathBuf,
    pub hash: Checksum,
    /// Resolved `sourceMappingURL`, always a `file:` URL
    pub map_ref: Option<Url>,
}

/// A version 3 source map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapEntry {
    pub url: Url,
    pub path: PathBuf,
    /// Raw map bytes, uploaded unmodified
    pub content: Vec<u8>,
    /// Resolved `file` field
    pub file_ref: Option<Url>,
    /// Identities of the generated files linked to this map
    pub linked: BTreeSet<Url>,
}

/// Outcome of classifying one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    SourceMap(SourceMapEntry),
    Generated(GeneratedFileEntry),
}

impl Artifact {
    pub fn url(&self) -> &Url {
        match self {
            Artifact::SourceMap(map) => &map.url,
            Artifact::Generated(file) => &file.url,
        }
    }
}

/// A classified file plus the verbose notes produced while classifying it
#[derive(Debug, Clone)]
pub struct Classified {
    pub artifact: Artifact,
    pub notes: Vec<String>,
}

/// Read and classify the file at an absolute path
pub fn classify_path(path: &Path) -> io::Result<Classified> {
    let url = Url::from_file_path(path).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not an absolute path", path.display()),
        )
    })?;
    let content = fs::read(path)?;
    Ok(classify(path, url, content))
}

/// Classify already-read content. Never fails: anything that is not a
/// version 3 source map is a generated-file candidate.
pub fn classify(path: &Path, url: Url, content: Vec<u8>) -> Classified {
    let mut notes = Vec::new();

    let artifact = match serde_json::from_slice::<Value>(&content) {
        Ok(json) if is_source_map(&json) => {
            let file_ref = map_file_reference(path, &url, &json, &mut notes);
            Artifact::SourceMap(SourceMapEntry {
                url,
                path: path.to_path_buf(),
                content,
                file_ref,
                linked: BTreeSet::new(),
            })
        }
        _ => {
            let hash = Checksum::from_bytes(&content);
            let text = String::from_utf8_lossy(&content);
            let map_ref = find_source_mapping_url(&text)
                .and_then(|raw| resolve_map_reference(path, &url, raw, &mut notes));
            Artifact::Generated(GeneratedFileEntry {
                url,
                path: path.to_path_buf(),
                hash,
                map_ref,
            })
        }
    };

    Classified { artifact, notes }
}

/// `version` must be the JSON integer 3; `3.0` and `"3"` do not qualify
pub fn is_source_map(json: &Value) -> bool {
    let Some(obj) = json.as_object() else {
        return false;
    };
    let version_3 = obj.get("version").and_then(Value::as_u64) == Some(3);
    let has_mappings = obj.get("mappings").map(Value::is_string).unwrap_or(false);
    version_3 && has_mappings
}

fn map_file_reference(
    path: &Path,
    url: &Url,
    json: &Value,
    notes: &mut Vec<String>,
) -> Option<Url> {
    match json.get("file")? {
        Value::String(file) => match url.join(file) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                notes.push(format!(
                    "{}: invalid \"file\" reference {:?}: {}",
                    path.display(),
                    file,
                    e
                ));
                None
            }
        },
        _ => {
            notes.push(format!(
                "{}: ignoring non-string \"file\" field",
                path.display()
            ));
            None
        }
    }
}

fn resolve_map_reference(
    path: &Path,
    url: &Url,
    raw: &str,
    notes: &mut Vec<String>,
) -> Option<Url> {
    let resolved = match url.join(raw) {
        Ok(resolved) => resolved,
        Err(e) => {
            notes.push(format!(
                "{}: invalid sourceMappingURL {:?}: {}",
                path.display(),
                raw,
                e
            ));
            return None;
        }
    };
    if resolved.scheme() != "file" {
        notes.push(format!(
            "{}: ignoring non-local sourceMappingURL ({}:)",
            path.display(),
            resolved.scheme()
        ));
        return None;
    }
    Some(resolved)
}

/// Trailing run of block comments, line comments and whitespace
fn trailing_comments_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:/\*[^*]*\*+(?:[^/*][^*]*\*+)*/|//[^\r\n]*|\s)*\z")
            .expect("trailing comment pattern is valid")
    })
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r#"//[@#][ \t]*sourceMappingURL=([^\s'"]+)"#,
            r#"|/\*[@#][ \t]*sourceMappingURL=([^\s'"*]+)\s*\*/"#,
        ))
        .expect("directive pattern is valid")
    })
}

/// The trailing comment region of a generated file; may be empty.
///
/// A candidate region that starts inside a string literal on its line is
/// not a comment, so the search resumes past it.
pub fn trailing_comment_region(text: &str) -> &str {
    let re = trailing_comments_re();
    let mut from = 0;
    while let Some(m) = re.find_at(text, from) {
        let start = m.start();
        if start == text.len() || !inside_string_literal(text, start) {
            return &text[start..];
        }
        from = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    ""
}

/// Whether `pos` falls inside an unterminated quote on its line
fn inside_string_literal(text: &str, pos: usize) -> bool {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let mut chars = text[line_start..pos].chars().peekable();
    let mut quote = None;
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                // rest of the line is a comment
                '/' if chars.peek() == Some(&'/') => return false,
                _ => {}
            },
        }
    }
    quote.is_some()
}

/// The last `sourceMappingURL` directive in the trailing comment region
pub fn find_source_mapping_url(text: &str) -> Option<&str> {
    let region = trailing_comment_region(text);
    directive_re()
        .captures_iter(region)
        .last()
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_str(path: &str, content: &str) -> Classified {
        let path = Path::new(path);
        let url = Url::from_file_path(path).unwrap();
        classify(path, url, content.as_bytes().to_vec())
    }

    #[test]
    fn test_source_map_detection() {
        let classified = classify_str(
            "/dist/app.js.map",
            r#"{"version":3,"mappings":"AAAA","sources":[]}"#,
        );
        assert!(matches!(classified.artifact, Artifact::SourceMap(_)));
    }

    #[test]
    fn test_non_map_json_is_generated() {
        for content in [
            r#"{"version":"3","mappings":"AAAA"}"#,
            r#"{"version":3.5,"mappings":"AAAA"}"#,
            r#"{"version":3.0,"mappings":"AAAA"}"#,
            r#"{"version":2,"mappings":"AAAA"}"#,
            r#"{"version":3,"mappings":[]}"#,
            r#"{"version":3}"#,
            r#"[{"version":3,"mappings":""}]"#,
            "not json at all",
        ] {
            let classified = classify_str("/dist/data.json", content);
            assert!(
                matches!(classified.artifact, Artifact::Generated(_)),
                "expected generated candidate for {}",
                content
            );
        }
    }

    #[test]
    fn test_map_file_field_resolves_against_map() {
        let classified = classify_str(
            "/dist/maps/app.js.map",
            r#"{"version":3,"mappings":"","file":"../app.js"}"#,
        );
        let Artifact::SourceMap(map) = classified.artifact else {
            panic!("expected source map");
        };
        assert_eq!(map.file_ref.unwrap().as_str(), "file:///dist/app.js");
        assert!(map.linked.is_empty());
    }

    #[test]
    fn test_map_non_string_file_field_is_dropped() {
        let classified = classify_str(
            "/dist/app.js.map",
            r#"{"version":3,"mappings":"","file":42}"#,
        );
        let Artifact::SourceMap(map) = classified.artifact else {
            panic!("expected source map");
        };
        assert!(map.file_ref.is_none());
        assert_eq!(classified.notes.len(), 1);
    }

    #[test]
    fn test_generated_file_hash_and_directive() {
        let content = "console.log(1);\n//# sourceMappingURL=app.js.map\n";
        let classified = classify_str("/dist/app.js", content);
        let Artifact::Generated(file) = classified.artifact else {
            panic!("expected generated file");
        };
        assert_eq!(file.hash, Checksum::from_bytes(content.as_bytes()));
        assert_eq!(file.map_ref.unwrap().as_str(), "file:///dist/app.js.map");
    }

    #[test]
    fn test_block_directive_form() {
        let text = "body{}\n/*# sourceMappingURL=style.css.map */\n";
        assert_eq!(find_source_mapping_url(text), Some("style.css.map"));

        let text = "x();\n/*@ sourceMappingURL=legacy.map*/";
        assert_eq!(find_source_mapping_url(text), Some("legacy.map"));
    }

    #[test]
    fn test_last_directive_wins() {
        let text = concat!(
            "x();\n",
            "//# sourceMappingURL=first.map\n",
            "/* build 12 */\n",
            "//@ sourceMappingURL=second.map\n\n",
        );
        assert_eq!(find_source_mapping_url(text), Some("second.map"));
    }

    #[test]
    fn test_directive_outside_trailing_region_ignored() {
        let text = "var s = \"//# sourceMappingURL=fake.map\";\nrun(s);\n";
        assert_eq!(find_source_mapping_url(text), None);

        let text = "//# sourceMappingURL=early.map\nrun();\n";
        assert_eq!(find_source_mapping_url(text), None);
    }

    #[test]
    fn test_directive_in_string_on_last_line_ignored() {
        let text = "run();\nvar s = \"//# sourceMappingURL=fake.map\"\n";
        assert_eq!(trailing_comment_region(text), "\n");
        assert_eq!(find_source_mapping_url(text), None);

        let text = "run();\nvar s = ' //# sourceMappingURL=fake.map'";
        assert_eq!(find_source_mapping_url(text), None);

        let text = "run();\nvar s = \"//x\"; //# sourceMappingURL=real.map\n";
        assert_eq!(find_source_mapping_url(text), Some("real.map"));
    }

    #[test]
    fn test_escaped_quote_keeps_string_open() {
        let text = "run();\nvar s = \"a\\\" //# sourceMappingURL=fake.map\"\n";
        assert_eq!(find_source_mapping_url(text), None);
    }

    #[test]
    fn test_trailing_region_spans_comments() {
        let text = "run();\n/* a\n * b */\n// c\n";
        assert_eq!(trailing_comment_region(text), "\n/* a\n * b */\n// c\n");
        assert_eq!(trailing_comment_region("run();"), "");
    }

    #[test]
    fn test_remote_directive_discarded() {
        let classified = classify_str(
            "/dist/app.js",
            "x();\n//# sourceMappingURL=https://cdn.example.com/app.js.map\n",
        );
        let Artifact::Generated(file) = classified.artifact else {
            panic!("expected generated file");
        };
        assert!(file.map_ref.is_none());
        assert!(classified.notes[0].contains("non-local"));
    }

    #[test]
    fn test_inline_data_directive_discarded() {
        let classified = classify_str(
            "/dist/app.js",
            "x();\n//# sourceMappingURL=data:application/json;base64,e30=\n",
        );
        let Artifact::Generated(file) = classified.artifact else {
            panic!("expected generated file");
        };
        assert!(file.map_ref.is_none());
    }
}
