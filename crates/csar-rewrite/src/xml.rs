//! Minimal, position-preserving XML scanning.
//!
//! Descriptor files are never re-serialized: matches carry byte ranges and
//! rewrites splice new attribute values into the original text, so every
//! other byte of the file stays as it was.

use std::collections::HashMap;
use std::ops::Range;

use csar_core::QName;
use regex::{Captures, Regex};

use crate::error::RewriteResult;

/// Element-name prefix, e.g. `wsdl:` or `soap:`.
const PFX: &str = r"(?:[\w.-]+:)?";

/// Compiled patterns shared by one rewrite run.
pub(crate) struct Patterns {
    pub attribute: Regex,
    pub definitions: Regex,
    pub binding: Regex,
    pub service: Regex,
    pub port: Regex,
    pub address_location: Regex,
    pub partner_entry: Regex,
    pub service_ref: Regex,
    pub rest_directive: Regex,
    pub absolute_uri: Regex,
}

impl Patterns {
    pub fn new() -> RewriteResult<Self> {
        Ok(Self {
            attribute: Regex::new(r#"([\w.:-]+)\s*=\s*"([^"]*)""#)?,
            definitions: Regex::new(&format!(r"<{PFX}definitions\b([^>]*)>"))?,
            binding: Regex::new(&format!(r"<{PFX}binding\b([^>]*)>"))?,
            service: Regex::new(&format!(
                r"(?s)<{PFX}service\b([^>]*)>(.*?)</{PFX}service\s*>"
            ))?,
            port: Regex::new(&format!(
                r"(?s)<{PFX}port\b([^>]*?)(?:/>|>(.*?)</{PFX}port\s*>)"
            ))?,
            address_location: Regex::new(&format!(
                r#"<{PFX}address\b[^>]*?\blocation\s*=\s*"([^"]*)""#
            ))?,
            partner_entry: Regex::new(&format!(
                r"(?s)<{PFX}(provide|invoke)\b([^>]*)>(.*?)</{PFX}(?:provide|invoke)\s*>"
            ))?,
            service_ref: Regex::new(&format!(r"<{PFX}service\b([^>]*?)/?>"))?,
            rest_directive: Regex::new(&format!(
                r#"<{PFX}(?:GET|PUT|POST|DELETE)\b[^>]*?\buri\s*=\s*"([^"]*)""#
            ))?,
            absolute_uri: Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*)://([^/?#]+)(.*)$")?,
        })
    }

    /// Attributes of a start tag's attribute text, keyed by qualified name.
    pub fn attributes(&self, text: &str) -> HashMap<String, String> {
        self.attribute
            .captures_iter(text)
            .map(|caps| (caps[1].to_string(), unescape(&caps[2])))
            .collect()
    }
}

/// Absolute byte range of capture group `index`, offset by `base`.
pub(crate) fn group_range(caps: &Captures<'_>, index: usize, base: usize) -> Option<Range<usize>> {
    caps.get(index).map(|m| base + m.start()..base + m.end())
}

/// Local part of a possibly prefixed name (`tns:Foo` → `Foo`).
pub(crate) fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Every `xmlns` / `xmlns:prefix` declaration in the document.
///
/// The default namespace is stored under the empty prefix.
pub(crate) fn namespace_declarations(patterns: &Patterns, content: &str) -> HashMap<String, String> {
    patterns
        .attribute
        .captures_iter(content)
        .filter_map(|caps| {
            let name = &caps[1];
            let prefix = if name == "xmlns" {
                ""
            } else {
                name.strip_prefix("xmlns:")?
            };
            Some((prefix.to_string(), unescape(&caps[2])))
        })
        .collect()
}

/// Resolve a prefixed attribute value into a qualified name.
pub(crate) fn resolve_qname(value: &str, namespaces: &HashMap<String, String>) -> QName {
    let (prefix, local) = value.split_once(':').unwrap_or(("", value));
    let namespace = namespaces.get(prefix).cloned().unwrap_or_default();
    QName::new(namespace, local)
}

/// A pending replacement of a byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// Splice non-overlapping edits into `content`.
pub(crate) fn apply_edits(content: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| edit.range.start);
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&content[cursor..edit.range.start]);
        out.push_str(&edit.replacement);
        cursor = edit.range.end;
    }
    out.push_str(&content[cursor..]);
    out
}

pub(crate) fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}
