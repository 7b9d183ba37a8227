//! REST-light invocation directives embedded in process definitions.
//!
//! A directive such as `<bpel4RestLight:GET uri="http://host:8080/x"/>`
//! names its target by absolute uri. The `host[:port]` authority is the
//! service reference; when it resolves, scheme and authority are replaced
//! by the resolved base while path and query are kept.

use csar_core::ServiceRef;

use crate::xml::{Edit, Patterns, escape_attr, group_range, unescape};

/// Outcome for a single directive uri.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DirectiveRewrite {
    Rewritten(Edit),
    Unchanged,
    Unresolved(ServiceRef),
}

/// Scan `content` for directives and compute their rewrites.
pub(crate) fn rewrite_directives<F>(patterns: &Patterns, content: &str, mut resolve: F) -> Vec<DirectiveRewrite>
where
    F: FnMut(&ServiceRef) -> Option<String>,
{
    let mut outcomes = Vec::new();
    for caps in patterns.rest_directive.captures_iter(content) {
        let Some(range) = group_range(&caps, 1, 0) else { continue };
        let uri = unescape(&caps[1]);
        // Variable expressions and relative uris are not service references.
        let Some(parts) = patterns.absolute_uri.captures(&uri) else { continue };
        let service = ServiceRef::Authority(parts[2].to_string());
        let outcome = match resolve(&service) {
            Some(base) => {
                let rewritten = format!("{}{}", base.trim_end_matches('/'), &parts[3]);
                if rewritten == uri {
                    DirectiveRewrite::Unchanged
                } else {
                    DirectiveRewrite::Rewritten(Edit {
                        range,
                        replacement: escape_attr(&rewritten),
                    })
                }
            }
            None => DirectiveRewrite::Unresolved(service),
        };
        outcomes.push(outcome);
    }
    outcomes
}
