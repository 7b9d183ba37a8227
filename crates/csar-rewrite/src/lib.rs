//! csar-rewrite: endpoint rewriting for packaged plans.
//!
//! A plan package carries WSDL descriptions of the services it invokes and
//! process definitions with embedded REST-light directives. The addresses
//! baked into those files are placeholders from modelling time; before the
//! package is shipped to the engine they are rewritten to the addresses the
//! container currently knows.
//!
//! # Steps
//!
//! ```text
//! deploy.xml ──► inbound (provide) port ──► WSDL binding ──► port type   (hard failure if missing)
//! deploy.xml ──► invoked ports ──► WSDL <address location> ──► resolve(PortType)
//! *.bpel     ──► REST-light uri ──► resolve(Authority)
//! ```
//!
//! Unresolved references are logged and reported; they never abort the run.

mod descriptor;
mod encoding;
pub mod error;
mod restlight;
mod wsdl;
mod xml;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use csar_core::{CsarId, EndpointResolver, QName, ServiceRef};
use tracing::{debug, info, warn};

pub use descriptor::CLIENT_PARTNER_LINK;
pub use error::{RewriteError, RewriteResult};

use crate::descriptor::DeploymentDescriptor;
use crate::encoding::{Decoded, Encoding, decode, encode};
use crate::restlight::{DirectiveRewrite, rewrite_directives};
use crate::wsdl::WsdlDocument;
use crate::xml::{Edit, Patterns, apply_edits, escape_attr};

/// Result of a rewrite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Port type of the process' inbound interface.
    pub port_type: QName,
    /// Number of addresses replaced.
    pub rewritten: usize,
    /// Human-readable descriptions of references that could not be resolved.
    pub unresolved: Vec<String>,
    /// Number of files written back.
    pub files_changed: usize,
}

impl RewriteReport {
    /// True when every reference found in the package was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

enum FileKind {
    Descriptor,
    Wsdl,
    Process,
    Other,
}

fn classify(path: &Path) -> FileKind {
    if path.file_name().is_some_and(|name| name == "deploy.xml") {
        return FileKind::Descriptor;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("wsdl") => FileKind::Wsdl,
        Some("bpel") => FileKind::Process,
        _ => FileKind::Other,
    }
}

fn read(path: &Path) -> RewriteResult<Decoded> {
    let bytes = std::fs::read(path).map_err(|source| RewriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = decode(&bytes);
    if decoded.encoding != Encoding::Utf8 {
        debug!(path = %path.display(), encoding = ?decoded.encoding, "descriptor is not UTF-8");
    }
    Ok(decoded)
}

fn write(path: &Path, content: &str, encoding: Encoding) -> RewriteResult<()> {
    std::fs::write(path, encode(content, encoding)).map_err(|source| RewriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrites network bindings of extracted plan files in place.
pub struct EndpointRewriter<'a> {
    resolver: &'a dyn EndpointResolver,
    patterns: Patterns,
}

impl<'a> EndpointRewriter<'a> {
    pub fn new(resolver: &'a dyn EndpointResolver) -> RewriteResult<Self> {
        Ok(Self {
            resolver,
            patterns: Patterns::new()?,
        })
    }

    /// Rewrite every resolvable binding in `files` and determine the
    /// process' inbound port type.
    ///
    /// Fails only when the port type cannot be determined or a file cannot
    /// be accessed.
    pub fn rewrite(&self, csar_id: &CsarId, files: &[PathBuf]) -> RewriteResult<RewriteReport> {
        let mut descriptor = None;
        let mut wsdls = Vec::new();
        let mut processes = Vec::new();
        for path in files {
            match classify(path) {
                FileKind::Descriptor => {
                    descriptor = Some(DeploymentDescriptor::parse(&self.patterns, &read(path)?.text));
                }
                FileKind::Wsdl => {
                    let decoded = read(path)?;
                    let mut doc = WsdlDocument::parse(&self.patterns, path.clone(), decoded.text);
                    doc.encoding = decoded.encoding;
                    wsdls.push(doc);
                }
                FileKind::Process => processes.push(path),
                FileKind::Other => {}
            }
        }
        debug!(csar = %csar_id, wsdls = wsdls.len(), processes = processes.len(), "plan files classified");

        let descriptor = descriptor.ok_or_else(|| {
            RewriteError::PortTypeUnknown("package contains no deploy.xml".to_string())
        })?;
        let port_type = inbound_port_type(&descriptor, &wsdls)?;
        debug!(csar = %csar_id, %port_type, "inbound port type determined");

        let mut report = RewriteReport {
            port_type,
            rewritten: 0,
            unresolved: Vec::new(),
            files_changed: 0,
        };

        self.rewrite_wsdls(csar_id, &descriptor, &wsdls, &mut report)?;
        for path in processes {
            self.rewrite_process(csar_id, path, &mut report)?;
        }

        if report.is_complete() {
            info!(csar = %csar_id, rewritten = report.rewritten, "all plan endpoints rewritten");
        } else {
            warn!(
                csar = %csar_id,
                rewritten = report.rewritten,
                unresolved = report.unresolved.len(),
                "not all plan endpoints could be rewritten"
            );
        }
        Ok(report)
    }

    fn rewrite_wsdls(
        &self,
        csar_id: &CsarId,
        descriptor: &DeploymentDescriptor,
        wsdls: &[WsdlDocument],
        report: &mut RewriteReport,
    ) -> RewriteResult<()> {
        let mut edits: Vec<Vec<Edit>> = vec![Vec::new(); wsdls.len()];
        let mut seen = HashSet::new();

        for invoked in descriptor.invoked() {
            let found = wsdls.iter().enumerate().find_map(|(index, doc)| {
                doc.find_port(&invoked.service, &invoked.port)
                    .map(|port| (index, doc, port))
            });
            let Some((index, doc, port)) = found else {
                warn!(
                    csar = %csar_id,
                    partner_link = %invoked.partner_link,
                    service = %invoked.service,
                    port = %invoked.port,
                    "invoked port is not described by any WSDL"
                );
                report.unresolved.push(format!(
                    "partner link {}: port {}/{} not described by any WSDL",
                    invoked.partner_link, invoked.service, invoked.port
                ));
                continue;
            };
            let Some((range, current)) = &port.location else {
                debug!(service = %port.service, port = %port.name, "port has no address");
                continue;
            };
            if !seen.insert((index, range.start)) {
                continue;
            }
            let Some(port_type) = doc.port_type_of(port) else {
                warn!(
                    binding = %port.binding,
                    namespace = %doc.target_namespace,
                    path = %doc.path.display(),
                    "binding of invoked port not found"
                );
                report.unresolved.push(format!(
                    "partner link {}: binding {} not found",
                    invoked.partner_link, port.binding
                ));
                continue;
            };
            let service = ServiceRef::PortType(port_type);
            match self.resolver.resolve(csar_id, &service) {
                Some(address) if &address == current => {}
                Some(address) => {
                    debug!(%service, from = %current, to = %address, "WSDL address rewritten");
                    edits[index].push(Edit {
                        range: range.clone(),
                        replacement: escape_attr(&address),
                    });
                    report.rewritten += 1;
                }
                None => {
                    warn!(csar = %csar_id, %service, "no current endpoint for WSDL port");
                    report.unresolved.push(service.to_string());
                }
            }
        }

        for (doc, doc_edits) in wsdls.iter().zip(edits) {
            if !doc_edits.is_empty() {
                write(&doc.path, &apply_edits(&doc.content, doc_edits), doc.encoding)?;
                report.files_changed += 1;
            }
        }
        Ok(())
    }

    fn rewrite_process(
        &self,
        csar_id: &CsarId,
        path: &Path,
        report: &mut RewriteReport,
    ) -> RewriteResult<()> {
        let Decoded { text: content, encoding } = read(path)?;
        let mut edits = Vec::new();
        let outcomes = rewrite_directives(&self.patterns, &content, |service| {
            self.resolver.resolve(csar_id, service)
        });
        for outcome in outcomes {
            match outcome {
                DirectiveRewrite::Rewritten(edit) => {
                    edits.push(edit);
                    report.rewritten += 1;
                }
                DirectiveRewrite::Unchanged => {}
                DirectiveRewrite::Unresolved(service) => {
                    warn!(csar = %csar_id, %service, path = %path.display(), "no current endpoint for REST-light directive");
                    report.unresolved.push(service.to_string());
                }
            }
        }
        if !edits.is_empty() {
            write(path, &apply_edits(&content, edits), encoding)?;
            report.files_changed += 1;
        }
        Ok(())
    }
}

fn inbound_port_type(descriptor: &DeploymentDescriptor, wsdls: &[WsdlDocument]) -> RewriteResult<QName> {
    let inbound = descriptor.inbound().ok_or_else(|| {
        RewriteError::PortTypeUnknown("deploy.xml provides no service".to_string())
    })?;
    wsdls
        .iter()
        .find_map(|doc| {
            let port = doc.find_port(&inbound.service, &inbound.port)?;
            doc.port_type_of(port)
        })
        .ok_or_else(|| {
            RewriteError::PortTypeUnknown(format!(
                "no WSDL binding for provided service {} port {}",
                inbound.service, inbound.port
            ))
        })
}
