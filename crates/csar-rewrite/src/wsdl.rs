//! WSDL service descriptions: bindings, ports, and their SOAP addresses.

use std::collections::HashMap;
use std::ops::Range;
use std::path::PathBuf;

use csar_core::QName;

use crate::encoding::Encoding;
use crate::xml::{Patterns, group_range, local_part, namespace_declarations, resolve_qname, unescape};

/// A `<port>` inside a `<service>`.
#[derive(Debug, Clone)]
pub(crate) struct WsdlPort {
    pub service: String,
    pub name: String,
    /// Local name of the binding the port refers to.
    pub binding: String,
    /// Byte range and current value of the `location` attribute, if any.
    pub location: Option<(Range<usize>, String)>,
}

#[derive(Debug)]
pub(crate) struct WsdlDocument {
    pub path: PathBuf,
    pub content: String,
    /// Encoding the content is written back in.
    pub encoding: Encoding,
    pub target_namespace: String,
    /// Binding local name → implemented port type.
    bindings: HashMap<String, QName>,
    pub ports: Vec<WsdlPort>,
}

impl WsdlDocument {
    pub fn parse(patterns: &Patterns, path: PathBuf, content: String) -> Self {
        let namespaces = namespace_declarations(patterns, &content);
        let target_namespace = patterns
            .definitions
            .captures(&content)
            .and_then(|caps| patterns.attributes(&caps[1]).remove("targetNamespace"))
            .unwrap_or_default();

        let bindings = patterns
            .binding
            .captures_iter(&content)
            .filter_map(|caps| {
                let attrs = patterns.attributes(&caps[1]);
                let name = attrs.get("name")?;
                let port_type = attrs.get("type")?;
                Some((name.clone(), resolve_qname(port_type, &namespaces)))
            })
            .collect();

        let mut ports = Vec::new();
        for service in patterns.service.captures_iter(&content) {
            let Some(body) = service.get(2) else { continue };
            let service_name = patterns
                .attributes(&service[1])
                .remove("name")
                .unwrap_or_default();
            for port in patterns.port.captures_iter(body.as_str()) {
                let attrs = patterns.attributes(&port[1]);
                let (Some(name), Some(binding)) = (attrs.get("name"), attrs.get("binding")) else {
                    continue;
                };
                let location = port.get(2).and_then(|port_body| {
                    let caps = patterns.address_location.captures(port_body.as_str())?;
                    let base = body.start() + port_body.start();
                    Some((group_range(&caps, 1, base)?, unescape(&caps[1])))
                });
                ports.push(WsdlPort {
                    service: service_name.clone(),
                    name: name.clone(),
                    binding: local_part(binding).to_string(),
                    location,
                });
            }
        }

        Self {
            path,
            content,
            encoding: Encoding::Utf8,
            target_namespace,
            bindings,
            ports,
        }
    }

    /// Port type implemented by a port of this document.
    pub fn port_type_of(&self, port: &WsdlPort) -> Option<QName> {
        self.bindings.get(&port.binding).cloned()
    }

    /// Find the port `port_name` of service `service_local`.
    pub fn find_port(&self, service_local: &str, port_name: &str) -> Option<&WsdlPort> {
        self.ports
            .iter()
            .find(|port| port.service == service_local && port.name == port_name)
    }
}
