//! Process deployment descriptor (`deploy.xml`).
//!
//! Lists the services a process provides (its inbound interface) and the
//! services it invokes, each as a `(partner link, service, port)` triple.

use crate::xml::{Patterns, local_part};

/// Partner link whose provided service is the process' callable entry point.
pub const CLIENT_PARTNER_LINK: &str = "client";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Provide,
    Invoke,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartnerPort {
    pub direction: Direction,
    pub partner_link: String,
    /// Local name of the referenced WSDL service.
    pub service: String,
    pub port: String,
}

#[derive(Debug, Default)]
pub(crate) struct DeploymentDescriptor {
    pub entries: Vec<PartnerPort>,
}

impl DeploymentDescriptor {
    pub fn parse(patterns: &Patterns, content: &str) -> Self {
        let entries = patterns
            .partner_entry
            .captures_iter(content)
            .filter_map(|caps| {
                let direction = match &caps[1] {
                    "provide" => Direction::Provide,
                    _ => Direction::Invoke,
                };
                let partner_link = patterns
                    .attributes(&caps[2])
                    .remove("partnerLink")
                    .unwrap_or_default();
                let service = patterns.service_ref.captures(&caps[3])?;
                let attrs = patterns.attributes(&service[1]);
                Some(PartnerPort {
                    direction,
                    partner_link,
                    service: local_part(attrs.get("name")?).to_string(),
                    port: attrs.get("port")?.clone(),
                })
            })
            .collect();
        Self { entries }
    }

    /// The provided port the container calls, preferring the `client` link.
    pub fn inbound(&self) -> Option<&PartnerPort> {
        let mut provided = self
            .entries
            .iter()
            .filter(|entry| entry.direction == Direction::Provide);
        let first = provided.clone().next();
        provided
            .find(|entry| entry.partner_link == CLIENT_PARTNER_LINK)
            .or(first)
    }

    pub fn invoked(&self) -> impl Iterator<Item = &PartnerPort> {
        self.entries
            .iter()
            .filter(|entry| entry.direction == Direction::Invoke)
    }
}
