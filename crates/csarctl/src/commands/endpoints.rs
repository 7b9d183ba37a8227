use csar_core::CsarId;

use super::Container;

pub fn list(container: &Container, csar: &CsarId) -> anyhow::Result<()> {
    let endpoints = container.store.list_endpoints(csar)?;
    if endpoints.is_empty() {
        println!("No endpoints stored for {csar}");
        return Ok(());
    }
    for endpoint in endpoints {
        println!("{}  {}  ({})", endpoint.plan_id, endpoint.address, endpoint.port_type);
    }
    Ok(())
}
