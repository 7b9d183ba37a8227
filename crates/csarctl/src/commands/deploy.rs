use csar_core::{CsarId, QName};

use super::Container;

pub async fn deploy(container: &Container, csar: &CsarId, plan: &QName, reference: &str) -> anyhow::Result<()> {
    let outcome = container.control().deploy_plan(csar, plan, reference).await;
    if outcome.success {
        println!("✓ {}", outcome.reason);
        Ok(())
    } else {
        eprintln!("Deploy failed: {}", outcome.reason);
        anyhow::bail!("deployment of {plan} failed")
    }
}

pub async fn undeploy(container: &Container, csar: &CsarId, plan: &QName, reference: &str) -> anyhow::Result<()> {
    let outcome = container.control().undeploy_plan(csar, plan, reference).await;
    if outcome.success {
        println!("✓ {}", outcome.reason);
        Ok(())
    } else {
        eprintln!("Undeploy failed: {}", outcome.reason);
        anyhow::bail!("undeployment of {plan} failed")
    }
}
