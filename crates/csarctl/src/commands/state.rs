use csar_core::{ArtifactKind, ArtifactState, CsarId, CsarProcessState};

use super::Container;

pub fn csar(container: &Container, csar: &CsarId, set: Option<CsarProcessState>) -> anyhow::Result<()> {
    let tracker = container.tracker();
    if let Some(state) = set {
        tracker.store_csar_state(csar, state)?;
    }
    match tracker.csar_state(csar)? {
        Some(state) => println!("{csar}: {state}"),
        None => println!("{csar}: no state stored"),
    }
    Ok(())
}

pub fn artifact(
    container: &Container,
    kind: ArtifactKind,
    csar: &CsarId,
    path: Option<&str>,
    set: Option<ArtifactState>,
) -> anyhow::Result<()> {
    let tracker = container.tracker();
    let infos = match path {
        Some(path) => {
            let info = match set {
                Some(state) => Some(tracker.store_artifact_state(kind, csar, path, state)?),
                None => tracker.artifact_state(kind, csar, path)?,
            };
            info.into_iter().collect()
        }
        None => tracker.list_artifact_states(kind, csar)?,
    };

    if infos.is_empty() {
        println!("No {kind} deployment info stored for {csar}");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}

pub fn delete(container: &Container, csar: &CsarId) -> anyhow::Result<()> {
    let purge = container.tracker().delete_csar(csar)?;
    println!(
        "✓ Deleted records of {csar}: state={}, IAs={}, plans={}, endpoints={}",
        purge.csar_state, purge.implementation_artifacts, purge.plans, purge.endpoints
    );
    Ok(())
}
