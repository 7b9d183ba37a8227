//! csarctl: drive plan deployments and inspect tracked CSAR state.
//!
//! # Usage
//!
//! ```text
//! csarctl deploy --csar app.csar --plan '{http://example.org/plans}BuildPlan' --reference Plans/BuildPlan.zip
//! csarctl state artifact --kind plan --csar app.csar
//! csarctl endpoints --csar app.csar
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use csar_core::{ArtifactKind, ArtifactState, CsarId, CsarProcessState, QName};

mod commands;

#[derive(Parser)]
#[command(
    name = "csarctl",
    about = "CSAR plan deployment and state tracking",
    version,
    propagate_version = true
)]
struct Cli {
    /// Container configuration file.
    #[arg(long, global = true, default_value = "csar.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy a packaged plan to the process engine.
    Deploy(PlanArgs),
    /// Undeploy a packaged plan from the process engine.
    Undeploy(PlanArgs),
    /// Show or set tracked deployment state.
    State {
        #[command(subcommand)]
        target: StateTarget,
    },
    /// List the resolved endpoints of a CSAR's deployed plans.
    Endpoints {
        #[arg(long)]
        csar: CsarId,
    },
    /// Delete every tracked record of a CSAR.
    Delete {
        #[arg(long)]
        csar: CsarId,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(clap::Args)]
struct PlanArgs {
    #[arg(long)]
    csar: CsarId,
    /// Plan id, `{namespace}LocalName`.
    #[arg(long)]
    plan: QName,
    /// Path of the plan package inside the CSAR.
    #[arg(long)]
    reference: String,
}

#[derive(Subcommand)]
enum StateTarget {
    /// CSAR lifecycle state.
    Csar {
        csar: CsarId,
        #[arg(long)]
        set: Option<CsarProcessState>,
    },
    /// Deployment state of implementation artifacts or plans.
    Artifact {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        csar: CsarId,
        /// Artifact path; all artifacts of the CSAR when omitted.
        #[arg(long)]
        path: Option<String>,
        /// Store this state (requires --path).
        #[arg(long, requires = "path")]
        set: Option<ArtifactState>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Ia,
    Plan,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ia => ArtifactKind::ImplementationArtifact,
            KindArg::Plan => ArtifactKind::Plan,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,csar=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let container = commands::Container::load(&cli.config)?;

    match cli.command {
        Command::Deploy(args) => {
            commands::deploy::deploy(&container, &args.csar, &args.plan, &args.reference).await
        }
        Command::Undeploy(args) => {
            commands::deploy::undeploy(&container, &args.csar, &args.plan, &args.reference).await
        }
        Command::State { target } => match target {
            StateTarget::Csar { csar, set } => commands::state::csar(&container, &csar, set),
            StateTarget::Artifact {
                kind,
                csar,
                path,
                set,
            } => commands::state::artifact(&container, kind.into(), &csar, path.as_deref(), set),
        },
        Command::Endpoints { csar } => commands::endpoints::list(&container, &csar),
        Command::Delete { csar } => commands::state::delete(&container, &csar),
        Command::Config => {
            print!("{}", container.config.redacted().to_toml_string()?);
            Ok(())
        }
    }
}
