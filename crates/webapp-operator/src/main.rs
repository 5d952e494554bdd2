//! webapp-operator - reconciles WebappCR resources into scheduled CronJobs

use clap::{Parser, Subcommand};
use kube::Client;

use webapp_common::telemetry::init_telemetry;
use webapp_operator::config::ControllerArgs;
use webapp_operator::controller_runner::build_webapp_controller;
use webapp_operator::crds::{crd_yaml, ensure_crds_installed};

/// Kubernetes operator that runs a URI task on a schedule for every WebappCR
#[derive(Parser, Debug)]
#[command(name = "webapp-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    controller: ControllerArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches WebappCRs and their CronJobs, keeps each CronJob in line with
    /// its WebappCR spec and reports Job activity on the WebappCR status.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        println!("{}", crd_yaml()?);
        return Ok(());
    }

    init_telemetry(cli.controller.telemetry())?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.controller).await,
    }
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    let settings = args.settings()?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.install_crds {
        ensure_crds_installed(&client).await?;
    }

    tracing::info!(
        resync = ?settings.resync_interval,
        pass_timeout = ?settings.pass_timeout,
        schedule = %settings.task.schedule,
        image = %settings.task.image,
        "Starting webapp controller"
    );

    build_webapp_controller(client, settings).await;

    tracing::info!("Controller shut down");
    Ok(())
}
