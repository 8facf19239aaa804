use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tgfp_db::{MemoryServer, MongoTarget};
use tgfp_kernel::settings::Settings;
use tgfp_seed::SeedPlan;

#[derive(Debug, Parser)]
#[command(name = "tgfp-seed", version, about = "Bootstrap the tgfp MongoDB instance")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the admin principal, authenticate, and create the players collection.
    Seed {
        /// Run against an in-memory server instead of the configured one.
        #[arg(long)]
        dry_run: bool,
    },
    /// Check that the configured server has been seeded.
    Verify,
    /// Print the seed plan as JSON with secrets redacted.
    Plan,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load tgfp-seed settings")?;
    tgfp_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        command = ?cli.command,
        "tgfp-seed starting"
    );

    let plan = SeedPlan::tgfp();
    match cli.command {
        Command::Seed { dry_run } => seed(&settings, &plan, dry_run).await,
        Command::Verify => verify(&settings, &plan).await,
        Command::Plan => {
            let json = serde_json::to_string_pretty(&plan)
                .with_context(|| "failed to serialize seed plan")?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn seed(settings: &Settings, plan: &SeedPlan, dry_run: bool) -> anyhow::Result<()> {
    let report = if dry_run {
        tracing::info!("dry run against in-memory server");
        let mut target = MemoryServer::new().connect();
        tgfp_seed::run(&mut target, plan).await?
    } else {
        let mut target = MongoTarget::connect(&settings.database)
            .await
            .with_context(|| "failed to configure mongodb client")?;
        tgfp_seed::run(&mut target, plan).await?
    };

    println!(
        "{}",
        serde_json::to_string(&report).with_context(|| "failed to serialize seed report")?
    );
    Ok(())
}

async fn verify(settings: &Settings, plan: &SeedPlan) -> anyhow::Result<()> {
    let mut inspector = MongoTarget::connect(&settings.database)
        .await
        .with_context(|| "failed to configure mongodb client")?;
    let mut mismatches = tgfp_seed::verify(&mut inspector, plan)
        .await
        .with_context(|| "failed to inspect seeded state")?;

    let mut login = MongoTarget::connect(&settings.database)
        .await
        .with_context(|| "failed to configure mongodb client")?;
    if let Some(mismatch) = tgfp_seed::verify_login(&mut login, plan)
        .await
        .with_context(|| "failed to check principal login")?
    {
        mismatches.push(mismatch);
    }

    if mismatches.is_empty() {
        tracing::info!("seeded state verified");
        println!("ok");
        return Ok(());
    }

    for mismatch in &mismatches {
        tracing::error!(%mismatch, "verification failed");
        println!("{mismatch}");
    }
    bail!("{} verification check(s) failed", mismatches.len())
}
