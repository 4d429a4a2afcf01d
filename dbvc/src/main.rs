use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use dbvc::utils::init_logging;
use dbvc::{config, CancellationToken, DbvcClient};

#[derive(Debug, Parser)]
#[command(name = "dbvc")]
#[command(about = "Version control for relational database schemas", version)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "dbvc.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the live database schema to the schema document.
    Import,
    /// Print the script that reconciles the database with the schema document.
    Compare(CompareArgs),
    /// Print the full creation script for the schema document.
    Export(OutputArgs),
    /// Run a script file against the database in one transaction.
    Apply(ApplyArgs),
}

#[derive(Debug, Args)]
struct CompareArgs {
    /// Treat the live database as authoritative instead of the document.
    #[arg(long)]
    reverse: bool,
    /// Apply the generated script right away.
    #[arg(long)]
    apply: bool,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Write the script to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ApplyArgs {
    /// Script file to run.
    file: PathBuf,
}

fn emit(script: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, script)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "script written");
        }
        None => print!("{}", script),
    }
    Ok(())
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            handle.cancel();
        }
    });
    token
}

async fn apply(client: &mut DbvcClient, script: &str) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let applied = client
        .apply_script(script, &cancel)
        .await
        .context("failed to apply script")?;
    info!(statements = applied, "apply finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    init_logging(&config.logging)?;

    let mut client = DbvcClient::new(config)
        .await
        .context("failed to connect to the database")?;

    match cli.command {
        Command::Import => {
            let schema = client.import_schema().await?;
            println!(
                "imported {} tables into {}",
                schema.tables.len(),
                client.config().schema_path().display()
            );
        }
        Command::Compare(args) => {
            let script = client.compare(args.reverse).await?;
            if script.is_empty() {
                info!("schemas match, nothing to do");
            } else if args.apply {
                apply(&mut client, &script).await?;
            }
            emit(&script, args.output.output.as_deref())?;
        }
        Command::Export(args) => {
            let script = client.export_sql()?;
            emit(&script, args.output.as_deref())?;
        }
        Command::Apply(args) => {
            let script = fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            apply(&mut client, &script).await?;
        }
    }

    client.close().await?;
    Ok(())
}
