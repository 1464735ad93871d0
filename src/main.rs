use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use app_stub::connectivity::NetworkProbe;
use app_stub::present::ConsolePresenter;
use app_stub::update::handoff::{ArtifactHandoff, SystemInstaller};
use app_stub::update::http::HttpTransport;
use app_stub::{Config, UpdateCoordinator};

#[derive(Parser, Debug)]
#[command(name = "app-stub")]
#[command(about = "Fetch and install the latest build of the app", long_about = None)]
struct Cli {
    /// Only resolve the latest build and print it, without downloading
    #[arg(long)]
    check: bool,

    /// Log every step of the update
    #[arg(short, long)]
    verbose: bool,

    /// Read settings from this file instead of the user config
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("APP_STUB_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_required(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    let transport = HttpTransport::new().context("Failed to create HTTP client")?;
    let connectivity = NetworkProbe::new(config.probe_addr.clone());
    let handoff = ArtifactHandoff::new(
        config.mode,
        Box::new(SystemInstaller::new(config.installer.clone())),
    );
    let mut presenter = ConsolePresenter::stdio();

    let mut coordinator = UpdateCoordinator::new(
        &config,
        &connectivity,
        Arc::new(transport),
        &handoff,
        &mut presenter,
    );

    if cli.check {
        return run_check(&mut coordinator, &config);
    }

    // Outcomes are reported through the presenter and the log; the attempt ends either way
    let outcome = coordinator.run();
    tracing::debug!("attempt finished: {:?}", outcome);
    Ok(())
}

fn run_check(coordinator: &mut UpdateCoordinator<'_>, config: &Config) -> Result<()> {
    println!(
        "{} Checking the {} channel...",
        "●".cyan(),
        config.channel.name()
    );

    let manifest = coordinator
        .resolve_manifest()
        .context("Failed to resolve the latest build")?;

    match &manifest.version {
        Some(version) => println!("{} Latest version: {}", "✓".green(), version.green()),
        None => println!("{} Latest build found", "✓".green()),
    }
    if let Some(code) = manifest.version_code {
        println!("  {} {}", "code:".dimmed(), code);
    }
    println!("  {} {}", "link:".dimmed(), manifest.artifact_url.cyan());
    if let Some(commit) = &coordinator.attempt().commit {
        println!("  {} {}", "commit:".dimmed(), commit.as_str());
    }
    if let Some(note) = &manifest.note {
        println!("  {} {}", "notes:".dimmed(), note);
    }
    println!("  {} {}", "target:".dimmed(), config.target_path().display());

    Ok(())
}
