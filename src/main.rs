// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use goblin::config::Config;
use goblin::manifest::Manifest;
use goblin::operations::{Installer, Outcome, Summary};
use goblin::repository::{self, RepositoryClient};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "goblin")]
#[command(author, version, about = "Install prebuilt binaries from a manifest and keep them in sync", long_about = None)]
struct Cli {
    /// Goblin home directory (default: $GOBLIN_HOME or ~/.goblin)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Use this manifest file instead of the downloaded one
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    /// Override the detected operating system (e.g. linux, darwin)
    #[arg(long, global = true)]
    os: Option<String>,

    /// Override the detected architecture (e.g. amd64, arm64)
    #[arg(long, global = true)]
    arch: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package declared in the manifest
    Install {
        /// Package name
        name: String,
        /// Build from source (not supported, prebuilt artifacts are used)
        #[arg(long)]
        build: bool,
    },
    /// Update one package, or every installed package when no name is given
    Update {
        /// Package name (updates all if omitted)
        name: Option<String>,
        /// Reinstall even when the installed version is current
        #[arg(short, long)]
        force: bool,
        /// Show what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Do not refresh the manifest before updating
        #[arg(long)]
        offline: bool,
    },
    /// Remove an installed package
    Remove {
        /// Package name
        name: String,
    },
    /// Reinstall packages whose binaries are missing from disk
    Sync,
    /// List installed packages
    List,
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Resolve paths and platform from flags and the environment
fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::discover(cli.home.as_deref())?;
    if let Some(path) = &cli.manifest {
        config = config.with_manifest_path(path);
    }
    if let Some(os) = &cli.os {
        config.platform.os = os.clone();
    }
    if let Some(arch) = &cli.arch {
        config.platform.arch = arch.clone();
    }
    Ok(config)
}

/// Load the manifest, downloading or refreshing the local copy as needed
fn load_manifest(cli: &Cli, config: &Config, refresh: bool) -> Result<Manifest> {
    if let Some(path) = &cli.manifest {
        return Manifest::load(path).with_context(|| format!("loading {}", path.display()));
    }

    let client = RepositoryClient::new()?;
    if refresh {
        println!("Checking for manifest updates...");
        if let Err(e) = repository::refresh_manifest(config, &client) {
            warn!("Could not refresh manifest: {}", e);
            warn!("Using the existing local copy");
        }
    }

    let path = repository::ensure_manifest(config, &client)?;
    Ok(Manifest::load(&path)?)
}

fn open_installer(config: Config, manifest: Manifest) -> Result<Installer<RepositoryClient>> {
    let client = RepositoryClient::new()?;
    Ok(Installer::open(config, manifest, client)?)
}

/// Print batch results and fail when any package failed
fn report_batch(outcomes: &[Outcome]) -> Result<()> {
    for outcome in outcomes {
        println!("{}", outcome);
    }
    let summary = Summary::of(outcomes);
    println!("{}", summary);

    if summary.failed > 0 {
        anyhow::bail!("{} package(s) failed", summary.failed);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Install { name, build }) => {
            if *build {
                warn!("--build is ignored: prebuilt artifacts are always used");
            }
            let config = build_config(&cli)?;
            let manifest = load_manifest(&cli, &config, false)?;
            let mut installer = open_installer(config, manifest)?;

            info!("Installing package: {}", name);
            let outcome = installer.install(name)?;
            println!("{}", outcome);
            Ok(())
        }
        Some(Commands::Update {
            name,
            force,
            dry_run,
            offline,
        }) => {
            let config = build_config(&cli)?;
            let manifest = load_manifest(&cli, &config, !*offline && !*dry_run)?;
            let mut installer = open_installer(config, manifest)?;

            if *dry_run {
                let names: Vec<String> = match name {
                    Some(name) => vec![name.clone()],
                    None => installer.lock().entries().iter().map(|e| e.name.clone()).collect(),
                };
                for name in names {
                    let decision = installer.plan(&name, *force);
                    println!("{}: {} ({})", name, decision.action, decision.reason);
                }
                return Ok(());
            }

            match name {
                Some(name) => {
                    let outcome = installer.update(name, *force)?;
                    println!("{}", outcome);
                    Ok(())
                }
                None => {
                    println!("Updating all installed packages...");
                    let outcomes = installer.update_all(*force)?;
                    if outcomes.is_empty() {
                        println!("No packages installed.");
                        return Ok(());
                    }
                    report_batch(&outcomes)
                }
            }
        }
        Some(Commands::Remove { name }) => {
            let config = build_config(&cli)?;
            let mut installer = open_installer(config, Manifest::default())?;

            info!("Removing package: {}", name);
            let outcome = installer.remove(name)?;
            println!("{}", outcome);
            Ok(())
        }
        Some(Commands::Sync) => {
            let config = build_config(&cli)?;
            let manifest = load_manifest(&cli, &config, false)?;
            let mut installer = open_installer(config, manifest)?;

            let outcomes = installer.sync()?;
            if outcomes.is_empty() {
                println!(
                    "All {} installed package(s) are present.",
                    installer.lock().entries().len()
                );
                return Ok(());
            }
            report_batch(&outcomes)
        }
        Some(Commands::List) => {
            let config = build_config(&cli)?;
            let installer = open_installer(config, Manifest::default())?;
            let packages = installer.list();

            if packages.is_empty() {
                println!("No packages installed.");
                return Ok(());
            }

            println!("Installed packages:");
            for listing in &packages {
                let pkg = listing.entry;
                print!(
                    "  {} {} (from '{}') [{}/{}]",
                    pkg.name, pkg.installed_version, pkg.resolved_from, pkg.platform_os, pkg.platform_arch
                );
                if !listing.present {
                    print!(" MISSING");
                }
                println!();
                println!("    installed {}", pkg.install_timestamp.format("%Y-%m-%d %H:%M:%S"));
                println!("    {}", pkg.install_path.display());
            }
            println!("\nTotal: {} package(s)", packages.len());
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "goblin", &mut std::io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("Goblin v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'goblin --help' for usage information");
            Ok(())
        }
    }
}
