// Copyright 2026 ZoneAtlas Contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use zoneatlas::DEFAULT_BUFFER_FT;
use zoneatlas_runtime::cli;
use zoneatlas_runtime::config::RuntimeConfig;

#[derive(Parser)]
#[command(
    name = "zoneatlas",
    about = "ZoneAtlas: zoning standards acquisition and parcel zoning resolution",
    version,
    after_help = "Run 'zoneatlas <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Jurisdiction registry JSON (default: built-in, or ZONEATLAS_REGISTRY)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and cache ordinance sources
    Acquire {
        /// Jurisdiction ids (delegating jurisdictions resolve to their authority)
        ids: Vec<String>,
        /// Acquire every zoning authority in the registry
        #[arg(long)]
        all: bool,
        /// Ignore fresh cache entries
        #[arg(long)]
        force: bool,
        /// Jurisdictions resolved at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Extract dimensional standards from a jurisdiction's source
    Extract {
        /// Jurisdiction id
        jurisdiction: String,
        /// Ignore fresh cache entries
        #[arg(long)]
        force: bool,
        /// Print only; do not write the SQLite store
        #[arg(long)]
        no_store: bool,
    },
    /// Assign a zoning district to every parcel in a GeoJSON layer
    Zone {
        /// Jurisdiction id
        jurisdiction: String,
        /// Parcel FeatureCollection
        #[arg(long)]
        parcels: PathBuf,
        /// Zoning FeatureCollection
        #[arg(long)]
        zoning: PathBuf,
        /// Parcel id property
        #[arg(long, default_value = "PARCEL_ID")]
        id_property: String,
        /// Assessor land-use code property
        #[arg(long)]
        use_code_property: Option<String>,
        /// District code property on zoning features
        #[arg(long, default_value = "ZONING")]
        zone_property: String,
        /// Envelope buffer in feet for the buffered rung
        #[arg(long, default_value_t = DEFAULT_BUFFER_FT)]
        buffer: f64,
        /// Write assignments as JSONL to this file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Do not write the SQLite store
        #[arg(long)]
        no_store: bool,
    },
    /// Inspect the jurisdiction registry
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
    /// Manage cached source documents
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum RegistryAction {
    /// List jurisdictions
    List,
    /// Show one jurisdiction and its acquisition ladder
    Show {
        /// Jurisdiction id
        id: String,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cached documents and freshness
    Status,
    /// Clear cached documents (all or for one jurisdiction)
    Clear {
        /// Jurisdiction to clear (omit to clear all)
        jurisdiction: Option<String>,
    },
}

fn init_logging(cli: &Cli) {
    let default = if cli.verbose {
        "debug"
    } else {
        cli.log_level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json {
        builder.json().init();
    } else {
        builder.with_ansi(!cli.no_color).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("ZONEATLAS_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("ZONEATLAS_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("ZONEATLAS_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("ZONEATLAS_NO_COLOR", "1");
    }
    init_logging(&cli);

    let mut config = RuntimeConfig::from_env();
    if let Some(path) = &cli.registry {
        config.registry_path = Some(path.clone());
    }

    let result = match cli.command {
        Commands::Acquire {
            ids,
            all,
            force,
            concurrency,
        } => cli::acquire_cmd::run(&config, &ids, all, force, concurrency).await,
        Commands::Extract {
            jurisdiction,
            force,
            no_store,
        } => cli::extract_cmd::run(&config, &jurisdiction, force, no_store).await,
        Commands::Zone {
            jurisdiction,
            parcels,
            zoning,
            id_property,
            use_code_property,
            zone_property,
            buffer,
            out,
            no_store,
        } => {
            cli::zone_cmd::run(
                &config,
                cli::zone_cmd::ZoneArgs {
                    jurisdiction: &jurisdiction,
                    parcels: &parcels,
                    zoning: &zoning,
                    id_property: &id_property,
                    use_code_property: use_code_property.as_deref(),
                    zone_property: &zone_property,
                    buffer_ft: buffer,
                    out: out.as_deref(),
                    no_store,
                },
            )
            .await
        }
        Commands::Registry { action } => match action {
            RegistryAction::List => cli::registry_cmd::run_list(&config).await,
            RegistryAction::Show { id } => cli::registry_cmd::run_show(&config, &id).await,
        },
        Commands::Cache { action } => match action {
            CacheAction::Status => cli::cache_cmd::run_status(&config).await,
            CacheAction::Clear { jurisdiction } => {
                cli::cache_cmd::run_clear(&config, jurisdiction.as_deref()).await
            }
        },
        Commands::Doctor => cli::doctor::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "zoneatlas", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
