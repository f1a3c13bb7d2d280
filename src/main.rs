//! Maverick - A development orchestrator for JavaScript monorepos
//!
//! This is the main CLI entry point for Maverick.

use clap::{Parser, Subcommand};
use maverick::compose::{ComposeBinary, ComposeBuilder, ComposeOrchestrator, ManifestGenerator};
use maverick::config::{Config, Environment};
use maverick::error::{MaverickError, Result};
use maverick::process::Runner;
use maverick::project::parser_for;
use maverick::tools::{init, ngrok, setup, template};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Maverick - Development orchestrator for monorepos
#[derive(Parser)]
#[command(name = "maverick")]
#[command(version)]
#[command(about = "Run a monorepo's packages and infrastructure through docker-compose", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(flatten)]
    env: Environment,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build images for units
    Build {
        /// Units to build (all when empty)
        units: Vec<String>,
    },

    /// Stop and remove units
    Down {
        /// Units to stop (all when empty)
        units: Vec<String>,
    },

    /// Start units and their dependencies
    Up {
        /// Units to start (all when empty)
        units: Vec<String>,
    },

    /// Restart units
    Restart {
        /// Units to restart (all when empty)
        units: Vec<String>,
    },

    /// Stop, then start units
    Reload {
        /// Units to reload (all when empty)
        units: Vec<String>,
    },

    /// List units
    List {
        /// Only show units whose name contains this
        filter: Option<String>,
    },

    /// Show running units
    Ps,

    /// Write the compose manifest without running anything
    Generate,

    /// Create a maverick.yml in the current directory
    Init {
        /// Project name
        #[arg(long)]
        name: Option<String>,
    },

    /// Store ngrok tunnel credentials
    Ngrok {
        /// Tunnel subdomain
        subdomain: String,
        /// Auth token
        token: String,
    },

    /// Clone the project's setup repository
    Setup {
        /// Repository URL
        url: Option<String>,
    },

    /// Print a configuration snippet
    Template {
        /// Category, builtin, `overrides`, `defaults` or `config`
        #[arg(value_name = "TYPE")]
        kind: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let env = cli.env.without_empty();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(env.log.as_deref().unwrap_or("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli.command, env).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, env: Environment) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(cwd, env).await;

    match command {
        Commands::Build { units } => orchestrator(&config)?.build(&units).await,
        Commands::Down { units } => orchestrator(&config)?.down(&units).await,
        Commands::Up { units } => orchestrator(&config)?.up(&units).await,
        Commands::Restart { units } => orchestrator(&config)?.restart(&units).await,
        Commands::Reload { units } => orchestrator(&config)?.reload(&units).await,
        Commands::List { filter } => {
            let units = orchestrator(&config)?.list(filter.as_deref()).await?;
            println!("{:<40} {:<16} IMAGE", "NAME", "CATEGORY");
            for unit in units {
                let category = unit.category.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<40} {:<16} {}",
                    unit.name,
                    category,
                    unit.image.as_deref().unwrap_or("-")
                );
            }
            Ok(())
        }
        Commands::Ps => orchestrator(&config)?.ps().await,
        Commands::Generate => {
            let path = orchestrator(&config)?.generate().await?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Init { name } => {
            let path = init::init(&config.cwd, name.as_deref()).await?;
            println!("Created {}", path.display());
            Ok(())
        }
        Commands::Ngrok { subdomain, token } => {
            let project = config.project()?;
            let path = ngrok::write_credentials(&project.root, &subdomain, &token).await?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Commands::Setup { url } => {
            let project = config.project()?;
            let url = url
                .or_else(|| config.setup_url())
                .ok_or_else(|| MaverickError::Setup("no setup repository configured".to_string()))?;
            let target = setup::setup(&project.root, &url, &Runner::new()).await?;
            println!("Cloned into {}", target.display());
            Ok(())
        }
        Commands::Template { kind } => {
            print!("{}", template::snippet(&kind)?);
            Ok(())
        }
    }
}

/// Wire the orchestrator for the loaded project
fn orchestrator(config: &Config) -> Result<ComposeOrchestrator> {
    let project = config.project()?;
    let runner = Arc::new(Runner::new());
    let parser = parser_for(project.project_type(), project.root.clone(), runner);

    let builder = ComposeBuilder::new(project.config.clone(), project.internal.clone(), parser);
    let generator = ManifestGenerator::for_project(&project.name);
    let driver = Arc::new(ComposeBinary::new(config.compose_binary(), project.root.clone()));

    Ok(ComposeOrchestrator::new(builder, generator, driver))
}
