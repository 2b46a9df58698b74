use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use review_sweep::config::DEFAULT_CONFIG_PATH;
use review_sweep::{
    build_scanners, generate_json, generate_summary, Backend, ClusterSettings, Config,
    GitLabClient, Orchestrator, RunContext,
};

#[derive(Parser)]
#[command(name = "review-sweep")]
#[command(about = "Find review environment resources whose merge request is closed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the credentials file (JSON or YAML)
    #[arg(long, env = "REVIEW_SWEEP_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// GitLab base URL (overrides the credentials file)
    #[arg(long, env = "GITLAB_URL")]
    gitlab_url: Option<String>,

    /// GitLab project id (overrides the credentials file)
    #[arg(long)]
    project: Option<u64>,

    /// Deadline for the whole run, in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan backends and report dangling review resources
    Sweep {
        /// Backends to scan (repeatable; defaults to all)
        #[arg(long = "backend", value_enum)]
        backends: Vec<BackendArg>,

        /// Path to the kubeconfig file (defaults to ~/.kube/config)
        #[arg(long, env = "KUBECONFIG_PATH")]
        kubeconfig: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List open merge requests only
    Open,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Cluster,
    Database,
    ObjectStore,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cluster => Backend::Cluster,
            BackendArg::Database => Backend::Database,
            BackendArg::ObjectStore => Backend::ObjectStore,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs on stderr, report on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("review_sweep=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(url) = cli.gitlab_url {
        config.source_control.url = url;
    }
    if let Some(project) = cli.project {
        config.source_control.project_id = project;
    }

    let ctx = match cli.timeout {
        Some(secs) => RunContext::new().with_timeout(Duration::from_secs(secs)),
        None => RunContext::new(),
    };

    let gitlab = GitLabClient::new(&config.source_control, &config.gitlab)?;

    match cli.command {
        Commands::Sweep {
            backends,
            kubeconfig,
            format,
        } => {
            let backends: Vec<Backend> = if backends.is_empty() {
                Backend::ALL.to_vec()
            } else {
                backends.into_iter().map(Backend::from).collect()
            };
            run_sweep(config, gitlab, &backends, kubeconfig, format, &ctx).await?;
        }
        Commands::Open => {
            list_open(gitlab, &ctx).await?;
        }
    }

    Ok(())
}

async fn run_sweep(
    config: Config,
    gitlab: GitLabClient,
    backends: &[Backend],
    kubeconfig: Option<PathBuf>,
    format: Format,
    ctx: &RunContext,
) -> Result<()> {
    let cluster = ClusterSettings::from_env().with_override(kubeconfig);
    let scanners = build_scanners(&config, backends, &cluster)?;

    let orchestrator = Orchestrator::new(gitlab, scanners);
    let report = orchestrator.run(ctx).await?;

    info!(dangling = report.dangling.len(), "Writing report");

    match format {
        Format::Text => print!("{}", generate_summary(&report)),
        Format::Json => {
            let json = generate_json(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
    }

    Ok(())
}

async fn list_open(gitlab: GitLabClient, ctx: &RunContext) -> Result<()> {
    use review_sweep::{ActiveSetProvider, Stage};

    let active = ctx.guard(Stage::ActiveSet, gitlab.fetch()).await?;

    if active.is_empty() {
        println!("No open merge requests.");
        return Ok(());
    }

    for id in active.sorted() {
        println!("{}", id);
    }

    Ok(())
}
