use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use summarist_core::{
    Backends, CoinAccount, Config, FileStore, HttpGenerationBackend, JobError, JobLedger,
    JobOrchestrator, ProfileKind, Provider, RegisterJob, SubmitJob, SummaryReducer,
    YtDlpTranscriptSource, format_outcome_readable, format_record_readable, get_ledger_path,
    new_job_id,
};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, ValueEnum)]
enum CliProvider {
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Parser)]
#[command(name = "summarist")]
#[command(about = "Summarize YouTube videos from their transcripts, paid from a coin balance")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,

    /// Requester id the coins are charged to
    #[arg(short, long, global = true, env = "SUMMARIST_USER")]
    user: Option<String>,

    /// Path to config TOML. If omitted, uses ./summarist.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// AI provider for summary generation (overrides config)
    #[arg(short, long, global = true)]
    provider: Option<CliProvider>,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a video and charge the requester
    Submit {
        url: String,
        /// Job id; a new one is generated if omitted
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Record a video as a pending job without summarizing it
    Register {
        url: String,
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Show the requester's coin balance
    Balance,
    /// Add coins to the requester's balance
    Credit { amount: i64 },
    /// Show a stored job
    Show { job_id: String },
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("summarist.toml");
    default.exists().then_some(default)
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match resolve_config_path(cli.config.as_deref()) {
        Some(path) => {
            Config::load(&path).with_context(|| format!("load config: {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(provider) = cli.provider.clone() {
        cfg.generation.provider = provider.into();
    }
    Ok(cfg)
}

fn init_logging(cli: &Cli, cfg: &Config) -> Result<()> {
    let filter = match cli.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(cfg.logging.level.as_str())),
    };

    let layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))
}

fn print_header(subtitle: &str) {
    println!(
        "\n{}  {}\n",
        style("summarist").cyan().bold(),
        style(subtitle).dim()
    );
}

fn fail(err: &JobError) -> ! {
    eprintln!(
        "{} {} {}",
        style("Error:").red().bold(),
        err.user_message(),
        style(format!("[{}]", err.code())).dim()
    );
    eprintln!("{}", style(err.to_string()).dim());
    std::process::exit(1);
}

/// Resolves on the interrupt signal. If the handler cannot be installed the
/// job runs without caller cancellation.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(error = %e, "cannot listen for Ctrl-C, running without it");
        std::future::pending::<()>().await;
    }
}

fn requester(cli: &Cli) -> Result<String> {
    cli.user
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow!("no requester: pass --user or set SUMMARIST_USER"))
}

fn build_orchestrator(cfg: &Config, store: Arc<FileStore>) -> Result<JobOrchestrator> {
    let provider = cfg.generation.provider;
    let standard = HttpGenerationBackend::from_config(cfg, ProfileKind::Standard)
        .with_context(|| format!("set up {} backend", provider.name()))?;
    let conservative = HttpGenerationBackend::from_config(cfg, ProfileKind::Conservative)
        .with_context(|| format!("set up {} backend", provider.name()))?;
    let reducer = SummaryReducer::from_config(
        Backends::new(Arc::new(standard), Arc::new(conservative)),
        cfg,
    );

    let transcripts = YtDlpTranscriptSource::new(cfg.storage.root())
        .with_timeout(cfg.job.transcript_timeout());

    Ok(JobOrchestrator::new(
        store.clone(),
        store,
        Arc::new(transcripts),
        reducer,
        cfg,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    init_logging(&cli, &cfg)?;

    let store = Arc::new(FileStore::new(get_ledger_path(&cfg.storage.root())));
    debug!(ledger = %store.path().display(), "using file store");

    match &cli.cmd {
        Command::Submit { url, job_id } => {
            let orchestrator = build_orchestrator(&cfg, store)?;
            let req = SubmitJob {
                requester_id: cli.user.clone(),
                source_url: url.clone(),
                job_id: job_id.clone().unwrap_or_else(new_job_id),
            };

            print_header("Video Summary");
            let started = Instant::now();
            let spinner = create_spinner(&format!(
                "Summarizing with {}...",
                cfg.generation.provider.name()
            ));
            let ctrl_c = interrupted(tokio::signal::ctrl_c());

            match orchestrator.submit_until(req, ctrl_c).await {
                Ok(outcome) => {
                    spinner.finish_with_message(format!(
                        "{} Summary {} {}",
                        style("✓").green().bold(),
                        style(outcome.status.as_str()).yellow(),
                        style(format!("[{}]", format_duration(started.elapsed()))).dim()
                    ));
                    println!("{}", style("─".repeat(60)).dim());
                    println!("{}", format_outcome_readable(&outcome));
                }
                Err(err) => {
                    spinner.finish_and_clear();
                    fail(&err);
                }
            }
        }
        Command::Register { url, job_id } => {
            let orchestrator = build_orchestrator(&cfg, store)?;
            let req = RegisterJob {
                requester_id: cli.user.clone(),
                source_url: url.clone(),
                job_id: job_id.clone().unwrap_or_else(new_job_id),
            };

            let spinner = create_spinner("Fetching transcript...");
            match orchestrator.register(req).await {
                Ok(record) => {
                    spinner.finish_with_message(format!(
                        "{} Registered {} {}",
                        style("✓").green().bold(),
                        style(&record.title).cyan(),
                        style(format!("({})", record.id)).dim()
                    ));
                }
                Err(err) => {
                    spinner.finish_and_clear();
                    fail(&err);
                }
            }
        }
        Command::Balance => {
            let user = requester(&cli)?;
            let balance = store.balance(&user).await.context("read balance")?;
            println!("{} {}", style(&user).cyan(), style(balance).bold());
        }
        Command::Credit { amount } => {
            if *amount <= 0 {
                return Err(anyhow!("amount must be positive"));
            }
            let user = requester(&cli)?;
            let balance = store.credit(&user, *amount).await.context("credit coins")?;
            println!(
                "{} Credited {} {} {}",
                style("✓").green().bold(),
                amount,
                style(&user).cyan(),
                style(format!("(balance {balance})")).dim()
            );
        }
        Command::Show { job_id } => {
            let record = store
                .get(job_id)
                .await
                .context("read job")?
                .ok_or_else(|| anyhow!("job {job_id} not found"))?;
            println!("{}", format_record_readable(&record));
        }
    }

    Ok(())
}
