use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use astroseq_config::SequenceDef;
use astroseq_engine::{ChannelProgress, EngineError, ProgressUpdate, SequenceRunner};
use astroseq_items::SequenceBuilder;

/// Astroseq - unattended imaging sequence runner
#[derive(Parser)]
#[command(name = "astroseq")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.astroseq)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Log output format
  #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
  log_format: LogFormat,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a sequence plan
  Run {
    /// Plan file, or the name of a plan in <data-dir>/sequences
    plan: String,
  },

  /// Check a sequence plan without running it
  Validate {
    /// Plan file, or the name of a plan in <data-dir>/sequences
    plan: String,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
  Text,
  Json,
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.log_format);

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".astroseq"),
  };

  match cli.command {
    Some(Commands::Run { plan }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_plan(resolve_plan(&plan, &data_dir)))
    }
    Some(Commands::Validate { plan }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(validate_plan(resolve_plan(&plan, &data_dir)))
    }
    None => {
      println!("astroseq - use --help to see available commands");
      Ok(())
    }
  }
}

fn init_tracing(format: LogFormat) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr);

  match format {
    LogFormat::Text => builder.init(),
    LogFormat::Json => builder.json().init(),
  }
}

/// A bare name refers to `<data-dir>/sequences/<name>.json`; anything else is
/// a path.
fn resolve_plan(plan: &str, data_dir: &Path) -> PathBuf {
  let path = Path::new(plan);
  let is_bare_name = path.extension().is_none() && path.components().count() == 1;

  if is_bare_name && !path.exists() {
    data_dir.join("sequences").join(format!("{}.json", plan))
  } else {
    path.to_path_buf()
  }
}

async fn load_plan(path: &Path) -> Result<SequenceDef> {
  let content = tokio::fs::read_to_string(path)
    .await
    .with_context(|| format!("failed to read plan file: {}", path.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse plan file: {}", path.display()))
}

async fn build_runner(path: &Path) -> Result<SequenceRunner> {
  let def = load_plan(path).await?;
  eprintln!("Loaded plan: {} ({} nodes)", def.name, def.node_count());

  let root = SequenceBuilder::default()
    .build(&def)
    .context("failed to build plan")?;
  Ok(SequenceRunner::new(root))
}

async fn run_plan(path: PathBuf) -> Result<()> {
  let (sink, mut updates) = ChannelProgress::channel();
  let runner = build_runner(&path).await?.with_progress(Arc::new(sink));

  let printer = tokio::spawn(async move {
    while let Some(update) = updates.recv().await {
      if let Some(line) = progress_line(&update) {
        eprintln!("{}", line);
      }
    }
  });

  let cancel = CancellationToken::new();
  let signal_cancel = cancel.clone();
  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        info!("interrupt received, stopping sequence");
        signal_cancel.cancel();
      }
      Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
    }
  });

  let result = runner.run(cancel).await;
  let report = runner.report();
  drop(runner);
  if let Err(e) = printer.await {
    warn!(error = %e, "progress printer stopped");
  }

  println!("{}", serde_json::to_string_pretty(&report)?);

  match result {
    Ok(report) if report.is_success() => Ok(()),
    Ok(report) => bail!("{} item(s) failed", report.failed),
    Err(EngineError::Cancelled) => bail!("sequence cancelled"),
    Err(e) => Err(e).context("sequence aborted"),
  }
}

async fn validate_plan(path: PathBuf) -> Result<()> {
  let runner = build_runner(&path).await?;
  let issues = runner.validate();

  if issues.is_empty() {
    println!("{}: ok", runner.root().name());
    return Ok(());
  }

  for issue in &issues {
    println!("{}", issue);
  }
  bail!("{} validation issue(s)", issues.len())
}

fn progress_line(update: &ProgressUpdate) -> Option<String> {
  if update.is_idle() {
    return None;
  }

  let mut line = match &update.source {
    Some(source) => format!("[{}] {}", source, update.status),
    None => update.status.clone(),
  };
  if let Some(progress) = update.progress {
    line.push_str(&format!(" ({:.0}%)", progress * 100.0));
  }
  Some(line)
}
