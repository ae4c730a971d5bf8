//! Background removal and model management CLI
//!
//! `bgremove-manager INPUT OUTPUT MODEL [KEEP] [BG]` removes the background of one
//! image. The maintenance flags list, download and locate models instead.

use crate::{
    catalog::format_size,
    config::{ManagerConfig, ManagerConfigBuilder},
    download::BatchReport,
    manager::{ModelManager, ShutdownDecision, ShutdownHandle},
    providers::ProviderSelection,
    services::ConsoleProgressReporter,
    tracing_config::init_cli_tracing,
    types::{BackgroundColor, TransparencyPolicy},
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const MAINTENANCE_FLAGS: [&str; 5] = [
    "list_models",
    "download",
    "download_missing",
    "show_providers",
    "show_models_dir",
];

/// Remove image backgrounds and manage segmentation models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-manager")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image
    #[arg(value_name = "INPUT", required_unless_present_any = MAINTENANCE_FLAGS)]
    pub input: Option<PathBuf>,

    /// Output image, always written as PNG
    #[arg(value_name = "OUTPUT", required_unless_present_any = MAINTENANCE_FLAGS)]
    pub output: Option<PathBuf>,

    /// Model name from the catalog (see --list-models)
    #[arg(value_name = "MODEL", required_unless_present_any = MAINTENANCE_FLAGS)]
    pub model: Option<String>,

    /// 1 keeps the alpha channel, 0 flattens onto BG
    #[arg(
        value_name = "KEEP",
        default_value = "1",
        value_parser = parse_keep_flag,
        action = clap::ArgAction::Set
    )]
    pub keep: bool,

    /// Background colour used when KEEP is 0 (#rrggbb, r,g,b or a name)
    #[arg(value_name = "BG")]
    pub background: Option<BackgroundColor>,

    /// List catalog models and whether they are installed
    #[arg(long)]
    pub list_models: bool,

    /// Download the given models
    #[arg(long, value_name = "MODEL", num_args = 1..)]
    pub download: Vec<String>,

    /// Download every model that is not installed yet
    #[arg(long)]
    pub download_missing: bool,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Print the models directory and exit
    #[arg(long)]
    pub show_models_dir: bool,

    /// Use a custom models directory
    #[arg(long, value_name = "PATH")]
    pub models_dir: Option<PathBuf>,

    /// Load settings from a JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_keep_flag(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(format!("expected 1 or 0, got '{other}'")),
    }
}

/// Parse arguments, run, and map the outcome to an exit code
pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_cli_tracing(cli.verbose) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;

    if cli.show_models_dir {
        println!("{}", config.models_dir.display());
        return Ok(());
    }

    let mut manager = ModelManager::builder(config)
        .progress_reporter(Arc::new(ConsoleProgressReporter::new(cli.verbose > 0)))
        .build()
        .context("Failed to initialize model manager")?;

    if cli.show_providers {
        show_provider_diagnostics(&manager);
        return Ok(());
    }

    if cli.list_models {
        list_models(&mut manager)?;
        return Ok(());
    }

    let shutdown = manager.shutdown_handle();
    let operation = async {
        if cli.download_missing || !cli.download.is_empty() {
            download_models(&mut manager, &cli).await
        } else {
            process_image(&mut manager, &cli).await
        }
    };

    tokio::select! {
        result = operation => result,
        () = close_requested(shutdown) => {
            anyhow::bail!("Interrupted, partially written files may remain")
        },
    }
}

/// Resolves once a Ctrl-C passes the shutdown gate
///
/// While an operation is running the user is asked to confirm. A declined
/// prompt keeps the operation going and re-arms the handler.
async fn close_requested(shutdown: ShutdownHandle) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }

        let decision = tokio::task::block_in_place(|| shutdown.request(confirm_on_terminal));
        match decision {
            ShutdownDecision::Proceed => return,
            ShutdownDecision::Cancel => info!("▶️ Continuing ({})", shutdown.current()),
        }
    }
}

fn confirm_on_terminal(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn build_config(cli: &Cli) -> Result<ManagerConfig> {
    let mut builder = match &cli.config {
        Some(path) => ManagerConfigBuilder::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ManagerConfig::builder(),
    };

    // An explicit cache_file from the file survives; otherwise it follows the directory
    if let Some(dir) = &cli.models_dir {
        builder = builder.models_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

async fn process_image(manager: &mut ModelManager, cli: &Cli) -> Result<()> {
    let (Some(input), Some(output), Some(model)) = (&cli.input, &cli.output, &cli.model) else {
        anyhow::bail!("INPUT, OUTPUT and MODEL are required");
    };
    let policy = TransparencyPolicy::from_keep_flag(cli.keep, cli.background)
        .context("Invalid transparency arguments")?;

    info!("🚀 Removing background");
    info!("  Input: {}", input.display());
    info!("  Output: {}", output.display());
    info!("  Model: {model}");
    info!("  Transparency: {policy}");

    let result = manager
        .process(input, output, model, policy)
        .await
        .with_context(|| format!("Failed to process {}", input.display()))?;

    let (width, height) = result.dimensions();
    info!(
        "✅ Saved {} ({width}x{height}, {} channels) in {}ms",
        output.display(),
        result.channels,
        result.timings.total_ms
    );
    Ok(())
}

fn show_provider_diagnostics(manager: &ModelManager) {
    println!("🔍 Execution Provider Diagnostics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🚀 Execution Providers (priority order):");
    for info in manager.provider_diagnostics() {
        let status = if info.available {
            "✅ Available"
        } else {
            "❌ Not Available"
        };
        println!("  • {}: {} - {}", info.provider, status, info.description);
    }

    match manager.detect_providers() {
        ProviderSelection::Detected(list) => {
            println!("\n💡 Sessions will use: {list}");
        },
        ProviderSelection::RuntimeDefault => {
            println!("\n💡 Provider detection unavailable, sessions use the runtime default");
        },
    }
}

fn list_models(manager: &mut ModelManager) -> Result<()> {
    manager
        .refresh()
        .context("Failed to scan the models directory")?;

    println!("📦 Models in {}", manager.models_dir().display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let installed = manager.installed();
    for descriptor in manager.catalog().iter() {
        let marker = if installed.contains(descriptor.name) {
            "✅"
        } else {
            "⬜"
        };
        println!(
            "{marker} {:<24} {:>9}  {}",
            descriptor.name,
            format_size(descriptor.size_bytes),
            descriptor.description
        );
    }

    let missing = manager.missing_models();
    let missing_size = manager
        .catalog()
        .total_size(missing.iter().map(|d| d.name));
    println!(
        "\n{} of {} installed, {} missing (~{})",
        installed.len(),
        manager.catalog().len(),
        missing.len(),
        format_size(missing_size)
    );
    Ok(())
}

async fn download_models(manager: &mut ModelManager, cli: &Cli) -> Result<()> {
    manager
        .refresh()
        .context("Failed to scan the models directory")?;

    let names: BTreeSet<String> = if cli.download_missing {
        manager
            .missing_models()
            .into_iter()
            .map(|d| d.name.to_string())
            .collect()
    } else {
        cli.download.iter().cloned().collect()
    };

    if names.is_empty() {
        info!("✅ All models are already installed");
        return Ok(());
    }

    let total = manager.catalog().total_size(names.iter().map(String::as_str));
    info!(
        "📥 Downloading {} model(s), ~{} into {}",
        names.len(),
        format_size(total),
        manager.models_dir().display()
    );

    let spinners = DownloadSpinners::new(&names)?;
    let report = manager
        .download(names, |name, success| spinners.finish(name, success))
        .await
        .context("Download batch failed")?;

    summarize(&report)
}

fn summarize(report: &BatchReport) -> Result<()> {
    for name in &report.failed {
        warn!("❌ {name} could not be downloaded");
    }
    info!(
        "📦 {} of {} model(s) downloaded",
        report.succeeded.len(),
        report.total()
    );
    if report.all_succeeded() {
        Ok(())
    } else {
        anyhow::bail!("{} model download(s) failed", report.failed.len())
    }
}

/// One spinner per model in the batch
struct DownloadSpinners {
    // Keeps the bars attached for the lifetime of the batch
    _multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl DownloadSpinners {
    fn new(names: &BTreeSet<String>) -> Result<Self> {
        let multi = MultiProgress::new();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:<24} {msg}")
            .context("Invalid progress template")?;

        let bars = names
            .iter()
            .map(|name| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style.clone());
                bar.set_prefix(name.clone());
                bar.set_message("downloading");
                bar.enable_steady_tick(Duration::from_millis(120));
                (name.clone(), bar)
            })
            .collect();

        Ok(Self {
            _multi: multi,
            bars,
        })
    }

    fn finish(&self, name: &str, success: bool) {
        if let Some(bar) = self.bars.get(name) {
            bar.finish_with_message(if success { "✅ done" } else { "❌ failed" });
        }
    }
}
