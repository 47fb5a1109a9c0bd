//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docmirror_core::{MirrorReport, ProgressReporter, RepoOutcome};
use docmirror_shared::{
    AppConfig, MirrorConfig, config_file_path, init_config, init_config_at, load_config,
    load_config_from, resolve_concurrency,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docmirror: mirror upstream documentation into single-file snapshots.
#[derive(Parser)]
#[command(
    name = "docmirror",
    version,
    about = "Mirror documentation subtrees of git repositories into versioned single-file artifacts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.docmirror/docmirror.toml).
    #[arg(long, global = true, env = "DOCMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch every configured repository and write changed artifacts.
    Run {
        /// Artifact output directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory holding the working copies.
        #[arg(long)]
        clone_root: Option<PathBuf>,

        /// Parallel fetches (0 = one per core).
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Only mirror the named repository (repeatable).
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,

        /// Print the run report as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// List configured repositories.
    List,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docmirror=info",
        1 => "docmirror=debug",
        _ => "docmirror=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            output,
            clone_root,
            concurrency,
            only,
            json,
        } => {
            let overrides = RunOverrides {
                output,
                clone_root,
                concurrency,
                only,
            };
            cmd_run(config_path, overrides, json).await
        }
        Command::List => cmd_list(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path).await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Flags that take precedence over the config file for one run.
#[derive(Debug, Default)]
pub(crate) struct RunOverrides {
    pub output: Option<PathBuf>,
    pub clone_root: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub only: Vec<String>,
}

impl RunOverrides {
    /// Merge into the file config, then validate.
    pub(crate) fn apply(self, app: &AppConfig) -> Result<MirrorConfig> {
        app.validate()?;

        let mut config = MirrorConfig::from(app);
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(clone_root) = self.clone_root {
            config.clone_root = clone_root;
        }
        if let Some(n) = self.concurrency {
            config.concurrency = resolve_concurrency(n);
        }

        if !self.only.is_empty() {
            let known: Vec<String> = config
                .repos
                .iter()
                .filter_map(|r| r.name().ok())
                .collect();
            if let Some(unknown) = self.only.iter().find(|n| !known.contains(n)) {
                return Err(eyre!(
                    "unknown repository '{unknown}' (configured: {})",
                    known.join(", ")
                ));
            }
            config
                .repos
                .retain(|r| r.name().is_ok_and(|name| self.only.contains(&name)));
        }

        Ok(config)
    }
}

fn load(config_path: Option<&Path>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn cmd_run(config_path: Option<&Path>, overrides: RunOverrides, json: bool) -> Result<()> {
    let app = load(config_path)?;
    let config = overrides.apply(&app)?;

    info!(
        repos = config.repos.len(),
        output = %config.output_dir.display(),
        clone_root = %config.clone_root.display(),
        concurrency = config.concurrency,
        "mirroring documentation"
    );

    let reporter = CliProgress::new();
    let report = docmirror_core::mirror_with_git(&config, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("  Updated:   {}", report.updated());
        println!("  Unchanged: {}", report.unchanged());
        println!("  Failed:    {}", report.failed());
        println!("  Output:    {}", config.output_dir.display());
        println!("  Time:      {:.1}s", report.elapsed_ms as f64 / 1000.0);
        println!();
    }

    if !report.is_success() {
        return Err(eyre!(
            "{} of {} repositories failed",
            report.failed(),
            report.repos.len()
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
///
/// Per-repository result lines are written to stderr with the spinner
/// suspended, so they still appear when the spinner is hidden (no TTY).
struct CliProgress {
    spinner: ProgressBar,
    lines: Mutex<Box<dyn Write + Send>>,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self::with_output(spinner, Box::new(std::io::stderr()))
    }

    fn with_output(spinner: ProgressBar, lines: Box<dyn Write + Send>) -> Self {
        Self {
            spinner,
            lines: Mutex::new(lines),
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn repo_fetched(&self, name: &str, ok: bool, current: usize, total: usize) {
        let state = if ok { "fetched" } else { "fetch failed" };
        self.spinner
            .set_message(format!("Fetching [{current}/{total}] {name} {state}"));
    }

    fn repo_finished(&self, outcome: &RepoOutcome) {
        let line = outcome.summary_line();
        self.spinner.suspend(|| {
            if let Ok(mut out) = self.lines.lock() {
                let _ = writeln!(out, "{line}");
                let _ = out.flush();
            }
        });
    }

    fn done(&self, _report: &MirrorReport) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_list(config_path: Option<&Path>) -> Result<()> {
    let app = load(config_path)?;
    info!(repos = app.repos.len(), "listing repositories");

    for repo in &app.repos {
        let name = repo
            .name()
            .unwrap_or_else(|e| format!("<invalid: {e}>"));
        println!("{name:<12} {:<50} {}", repo.remote, repo.docs_path);
    }
    Ok(())
}

async fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let source = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    let config: AppConfig = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("# {}", source.display());
    println!("{toml_str}");
    Ok(())
}
