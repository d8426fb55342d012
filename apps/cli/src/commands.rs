//! CLI command definitions, routing, and tracing setup.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use mdigest_core::{
    CollectConfig, ProgressEmitter, ProgressReporter, RenderJob, RenderPaths, StreamPayload,
    WkhtmltopdfBackend, collect_output_path, event_stream, parse_frame, render_output_paths,
    run_output_paths, spawn_task, timestamp,
};
use mdigest_dispatch::{ChatCompletionsGenerator, parse_source_list};
use mdigest_markdown::HighlightSet;
use mdigest_shared::{AppConfig, DispatchConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// mdigest: summarize news URLs into a Markdown digest and PDF.
#[derive(Parser)]
#[command(
    name = "mdigest",
    version,
    about = "Summarize a list of URLs into a Markdown digest and a PDF with a table of contents.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Progress output: a terminal spinner or a server-push event stream.
    #[arg(long, default_value = "text", global = true)]
    pub progress: ProgressMode,

    /// Config file to use instead of ~/.mdigest/mdigest.toml.
    #[arg(long, global = true)]
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

/// Progress output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ProgressMode {
    Text,
    Sse,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate a Markdown summary for every URL in a list and merge them.
    Collect {
        /// File with one URL per line.
        input: PathBuf,

        /// Output Markdown file (defaults to <output_dir>/AI_news_summary_<ts>.md).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Items per batch (overrides config).
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Add a table of contents to a Markdown digest and render it to PDF.
    Render {
        /// Markdown file to render.
        markdown: PathBuf,

        /// File with one highlight keyword per line.
        #[arg(long)]
        highlight: Option<PathBuf>,

        /// Output directory (overrides config).
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Collect, then render the merged digest.
    Run {
        /// File with one URL per line.
        input: PathBuf,

        /// File with one highlight keyword per line.
        #[arg(long)]
        highlight: Option<PathBuf>,

        /// Items per batch (overrides config).
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Output directory (overrides config).
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

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

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout stays
/// free for the event stream.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "mdigest=info",
        1 => "mdigest=debug",
        _ => "mdigest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let mode = cli.progress;
    let config_path = cli.config;

    match cli.command {
        Command::Collect {
            input,
            out,
            batch_size,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_collect(config, &input, out, batch_size, mode).await
        }
        Command::Render {
            markdown,
            highlight,
            out_dir,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_render(config, &markdown, highlight.as_deref(), out_dir, mode).await
        }
        Command::Run {
            input,
            highlight,
            batch_size,
            out_dir,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_run(config, &input, highlight.as_deref(), batch_size, out_dir, mode).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

fn output_dir(config: &AppConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.processing.output_dir))
}

fn dispatch_config(config: &AppConfig, flag: Option<usize>) -> Result<DispatchConfig> {
    Ok(DispatchConfig::new(
        flag.unwrap_or(config.processing.batch_size),
    )?)
}

fn read_highlights(path: Option<&Path>) -> Result<Option<HighlightSet>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("cannot read highlight file {}", path.display()))?;
    let set = HighlightSet::parse(&text);
    info!(terms = set.len(), path = %path.display(), "loaded highlight keywords");
    Ok(Some(set))
}

fn read_sources(path: &Path) -> Result<Vec<mdigest_shared::SourceItem>> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("cannot read URL list {}", path.display()))?;
    Ok(parse_source_list(&text))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_collect(
    config: AppConfig,
    input: &Path,
    out: Option<PathBuf>,
    batch_size: Option<usize>,
    mode: ProgressMode,
) -> Result<()> {
    // Validate everything before any request goes out
    let generator = Arc::new(ChatCompletionsGenerator::from_config(&config)?);
    let collect_config = CollectConfig {
        dispatch: dispatch_config(&config, batch_size)?,
        output_path: out.unwrap_or_else(|| {
            collect_output_path(&output_dir(&config, None), &timestamp())
        }),
    };
    let items = read_sources(input)?;

    info!(
        input = %input.display(),
        items = items.len(),
        batch_size = collect_config.dispatch.batch_size,
        "collecting summaries"
    );

    let path = execute(mode, &config, move |progress| async move {
        let result = mdigest_core::collect(
            &collect_config,
            &items,
            generator,
            progress.as_ref(),
        )
        .await?;
        Ok(result.markdown_path)
    })
    .await?;

    if mode == ProgressMode::Text {
        println!();
        println!("  Digest saved: {}", path.display());
        println!();
    }
    Ok(())
}

async fn cmd_render(
    config: AppConfig,
    markdown: &Path,
    highlight: Option<&Path>,
    out_dir: Option<PathBuf>,
    mode: ProgressMode,
) -> Result<()> {
    let document = std::fs::read_to_string(markdown)
        .wrap_err_with(|| format!("cannot read {}", markdown.display()))?;
    let highlights = read_highlights(highlight)?;

    let paths = render_output_paths(&output_dir(&config, out_dir), markdown, &timestamp());
    let job = RenderJob::new(paths, &config.render.title);
    let backend = WkhtmltopdfBackend::from_config(&config.render);

    info!(markdown = %markdown.display(), "rendering digest");

    let path = execute(mode, &config, move |progress| async move {
        let result = mdigest_core::render(
            &job,
            &document,
            highlights.as_ref(),
            &backend,
            progress.as_ref(),
        )
        .await?;
        Ok(result.primary_output().to_path_buf())
    })
    .await?;

    print_render_summary(mode, &path);
    Ok(())
}

async fn cmd_run(
    config: AppConfig,
    input: &Path,
    highlight: Option<&Path>,
    batch_size: Option<usize>,
    out_dir: Option<PathBuf>,
    mode: ProgressMode,
) -> Result<()> {
    let generator = Arc::new(ChatCompletionsGenerator::from_config(&config)?);
    let dispatch = dispatch_config(&config, batch_size)?;
    let items = read_sources(input)?;
    let highlights = read_highlights(highlight)?;

    let dir = output_dir(&config, out_dir);
    let ts = timestamp();
    let (markdown_path, pdf_path) = run_output_paths(&dir, &ts);
    let collect_config = CollectConfig {
        dispatch,
        output_path: markdown_path,
    };
    let job = RenderJob::new(
        RenderPaths {
            pdf_path,
            markdown_path: dir.join(format!("news_summary_{ts}_with_toc.md")),
        },
        &config.render.title,
    );
    let backend = WkhtmltopdfBackend::from_config(&config.render);

    info!(input = %input.display(), items = items.len(), "running full pipeline");

    let path = execute(mode, &config, move |progress| async move {
        let result = mdigest_core::run(
            &collect_config,
            &job,
            &items,
            generator,
            highlights.as_ref(),
            &backend,
            progress.as_ref(),
        )
        .await?;
        Ok(result.render.primary_output().to_path_buf())
    })
    .await?;

    print_render_summary(mode, &path);
    Ok(())
}

fn print_render_summary(mode: ProgressMode, path: &Path) {
    if mode != ProgressMode::Text {
        return;
    }
    println!();
    if path.extension().is_some_and(|ext| ext == "pdf") {
        println!("  PDF saved: {}", path.display());
    } else {
        println!("  PDF rendering failed; Markdown with TOC saved: {}", path.display());
    }
    println!();
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress plumbing
// ---------------------------------------------------------------------------

/// Run a pipeline job with the selected progress output and return the path
/// it reports.
///
/// In `sse` mode the job runs as a background task and its events are
/// written to stdout as server-push frames until the terminal event.
async fn execute<F, Fut>(mode: ProgressMode, config: &AppConfig, job: F) -> Result<PathBuf>
where
    F: FnOnce(Arc<dyn ProgressReporter>) -> Fut + Send + 'static,
    Fut: Future<Output = mdigest_shared::Result<PathBuf>> + Send + 'static,
{
    match mode {
        ProgressMode::Text => {
            let reporter = Arc::new(CliProgress::new());
            let result = job(reporter.clone()).await;
            reporter.finish();
            Ok(result?)
        }
        ProgressMode::Sse => {
            let emitter = ProgressEmitter::from_config(&config.progress);
            let (task, supervisor) =
                spawn_task(&emitter, move |progress| job(Arc::new(progress)));

            let keepalive = Duration::from_millis(config.progress.keepalive_ms);
            let mut frames = std::pin::pin!(event_stream(emitter.subscribe(task.id()), keepalive));
            let mut outcome = None;

            while let Some(frame) = frames.next().await {
                print!("{frame}");
                std::io::stdout().flush()?;
                if let Some(payload) = parse_frame(&frame).filter(StreamPayload::is_terminal) {
                    outcome = Some(payload);
                }
            }
            supervisor.await?;

            match outcome {
                Some(StreamPayload::Completed(path)) => Ok(PathBuf::from(path)),
                Some(StreamPayload::Failed(message)) => Err(eyre!(message)),
                _ => Err(eyre!("task {} ended without a result", task.id())),
            }
        }
    }
}

/// CLI progress reporter using an indicatif spinner. Every status line is
/// also printed above the spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn message(&self, text: &str) {
        self.spinner.println(format!("  {text}"));
        self.spinner.set_message(text.to_string());
    }
}
