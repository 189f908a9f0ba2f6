//! CLI binary for paper-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the merged record.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_extract::{
    extract, normalize_result, ExtractionConfig, ExtractionEnvelope, ExtractionProgressCallback,
    ModelBackend, ProgressCallback, ProviderBackend,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over chunks. Chunks finish out of order, so the bar
/// position follows the completion counter, not chunk numbers.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` reports the chunk count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, chunk: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&chunk)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Sending {total_chunks} chunk(s) to the model…"))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(chunk, Instant::now());
        self.bar.set_message(format!("chunk {chunk}"));
    }

    fn on_chunk_complete(&self, chunk: usize, completed: usize, total: usize) {
        let secs = self.elapsed_secs(chunk);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            green("✓"),
            chunk,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(completed as u64);
    }

    fn on_chunk_error(&self, chunk: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(chunk);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_extraction_complete(&self, total_chunks: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chunk(s) extracted",
            green("✔"),
            bold(&total_chunks.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarise a paper with the default local model (ollama run mistral)
  paper-extract paper.pdf

  # Another local model, more parallel model processes
  paper-extract --model llama3.1 --concurrency 4 paper.pdf

  # Only the first two chunks (front matter is usually enough)
  paper-extract --max-chunks 2 paper.pdf

  # JSON envelope {status, raw, normalized}
  paper-extract --json paper.pdf > result.json

  # In-process provider instead of the ollama CLI
  paper-extract --provider openai --model gpt-4.1-nano paper.pdf

ENVIRONMENT VARIABLES:
  OLLAMA_MODEL        Model identifier (default: mistral)
  DOC_CHUNK_TARGET    Soft characters per chunk (default: 9000)
  DOC_CONCURRENCY     Model processes in flight (default: 3)
  DOC_MAX_CHUNKS      Keep only the first N chunks, 0 = all (default: 0)
  PDFIUM_LIB_PATH     Path to a libpdfium shared library
  RUST_LOG            Log filter, e.g. paper_extract=debug

SETUP:
  1. Install ollama and pull a model:   ollama pull mistral
  2. Make libpdfium available (next to the binary, in the working
     directory, system-wide, or via PDFIUM_LIB_PATH)
  3. Run:                               paper-extract paper.pdf
"#;

/// Extract structured metadata from scientific PDFs with a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "paper-extract",
    version,
    about = "Extract structured metadata from scientific PDFs with a local LLM",
    long_about = "Reads the text layer of a scientific PDF, sends page-bounded chunks to a \
locally hosted model (ollama by default), repairs and validates each JSON reply, and merges \
them into one record: document type, authors, date, and content/methods/findings/conclusions \
summaries.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the PDF file.
    input: PathBuf,

    /// Model identifier passed to the runner.
    #[arg(long, env = "OLLAMA_MODEL", default_value = "mistral")]
    model: String,

    /// Model runner executable, invoked as `<command> run <model>`.
    #[arg(long, env = "PAPER_EXTRACT_COMMAND", default_value = "ollama")]
    command: String,

    /// Soft character budget per chunk.
    #[arg(long, env = "DOC_CHUNK_TARGET", default_value_t = 9000)]
    chunk_target: usize,

    /// Model invocations in flight at once.
    #[arg(short, long, env = "DOC_CONCURRENCY", default_value_t = 3)]
    concurrency: usize,

    /// Keep only the first N chunks (0 = all).
    #[arg(long, env = "DOC_MAX_CHUNKS", default_value_t = 0)]
    max_chunks: usize,

    /// Hard cap on chunk characters included in each prompt.
    #[arg(long, env = "PAPER_EXTRACT_MAX_PROMPT_CHARS", default_value_t = 9000)]
    max_prompt_chars: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAPER_EXTRACT_PASSWORD")]
    password: Option<String>,

    /// Use an in-process edgequake-llm provider (openai, anthropic, gemini,
    /// ollama, …) instead of spawning the model runner.
    #[arg(long, env = "PAPER_EXTRACT_PROVIDER")]
    provider: Option<String>,

    /// Print the JSON envelope {status, raw, normalized} instead of text.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPER_EXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let started = Instant::now();
    let result = extract(&cli.input, &config).await;

    if cli.json {
        let code = ExtractionEnvelope::status_code_for(&result);
        let envelope = ExtractionEnvelope::from(result);
        println!(
            "{}",
            serde_json::to_string_pretty(&envelope).context("Failed to serialise envelope")?
        );
        if code != 200 {
            std::process::exit(1);
        }
        return Ok(());
    }

    let record = result.context("Extraction failed")?;
    let normalized = normalize_result(&record);

    println!("{}  {}", bold("Document type:"), normalized.document_type);
    println!("{}           {}", bold("Date:"), normalized.year);
    if normalized.authors.is_empty() {
        println!("{}        {}", bold("Authors:"), dim("Unknown"));
    } else {
        println!("{}        {}", bold("Authors:"), normalized.authors.join(", "));
    }
    for section in &normalized.sections {
        println!();
        println!("{}", cyan(&section.title));
        for bullet in &section.bullets {
            println!("  • {bullet}");
        }
    }

    if !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "Done in {:.1}s",
                started.elapsed().as_secs_f64()
            ))
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .model_id(cli.model.clone())
        .model_command(cli.command.clone())
        .chunk_target_chars(cli.chunk_target)
        .max_concurrency(cli.concurrency)
        .max_chunks(cli.max_chunks)
        .max_prompt_chars(cli.max_prompt_chars);

    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }

    if let Some(ref provider) = cli.provider {
        let backend = ProviderBackend::from_name(provider, &cli.model)
            .with_context(|| format!("Could not set up provider '{provider}'"))?;
        builder = builder.backend(Arc::new(backend) as Arc<dyn ModelBackend>);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
