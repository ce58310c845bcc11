//! CLI binary for newsclip.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use newsclip::{
    analyze_images, collect_images, resolve_extractor, write_csv, AnalysisResult, BatchOutput,
    ExtractionConfig, ResultStatus, Subject,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a folder of scans, print results
  newsclip scans/

  # Export to CSV (nam_june_paik_articles.csv in the current directory)
  newsclip scans/ --export

  # Export to a chosen path
  newsclip scans/*.jpg -o out/articles.csv

  # Another subject, with spelling variants
  newsclip --subject "Charlotte Moorman" --alias "C. Moorman" scans/

  # JSON output
  newsclip --json page-01.png > results.json

  # Use a different backend via edgequake-llm
  newsclip --provider openai --model gpt-4.1 scans/

SUPPORTED FORMATS:
  .jpg  .jpeg  .png  .webp   (directories are scanned recursively)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default backend)
  API_KEY                 Fallback for GEMINI_API_KEY
  OPENAI_API_KEY          OpenAI API key (with --provider openai)
  ANTHROPIC_API_KEY       Anthropic API key (with --provider anthropic)
  NEWSCLIP_MODEL          Override model ID
  NEWSCLIP_PROVIDER       Override backend
  RUST_LOG                Override log filter

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Analyse:         newsclip scans/ -o articles.csv
"#;

/// Find newspaper articles about a subject in page scans.
#[derive(Parser, Debug)]
#[command(
    name = "newsclip",
    version,
    about = "Find newspaper articles about a subject in page scans using Vision LLMs",
    long_about = "For every scanned newspaper page, locate the article that mentions the \
subject, transcribe its headline and body text, and collect one row per image. Uses Google \
Gemini structured output by default; other vision backends (OpenAI, Anthropic, Ollama, …) \
are available via --provider.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files or directories.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write the CSV export to this file.
    #[arg(short, long, env = "NEWSCLIP_OUTPUT")]
    output: Option<PathBuf>,

    /// Write the CSV export to `<subject>_articles.csv` in the current directory.
    #[arg(long, env = "NEWSCLIP_EXPORT", conflicts_with = "output")]
    export: bool,

    /// Print results as JSON (BatchOutput) instead of a table.
    #[arg(long, env = "NEWSCLIP_JSON")]
    json: bool,

    /// Vision model ID (default: gemini-2.5-flash).
    #[arg(long, env = "NEWSCLIP_MODEL")]
    model: Option<String>,

    /// Backend: gemini (default), openai, anthropic, ollama, …
    #[arg(long, env = "NEWSCLIP_PROVIDER")]
    provider: Option<String>,

    /// Gemini API key. Defaults to GEMINI_API_KEY, then API_KEY.
    /// Ignored with a non-Gemini --provider, which reads its own key variable.
    #[arg(long, env = "NEWSCLIP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Person the articles must mention.
    #[arg(long, env = "NEWSCLIP_SUBJECT")]
    subject: Option<String>,

    /// Additional spelling of the subject's name (repeatable).
    #[arg(long = "alias", value_name = "NAME")]
    aliases: Vec<String>,

    /// Value written into every row's Folder Name column.
    #[arg(long, env = "NEWSCLIP_FOLDER_NAME")]
    folder_name: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "NEWSCLIP_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per image.
    #[arg(long, env = "NEWSCLIP_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Path to a text file containing a custom instruction.
    #[arg(long, env = "NEWSCLIP_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Keep the model's text exactly as returned.
    #[arg(long, env = "NEWSCLIP_NO_REFLOW")]
    no_reflow: bool,

    /// Disable the spinner.
    #[arg(long, env = "NEWSCLIP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NEWSCLIP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "NEWSCLIP_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; INFO logs would tear it.
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

    // ── Build config ─────────────────────────────────────────────────────
    // A missing credential is reported here, before any image is read.
    let mut config = build_config(&cli).await?;
    let extractor = resolve_extractor(&config).context("Cannot start analysis")?;
    config.extractor = Some(extractor);

    let images = collect_images(&cli.inputs).context("Failed to collect images")?;

    // ── Run batch ────────────────────────────────────────────────────────
    let spinner = if show_progress {
        Some(start_spinner(images.len()))
    } else {
        None
    };

    let outcome = analyze_images(images, &config).await;
    if let Some(ref bar) = spinner {
        bar.finish_and_clear();
    }
    let output = outcome.context("Analysis failed")?;

    let csv_path = csv_target(&cli, &config);
    if let Some(ref path) = csv_path {
        write_csv(path, &output.results)
            .with_context(|| format!("Failed to write CSV to {}", path.display()))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_table(&output.results).context("Failed to write to stdout")?;
    }

    if !cli.quiet {
        print_summary(&output, csv_path.as_ref());
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut subject = match cli.subject {
        Some(ref name) => Subject::new(name.as_str()),
        None => Subject::default(),
    };
    for alias in &cli.aliases {
        subject = subject.with_variant(alias.as_str());
    }

    let mut builder = ExtractionConfig::builder()
        .subject(subject)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .reflow(!cli.no_reflow);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(ref key) = cli.api_key {
        let gemini = cli
            .provider
            .as_deref()
            .is_none_or(|p| p.eq_ignore_ascii_case("gemini"));
        if !gemini {
            tracing::warn!(
                "--api-key only applies to Gemini; provider '{}' reads its own key variable",
                cli.provider.as_deref().unwrap_or_default()
            );
        }
        builder = builder.api_key(key.as_str());
    }
    if let Some(ref folder) = cli.folder_name {
        builder = builder.folder_name(folder.as_str());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

/// Where the CSV export goes: `-o <path>`, or the subject's default file
/// name with `--export`.
fn csv_target(cli: &Cli, config: &ExtractionConfig) -> Option<PathBuf> {
    match cli.output {
        Some(ref path) => Some(path.clone()),
        None if cli.export => Some(PathBuf::from(config.export_file_name())),
        None => None,
    }
}

fn start_spinner(total: usize) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Analysing");
    bar.set_message(format!("{total} image(s)…"));
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// One block per result: marker, file name, title, then the body text.
fn print_table(results: &[AnalysisResult]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for r in results {
        let marker = match r.status() {
            ResultStatus::Found => green("✓"),
            ResultStatus::NotFound => dim("·"),
            ResultStatus::Failed => red("✗"),
        };
        writeln!(
            out,
            "{} {}  {}  {}",
            marker,
            dim(&r.folder_name),
            bold(&r.file_name),
            cyan(&r.title)
        )?;
        if r.is_copyable() {
            for line in r.text.lines() {
                writeln!(out, "    {line}")?;
            }
        } else {
            writeln!(out, "    {}", dim(&r.text))?;
        }
        writeln!(out)?;
    }
    out.flush()
}

fn print_summary(output: &BatchOutput, csv_path: Option<&PathBuf>) {
    let s = &output.stats;
    let marker = if s.failed == 0 {
        green("✔")
    } else if s.failed == s.total_images {
        red("✘")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{}  {} image(s)  {} found  {} not found  {} failed  {}ms",
        marker,
        bold(&s.total_images.to_string()),
        s.found,
        s.not_found,
        s.failed,
        s.total_duration_ms,
    );
    if let Some(path) = csv_path {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }
}
