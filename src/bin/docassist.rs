//! CLI binary for edgequake-docassist.
//!
//! A terminal transport over the library: menus are printed as numbered
//! lists, a number presses that button, any other line is sent as text.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docassist::pipeline::input::load_document;
use edgequake_docassist::{
    AssistantConfig, DocumentAssistant, Inbound, LlmCompleter, MenuSpec, Outbound,
    PdfiumExtractor, ProgressCallback, TransformProgressCallback, UserId,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// The terminal is a single user.
const LOCAL_USER: UserId = UserId(0);

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── ANSI colour helpers ─────────────────────────────────────────────────────

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

// ── CLI progress callback using indicatif ───────────────────────────────────

/// One progress bar per transform; chunks may finish out of order.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            f(bar);
        }
    }

    fn elapsed(&self, chunk: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&chunk)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TransformProgressCallback for CliProgressCallback {
    fn on_transform_start(&self, total_chunks: usize) {
        let bar = ProgressBar::new(total_chunks as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} chunks  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Processing");
        bar.enable_steady_tick(Duration::from_millis(80));
        *self.bar.lock().unwrap() = Some(bar);
    }

    fn on_chunk_start(&self, chunk: usize, _total_chunks: usize) {
        self.start_times.lock().unwrap().insert(chunk, Instant::now());
        self.with_bar(|bar| bar.set_message(format!("chunk {chunk}")));
    }

    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, output_len: usize) {
        let secs = self.elapsed(chunk);
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
                green("✓"),
                chunk,
                total_chunks,
                dim(&format!("{output_len:>5} chars")),
                dim(&format!("{secs:.1}s")),
            ));
            bar.inc(1);
        });
    }

    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let secs = self.elapsed(chunk);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.with_bar(|bar| {
            bar.println(format!(
                "  {} Chunk {:>3}/{:<3}  {}  {}",
                red("✗"),
                chunk,
                total_chunks,
                red(&msg),
                dim(&format!("{secs:.1}s")),
            ));
            bar.inc(1);
        });
    }

    fn on_reduce_start(&self, partials: usize) {
        self.with_bar(|bar| {
            bar.set_prefix("Merging");
            bar.set_message(format!("{partials} partial results"));
        });
    }

    fn on_transform_complete(&self, total_chunks: usize, success_count: usize) {
        let failed = total_chunks.saturating_sub(success_count);
        let status = if failed == 0 {
            format!("{} {} chunks processed", green("✔"), bold(&total_chunks.to_string()))
        } else {
            format!(
                "{} {}/{} chunks processed  ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_chunks,
                red(&failed.to_string())
            )
        };
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.println(status);
            bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive session: pick operations from numbered menus
  docassist report.pdf

  # Short summary, non-interactively
  docassist report.pdf --action summary_short

  # Key points, then translate that result into English, as JSON lines
  docassist report.pdf --action key_points --action translate_menu \
      --action translate_scope_summary --action translate_lang_en --json

  # From a URL, with a specific model
  docassist https://arxiv.org/pdf/1706.03762 --model gpt-4o --provider openai

INTERACTIVE COMMANDS:
  <number>        press the menu button with that number
  /open <path>    upload another PDF (path or URL)
  /start, /help   show the welcome message
  /quit           exit
  anything else   sent as a chat message

ACTIONS:
  summary_short  summary_long  key_points  simple_explanation
  translate_menu  translate_scope_full  translate_scope_summary
  translate_lang_{es,en,ru,pt,fr,de}

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips auto-download)
"#;

/// Summarize, explain and translate PDF documents with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docassist",
    version,
    about = "Summarize, explain and translate PDF documents with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Button action to press after upload (repeatable). Disables the
    /// interactive prompt.
    #[arg(short, long = "action")]
    actions: Vec<String>,

    /// Print outbound messages and menus as JSON lines.
    #[arg(long, env = "DOCASSIST_JSON")]
    json: bool,

    /// LLM model ID (e.g. gpt-4o-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent chunk completions.
    #[arg(short, long, env = "DOCASSIST_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCASSIST_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries per completion on failure.
    #[arg(long, env = "DOCASSIST_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-completion timeout in seconds.
    #[arg(long, env = "DOCASSIST_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Maximum characters per printed message.
    #[arg(long, env = "DOCASSIST_LIMIT", default_value_t = 4000)]
    limit: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCASSIST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCASSIST_PASSWORD")]
    password: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "DOCASSIST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCASSIST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "DOCASSIST_QUIET")]
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

    ensure_pdf_engine(cli.quiet)?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn TransformProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;
    let completer =
        LlmCompleter::from_config(&config).context("Failed to initialise the LLM provider")?;
    let extractor = match cli.password {
        Some(ref password) => PdfiumExtractor::with_password(password.clone()),
        None => PdfiumExtractor::new(),
    };
    let assistant = DocumentAssistant::new(config, Arc::new(completer), Arc::new(extractor));

    let mut terminal = Terminal {
        json: cli.json,
        last_menu: None,
    };

    upload(&assistant, &mut terminal, &cli.input, cli.download_timeout).await?;

    if !cli.actions.is_empty() {
        for action_id in &cli.actions {
            let effects = assistant
                .handle(
                    LOCAL_USER,
                    Inbound::ButtonPressed {
                        action_id: terminal.resolve_action(action_id),
                    },
                )
                .await;
            terminal.print(&effects)?;
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        if let Some(path) = line.strip_prefix("/open ") {
            if let Err(e) = upload(&assistant, &mut terminal, path.trim(), cli.download_timeout).await
            {
                eprintln!("{} {:#}", red("✘"), e);
            }
            continue;
        }

        let event = match line.parse::<usize>().ok().and_then(|n| terminal.button(n)) {
            Some(action_id) => Inbound::ButtonPressed { action_id },
            None => Inbound::TextReceived {
                content: line.to_string(),
            },
        };
        let effects = assistant.handle(LOCAL_USER, event).await;
        terminal.print(&effects)?;
    }

    Ok(())
}

/// Read `input` and deliver it as an upload.
async fn upload(
    assistant: &DocumentAssistant,
    terminal: &mut Terminal,
    input: &str,
    download_timeout: u64,
) -> Result<()> {
    let document = load_document(input, download_timeout)
        .await
        .with_context(|| format!("Failed to load '{input}'"))?;
    if !terminal.json {
        eprintln!("{} {}", cyan("◆"), bold(&format!("Reading {}…", document.file_name)));
    }
    let effects = assistant
        .handle(
            LOCAL_USER,
            Inbound::DocumentReceived {
                bytes: document.bytes,
                mime_type: Some("application/pdf".to_string()),
            },
        )
        .await;
    terminal.print(&effects)
}

/// Renders outbound effects and remembers the last menu for numbered input.
struct Terminal {
    json: bool,
    last_menu: Option<MenuSpec>,
}

impl Terminal {
    fn print(&mut self, effects: &[Outbound]) -> Result<()> {
        for effect in effects {
            if self.json {
                println!(
                    "{}",
                    serde_json::to_string(effect).context("Failed to serialise output")?
                );
            } else {
                match effect {
                    Outbound::Text(text) => println!("\n{text}\n"),
                    Outbound::Menu(menu) => {
                        println!("{}", bold(&menu.prompt));
                        for (i, option) in menu.options.iter().enumerate() {
                            println!("  {} {}", cyan(&format!("{:>2})", i + 1)), option.label);
                        }
                    }
                }
            }
            if let Outbound::Menu(menu) = effect {
                self.last_menu = Some(menu.clone());
            }
        }
        Ok(())
    }

    /// Action id of button `n` (1-based) of the last menu.
    fn button(&self, n: usize) -> Option<String> {
        let menu = self.last_menu.as_ref()?;
        menu.options
            .get(n.checked_sub(1)?)
            .map(|o| o.action_id.clone())
    }

    /// Tag a plain action id with the document of the last menu, if any.
    fn resolve_action(&self, action_id: &str) -> String {
        if action_id.contains('@') {
            return action_id.to_string();
        }
        self.last_menu
            .as_ref()
            .and_then(|m| m.options.first())
            .and_then(|o| o.action_id.split_once('@'))
            .map(|(_, doc)| format!("{action_id}@{doc}"))
            .unwrap_or_else(|| action_id.to_string())
    }
}

/// Download pdfium on first run, with a progress bar unless `quiet`.
fn ensure_pdf_engine(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map CLI args to `AssistantConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AssistantConfig> {
    let mut builder = AssistantConfig::builder()
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .message_limit(cli.limit)
        .download_timeout_secs(cli.download_timeout)
        // One user, one process: nothing to evict.
        .session_idle_ttl_secs(None);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
