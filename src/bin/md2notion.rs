//! CLI binary for md2notion.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `UploadConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2notion::{
    prepare_file, resolve_appender, upload_prepared, ImportError, LimitIssue, PageId,
    PreparedDocument, ProgressCallback, UploadConfig, UploadProgressCallback, DEFAULT_API_BASE,
    DEFAULT_TOKEN_ENV,
};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Limit issues listed in full before collapsing into a count.
const MAX_LISTED_ISSUES: usize = 5;

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the blocks to upload, with a log
/// line per retry, shrink and skip printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_upload_start
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>5}/{len} blocks  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Uploading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl UploadProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, total_blocks: usize, start_offset: usize) {
        self.bar
            .set_length(total_blocks.saturating_sub(start_offset) as u64);
        self.bar.reset_eta();
        let resume = if start_offset > 0 {
            format!(" from block {start_offset}")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Appending {total_blocks} blocks{resume}…"))
        ));
    }

    fn on_batch_complete(&self, cursor: usize, _total: usize, batch_len: usize) {
        self.bar.inc(batch_len as u64);
        self.bar.set_message(dim(&format!("next {cursor}")));
    }

    fn on_retry_wait(&self, offset: usize, wait: Duration, reason: &str) {
        self.bar.println(format!(
            "  {} Batch at {:<6} {}, retrying in {:.1}s",
            yellow("↻"),
            offset,
            reason,
            wait.as_secs_f64()
        ));
    }

    fn on_batch_shrunk(&self, offset: usize, new_batch_size: usize) {
        self.bar.println(format!(
            "  {} Batch at {:<6} rejected, batch size now {}",
            yellow("↓"),
            offset,
            new_batch_size
        ));
    }

    fn on_block_skipped(&self, index: usize, block_type: &str, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Block {:<6} {:<18} {}",
            red("✗"),
            index,
            block_type,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_upload_complete(&self, _appended: usize, _skipped: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Import into a page (token in NOTION_TOKEN)
  md2notion notes.md --page-id https://www.notion.so/Team-Notes-0123456789abcdef0123456789abcdef

  # Preview the blocks without uploading (no token needed)
  md2notion notes.md --dry-run --json > blocks.json

  # Resume an interrupted import at block 350
  md2notion notes.md -p 0123456789abcdef0123456789abcdef --start 350

  # Keep going past blocks Notion refuses
  md2notion notes.md -p 0123456789abcdef0123456789abcdef --skip-bad-blocks

ENVIRONMENT VARIABLES:
  NOTION_TOKEN            Integration token (name configurable with --token-env)
  MD2NOTION_*             Fallback for every flag, e.g. MD2NOTION_PAGE_ID
  RUST_LOG                Override log filter (e.g. md2notion=debug)

  A .env file in the working directory is loaded before flags are parsed.

SETUP:
  1. Create an integration at https://www.notion.so/my-integrations
  2. Share the target page with it (··· → Connections)
  3. export NOTION_TOKEN=secret_...
"#;

/// Import a Markdown file into a Notion page.
#[derive(Parser, Debug)]
#[command(
    name = "md2notion",
    version,
    about = "Import a Markdown file into a Notion page",
    long_about = "Convert a Markdown document into native Notion blocks (headings, lists, \
to-dos, code, tables, callouts, equations) and append them to an existing page, in \
batches that respect Notion's request limits and recover from rate limiting.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to import.
    input: PathBuf,

    /// Target page: 32-hex id, UUID, or page URL.
    #[arg(short, long, env = "MD2NOTION_PAGE_ID", required_unless_present = "dry_run")]
    page_id: Option<String>,

    /// Environment variable holding the integration token.
    #[arg(long, env = "MD2NOTION_TOKEN_ENV", default_value = DEFAULT_TOKEN_ENV)]
    token_env: String,

    /// Blocks per request (1–100).
    #[arg(long, env = "MD2NOTION_BATCH_SIZE", default_value_t = 50,
          value_parser = clap::value_parser!(u16).range(1..=100))]
    batch_size: u16,

    /// Pause after each successful request, in seconds.
    #[arg(long, env = "MD2NOTION_SLEEP", default_value_t = 0.35)]
    sleep: f64,

    /// Index of the first block to upload (resume point).
    #[arg(long, env = "MD2NOTION_START", default_value_t = 0)]
    start: usize,

    /// Retries per batch position before giving up.
    #[arg(long, env = "MD2NOTION_MAX_RETRIES", default_value_t = 6)]
    max_retries: u32,

    /// Skip a single block Notion rejects instead of aborting.
    #[arg(long, env = "MD2NOTION_SKIP_BAD_BLOCKS")]
    skip_bad_blocks: bool,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "MD2NOTION_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Notion API base URL.
    #[arg(long, env = "MD2NOTION_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Convert only; print a summary (or the blocks with --json) and exit.
    #[arg(long)]
    dry_run: bool,

    /// Print JSON on stdout: the blocks with --dry-run, else the import report.
    #[arg(long, env = "MD2NOTION_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2NOTION_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2NOTION_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2NOTION_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before parsing so MD2NOTION_* fallbacks can come from .env.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dry_run;
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

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let doc = prepare_file(&cli.input)
            .with_context(|| format!("Failed to read {}", cli.input.display()))?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&doc.blocks).context("Failed to serialise blocks")?
            );
        }
        if !cli.quiet {
            print_preparation(&doc);
            print_block_summary(&doc);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    // Everything that can fail without the network is checked first.
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn UploadProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let page_arg = cli
        .page_id
        .as_deref()
        .context("--page-id is required unless --dry-run is given")?;
    let page = PageId::parse(page_arg)?;
    let appender = resolve_appender(&config)?;

    let doc = prepare_file(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    if !cli.quiet {
        print_preparation(&doc);
        eprintln!(
            "{} {} blocks → page {}",
            cyan("◆"),
            bold(&doc.blocks.len().to_string()),
            page
        );
    }

    // ── Upload ───────────────────────────────────────────────────────────
    let output = match upload_prepared(appender.as_ref(), &page, doc, &config).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(offset) = resume_offset(&e) {
                eprintln!(
                    "{} Upload stopped at block {}. Resume with {}",
                    red("✘"),
                    offset,
                    bold(&format!("--start {offset}"))
                );
            }
            return Err(e).context("Import failed");
        }
    };

    let report = &output.upload;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise report")?
        );
    }
    if !cli.quiet {
        eprintln!(
            "{}  {} blocks appended  {} skipped  {} requests  {} retries  {}ms",
            if report.skipped.is_empty() {
                green("✔")
            } else {
                yellow("⚠")
            },
            bold(&report.appended.to_string()),
            report.skipped.len(),
            report.requests,
            report.retries,
            report.duration_ms,
        );
        for skipped in &report.skipped {
            eprintln!(
                "   {} block {} ({}): {}",
                red("✗"),
                skipped.index,
                skipped.block_type,
                dim(&skipped.reason)
            );
        }
        if report.start_offset > 0 {
            eprintln!("   {}", dim(&format!("started at block {}", report.start_offset)));
        }
    }

    Ok(())
}

/// Map CLI args to `UploadConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<UploadConfig> {
    let mut builder = UploadConfig::builder()
        .batch_size(cli.batch_size as usize)
        .pacing_delay_secs(cli.sleep)
        .start_offset(cli.start)
        .max_retries(cli.max_retries)
        .skip_bad_blocks(cli.skip_bad_blocks)
        .request_timeout_secs(cli.request_timeout)
        .api_base_url(cli.api_base.clone())
        .token_env(cli.token_env.clone());

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Block index an aborted upload can be resumed from.
fn resume_offset(err: &ImportError) -> Option<usize> {
    match err {
        ImportError::RetriesExhausted { offset, .. } | ImportError::Api { offset, .. } => {
            Some(*offset)
        }
        ImportError::BadBlock { index, .. } => Some(*index),
        _ => None,
    }
}

/// Print limit diagnostics from conversion and sanitising.
fn print_preparation(doc: &PreparedDocument) {
    if !doc.conversion_issues.is_empty() {
        eprintln!(
            "{} {} limit issues in converted blocks",
            yellow("⚠"),
            doc.conversion_issues.len()
        );
        print_issues(&doc.conversion_issues);
    }
    if doc.sanitize.runs_split > 0 {
        eprintln!(
            "{} split {} long text runs into {}",
            green("✓"),
            doc.sanitize.runs_split,
            doc.sanitize.chunks_created
        );
    }
    if !doc.sanitize.remaining_issues.is_empty() {
        eprintln!(
            "{} {} limit issues remain after sanitising",
            red("✗"),
            doc.sanitize.remaining_issues.len()
        );
        print_issues(&doc.sanitize.remaining_issues);
    }
}

fn print_issues(issues: &[LimitIssue]) {
    for issue in issues.iter().take(MAX_LISTED_ISSUES) {
        eprintln!("   {}", dim(&issue.to_string()));
    }
    if issues.len() > MAX_LISTED_ISSUES {
        eprintln!(
            "   {}",
            dim(&format!("… and {} more", issues.len() - MAX_LISTED_ISSUES))
        );
    }
}

/// Per-type block counts for `--dry-run`.
fn print_block_summary(doc: &PreparedDocument) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for block in &doc.blocks {
        *counts
            .entry(md2notion::pipeline::blocks::block_type(block))
            .or_default() += 1;
    }
    eprintln!(
        "{} {} top-level blocks",
        cyan("◆"),
        bold(&doc.blocks.len().to_string())
    );
    for (kind, n) in counts {
        eprintln!("   {:<20} {}", kind, n);
    }
}
