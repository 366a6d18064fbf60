//! Replay a conversation through a memory block and print what it remembers.
//!
//! Messages are read as JSON lines, either the short `{"role", "content"}`
//! form or full `ChatMessage` objects. The summarizer is reached through
//! OpenRouter with the key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Condense a transcript into at most 2000 tokens of fragments
//! cinch-memory transcript.jsonl --token-limit 2000
//!
//! # Extract propositions, ingesting four messages per batch
//! cat transcript.jsonl | cinch-memory --strategy proposition \
//!   --max-propositions 20 --batch 4
//!
//! # Settings from a file, overrides from flags, stats on stderr
//! cinch-memory transcript.jsonl --config memory.json --model openai/gpt-4.1 --stats -v
//! ```

use cinch_memory::prelude::*;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Replay a conversation through a bounded memory block.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "cinch-memory")]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// JSON-lines transcript to ingest (reads stdin when omitted)
    input: Option<PathBuf>,

    /// JSON config file (see `MemoryConfig`); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    // ── Block ──────────────────────────────────────────────────
    /// Compaction strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Block name used in logs and stats
    #[arg(long)]
    name: Option<String>,

    /// Condensed: budget for the rendered memory
    #[arg(long)]
    token_limit: Option<usize>,

    /// Condensed: character budget per summarized text block
    #[arg(long)]
    max_summary_chars: Option<usize>,

    /// Proposition: maximum number of stored propositions
    #[arg(long)]
    max_propositions: Option<usize>,

    /// Measure the token limit in characters instead of estimated tokens
    #[arg(long)]
    chars: bool,

    // ── Summarizer ─────────────────────────────────────────────
    /// Model used for summarization and extraction
    #[arg(long)]
    model: Option<String>,

    /// Seconds allowed per summarizer call, retries included
    #[arg(long)]
    timeout: Option<u64>,

    // ── Ingestion & output ─────────────────────────────────────
    /// Messages per ingest call (0 = whole transcript at once)
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Print the block's stats line to stderr
    #[arg(long)]
    stats: bool,

    /// Proposition: print the known-propositions preamble instead of the raw list
    #[arg(long)]
    preamble: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Condensed,
    Proposition,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Condensed => Strategy::Condensed,
            StrategyArg::Proposition => Strategy::Proposition,
        }
    }
}

/// Load the config file (or defaults) and layer the CLI flags on top.
fn resolve_config(cli: &Cli) -> Result<MemoryConfig, String> {
    let mut config = match &cli.config {
        Some(path) => MemoryConfig::from_file(path)?,
        None => MemoryConfig::default(),
    };

    if let Some(strategy) = cli.strategy {
        config.block.strategy = strategy.into();
    }
    if let Some(name) = &cli.name {
        config.block.name = name.clone();
    }
    if let Some(limit) = cli.token_limit {
        config.block.condensed.token_limit = limit;
    }
    if let Some(chars) = cli.max_summary_chars {
        config.block.condensed.max_summary_chars = chars;
    }
    if let Some(max) = cli.max_propositions {
        config.block.proposition.max_propositions = max;
    }
    if cli.chars {
        config.meter = MeterKind::Chars;
    }
    if let Some(model) = &cli.model {
        config.summarizer.model = model.clone();
    }
    if let Some(secs) = cli.timeout {
        config.summarizer.timeout_secs = secs;
    }

    Ok(config)
}

/// Parse a JSON-lines transcript. Blank lines are skipped; errors carry the
/// 1-based line number.
fn parse_messages(text: &str) -> Result<Vec<ChatMessage>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<ChatMessage>(line)
                .map_err(|e| format!("invalid message on line {}: {e}", i + 1))
        })
        .collect()
}

fn read_input(path: Option<&Path>) -> Result<String, String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("Failed to read stdin: {e}"))?;
            Ok(buf)
        }
    }
}

async fn run(cli: &Cli) -> Result<String, String> {
    let config = resolve_config(cli)?;
    let messages = parse_messages(&read_input(cli.input.as_deref())?)?;
    debug!(
        "Loaded {} messages into {} block '{}'",
        messages.len(),
        config.block.strategy,
        config.block.name
    );

    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "OPENROUTER_KEY environment variable is not set".to_string())?;
    let client = OpenRouterClient::new(api_key)?;
    let summarizer: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::new(
        client,
        config.summarizer.to_summarizer_config(),
    ));

    let mut block = MemoryBlockKind::from_config(&config.block, summarizer, config.build_meter());

    let chunk = if cli.batch == 0 {
        messages.len().max(1)
    } else {
        cli.batch
    };
    for batch in messages.chunks(chunk) {
        block.ingest(batch).await;
        debug!("{}", block.stats().to_log_string());
    }

    let stats = block.stats();
    info!("{}", stats.to_log_string());
    if cli.stats {
        eprintln!("{}", stats.to_log_string());
    }

    let output = match &block {
        MemoryBlockKind::Proposition(b) if cli.preamble => {
            b.known_propositions_preamble().unwrap_or_default()
        }
        _ => block.render(),
    };
    Ok(output)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(output) => {
            if output.is_empty() {
                return;
            }
            if output.ends_with('\n') {
                print!("{output}");
            } else {
                println!("{output}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_messages_accepts_short_and_full_forms() {
        let text = r#"{"role": "user", "content": "hello"}

{"role": "assistant", "content": [{"type": "text", "text": "hi"}], "tool_calls": [{"name": "search", "arguments": "{}"}]}
"#;
        let messages = parse_messages(text).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text(), "hello");
        assert_eq!(messages[1].text(), "hi");
        assert_eq!(messages[1].tool_calls.len(), 1);
    }

    #[test]
    fn parse_messages_reports_line_number() {
        let text = "{\"role\": \"user\", \"content\": \"ok\"}\n\nnot json\n";
        let err = parse_messages(text).unwrap_err();
        assert!(err.contains("line 3"), "{err}");
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "cinch-memory",
            "--strategy",
            "proposition",
            "--max-propositions",
            "7",
            "--model",
            "test/model",
            "--chars",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.block.strategy, Strategy::Proposition);
        assert_eq!(config.block.proposition.max_propositions, 7);
        assert_eq!(config.summarizer.model, "test/model");
        assert_eq!(config.meter, MeterKind::Chars);
        assert_eq!(config.block.condensed.token_limit, 50_000);
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(
            &path,
            r#"{"block": {"name": "file", "condensed": {"token_limit": 900}}}"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "cinch-memory",
            "--config",
            path.to_str().unwrap(),
            "--token-limit",
            "300",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.block.name, "file");
        assert_eq!(config.block.condensed.token_limit, 300);
    }
}
