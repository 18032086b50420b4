use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use docent_core::{
    BuildStats, DocentConfig, DocentError, OutputFormat, Provider, QueryOutcome,
    RetrievalFailure, RetrievalStrategy,
};
use docent_index::builder::IndexBuilder;
use docent_index::cache::IndexCache;
use docent_index::embedding::{Embedder, EmbeddingClient};
use docent_index::store::Index;
use docent_ingest::extract::DefaultExtractor;
use docent_ingest::walker::walk_docs;
use docent_retrieve::context::ContextAssembler;
use docent_retrieve::llm::LlmClient;
use docent_retrieve::pipeline::{self, QueryPipeline};
use docent_retrieve::retriever::{RetrievalParams, RetrieverStrategy};

const CONFIG_FILE: &str = ".docent.toml";

#[derive(Parser)]
#[command(
    name = "docent",
    version,
    about = "Question answering over your organization's documents",
    long_about = "Docent indexes a folder of internal documents and answers questions from them.\n\n\
                   Documents are split into section-aware passages, embedded, and stored in a\n\
                   single index file. Queries fuse semantic similarity with keyword overlap and\n\
                   return a budgeted, citation-labelled context for a language model.\n\n\
                   Examples:\n  \
                     docent init                          Create a .docent.toml config file\n  \
                     docent build --docs ./handbook       Index a documents folder\n  \
                     docent query 'parental leave'        Show the retrieved passages\n  \
                     docent ask 'How do I expense travel?'  Answer with cited sources\n  \
                     docent doctor                        Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .docent.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Build the index from a documents folder
    #[command(long_about = "Build the index from a documents folder.\n\n\
        Walks the folder for PDF, DOCX, PPTX, TXT, MD and CSV files, extracts and chunks\n\
        their text, embeds every chunk, and atomically replaces the index file.\n\
        Unreadable documents are skipped and reported; an existing index is left\n\
        untouched if the build fails.\n\n\
        Examples:\n  docent build\n  docent build --docs ./policies --out .docent/policies.json")]
    Build {
        /// Documents folder (default: ingest.docs_dir)
        #[arg(long)]
        docs: Option<PathBuf>,

        /// Index file to write (default: ingest.index_path)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Retrieve passages and print the assembled context
    #[command(long_about = "Retrieve passages and print the assembled context.\n\n\
        Prints the ranked passages and the budgeted context block that would be\n\
        handed to a language model. With --format json, failures are reported as\n\
        {\"error\": {\"kind\", \"message\"}}.\n\n\
        Examples:\n  docent query 'vpn token reset'\n  docent query 'travel per diem' --top-k 3 --neighbors 0 --format json")]
    Query {
        /// Natural-language question
        question: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
    /// Answer a question from the indexed documents
    #[command(long_about = "Answer a question from the indexed documents.\n\n\
        Retrieves passages like `docent query`, then asks the configured LLM to answer\n\
        using only those passages and to cite them. Requires an LLM endpoint.\n\n\
        Examples:\n  docent ask 'How many vacation days do new hires get?'")]
    Ask {
        /// Natural-language question
        question: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
    /// Show statistics about an index file
    Stats {
        /// Index file (default: ingest.index_path)
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Create a default .docent.toml configuration file
    #[command(long_about = "Create a default .docent.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .docent.toml already exists.")]
    Init,
    /// Check your Docent setup and environment
    #[command(long_about = "Check your Docent setup and environment.\n\n\
        Runs diagnostics for the config file, documents folder, embedding and LLM\n\
        API keys, PDF extraction, and the index file. Use --format json for\n\
        machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Per-invocation overrides of the `[retrieval]` and `[context]` settings.
#[derive(Args)]
struct RetrievalArgs {
    /// Index file (default: ingest.index_path)
    #[arg(long)]
    index: Option<PathBuf>,

    /// Passages selected before neighbor expansion
    #[arg(long)]
    top_k: Option<usize>,

    /// Adjacent chunks pulled in on each side of a hit
    #[arg(long)]
    neighbors: Option<usize>,

    /// Semantic weight in [0, 1]; keyword weight is 1 - alpha
    #[arg(long)]
    alpha: Option<f64>,

    /// Context budget, in the configured unit
    #[arg(long)]
    budget: Option<usize>,
}

impl RetrievalArgs {
    fn apply(&self, config: &mut DocentConfig) -> std::result::Result<(), DocentError> {
        if let Some(index) = &self.index {
            config.ingest.index_path = index.clone();
        }
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(neighbors) = self.neighbors {
            config.retrieval.neighbor_window = neighbors;
        }
        if let Some(alpha) = self.alpha {
            config.retrieval.alpha = alpha;
        }
        if let Some(budget) = self.budget {
            config.context.budget = budget;
        }
        config.validate()
    }
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mdocent\x1b[0m v{version}: answers from your own documents\n");

        println!("Quick start:");
        println!("  \x1b[36mdocent init\x1b[0m                 Create a .docent.toml config file");
        println!("  \x1b[36mdocent build --docs ./docs\x1b[0m  Index a documents folder");
        println!("  \x1b[36mdocent ask 'question'\x1b[0m       Answer with cited sources\n");

        println!("All commands:");
        println!("  \x1b[32mbuild\x1b[0m   Extract, chunk, and embed documents into an index");
        println!("  \x1b[32mquery\x1b[0m   Show ranked passages and the assembled context");
        println!("  \x1b[32mask\x1b[0m     Answer a question with an LLM");
        println!("  \x1b[32mstats\x1b[0m   Describe an index file");
        println!("  \x1b[32mdoctor\x1b[0m  Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m    Create default configuration\n");
    } else {
        println!("docent v{version}: answers from your own documents\n");

        println!("Quick start:");
        println!("  docent init                 Create a .docent.toml config file");
        println!("  docent build --docs ./docs  Index a documents folder");
        println!("  docent ask 'question'       Answer with cited sources\n");

        println!("All commands:");
        println!("  build   Extract, chunk, and embed documents into an index");
        println!("  query   Show ranked passages and the assembled context");
        println!("  ask     Answer a question with an LLM");
        println!("  stats   Describe an index file");
        println!("  doctor  Check your setup and environment");
        println!("  init    Create default configuration\n");
    }

    println!("Run 'docent <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("warn,docent=debug,docent_core=debug,docent_ingest=debug,docent_index=debug,docent_retrieve=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<DocentConfig> {
    match path {
        Some(path) => Ok(DocentConfig::from_file(path)?),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                Ok(DocentConfig::from_file(default_path)?)
            } else {
                Ok(DocentConfig::default())
            }
        }
    }
}

/// Render a failure: a JSON error object on stdout in JSON mode, a
/// diagnostic otherwise. Either way the process exits non-zero.
fn report_failure(format: OutputFormat, failure: RetrievalFailure) -> Result<()> {
    if format == OutputFormat::Json {
        let json = serde_json::json!({ "error": failure });
        println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        std::process::exit(1);
    }
    miette::bail!("{failure}")
}

fn progress_enabled(format: OutputFormat) -> bool {
    format != OutputFormat::Json && std::io::stderr().is_terminal()
}

async fn build_index(
    config: &DocentConfig,
    docs_dir: &Path,
    out_file: &Path,
    progress: bool,
) -> std::result::Result<BuildStats, DocentError> {
    let client = EmbeddingClient::with_config(&config.embedding)?;
    let builder = IndexBuilder::new(
        Embedder::from_config(client, &config.embedding),
        DefaultExtractor::from_config(&config.ingest),
        config.chunking.clone(),
    )
    .with_exclude(config.ingest.exclude.clone())
    .with_progress(progress);
    builder.build(docs_dir, out_file).await
}

async fn run_query(
    config: &DocentConfig,
    question: &str,
) -> std::result::Result<QueryOutcome, RetrievalFailure> {
    let retriever = RetrieverStrategy::from_config(config, || {
        EmbeddingClient::with_config(&config.embedding)
    })?;
    let pipeline = QueryPipeline::new(
        retriever,
        RetrievalParams::from_config(&config.retrieval),
        ContextAssembler::from_config(&config.context),
    );
    let cache = IndexCache::new(&config.ingest.index_path);
    pipeline.query_path(&cache, question).await
}

fn print_build_stats(stats: &BuildStats, out_file: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stats).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("## Index built\n");
            println!("| Files | Chunks | Dimension | Skipped |");
            println!("|---|---|---|---|");
            println!(
                "| {} | {} | {} | {} |",
                stats.file_count,
                stats.chunk_count,
                stats.dim,
                stats.skipped.len()
            );
            if !stats.skipped.is_empty() {
                println!("\n### Skipped\n");
                for skipped in &stats.skipped {
                    println!("- `{}`: {}", skipped.path.display(), skipped.reason);
                }
            }
            println!("\nWritten to `{}`", out_file.display());
        }
        OutputFormat::Text => {
            println!(
                "Indexed {} files into {} chunks (dimension {})",
                stats.file_count, stats.chunk_count, stats.dim
            );
            for skipped in &stats.skipped {
                println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
            }
            println!("Written to {}", out_file.display());
        }
    }
    Ok(())
}

fn print_outcome(outcome: &QueryOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if outcome.hits.is_empty() {
                println!("_No matching passages._");
                return Ok(());
            }
            println!("## Passages\n");
            println!("| # | Source | Score | Neighbor |");
            println!("|---|---|---|---|");
            for hit in &outcome.hits {
                println!(
                    "| {} | {} | {:.3} | {} |",
                    hit.rank,
                    hit.chunk.label(),
                    hit.score,
                    if hit.neighbor { "yes" } else { "" }
                );
            }
            println!("\n## Context\n\n```text\n{}\n```", outcome.context);
        }
        OutputFormat::Text => {
            if outcome.hits.is_empty() {
                println!("No matching passages.");
                return Ok(());
            }
            for hit in &outcome.hits {
                let neighbor = if hit.neighbor { "  (neighbor)" } else { "" };
                println!(
                    "{:>3}. {}  score {:.3}{neighbor}",
                    hit.rank,
                    hit.chunk.label(),
                    hit.score
                );
            }
            println!("\n{}", outcome.context);
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn api_key_check(
    name: &'static str,
    section: &str,
    provider: Provider,
    configured: Option<&str>,
) -> CheckResult {
    let Some(var) = provider.api_key_env() else {
        return CheckResult::pass(name, format!("{provider} needs no API key"));
    };
    if configured.is_some() {
        CheckResult::pass(name, format!("api_key set in [{section}]"))
    } else if std::env::var(var).is_ok() {
        CheckResult::pass(name, format!("{var} set"))
    } else {
        CheckResult::fail(
            name,
            format!("{var} not set"),
            format!("export {var}=... or set api_key in .docent.toml [{section}]"),
        )
    }
}

fn on_path(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).is_file();
    }
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
    })
}

fn run_doctor(
    config: &DocentConfig,
    config_path: &Path,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    if config_path.exists() {
        checks.push(CheckResult::pass(
            "config_file",
            format!("{} found", config_path.display()),
        ));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            format!("{} not found (using defaults)", config_path.display()),
            "run 'docent init' to create a default config",
        ));
    }

    // 2. Documents folder
    let docs_dir = &config.ingest.docs_dir;
    match walk_docs(docs_dir, &config.ingest.exclude) {
        Ok(files) if files.is_empty() => checks.push(CheckResult::fail(
            "docs_dir",
            format!("{} has no indexable files", docs_dir.display()),
            "add pdf, docx, pptx, txt, md or csv files",
        )),
        Ok(files) => checks.push(CheckResult::pass(
            "docs_dir",
            format!("{} ({} indexable files)", docs_dir.display(), files.len()),
        )),
        Err(err) => checks.push(CheckResult::fail(
            "docs_dir",
            err.to_string(),
            "create the folder or set ingest.docs_dir in .docent.toml",
        )),
    }

    // 3. Embedding provider + API key
    let emb = &config.embedding;
    checks.push(CheckResult::pass(
        "embedding_provider",
        format!("{} (model: {})", emb.provider, emb.model),
    ));
    checks.push(api_key_check(
        "embedding_api_key",
        "embedding",
        emb.provider,
        emb.api_key.as_deref(),
    ));

    // 4. LLM provider + API key
    let llm = &config.llm;
    checks.push(CheckResult::pass(
        "llm_provider",
        format!("{} (model: {})", llm.provider, llm.model),
    ));
    checks.push(api_key_check(
        "llm_api_key",
        "llm",
        llm.provider,
        llm.api_key.as_deref(),
    ));

    // 5. PDF extraction
    match config.ingest.pdf_command.first() {
        Some(program) if on_path(program) => {
            checks.push(CheckResult::pass("pdf_extractor", format!("{program} available")));
        }
        Some(program) => checks.push(CheckResult::info(
            "pdf_extractor",
            format!("{program} not found; PDF files will be skipped"),
        )),
        None => checks.push(CheckResult::info(
            "pdf_extractor",
            "no pdf_command configured; PDF files will be skipped",
        )),
    }

    // 6. Retrieval strategy
    match config.retrieval.strategy {
        RetrievalStrategy::Hybrid => checks.push(CheckResult::info(
            "retrieval_strategy",
            format!(
                "hybrid (top_k {}, alpha {}, neighbors {})",
                config.retrieval.top_k, config.retrieval.alpha, config.retrieval.neighbor_window
            ),
        )),
        RetrievalStrategy::Subprocess => {
            let command = config
                .retrieval
                .subprocess
                .as_ref()
                .map(|s| s.command.join(" "))
                .unwrap_or_default();
            checks.push(CheckResult::info(
                "retrieval_strategy",
                format!("subprocess ({command})"),
            ));
        }
    }

    // 7. Index file
    let index_path = &config.ingest.index_path;
    if index_path.exists() {
        match Index::load(index_path) {
            Ok(index) if index.model() != emb.model => checks.push(CheckResult::fail(
                "index",
                format!(
                    "built with {} but {} is configured",
                    index.model(),
                    emb.model
                ),
                "run 'docent build' to rebuild the index",
            )),
            Ok(index) => {
                let stats = index.stats();
                checks.push(CheckResult::pass(
                    "index",
                    format!(
                        "{} chunks from {} documents (built {})",
                        stats.chunk_count,
                        stats.document_count,
                        stats.created_at.format("%Y-%m-%d %H:%M UTC")
                    ),
                ));
            }
            Err(err) => checks.push(CheckResult::fail(
                "index",
                err.to_string(),
                "run 'docent build' to rebuild the index",
            )),
        }
    } else {
        checks.push(CheckResult::info(
            "index",
            format!("{} not found (run 'docent build' to create)", index_path.display()),
        ));
    }

    // Output
    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("Docent v{version}: environment check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Docent Configuration

[ingest]
# docs_dir = "docs"
# index_path = ".docent/index.json"
# exclude = ["drafts/**", "*.tmp.md"]
# extract_timeout_secs = 60
# pdf_command = ["pdftotext", "-layout", "{path}", "-"]

[chunking]
# target_chars = 1200
# overlap_chars = 200
# min_chars = 40

[embedding]
# OpenAI-compatible /v1/embeddings endpoint; api_key falls back to OPENAI_API_KEY
# provider = "openai"      # or "ollama" (no key, http://localhost:11434)
# model = "text-embedding-3-small"
# base_url = "https://api.openai.com"
# batch_size = 32
# max_attempts = 5
# base_delay_ms = 500
# timeout_secs = 60

[retrieval]
# strategy = "hybrid"      # or "subprocess"
# top_k = 6
# neighbor_window = 1
# alpha = 0.7              # semantic weight; keyword weight is 1 - alpha
# mmr_lambda = 0.6
# candidate_pool = 40
# slack = 2

# External retriever, used when strategy = "subprocess"
# [retrieval.subprocess]
# command = ["python3", "rank.py"]
# timeout_secs = 30

[context]
# budget = 12000
# unit = "chars"           # or "tokens"
# min_truncate_chars = 200

[llm]
# OpenAI-compatible /v1/chat/completions endpoint, used by 'docent ask'
# provider = "openai"      # or "ollama"
# model = "gpt-4o-mini"
# base_url = "https://api.openai.com"
# temperature = 0.1
# timeout_secs = 120
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = cli.format;
    let mut config = load_config(cli.config.as_deref())?;

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    tracing::debug!(%format, docs_dir = %config.ingest.docs_dir.display(), "configuration loaded");

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Build { docs, out }) => {
            let docs_dir = docs.unwrap_or_else(|| config.ingest.docs_dir.clone());
            let out_file = out.unwrap_or_else(|| config.ingest.index_path.clone());
            match build_index(&config, &docs_dir, &out_file, progress_enabled(format)).await {
                Ok(stats) => print_build_stats(&stats, &out_file, format)?,
                Err(err) => {
                    if format == OutputFormat::Json {
                        return report_failure(format, err.into());
                    }
                    return Err(err.into());
                }
            }
        }
        Some(Command::Query {
            question,
            retrieval,
        }) => {
            if let Err(err) = retrieval.apply(&mut config) {
                return report_failure(format, err.into());
            }
            match run_query(&config, &question).await {
                Ok(outcome) => print_outcome(&outcome, format)?,
                Err(failure) => return report_failure(format, failure),
            }
        }
        Some(Command::Ask {
            question,
            retrieval,
        }) => {
            if let Err(err) = retrieval.apply(&mut config) {
                return report_failure(format, err.into());
            }
            let outcome = match run_query(&config, &question).await {
                Ok(outcome) => outcome,
                Err(failure) => return report_failure(format, failure),
            };
            let llm = LlmClient::new(&config.llm)?;

            let spinner = if progress_enabled(format) {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
                );
                pb.set_message("Generating answer...");
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let answer = match pipeline::answer(&llm, &outcome, &question).await {
                Ok(answer) => answer,
                Err(err) => {
                    if let Some(pb) = &spinner {
                        pb.finish_with_message("Failed");
                    }
                    return report_failure(format, err.into());
                }
            };
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&answer).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("{}\n", answer.answer);
                    if !answer.sources.is_empty() {
                        println!("**Sources:**\n");
                        for source in &answer.sources {
                            println!("- {source}");
                        }
                    }
                }
                OutputFormat::Text => {
                    println!("{}", answer.answer);
                    if !answer.sources.is_empty() {
                        println!("\nSources:");
                        for source in &answer.sources {
                            println!("  - {source}");
                        }
                    }
                }
            }
        }
        Some(Command::Stats { index }) => {
            let path = index.unwrap_or_else(|| config.ingest.index_path.clone());
            let stats = match Index::load(&path) {
                Ok(index) => index.stats(),
                Err(err) => {
                    if format == OutputFormat::Json {
                        return report_failure(format, err.into());
                    }
                    return Err(err.into());
                }
            };
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    println!("| Model | Dimension | Chunks | Documents | Built | Docs folder |");
                    println!("|---|---|---|---|---|---|");
                    println!(
                        "| {} | {} | {} | {} | {} | `{}` |",
                        stats.model,
                        stats.dim,
                        stats.chunk_count,
                        stats.document_count,
                        stats.created_at.to_rfc3339(),
                        stats.docs_dir
                    );
                }
                OutputFormat::Text => {
                    println!("Index:      {}", path.display());
                    println!("Model:      {} (dimension {})", stats.model, stats.dim);
                    println!("Chunks:     {}", stats.chunk_count);
                    println!("Documents:  {}", stats.document_count);
                    println!("Built:      {}", stats.created_at.to_rfc3339());
                    println!("Docs dir:   {}", stats.docs_dir);
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
            run_doctor(&config, &config_path, format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "docent", &mut std::io::stdout());
        }
    }

    Ok(())
}
