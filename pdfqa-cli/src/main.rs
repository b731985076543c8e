//! # pdfqa
//!
//! Ask questions about PDF documents from the terminal.
//!
//! ## Commands
//!
//! - `pdfqa ask --pdf <FILE>... --question <TEXT>` - index the PDFs and answer once
//! - `pdfqa chat --pdf <FILE>...` - index the PDFs, then answer questions until `exit`
//!
//! ## Examples
//!
//! ```bash
//! export HUGGINGFACEHUB_API_TOKEN=hf_...
//! pdfqa ask --pdf contract.pdf --question "What is the notice period?"
//!
//! # Smaller chunks, plain similarity search, cited passages
//! pdfqa chat --pdf manual.pdf --chunk-size 800 --chunk-overlap 100 --strategy similarity --cite
//! ```

mod providers;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdfqa_rag::{
    Answer, ErrorKind, ExtractionPolicy, PdfSource, RagConfig, RagError, RagPipeline,
    RetrievalStrategy, VectorIndex,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use providers::{ModelChoice, Provider};
use telemetry::{LogFormat, init_logging};

#[derive(Parser)]
#[command(name = "pdfqa")]
#[command(about = "Ask questions about PDF documents")]
#[command(version)]
struct Cli {
    /// Log format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the PDFs and answer a single question
    Ask {
        #[command(flatten)]
        session: SessionArgs,

        /// The question to answer
        #[arg(short, long)]
        question: String,
    },

    /// Index the PDFs, then answer questions interactively
    Chat {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Similarity,
    Mmr,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
struct SessionArgs {
    /// PDF files to index
    #[arg(short, long = "pdf", required = true, num_args = 1..)]
    pdfs: Vec<PathBuf>,

    /// Hosted service used for embeddings and answers
    #[arg(long, value_enum, default_value_t = Provider::Huggingface)]
    provider: Provider,

    /// Override the embedding model
    #[arg(long)]
    embedding_model: Option<String>,

    /// Override the answering model
    #[arg(long)]
    model: Option<String>,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = 5000)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = 1000)]
    chunk_overlap: usize,

    /// Number of chunks handed to the model
    #[arg(short, default_value_t = 10)]
    k: usize,

    /// Chunk selection strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::Mmr)]
    strategy: StrategyArg,

    /// MMR relevance weight in [0, 1]
    #[arg(long, default_value_t = pdfqa_rag::config::DEFAULT_MMR_LAMBDA)]
    lambda: f32,

    /// MMR candidate pool size
    #[arg(long, default_value_t = pdfqa_rag::config::DEFAULT_MMR_FETCH_K)]
    fetch_k: usize,

    /// Per-request timeout in seconds (0 disables it)
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Ask the model to cite the supporting passage
    #[arg(long)]
    cite: bool,

    /// Skip unreadable PDFs instead of aborting
    #[arg(long)]
    lenient: bool,

    /// Answer output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl SessionArgs {
    fn config(&self) -> pdfqa_rag::Result<RagConfig> {
        let strategy = match self.strategy {
            StrategyArg::Similarity => RetrievalStrategy::Similarity,
            StrategyArg::Mmr => {
                RetrievalStrategy::Mmr { lambda: self.lambda, fetch_k: self.fetch_k }
            }
        };
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.k)
            .strategy(strategy)
            .request_timeout_secs(self.timeout)
            .cite_sources(self.cite)
            .build()
    }

    fn policy(&self) -> ExtractionPolicy {
        if self.lenient { ExtractionPolicy::SkipInvalid } else { ExtractionPolicy::FailFast }
    }

    fn sources(&self) -> Vec<PdfSource> {
        self.pdfs.iter().cloned().map(PdfSource::from).collect()
    }
}

/// An indexed set of PDFs ready to answer questions.
struct Session {
    pipeline: RagPipeline,
    index: VectorIndex,
    format: OutputFormat,
}

impl Session {
    async fn open(args: &SessionArgs) -> anyhow::Result<Self> {
        let config = args.config()?;
        let services = args.provider.connect(&ModelChoice {
            embedding_model: args.embedding_model.clone(),
            chat_model: args.model.clone(),
        })?;

        let pipeline = RagPipeline::builder()
            .config(config)
            .embedding_provider(services.embedder)
            .language_model(services.model)
            .extraction_policy(args.policy())
            .build()?;

        let index = pipeline.build_index(&args.sources()).await?;
        let chunk_count = index.len().await;
        if chunk_count == 0 {
            warn!("no text could be extracted; every answer will report missing context");
        }
        info!(pdf_count = args.pdfs.len(), chunk_count, "documents indexed");

        Ok(Self { pipeline, index, format: args.format })
    }

    async fn ask(&self, question: &str) -> pdfqa_rag::Result<Answer> {
        self.pipeline.ask(question, &self.index).await
    }

    fn print(&self, answer: &Answer) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(answer).context("serializing answer")?);
            }
            OutputFormat::Text => {
                println!("{}", answer.text);
                if self.pipeline.config().cite_sources {
                    for (i, source) in answer.sources.iter().enumerate() {
                        let location = source.chunk.location().unwrap_or_else(|| "unknown".into());
                        println!("  [{}] {location} (score {:.3})", i + 1, source.score);
                    }
                }
            }
        }
        Ok(())
    }
}

/// One-line explanation shown before the error detail.
fn headline(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Extraction => "Could not read a PDF",
        ErrorKind::Config => "Invalid settings",
        ErrorKind::Embedding => "The embedding service failed",
        ErrorKind::Index => "The search index rejected the query",
        ErrorKind::Generation => "The language model failed to answer",
    }
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<RagError>() {
        Some(rag) => eprintln!("{}: {rag}", headline(rag.kind())),
        None => eprintln!("Error: {err:#}"),
    }
}

async fn chat(session: &Session) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().context("failed to open the terminal")?;
    println!("Ask a question about your documents (type `exit` to quit).");

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        let _ = editor.add_history_entry(question);

        // Each question is independent; a failed one does not end the session.
        match session.ask(question).await {
            Ok(answer) => session.print(&answer)?,
            Err(e) => eprintln!("{}: {e}", headline(e.kind())),
        }
    }
    Ok(())
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ask { session, question } => {
            let session = Session::open(&session).await?;
            let answer = session.ask(&question).await?;
            session.print(&answer)
        }
        Command::Chat { session } => {
            let session = Session::open(&session).await?;
            chat(&session).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env file is fine; variables may come from the shell.
    let _ = dotenvy::dotenv();

    if let Err(e) = init_logging(cli.log_format) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn session_flags_map_onto_config() {
        let cli = Cli::parse_from([
            "pdfqa", "ask", "--pdf", "a.pdf", "--pdf", "b.pdf", "-q", "why?", "--chunk-size", "800",
            "--chunk-overlap", "100", "-k", "4", "--strategy", "similarity", "--cite", "--lenient",
        ]);
        let Command::Ask { session, question } = cli.command else { panic!("expected ask") };
        assert_eq!(question, "why?");
        assert_eq!(session.pdfs.len(), 2);

        let config = session.config().unwrap();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.strategy, RetrievalStrategy::Similarity);
        assert!(config.cite_sources);
        assert_eq!(session.policy(), ExtractionPolicy::SkipInvalid);
    }

    #[test]
    fn defaults_follow_the_library_defaults() {
        let cli = Cli::parse_from(["pdfqa", "chat", "--pdf", "a.pdf"]);
        let Command::Chat { session } = cli.command else { panic!("expected chat") };
        assert_eq!(session.config().unwrap(), RagConfig::default());
    }

    #[test]
    fn invalid_overlap_is_reported_as_config_error() {
        let cli = Cli::parse_from([
            "pdfqa", "chat", "--pdf", "a.pdf", "--chunk-size", "100", "--chunk-overlap", "200",
        ]);
        let Command::Chat { session } = cli.command else { panic!("expected chat") };
        assert_eq!(session.config().unwrap_err().kind(), ErrorKind::Config);
    }
}
