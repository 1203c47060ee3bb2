use chrono::Utc;
use clap::{Parser, Subcommand};
use paper_qa_core::{
    split_context, Action, ChunkingConfig, DisplayEvent, DisplaySurface, HttpSessionController,
    Phase, SessionConfig, SessionState,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "paper-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Answer generation endpoint accepting `{"prompt": ...}`
    #[arg(long, env = "PAPER_QA_ANSWER_URL")]
    answer_url: String,

    /// Bearer token for the answer endpoint
    #[arg(long, env = "PAPER_QA_ANSWER_API_KEY", hide_env_values = true)]
    answer_api_key: Option<String>,

    /// Paper search endpoint
    #[arg(long, env = "PAPER_QA_SEARCH_URL", default_value = paper_qa_core::config::DEFAULT_SEARCH_ENDPOINT)]
    search_url: String,

    /// Number of search results to request
    #[arg(long, default_value = "20")]
    search_limit: usize,

    /// Number of valid PDFs to keep per search
    #[arg(long, default_value = "1")]
    target_documents: usize,

    /// Number of pages retrieved per question
    #[arg(long, default_value = "5")]
    top_k: usize,

    /// Timeout for each PDF download and search request, in seconds
    #[arg(long, default_value = "30")]
    download_timeout_secs: u64,

    /// Timeout for the answer request, in seconds
    #[arg(long, default_value = "120")]
    answer_timeout_secs: u64,

    /// Longest text unit in characters; longer pages are split
    #[arg(long, default_value = "4000")]
    unit_max_chars: usize,

    /// Characters shared by consecutive pieces of a split page
    #[arg(long, default_value = "200")]
    unit_overlap_chars: usize,

    /// Directory for session downloads; the system temp dir when unset
    #[arg(long, env = "PAPER_QA_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session reading commands from stdin.
    Session,
    /// Search (or load local PDFs), index and answer one question.
    Ask {
        /// Topic to search papers for.
        #[arg(long, required_unless_present = "pdf")]
        topic: Option<String>,
        /// Local PDF files or folders to use instead of searching.
        #[arg(long, conflicts_with = "topic")]
        pdf: Vec<PathBuf>,
        /// Question to answer from the retrieved pages.
        #[arg(long)]
        question: String,
        /// Print the retrieved context after the answer.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(self.answer_url.clone());
        config.answer_api_key = self.answer_api_key.clone();
        config.answer_timeout = Duration::from_secs(self.answer_timeout_secs);
        config.search_endpoint = self.search_url.clone();
        config.search_limit = self.search_limit;
        config.download_timeout = Duration::from_secs(self.download_timeout_secs);
        config.target_documents = self.target_documents;
        config.top_k = self.top_k;
        config.chunking = ChunkingConfig {
            max_chars: self.unit_max_chars,
            overlap_chars: self.unit_overlap_chars,
        };
        config.download_root = self.download_dir.clone();
        config
    }
}

/// Prints session events to stdout.
struct Terminal {
    show_context: bool,
}

impl DisplaySurface for Terminal {
    fn render(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::Phase(phase) => match phase {
                Phase::Searching => println!("Downloading PDFs, please wait..."),
                Phase::Indexing => println!("Processing, please wait..."),
                Phase::Answering => println!("Generating answer, please wait..."),
                other => println!("[{other}]"),
            },
            DisplayEvent::Ignored { action, phase } => {
                println!("`{action}` is not available while the session is {phase}");
            }
            DisplayEvent::SearchFailed(reason) => println!("search failed: {reason}"),
            DisplayEvent::CandidatesFound { total, with_pdf } => {
                println!("{total} candidates found, {with_pdf} with a pdf link");
            }
            DisplayEvent::AcquisitionFailures(failures) => {
                println!("{} downloads skipped", failures.len());
                for failure in failures {
                    println!("  {failure}");
                }
            }
            DisplayEvent::AcquisitionAborted(reason) => {
                println!("acquisition stopped early: {reason}");
            }
            DisplayEvent::Documents(documents) => {
                if documents.is_empty() {
                    println!("no documents");
                }
                for document in documents {
                    println!(
                        "  {} {} ({} bytes) {}",
                        document.document_id, document.title, document.byte_length, document.source
                    );
                }
            }
            DisplayEvent::ExtractionErrors(errors) => {
                for error in errors {
                    println!("An error occurred while processing the PDF: {error}");
                }
            }
            DisplayEvent::IndexBuilt { documents, units } => {
                println!("indexed {units} pages from {documents} documents");
            }
            DisplayEvent::IndexFailed(reason) => println!("indexing failed: {reason}"),
            DisplayEvent::Retrieved(units) => {
                for retrieved in units {
                    info!(
                        unit = %retrieved.unit.label(),
                        page = retrieved.unit.page,
                        score = retrieved.score,
                        "retrieved"
                    );
                }
            }
            DisplayEvent::Answer(answer) => println!("Answer:\n{answer}"),
            DisplayEvent::AnswerFailed(reason) => println!("Error: unable to get an answer. {reason}"),
            DisplayEvent::Context(context) => {
                if self.show_context {
                    for (index, unit) in split_context(&context).iter().enumerate() {
                        println!("--- context {} ---\n{unit}", index + 1);
                    }
                }
            }
            DisplayEvent::Reset {
                discarded_documents,
            } => println!("session reset, {discarded_documents} documents discarded"),
        }
    }
}

enum Input {
    Action(Action),
    Context(bool),
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let input = match command.to_lowercase().as_str() {
        "search" => Input::Action(Action::Search(rest.to_string())),
        "load" => Input::Action(Action::Load(
            rest.split_whitespace().map(PathBuf::from).collect(),
        )),
        "process" => Input::Action(Action::Process),
        "ask" => Input::Action(Action::Ask(rest.to_string())),
        "reset" => Input::Action(Action::Reset),
        "status" => Input::Action(Action::Status),
        "context" => Input::Context(rest != "off"),
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

const HELP: &str = "commands:
  search <topic>        find papers and download their PDFs
  load <path>...        use local PDF files or folders instead
  process               index the downloaded documents
  ask <question>        answer from the indexed pages
  context on|off        show retrieved context after answers
  status                show phase and documents
  reset                 discard documents and index
  quit";

async fn run_session(controller: &HttpSessionController) -> anyhow::Result<()> {
    let mut terminal = Terminal {
        show_context: false,
    };
    let mut state = SessionState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match parse_input(&line) {
            Some(Input::Action(action)) => {
                state = controller.handle(state, action, &mut terminal).await;
            }
            Some(Input::Context(show)) => terminal.show_context = show,
            Some(Input::Help) => println!("{HELP}"),
            Some(Input::Quit) => break,
            None => println!("unknown command, type `help`"),
        }
    }

    controller.handle(state, Action::Reset, &mut terminal).await;
    Ok(())
}

async fn run(controller: &HttpSessionController, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Session => run_session(controller).await?,
        Command::Ask {
            topic,
            pdf,
            question,
            show_context,
        } => {
            let mut terminal = Terminal { show_context };
            let acquire = match topic {
                Some(topic) => Action::Search(topic),
                None => Action::Load(pdf),
            };

            let state = controller
                .handle(SessionState::new(), acquire, &mut terminal)
                .await;
            if state.documents().is_empty() {
                anyhow::bail!("no valid pdf documents were acquired");
            }

            let state = controller.handle(state, Action::Process, &mut terminal).await;
            if state.phase() != Phase::Ready {
                anyhow::bail!("documents could not be indexed");
            }

            let state = controller
                .handle(state, Action::Ask(question), &mut terminal)
                .await;
            let answered = state.last_answer().is_some();
            controller.handle(state, Action::Reset, &mut terminal).await;

            if !answered {
                anyhow::bail!("no answer was generated");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.session_config();
    let controller = HttpSessionController::connect(config)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "paper-qa boot"
    );

    // Dropping the pending run drops its session state, which removes downloaded files.
    tokio::select! {
        result = run(&controller, cli.command) => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupted, session discarded");
            Ok(())
        }
    }
}
