mod assistant;
mod cli;
mod dataset;
mod error;
mod llm_client;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::{Result, WrapErr, eyre};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::assistant::DataChatSession;
use crate::assistant::backend::BackendConfig;
use crate::cli::chat::ChatContext;
use crate::dataset::{DatasetView, Table};
use crate::llm_client::HttpLlmClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Args)]
struct ChatArgs {
    /// Dataset to discuss, as a JSON array of records
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Ask a single question and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Give up on a model request after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session about a dataset
    Chat(ChatArgs),

    /// Print the shape, column types and a sample of a dataset
    Summary {
        /// Dataset to summarize, as a JSON array of records
        #[arg(short, long)]
        data: PathBuf,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let verbose = match &cli.command {
        Some(Commands::Chat(args)) => args.verbose,
        Some(Commands::Summary { verbose, .. }) => *verbose,
        None => cli.chat.verbose,
    };

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    match cli.command {
        Some(Commands::Chat(args)) => run_chat(args).await,
        Some(Commands::Summary { data, .. }) => run_summary(&data),
        // Default to chat if no subcommand is provided
        None => run_chat(cli.chat).await,
    }
}

async fn run_chat(args: ChatArgs) -> Result<ExitCode> {
    let path = args
        .data
        .ok_or_else(|| eyre!("No dataset given, pass one with --data <FILE>"))?;
    let table = load_table(&path)?;

    let backend = BackendConfig::from_env();
    let client = HttpLlmClient::new(args.timeout.map(Duration::from_secs))?;
    let session = DataChatSession::new(&table, backend, Arc::new(client));

    let dataset_name = path.file_stem().map(|s| s.to_string_lossy().to_string());
    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        args.input,
        true,
        dataset_name,
        session,
    );
    chat_context.run().await
}

fn run_summary(path: &Path) -> Result<ExitCode> {
    let table = load_table(path)?;
    println!("{}", serde_json::to_string_pretty(&table.summary())?);
    Ok(ExitCode::SUCCESS)
}

fn load_table(path: &Path) -> Result<Table> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read dataset {}", path.display()))?;
    let table = Table::from_json_records(&text)
        .wrap_err_with(|| format!("Failed to parse dataset {}", path.display()))?;

    info!(
        "Loaded {} rows x {} columns from {}",
        table.row_count(),
        table.column_names().len(),
        path.display()
    );

    Ok(table)
}
