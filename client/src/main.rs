use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use client::{track_submission, ApiError, BackendClient, ClientConfig, ConfigError, TokioTimer};
use shared::{
    format_confidence, ConfidenceBand, NormalizationOutcome, Submission, TaskResult, TaskState,
    TaskStatus,
};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Food waste classification and stock detection client")]
struct Cli {
    /// YAML config file (defaults to CLIENT_CONFIG or config/client.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file and API_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify the food waste in an image
    Classify { image: PathBuf },
    /// Upload a fridge or shelf video and track stock detection to completion
    Track { video: PathBuf },
    /// Print the current status of a stock-detection task once
    Status { task_id: String },
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool, AppError> {
    let config = ClientConfig::load(cli.config.as_deref(), cli.base_url.as_deref())?;
    let client = BackendClient::from_config(&config)?;

    match cli.command {
        Command::Classify { image } => {
            let outcome = client.classify_waste(&image).await?;
            print_outcome(&outcome);
            Ok(!outcome.is_unparseable())
        }
        Command::Track { video } => {
            let submission = client.submit_stock_video(&video).await?;
            if let Submission::Pending { task_id } = &submission {
                println!("Task {} submitted, polling every {}ms", task_id, config.polling.interval_ms);
            }
            let cancel_on = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    futures::future::pending::<()>().await;
                }
            };
            let state = track_submission(
                client,
                TokioTimer,
                submission,
                config.polling,
                print_progress,
                cancel_on,
            )
            .await;
            print_final(&state);
            Ok(state.status == TaskStatus::Completed)
        }
        Command::Status { task_id } => {
            let response = client.task_status(&task_id).await?;
            let mut state = TaskState::new(task_id);
            state.apply(response);
            print_final(&state);
            Ok(state.status != TaskStatus::Failed)
        }
    }
}

fn print_outcome(outcome: &NormalizationOutcome) {
    println!("{}", outcome.summary());
    if let Some(result) = outcome.classification() {
        println!("Image: {}  ({})", result.image_id, result.timestamp);
        for category in &result.categories {
            println!(
                "  - {} [{}] {} confidence ({}): {}",
                category.name,
                category.food_type,
                format_confidence(category.confidence),
                ConfidenceBand::of(category.confidence),
                category.explanation
            );
        }
    }
}

fn print_progress(state: &TaskState) {
    if !state.status.is_terminal() {
        println!("[{}] {} {}%", state.task_id, state.status, state.progress);
    }
}

fn print_final(state: &TaskState) {
    println!("Task {}: {}", state.task_id, state.status);
    match state.status {
        TaskStatus::Completed => {
            if let Some(result) = &state.result {
                print_task_result(result);
            }
        }
        TaskStatus::Failed => {
            println!("Error: {}", state.error.as_deref().unwrap_or("Unknown error"));
        }
        TaskStatus::TimedOut => println!("Gave up waiting; the task may still finish on the backend."),
        TaskStatus::Queued | TaskStatus::Running => println!("Progress: {}%", state.progress),
        TaskStatus::Cancelled => {}
    }
}

fn print_task_result(result: &TaskResult) {
    if result.results.is_empty() {
        println!("No items detected");
    }
    for (item, count) in &result.results {
        println!("  {}: {}", item, count);
    }
    if let Some(url) = result.video_url_with_cache_buster(Utc::now().timestamp_millis()) {
        println!("Annotated video: {}", url);
    }
    if let Some(url) = &result.results_url {
        println!("Results: {}", url);
    }
}
