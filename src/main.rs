//! songgen - generate songs from lyrics through a hosted song API.
//!
//! Submits a generation job, polls it on a fixed interval and prints the
//! URL of the finished track. Logs go to stderr so stdout can be piped.

mod client;
mod config;
mod error;
mod protocol;
#[cfg(test)]
mod test_support;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use client::JobClient;
use config::{Config, PollPolicy};
use protocol::{GenerationRequest, JobHandle, JobStatus};
use std::io::Read;
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "songgen")]
#[command(author, version, about = "Generate songs from lyrics through a hosted song API")]
#[command(long_about = "Generate songs from lyrics through a hosted song API.\n\nReads MUREKA_API_KEY and MUREKA_API_URL from the environment (or a .env file) unless they are set in the config file.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a song and print the track URL
    Generate {
        #[command(flatten)]
        song: SongArgs,
        #[command(flatten)]
        polling: PollArgs,
    },
    /// Submit a generation job and print its task id
    Submit {
        #[command(flatten)]
        song: SongArgs,
    },
    /// Check a job's status once
    Status {
        /// Task id returned by `submit`
        task_id: String,
    },
    /// Wait for a previously submitted job and print the track URL
    Wait {
        /// Task id returned by `submit`
        task_id: String,
        #[command(flatten)]
        polling: PollArgs,
    },
    /// Open configuration file in $VISUAL or $EDITOR
    Config,
}

#[derive(Args)]
struct SongArgs {
    /// Lyrics text (read from --file or stdin when omitted)
    #[arg(value_name = "LYRICS")]
    lyrics: Option<String>,

    /// Read lyrics from a file
    #[arg(short = 'f', long, value_name = "PATH", conflicts_with = "lyrics")]
    file: Option<PathBuf>,

    /// Genre or style prompt, e.g. "sad ballad" or "kpop, 1 min"
    #[arg(short = 'p', long, value_name = "PROMPT")]
    prompt: Option<String>,
}

#[derive(Args)]
struct PollArgs {
    /// Seconds between status checks
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Status checks before giving up
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Commands::Generate { song, polling } => {
            let (config, client) = connect()?;
            let request = build_request(&song, &config)?;
            let policy = resolve_policy(&config, &polling)?;
            let url = client
                .run_to_completion(&request, &policy, &cancel_on_ctrl_c())
                .await?;
            println!("{}", url);
        }
        Commands::Submit { song } => {
            let (config, client) = connect()?;
            let request = build_request(&song, &config)?;
            let handle = client.submit(&request).await?;
            println!("{}", handle.task_id());
        }
        Commands::Status { task_id } => {
            let (_, client) = connect()?;
            let status = client.poll(&parse_handle(task_id)?).await?;
            println!("{}", describe_status(&status));
        }
        Commands::Wait { task_id, polling } => {
            let (config, client) = connect()?;
            let handle = parse_handle(task_id)?;
            let policy = resolve_policy(&config, &polling)?;
            let url = client.wait(&handle, &policy, &cancel_on_ctrl_c()).await?;
            println!("{}", url);
        }
        Commands::Config => handle_config()?,
    }

    Ok(())
}

/// Load configuration and build the API client.
fn connect() -> Result<(Config, JobClient)> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }

    let config = Config::load().context("Failed to load configuration")?;
    let client = JobClient::new(config.client_config()?).context("Failed to create HTTP client")?;
    info!("Using song API at {}", client.base_url());
    Ok((config, client))
}

/// Initialize stderr logging.
fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("songgen=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();
    Ok(())
}

/// Token cancelled on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no longer waiting for the job");
            trigger.cancel();
        }
    });
    cancel
}

fn build_request(song: &SongArgs, config: &Config) -> Result<GenerationRequest> {
    let lyrics = read_lyrics(song, std::io::stdin())?;
    let prompt = song
        .prompt
        .clone()
        .unwrap_or_else(|| config.generation.prompt.clone());
    Ok(GenerationRequest::new(lyrics).with_prompt(prompt))
}

/// Lyrics from the argument, the file, or `stdin`, in that order.
fn read_lyrics(song: &SongArgs, mut stdin: impl Read) -> Result<String> {
    let lyrics = if let Some(lyrics) = &song.lyrics {
        lyrics.clone()
    } else if let Some(path) = &song.file {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lyrics file: {}", path.display()))?
    } else {
        let mut buf = String::new();
        stdin
            .read_to_string(&mut buf)
            .context("Failed to read lyrics from stdin")?;
        buf
    };

    if lyrics.trim().is_empty() {
        bail!("Lyrics are empty");
    }
    Ok(lyrics)
}

/// Config-file polling values with command-line overrides applied.
fn resolve_policy(config: &Config, polling: &PollArgs) -> Result<PollPolicy> {
    let base = config.poll_policy()?;
    let interval = polling
        .interval
        .map(Duration::from_secs)
        .unwrap_or(base.interval);
    let max_attempts = polling.max_attempts.unwrap_or(base.max_attempts);
    PollPolicy::new(interval, max_attempts)
}

fn parse_handle(task_id: String) -> Result<JobHandle> {
    JobHandle::new(task_id.trim()).context("Task id must not be empty")
}

fn describe_status(status: &JobStatus) -> String {
    match status {
        JobStatus::Pending(label) if label.is_empty() => "pending".to_string(),
        JobStatus::Pending(label) => format!("pending ({})", label),
        JobStatus::Succeeded(choices) => {
            let urls: Vec<&str> = choices.iter().map(|c| c.url.as_str()).collect();
            format!("succeeded {}", urls.join(" "))
        }
        JobStatus::Failed(Some(message)) => format!("failed: {}", message),
        JobStatus::Failed(None) => "failed".to_string(),
        JobStatus::MalformedSuccess(reason) => format!("malformed: {}", reason),
    }
}

/// Create the config file if needed and open it in the user's editor.
fn handle_config() -> Result<()> {
    let path = Config::config_path()?;
    if !path.exists() {
        Config::default().save()?;
        info!("Created default config at {}", path.display());
    }

    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to launch editor '{}'", editor))?;

    if !status.success() {
        warn!(%editor, ?status, "Editor exited with non-zero status");
    }
    Ok(())
}
