use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chatview_core::{
    BackendConfig, ChatBackend, ChatService, ChatviewError, HttpBackend, LocalBackend,
    SendOutcome, Timeline, format_response, read_transcript, render_listing_markdown,
    render_timeline_markdown, replay, sanitize, to_pretty_json, write_transcript,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "chatview",
    version,
    about = "Browse and continue conversations with the assistant service"
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Assistant service base URL (overrides CHATVIEW_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds (overrides CHATVIEW_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Transcript directory (overrides CHATVIEW_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> chatview_core::Result<BackendConfig> {
        let mut config = BackendConfig::from_env()?;
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.as_str())?;
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout_secs(secs)?;
        }
        if let Some(dir) = &self.log_dir {
            config = config.with_transcript_dir(dir.clone());
        }
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List stored conversations, newest first
    History {
        /// Read transcripts from the log directory instead of the service
        #[arg(long)]
        local: bool,

        /// Output JSON instead of markdown
        #[arg(long)]
        raw: bool,
    },
    /// Replay one stored conversation
    Open {
        /// Conversation id, e.g. TE3_20250101_120000.txt
        id: String,

        /// Read transcripts from the log directory instead of the service
        #[arg(long)]
        local: bool,

        /// Output JSON instead of markdown
        #[arg(long)]
        raw: bool,
    },
    /// Replay a transcript file
    Replay {
        file: PathBuf,

        /// Output JSON instead of markdown
        #[arg(long)]
        raw: bool,
    },
    /// Send a message and print the assistant's reply
    Send {
        message: String,

        /// Output JSON instead of the reply text
        #[arg(long)]
        raw: bool,

        /// Write the exchange as a new transcript in the log directory
        #[arg(long)]
        save: bool,
    },
    /// Format and sanitize assistant text read from stdin
    Format,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn backend(config: &BackendConfig, local: bool) -> chatview_core::Result<Arc<dyn ChatBackend>> {
    if local {
        Ok(Arc::new(LocalBackend::new(&config.transcript_dir)))
    } else {
        Ok(Arc::new(HttpBackend::new(config)?))
    }
}

async fn run(cli: Cli) -> chatview_core::Result<()> {
    let load_config = || cli.config.load();

    match cli.command {
        Command::History { local, raw } => {
            let service = ChatService::new(backend(&load_config()?, local)?);
            let summaries = service.list_conversations().await?;
            if raw {
                println!("{}", to_pretty_json(&summaries)?);
            } else {
                print!("{}", render_listing_markdown(&summaries));
            }
        }
        Command::Open { id, local, raw } => {
            let service = ChatService::new(backend(&load_config()?, local)?);
            let mut timeline = Timeline::new();
            service.open_conversation(&mut timeline, &id).await?;
            print_timeline(Some(&id), &timeline, raw)?;
        }
        Command::Replay { file, raw } => {
            let records = read_transcript(&file)?;
            let id = transcript_id(&file);
            let timeline = Timeline::from(replay(&id, &records));
            print_timeline(Some(&id), &timeline, raw)?;
        }
        Command::Send { message, raw, save } => {
            let config = load_config()?;
            let service = ChatService::new(backend(&config, false)?);
            let mut timeline = Timeline::new();

            let record = match service.send(&mut timeline, &message).await {
                SendOutcome::Delivered { record } => record,
                SendOutcome::Ignored => {
                    return Err(ChatviewError::InvalidInput(
                        "message must not be blank".to_string(),
                    ));
                }
                SendOutcome::Busy => {
                    return Err(ChatviewError::InvalidInput(
                        "another message is still being sent".to_string(),
                    ));
                }
            };

            if raw {
                println!("{}", to_pretty_json(timeline.messages())?);
            } else if let Some(reply) = timeline.messages().last() {
                println!("{}", reply.content);
            }

            if save {
                if record.bot.is_some() {
                    let path = write_transcript(
                        &config.transcript_dir,
                        &[record],
                        Local::now().naive_local(),
                    )?;
                    info!(path = %path.display(), "saved transcript");
                } else {
                    warn!("assistant did not answer; transcript not saved");
                }
            }
        }
        Command::Format => format_stdin()?,
    }

    Ok(())
}

fn format_stdin() -> chatview_core::Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|source| ChatviewError::Io {
            path: PathBuf::from("<stdin>"),
            source,
        })?;
    print!("{}", sanitize(&format_response(&input)));
    Ok(())
}

fn transcript_id(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or_else(|| path.display().to_string(), ToString::to_string)
}

fn print_timeline(id: Option<&str>, timeline: &Timeline, raw: bool) -> chatview_core::Result<()> {
    if raw {
        println!("{}", to_pretty_json(timeline.messages())?);
    } else {
        print!("{}", render_timeline_markdown(id, timeline.messages()));
    }
    Ok(())
}
