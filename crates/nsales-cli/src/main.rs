//! nsales - command-line client for the NSales assistant

mod config;
mod render;
mod utils;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nsales_chat::{
    HttpTransport, RequestOptions, StreamController, StreamEvent, StreamOutcome, cleanse,
    tool_result::display_name, tool_result_for,
};
use nsales_client::{ChatClient, ChatSearch};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "nsales")]
#[command(about = "Chat with the NSales assistant from the terminal")]
#[command(version)]
struct Args {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Initialize config file with defaults
    #[arg(long)]
    init_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message and stream the reply
    Chat {
        /// Message to send
        message: String,

        /// Session to continue (a new one is created when omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Files to attach
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Model to request
        #[arg(short, long)]
        model: Option<String>,

        /// Let the assistant search the web
        #[arg(long)]
        web_search: bool,
    },
    /// List sessions
    Sessions {
        /// Filter by title or content
        #[arg(short, long)]
        query: Option<String>,

        /// Page to show, starting at 0
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Sessions per page
        #[arg(long, default_value_t = 20)]
        size: u32,
    },
    /// Create a session
    NewSession {
        /// Session title
        title: Option<String>,
    },
    /// Rename a session
    Rename { id: String, title: String },
    /// Delete a session
    Delete { id: String },
    /// Show a session's transcript
    History {
        id: String,

        /// Show stored text without removing tool payload dumps
        #[arg(long)]
        raw: bool,
    },
    /// Show tool availability
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let path = Config::init()?;
        println!("Config file: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    init_logging(args.verbose);

    let file_config = Config::load();
    let client = ChatClient::new(file_config.client_config(args.base_url.as_deref()))?;
    tracing::debug!(base_url = client.base_url(), "Using backend");

    let Some(command) = args.command else {
        use clap::CommandFactory;
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Chat {
            message,
            session,
            files,
            model,
            web_search,
        } => {
            let options = RequestOptions {
                model: model.or(file_config.model.clone()),
                web_search: if web_search {
                    Some(true)
                } else {
                    file_config.web_search
                },
            };
            run_chat(client, message, session, files, options).await
        }
        Command::Sessions { query, page, size } => {
            let search = ChatSearch {
                query,
                page,
                size,
                ..Default::default()
            };
            let list = client.list_sessions(&search).await?;
            for session in &list.sessions {
                println!("{}", render::session_line(session));
            }
            println!(
                "page {}/{} ({} sessions)",
                list.current_page + 1,
                list.total_pages.max(1),
                list.total_elements
            );
            Ok(())
        }
        Command::NewSession { title } => {
            let session = client.create_session(title.as_deref()).await?;
            println!("{}", session.id);
            Ok(())
        }
        Command::Rename { id, title } => {
            client.update_session(&id, &title).await?;
            println!("Renamed {}", id);
            Ok(())
        }
        Command::Delete { id } => {
            client.delete_session(&id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        Command::History { id, raw } => {
            let history = client.message_history(&id).await?;
            let messages = if raw {
                history.messages
            } else {
                cleanse(history.messages)
            };
            for message in &messages {
                println!("{}", render::message(message));
            }
            Ok(())
        }
        Command::Tools => {
            let status = client.tools_status().await?;
            print!("{}", render::tools_status(&status));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("nsales=debug,nsales_chat=debug,nsales_client=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_chat(
    client: ChatClient,
    message: String,
    session: Option<String>,
    files: Vec<PathBuf>,
    options: RequestOptions,
) -> anyhow::Result<()> {
    let session_id = match session {
        Some(id) => id,
        None => {
            let created = client.create_session(None).await?;
            eprintln!("Session: {}", created.id);
            created.id
        }
    };

    let mut attachments = Vec::with_capacity(files.len());
    for path in &files {
        attachments.push(utils::load_attachment(path).await?);
    }

    let transport = Arc::new(HttpTransport::new(client));
    let mut controller = StreamController::new(session_id, transport).with_options(options);
    controller.set_on_chunk(|chunk| {
        if chunk.content.is_empty() {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(chunk.content.as_bytes());
        let _ = stdout.flush();
    });

    // Tool progress goes to stderr so stdout carries only the reply
    let events = tokio::spawn(print_tool_events(controller.subscribe()));

    let handle = controller.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.abort();
        }
    });

    let ticket = controller
        .submit(message, attachments)
        .context("Failed to start stream")?;
    let outcome = ticket.outcome().await;
    events.abort();

    match outcome {
        StreamOutcome::Completed(reply) => {
            println!();
            if let Some(result) = tool_result_for(&reply) {
                println!();
                print!("{}", render::tool_result(&result));
            }
            Ok(())
        }
        StreamOutcome::Aborted | StreamOutcome::Superseded => {
            println!();
            eprintln!("[aborted]");
            Ok(())
        }
        StreamOutcome::Failed(e) => {
            println!();
            Err(e.into())
        }
    }
}

async fn print_tool_events(mut rx: broadcast::Receiver<StreamEvent>) {
    loop {
        match rx.recv().await {
            Ok(StreamEvent::ToolStatus { tool_name, to, .. }) => {
                eprintln!("\n[{} {}]", display_name(&tool_name), to.as_str());
            }
            Ok(event) if event.is_terminal() => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
