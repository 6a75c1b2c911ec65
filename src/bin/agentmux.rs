//! agentmux - command-line client for the agentmux daemon
//!
//! # Usage
//!
//! ```text
//! agentmux chat "hello"                     # stream over a socket, fresh session
//! agentmux chat "hello" --session team      # join session "team"
//! agentmux chat "hello" --transport sse     # stream over SSE
//! agentmux sessions                         # list live sessions
//! agentmux health                           # daemon health
//! ```

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use agentmux_cli::{ClientConfig, HubClient, DEFAULT_BASE_URL};
use agentmux_core::GenerationOptions;
use agentmux_protocol::{ChatRequest, ClientFrame};

// ============================================================================
// CLI Arguments
// ============================================================================

/// agentmux - stream chat replies from an agentmux daemon
#[derive(Parser, Debug)]
#[command(name = "agentmux", version, about)]
struct Args {
    /// Daemon base URL
    #[arg(long, env = "AGENTMUX_URL", default_value = DEFAULT_BASE_URL, global = true)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message and stream the reply to stdout
    Chat {
        message: String,

        /// Session to join (generated by the daemon when omitted)
        #[arg(long, short = 's')]
        session: Option<String>,

        #[arg(long, short = 't', value_enum, default_value_t = Transport::Ws)]
        transport: Transport,

        /// Upstream model override
        #[arg(long)]
        model: Option<String>,
    },
    /// List live sessions
    Sessions,
    /// Show daemon health
    Health,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    Ws,
    Sse,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let client = HubClient::new(ClientConfig::new(args.url));

    match args.command {
        Command::Chat {
            message,
            session,
            transport,
            model,
        } => {
            let options = GenerationOptions {
                model,
                ..Default::default()
            };
            let mut stdout = io::stdout();
            let print = |chunk: &str| {
                let _ = write!(stdout, "{chunk}");
                let _ = stdout.flush();
            };

            let transcript = match transport {
                Transport::Ws => {
                    let frame = ClientFrame::Chat { message, options };
                    client.chat_ws(session.as_deref(), &frame, print).await
                }
                Transport::Sse => {
                    let mut request = ChatRequest::new(message);
                    request.session_id = session;
                    request.options = options;
                    client.chat_sse(&request, print).await
                }
            }
            .context("Chat failed")?;

            println!();
            eprintln!(
                "session {} · message {} · {} chunks",
                transcript.session_id, transcript.message_id, transcript.chunks
            );
        }
        Command::Sessions => {
            let sessions = client.sessions().await.context("Failed to list sessions")?;
            if sessions.is_empty() {
                println!("No live sessions.");
            }
            for session in sessions {
                println!(
                    "{}\t{} connection(s)\topened {}",
                    session.session_id,
                    session.connections.len(),
                    session.opened_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Command::Health => {
            let health = client.health().await.context("Health check failed")?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}
