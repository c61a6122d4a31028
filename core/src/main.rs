use std::collections::BTreeMap;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use relayq::protocol::{self, FrameCodec, ServerInfo};
use relayq::{RelayqError, Server};
use tokio::net::TcpStream;
use tokio::signal;
use tokio_util::codec::Framed;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "relayq")]
#[command(about = "A minimal in-memory message queue broker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a broker and serve client connections until interrupted
    Start {
        /// TCP address to listen on
        #[arg(long, default_value = protocol::DEFAULT_ADDR)]
        addr: String,

        #[arg(short, long, default_value = "info")]
        log_level: String,
    },
    /// Print statistics from a running broker
    Info {
        /// TCP address of the broker
        #[arg(long, default_value = protocol::DEFAULT_ADDR)]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> relayq::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Start { addr, log_level } => start(&addr, &log_level).await,
        Command::Info { addr } => print_info(&addr).await,
    }
}

async fn start(addr: &str, log_level: &str) -> relayq::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(log_level))
        .init();

    info!("starting relayq broker on {}", addr);

    let server = Server::new();

    let mut serve = {
        let server = server.clone();
        let addr = addr.to_string();
        tokio::spawn(async move {
            if let Err(err) = server.listen_and_serve(&addr).await {
                error!("serve failed: {}", err);
            }
        })
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            let _ = server.stop();
            let _ = (&mut serve).await;
        }
        _ = &mut serve => {}
    }

    info!("relayq shut down");
    Ok(())
}

async fn print_info(addr: &str) -> relayq::Result<()> {
    let socket = TcpStream::connect(addr).await?;
    let mut framed = Framed::new(socket, FrameCodec::new());

    framed
        .send(vec![Bytes::from_static(protocol::CMD_INFO)])
        .await?;

    let response = match framed.next().await {
        Some(frame) => frame?,
        None => {
            return Err(RelayqError::Protocol(
                "connection closed before the Info response".to_string(),
            ))
        }
    };

    let payload = match response.as_slice() {
        [status, payload] if status.as_ref() == protocol::STATUS_OK => payload.clone(),
        _ => return Err(RelayqError::Protocol("unexpected Info response".to_string())),
    };
    let info: ServerInfo = serde_json::from_slice(&payload)?;

    let _ = framed
        .send(vec![Bytes::from_static(protocol::CMD_QUIT)])
        .await;

    println!("Number of connections: {}", info.num_connections);
    println!("Number of queues: {}", info.num_queues);
    println!("Number of messages: {}", info.num_messages);
    if !info.queues.is_empty() {
        println!("Queues:");
        let queues: BTreeMap<&String, &relayq::QueueInfo> = info.queues.iter().collect();
        for (name, queue) in queues {
            println!("        {}: {}", name, queue.num_messages);
        }
    }

    Ok(())
}

fn parse_log_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            warn!("invalid log level '{}', defaulting to 'info'", level);
            tracing::Level::INFO
        }
    }
}
