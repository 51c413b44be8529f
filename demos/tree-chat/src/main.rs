//! tree-chat: an interactive peer.
//!
//! Reads chat lines from stdin and prints every line received from the tree.
//! `/quit` leaves the tree and exits.
//!
//! Environment variables:
//! - TREECHAT_NAME: peer name (default "peer")
//! - TREECHAT_PORT: local UDP port (default 20000)
//! - TREECHAT_PARENT: parent address, e.g. 127.0.0.1:20000 (unset = new root)
//! - TREECHAT_LOSS: simulated packet loss percentage (default 0)
//! - TREECHAT_LOG: log filter, e.g. debug or chat_tree=trace (default info)

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use chat_tree::ChatError;
use chat_tree::client::{Client, PeerConfig, PeerConfigBuilder, PeerState};
use chat_tree::core::MessageRenderer;
use chat_tree::event::{EventDispatcher, UiEvent, UiEventKind};
use chat_tree::message::Message;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const QUIT: &str = "/quit";

struct Stdout;

impl MessageRenderer for Stdout {
    fn render(&self, _message: &Message, text: &str, author: &str) {
        println!("<{author}> {text}");
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TREECHAT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ChatError> {
    value
        .trim()
        .parse()
        .map_err(|_| ChatError::Config(format!("{name}: cannot parse {value:?}")))
}

fn config_from_env() -> Result<PeerConfig, ChatError> {
    let mut builder = PeerConfigBuilder::new();

    if let Some(name) = var("TREECHAT_NAME") {
        builder = builder.name(name);
    }
    if let Some(port) = var("TREECHAT_PORT") {
        builder = builder.port(parse("TREECHAT_PORT", &port)?);
    }
    if let Some(parent) = var("TREECHAT_PARENT") {
        let addr: SocketAddr = parse("TREECHAT_PARENT", &parent)?;
        builder = builder.parent_addr(addr);
    }
    if let Some(loss) = var("TREECHAT_LOSS") {
        builder = builder.packet_loss(parse("TREECHAT_LOSS", &loss)?);
    }

    Ok(builder.build()?)
}

async fn run() -> Result<(), ChatError> {
    let config = config_from_env()?;
    let peer = Client::start(config).await?;
    peer.add_renderer(Arc::new(Stdout));

    if let Err(e) = peer.joined().await {
        error!(error = %e, "could not join the tree");
        return Err(e.into());
    }
    info!(name = peer.name(), addr = %peer.local_addr(), "ready; type {QUIT} to leave");

    let mut dispatcher = EventDispatcher::<UiEvent, Client>::new();
    dispatcher.subscribe(UiEventKind::TextEntered, peer.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line == QUIT {
            break;
        }
        if line.is_empty() {
            continue;
        }
        dispatcher.publish(&UiEvent::TextEntered(line.to_string()));
    }

    match peer.state() {
        PeerState::Running => peer.leave().await?,
        _ => peer.shutdown(),
    }
    info!("bye");
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        error!(error = %e, "tree-chat failed");
        std::process::exit(1);
    }
}
