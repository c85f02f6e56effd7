use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use voschat_common::Settings;
use voschat_sync::client::BackoffConfig;
use voschat_sync::{
    ChatApi, ClientConfig, FileInfo, Message, RealtimeChannel, RestClient, Scope,
    SyncCoordinator,
};

#[derive(Parser, Debug)]
#[command(name = "voschat", about = "VOSChat command-line client", version)]
struct Cli {
    /// REST API base, e.g. http://localhost:8080/api
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Realtime endpoint, e.g. ws://localhost:8080/ws
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print stored messages
    History {
        /// Only the conversation between two users
        #[arg(long, num_args = 2, value_names = ["USER", "PEER"])]
        between: Option<Vec<String>>,
    },
    /// Follow a conversation live until Ctrl-C
    Tail {
        #[arg(long, num_args = 2, value_names = ["USER", "PEER"], conflicts_with = "chat")]
        between: Option<Vec<String>>,
        /// Group chat id
        #[arg(long)]
        chat: Option<String>,
    },
    /// Send a text message
    Send {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: String,
        #[arg(long)]
        chat: Option<String>,
        text: String,
    },
    /// Delete a message by id
    Delete { id: String },
    /// Upload a file and send it as a message
    Upload {
        path: PathBuf,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: String,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Download a file by its URL
    Download {
        url: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Create a chat with the given members
    CreateChat {
        name: String,
        #[arg(required = true)]
        members: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    voschat_common::init_tracing(cli.verbose)?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        settings.base_url = base_url.clone();
        if cli.ws_url.is_none() {
            let base = voschat_sync::client::parse_base_url(base_url)?;
            settings.ws_url = voschat_sync::client::websocket_url_for(&base)?.to_string();
        }
    }
    if let Some(ws_url) = &cli.ws_url {
        settings.ws_url = ws_url.clone();
    }
    debug!("Using API {} and realtime {}", settings.base_url, settings.ws_url);

    let config = client_config(&settings);
    let api = Arc::new(RestClient::with_config(config.clone())?);

    match cli.command {
        Command::History { between } => history(api.as_ref(), between).await,
        Command::Tail { between, chat } => {
            let scope = scope_for(between, chat);
            tail(api, &config, scope).await
        }
        Command::Send {
            from,
            to,
            chat,
            text,
        } => {
            let mut message = Message::new(sender(from, &settings)?, to, text);
            if let Some(chat) = chat {
                message = message.with_chat(chat);
            }
            let coordinator = coordinator(api, &config);
            let receipt = coordinator.send(message).await?;
            match receipt.message.and_then(|m| m.id) {
                Some(id) => println!("sent {}", id),
                None => println!("sent"),
            }
            Ok(())
        }
        Command::Delete { id } => {
            coordinator(api, &config).delete(&id).await?;
            println!("deleted {}", id);
            Ok(())
        }
        Command::Upload {
            path,
            from,
            to,
            caption,
        } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {:?}", path))?;
            let filename = file_name(&path)?;
            let template = Message::new(sender(from, &settings)?, to, caption.unwrap_or_default());
            let receipt = coordinator(api, &config)
                .send_file(Bytes::from(data), &filename, template)
                .await?;
            if let Some(info) = receipt.message.and_then(|m| m.file_info) {
                println!("uploaded {} -> {}", info.file_name(), info.file_url());
            }
            Ok(())
        }
        Command::Download { url, out } => {
            let name = url.rsplit('/').next().unwrap_or_default().to_string();
            let file = FileInfo::new(name.clone(), name, 0, "", url);
            let data = coordinator(api, &config).download_file(&file).await?;
            tokio::fs::write(&out, &data)
                .await
                .with_context(|| format!("writing {:?}", out))?;
            println!("saved {} bytes to {:?}", data.len(), out);
            Ok(())
        }
        Command::CreateChat { name, members } => {
            let chat = coordinator(api, &config).create_chat(&name, &members).await?;
            println!("created chat {} ({})", chat.name, chat.id);
            Ok(())
        }
    }
}

fn client_config(settings: &Settings) -> ClientConfig {
    ClientConfig::new(settings.base_url.clone(), settings.ws_url.clone())
        .with_request_timeout(Duration::from_millis(settings.request_timeout_ms))
        .with_reconnect(
            BackoffConfig::new()
                .with_initial_backoff(Duration::from_millis(settings.reconnect_initial_ms))
                .with_max_backoff(Duration::from_millis(settings.reconnect_max_ms)),
        )
}

fn coordinator(api: Arc<RestClient>, config: &ClientConfig) -> SyncCoordinator {
    SyncCoordinator::new(api, RealtimeChannel::from_config(config))
}

fn sender(from: Option<String>, settings: &Settings) -> anyhow::Result<String> {
    from.or_else(|| settings.user.clone())
        .context("no sender: pass --from or set VOSCHAT_USER")
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{:?} has no file name", path))
}

fn scope_for(between: Option<Vec<String>>, chat: Option<String>) -> Scope {
    match (between.as_deref(), chat) {
        (Some([user, peer]), _) => Scope::direct(user.clone(), peer.clone()),
        (_, Some(chat)) => Scope::group(chat),
        _ => Scope::All,
    }
}

fn print_message(message: &Message) {
    let time = message.formatted_time();
    let mut line = format!(
        "[{:>5}] {} -> {}: {}",
        time,
        message.from,
        message.target(),
        message.content
    );
    if let Some(file) = &message.file_info {
        line.push_str(&format!(" [{} ({} bytes)]", file.file_name(), file.file_size()));
    }
    println!("{}", line);
}

async fn history(api: &RestClient, between: Option<Vec<String>>) -> anyhow::Result<()> {
    let messages = match between.as_deref() {
        Some([user, peer]) => api.list_messages_between(user, peer).await?,
        _ => api.list_messages().await?,
    };
    for message in &messages {
        print_message(message);
    }
    info!("{} messages", messages.len());
    Ok(())
}

async fn tail(api: Arc<RestClient>, config: &ClientConfig, scope: Scope) -> anyhow::Result<()> {
    let coordinator = coordinator(api, config);
    let presence = coordinator.presence();
    let mut snapshots = coordinator.store().watch();
    let mut states = coordinator.channel().watch_state();

    coordinator.start(scope.clone()).await?;
    info!("Following {} (Ctrl-C to stop)", scope);

    let mut printed = HashSet::new();
    let mut show_new = |messages: &[Message]| {
        for message in messages {
            if let Some(id) = &message.id {
                if printed.insert(id.clone()) {
                    print_message(message);
                }
            }
        }
    };
    let initial = snapshots.borrow_and_update().clone();
    show_new(&initial);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = snapshots.borrow_and_update().clone();
                show_new(&current);
            }
            Ok(event) = presence.recv() => {
                let status = if event.online { "online" } else { "offline" };
                println!("* {} is {}", event.user_id, status);
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                info!("Connection {}", state);
            }
        }
    }

    coordinator.stop();
    Ok(())
}
