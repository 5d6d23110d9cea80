//! walle: command-line front end for the WALL•E chat service
//!
//! Usage:
//!   walle status                                   Show server status
//!   walle list                                     List saved chats
//!   walle show <chat-id>                           Print a chat transcript
//!   walle delete <chat-id>                         Delete a chat
//!   walle chat [--model <id>] [--chat <id>] <prompt>  Stream a reply
//!   walle ask [--model <id>] <prompt>              Non-streaming reply

use anyhow::{bail, Context};
use async_trait::async_trait;
use std::io::Write;
use tracing_subscriber::EnvFilter;
use walle_client::types::ChatRequest;
use walle_client::{CancelHandle, ChatApp, ClientConfig, HttpTransport, StreamEnd, StreamSink, StreamStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("walle_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "status" => cmd_status().await,
        "list" => cmd_list().await,
        "show" => cmd_show(&args[2..]).await,
        "delete" => cmd_delete(&args[2..]).await,
        "chat" => cmd_chat(&args[2..]).await,
        "ask" => cmd_ask(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("walle {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"walle - WALL•E chat client

USAGE:
    walle <COMMAND> [OPTIONS]

COMMANDS:
    status                                  Show server status
    list                                    List saved chats
    show <chat-id>                          Print a chat transcript
    delete <chat-id>                        Delete a chat
    chat [--model <id>] [--chat <id>] <prompt>
                                            Stream a reply (Ctrl-C cancels)
    ask [--model <id>] <prompt>             Non-streaming reply
    version                                 Show version information
    help                                    Show this help message

ENVIRONMENT:
    WALLE_BASE_URL                          Server URL (default http://localhost:5000)
    WALLE_API_KEY                           Bearer token (falls back to the OS keyring)
    RUST_LOG                                Log filter (default walle_client=info)"#
    );
}

/// Split `--flag value` pairs from positional words.
fn parse_flags(args: &[String]) -> anyhow::Result<(Vec<(String, String)>, String)> {
    let mut flags = Vec::new();
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(name) = arg.strip_prefix("--") {
            let value = iter.next().with_context(|| format!("--{name} needs a value"))?;
            flags.push((name.to_string(), value.clone()));
        } else {
            words.push(arg.clone());
        }
    }
    Ok((flags, words.join(" ")))
}

fn flag<'a>(flags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    flags.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn transport() -> anyhow::Result<HttpTransport> {
    Ok(HttpTransport::new(ClientConfig::from_env()?)?)
}

async fn cmd_status() -> anyhow::Result<()> {
    let status = transport()?.api_status().await?;
    println!("{}", status.status);
    if let Some(v) = status.version {
        println!("version:    {v}");
    }
    if let Some(e) = status.encryption {
        println!("encryption: {e}");
    }
    Ok(())
}

async fn cmd_list() -> anyhow::Result<()> {
    let mut app = ChatApp::connect(ClientConfig::from_env()?).await?;
    let chats = app.load_chats().await?;
    if chats.is_empty() {
        println!("No chats yet.");
    }
    for chat in chats {
        let pin = if chat.pinned { "*" } else { " " };
        println!(
            "{pin} {}  {:<32} {:>4} msgs  {}",
            chat.id, chat.title, chat.message_count, chat.model
        );
    }
    Ok(())
}

async fn cmd_show(args: &[String]) -> anyhow::Result<()> {
    let Some(id) = args.first() else {
        bail!("usage: walle show <chat-id>");
    };
    let mut app = ChatApp::connect(ClientConfig::from_env()?).await?;
    let chat = app.open_chat(id).await?;
    println!("# {} ({})", chat.title, chat.model);
    for message in &chat.messages {
        let rating = match message.liked {
            Some(true) => " [+]",
            Some(false) => " [-]",
            None => "",
        };
        println!("\n[{:?}]{rating} {}\n{}", message.role, message.timestamp, message.content);
    }
    Ok(())
}

async fn cmd_delete(args: &[String]) -> anyhow::Result<()> {
    let Some(id) = args.first() else {
        bail!("usage: walle delete <chat-id>");
    };
    let mut app = ChatApp::connect(ClientConfig::from_env()?).await?;
    app.delete_chat(id).await?;
    println!("Deleted {id}");
    Ok(())
}

/// Prints deltas as they arrive.
struct StdoutSink;

#[async_trait]
impl StreamSink for StdoutSink {
    async fn on_delta(&mut self, delta: &str, _accumulated: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(delta.as_bytes());
        let _ = out.flush();
    }

    async fn on_end(&mut self, end: StreamEnd<'_>) {
        match end {
            StreamEnd::Finished(outcome) => match outcome.status {
                StreamStatus::Completed => println!(),
                StreamStatus::Incomplete => println!("\n[reply ended early]"),
                StreamStatus::Cancelled => println!("\n[cancelled]"),
            },
            StreamEnd::Failed(e) => eprintln!("\n{}", e.user_message()),
        }
    }
}

async fn cmd_chat(args: &[String]) -> anyhow::Result<()> {
    let (flags, prompt) = parse_flags(args)?;
    if prompt.trim().is_empty() {
        bail!("usage: walle chat [--model <id>] [--chat <id>] <prompt>");
    }

    let mut app = ChatApp::connect(ClientConfig::from_env()?).await?;
    let chat_id = match flag(&flags, "chat") {
        Some(id) => app.open_chat(id).await?.id.clone(),
        None => app.new_chat(flag(&flags, "model")).await?.id.clone(),
    };

    let cancel = CancelHandle::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    app.send_message_with_cancel(&prompt, &mut StdoutSink, cancel).await?;
    eprintln!("chat: {chat_id}");
    Ok(())
}

async fn cmd_ask(args: &[String]) -> anyhow::Result<()> {
    let (flags, prompt) = parse_flags(args)?;
    let transport = transport()?;
    let app_config = transport.app_config().await.unwrap_or_default();
    let model = app_config.resolve_model(flag(&flags, "model")).to_string();
    let max_tokens = app_config
        .max_tokens_for(&model)
        .unwrap_or(transport.config().max_tokens);

    let request = ChatRequest::streaming(&prompt, model, Vec::new(), max_tokens)?;
    let reply = transport.chat(&request).await?;
    println!("{}", reply.response);
    Ok(())
}
