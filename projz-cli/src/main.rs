//! Project Z CLI - 命令行入口

use anyhow::{bail, Context, Result};
use api_client::ApiConfig;
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_logic::{Client, MessageDraft};
use header_signer::{HeaderSigner, Headers, SigningProfile};
use socket_client::{ChatMessage, SocketConfig, TlsConfig};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Project Z CLI
#[derive(Parser, Debug)]
#[command(name = "projz")]
#[command(version, about = "Project Z client: request signing and chat session tools")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Signing profile platform
    #[arg(long, default_value = "android", global = true)]
    platform: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the HJTRFS signature for a request
    Sign {
        /// Request path including query string
        #[arg(short, long)]
        path: String,

        /// Request body
        #[arg(short, long)]
        body: Option<String>,

        /// Header to include in the signature (name=value), repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },

    /// Derive a device id from an installation id
    DeviceId {
        /// Installation id (random when omitted)
        #[arg(short, long)]
        installation_id: Option<String>,
    },

    /// Log in and print incoming chat messages until Ctrl+C
    Listen {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Only print messages from this thread
        #[arg(short, long)]
        thread: Option<i64>,
    },

    /// Log in and send a text message
    Send {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Target thread id
        #[arg(short, long)]
        thread: i64,

        /// Message text
        #[arg(short, long)]
        content: String,

        /// Reply to message id
        #[arg(long)]
        reply_to: Option<i64>,
    },
}

#[derive(ClapArgs, Debug)]
struct ConnectionArgs {
    /// Login email
    #[arg(long, conflicts_with = "phone")]
    email: Option<String>,

    /// Login phone number
    #[arg(long)]
    phone: Option<String>,

    /// Account password
    #[arg(long)]
    password: String,

    /// API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// WebSocket base URL
    #[arg(long)]
    ws_url: Option<String>,

    /// Log every HTTP request at info level
    #[arg(long, default_value = "false")]
    http_logging: bool,

    /// Extra CA certificate (PEM) to trust for the chat connection
    #[arg(long)]
    ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification (DEVELOPMENT ONLY)
    #[arg(long, default_value = "false")]
    insecure: bool,
}

impl ConnectionArgs {
    fn client(&self, profile: SigningProfile) -> Result<Client> {
        let mut api = ApiConfig {
            profile,
            ..ApiConfig::default()
        };
        if let Some(url) = &self.api_url {
            api.api_url = url.clone();
        }
        if self.http_logging {
            api.log_requests = true;
        }

        let mut socket = SocketConfig {
            tls: TlsConfig {
                ca_cert_path: self.ca_cert.clone(),
                danger_accept_invalid_certs: self.insecure,
            },
            ..SocketConfig::default()
        };
        if let Some(url) = &self.ws_url {
            socket.url = url.clone();
        }

        Ok(Client::new(api, socket)?)
    }

    async fn login(&self, client: &Client) -> Result<()> {
        let auth = match (&self.email, &self.phone) {
            (Some(email), _) => client.login_email(email, &self.password).await?,
            (None, Some(phone)) => client.login_phone_number(phone, &self.password).await?,
            (None, None) => bail!("Either --email or --phone is required"),
        };
        info!(
            "Logged in as {}",
            auth.user_profile
                .as_ref()
                .and_then(|profile| profile.nickname.clone())
                .unwrap_or_else(|| "<unknown>".to_string())
        );
        Ok(())
    }
}

fn parse_headers(raw: &[String]) -> Result<Headers> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.to_string()))
                .with_context(|| format!("Invalid header '{}', expected name=value", pair))
        })
        .collect()
}

fn print_message(message: &ChatMessage) {
    match serde_json::to_string(message) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to encode message: {}", e),
    }
}

async fn listen(connection: ConnectionArgs, profile: SigningProfile, thread: Option<i64>) -> Result<()> {
    let client = connection.client(profile)?;
    client.on_chat_message(move |message: ChatMessage| async move {
        if thread.is_none() || message.thread_id == thread {
            print_message(&message);
        }
    });
    connection.login(&client).await?;

    info!("Listening. Press Ctrl+C to stop.");
    signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    if let Err(e) = client.logout().await {
        warn!("Logout request failed: {}", e);
        client.coordinator().on_logout().await;
    }
    Ok(())
}

async fn send(
    connection: ConnectionArgs,
    profile: SigningProfile,
    thread: i64,
    content: String,
    reply_to: Option<i64>,
) -> Result<()> {
    let client = connection.client(profile)?;
    connection.login(&client).await?;

    let mut draft = MessageDraft::text(content);
    if let Some(id) = reply_to {
        draft = draft.reply_to(id);
    }
    let result = client.send_message(thread, draft).await;

    if let Err(e) = client.logout().await {
        warn!("Logout request failed: {}", e);
        client.coordinator().on_logout().await;
    }

    print_message(&result?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let profile = SigningProfile::for_platform(&args.platform)?;

    match args.command {
        Command::Sign {
            path,
            body,
            headers,
        } => {
            let signer = HeaderSigner::new(profile);
            let headers = parse_headers(&headers)?;
            let body = body.unwrap_or_default();
            println!("{}", signer.build_signature(&path, &headers, body.as_bytes())?);
        }
        Command::DeviceId { installation_id } => {
            let installation_id =
                installation_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let signer = HeaderSigner::new(profile);
            println!("{}", signer.generate_device_id(&installation_id)?);
        }
        Command::Listen { connection, thread } => listen(connection, profile, thread).await?,
        Command::Send {
            connection,
            thread,
            content,
            reply_to,
        } => send(connection, profile, thread, content, reply_to).await?,
    }

    Ok(())
}
