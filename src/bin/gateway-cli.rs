use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the ledger gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Health,
    /// Register a user with the organization's CA
    Register {
        username: String,
        password: String,
        #[arg(long)]
        affiliation: Option<String>,
    },
    /// List joined channels
    Channels,
    /// Ledger height and tip hashes of a channel
    Info { channel: String },
    /// Fetch a block by number
    Block { channel: String, number: u64 },
    /// Fetch a transaction by id
    Tx { channel: String, txid: String },
    /// List installed chaincodes, or instantiated ones with --channel
    Chaincodes {
        #[arg(long)]
        channel: Option<String>,
    },
    /// Submit a transaction
    Invoke {
        channel: String,
        chaincode: String,
        fcn: String,
        args: Vec<String>,
        /// Wait until the transaction is committed
        #[arg(long)]
        wait: bool,
    },
    /// Evaluate a read-only chaincode function
    Query {
        channel: String,
        chaincode: String,
        fcn: String,
        args: Vec<String>,
    },
    /// Stream chainblock events from the socket
    Watch {
        /// Stop after this many events
        #[arg(long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Register {
            username,
            password,
            affiliation,
        } => {
            client
                .post(format!("{}/users", base))
                .json(&json!({
                    "username": username,
                    "password": password,
                    "affiliation": affiliation,
                }))
                .send()
                .await?
        }
        Commands::Channels => client.get(format!("{}/channels", base)).send().await?,
        Commands::Info { channel } => {
            client
                .get(format!("{}/channels/{}", base, channel))
                .send()
                .await?
        }
        Commands::Block { channel, number } => {
            client
                .get(format!("{}/channels/{}/blocks/{}", base, channel, number))
                .send()
                .await?
        }
        Commands::Tx { channel, txid } => {
            client
                .get(format!("{}/channels/{}/transactions/{}", base, channel, txid))
                .send()
                .await?
        }
        Commands::Chaincodes { channel } => {
            let path = match channel {
                Some(channel) => format!("{}/channels/{}/chaincodes", base, channel),
                None => format!("{}/chaincodes", base),
            };
            client.get(path).send().await?
        }
        Commands::Invoke {
            channel,
            chaincode,
            fcn,
            args,
            wait,
        } => {
            client
                .post(format!("{}/channels/{}/chaincodes/{}", base, channel, chaincode))
                .json(&json!({
                    "fcn": fcn,
                    "args": args,
                    "waitForTransactionEvent": wait,
                }))
                .send()
                .await?
        }
        Commands::Query {
            channel,
            chaincode,
            fcn,
            args,
        } => {
            client
                .get(format!("{}/channels/{}/chaincodes/{}", base, channel, chaincode))
                .query(&[("fcn", fcn), ("args", serde_json::to_string(&args)?)])
                .send()
                .await?
        }
        Commands::Watch { count } => return watch(base, count).await,
    };

    print_response(res).await
}

async fn watch(base: &str, count: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let mut url = url::Url::parse(base)?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| format!("cannot derive socket url from {}", base))?;
    url.set_path("/socket");

    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;
    eprintln!("Watching {}", url);

    let mut seen = 0;
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(text.as_str())?;
                println!("{}", serde_json::to_string_pretty(&value)?);
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
