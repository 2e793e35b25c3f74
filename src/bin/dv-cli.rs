use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser)]
#[command(name = "dv-cli")]
#[command(about = "Inspection and probe client for dv-proxy", long_about = None)]
struct Cli {
    /// Base URL of the admin API
    #[arg(short, long, default_value = "http://127.0.0.1:5080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show process status
    Status,
    /// Dump the shared resolution table
    Resolution,
    /// Dump every router's table, neighbors and direct hosts
    Routers,
    /// Send one GET request through the proxy and print the raw response
    Probe {
        /// Proxy address
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        proxy: String,

        /// Value of the Host header
        #[arg(long)]
        host: String,

        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Resolution => {
            let res = client.get(format!("{}/admin/resolution", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Routers => {
            let res = client.get(format!("{}/admin/routers", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Probe {
            proxy,
            host,
            path,
            timeout_secs,
        } => {
            let response = tokio::time::timeout(
                Duration::from_secs(timeout_secs),
                probe(&proxy, &host, &path),
            )
            .await??;

            if response.is_empty() {
                eprintln!("Error: proxy closed the connection without a response");
            } else {
                println!("{}", String::from_utf8_lossy(&response));
            }
        }
    }

    Ok(())
}

async fn probe(proxy: &str, host: &str, path: &str) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(proxy).await?;
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: dv-cli\r\nConnection: close\r\n\r\n",
        path, host
    );
    stream.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
