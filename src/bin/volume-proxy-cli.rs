use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "volume-proxy-cli")]
#[command(about = "Management CLI for the volume proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show volume mappings and endpoint health
    Status,
    /// Check proxy liveness
    Health,
    /// Reload the routing table from the proxy's config file
    Reload,
    /// Fetch a path from a volume through the proxy
    Get {
        /// Volume name
        volume: String,
        /// Path on the volume's backend
        #[arg(default_value = "/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)).send().await?,
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Reload => client.post(format!("{}/admin/reload", base)).send().await?,
        Commands::Get { volume, path } => {
            let path = path.trim_start_matches('/');
            let res = client
                .get(format!("{}/volume/{}/{}", base, volume, path))
                .send()
                .await?;
            if let Some(endpoint) = res.headers().get("x-proxy-endpoint") {
                eprintln!("Served by: {}", endpoint.to_str().unwrap_or("?"));
            }
            return print_raw(res).await;
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
        Ok(())
    } else {
        eprintln!("Error: proxy returned status {}", status);
        eprintln!("{}", rendered);
        Err(format!("request failed with status {}", status).into())
    }
}

async fn print_raw(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.bytes().await?;
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
    }
    println!("{}", String::from_utf8_lossy(&body));
    if status.is_success() {
        Ok(())
    } else {
        Err(format!("request failed with status {}", status).into())
    }
}
