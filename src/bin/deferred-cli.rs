use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "deferred-cli")]
#[command(about = "Client for the deferred response demo server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a deferred request and print its outcome
    Get {
        /// Route whose declared policy applies
        route: String,
        /// Worker delay before resuming
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
        /// Value the worker resumes with
        #[arg(long)]
        value: Option<String>,
        /// Resume with an error instead
        #[arg(long)]
        fail: bool,
        /// Programmatic timeout overriding the route policy
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Cancel an in-flight response
    Cancel { id: String },
    /// Show in-flight responses and declared routes
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Get {
            route,
            delay_ms,
            value,
            fail,
            timeout_ms,
        } => {
            let mut query: Vec<(&str, String)> = vec![("delay_ms", delay_ms.to_string())];
            if let Some(value) = value {
                query.push(("value", value));
            }
            if fail {
                query.push(("fail", "true".to_string()));
            }
            if let Some(ms) = timeout_ms {
                query.push(("timeout_ms", ms.to_string()));
            }

            let res = client
                .get(format!("{}/deferred/{}", cli.url, route))
                .query(&query)
                .send()
                .await?;
            let id = res
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string();
            let status = res.status();
            let body = res.text().await?;
            println!("{} {} {}", id, status, body);
        }
        Commands::Cancel { id } => {
            let res = client
                .post(format!("{}/deferred/{}/cancel", cli.url, id))
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;
            if status.is_success() {
                println!("cancelled {}", id);
            } else {
                eprintln!("Error: server returned status {}: {}", status, body);
            }
        }
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
