use std::io::Write;

use clap::{Parser, Subcommand};
use url::Url;

use cors_relay::relay::link::{parse_header_arg, relay_link};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Build and test links for the CORS relay", long_about = None)]
struct Cli {
    /// Relay endpoint.
    #[arg(short, long, default_value = "http://localhost:8080/")]
    relay: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the relay URL for a target
    Link {
        /// Target URL (http or https)
        target: String,
        /// Header override, as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Fetch a target through the relay; body to stdout, metadata to stderr
    Fetch {
        /// Target URL (http or https)
        target: String,
        /// Header override, as "Name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Send HEAD instead of GET
        #[arg(long)]
        head: bool,
    },
}

fn parse_headers(args: &[String]) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    args.iter()
        .map(|arg| parse_header_arg(arg).ok_or_else(|| format!("invalid header '{}', expected 'Name: value'", arg).into()))
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Link { target, headers } => {
            let link = relay_link(&cli.relay, &target, &parse_headers(&headers)?);
            println!("{}", link);
        }
        Commands::Fetch {
            target,
            headers,
            head,
        } => {
            let link = relay_link(&cli.relay, &target, &parse_headers(&headers)?);
            let client = reqwest::Client::new();
            let request = if head { client.head(link) } else { client.get(link) };
            let res = request.send().await?;

            eprintln!("HTTP {}", res.status());
            for (name, value) in res.headers() {
                eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }

            let body = res.bytes().await?;
            std::io::stdout().write_all(&body)?;
        }
    }

    Ok(())
}
