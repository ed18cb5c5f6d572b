use clap::{Parser, Subcommand};
use std::io::Write;

use minihttpd::batch::RequestRecord;
use minihttpd::client::{Client, RawResponse};

#[derive(Parser)]
#[command(name = "minihttpd-client")]
#[command(about = "Demonstration client for minihttpd", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Bearer token; pass an empty string to omit the Authorization header.
    #[arg(short, long, default_value = "token")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a GET request
    Get { path: String },
    /// Send a POST request
    Post { path: String },
    /// Send a request with an arbitrary method
    Request { method: String, path: String },
    /// Read /stream-response chunk by chunk
    Stream,
    /// Send a batch envelope; each item is METHOD:PATH
    Batch {
        #[arg(required = true)]
        items: Vec<String>,
    },
    /// Run the scripted walkthrough of every route
    Demo,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new(cli.addr.clone());

    let auth = format!("Bearer {}", cli.token);
    let mut headers = vec![("Host", cli.addr.as_str())];
    if !cli.token.is_empty() {
        headers.push(("Authorization", auth.as_str()));
    }

    match cli.command {
        Commands::Get { path } => {
            print_response(&client.send_request("GET", &path, &headers).await?);
        }
        Commands::Post { path } => {
            print_response(&client.send_request("POST", &path, &headers).await?);
        }
        Commands::Request { method, path } => {
            print_response(&client.send_request(&method, &path, &headers).await?);
        }
        Commands::Stream => {
            stream(&client, &headers).await?;
        }
        Commands::Batch { items } => {
            let records = items
                .iter()
                .map(|item| parse_item(item))
                .collect::<Result<Vec<_>, _>>()?;
            batch(&client, records).await?;
        }
        Commands::Demo => {
            demo(&client, &headers).await?;
        }
    }

    Ok(())
}

async fn demo(client: &Client, headers: &[(&str, &str)]) -> Result<(), Box<dyn std::error::Error>> {
    let anonymous: Vec<_> = headers
        .iter()
        .copied()
        .filter(|(key, _)| *key != "Authorization")
        .collect();

    println!("GET request:");
    print_response(&client.send_request("GET", "/test", headers).await?);

    println!("\nPOST request:");
    print_response(&client.send_request("POST", "/submit", headers).await?);

    println!("\nDELETE request (unauthorized):");
    print_response(&client.send_request("DELETE", "/delete", &anonymous).await?);

    // Each call starts the canned sequence over.
    println!("\nCanned responses:");
    for _ in 0..3 {
        print_response(&client.send_request("GET", "/generate-response", headers).await?);
    }

    println!("\nStreaming response:");
    stream(client, headers).await?;

    // Batches skip the gate, so the record without credentials is answered too.
    println!("\nBatch request:");
    let record = |method: &str, path: &str, with_auth: bool| {
        let source = if with_auth { headers } else { anonymous.as_slice() };
        source
            .iter()
            .fold(RequestRecord::new(method, path), |acc, (key, value)| {
                acc.with_header(*key, *value)
            })
    };
    batch(
        client,
        vec![
            record("GET", "/test", true),
            record("POST", "/submit", true),
            record("DELETE", "/delete", false),
            record("GET", "/test", true),
            record("POST", "/submit", true),
        ],
    )
    .await
}

/// Print each fragment the moment its frame arrives.
async fn stream(client: &Client, headers: &[(&str, &str)]) -> Result<(), Box<dyn std::error::Error>> {
    let mut chunks = client.open_stream("GET", "/stream-response", headers).await?;
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", chunks.head())?;
    stdout.flush()?;
    while let Some(fragment) = chunks.next_chunk().await? {
        write!(stdout, "{fragment}")?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

async fn batch(client: &Client, records: Vec<RequestRecord>) -> Result<(), Box<dyn std::error::Error>> {
    for reply in client.send_batch(records).await? {
        println!("{} {}", reply.status(), reply.body());
    }
    Ok(())
}

fn parse_item(item: &str) -> Result<RequestRecord, String> {
    item.split_once(':')
        .map(|(method, path)| RequestRecord::new(method, path))
        .ok_or_else(|| format!("expected METHOD:PATH, got {item:?}"))
}

fn print_response(response: &RawResponse) {
    println!("{}\r\n\r\n{}", response.head, response.body);
}
