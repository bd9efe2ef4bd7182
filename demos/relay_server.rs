//! Relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:7700
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:7700
//!   cargo run --example relay_server 127.0.0.1:7701     # binds to 127.0.0.1:7701
//!
//! Peers speak the length-prefixed frame format of `relay_rs::protocol`:
//! JOIN a channel, send INGRESS blobs, and receive EGRESS copies of what the
//! other members send. Registry statistics are logged every 30 seconds.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_rs::server::config::DEFAULT_PORT;
use relay_rs::{RelayServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:7700
/// - "localhost:7701" -> 127.0.0.1:7701
/// - "127.0.0.1" -> 127.0.0.1:7700
/// - "0.0.0.0:7700" -> 0.0.0.0:7700
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => ServerConfig::with_addr(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_rs=debug".parse()?)
                .add_directive("relay_server=info".parse()?),
        )
        .init();

    let server = RelayServer::new(config);

    let registry = Arc::clone(server.registry());
    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let stats = registry.stats().await;
            tracing::info!(
                active = stats.active_channels,
                created = stats.channels_created,
                removed = stats.channels_removed,
                rejected = stats.joins_rejected,
                dropped = stats.messages_dropped,
                "Relay stats"
            );
        }
    });

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    reporter.abort();
    println!("Relay server stopped");

    Ok(())
}
