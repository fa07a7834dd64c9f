//! Standalone MJPEG relay server
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                  # binds to 0.0.0.0:8080
//!   cargo run --example relay_server localhost        # binds to 127.0.0.1:8080
//!   cargo run --example relay_server 0.0.0.0:9090     # binds to 0.0.0.0:9090
//!
//! ## Publishing (push frames)
//!
//! One POST per JPEG frame:
//!   curl -X POST --data-binary @frame.jpg -H "Content-Type: image/jpeg" \
//!        http://localhost:8080/stream/cam-1
//!
//! Or use the uploader demo:
//!   cargo run --example uploader localhost:8080 cam-1
//!
//! ## Viewing
//!
//! Open in a browser (renders as a live image):
//!   http://localhost:8080/video/cam-1

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mjpeg_rs::registry::{ChannelId, RegistryConfig};
use mjpeg_rs::server::{Access, ConnectionInfo, MjpegServer, ServerConfig, StreamHandler};

/// Handler that logs producer and viewer activity
struct RelayHandler {
    frames: AtomicU64,
    viewers: AtomicU64,
}

impl RelayHandler {
    fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            viewers: AtomicU64::new(0),
        }
    }
}

impl StreamHandler for RelayHandler {
    async fn on_connection(&self, info: &ConnectionInfo) -> bool {
        println!("[{}] New connection from {}", info.session_id, info.peer_addr);
        true
    }

    async fn on_ingest(&self, channel: &ChannelId, info: &ConnectionInfo) -> Access {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if n == 1 || n % 100 == 0 {
            println!(
                "[{}] Ingest on channel '{}' ({} frames accepted so far)",
                info.session_id, channel, n
            );
        }
        Access::Allow
    }

    async fn on_view(&self, channel: &ChannelId, info: &ConnectionInfo) -> Access {
        let n = self.viewers.fetch_add(1, Ordering::Relaxed) + 1;
        println!(
            "[{}] Viewer #{} on channel '{}'",
            info.session_id, n, channel
        );
        Access::Allow
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:9090" -> 0.0.0.0:9090
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Usage: relay_server [BIND_ADDR]");
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8080".parse()?,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_rs=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };
    // Drop channels whose producer went away and nobody is watching
    let registry_config = RegistryConfig::default()
        .idle_channel_timeout(Duration::from_secs(60))
        .max_channels(256);

    println!("Starting MJPEG relay on {}", config.bind_addr);
    println!();
    println!("=== Push frames ===");
    println!("curl -X POST --data-binary @frame.jpg http://localhost:8080/stream/cam-1");
    println!();
    println!("=== Watch ===");
    println!("http://localhost:8080/video/cam-1");
    println!();

    let server = MjpegServer::with_registry_config(config, RelayHandler::new(), registry_config);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
