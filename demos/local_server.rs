//! Local MJPEG server with an in-process producer
//!
//! Run with: cargo run --example local_server
//!
//! The producer ingests synthetic frames directly through the registry
//! (no network hop), the way a capture pipeline on the same device
//! would. Watch in a browser on the same network:
//!
//!   http://<device-ip>:8080/video

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mjpeg_rs::registry::ChannelId;
use mjpeg_rs::server::{MjpegServer, ServerConfig};

/// Build a synthetic frame: JPEG SOI/EOI markers around filler bytes.
///
/// Browsers will not render these as images, but they exercise the full
/// ingest and fan-out path; swap in a real encoder for actual video.
fn fake_jpeg(seq: u64, size: usize) -> Bytes {
    let mut data = vec![0u8; size];
    data[0] = 0xFF;
    data[1] = 0xD8;
    data[size - 2] = 0xFF;
    data[size - 1] = 0xD9;
    // Stamp the sequence so consecutive frames differ
    data[2..10].copy_from_slice(&seq.to_be_bytes());
    Bytes::from(data)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_rs=debug".parse()?),
        )
        .init();

    let config = ServerConfig::default();
    let server = MjpegServer::new(config);

    println!("Starting local MJPEG server on {}", server.bind_addr());
    println!("Watch at http://<device-ip>:8080/video");
    println!();

    // Producer task: ~30 fps into the default channel
    let registry = Arc::clone(server.registry());
    tokio::spawn(async move {
        let channel = ChannelId::single();
        let mut interval = tokio::time::interval(Duration::from_millis(33));
        let mut seq = 0u64;

        loop {
            interval.tick().await;
            seq += 1;
            if let Err(e) = registry.ingest(&channel, fake_jpeg(seq, 4096)).await {
                eprintln!("Ingest failed: {}", e);
            }
        }
    });

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
