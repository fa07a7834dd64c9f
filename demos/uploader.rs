//! Frame uploader pushing synthetic frames to a relay
//!
//! Run with: cargo run --example uploader [RELAY_ADDR] [CHANNEL]
//!
//! Examples:
//!   cargo run --example uploader                          # localhost:8080, channel "default"
//!   cargo run --example uploader localhost:8080 cam-1
//!
//! Start a relay first (cargo run --example relay_server), then watch at
//! http://localhost:8080/video/<CHANNEL>.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use mjpeg_rs::client::{ClientConfig, FrameUploader, UploadEvent};
use mjpeg_rs::registry::ChannelId;

fn fake_jpeg(seq: u64, size: usize) -> Bytes {
    let mut data = vec![0u8; size];
    data[0] = 0xFF;
    data[1] = 0xD8;
    data[size - 2] = 0xFF;
    data[size - 1] = 0xD9;
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

    let args: Vec<String> = std::env::args().collect();

    let relay_addr: SocketAddr = args
        .get(1)
        .map(|a| a.replace("localhost", "127.0.0.1"))
        .unwrap_or_else(|| "127.0.0.1:8080".into())
        .parse()?;
    let channel = args
        .get(2)
        .map(|c| ChannelId::new(c.clone()))
        .unwrap_or_else(ChannelId::single);

    println!("Uploading to http://{}/stream/{}", relay_addr, channel);
    println!("Watch at http://{}/video/{}", relay_addr, channel);
    println!();

    let config = ClientConfig::new(relay_addr, channel);
    let (mut uploader, mut events) = FrameUploader::new(config);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                UploadEvent::Connected(addr) => println!("Connected to {}", addr),
                UploadEvent::Sent { seq, len } if seq % 100 == 0 => {
                    println!("Uploaded {} frames (last {} bytes)", seq, len);
                }
                UploadEvent::Sent { .. } => {}
                UploadEvent::Error(e) => eprintln!("Upload error: {}", e),
                UploadEvent::Disconnected => println!("Disconnected"),
            }
        }
    });

    // ~10 fps; a dropped frame is reported and the next send reconnects
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                seq += 1;
                let _ = uploader.send(fake_jpeg(seq, 8192)).await;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
        }
    }

    uploader.close().await;
    Ok(())
}
