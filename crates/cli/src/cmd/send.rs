//! Send command - push a bundle archive to a listening peer
//!
//! One bundle per connection: write all the bytes, shut the write half,
//! done. The receiving daemon reads to EOF and accepts.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Execute send
pub async fn execute(file: &Path, addr: SocketAddr) -> Result<()> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read bundle {}", file.display()))?;

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;

    println!("Sent {} ({} bytes) to {}", file.display(), bytes.len(), addr);
    Ok(())
}
