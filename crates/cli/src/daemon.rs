//! Daemon event loop
//!
//! The daemon runs one peer end to end:
//! - the OS watcher feeds the raw queue
//! - a poll-interval ticker drives detector drains and flushes
//! - an optional TCP listener accepts bundles from peers
//! - an optional peer address gets a bundle pushed after every idle
//!   boundary that followed changes
//!
//! Ticks and Accepts serialize on one engine lock; no raw event is
//! processed while a merge is mid-flight.

use anyhow::{Context, Result};
use distribox_sync::Engine;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;

/// Run the daemon until SIGINT/SIGTERM
pub async fn run(
    root: PathBuf,
    listen: Option<SocketAddr>,
    peer: Option<SocketAddr>,
) -> Result<()> {
    let mut engine = Engine::open(&root)?;
    engine.start_watching()?;
    let poll_interval = Duration::from_millis(engine.store().config().poll_interval_ms);
    let engine = Arc::new(Mutex::new(engine));

    tracing::info!(
        "Daemon started (PID: {}) watching {}",
        std::process::id(),
        root.display()
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    if let Some(addr) = listen {
        spawn_listener(addr, Arc::clone(&engine), shutdown_tx.subscribe()).await?;
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let had_events = match engine.lock().tick() {
                    Ok(had) => had,
                    Err(e) => {
                        tracing::error!("Tick failed: {:#}", e);
                        false
                    }
                };
                if had_events {
                    if let Some(addr) = peer {
                        if let Err(e) = push_bundle(&engine, addr).await {
                            tracing::warn!("Push to {} failed: {:#}", addr, e);
                        }
                    }
                }
            }
            _ = sigint.recv() => {
                tracing::info!("SIGINT - shutting down");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM - shutting down");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    // Final drain so nothing observed stays unflushed
    engine.lock().tick()?;
    tracing::info!("Daemon stopped");
    Ok(())
}

/// Accept loop: one whole bundle per connection, read to EOF
async fn spawn_listener(
    addr: SocketAddr,
    engine: Arc<Mutex<Engine>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to listen on {}", addr))?;
    tracing::info!("Accepting bundles on {}", addr);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Bundle listener shutting down");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, from)) => {
                            if let Err(e) = receive_bundle(stream, &engine).await {
                                tracing::warn!("Accept from {} failed: {:#}", from, e);
                            }
                        }
                        Err(e) => tracing::warn!("Listener accept error: {}", e),
                    }
                }
            }
        }
    });
    Ok(())
}

async fn receive_bundle(mut stream: TcpStream, engine: &Arc<Mutex<Engine>>) -> Result<()> {
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await?;
    tracing::info!("Received bundle ({} bytes)", bytes.len());
    engine.lock().accept(&bytes)
}

/// Build a bundle of the whole list and stream it to a peer
async fn push_bundle(engine: &Arc<Mutex<Engine>>, addr: SocketAddr) -> Result<()> {
    let archive = { engine.lock().build_bundle()? };
    let bytes = std::fs::read(&archive)?;
    let _ = std::fs::remove_file(&archive);

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;

    tracing::info!("Pushed bundle ({} bytes) to {}", bytes.len(), addr);
    Ok(())
}
