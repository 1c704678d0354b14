use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use spoofprint_core::{CaptureConfig, ClientHelloCapture, FingerprintStore};

mod output;

use output::OutputFormat;

#[derive(Parser)]
#[command(name = "spoofprint-proxy")]
#[command(about = "Honeypot listener that records the JA4 fingerprint of every TLS client")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8443)]
    port: u16,

    /// Address to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Seconds a captured fingerprint stays available for lookup
    #[arg(long, default_value_t = 300)]
    ttl_secs: u64,

    /// Largest TLS record accepted for capture
    #[arg(long, default_value_t = 16384)]
    max_record_len: usize,

    /// Give up on a silent connection after this many seconds
    #[arg(long, default_value_t = 10)]
    idle_timeout_secs: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Include the readable JA4_r form
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CaptureConfig {
        fingerprint_ttl: Duration::from_secs(cli.ttl_secs),
        max_record_len: cli.max_record_len,
    };
    config.validate().context("invalid capture settings")?;

    let addr = SocketAddr::new(cli.bind, cli.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let store = FingerprintStore::new(config.fingerprint_ttl);
    let sweeper = store.spawn_sweeper();
    let idle = Duration::from_secs(cli.idle_timeout_secs);

    info!("spoofprint listening on {}", addr);
    info!("Test with: curl -k https://localhost:{}", cli.port);
    info!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("accept failed: {}", e);
                        continue;
                    }
                };
                let store = store.clone();
                let max_record_len = config.max_record_len;
                let (format, verbose) = (cli.output, cli.verbose);
                tokio::spawn(async move {
                    handle(stream, peer, store.clone(), max_record_len, idle).await;
                    // Stand-in for the request logger: fetch by peer address.
                    let key = spoofprint_core::remote_key(&peer);
                    let fingerprint = store.lookup(&key);
                    output::print_lookup(&key, fingerprint.as_deref(), format, verbose);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    let stats = store.stats();
    debug!("{} fingerprints held at shutdown", stats.entries);
    sweeper.stop().await;
    Ok(())
}

/// Read from the peer until the ClientHello settles, the peer closes, or it
/// goes quiet. The connection is dropped afterwards; no TLS is served.
async fn handle(
    stream: TcpStream,
    peer: SocketAddr,
    store: FingerprintStore,
    max_record_len: usize,
    idle: Duration,
) {
    let mut capture = match ClientHelloCapture::accept(stream, store) {
        Ok(capture) => capture.with_max_record_len(max_record_len),
        Err(e) => {
            warn!("[{}] could not wrap connection: {}", peer, e);
            return;
        }
    };
    let mut buf = [0u8; 4096];

    while !capture.is_settled() {
        match tokio::time::timeout(idle, capture.read(&mut buf)).await {
            Ok(Ok(0)) => {
                debug!("[{}] closed before ClientHello completed", peer);
                break;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!("[{}] read failed: {}", peer, e);
                break;
            }
            Err(_) => {
                debug!("[{}] idle for {:?}, giving up", peer, idle);
                break;
            }
        }
    }
}
