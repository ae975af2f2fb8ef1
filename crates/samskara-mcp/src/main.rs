//! Samskara MCP Server - persistent associative memory for AI assistants
//!
//! A JSON-RPC 2.0 (MCP) boundary over the samskara-core engine:
//!
//! - Typed, embedded, confidence-weighted memory graph
//! - Tiered hot/warm/cold storage with a cross-process write-ahead log
//! - Dense (HNSW) + sparse (BM25) retrieval fused by the resonance engine
//! - Spreading activation, attractor gravity, lateral inhibition, priming,
//!   and Hebbian reinforcement
//! - Background dynamics: decay, pruning, wisdom synthesis, snapshots

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use samskara_core::{Mind, MindConfig};

use crate::protocol::socket::SocketTransport;
use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

struct Args {
    data_dir: Option<PathBuf>,
    socket: Option<PathBuf>,
}

/// Parse command-line arguments. Exits the process for `--help` and
/// `--version`.
fn parse_args() -> Args {
    let argv: Vec<String> = std::env::args().collect();
    let mut args = Args {
        data_dir: None,
        socket: None,
    };
    let mut i = 1;

    while i < argv.len() {
        match argv[i].as_str() {
            "--help" | "-h" => {
                println!("Samskara MCP Server v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Persistent associative memory over the Model Context Protocol.");
                println!();
                println!("USAGE:");
                println!("    samskara-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Storage root (default: platform data dir)");
                println!("    --socket <PATH>         Serve on a UNIX socket instead of stdio");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                          Log filter (debug, info, ...)");
                println!("    SAMSKARA_TICK_INTERVAL_SECS       Maintenance cadence (default 600)");
                println!("    SAMSKARA_HOT_CAPACITY             Hot tier slots (default 10000)");
                println!("    SAMSKARA_*                        Engine tunables; see docs");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("samskara-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= argv.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    std::process::exit(1);
                }
                args.data_dir = Some(PathBuf::from(&argv[i]));
            }
            "--socket" => {
                i += 1;
                if i >= argv.len() {
                    eprintln!("error: --socket requires a path argument");
                    std::process::exit(1);
                }
                args.socket = Some(PathBuf::from(&argv[i]));
            }
            arg if arg.starts_with("--data-dir=") => {
                args.data_dir = arg.strip_prefix("--data-dir=").map(PathBuf::from);
            }
            arg if arg.starts_with("--socket=") => {
                args.socket = arg.strip_prefix("--socket=").map(PathBuf::from);
            }
            arg => {
                eprintln!("error: unknown argument '{}'", arg);
                eprintln!("Try 'samskara-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }
    args
}

/// Wire in the local embedder when the feature is on; the explicit-vector
/// API keeps working without it either way
#[cfg(feature = "embeddings")]
fn install_embedder(mut mind: Mind) -> Mind {
    let embedder = samskara_core::LocalEmbedder::new();
    match embedder.warm_up() {
        Ok(()) => {
            mind.set_embedder(Box::new(embedder));
            info!("local embedder ready");
        }
        Err(e) => {
            error!("embedder failed to initialize: {}", e);
            error!("text-embedding operations will return embedder_unavailable");
        }
    }
    mind
}

#[cfg(not(feature = "embeddings"))]
fn install_embedder(mind: Mind) -> Mind {
    info!("built without embeddings; text writes need an explicit vector");
    mind
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    // Logging goes to stderr; stdout carries JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("Samskara MCP Server v{} starting", env!("CARGO_PKG_VERSION"));

    let storage_root = args
        .data_dir
        .or_else(MindConfig::default_storage_root)
        .unwrap_or_else(|| {
            error!("could not determine a storage root; pass --data-dir");
            std::process::exit(1);
        });

    let config = MindConfig::from_env(storage_root);
    let mind = match Mind::open(config) {
        Ok(m) => m,
        Err(e) => {
            error!("failed to open mind: {}", e);
            std::process::exit(1);
        }
    };
    let mind = Arc::new(Mutex::new(install_embedder(mind)));

    // Background maintenance: periodic dynamics ticks; the engine
    // snapshots itself on its own cadence within them
    {
        let mind = Arc::clone(&mind);
        tokio::spawn(async move {
            let interval_secs: u64 = std::env::var("SAMSKARA_TICK_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600);
            // Let the handshake settle before the first cycle
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            loop {
                {
                    let mut mind = mind.lock().await;
                    match mind.tick() {
                        Ok(report) => info!(
                            decayed = report.decayed,
                            pruned = report.pruned,
                            wisdom = report.wisdom_created,
                            snapshotted = report.snapshotted,
                            "maintenance tick"
                        ),
                        Err(e) => warn!("maintenance tick failed: {}", e),
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
            }
        });
    }

    let server = McpServer::new(mind);
    let outcome = match args.socket {
        Some(path) => SocketTransport::new(&path).run(server).await,
        None => {
            info!("serving on stdio");
            StdioTransport::new().run(server).await
        }
    };

    if let Err(e) = outcome {
        error!("server error: {}", e);
        std::process::exit(1);
    }
    info!("Samskara MCP Server shutting down");
}
