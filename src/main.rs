//! The `multy-provider` plugin binary.
//!
//! Spawned by the Hemmer host; prints the handshake line on stdout and serves
//! until it receives SIGTERM or SIGINT.

use multy_provider::{init_logging, serve, MultyProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Multy provider");
    serve(MultyProvider::new()).await
}
