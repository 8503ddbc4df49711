//! fuzzreq binary entry point

use clap::Parser;
use fuzzy_cli::{run, Args};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Ctrl-C stops sending between two requests
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current request...");
            on_signal.cancel();
        }
    });

    if let Err(e) = run(args, cancel).await {
        tracing::error!("fuzzreq failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}
