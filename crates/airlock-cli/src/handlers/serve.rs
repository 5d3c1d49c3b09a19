//! Serve command handler.
//!
//! Runs the loopback proxy in the foreground. This is the target the
//! default service spec points at, so `run` launches it as a child while
//! `serve` is what you use to drive it by hand.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use airlock_proxy::OllamaClient;

use crate::bootstrap::CliContext;

/// Execute the serve command. Binds `127.0.0.1` only; Ctrl-C drains the
/// server gracefully.
///
/// # Errors
///
/// Returns an error if the backend client cannot be constructed, the port
/// cannot be bound, or the server fails while running.
pub async fn execute(ctx: &CliContext, port: Option<u16>) -> Result<()> {
    let config = ctx.config();
    let port = port.unwrap_or(config.proxy_port);
    let backend = Arc::new(OllamaClient::new(config.backend_url())?);

    let listener = airlock_proxy::bind_local(port).await?;
    println!("🌐 Proxy listening on http://127.0.0.1:{port} (Ctrl+C to stop)");

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    airlock_proxy::serve(listener, backend, cancel).await
}
