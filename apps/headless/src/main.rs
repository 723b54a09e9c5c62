use anyhow::{Context, Result};
use clap::Parser;
use client_core::{PageHandle, RemoteInvocationClient, UiBridge};
use shared::domain::ControlId;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Loads a server-driven page, clicks controls in order and prints the
/// resulting page.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, env = "APP__SERVER_URL", default_value = "http://127.0.0.1:8443/")]
    server_url: String,
    /// Control id to click; repeat to click several in order.
    #[arg(long = "click", value_name = "CONTROL_ID")]
    clicks: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let client = RemoteInvocationClient::new(&args.server_url)
        .with_context(|| format!("invalid server url '{}'", args.server_url))?;
    let bridge = UiBridge::new(PageHandle::new(), client);
    bridge
        .load()
        .await
        .context("failed to load the creation script")?;
    info!(server_url = %args.server_url, "page loaded");

    for raw in &args.clicks {
        let control_id = ControlId::new(raw.as_str())?;
        let pending = match bridge.click(&control_id).await {
            Ok(pending) => pending,
            Err(err) => {
                error!(%control_id, kind = ?err.kind(), error = %err, "click failed");
                continue;
            }
        };
        for invocation in pending {
            let owner = invocation
                .descriptor()
                .map(|d| d.control_id.to_string())
                .unwrap_or_default();
            if let Err(err) = invocation.outcome().await {
                error!(%control_id, %owner, kind = ?err.kind(), error = %err, "server event failed");
            }
        }
    }

    print!("{}", bridge.page().outline().await);
    Ok(())
}
