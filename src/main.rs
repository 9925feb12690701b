//! Nextcloud Talk webhook probe
//!
//! Two modes:
//! - default: run a local server on `--port` (18791) that verifies the
//!   Talk HMAC signature and echoes payloads back
//! - `--test-external`: send one signed test message to the gateway on
//!   `--port` (18790)
//!
//! The shared secret is read from `~/.nanobot/config.json`
//! (`channels.nextcloud_talk.botSecret`). `RUST_LOG` controls log output.

use std::process::ExitCode;

use clap::Parser;
use nextcloud_talk_webhook::{
    server, DeliveryError, ProbeConfig, TalkEvent, WebhookClient, DEFAULT_GATEWAY_PORT,
    DEFAULT_SERVER_PORT,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "talk-webhook-probe", about = "Webhook test tool for the Nextcloud Talk channel")]
struct Cli {
    /// Port for the local webhook server (default: 18791), or of the
    /// gateway with --test-external (default: 18790)
    #[arg(long)]
    port: Option<u16>,

    /// Send a signed test message to the running gateway instead of
    /// starting the local server
    #[arg(long)]
    test_external: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "nextcloud_talk_webhook=info,talk_webhook_probe=info,tower_http=info".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ProbeConfig::load();

    let result = if cli.test_external {
        let config = config.with_gateway_port(cli.port.unwrap_or(DEFAULT_GATEWAY_PORT));
        run_client(&config).await
    } else {
        let config = config.with_server_port(cli.port.unwrap_or(DEFAULT_SERVER_PORT));
        run_server(&config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Webhook test aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run_client(config: &ProbeConfig) -> anyhow::Result<()> {
    let event = TalkEvent::test_message();
    let url = config.gateway_url();

    info!(
        base_url = %config.base_url,
        webhook_path = %config.webhook_path,
        room_token = TalkEvent::TEST_ROOM_TOKEN,
        secret_length = config.secret.len(),
        "Starting webhook test"
    );
    let pretty = serde_json::to_string_pretty(&event)?;
    info!(payload = %pretty, "Test payload");

    let client = WebhookClient::new(config);
    match client.send_event(&url, &event).await {
        Ok(report) if report.is_success() => Ok(()),
        Ok(report) => anyhow::bail!("webhook test failed with status {}", report.status),
        Err(DeliveryError::ConnectionFailed { url }) => {
            error!(
                %url,
                port = config.gateway_port,
                "Connection failed, make sure the nanobot gateway is running (`nanobot gateway`)"
            );
            anyhow::bail!("connection failed")
        }
        Err(e) => Err(e.into()),
    }
}

async fn run_server(config: &ProbeConfig) -> anyhow::Result<()> {
    let listener = server::bind(config).await.map_err(|e| {
        error!(error = %e, address = %config.bind_addr(), "Failed to bind server");
        e
    })?;

    server::serve(listener, config, server::shutdown_signal()).await?;
    Ok(())
}
