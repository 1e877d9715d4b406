mod request;
mod routes;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use relay_core::{RelayCfg, RelayEngine};
use relay_source::{HttpSource, SampleSource};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::routes::AppState;
use crate::shutdown::Drain;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_target(true))
        .init();

    let cfg = RelayCfg::from_env();
    for (key, value) in cfg.to_entries() {
        tracing::debug!(key, value = %value, "config");
    }

    let source: Arc<dyn SampleSource> = Arc::new(HttpSource::from_cfg(&cfg.source));
    let engine = Arc::new(RelayEngine::new(source, cfg.recent_window_minutes));
    let app = routes::router(AppState::new(engine, cfg.api_key.as_str()));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        source = %cfg.source.base_url,
        window_minutes = cfg.recent_window_minutes,
        "relay server listening"
    );

    let token = CancellationToken::new();
    shutdown::cancel_on_signal(token.clone());

    let serve = axum::serve(listener, app).with_graceful_shutdown(token.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => return Ok(result??),
        () = token.cancelled() => {}
    }

    let limit = Duration::from_secs(cfg.shutdown_timeout_secs);
    match shutdown::drain(server, limit).await? {
        Drain::Completed => tracing::info!("relay server stopped"),
        Drain::TimedOut => {
            tracing::warn!(timeout_secs = cfg.shutdown_timeout_secs, "drain timed out, exiting");
        }
    }
    Ok(())
}
