use anyhow::Context;
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use throttle_gateway::client_key::{ClientKeyResolver, ForwardedTrust};
use throttle_gateway::config::Args;
use throttle_gateway::forwarder::HttpForwarder;
use throttle_gateway::rate_limit::{MemoryRateTracker, sweep_loop};
use throttle_gateway::state::AppState;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,throttle_gateway=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // parse cli arguments
    let args = Args::parse();
    let quota = args.quota()?;
    let sweep_every = args.sweep_every()?;
    let upstream = args.upstream_url()?;
    let trust = args.forwarded_trust();

    if trust == ForwardedTrust::Any {
        tracing::warn!(
            "no trusted proxies configured, X-Forwarded-For is honored from every client"
        );
    }

    let tracker = Arc::new(MemoryRateTracker::new(quota));
    let forwarder = HttpForwarder::new(upstream.clone()).context("building upstream client")?;

    let state = Arc::new(AppState::new(
        ClientKeyResolver::new(trust),
        tracker.clone(),
        Arc::new(forwarder),
    ));

    // spawn the background sweeper
    tokio::spawn(sweep_loop(tracker, sweep_every));

    if let Some(port) = args.metrics_port {
        let addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding metrics listener on {}", addr))?;
        tracing::info!("Metrics on http://localhost:{}/metrics", port);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, throttle_gateway::metrics_app()).await {
                tracing::error!(error = %e, "metrics server stopped");
            }
        });
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding gateway listener on {}", addr))?;

    tracing::info!("Gateway running on http://localhost:{}", args.port);
    tracing::info!("Forwarding to {}", upstream);
    tracing::info!(
        "Rate limit: {} requests per {} seconds",
        quota.limit,
        quota.window.as_secs()
    );

    axum::serve(
        listener,
        throttle_gateway::app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("gateway server failed")?;

    Ok(())
}
