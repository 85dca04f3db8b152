// Stand-in upstream: answers every path with a fixed greeting.
use anyhow::Context;
use axum::{Json, Router};
use clap::Parser;
use serde_json::{Value, json};

#[derive(Parser, Debug)]
#[command(name = "hello-api")]
#[command(about = "Static upstream API for the throttling gateway")]
struct Args {
    #[arg(short, long, env = "HELLO_API_PORT", default_value_t = 80)]
    port: u16,
}

async fn hello_handler() -> Json<Value> {
    Json(json!({ "msg": "hello world and welcome to my fabulous api!" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    let app = Router::new().fallback(hello_handler);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!("hello api listening on {}", addr);
    axum::serve(listener, app).await.context("hello api stopped")?;
    Ok(())
}
