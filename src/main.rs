mod client;
mod config;
mod error;
mod handlers;
mod manager;
mod models;
mod state;
mod token;
mod validator;

use std::{sync::Arc, time::Duration};

use axum::{http::Uri, routing::get, Router};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    client::SubscriptionClient,
    config::Config,
    handlers::{health, receive_event, verify_callback},
    manager::SubscriptionManager,
    models::{Credentials, SubscriptionState},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Arc::new(Config::from_env()?);
    ensure_secure_callback_url(&cfg.callback_url)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .build()?;
    let client = SubscriptionClient::new(http, cfg.api_base_url.clone());
    let manager = Arc::new(SubscriptionManager::new(
        client,
        Credentials {
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
        },
        cfg.callback_url.clone(),
        Duration::from_secs(cfg.verify_timeout_secs),
    ));

    let state = AppState {
        manager: manager.clone(),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/webhook", get(verify_callback).post(receive_event))
        .with_state(state);

    // The callback endpoint must be reachable before the provider's
    // verification GET can land, so the subscription handshake starts only
    // after the listener is bound.
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    info!("listening on {}", cfg.bind_addr);

    tokio::spawn({
        let manager = manager.clone();
        async move {
            match manager.ensure().await {
                Ok(sub) => info!(id = ?sub.id, "push subscription active"),
                Err(err) => error!("subscription setup failed: {err}"),
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Remove the provider-side registration on the way out so the next start
    // begins a clean cycle.
    if manager.state().await == SubscriptionState::Active {
        if let Err(err) = manager.teardown().await {
            error!("failed to remove subscription during shutdown: {err}");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn ensure_secure_callback_url(value: &str) -> anyhow::Result<()> {
    let uri: Uri = match value.parse() {
        Ok(uri) => uri,
        Err(_) => {
            anyhow::bail!("CALLBACK_URL is not a valid URL");
        }
    };

    let host = uri.host().unwrap_or("");
    let is_localhost = matches!(host, "localhost" | "127.0.0.1" | "::1");
    let scheme = uri.scheme_str().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("https") && !is_localhost {
        anyhow::bail!("CALLBACK_URL must be https, the provider rejects plain http callbacks");
    }

    Ok(())
}
