// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Client, Resource,
};
use lbdns::{
    azure::AzureDnsClient,
    config::{Cli, Config, Source},
    controller::Controller,
    metrics,
    provider::{DnsApi, ProviderAdapter},
    snapshot::SnapshotSource,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("lbdns-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let config = Cli::parse().resolve().context("Invalid configuration")?;
    info!(
        source = ?config.source,
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        resource_group = %config.azure.resource_group,
        flavor = ?config.azure.flavor,
        dry_run = config.adapter.dry_run,
        "Starting lbdns"
    );

    tokio::spawn(serve_metrics(config.metrics_addr));

    let api: Arc<dyn DnsApi> = Arc::new(
        AzureDnsClient::new(config.credentials.clone(), config.azure.clone())
            .context("Failed to create Azure DNS client")?,
    );
    let adapter = Arc::new(ProviderAdapter::new(api, config.adapter.clone()));
    log_inventory(&adapter).await;

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let result = match config.source {
        Source::Service => run_controller::<Service>(client, &config, adapter).await,
        Source::Ingress => run_controller::<Ingress>(client, &config, adapter).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "Controller exited with an error");
    }
    result
}

/// Log the records currently published, so operators can see the starting state.
async fn log_inventory(adapter: &ProviderAdapter) {
    match adapter.records().await {
        Ok(entries) => {
            info!(count = entries.len(), "Loaded current DNS records");
            for entry in entries {
                debug!(fqdn = %entry.fqdn, record_type = %entry.record_type, value = %entry.value, ttl = ?entry.ttl, "Existing record");
            }
        }
        Err(e) => warn!(error = %e, "Failed to list current DNS records"),
    }
}

async fn run_controller<K>(client: Client, config: &Config, adapter: Arc<ProviderAdapter>) -> Result<()>
where
    K: SnapshotSource + Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<K> = match &config.namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };
    let stream = watcher(api, watcher::Config::default()).default_backoff();

    let controller = Controller::new(K::KIND, adapter, config.controller.clone());
    controller
        .run(stream, config.markers.clone(), shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn serve_metrics(addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind metrics endpoint");
            return;
        }
    };
    info!(addr = %addr, "Serving metrics on /metrics");
    if let Err(e) = axum::serve(listener, router()).await {
        error!(error = %e, "Metrics endpoint stopped");
    }
}
