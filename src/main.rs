use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};

use route_monitor_operator::controller::{DomainSource, IngressDomainSource, StaticDomain};
use route_monitor_operator::health::{HealthState, run_health_server};
use route_monitor_operator::{
    run_cluster_url_monitor_controller_scoped, run_route_monitor_controller_scoped,
};

/// Grace period for in-flight reconciliations to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("route_monitor_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("Starting route-monitor-operator");

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let watch_namespace = std::env::var("WATCH_NAMESPACE")
        .ok()
        .filter(|ns| !ns.is_empty());
    match &watch_namespace {
        Some(ns) => info!(namespace = %ns, "Watching a single namespace"),
        None => info!("Watching all namespaces"),
    }

    let domain: Arc<dyn DomainSource> = match std::env::var("CLUSTER_DOMAIN") {
        Ok(domain) if !domain.is_empty() => {
            warn!(domain = %domain, "Using CLUSTER_DOMAIN instead of the cluster ingress config");
            Arc::new(StaticDomain(domain))
        }
        _ => Arc::new(IngressDomainSource::new(client.clone())),
    };

    let health_state = Arc::new(HealthState::new());

    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let route_monitor_handle = {
        let client = client.clone();
        let health_state = health_state.clone();
        let namespace = watch_namespace.clone();
        tokio::spawn(async move {
            run_route_monitor_controller_scoped(client, Some(health_state), namespace.as_deref())
                .await;
        })
    };

    let cluster_url_monitor_handle = {
        let health_state = health_state.clone();
        let namespace = watch_namespace.clone();
        tokio::spawn(async move {
            run_cluster_url_monitor_controller_scoped(
                client,
                domain,
                Some(health_state),
                namespace.as_deref(),
            )
            .await;
        })
    };

    health_state.set_ready(true).await;

    tokio::select! {
        result = route_monitor_handle => {
            if let Err(e) = result {
                error!("RouteMonitor controller task panicked: {}", e);
            }
        }
        result = cluster_url_monitor_handle => {
            if let Err(e) = result {
                error!("ClusterUrlMonitor controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            health_state.set_ready(false).await;
            info!("Marked operator as not ready");

            info!(
                "Waiting {}s for in-flight reconciliations to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
