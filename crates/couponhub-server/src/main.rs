mod api;
mod middleware;

use std::sync::Arc;

use couponhub_core::ProviderConfig;
use couponhub_ingest::IngestionService;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = couponhub_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let providers = load_provider_configs(&config)?;
    let service = Arc::new(IngestionService::from_app_config(&config, providers)?);
    service.initialize().await?;
    service.start_scheduler().await?;

    if config.run_on_startup {
        let startup = Arc::clone(&service);
        tokio::spawn(async move {
            if let Err(e) = startup.run_ingestion_now(None).await {
                tracing::error!(error = %e, "startup ingestion run failed");
            }
        });
    }

    let app = build_app(AppState {
        service: Arc::clone(&service),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "couponhub server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await?;
    Ok(())
}

fn load_provider_configs(config: &couponhub_core::AppConfig) -> anyhow::Result<Vec<ProviderConfig>> {
    match &config.providers_path {
        Some(path) => {
            let file = couponhub_core::load_providers(path)?;
            tracing::info!(path = %path.display(), count = file.providers.len(), "loaded provider config");
            Ok(file.providers)
        }
        None => {
            tracing::info!("no providers file configured; using built-in platforms");
            Ok(couponhub_core::default_providers())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
