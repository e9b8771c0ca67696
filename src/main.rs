use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use todago_notify_relay::config::Settings;
use todago_notify_relay::dispatcher::NotificationDispatcher;
use todago_notify_relay::trigger::server::{create_router, TriggerState};
use todago_notify_relay::FirebaseApp;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::new()?;
    tracing::info!(
        collection = %settings.dispatch.collection,
        max_instances = settings.dispatch.max_instances,
        verify_before_send = settings.dispatch.verify_before_send,
        dry_run = settings.dispatch.dry_run,
        "Configuration loaded"
    );

    let app = FirebaseApp::from_config(&settings.firebase).await?;
    tracing::info!(project_id = app.project_id(), "Firebase clients initialized");

    let dispatcher = NotificationDispatcher::new(
        Arc::new(app.firestore()?),
        Arc::new(app.messaging()),
        settings.dispatch.clone(),
    );
    let router = create_router(TriggerState::new(Arc::new(dispatcher)));

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening for document events on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
