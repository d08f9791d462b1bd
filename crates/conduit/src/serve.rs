//! The serve loop: wire shared state, launch subsystems, await shutdown.

use anyhow::Result;
use conduit_api::{ConduitService, Dispatcher, StaticTokenValidator, TokenValidator};
use conduit_dqm::{PendingRegistry, QueueManager};
use conduit_protocol::AppConfig;
use conduit_registry::{LaunchContext, Orchestrator, SubsystemRegistry};
use std::sync::Arc;
use tracing::info;

use crate::subsystems;

pub async fn run(config: AppConfig) -> Result<()> {
    let config = Arc::new(config);
    let registry = Arc::new(SubsystemRegistry::new());
    let ctx = LaunchContext {
        config: Arc::clone(&config),
        registry: Arc::clone(&registry),
    };

    // Shared state is constructed once here and passed by reference;
    // nothing downstream reaches for globals.
    let pending = Arc::new(PendingRegistry::new());
    let manager = Arc::new(QueueManager::new());
    let dispatcher = Dispatcher::new(Arc::clone(&manager), Arc::clone(&pending));
    // Token validation is an external service; the static validator is the
    // stand-in until one is wired.
    let validator: Arc<dyn TokenValidator> = Arc::new(StaticTokenValidator::new());
    let service = Arc::new(ConduitService::new(dispatcher, validator));

    let mut orchestrator = Orchestrator::new(Arc::clone(&registry));
    for subsystem in subsystems::build_all(&manager, &pending, &service) {
        orchestrator.add(subsystem)?;
    }

    let report = orchestrator.launch_all(&ctx);
    info!(
        started = report.started,
        no_go = report.no_go,
        failed = report.failed,
        "Launch complete"
    );
    if !report.all_started() {
        orchestrator.land_all(&ctx);
        anyhow::bail!(
            "launch failed: {} of {} Go subsystems started",
            report.started,
            report.go
        );
    }

    info!("conduit running; send SIGINT or SIGTERM to land");
    wait_for_shutdown().await;

    info!("Landing sequence initiated");
    orchestrator.land_all(&ctx);
    info!("conduit stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
