//! Web server subsystem.
//!
//! Owns the service handle the external HTTP transport drives. Connection
//! handling itself lives outside this repository; the transport adapts its
//! requests into `ApiRequest` and calls `ConduitService::handle`. The
//! handle is published while the subsystem is running and withdrawn on
//! stop.

use conduit_api::ConduitService;
use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use std::sync::Arc;
use tracing::info;

pub struct WebServerSubsystem {
    service: Arc<ConduitService>,
    published: Option<Arc<ConduitService>>,
}

impl WebServerSubsystem {
    pub fn new(service: Arc<ConduitService>) -> Self {
        WebServerSubsystem {
            service,
            published: None,
        }
    }

    /// The handle a transport adapter drives, present while running.
    pub fn published(&self) -> Option<&Arc<ConduitService>> {
        self.published.as_ref()
    }
}

impl Subsystem for WebServerSubsystem {
    fn name(&self) -> &'static str {
        "webserver"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["network", "database"]
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());
        let server = &ctx.config.server;

        if server.api_prefix.starts_with('/') {
            readiness.go(format!("Valid API prefix: {}", server.api_prefix));
        } else {
            readiness.no_go(format!(
                "API prefix must start with '/': {}",
                server.api_prefix
            ));
        }
        readiness.go(format!("Serving on {}:{}", server.bind_address, server.port));

        readiness
    }

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError> {
        self.published = Some(Arc::clone(&self.service));
        info!(
            bind = %ctx.config.server.bind_address,
            port = ctx.config.server.port,
            "Web server handle published"
        );
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        self.published = None;
        info!("Web server handle withdrawn");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::test_context;
    use conduit_api::{Dispatcher, StaticTokenValidator};
    use conduit_dqm::{PendingRegistry, QueueManager};
    use conduit_protocol::AppConfig;

    fn subsystem() -> WebServerSubsystem {
        let manager = Arc::new(QueueManager::new());
        let pending = Arc::new(PendingRegistry::new());
        WebServerSubsystem::new(Arc::new(ConduitService::new(
            Dispatcher::new(manager, pending),
            Arc::new(StaticTokenValidator::new()),
        )))
    }

    #[test]
    fn prefix_without_leading_slash_is_no_go() {
        let mut config = AppConfig::default();
        config.server.api_prefix = "api".to_string();
        let ctx = test_context(config);
        assert!(!subsystem().check_readiness(&ctx).ready);
    }

    #[test]
    fn handle_is_published_while_running() {
        let ctx = test_context(AppConfig::default());
        let mut subsystem = subsystem();
        assert!(subsystem.published().is_none());
        subsystem.start(&ctx).unwrap();
        assert!(subsystem.published().is_some());
        subsystem.stop(&ctx);
        assert!(subsystem.published().is_none());
    }
}
