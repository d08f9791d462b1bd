//! API subsystem: registers the conduit endpoints with the web server.

use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use tracing::info;

const ENDPOINTS: [&str; 4] = [
    "/api/conduit/query",
    "/api/conduit/queries",
    "/api/conduit/auth_queries",
    "/api/conduit/status",
];

pub struct ApiSubsystem;

impl Subsystem for ApiSubsystem {
    fn name(&self) -> &'static str {
        "api"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["webserver"]
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());
        if ctx.config.server.api_prefix.is_empty() {
            readiness.no_go("Empty API prefix");
        } else {
            readiness.go(format!("{} endpoints to register", ENDPOINTS.len()));
        }
        readiness
    }

    fn start(&mut self, _ctx: &LaunchContext) -> Result<(), LaunchError> {
        for endpoint in ENDPOINTS {
            info!(endpoint, "Endpoint registered");
        }
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        info!("Endpoints deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::test_context;
    use conduit_protocol::AppConfig;

    #[test]
    fn empty_prefix_is_no_go() {
        let mut config = AppConfig::default();
        config.server.api_prefix = String::new();
        assert!(!ApiSubsystem.check_readiness(&test_context(config)).ready);
    }
}
