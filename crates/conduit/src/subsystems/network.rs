//! Network subsystem: validates the server's bind configuration.

use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use std::net::IpAddr;
use tracing::info;

pub struct NetworkSubsystem;

impl Subsystem for NetworkSubsystem {
    fn name(&self) -> &'static str {
        "network"
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());
        let server = &ctx.config.server;

        match server.bind_address.parse::<IpAddr>() {
            Ok(addr) => readiness.go(format!("Valid bind address: {}", addr)),
            Err(_) => readiness.no_go(format!("Invalid bind address: {}", server.bind_address)),
        }

        if server.port == 0 {
            readiness.no_go("Invalid port number: 0");
        } else {
            readiness.go(format!("Valid port number: {}", server.port));
        }

        readiness
    }

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError> {
        info!(
            bind = %ctx.config.server.bind_address,
            port = ctx.config.server.port,
            "Network configuration applied"
        );
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        info!("Network released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::test_context;
    use conduit_protocol::AppConfig;

    #[test]
    fn default_config_is_go() {
        let ctx = test_context(AppConfig::default());
        let readiness = NetworkSubsystem.check_readiness(&ctx);
        assert!(readiness.ready);
    }

    #[test]
    fn bad_bind_address_is_no_go() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".to_string();
        let ctx = test_context(config);
        assert!(!NetworkSubsystem.check_readiness(&ctx).ready);
    }
}
