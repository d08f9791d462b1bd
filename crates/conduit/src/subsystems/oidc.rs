//! OIDC subsystem. Placeholder depth.

use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use tracing::info;

pub struct OidcSubsystem;

impl Subsystem for OidcSubsystem {
    fn name(&self) -> &'static str {
        "oidc"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["network"]
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());
        let oidc = &ctx.config.oidc;
        if !oidc.enabled {
            readiness.no_go("OIDC disabled in configuration");
        } else if !oidc.issuer.starts_with("https://") {
            readiness.no_go(format!("Issuer must be an https URL: {}", oidc.issuer));
        } else {
            readiness.go(format!("Issuer: {}", oidc.issuer));
        }
        readiness
    }

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError> {
        info!(issuer = %ctx.config.oidc.issuer, "OIDC discovery scheduled");
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        info!("OIDC stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::test_context;
    use conduit_protocol::AppConfig;

    #[test]
    fn http_issuer_is_no_go() {
        let mut config = AppConfig::default();
        config.oidc.enabled = true;
        config.oidc.issuer = "http://issuer.example".to_string();
        assert!(!OidcSubsystem.check_readiness(&test_context(config)).ready);
    }

    #[test]
    fn https_issuer_is_go() {
        let mut config = AppConfig::default();
        config.oidc.enabled = true;
        config.oidc.issuer = "https://issuer.example".to_string();
        assert!(OidcSubsystem.check_readiness(&test_context(config)).ready);
    }
}
