//! mDNS client subsystem. Placeholder depth.

use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use tracing::info;

pub struct MdnsClientSubsystem;

impl Subsystem for MdnsClientSubsystem {
    fn name(&self) -> &'static str {
        "mdns_client"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["network"]
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());
        if !ctx.config.mdns.enabled {
            readiness.no_go("mDNS client disabled in configuration");
        } else if ctx.config.mdns.hostname.is_empty() {
            readiness.no_go("No mDNS hostname configured");
        } else {
            readiness.go(format!("Hostname: {}", ctx.config.mdns.hostname));
        }
        readiness
    }

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError> {
        info!(hostname = %ctx.config.mdns.hostname, "mDNS client browsing");
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        info!("mDNS client stopped");
    }
}
