//! Notify subsystem. Placeholder depth.

use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use tracing::info;

pub struct NotifySubsystem;

impl Subsystem for NotifySubsystem {
    fn name(&self) -> &'static str {
        "notify"
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());
        let notify = &ctx.config.notify;
        if !notify.enabled {
            readiness.no_go("Notify disabled in configuration");
        } else if notify.smtp_host.is_empty() {
            readiness.no_go("No SMTP host configured");
        } else {
            readiness.go(format!("SMTP host: {}", notify.smtp_host));
        }
        readiness
    }

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError> {
        info!(smtp = %ctx.config.notify.smtp_host, "Notify channel open");
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        info!("Notify channel closed");
    }
}
