//! WebSocket subsystem. Placeholder depth: readiness gates on
//! configuration, start/stop only log.

use conduit_registry::{LaunchContext, LaunchError, LaunchReadiness, Subsystem};
use tracing::info;

pub struct WebSocketSubsystem;

impl Subsystem for WebSocketSubsystem {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["network"]
    }

    fn check_readiness(&self, ctx: &LaunchContext) -> LaunchReadiness {
        let mut readiness = LaunchReadiness::new(self.name());
        let websocket = &ctx.config.websocket;

        if !websocket.enabled {
            readiness.no_go("WebSocket disabled in configuration");
            return readiness;
        }
        if websocket.port == 0 || websocket.port == ctx.config.server.port {
            readiness.no_go(format!("Invalid WebSocket port: {}", websocket.port));
        } else {
            readiness.go(format!("Valid WebSocket port: {}", websocket.port));
        }
        readiness
    }

    fn start(&mut self, ctx: &LaunchContext) -> Result<(), LaunchError> {
        info!(port = ctx.config.websocket.port, "WebSocket listener ready");
        Ok(())
    }

    fn stop(&mut self, _ctx: &LaunchContext) {
        info!("WebSocket listener closed");
    }
}
