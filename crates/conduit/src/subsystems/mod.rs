//! Concrete subsystem implementations.
//!
//! Each module owns one subsystem's readiness check and start/stop logic;
//! the orchestrator drives them in the order `build_all` returns, which is
//! also the dependency order.

mod api;
mod database;
mod mdns_client;
mod network;
mod notify;
mod oidc;
mod webserver;
mod websocket;

pub use api::ApiSubsystem;
pub use database::DatabaseSubsystem;
pub use mdns_client::MdnsClientSubsystem;
pub use network::NetworkSubsystem;
pub use notify::NotifySubsystem;
pub use oidc::OidcSubsystem;
pub use webserver::WebServerSubsystem;
pub use websocket::WebSocketSubsystem;

use conduit_api::ConduitService;
use conduit_dqm::{PendingRegistry, QueueManager};
use conduit_registry::Subsystem;
use std::sync::Arc;

/// Every managed subsystem, in launch order.
pub fn build_all(
    manager: &Arc<QueueManager>,
    pending: &Arc<PendingRegistry>,
    service: &Arc<ConduitService>,
) -> Vec<Box<dyn Subsystem>> {
    vec![
        Box::new(NetworkSubsystem),
        Box::new(DatabaseSubsystem::new(
            Arc::clone(manager),
            Arc::clone(pending),
        )),
        Box::new(WebServerSubsystem::new(Arc::clone(service))),
        Box::new(ApiSubsystem),
        Box::new(WebSocketSubsystem),
        Box::new(MdnsClientSubsystem),
        Box::new(OidcSubsystem),
        Box::new(NotifySubsystem),
    ]
}

#[cfg(test)]
pub(crate) fn test_context(config: conduit_protocol::AppConfig) -> conduit_registry::LaunchContext {
    conduit_registry::LaunchContext {
        config: Arc::new(config),
        registry: Arc::new(conduit_registry::SubsystemRegistry::new()),
    }
}
