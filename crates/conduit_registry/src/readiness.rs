//! Readiness check results.
//!
//! Each subsystem's readiness check produces one of these: an authoritative
//! boolean plus an ordered list of human-readable diagnostic lines using
//! the `Go:` / `No-Go:` / `Decide:` prefix convention. The message list is
//! an audit trail only; nothing downstream branches on it.

/// Result of one subsystem readiness check. Produced fresh per check,
/// consumed by the orchestrator, then discarded.
#[derive(Debug, Clone)]
pub struct LaunchReadiness {
    pub subsystem: String,
    pub ready: bool,
    pub messages: Vec<String>,
}

impl LaunchReadiness {
    pub fn new(subsystem: impl Into<String>) -> Self {
        LaunchReadiness {
            subsystem: subsystem.into(),
            ready: true,
            messages: Vec::new(),
        }
    }

    /// Record a passing check.
    pub fn go(&mut self, message: impl AsRef<str>) {
        self.messages.push(format!("  Go:      {}", message.as_ref()));
    }

    /// Record a failing check. Any single No-Go makes the verdict No-Go.
    pub fn no_go(&mut self, message: impl AsRef<str>) {
        self.ready = false;
        self.messages
            .push(format!("  No-Go:   {}", message.as_ref()));
    }

    /// Append the final decision line and return the finished readiness.
    pub fn decide(mut self) -> Self {
        let verdict = if self.ready {
            format!("Go For Launch of {} Subsystem", self.subsystem)
        } else {
            format!("No-Go For Launch of {} Subsystem", self.subsystem)
        };
        self.messages.push(format!("  Decide:  {}", verdict));
        self
    }
}
