//! Operator-facing error channel.
//!
//! Command rejections, provisioning failures and scan failures are published
//! here as structured events. Whatever renders the session (terminal, log,
//! dialog) subscribes and decides how to show them.
use std::sync::Arc;

use serde::Serialize;

use crate::fanout::{Fanout, Feed};

const ERROR_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    /// Text to show the operator, verbatim from the device when it sent one
    pub message: String,
    /// What was being attempted, e.g. `fert/calibrate`
    pub context: String,
}

impl ErrorEvent {
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: context.into(),
        }
    }
}

impl std::fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}

#[derive(Clone)]
pub struct ErrorBus {
    fanout: Arc<Fanout<ErrorEvent>>,
}

impl Default for ErrorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorBus {
    pub fn new() -> Self {
        Self {
            fanout: Arc::new(Fanout::new(ERROR_QUEUE_DEPTH)),
        }
    }

    pub fn subscribe(&self) -> Feed<ErrorEvent> {
        self.fanout.subscribe()
    }

    pub fn publish(&self, event: ErrorEvent) {
        tracing::warn!(context = %event.context, message = %event.message, "operator error");
        self.fanout.send(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_published_errors() {
        let bus = ErrorBus::new();
        let a = bus.subscribe();
        let b = bus.clone().subscribe();
        bus.publish(ErrorEvent::new("fert/calibrate", "invalid channel"));
        assert_eq!(a.try_recv().unwrap().message, "invalid channel");
        assert_eq!(b.try_recv().unwrap().to_string(), "fert/calibrate: invalid channel");
    }
}
