//! Dispatcher settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime settings for [`MessageDispatcher`](crate::MessageDispatcher).
///
/// Deserializable so hosts can embed it in their own configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Upper bound for a single handler invocation, in milliseconds.
    ///
    /// `None` or `0` disables the limit: a handler that never completes
    /// blocks the remaining handlers for that message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_timeout_ms: Option<u64>,
}

impl DispatcherConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
