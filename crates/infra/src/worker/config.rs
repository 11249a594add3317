use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// When a worker acknowledges a delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Acknowledge as soon as the delivery is received (at-most-once).
    ///
    /// A crash between dequeue and publish loses the job; its id stays pending.
    OnDequeue,
    /// Acknowledge only once the outcome is stored (at-least-once).
    ///
    /// A crash or store failure leads to redelivery and recomputation, which
    /// rewrites the same outcome.
    #[default]
    AfterPublish,
}

impl AckPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            AckPolicy::OnDequeue => "on_dequeue",
            AckPolicy::AfterPublish => "after_publish",
        }
    }
}

impl core::fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ack policy {0:?} (expected on_dequeue or after_publish)")]
pub struct ParseAckPolicyError(String);

impl FromStr for AckPolicy {
    type Err = ParseAckPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on_dequeue" => Ok(AckPolicy::OnDequeue),
            "after_publish" => Ok(AckPolicy::AfterPublish),
            other => Err(ParseAckPolicyError(other.to_string())),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Consumer name; also used for logging and the thread name
    pub name: String,
    /// How long one receive blocks before re-checking for shutdown
    pub poll_interval: Duration,
    pub ack_policy: AckPolicy,
    /// Retries for storing an outcome
    pub publish_retry: RetryPolicy,
    /// Retries for declaring the channel at startup
    pub connect_retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            poll_interval: Duration::from_millis(250),
            ack_policy: AckPolicy::default(),
            publish_retry: RetryPolicy::exponential(
                3,
                Duration::from_millis(50),
                Duration::from_secs(1),
            ),
            connect_retry: RetryPolicy::unbounded(Duration::from_millis(250), Duration::from_secs(5)),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = policy;
        self
    }

    pub fn with_publish_retry(mut self, policy: RetryPolicy) -> Self {
        self.publish_retry = policy;
        self
    }

    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }
}
