//! Error taxonomy for the monitoring pipeline
//!
//! Every variant is contained at the boundary of the operation that caused
//! it; none is allowed to terminate the owning component's loop. Failures
//! surface to operators through logs and the read-only query APIs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Transient per-cycle sampling failure; logged, retried next tick
    #[error("collection failed: {0}")]
    Collection(String),

    /// A single detector failed; excluded from results, others still run
    #[error("detector '{name}' failed: {reason}")]
    Detector { name: String, reason: String },

    /// A single send attempt failed; bounded by the rate limiter, no retry queue
    #[error("notification via channel '{channel}' failed: {reason}")]
    Notification { channel: String, reason: String },

    /// Rule or channel rejected at registration time
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Load/save failure; the system continues in memory-only mode
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl MonitorError {
    pub fn collection(reason: impl Into<String>) -> Self {
        Self::Collection(reason.into())
    }

    pub fn detector(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Detector {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn notification(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Notification {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence(reason.into())
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
