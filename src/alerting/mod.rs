//! Alerting: rules, the alert lifecycle state machine, notification
//! channels, bounded dispatch, and persistence

pub mod alert;
pub mod channels;
pub mod dispatch;
pub mod manager;
pub mod persistence;
pub mod rules;

pub use alert::{alert_id, Alert, AlertStatistics, AlertStatus};
pub use channels::{ChannelKind, ChannelSender, LogSender, NotificationChannel, RateLimiter};
pub use dispatch::{DispatchCounts, Dispatcher, NotificationJob};
pub use manager::{AlertGroup, AlertManager};
pub use rules::{AlertRule, Condition, RuleState};
