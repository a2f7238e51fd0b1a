//! Bounded, time-windowed retention of metric samples
//!
//! Each metric family gets its own ring with a hard capacity bound; entries
//! older than the retention horizon are evicted on every collection cycle.
//! Readers only ever get clones, never a handle into the rings.

use crate::core::{ApplicationSnapshot, MetricSample, SystemSnapshot};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// In-memory metric retention shared between the collector and its readers
pub struct MetricStore {
    max_points: usize,
    retention: Duration,
    system: RwLock<VecDeque<SystemSnapshot>>,
    application: RwLock<VecDeque<ApplicationSnapshot>>,
    custom: RwLock<HashMap<String, VecDeque<MetricSample>>>,
}

impl MetricStore {
    pub fn new(max_points: usize, retention_hours: u64) -> Self {
        Self {
            max_points,
            retention: Duration::hours(retention_hours as i64),
            system: RwLock::new(VecDeque::new()),
            application: RwLock::new(VecDeque::new()),
            custom: RwLock::new(HashMap::new()),
        }
    }

    pub fn push_system(&self, snapshot: SystemSnapshot) {
        let mut ring = self.system.write();
        if ring.len() == self.max_points {
            ring.pop_front();
        }
        ring.push_back(snapshot);
    }

    pub fn push_application(&self, snapshot: ApplicationSnapshot) {
        let mut ring = self.application.write();
        if ring.len() == self.max_points {
            ring.pop_front();
        }
        ring.push_back(snapshot);
    }

    pub fn push_sample(&self, sample: MetricSample) {
        let mut rings = self.custom.write();
        let ring = rings.entry(sample.name.clone()).or_default();
        if ring.len() == self.max_points {
            ring.pop_front();
        }
        ring.push_back(sample);
    }

    /// Drop everything older than the retention horizon, across all rings
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let mut evicted = 0;

        {
            let mut ring = self.system.write();
            while ring.front().is_some_and(|s| s.timestamp < cutoff) {
                ring.pop_front();
                evicted += 1;
            }
        }
        {
            let mut ring = self.application.write();
            while ring.front().is_some_and(|s| s.timestamp < cutoff) {
                ring.pop_front();
                evicted += 1;
            }
        }
        {
            let mut rings = self.custom.write();
            for ring in rings.values_mut() {
                while ring.front().is_some_and(|s| s.timestamp < cutoff) {
                    ring.pop_front();
                    evicted += 1;
                }
            }
            rings.retain(|_, ring| !ring.is_empty());
        }

        evicted
    }

    pub fn latest_system(&self) -> Option<SystemSnapshot> {
        self.system.read().back().cloned()
    }

    pub fn latest_application(&self) -> Option<ApplicationSnapshot> {
        self.application.read().back().cloned()
    }

    pub fn system_history(&self) -> Vec<SystemSnapshot> {
        self.system.read().iter().cloned().collect()
    }

    pub fn application_history(&self) -> Vec<ApplicationSnapshot> {
        self.application.read().iter().cloned().collect()
    }

    pub fn system_history_since(&self, cutoff: DateTime<Utc>) -> Vec<SystemSnapshot> {
        self.system
            .read()
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn application_history_since(&self, cutoff: DateTime<Utc>) -> Vec<ApplicationSnapshot> {
        self.application
            .read()
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn sample_history(&self, metric_name: &str) -> Vec<MetricSample> {
        self.custom
            .read()
            .get(metric_name)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn sample_history_since(
        &self,
        metric_name: &str,
        cutoff: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        self.custom
            .read()
            .get(metric_name)
            .map(|ring| {
                ring.iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.custom.read().keys().cloned().collect()
    }

    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            system: self.system.read().len(),
            application: self.application.read().len(),
            custom: self.custom.read().values().map(VecDeque::len).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub system: usize,
    pub application: usize,
    pub custom: usize,
}
