use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::storage;
use super::types::{Alert, AlertCounts, AlertError, AlertFilter, AlertStatus, AlertStore, Detection};
use crate::logic::config::AlertConfig;
use crate::logic::model::Severity;
use crate::logic::set_aside_corrupt;

/// Durable alert store
///
/// One lock guards the in-memory store and its synchronous save, so ids
/// are handed out strictly increasing across concurrent callers.
pub struct AlertManager {
    config: AlertConfig,
    path: Option<PathBuf>,
    store: Mutex<AlertStore>,
}

impl AlertManager {
    /// Open the store at `path`; an unreadable file is moved aside, never overwritten
    pub fn open(config: AlertConfig, path: Option<PathBuf>) -> Self {
        let mut path = path;
        let store = match path.clone().as_deref() {
            Some(p) if p.exists() => match storage::load_alerts(p) {
                Ok(store) => {
                    log::info!(
                        "Loaded {} alerts (counter {})",
                        store.alerts.len(),
                        store.alert_counter
                    );
                    store
                }
                Err(e) => {
                    log::error!("Failed to load alerts from {}: {}. Starting empty.", p.display(), e);
                    let mut store = AlertStore::new();
                    store.alert_counter = storage::recover_counter(p);
                    match set_aside_corrupt(p) {
                        Ok(moved) => log::warn!(
                            "Unreadable alert store kept at {}; ids continue after {}",
                            moved.display(),
                            store.alert_counter
                        ),
                        Err(err) => {
                            log::error!(
                                "Cannot move {} aside: {}. Alerts stay in memory only.",
                                p.display(),
                                err
                            );
                            path = None;
                        }
                    }
                    store
                }
            },
            _ => AlertStore::new(),
        };

        Self {
            config,
            path,
            store: Mutex::new(store),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a detection, returning its id
    pub fn add(&self, detection: Detection) -> u64 {
        self.add_at(detection, Utc::now())
    }

    pub fn add_at(&self, detection: Detection, timestamp: DateTime<Utc>) -> u64 {
        let mut store = self.store.lock();
        store.alert_counter += 1;
        let id = store.alert_counter;

        let alert = Alert::from_detection(id, timestamp, detection);
        log::warn!(
            "ALERT #{} [{}] {} {} -> {} ({:.2}, {})",
            id,
            alert.severity,
            alert.threat,
            alert.src_ip,
            alert.dst_ip,
            alert.confidence,
            alert.method
        );
        store.alerts.push(alert);

        self.save_locked(&mut store);
        id
    }

    /// Mark an alert acknowledged; false if the id is unknown
    pub fn acknowledge(&self, id: u64, user: &str, notes: Option<&str>) -> bool {
        let mut store = self.store.lock();
        let now = Utc::now();

        let Some(alert) = store.alerts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        alert.acknowledged = true;
        alert.acknowledged_by = Some(user.to_string());
        alert.acknowledged_at = Some(now);
        if let Some(n) = notes.filter(|n| !n.is_empty()) {
            alert.notes = Some(n.to_string());
        }
        store.acknowledged_alerts.insert(id);

        self.save_locked(&mut store);
        true
    }

    pub fn update_status(&self, id: u64, status: &str, notes: Option<&str>) -> Result<(), AlertError> {
        let status: AlertStatus = status.parse()?;
        let mut store = self.store.lock();

        let alert = store
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AlertError::NotFound(id))?;
        alert.status = status;
        if let Some(n) = notes.filter(|n| !n.is_empty()) {
            alert.notes = Some(n.to_string());
        }

        self.save_locked(&mut store);
        Ok(())
    }

    /// Filtered alerts, newest first
    pub fn query(&self, filter: &AlertFilter, limit: usize) -> Vec<Alert> {
        let store = self.store.lock();
        let mut list: Vec<Alert> = store.alerts.iter().filter(|a| filter.matches(a)).cloned().collect();
        list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        list.truncate(limit);
        list
    }

    pub fn get(&self, id: u64) -> Option<Alert> {
        self.store.lock().alerts.iter().find(|a| a.id == id).cloned()
    }

    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.query(&AlertFilter::default(), limit)
    }

    pub fn len(&self) -> usize {
        self.store.lock().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every aggregate under one lock, so the numbers agree with each other
    pub fn counts(&self) -> AlertCounts {
        let store = self.store.lock();
        let mut counts = AlertCounts {
            total: store.alerts.len(),
            by_severity: Severity::all().into_iter().map(|s| (s, 0)).collect(),
            ..AlertCounts::default()
        };
        for alert in &store.alerts {
            if !alert.acknowledged {
                counts.unacknowledged += 1;
            }
            *counts.by_severity.entry(alert.severity).or_insert(0) += 1;
            *counts.by_status.entry(alert.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn counts_by_severity(&self) -> BTreeMap<Severity, usize> {
        self.counts().by_severity
    }

    pub fn counts_by_status(&self) -> BTreeMap<AlertStatus, usize> {
        self.counts().by_status
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.store.lock().alerts.iter().filter(|a| !a.acknowledged).count()
    }

    /// Retention: delete alerts older than `days`
    pub fn prune_older_than(&self, days: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(days);
        let mut store = self.store.lock();

        let before = store.alerts.len();
        store.alerts.retain(|a| a.timestamp >= cutoff);
        let removed = before - store.alerts.len();

        if removed > 0 {
            let live: std::collections::BTreeSet<u64> = store.alerts.iter().map(|a| a.id).collect();
            store.acknowledged_alerts.retain(|id| live.contains(id));
            log::info!("Pruned {} alerts older than {} days", removed, days);
            self.save_locked(&mut store);
        }
        removed
    }

    /// Apply the configured retention
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        self.prune_older_than(self.config.retention_days, now)
    }

    pub fn flush(&self) -> Result<(), AlertError> {
        let mut store = self.store.lock();
        store.last_updated = Some(Utc::now());
        match &self.path {
            Some(path) => storage::save_alerts(&store, path),
            None => Ok(()),
        }
    }

    fn save_locked(&self, store: &mut AlertStore) {
        store.last_updated = Some(Utc::now());
        if let Some(path) = &self.path {
            if let Err(e) = storage::save_alerts(store, path) {
                log::error!("Failed to save alerts: {}", e);
            }
        }
    }
}
