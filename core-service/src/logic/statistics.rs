//! Statistics Tracker - alert counters for reporting
//!
//! Counts accepted alerts by severity, threat type, source and destination,
//! plus hourly buckets keyed `"%Y-%m-%d %H:00"` (UTC).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logic::alerts::Alert;

// ============================================================================
// CONSTANTS
// ============================================================================

const HOUR_FORMAT: &str = "%Y-%m-%d %H:00";
const TOP_N: usize = 5;
const REALTIME_TOP_SOURCES: usize = 10;
const REALTIME_HOURS: usize = 24;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsData {
    pub alerts_by_severity: BTreeMap<String, u64>,
    pub alerts_by_type: BTreeMap<String, u64>,
    pub alerts_by_source: BTreeMap<String, u64>,
    pub alerts_by_destination: BTreeMap<String, u64>,
    pub hourly_alerts: BTreeMap<String, u64>,
    pub total_alerts: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl StatisticsData {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            alerts_by_severity: BTreeMap::new(),
            alerts_by_type: BTreeMap::new(),
            alerts_by_source: BTreeMap::new(),
            alerts_by_destination: BTreeMap::new(),
            hourly_alerts: BTreeMap::new(),
            total_alerts: 0,
            start_time: now,
            last_updated: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryPeriod {
    Hourly,
    Daily,
    Weekly,
    All,
}

impl FromStr for SummaryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(SummaryPeriod::Hourly),
            "daily" => Ok(SummaryPeriod::Daily),
            "weekly" => Ok(SummaryPeriod::Weekly),
            "all" => Ok(SummaryPeriod::All),
            other => Err(format!("unknown period '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: String,
    pub alerts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: String,
    pub alerts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "period", rename_all = "snake_case")]
pub enum StatisticsSummary {
    AllTime {
        total_alerts: u64,
        high_severity: u64,
        medium_severity: u64,
        low_severity: u64,
        top_threats: Vec<(String, u64)>,
        top_sources: Vec<(String, u64)>,
        top_destinations: Vec<(String, u64)>,
        alerts_by_type: BTreeMap<String, u64>,
        alerts_by_severity: BTreeMap<String, u64>,
        start_time: DateTime<Utc>,
        uptime_hours: f64,
    },
    LastHour {
        total_alerts: u64,
        hour: String,
    },
    Last24Hours {
        total_alerts: u64,
        hourly_breakdown: Vec<HourCount>,
    },
    Last7Days {
        total_alerts: u64,
        daily_breakdown: Vec<DayCount>,
    },
}

impl StatisticsSummary {
    pub fn total_alerts(&self) -> u64 {
        match self {
            StatisticsSummary::AllTime { total_alerts, .. }
            | StatisticsSummary::LastHour { total_alerts, .. }
            | StatisticsSummary::Last24Hours { total_alerts, .. }
            | StatisticsSummary::Last7Days { total_alerts, .. } => *total_alerts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealTimeStats {
    pub total_alerts: u64,
    pub alerts_by_severity: BTreeMap<String, u64>,
    pub alerts_by_type: BTreeMap<String, u64>,
    pub top_sources: Vec<(String, u64)>,
    pub recent_hourly: BTreeMap<String, u64>,
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct StatisticsTracker {
    path: Option<PathBuf>,
    data: Mutex<StatisticsData>,
}

impl StatisticsTracker {
    pub fn open(path: Option<PathBuf>) -> Self {
        let now = Utc::now();
        let data = match path.as_deref() {
            Some(p) if p.exists() => match load(p) {
                Ok(data) => data,
                Err(e) => {
                    log::error!("Failed to load statistics: {}", e);
                    StatisticsData::new(now)
                }
            },
            _ => StatisticsData::new(now),
        };

        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn record_alert(&self, alert: &Alert) {
        self.record_alert_at(alert, Utc::now());
    }

    pub fn record_alert_at(&self, alert: &Alert, now: DateTime<Utc>) {
        let mut data = self.data.lock();
        data.total_alerts += 1;
        bump(&mut data.alerts_by_severity, alert.severity.as_str());
        bump(&mut data.alerts_by_type, &alert.threat);
        bump(&mut data.alerts_by_source, &alert.src_ip);
        bump(&mut data.alerts_by_destination, &alert.dst_ip);
        bump(&mut data.hourly_alerts, &hour_key(now));

        self.save_locked(&mut data);
    }

    pub fn summary(&self, period: SummaryPeriod) -> StatisticsSummary {
        self.summary_at(period, Utc::now())
    }

    pub fn summary_at(&self, period: SummaryPeriod, now: DateTime<Utc>) -> StatisticsSummary {
        let data = self.data.lock();
        match period {
            SummaryPeriod::All => StatisticsSummary::AllTime {
                total_alerts: data.total_alerts,
                high_severity: count(&data.alerts_by_severity, "high"),
                medium_severity: count(&data.alerts_by_severity, "medium"),
                low_severity: count(&data.alerts_by_severity, "low"),
                top_threats: top(&data.alerts_by_type, TOP_N),
                top_sources: top(&data.alerts_by_source, TOP_N),
                top_destinations: top(&data.alerts_by_destination, TOP_N),
                alerts_by_type: data.alerts_by_type.clone(),
                alerts_by_severity: data.alerts_by_severity.clone(),
                start_time: data.start_time,
                uptime_hours: (now - data.start_time).num_seconds() as f64 / 3600.0,
            },
            SummaryPeriod::Hourly => {
                let hour = hour_key(now);
                StatisticsSummary::LastHour {
                    total_alerts: count(&data.hourly_alerts, &hour),
                    hour,
                }
            }
            SummaryPeriod::Daily => {
                let hourly_breakdown: Vec<HourCount> = (0..24)
                    .rev()
                    .map(|i| {
                        let hour = hour_key(now - Duration::hours(i));
                        let alerts = count(&data.hourly_alerts, &hour);
                        HourCount { hour, alerts }
                    })
                    .collect();
                StatisticsSummary::Last24Hours {
                    total_alerts: hourly_breakdown.iter().map(|h| h.alerts).sum(),
                    hourly_breakdown,
                }
            }
            SummaryPeriod::Weekly => {
                let mut days: BTreeMap<String, u64> = BTreeMap::new();
                for i in 0..(7 * 24) {
                    let hour = hour_key(now - Duration::hours(i));
                    let alerts = count(&data.hourly_alerts, &hour);
                    *days.entry(hour[..10].to_string()).or_insert(0) += alerts;
                }
                StatisticsSummary::Last7Days {
                    total_alerts: days.values().sum(),
                    daily_breakdown: days.into_iter().map(|(date, alerts)| DayCount { date, alerts }).collect(),
                }
            }
        }
    }

    pub fn real_time(&self) -> RealTimeStats {
        let data = self.data.lock();
        let skip = data.hourly_alerts.len().saturating_sub(REALTIME_HOURS);
        RealTimeStats {
            total_alerts: data.total_alerts,
            alerts_by_severity: data.alerts_by_severity.clone(),
            alerts_by_type: data.alerts_by_type.clone(),
            top_sources: top(&data.alerts_by_source, REALTIME_TOP_SOURCES),
            recent_hourly: data.hourly_alerts.iter().skip(skip).map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }

    pub fn reset(&self) {
        let mut data = self.data.lock();
        *data = StatisticsData::new(Utc::now());
        self.save_locked(&mut data);
    }

    pub fn flush(&self) -> Result<(), std::io::Error> {
        let data = self.data.lock();
        match &self.path {
            Some(path) => save(&data, path),
            None => Ok(()),
        }
    }

    fn save_locked(&self, data: &mut StatisticsData) {
        data.last_updated = Some(Utc::now());
        if let Some(path) = &self.path {
            if let Err(e) = save(data, path) {
                log::error!("Failed to save statistics: {}", e);
            }
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn hour_key(at: DateTime<Utc>) -> String {
    at.format(HOUR_FORMAT).to_string()
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn count(map: &BTreeMap<String, u64>, key: &str) -> u64 {
    map.get(key).copied().unwrap_or(0)
}

/// Highest counts first, ties by key
fn top(map: &BTreeMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

fn load(path: &Path) -> Result<StatisticsData, std::io::Error> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(std::io::Error::from)
}

fn save(data: &StatisticsData, path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(data).map_err(std::io::Error::from)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

// ============================================================================
// TESTS
// ============================================================================
