use std::fs;
use std::path::{Path, PathBuf};

use super::types::{AlertError, AlertStore};

/// Write the whole store (temp file + rename)
pub fn save_alerts(store: &AlertStore, path: &Path) -> Result<(), AlertError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(store)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    // counter kept beside the store so ids survive a store that no longer parses
    let counter = counter_path(path);
    let tmp = counter.with_extension("counter.tmp");
    fs::write(&tmp, store.alert_counter.to_string())?;
    fs::rename(&tmp, &counter)?;
    Ok(())
}

pub fn counter_path(path: &Path) -> PathBuf {
    path.with_extension("counter")
}

pub fn load_alerts(path: &Path) -> Result<AlertStore, AlertError> {
    let data = fs::read(path)?;
    let mut store: AlertStore = serde_json::from_slice(&data)?;

    // counter must stay ahead of every stored id
    let max_id = store
        .alerts
        .iter()
        .map(|a| a.id)
        .max()
        .unwrap_or(0)
        .max(read_counter(path));
    if store.alert_counter < max_id {
        log::warn!(
            "Alert counter {} behind stored id {}, advancing",
            store.alert_counter,
            max_id
        );
        store.alert_counter = max_id;
    }

    Ok(store)
}

fn read_counter(path: &Path) -> u64 {
    fs::read_to_string(counter_path(path))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

/// Highest id any trace of an unreadable store still vouches for
pub fn recover_counter(path: &Path) -> u64 {
    let salvaged = fs::read(path)
        .map(|bytes| salvage_max_id(&String::from_utf8_lossy(&bytes)))
        .unwrap_or(0);
    salvaged.max(read_counter(path))
}

/// Largest `"id"` / `"alert_counter"` value in possibly truncated JSON text
pub fn salvage_max_id(text: &str) -> u64 {
    ["\"id\":", "\"alert_counter\":"]
        .iter()
        .flat_map(|key| {
            text.match_indices(key).filter_map(move |(at, _)| {
                let digits: String = text[at + key.len()..]
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse::<u64>().ok()
            })
        })
        .max()
        .unwrap_or(0)
}
