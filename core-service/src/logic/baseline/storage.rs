use std::fs;
use std::path::Path;

use super::types::BaselineProfile;
use super::validate::{validate_baseline, BaselineError};

/// Save baseline to disk (write temp file, then rename)
pub fn save_baseline(profile: &BaselineProfile, path: &Path) -> Result<(), BaselineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(profile)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load baseline from disk with validation
pub fn load_baseline(path: &Path) -> Result<BaselineProfile, BaselineError> {
    if !path.exists() {
        return Err(BaselineError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Baseline file not found",
        )));
    }

    let data = fs::read(path)?;
    let profile: BaselineProfile = serde_json::from_slice(&data)?;

    validate_baseline(&profile)?;

    Ok(profile)
}

/// Remove the persisted baseline, if any
pub fn delete_baseline(path: &Path) -> Result<(), BaselineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
