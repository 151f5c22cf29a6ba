use crate::data::{Config, Timetable};
use crate::error::InputError;
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let raw = fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_config(path: &Path) -> Result<Config, InputError> {
    let config: Config = read_json(path)?;
    debug!("Loaded {} sections from {}", config.sections.len(), path.display());
    Ok(config)
}

pub fn load_timetable(path: &Path) -> Result<Timetable, InputError> {
    read_json(path)
}

/// The latest materialized timetable, or the original one if no pass has
/// written `output` yet.
pub fn load_snapshot(output: &Path, original: &Path) -> Result<Timetable, InputError> {
    if output.exists() {
        info!("Continuing from {}", output.display());
        load_timetable(output)
    } else {
        info!("No previous output, starting from {}", original.display());
        load_timetable(original)
    }
}

/// Writes pretty JSON next to `path`, then renames it into place.
pub fn save_timetable(path: &Path, timetable: &Timetable) -> Result<(), InputError> {
    let json = serde_json::to_string_pretty(timetable).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let mut tmp = PathBuf::from(path);
    tmp.as_mut_os_string().push(".tmp");
    let write_err = |source| InputError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, json).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;
    info!("Saved timetable to {}", path.display());
    Ok(())
}
