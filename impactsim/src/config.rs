use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::prediction::{ClientConfig, DEFAULT_METEOR_TYPE};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub meteor_type: String,
    pub use_backend: bool,
    pub request_timeout_ms: Option<u64>,
    pub retry_transient: bool,
    pub fps_cap: u32,
    pub enable_color: bool,
    pub intro_seen: bool,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            meteor_type: DEFAULT_METEOR_TYPE.to_string(),
            use_backend: true,
            request_timeout_ms: None,
            retry_transient: false,
            fps_cap: 30,
            enable_color: true,
            intro_seen: false,
            seed: None,
        }
    }
}

impl Settings {
    pub fn fps(&self) -> u32 {
        self.fps_cap.clamp(10, 120)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.backend_url.clone(),
            timeout: self.request_timeout_ms.map(Duration::from_millis),
            retry_transient: self.retry_transient,
        }
    }
}

pub struct Paths {
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "impactsim", "ImpactSim")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("impactsim.log"),
    })
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
        tracing::warn!(path = %path.display(), "settings file unreadable, using defaults");
    }
    Settings::default()
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    replace_file(&tmp, path)
}

/// Move `from` over `to`. Where renaming onto an existing file fails, the old
/// file is removed and the rename tried once more.
fn replace_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    if let Err(e) = fs::remove_file(to) {
        tracing::warn!(path = %to.display(), error = %e, "could not remove old settings file");
    }
    fs::rename(from, to)
        .with_context(|| format!("moving {} to {}", from.display(), to.display()))
}
