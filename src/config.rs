//! Runtime configuration.
//!
//! A plain value constructed once at startup and passed to whatever needs
//! it; there is no ambient settings global. A `settings.json` in the data
//! directory can override the defaults.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_APP_DATA_URL: &str = "https://data.appdeck.dev/featured/apps.json";
const DEFAULT_CATE_DATA_URL: &str = "https://data.appdeck.dev/featured/cates.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefer the downloaded metadata documents over the bundled tables.
    pub use_remote_data: bool,
    pub app_data_url: String,
    pub cate_data_url: String,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_remote_data: true,
            app_data_url: DEFAULT_APP_DATA_URL.to_string(),
            cate_data_url: DEFAULT_CATE_DATA_URL.to_string(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(default_data_dir())
    }

    /// Load `settings.json` from the given data directory, falling back to
    /// defaults when it is absent or malformed.
    pub fn load_from(data_dir: PathBuf) -> Self {
        let path = data_dir.join("settings.json");
        let mut cfg = match fs::read_to_string(&path) {
            Ok(doc) => serde_json::from_str(&doc).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "malformed settings file, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        cfg.data_dir = data_dir;
        cfg
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join("data")
    }

    pub fn app_data_path(&self) -> PathBuf {
        self.data_path().join("apps.json")
    }

    pub fn cate_data_path(&self) -> PathBuf {
        self.data_path().join("cates.json")
    }

    pub fn logo_dir(&self) -> PathBuf {
        self.data_dir.join("logos")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("appdeck.log")
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local/share/appdeck")
}
