use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::DEFAULT_BATCH_SIZE;

/// Key servers tried, in order, when the local keyring misses.
pub const DEFAULT_KEYSERVERS: [&str; 3] = [
    "hkps://keyserver.ubuntu.com",
    "hkps://keys.openpgp.org",
    "hkp://pgp.mit.edu",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyserverProtocol {
    /// Let gpg fetch keys with `--recv-keys`.
    #[default]
    Gpg,
    /// Fetch over HTTP and import through the keyring.
    Hkp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    /// Where artifact files live; defaults to the manifest's directory.
    pub work_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub keyservers: Vec<String>,
    pub keyserver_protocol: KeyserverProtocol,
    pub gpg_program: PathBuf,
    pub gnupg_home: Option<PathBuf>,
    /// Packages below this download count are dropped by the filter stage.
    pub min_downloads: i64,
}

impl PipelineConfig {
    /// Reads a TOML config file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("sigadopt.db")
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            work_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            keyservers: DEFAULT_KEYSERVERS.iter().map(|s| s.to_string()).collect(),
            keyserver_protocol: KeyserverProtocol::default(),
            gpg_program: PathBuf::from("gpg"),
            gnupg_home: None,
            min_downloads: 0,
        }
    }
}
