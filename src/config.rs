//! Refresh and fetch configuration.
//!
//! Defaults cover an hourly refresh of a zipped JSON dataset. Values can be
//! loaded from a JSON file and then overridden from the command line.

use crate::error::{Result, ServiceError};
use crate::resolver::MatchPolicy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default refresh cadence: once an hour.
pub const DEFAULT_INTERVAL_SECS: u64 = 60 * 60;

/// Default bound on a single dataset download.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_ARCHIVE_FILE_NAME: &str = "bin_info.zip";
pub const DEFAULT_DATASET_FILE_NAME: &str = "bin_info.json";
pub const DEFAULT_WORK_DIR: &str = "bin-data";

const DOWNLOAD_SUBDIR: &str = "download";
const EXTRACT_SUBDIR: &str = "extract";

/// Settings for the dataset refresher and its fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Remote archive location (http or https).
    pub source_url: String,

    /// Base folder for downloaded and extracted files.
    pub work_dir: PathBuf,

    /// Name used for the saved archive when the response does not provide one.
    pub archive_file_name: String,

    /// Name of the JSON payload inside the archive.
    pub dataset_file_name: String,

    /// Seconds between scheduled refreshes.
    pub interval_secs: u64,

    /// Seconds before a download is abandoned.
    pub fetch_timeout_secs: u64,

    /// Run one refresh immediately when the scheduler starts.
    pub refresh_on_start: bool,

    /// How candidates sharing a BIN are examined.
    pub match_policy: MatchPolicy,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            work_dir: PathBuf::from(DEFAULT_WORK_DIR),
            archive_file_name: DEFAULT_ARCHIVE_FILE_NAME.to_string(),
            dataset_file_name: DEFAULT_DATASET_FILE_NAME.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            refresh_on_start: true,
            match_policy: MatchPolicy::default(),
        }
    }
}

impl RefreshConfig {
    /// Loads a configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ServiceError::Config(format!("invalid config file {}: {}", path.display(), e))
        })
    }

    pub fn download_dir(&self) -> PathBuf {
        self.work_dir.join(DOWNLOAD_SUBDIR)
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.work_dir.join(EXTRACT_SUBDIR)
    }

    /// Where the JSON payload lands after extraction.
    pub fn dataset_path(&self) -> PathBuf {
        self.extract_dir().join(&self.dataset_file_name)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Checks that the configuration can drive a refresher.
    pub fn validate(&self) -> Result<()> {
        let url = self.source_url.trim();
        if url.is_empty() {
            return Err(config_error("source_url must be set"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(config_error(format!(
                "source_url must use http or https: {}",
                url
            )));
        }
        if self.interval_secs == 0 {
            return Err(config_error("interval_secs must be greater than zero"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(config_error("fetch_timeout_secs must be greater than zero"));
        }
        for (key, name) in [
            ("archive_file_name", &self.archive_file_name),
            ("dataset_file_name", &self.dataset_file_name),
        ] {
            if !is_plain_file_name(name) {
                return Err(config_error(format!(
                    "{} must be a plain file name: {:?}",
                    key, name
                )));
            }
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> ServiceError {
    ServiceError::Config(message.into())
}

/// Returns `true` for a single, non-empty path component that is not `.` or `..`.
pub(crate) fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
