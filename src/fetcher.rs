//! Dataset sources.
//!
//! A [`DatasetFetcher`] produces the complete set of range records or fails;
//! it never touches the store. Two sources are provided:
//!
//! - [`HttpArchiveFetcher`] downloads a zip archive, unpacks it and decodes
//!   the JSON payload inside.
//! - [`LocalDatasetFetcher`] reads a local `.json` file or `.zip` archive.

use crate::archive;
use crate::config::{is_plain_file_name, RefreshConfig};
use crate::error::FetchError;
use crate::record::{RangeRecord, RawRangeRecord};
use log::{debug, info, warn};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_DISPOSITION;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Produces the current dataset.
pub trait DatasetFetcher: Send + Sync {
    fn fetch(&self) -> Result<Vec<RangeRecord>, FetchError>;
}

impl<F: DatasetFetcher + ?Sized> DatasetFetcher for Box<F> {
    fn fetch(&self) -> Result<Vec<RangeRecord>, FetchError> {
        (**self).fetch()
    }
}

/// Decodes a JSON array of range rows.
///
/// Rows that fail to deserialize or violate the range invariants are logged
/// and skipped. A document that is not a JSON array is an error.
pub fn decode_dataset<R: Read>(reader: R) -> Result<Vec<RangeRecord>, FetchError> {
    let rows: Vec<serde_json::Value> = serde_json::from_reader(reader)?;
    let total = rows.len();

    let mut records = Vec::with_capacity(total);
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<RawRangeRecord>(row) {
            Ok(raw) => match raw.parse() {
                Some(record) => records.push(record),
                None => warn!(
                    "Row {}: invalid range for BIN {}, skipping",
                    index, raw.bin
                ),
            },
            Err(e) => warn!("Row {}: {}, skipping", index, e),
        }
    }

    if records.len() < total {
        warn!(
            "Dataset decoded with {} of {} rows skipped",
            total - records.len(),
            total
        );
    }
    debug!("Decoded {} range records", records.len());
    Ok(records)
}

/// Decodes the JSON file at `path`.
pub fn decode_dataset_file(path: &Path) -> Result<Vec<RangeRecord>, FetchError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FetchError::MissingPayload {
                name: path.display().to_string(),
            }
        } else {
            FetchError::Io(e)
        }
    })?;
    let records = decode_dataset(BufReader::new(file))?;
    info!("Parsed {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Extracts `archive_path` into `extract_dir` and decodes `dataset_file_name` from it.
fn unpack_and_decode(
    archive_path: &Path,
    extract_dir: &Path,
    dataset_file_name: &str,
) -> Result<Vec<RangeRecord>, FetchError> {
    let extracted = archive::extract_file(archive_path, extract_dir)?;

    // A leftover payload from an earlier archive does not count.
    let dataset_path = extract_dir.join(dataset_file_name);
    if !extracted.contains(&dataset_path) {
        return Err(FetchError::MissingPayload {
            name: dataset_file_name.to_string(),
        });
    }
    decode_dataset_file(&dataset_path)
}

/// Downloads and unpacks the remote dataset archive.
#[derive(Debug, Clone)]
pub struct HttpArchiveFetcher {
    client: Client,
    config: RefreshConfig,
}

impl HttpArchiveFetcher {
    /// Builds a fetcher whose requests are bounded by the configured timeout.
    pub fn new(config: RefreshConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout())
            .connect_timeout(config.fetch_timeout())
            .build()
            .map_err(|e| FetchError::Http {
                url: config.source_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Downloads the archive into the download directory and returns its path.
    pub fn download(&self) -> Result<PathBuf, FetchError> {
        let url = self.config.source_url.as_str();
        debug!("Downloading dataset archive from {}", url);

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let file_name = archive_file_name(&response, url, &self.config.archive_file_name);
        let download_dir = self.config.download_dir();
        fs::create_dir_all(&download_dir)?;

        let path = download_dir.join(file_name);
        let mut file = File::create(&path)?;
        let bytes = match response.copy_to(&mut file) {
            Ok(bytes) => bytes,
            Err(e) => {
                drop(file);
                discard_archive(&path);
                return Err(request_error(url, e));
            }
        };

        info!("Downloaded {} bytes to {}", bytes, path.display());
        Ok(path)
    }
}

impl DatasetFetcher for HttpArchiveFetcher {
    fn fetch(&self) -> Result<Vec<RangeRecord>, FetchError> {
        let archive_path = self.download()?;
        let result = unpack_and_decode(
            &archive_path,
            &self.config.extract_dir(),
            &self.config.dataset_file_name,
        );
        discard_archive(&archive_path);
        result
    }
}

/// Removes a downloaded archive once it has been unpacked or abandoned.
fn discard_archive(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Could not remove archive {}: {}", path.display(), e);
    }
}

fn request_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Chooses the saved archive name: `Content-Disposition` filename, then the
/// last URL path segment, then `fallback`.
fn archive_file_name(response: &Response, url: &str, fallback: &str) -> String {
    let disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok());

    file_name_from_disposition(disposition)
        .or_else(|| file_name_from_url(url))
        .unwrap_or_else(|| fallback.to_string())
}

/// Extracts `filename` from a `Content-Disposition` header value.
pub fn file_name_from_disposition(header: Option<&str>) -> Option<String> {
    let header = header?;
    let start = header.find("filename=")? + "filename=".len();
    let value = header[start..]
        .split(';')
        .next()?
        .trim()
        .trim_matches('"');
    plain_name(value)
}

/// Takes the last path segment of `url`, ignoring any query or fragment.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let without_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, path) = without_scheme.split_once('/')?;
    plain_name(path.rsplit('/').next()?)
}

/// Reduces a server-supplied name to its final component, rejecting anything else.
fn plain_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    is_plain_file_name(last).then(|| last.to_string())
}

/// Loads a dataset from a local `.json` file or `.zip` archive.
#[derive(Debug, Clone)]
pub struct LocalDatasetFetcher {
    path: PathBuf,
    extract_dir: PathBuf,
    dataset_file_name: String,
}

impl LocalDatasetFetcher {
    /// `extract_dir` and `dataset_file_name` are used only for archives.
    pub fn new(
        path: impl Into<PathBuf>,
        extract_dir: impl Into<PathBuf>,
        dataset_file_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            extract_dir: extract_dir.into(),
            dataset_file_name: dataset_file_name.into(),
        }
    }

    /// A fetcher for a plain JSON file.
    pub fn json(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extract_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::new(path, extract_dir, String::new())
    }

    fn is_archive(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    }
}

impl DatasetFetcher for LocalDatasetFetcher {
    fn fetch(&self) -> Result<Vec<RangeRecord>, FetchError> {
        if self.is_archive() {
            unpack_and_decode(&self.path, &self.extract_dir, &self.dataset_file_name)
        } else {
            decode_dataset_file(&self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DATASET: &str = r#"[
        {"bin": 411111, "min_range": "4111110000000000000", "max_range": "4111119999999999999",
         "alpha_code": "US", "bank_name": "Example Bank"},
        {"bin": 522222, "min_range": "5222220000000000000", "max_range": "5222229999999999999",
         "alpha_code": "GB", "bank_name": "Other Bank"}
    ]"#;

    #[test]
    fn test_decode_dataset() {
        let records = decode_dataset(Cursor::new(DATASET)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].alpha_code(), "GB");
    }

    #[test]
    fn test_decode_skips_invalid_rows() {
        let json = r#"[
            {"bin": 411111, "min_range": "4111110000000000000", "max_range": "4111119999999999999",
             "alpha_code": "US", "bank_name": "Example Bank"},
            {"bin": 411111, "min_range": "abc", "max_range": "4111119999999999999",
             "alpha_code": "US", "bank_name": "Broken"},
            {"bin": "not a number"},
            {"bin": 522222, "min_range": "5222229999999999999", "max_range": "5222220000000000000",
             "alpha_code": "GB", "bank_name": "Inverted"}
        ]"#;

        let records = decode_dataset(Cursor::new(json)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].bank_name(), "Example Bank");
    }

    #[test]
    fn test_decode_rejects_non_array() {
        assert!(matches!(
            decode_dataset(Cursor::new(r#"{"bin": 411111}"#)),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(
            decode_dataset(Cursor::new("[1, 2")),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_empty_array_is_empty_dataset() {
        assert!(decode_dataset(Cursor::new("[]")).unwrap().is_empty());
    }

    #[test]
    fn test_file_name_from_disposition() {
        assert_eq!(
            file_name_from_disposition(Some(r#"attachment; filename="bins.zip""#)),
            Some("bins.zip".to_string())
        );
        assert_eq!(
            file_name_from_disposition(Some("attachment; filename=bins.zip; size=10")),
            Some("bins.zip".to_string())
        );
        assert_eq!(
            file_name_from_disposition(Some(r#"attachment; filename="../../etc/bins.zip""#)),
            Some("bins.zip".to_string())
        );
        assert_eq!(file_name_from_disposition(Some("inline")), None);
        assert_eq!(file_name_from_disposition(None), None);
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/data/bins.zip?token=1"),
            Some("bins.zip".to_string())
        );
        assert_eq!(file_name_from_url("https://example.com/"), None);
        assert_eq!(file_name_from_url("https://example.com"), None);
    }

    #[test]
    fn test_local_json_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bins.json");
        fs::write(&path, DATASET).unwrap();

        let records = LocalDatasetFetcher::json(&path).fetch().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_local_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = LocalDatasetFetcher::json(dir.path().join("missing.json"));
        assert!(matches!(
            fetcher.fetch(),
            Err(FetchError::MissingPayload { .. })
        ));
    }
}
