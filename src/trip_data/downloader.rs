use crate::trip_data::error::TripDataError;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::{fs, task};
use tokio_util::io::StreamReader;
use zip::ZipArchive;

pub const DEFAULT_TRIP_DATA_URL: &str = "https://s3.amazonaws.com/tripdata/";

/// Archive file name for a month id such as `JC-202401`.
pub fn archive_name(month: &str) -> String {
    format!("{month}-citibike-tripdata.csv.zip")
}

/// Downloads monthly trip archives and extracts them into a flat raw-data directory.
pub struct TripDownloader {
    base_url: String,
    raw_dir: PathBuf,
    download_client: Client,
}

impl TripDownloader {
    pub fn new(base_url: impl Into<String>, raw_dir: &Path) -> TripDownloader {
        TripDownloader {
            base_url: base_url.into(),
            raw_dir: raw_dir.to_path_buf(),
            download_client: Client::new(),
        }
    }

    pub fn archive_url(&self, month: &str) -> String {
        format!("{}{}", self.base_url, archive_name(month))
    }

    /// Downloads and extracts every month in order, returning all extracted file paths.
    ///
    /// A month whose archive answers with an HTTP error status is logged and skipped so one
    /// unpublished month doesn't sink the whole batch. Network, I/O and archive errors abort.
    pub async fn download_months<S: AsRef<str>>(
        &self,
        months: &[S],
    ) -> Result<Vec<PathBuf>, TripDataError> {
        self.ensure_raw_dir().await?;
        let mut extracted = Vec::new();
        for month in months.iter().map(AsRef::as_ref) {
            match self.download_month(month).await {
                Ok(files) => extracted.extend(files),
                Err(TripDataError::HttpStatus { url, status, .. }) => {
                    warn!("Skipping {}: {} answered {}", month, url, status);
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Extracted {} trip files into {}",
            extracted.len(),
            self.raw_dir.display()
        );
        Ok(extracted)
    }

    /// Downloads and extracts a single month.
    pub async fn download_month(&self, month: &str) -> Result<Vec<PathBuf>, TripDataError> {
        self.ensure_raw_dir().await?;
        let bytes = self.download(month).await?;
        info!("Extracting {}", archive_name(month));
        let raw_dir = self.raw_dir.clone();
        let month_owned = month.to_string();
        task::spawn_blocking(move || extract_archive(bytes, &month_owned, &raw_dir)).await?
    }

    async fn ensure_raw_dir(&self) -> Result<(), TripDataError> {
        match fs::metadata(&self.raw_dir).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(TripDataError::RawDirNotADirectory(self.raw_dir.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(&self.raw_dir)
                .await
                .map_err(|e| TripDataError::RawDirCreation(self.raw_dir.clone(), e)),
            Err(e) => Err(TripDataError::RawDirCreation(self.raw_dir.clone(), e)),
        }
    }

    async fn download(&self, month: &str) -> Result<Vec<u8>, TripDataError> {
        let url = self.archive_url(month);
        info!("Downloading {}", url);

        let response = self
            .download_client
            .get(&url)
            .send()
            .await
            .map_err(|e| TripDataError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(if let Some(status) = e.status() {
                    TripDataError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    TripDataError::NetworkRequest(url, e)
                });
            }
        };

        let stream = response.bytes_stream().map_err(io::Error::other);
        let mut reader = StreamReader::new(stream);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        info!("Downloaded {} bytes for {}", bytes.len(), month);
        Ok(bytes)
    }
}

/// Writes every file member of a zip archive into `out_dir`, dropping the member's
/// directory components. Directory members and unsafe paths are skipped.
pub(crate) fn extract_archive(
    bytes: Vec<u8>,
    month: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, TripDataError> {
    let zip_err = |source| TripDataError::ZipArchive {
        month: month.to_string(),
        source,
    };
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_err)?;
    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        if entry.is_dir() {
            continue;
        }
        let Some(member) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!("Skipping archive member with unsafe path: {}", entry.name());
            continue;
        };
        if is_resource_fork(&member) {
            debug!("Skipping macOS metadata member {}", entry.name());
            continue;
        }
        let Some(file_name) = member.file_name().map(|f| f.to_os_string()) else {
            continue;
        };
        let target = out_dir.join(file_name);
        let mut outfile =
            File::create(&target).map_err(|e| TripDataError::ExtractWrite(target.clone(), e))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|e| TripDataError::ExtractWrite(target.clone(), e))?;
        written.push(target);
    }
    Ok(written)
}

/// `__MACOSX/` folders and `._*` AppleDouble files that macOS adds to archives.
pub(crate) fn is_resource_fork(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == "__MACOSX")
        || path
            .file_name()
            .and_then(|f| f.to_str())
            .is_some_and(|f| f.starts_with("._"))
}
