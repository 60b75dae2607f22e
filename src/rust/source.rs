use std::fmt;
use std::io;
use std::path::PathBuf;

use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::frame::RawBatch;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Where raw batches come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    /// A CSV endpoint, typically a published spreadsheet
    Sheet { url: String },
    /// A CSV file on disk, e.g. an upload
    File { path: PathBuf },
}

impl DataSource {
    /// CSV export of the first worksheet of a Google Sheet.
    pub fn google_sheet(sheet_id: &str) -> Self {
        Self::Sheet {
            url: format!(
                "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
                sheet_id.trim()
            ),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// Cache key identifying the source
    pub fn id(&self) -> String {
        match self {
            Self::Sheet { url } => format!("sheet:{}", url),
            Self::File { path } => format!("file:{}", path.display()),
        }
    }

    pub async fn fetch(&self, client: &Client) -> Result<RawBatch, SourceError> {
        let bytes = match self {
            Self::Sheet { url } => {
                debug!("Fetching {}", url);
                let response = client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SourceError::Status {
                        status: status.as_u16(),
                        url: url.clone(),
                    });
                }
                response.bytes().await?.to_vec()
            }
            Self::File { path } => {
                debug!("Reading {:?}", path);
                tokio::fs::read(path).await?
            }
        };
        let batch = RawBatch::from_csv_reader(bytes.as_slice())?;
        debug!("{} returned {} rows", self, batch.len());
        Ok(batch)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sheet { url } => write!(f, "sheet {}", url),
            Self::File { path } => write!(f, "file {}", path.display()),
        }
    }
}
