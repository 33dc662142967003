//! Loaders for the per-municipality acceptance status table.
//!
//! A source returns every row of one worksheet (first row is the header) and
//! the time the sheet was last modified, as a UTC timestamp string.

use crate::config::{Secrets, StatusColumns, StatusConfig, StatusSourceConfig};
use crate::error::MapError;
use crate::types::{StatusRow, StatusSheet};
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use csv::ReaderBuilder;
use regex::Regex;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, info};
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3/files";
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

pub trait StatusSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<StatusSheet, MapError>> + Send;
}

/// Turns a header row plus data rows into status rows.
///
/// Short rows are padded with empty cells. Rows without a municipality name
/// are skipped.
pub fn rows_from_table<I>(
    header: &[String],
    rows: I,
    columns: &StatusColumns,
) -> Result<Vec<StatusRow>, MapError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let position = |column: &str| {
        header
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| MapError::Schema { column: column.to_string() })
    };
    let name_idx = position(&columns.name)?;
    let status_idx = position(&columns.status)?;

    let mut out = Vec::new();
    for row in rows {
        let cell = |idx: usize| row.get(idx).cloned().unwrap_or_default();

        let municipality_name = cell(name_idx);
        if municipality_name.is_empty() {
            continue;
        }

        let extra = header
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != name_idx && *i != status_idx)
            .map(|(i, h)| (h.clone(), cell(i)))
            .collect();

        out.push(StatusRow {
            municipality_name,
            acceptance_status: cell(status_idx),
            extra,
        });
    }

    Ok(out)
}

/// Extracts the spreadsheet key from a `docs.google.com/spreadsheets/d/<id>/...` URL.
pub fn spreadsheet_id_from_url(url: &str) -> Result<String, MapError> {
    static ID_RE: OnceLock<Regex> = OnceLock::new();
    let re = ID_RE.get_or_init(|| {
        Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("spreadsheet id pattern is valid")
    });

    re.captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| MapError::RemoteFetch(format!("no spreadsheet id in sheet URL '{url}'")))
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    modified_time: String,
}

/// Reads a worksheet through the Sheets v4 and Drive v3 REST APIs with a service account.
pub struct GoogleSheetSource {
    key: ServiceAccountKey,
    spreadsheet_id: String,
    worksheet: String,
    columns: StatusColumns,
    client: reqwest::Client,
    sheets_api: String,
    drive_api: String,
}

impl GoogleSheetSource {
    pub fn new(secrets: &Secrets, worksheet: &str, columns: StatusColumns) -> Result<Self, MapError> {
        Ok(Self {
            key: secrets.gcp_service_account.clone(),
            spreadsheet_id: spreadsheet_id_from_url(&secrets.sp_sheet_url.url)?,
            worksheet: worksheet.to_string(),
            columns,
            client: reqwest::Client::new(),
            sheets_api: SHEETS_API.to_string(),
            drive_api: DRIVE_API.to_string(),
        })
    }

    async fn access_token(&self) -> Result<String, MapError> {
        let auth = ServiceAccountAuthenticator::builder(self.key.clone())
            .build()
            .await
            .map_err(|e| MapError::Authentication(e.to_string()))?;
        let token = auth
            .token(&SCOPES)
            .await
            .map_err(|e| MapError::Authentication(e.to_string()))?;

        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| MapError::Authentication("token response carried no access token".into()))
    }

    /// `values/{range}` for the whole worksheet. The title is quoted so that
    /// names like `Q1` are not read as a cell reference.
    fn values_url(&self) -> Result<Url, MapError> {
        let mut url = Url::parse(&format!("{}/{}/values", self.sheets_api, self.spreadsheet_id))
            .map_err(|e| MapError::RemoteFetch(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| MapError::RemoteFetch("sheets URL cannot take path segments".into()))?
            .push(&format!("'{}'", self.worksheet.replace('\'', "''")));
        Ok(url)
    }

    fn drive_url(&self) -> Result<Url, MapError> {
        let mut url = Url::parse(&format!("{}/{}", self.drive_api, self.spreadsheet_id))
            .map_err(|e| MapError::RemoteFetch(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("fields", "modifiedTime")
            .append_pair("supportsAllDrives", "true");
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url, token: &str) -> Result<T, MapError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MapError::RemoteFetch(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(MapError::Authentication(format!("Google API answered {status}")));
        }
        if !status.is_success() {
            return Err(MapError::RemoteFetch(format!("Google API answered {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MapError::RemoteFetch(e.to_string()))
    }

    async fn fetch_with_token(&self, token: &str) -> Result<StatusSheet, MapError> {
        let values: ValueRange = self.get_json(self.values_url()?, token).await?;
        let mut table = values.values.into_iter();
        let header = table.next().ok_or_else(|| MapError::Schema {
            column: self.columns.name.clone(),
        })?;
        let rows = rows_from_table(&header, table, &self.columns)?;

        let file: DriveFile = self.get_json(self.drive_url()?, token).await?;

        info!(
            worksheet = %self.worksheet,
            rows = rows.len(),
            modified = %file.modified_time,
            "fetched status sheet"
        );

        Ok(StatusSheet {
            rows,
            last_modified: file.modified_time,
        })
    }
}

impl StatusSource for GoogleSheetSource {
    async fn fetch(&self) -> Result<StatusSheet, MapError> {
        let token = self.access_token().await?;
        self.fetch_with_token(&token).await
    }
}

/// Reads the status table from a local CSV export; the file's mtime stands in for the sheet's.
pub struct CsvStatusSource {
    path: PathBuf,
    columns: StatusColumns,
}

impl CsvStatusSource {
    pub fn new(path: PathBuf, columns: StatusColumns) -> Self {
        Self { path, columns }
    }

    fn read(&self) -> Result<StatusSheet, MapError> {
        let fetch_err = |e: &dyn std::fmt::Display| {
            MapError::RemoteFetch(format!("{}: {}", self.path.display(), e))
        };

        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| fetch_err(&e))?;
        let header: Vec<String> = rdr
            .headers()
            .map_err(|e| fetch_err(&e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| fetch_err(&e))?;
            records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        let rows = rows_from_table(&header, records, &self.columns)?;

        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| fetch_err(&e))?;
        let last_modified = DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Millis, true);

        debug!(path = ?self.path, rows = rows.len(), "read status csv");
        Ok(StatusSheet { rows, last_modified })
    }
}

impl StatusSource for CsvStatusSource {
    async fn fetch(&self) -> Result<StatusSheet, MapError> {
        self.read()
    }
}

/// The source selected by `[status.source]`.
pub enum ConfiguredSource {
    GoogleSheet(GoogleSheetSource),
    Csv(CsvStatusSource),
}

impl ConfiguredSource {
    pub fn from_config(config: &StatusConfig) -> anyhow::Result<Self> {
        let columns = config.columns();
        let source = match &config.source {
            StatusSourceConfig::GoogleSheet { secrets, worksheet } => {
                let secrets = Secrets::load_from_file(secrets)?;
                let sheet = GoogleSheetSource::new(&secrets, worksheet, columns)
                    .context("Invalid Google Sheets configuration")?;
                ConfiguredSource::GoogleSheet(sheet)
            }
            StatusSourceConfig::Csv { path } => {
                ConfiguredSource::Csv(CsvStatusSource::new(path.clone(), columns))
            }
        };
        Ok(source)
    }
}

impl StatusSource for ConfiguredSource {
    async fn fetch(&self) -> Result<StatusSheet, MapError> {
        match self {
            ConfiguredSource::GoogleSheet(sheet) => sheet.fetch().await,
            ConfiguredSource::Csv(csv) => csv.fetch().await,
        }
    }
}
