use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};
use yup_oauth2::ServiceAccountKey;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub status: StatusConfig,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub geometry: PathBuf,
    #[serde(default = "default_name_property")]
    pub name_property: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_status_column")]
    pub status_column: String,
    pub source: StatusSourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusSourceConfig {
    GoogleSheet {
        secrets: PathBuf,
        #[serde(default = "default_worksheet")]
        worksheet: String,
    },
    Csv {
        path: PathBuf,
    },
}

/// Column names the status loader must find in the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusColumns {
    pub name: String,
    pub status: String,
}

impl StatusConfig {
    pub fn columns(&self) -> StatusColumns {
        StatusColumns {
            name: self.name_column.clone(),
            status: self.status_column.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PageConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_icon")]
    pub icon: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            icon: default_icon(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    /// (lat, lon)
    #[serde(default = "default_center")]
    pub center: [f64; 2],
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: default_center(),
            zoom: default_zoom(),
            width: default_width(),
            height: default_height(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_name_property() -> String { "N03_004".to_string() }
fn default_name_column() -> String { "市区町村名".to_string() }
fn default_status_column() -> String { "募集状況".to_string() }
fn default_worksheet() -> String { "シート1".to_string() }
fn default_title() -> String { "石川県ボランティア受け入れ情報マップ".to_string() }
fn default_icon() -> String { "🗺️".to_string() }
fn default_center() -> [f64; 2] { [36.80, 136.80] }
fn default_zoom() -> u8 { 9 }
fn default_width() -> u32 { 700 }
fn default_height() -> u32 { 700 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8501 }

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

/// Out-of-band credentials, laid out like a `secrets.toml` file.
#[derive(Debug, Deserialize, Clone)]
pub struct Secrets {
    pub gcp_service_account: ServiceAccountKey,
    #[serde(rename = "SP_SHEET_URL")]
    pub sp_sheet_url: SheetUrl,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetUrl {
    pub url: String,
}

impl Secrets {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets file: {:?}", path))?;
        let secrets: Secrets = toml::from_str(&content)
            .with_context(|| format!("Failed to parse secrets file: {:?}", path))?;
        Ok(secrets)
    }
}
