use crate::i18n::Language;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DATA_DIR_NAME: &str = "pdfnest";
const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_STORAGE_QUOTA_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub pdfium_dir: Option<PathBuf>,
    pub language: Language,
    pub storage_quota_bytes: Option<u64>,
    pub firebase: Option<FirebaseConfig>,
}

/// Optional `config.json` in the data directory. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    pdfium_dir: Option<PathBuf>,
    language: Option<String>,
    storage_quota_bytes: Option<u64>,
    firebase: Option<FileFirebaseConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileFirebaseConfig {
    api_key: Option<String>,
    project_id: Option<String>,
    bucket: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from defaults, the data directory's `config.json`
    /// and `PDFNEST_*` variables, later sources winning.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let data_dir = env("PDFNEST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&lookup));
        let file = read_file_config(&data_dir.join(CONFIG_FILE_NAME))?;

        let pdfium_dir = env("PDFNEST_PDFIUM_DIR")
            .map(PathBuf::from)
            .or(file.pdfium_dir);

        let language = env("PDFNEST_LANG")
            .or(file.language)
            .map(|tag| Language::from_locale_tag(&tag))
            .unwrap_or_else(Language::detect);

        let storage_quota_bytes = match env("PDFNEST_STORAGE_QUOTA") {
            Some(raw) => parse_quota(&raw)?,
            None => Some(file.storage_quota_bytes.unwrap_or(DEFAULT_STORAGE_QUOTA_BYTES)),
        };

        let file_firebase = file.firebase.unwrap_or_default();
        let api_key = env("PDFNEST_FIREBASE_API_KEY").or(file_firebase.api_key);
        let project_id = env("PDFNEST_FIREBASE_PROJECT_ID").or(file_firebase.project_id);
        let bucket = env("PDFNEST_FIREBASE_BUCKET").or(file_firebase.bucket);
        let firebase = match (api_key, project_id, bucket) {
            (Some(api_key), Some(project_id), Some(bucket)) => Some(FirebaseConfig {
                api_key,
                project_id,
                bucket,
            }),
            _ => None,
        };

        Ok(Self {
            data_dir,
            pdfium_dir,
            language,
            storage_quota_bytes,
            firebase,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }
}

fn default_data_dir(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(app_data) = lookup("APPDATA") {
        return PathBuf::from(app_data).join(DATA_DIR_NAME);
    }

    if let Some(home) = lookup("HOME") {
        return PathBuf::from(home).join(format!(".{DATA_DIR_NAME}"));
    }

    PathBuf::from(format!(".{DATA_DIR_NAME}"))
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.is_file() {
        return Ok(FileConfig::default());
    }

    let raw = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `0` or `off` disables the quota.
fn parse_quota(raw: &str) -> Result<Option<u64>, ConfigError> {
    if raw.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    match raw.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(bytes) => Ok(Some(bytes)),
        Err(_) => Err(ConfigError::InvalidValue {
            key: "PDFNEST_STORAGE_QUOTA",
            value: raw.to_string(),
        }),
    }
}
