use crate::config::FirebaseConfig;
use crate::error::RemoteError;
use crate::model::{FileRecord, PDF_CONTENT_TYPE};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};

const STORAGE_API: &str = "https://firebasestorage.googleapis.com/v0/b";
const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1/projects";
const OBJECT_PREFIX: &str = "pdfs/";
const RECORD_COLLECTION: &str = "pdfs";
const HTTP_USER_AGENT: &str = concat!("pdfnest/", env!("CARGO_PKG_VERSION"));

/// Binary object storage addressed by download URL.
pub trait ObjectStore {
    fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, RemoteError>;
    fn download(&self, reference: &str) -> Result<Vec<u8>, RemoteError>;
}

pub trait DocumentStore {
    fn create_record(&self, record: &PdfRecord) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PdfRecord {
    pub name: String,
    pub reference: String,
    pub tags: Vec<String>,
}

/// Splits a comma separated tag list, trimming each entry and dropping empty ones.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Uploads a file's payload and records its metadata. Returns the download URL.
pub fn publish(
    objects: &dyn ObjectStore,
    documents: &dyn DocumentStore,
    file: &FileRecord,
    tags: &str,
) -> Result<String, RemoteError> {
    let reference = objects.upload(&file.source_name, file.payload.as_bytes())?;
    let record = PdfRecord {
        name: file.source_name.clone(),
        reference: reference.clone(),
        tags: parse_tags(tags),
    };
    documents.create_record(&record)?;
    crate::debug_log!(
        "[remote] published {} with {} tags",
        record.name,
        record.tags.len()
    );
    Ok(reference)
}

fn http_client() -> Result<Client, RemoteError> {
    Client::builder()
        .user_agent(HTTP_USER_AGENT)
        .build()
        .map_err(|err| remote_failure("create http client", err))
}

fn remote_failure(action: &str, err: impl std::fmt::Display) -> RemoteError {
    crate::warn_log!("[remote] {} failed: {}", action, err);
    RemoteError::Failed
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

pub struct FirebaseStorage {
    client: Client,
    bucket: String,
}

impl FirebaseStorage {
    pub fn new(config: &FirebaseConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            client: http_client()?,
            bucket: config.bucket.clone(),
        })
    }

    fn upload_endpoint(&self, object_name: &str) -> String {
        format!(
            "{STORAGE_API}/{}/o?uploadType=media&name={}",
            self.bucket,
            urlencoding::encode(object_name)
        )
    }

    fn download_url(&self, object_name: &str, token: Option<&str>) -> String {
        let mut url = format!(
            "{STORAGE_API}/{}/o/{}?alt=media",
            self.bucket,
            urlencoding::encode(object_name)
        );
        if let Some(token) = token.filter(|token| !token.is_empty()) {
            // Several tokens may be issued; any of them grants access.
            let first = token.split(',').next().unwrap_or(token);
            url.push_str("&token=");
            url.push_str(&urlencoding::encode(first));
        }
        url
    }
}

impl ObjectStore for FirebaseStorage {
    fn upload(&self, name: &str, bytes: &[u8]) -> Result<String, RemoteError> {
        let object_name = format!("{OBJECT_PREFIX}{name}");
        let response = self
            .client
            .post(self.upload_endpoint(&object_name))
            .header(reqwest::header::CONTENT_TYPE, PDF_CONTENT_TYPE)
            .body(bytes.to_vec())
            .send()
            .map_err(|err| remote_failure("upload request", err))?
            .error_for_status()
            .map_err(|err| remote_failure("upload", err))?
            .json::<UploadResponse>()
            .map_err(|err| remote_failure("parse upload response", err))?;

        crate::debug_log!("[remote] uploaded {} ({} bytes)", response.name, bytes.len());
        Ok(self.download_url(&response.name, response.download_tokens.as_deref()))
    }

    fn download(&self, reference: &str) -> Result<Vec<u8>, RemoteError> {
        if !(reference.starts_with("https://") || reference.starts_with("http://")) {
            return Err(remote_failure("download", format!("unsupported reference {reference}")));
        }

        let bytes = self
            .client
            .get(reference)
            .send()
            .map_err(|err| remote_failure("download request", err))?
            .error_for_status()
            .map_err(|err| remote_failure("download", err))?
            .bytes()
            .map_err(|err| remote_failure("read download body", err))?;
        Ok(bytes.to_vec())
    }
}

pub struct Firestore {
    client: Client,
    project_id: String,
    api_key: String,
}

impl Firestore {
    pub fn new(config: &FirebaseConfig) -> Result<Self, RemoteError> {
        Ok(Self {
            client: http_client()?,
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn collection_endpoint(&self) -> String {
        format!(
            "{FIRESTORE_API}/{}/databases/(default)/documents/{RECORD_COLLECTION}?key={}",
            self.project_id,
            urlencoding::encode(&self.api_key)
        )
    }
}

fn document_body(record: &PdfRecord, created_at: chrono::DateTime<chrono::Utc>) -> Value {
    let tags: Vec<Value> = record
        .tags
        .iter()
        .map(|tag| json!({ "stringValue": tag }))
        .collect();

    json!({
        "fields": {
            "name": { "stringValue": record.name },
            "url": { "stringValue": record.reference },
            "tags": { "arrayValue": { "values": tags } },
            "createdAt": {
                "timestampValue": created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            },
        }
    })
}

impl DocumentStore for Firestore {
    fn create_record(&self, record: &PdfRecord) -> Result<(), RemoteError> {
        let body = document_body(record, chrono::Utc::now());
        self.client
            .post(self.collection_endpoint())
            .json(&body)
            .send()
            .map_err(|err| remote_failure("create record request", err))?
            .error_for_status()
            .map_err(|err| remote_failure("create record", err))?;
        Ok(())
    }
}
