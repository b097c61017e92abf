use crate::error::PayloadError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

pub const UNCATEGORIZED: &str = "uncategorized";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";
const DATA_URL_PREFIX: &str = "data:application/pdf;base64,";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn uncategorized() -> Self {
        Self(UNCATEGORIZED.to_string())
    }

    pub fn is_reserved(&self) -> bool {
        self.0 == UNCATEGORIZED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Written as the bare color name. On load, a CSS class list such as
/// `"bg-red-100 text-red-700"` is also understood; unknown colors read as gray.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum CategoryColor {
    Gray,
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Pink,
    Indigo,
    Orange,
}

impl CategoryColor {
    /// Colors handed out to user-created categories, in order.
    pub const PALETTE: [CategoryColor; 8] = [
        Self::Red,
        Self::Blue,
        Self::Green,
        Self::Yellow,
        Self::Purple,
        Self::Pink,
        Self::Indigo,
        Self::Orange,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Purple => "purple",
            Self::Pink => "pink",
            Self::Indigo => "indigo",
            Self::Orange => "orange",
        }
    }

    pub fn parse(raw: &str) -> Self {
        let name = raw
            .split_whitespace()
            .find_map(|class| class.strip_prefix("bg-"))
            .or_else(|| raw.split_whitespace().next())
            .unwrap_or_default();
        let name = name.split('-').next().unwrap_or_default();

        [Self::Gray]
            .into_iter()
            .chain(Self::PALETTE)
            .find(|color| color.label().eq_ignore_ascii_case(name))
            .unwrap_or(Self::Gray)
    }
}

impl From<String> for CategoryColor {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: CategoryColor,
}

pub fn default_categories() -> Vec<Category> {
    [
        (UNCATEGORIZED, "Uncategorized", CategoryColor::Gray),
        ("work", "Work", CategoryColor::Red),
        ("personal", "Personal", CategoryColor::Blue),
        ("finance", "Finance", CategoryColor::Green),
    ]
    .into_iter()
    .map(|(id, name, color)| Category {
        id: CategoryId::from(id),
        name: name.to_string(),
        color,
    })
    .collect()
}

/// Binary content of an ingested PDF. Cloning shares the bytes.
#[derive(Clone, Eq, PartialEq)]
pub struct Payload(Arc<[u8]>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

/// Where a payload can be restored from: an inline `data:` URL or a remote download URL.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadRef(String);

impl PayloadRef {
    pub fn inline(bytes: &[u8]) -> Self {
        Self(format!("{DATA_URL_PREFIX}{}", BASE64.encode(bytes)))
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes an inline reference. Any base64 `data:` URL is accepted regardless of media type.
    pub fn decode_inline(&self) -> Result<Vec<u8>, PayloadError> {
        let rest = self
            .0
            .strip_prefix("data:")
            .ok_or_else(|| PayloadError::InvalidReference(self.summary()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| PayloadError::InvalidReference(self.summary()))?;
        if !header.ends_with(";base64") {
            return Err(PayloadError::InvalidReference(self.summary()));
        }
        Ok(BASE64.decode(data)?)
    }

    fn summary(&self) -> String {
        self.0.chars().take(48).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub source_name: String,
    pub payload: Payload,
    pub payload_ref: PayloadRef,
    pub category_id: CategoryId,
}

/// Serialized shape of a file record in the local store.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub data_url: PayloadRef,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

impl From<&FileRecord> for StoredFile {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            size: record.size,
            data_url: record.payload_ref.clone(),
            file_name: record.source_name.clone(),
            category_id: Some(record.category_id.clone()),
        }
    }
}

/// A file offered for ingestion, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.eq_ignore_ascii_case("pdf"))
            .map(|_| PDF_CONTENT_TYPE);

        Ok(Self::new(
            crate::utils::display_file_name(path),
            content_type,
            bytes,
        ))
    }

    pub fn is_pdf(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .is_some_and(|ty| ty.eq_ignore_ascii_case(PDF_CONTENT_TYPE));
        declared || self.bytes.starts_with(PDF_MAGIC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_reference_decodes_back_to_bytes() {
        let reference = PayloadRef::inline(b"%PDF-1.7 body");
        assert!(reference.is_inline());
        assert!(reference.as_str().starts_with(DATA_URL_PREFIX));
        assert_eq!(reference.decode_inline().unwrap(), b"%PDF-1.7 body");
    }

    #[test]
    fn malformed_references_are_rejected() {
        assert!(PayloadRef::remote("https://example.com/a.pdf")
            .decode_inline()
            .is_err());
        assert!(PayloadRef::remote("").decode_inline().is_err());
        assert!(PayloadRef::remote("data:text/plain,hello")
            .decode_inline()
            .is_err());
        assert!(PayloadRef::remote("data:application/pdf;base64,!!!")
            .decode_inline()
            .is_err());
    }

    #[test]
    fn stored_file_uses_camel_case_keys() {
        let stored = StoredFile {
            id: FileId::from("abc"),
            name: "report".into(),
            size: 3,
            data_url: PayloadRef::inline(b"pdf"),
            file_name: "report.pdf".into(),
            category_id: Some(CategoryId::uncategorized()),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["fileName"], "report.pdf");
        assert_eq!(json["categoryId"], "uncategorized");
        assert!(json["dataUrl"].as_str().unwrap().starts_with("data:"));
    }

    #[test]
    fn pdf_detection_accepts_content_type_or_magic() {
        assert!(IncomingFile::new("a.pdf", Some("application/pdf"), Vec::new()).is_pdf());
        assert!(IncomingFile::new("scan", None, b"%PDF-1.4".to_vec()).is_pdf());
        assert!(!IncomingFile::new("notes.txt", Some("text/plain"), b"hello".to_vec()).is_pdf());
    }

    #[test]
    fn colors_read_from_names_or_class_lists() {
        assert_eq!(CategoryColor::parse("red"), CategoryColor::Red);
        assert_eq!(
            CategoryColor::parse("bg-indigo-100 text-indigo-700"),
            CategoryColor::Indigo
        );
        assert_eq!(CategoryColor::parse("text-pink-700 bg-pink-100"), CategoryColor::Pink);
        assert_eq!(CategoryColor::parse("bg-teal-100 text-teal-700"), CategoryColor::Gray);
        assert_eq!(CategoryColor::parse(""), CategoryColor::Gray);

        let category: Category = serde_json::from_str(
            r#"{"id":"work","name":"Work","color":"bg-red-100 text-red-700"}"#,
        )
        .unwrap();
        assert_eq!(category.color, CategoryColor::Red);
        assert_eq!(serde_json::to_value(category.color).unwrap(), "red");
    }

    #[test]
    fn default_categories_start_with_reserved() {
        let categories = default_categories();
        assert!(categories[0].id.is_reserved());
        assert_eq!(categories.len(), 4);
    }
}
