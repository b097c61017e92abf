use crate::error::{PayloadError, RemoteError, StorageError};
use crate::model::{
    Category, CategoryId, FileId, FileRecord, Payload, PayloadRef, StoredFile, default_categories,
};
use crate::remote::ObjectStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

pub const STORE_TREE: &str = "pdf-organizer";
pub const FILES_KEY: &str = "pdf-organizer-files";
pub const CATEGORIES_KEY: &str = "pdf-organizer-categories";
const BLOB_VERSION: u32 = 1;

/// Named-blob storage underneath [`BlobStore`].
pub trait KeyValueBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub struct SledBackend {
    tree: sled::Tree,
}

impl SledBackend {
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                StorageError::Unavailable(format!("create dir {}: {}", parent.display(), err))
            })?;
        }

        let db = sled::open(db_path)?;
        let tree = db.open_tree(STORE_TREE)?;
        crate::debug_log!("[store] opened {} at {}", STORE_TREE, db_path.display());
        Ok(Self { tree })
    }
}

impl KeyValueBackend for SledBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.tree.get(key)?.map(|value| value.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.tree.insert(key, value)?;
        self.tree.flush()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.tree.remove(key)?;
        self.tree.flush()?;
        Ok(())
    }
}

/// Process-local backend, used when the on-disk database cannot be opened.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, Vec<u8>>>,
    reject_writes: Cell<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail, as a full or read-only store would.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.into());
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.raw(key))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if self.reject_writes.get() {
            return Err(StorageError::Unavailable("writes rejected".into()));
        }
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.reject_writes.get() {
            return Err(StorageError::Unavailable("writes rejected".into()));
        }
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for &B {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

impl<B: KeyValueBackend + ?Sized> KeyValueBackend for Rc<B> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    seq: u64,
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredBlob<T> {
    Versioned(Envelope<T>),
    Legacy(Vec<T>),
}

/// Result of restoring both collections at start.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub files: Vec<FileRecord>,
    pub categories: Vec<Category>,
    /// Files present in the store whose payload could not be restored.
    pub dropped: Vec<FileId>,
}

/// Persistence seam of the library; whole collections are written, last write wins.
pub trait MetadataStore {
    fn load(&self, remote: Option<&dyn ObjectStore>) -> Result<Snapshot, StorageError>;
    fn save_files(&self, files: &[FileRecord]) -> Result<(), StorageError>;
    fn save_categories(&self, categories: &[Category]) -> Result<(), StorageError>;
    fn clear_files(&self) -> Result<(), StorageError>;
}

/// Stores each collection as one JSON envelope `{version, seq, items}`.
pub struct BlobStore<B> {
    backend: B,
    quota: Option<u64>,
    seq: Cell<u64>,
}

impl<B: KeyValueBackend> BlobStore<B> {
    pub fn new(backend: B, quota: Option<u64>) -> Self {
        Self {
            backend,
            quota,
            seq: Cell::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Sequence number of the most recent write (or the newest one seen on load).
    pub fn last_seq(&self) -> u64 {
        self.seq.get()
    }

    fn write_blob<T: Serialize>(&self, key: &str, items: Vec<T>) -> Result<(), StorageError> {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);

        let envelope = Envelope {
            version: BLOB_VERSION,
            seq,
            items,
        };
        let bytes = serde_json::to_vec(&envelope)?;
        if let Some(quota) = self.quota
            && bytes.len() as u64 > quota
        {
            return Err(StorageError::QuotaExceeded {
                size: bytes.len() as u64,
                quota,
            });
        }

        self.backend.put(key, &bytes)?;
        crate::debug_log!("[store] wrote {} seq={} bytes={}", key, seq, bytes.len());
        Ok(())
    }

    fn read_blob<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Vec<T>>, StorageError> {
        let Some(bytes) = self.backend.get(key)? else {
            return Ok(None);
        };

        match serde_json::from_slice::<StoredBlob<T>>(&bytes)? {
            StoredBlob::Versioned(envelope) => {
                if envelope.version > BLOB_VERSION {
                    return Err(StorageError::UnsupportedVersion(envelope.version));
                }
                if envelope.seq > self.seq.get() {
                    self.seq.set(envelope.seq);
                }
                Ok(Some(envelope.items))
            }
            StoredBlob::Legacy(items) => Ok(Some(items)),
        }
    }
}

impl<B: KeyValueBackend> MetadataStore for BlobStore<B> {
    fn load(&self, remote: Option<&dyn ObjectStore>) -> Result<Snapshot, StorageError> {
        let mut categories = self
            .read_blob::<Category>(CATEGORIES_KEY)?
            .unwrap_or_else(default_categories);
        let mut seen_categories = HashSet::new();
        categories.retain(|category| seen_categories.insert(category.id.clone()));
        if !categories.iter().any(|category| category.id.is_reserved())
            && let Some(reserved) = default_categories().into_iter().next()
        {
            categories.insert(0, reserved);
        }

        let stored_files = self.read_blob::<StoredFile>(FILES_KEY)?.unwrap_or_default();
        let mut files = Vec::with_capacity(stored_files.len());
        let mut dropped = Vec::new();
        let mut seen_files = HashSet::new();

        for stored in stored_files {
            if !seen_files.insert(stored.id.clone()) {
                crate::warn_log!("[store] skipping duplicate file id {}", stored.id);
                continue;
            }

            let payload = match restore_payload(&stored.data_url, remote) {
                Ok(payload) => payload,
                Err(err) => {
                    crate::warn_log!("[store] error restoring file {}: {}", stored.name, err);
                    dropped.push(stored.id);
                    continue;
                }
            };

            let category_id = stored
                .category_id
                .filter(|id| categories.iter().any(|category| &category.id == id))
                .unwrap_or_else(CategoryId::uncategorized);

            files.push(FileRecord {
                id: stored.id,
                name: stored.name,
                size: stored.size,
                source_name: stored.file_name,
                payload,
                payload_ref: stored.data_url,
                category_id,
            });
        }

        crate::debug_log!(
            "[store] loaded files={} dropped={} categories={} seq={}",
            files.len(),
            dropped.len(),
            categories.len(),
            self.seq.get()
        );

        Ok(Snapshot {
            files,
            categories,
            dropped,
        })
    }

    fn save_files(&self, files: &[FileRecord]) -> Result<(), StorageError> {
        self.write_blob(FILES_KEY, files.iter().map(StoredFile::from).collect())
    }

    fn save_categories(&self, categories: &[Category]) -> Result<(), StorageError> {
        self.write_blob(CATEGORIES_KEY, categories.to_vec())
    }

    fn clear_files(&self) -> Result<(), StorageError> {
        self.backend.remove(FILES_KEY)
    }
}

fn restore_payload(
    reference: &PayloadRef,
    remote: Option<&dyn ObjectStore>,
) -> Result<Payload, PayloadError> {
    if reference.is_inline() {
        return Ok(Payload::from(reference.decode_inline()?));
    }
    if reference.as_str().is_empty() {
        return Err(PayloadError::InvalidReference(String::new()));
    }

    let remote = remote.ok_or(PayloadError::Fetch(RemoteError::NotConfigured))?;
    Ok(Payload::from(remote.download(reference.as_str())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryColor, UNCATEGORIZED};

    fn record(id: &str, name: &str, category: &str) -> FileRecord {
        let bytes = format!("%PDF-1.7 {name}").into_bytes();
        FileRecord {
            id: FileId::from(id),
            name: name.to_string(),
            size: bytes.len() as u64,
            source_name: format!("{name}.pdf"),
            payload_ref: PayloadRef::inline(&bytes),
            payload: Payload::from(bytes),
            category_id: CategoryId::from(category),
        }
    }

    struct FixedRemote;

    impl ObjectStore for FixedRemote {
        fn upload(&self, _name: &str, _bytes: &[u8]) -> Result<String, RemoteError> {
            Err(RemoteError::Failed)
        }

        fn download(&self, reference: &str) -> Result<Vec<u8>, RemoteError> {
            if reference.ends_with("ok.pdf") {
                Ok(b"%PDF-remote".to_vec())
            } else {
                Err(RemoteError::Failed)
            }
        }
    }

    #[test]
    fn round_trip_preserves_ids_names_sizes_and_categories() {
        let store = BlobStore::new(MemoryBackend::new(), None);
        let files = vec![record("a", "alpha", "work"), record("b", "beta", UNCATEGORIZED)];
        let categories = default_categories();

        store.save_categories(&categories).unwrap();
        store.save_files(&files).unwrap();

        let reloaded = BlobStore::new(store.backend(), None);
        let snapshot = reloaded.load(None).unwrap();
        assert_eq!(snapshot.categories, categories);
        assert_eq!(snapshot.files, files);
        assert!(snapshot.dropped.is_empty());
        assert_eq!(reloaded.last_seq(), 2);
    }

    #[test]
    fn sled_backend_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("db");
        let files = vec![record("a", "alpha", UNCATEGORIZED)];

        {
            let store = BlobStore::new(SledBackend::open(&db_path).unwrap(), None);
            store.save_files(&files).unwrap();
        }

        let store = BlobStore::new(SledBackend::open(&db_path).unwrap(), None);
        let snapshot = store.load(None).unwrap();
        assert_eq!(snapshot.files, files);
        assert_eq!(snapshot.categories, default_categories());
    }

    #[test]
    fn unrestorable_payloads_are_dropped_not_fabricated() {
        let backend = MemoryBackend::new();
        backend.insert_raw(
            FILES_KEY,
            r#"[
                {"id":"good","name":"good","size":3,"dataUrl":"data:application/pdf;base64,JVBE","fileName":"good.pdf","categoryId":"work"},
                {"id":"empty","name":"empty","size":3,"dataUrl":"","fileName":"empty.pdf"},
                {"id":"broken","name":"broken","size":3,"dataUrl":"data:application/pdf;base64,@@@","fileName":"broken.pdf"},
                {"id":"remote-ok","name":"remote","size":11,"dataUrl":"https://files.example/ok.pdf","fileName":"ok.pdf"},
                {"id":"remote-bad","name":"remote","size":11,"dataUrl":"https://files.example/bad.pdf","fileName":"bad.pdf"}
            ]"#,
        );
        let store = BlobStore::new(backend, None);

        let snapshot = store.load(Some(&FixedRemote)).unwrap();
        let ids: Vec<&str> = snapshot.files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "remote-ok"]);
        assert_eq!(snapshot.files[0].payload.as_bytes(), b"%PD");
        assert_eq!(snapshot.files[1].category_id, CategoryId::uncategorized());
        assert_eq!(snapshot.dropped.len(), 3);
    }

    #[test]
    fn remote_references_need_an_object_store() {
        let backend = MemoryBackend::new();
        backend.insert_raw(
            FILES_KEY,
            r#"[{"id":"r","name":"r","size":1,"dataUrl":"https://files.example/ok.pdf","fileName":"ok.pdf"}]"#,
        );
        let snapshot = BlobStore::new(backend, None).load(None).unwrap();
        assert!(snapshot.files.is_empty());
        assert_eq!(snapshot.dropped, vec![FileId::from("r")]);
    }

    #[test]
    fn dangling_categories_fall_back_to_reserved() {
        let store = BlobStore::new(MemoryBackend::new(), None);
        store
            .save_categories(&[Category {
                id: CategoryId::from("work"),
                name: "Work".into(),
                color: CategoryColor::Red,
            }])
            .unwrap();
        store.save_files(&[record("a", "alpha", "gone")]).unwrap();

        let snapshot = store.load(None).unwrap();
        assert!(snapshot.categories[0].id.is_reserved());
        assert_eq!(snapshot.categories.len(), 2);
        assert_eq!(snapshot.files[0].category_id, CategoryId::uncategorized());
    }

    #[test]
    fn quota_rejects_oversized_blobs_and_keeps_previous_value() {
        let store = BlobStore::new(MemoryBackend::new(), Some(600));
        store.save_files(&[record("a", "alpha", UNCATEGORIZED)]).unwrap();
        let before = store.backend().raw(FILES_KEY).unwrap();

        let many: Vec<FileRecord> = (0..20)
            .map(|ix| record(&format!("f{ix}"), &format!("file-{ix}"), UNCATEGORIZED))
            .collect();
        let err = store.save_files(&many).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 600, .. }));
        assert_eq!(store.backend().raw(FILES_KEY).unwrap(), before);
    }

    #[test]
    fn bare_arrays_with_class_list_colors_load() {
        let backend = MemoryBackend::new();
        backend.insert_raw(
            CATEGORIES_KEY,
            r#"[
                {"id":"uncategorized","name":"Uncategorized","color":"bg-gray-100 text-gray-700"},
                {"id":"work","name":"Work","color":"bg-red-100 text-red-700"},
                {"id":"personal","name":"Personal","color":"bg-blue-100 text-blue-700"},
                {"id":"finance","name":"Finance","color":"bg-green-100 text-green-700"}
            ]"#,
        );
        backend.insert_raw(
            FILES_KEY,
            r#"[{"id":"1718000000000","name":"invoice","size":3,"dataUrl":"data:application/pdf;base64,JVBE","fileName":"invoice.pdf","categoryId":"finance"}]"#,
        );
        let store = BlobStore::new(backend, None);

        let snapshot = store.load(None).unwrap();
        assert_eq!(snapshot.categories, default_categories());
        assert_eq!(snapshot.files.len(), 1);
        assert_eq!(snapshot.files[0].name, "invoice");
        assert_eq!(snapshot.files[0].category_id, CategoryId::from("finance"));
        assert_eq!(snapshot.files[0].payload.as_bytes(), b"%PD");
        assert!(snapshot.dropped.is_empty());
    }

    #[test]
    fn newer_blob_versions_are_refused() {
        let backend = MemoryBackend::new();
        backend.insert_raw(CATEGORIES_KEY, r#"{"version":9,"seq":1,"items":[]}"#);
        let err = BlobStore::new(backend, None).load(None).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedVersion(9)));
    }

    #[test]
    fn clear_removes_the_files_blob() {
        let store = BlobStore::new(MemoryBackend::new(), None);
        store.save_files(&[record("a", "alpha", UNCATEGORIZED)]).unwrap();
        store.clear_files().unwrap();
        assert!(store.backend().raw(FILES_KEY).is_none());
    }
}
