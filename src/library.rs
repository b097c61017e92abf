use crate::error::{Error, ErrorKind, Result, StorageError, ValidationError};
use crate::i18n::I18n;
use crate::model::{
    Category, CategoryColor, CategoryId, FileId, FileRecord, IncomingFile, Payload, PayloadRef,
    default_categories,
};
use crate::remote::ObjectStore;
use crate::store::MetadataStore;
use crate::utils::{display_name_for, export_file_name};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum CategoryFilter {
    #[default]
    All,
    Category(CategoryId),
}

impl CategoryFilter {
    pub fn matches(&self, file: &FileRecord) -> bool {
        match self {
            Self::All => true,
            Self::Category(id) => &file.category_id == id,
        }
    }
}

/// The single dismissible message shown to the user.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Notice {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of a mutation that has already been applied in memory.
/// `persist_error` is set when the follow-up write failed.
#[must_use]
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub persist_error: Option<Error>,
}

impl<T> Outcome<T> {
    fn new(value: T, persist_error: Option<Error>) -> Self {
        Self {
            value,
            persist_error,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub added: Vec<FileId>,
    pub rejected: Vec<ValidationError>,
}

pub struct Library {
    files: Vec<FileRecord>,
    categories: Vec<Category>,
    filter: CategoryFilter,
    store: Box<dyn MetadataStore>,
    /// False after a failed load; the unreadable blobs are left alone until `clear_files`.
    store_loaded: bool,
    i18n: I18n,
    notice: Option<Notice>,
}

impl Library {
    /// Restores both collections. A failed load starts from the defaults with a notice,
    /// and later changes stay in memory instead of overwriting what could not be read.
    pub fn open(
        store: Box<dyn MetadataStore>,
        i18n: I18n,
        remote: Option<&dyn ObjectStore>,
    ) -> Self {
        let mut library = Self {
            files: Vec::new(),
            categories: default_categories(),
            filter: CategoryFilter::All,
            store,
            store_loaded: true,
            i18n,
            notice: None,
        };

        match library.store.load(remote) {
            Ok(snapshot) => {
                library.files = snapshot.files;
                library.categories = snapshot.categories;
                if !snapshot.dropped.is_empty() {
                    library.post_notice(ErrorKind::Io, i18n.payload_unreadable);
                }
            }
            Err(err) => {
                crate::warn_log!("[library] error loading data: {}", err);
                library.store_loaded = false;
                library.post_notice(ErrorKind::Io, i18n.load_failed);
            }
        }

        crate::debug_log!(
            "[library] opened with {} files, {} categories",
            library.files.len(),
            library.categories.len()
        );
        library
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    pub fn files_in(&self, filter: &CategoryFilter) -> Vec<&FileRecord> {
        self.files.iter().filter(|file| filter.matches(file)).collect()
    }

    /// Files under the active filter.
    pub fn filtered_files(&self) -> Vec<&FileRecord> {
        self.files_in(&self.filter)
    }

    pub fn count_in(&self, category_id: &CategoryId) -> usize {
        self.files
            .iter()
            .filter(|file| &file.category_id == category_id)
            .count()
    }

    pub fn category(&self, id: &CategoryId) -> Option<&Category> {
        self.categories.iter().find(|category| &category.id == id)
    }

    pub fn file(&self, id: &FileId) -> Option<&FileRecord> {
        self.files.iter().find(|file| &file.id == id)
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Shows the localized text for an error raised outside the library (viewer, remote).
    pub fn report(&mut self, err: &Error) {
        let message = self.i18n.describe(err);
        self.post_notice(err.kind(), message);
    }

    pub fn ingest(&mut self, inputs: Vec<IncomingFile>) -> Result<Outcome<IngestReport>> {
        let mut report = IngestReport::default();
        if inputs.is_empty() {
            return Ok(Outcome::new(report, None));
        }

        for input in inputs {
            if !input.is_pdf() {
                crate::debug_log!("[library] rejected non-pdf {}", input.file_name);
                report
                    .rejected
                    .push(ValidationError::NotPdf(input.file_name));
                continue;
            }

            let id = self.unused_file_id();
            let record = FileRecord {
                id: id.clone(),
                name: display_name_for(&input.file_name),
                size: input.bytes.len() as u64,
                payload_ref: PayloadRef::inline(&input.bytes),
                payload: Payload::from(input.bytes),
                source_name: input.file_name,
                category_id: CategoryId::uncategorized(),
            };
            self.files.push(record);
            report.added.push(id);
        }

        if report.added.is_empty() {
            return Err(self.reject(ValidationError::NoPdfFiles));
        }

        crate::debug_log!(
            "[library] ingested {} files, rejected {}",
            report.added.len(),
            report.rejected.len()
        );
        let persist_error = self.persist_files();
        Ok(Outcome::new(report, persist_error))
    }

    pub fn delete_file(&mut self, id: &FileId) -> Result<Outcome<FileRecord>> {
        let Some(index) = self.files.iter().position(|file| &file.id == id) else {
            return Err(self.reject(ValidationError::FileNotFound(id.to_string())));
        };

        let removed = self.files.remove(index);
        let persist_error = self.persist_files();
        Ok(Outcome::new(removed, persist_error))
    }

    pub fn rename_file(&mut self, id: &FileId, name: &str) -> Result<Outcome<()>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject(ValidationError::EmptyName));
        }
        let Some(index) = self.files.iter().position(|file| &file.id == id) else {
            return Err(self.reject(ValidationError::FileNotFound(id.to_string())));
        };

        self.files[index].name = name.to_string();
        let persist_error = self.persist_files();
        Ok(Outcome::new((), persist_error))
    }

    pub fn set_file_category(
        &mut self,
        id: &FileId,
        category_id: &CategoryId,
    ) -> Result<Outcome<()>> {
        if self.category(category_id).is_none() {
            return Err(self.reject(ValidationError::CategoryNotFound(category_id.to_string())));
        }
        let Some(index) = self.files.iter().position(|file| &file.id == id) else {
            return Err(self.reject(ValidationError::FileNotFound(id.to_string())));
        };

        self.files[index].category_id = category_id.clone();
        let persist_error = self.persist_files();
        Ok(Outcome::new((), persist_error))
    }

    pub fn create_category(&mut self, name: &str) -> Result<Outcome<CategoryId>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject(ValidationError::EmptyName));
        }

        let mut id = CategoryId::generate();
        while self.category(&id).is_some() {
            id = CategoryId::generate();
        }
        let palette = CategoryColor::PALETTE;
        let color = palette[self.categories.len() % palette.len()];
        self.categories.push(Category {
            id: id.clone(),
            name: name.to_string(),
            color,
        });

        crate::debug_log!("[library] created category {} ({})", name, color.label());
        let persist_error = self.persist_categories();
        Ok(Outcome::new(id, persist_error))
    }

    pub fn rename_category(&mut self, id: &CategoryId, name: &str) -> Result<Outcome<()>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(self.reject(ValidationError::EmptyName));
        }
        if id.is_reserved() {
            return Err(self.reject(ValidationError::ReservedCategory));
        }
        let Some(index) = self.categories.iter().position(|category| &category.id == id) else {
            return Err(self.reject(ValidationError::CategoryNotFound(id.to_string())));
        };

        self.categories[index].name = name.to_string();
        let persist_error = self.persist_categories();
        Ok(Outcome::new((), persist_error))
    }

    /// Removes a category and moves its files to the reserved one.
    /// Returns the number of reassigned files. Deleting the reserved category does nothing.
    pub fn delete_category(&mut self, id: &CategoryId) -> Result<Outcome<usize>> {
        if id.is_reserved() {
            return Ok(Outcome::new(0, None));
        }
        let Some(index) = self.categories.iter().position(|category| &category.id == id) else {
            return Err(self.reject(ValidationError::CategoryNotFound(id.to_string())));
        };

        self.categories.remove(index);
        let mut reassigned = 0;
        for file in self.files.iter_mut().filter(|file| &file.category_id == id) {
            file.category_id = CategoryId::uncategorized();
            reassigned += 1;
        }
        if self.filter == CategoryFilter::Category(id.clone()) {
            self.filter = CategoryFilter::All;
        }

        crate::debug_log!("[library] deleted category {}, reassigned {}", id, reassigned);
        let persist_error = match (self.persist_categories(), self.persist_files()) {
            (Some(err), _) | (None, Some(err)) => Some(err),
            (None, None) => None,
        };
        Ok(Outcome::new(reassigned, persist_error))
    }

    /// Drops every file and removes the stored file blob.
    /// This also re-enables writes after a failed load.
    pub fn clear_files(&mut self) -> Outcome<usize> {
        let cleared = self.files.len();
        self.files.clear();

        let persist_error = match self.store.clear_files() {
            Ok(()) => {
                self.store_loaded = true;
                None
            }
            Err(err) => self.persist_failed(self.i18n.clear_files_failed, err),
        };
        Outcome::new(cleared, persist_error)
    }

    pub fn set_filter(&mut self, filter: CategoryFilter) -> Result<()> {
        if let CategoryFilter::Category(id) = &filter
            && self.category(id).is_none()
        {
            return Err(self.reject(ValidationError::CategoryNotFound(id.to_string())));
        }
        self.filter = filter;
        Ok(())
    }

    /// Writes `<display name>.pdf` into `dir`.
    pub fn export_file(&mut self, id: &FileId, dir: &Path) -> Result<PathBuf> {
        let Some(file) = self.file(id) else {
            return Err(self.reject(ValidationError::FileNotFound(id.to_string())));
        };

        let target = dir.join(export_file_name(&file.name));
        let written = write_payload(&target, &file.payload);
        written
            .map(|()| target)
            .map_err(|err| self.export_failed(err))
    }

    /// Exports every file, suffixing names that would otherwise collide.
    pub fn export_all(&mut self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut used = HashSet::new();
        let mut written = Vec::with_capacity(self.files.len());
        let mut failure = None;

        for file in &self.files {
            let base = export_file_name(&file.name);
            let mut name = base.clone();
            let mut counter = 2;
            while !used.insert(name.clone()) {
                let stem = base.strip_suffix(".pdf").unwrap_or(&base);
                name = format!("{stem} ({counter}).pdf");
                counter += 1;
            }

            let target = dir.join(name);
            if let Err(err) = write_payload(&target, &file.payload) {
                failure = Some(err);
                break;
            }
            written.push(target);
        }

        match failure {
            Some(err) => Err(self.export_failed(err)),
            None => Ok(written),
        }
    }

    fn unused_file_id(&self) -> FileId {
        loop {
            let id = FileId::generate();
            if self.file(&id).is_none() {
                return id;
            }
        }
    }

    fn reject(&mut self, err: ValidationError) -> Error {
        let err = Error::from(err);
        self.report(&err);
        err
    }

    fn export_failed(&mut self, err: std::io::Error) -> Error {
        crate::warn_log!("[library] export failed: {}", err);
        self.post_notice(ErrorKind::Io, self.i18n.export_failed);
        Error::from(err)
    }

    fn persist_files(&mut self) -> Option<Error> {
        if !self.store_loaded {
            return self.persist_failed(self.i18n.load_failed, store_not_loaded());
        }
        match self.store.save_files(&self.files) {
            Ok(()) => None,
            Err(err) => self.persist_failed(self.i18n.save_files_failed, err),
        }
    }

    fn persist_categories(&mut self) -> Option<Error> {
        if !self.store_loaded {
            return self.persist_failed(self.i18n.load_failed, store_not_loaded());
        }
        match self.store.save_categories(&self.categories) {
            Ok(()) => None,
            Err(err) => self.persist_failed(self.i18n.save_categories_failed, err),
        }
    }

    fn persist_failed(&mut self, message: &str, err: StorageError) -> Option<Error> {
        crate::warn_log!("[library] {}: {}", message, err);
        self.post_notice(ErrorKind::Io, message);
        Some(Error::from(err))
    }

    fn post_notice(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.notice = Some(Notice {
            kind,
            message: message.into(),
        });
    }
}

fn store_not_loaded() -> StorageError {
    StorageError::Unavailable("store not loaded".into())
}

fn write_payload(target: &Path, payload: &Payload) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(target, payload.as_bytes())?;
    crate::debug_log!(
        "[library] exported {} ({} bytes)",
        target.display(),
        payload.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Language;
    use crate::store::{BlobStore, FILES_KEY, MemoryBackend, SledBackend};
    use std::rc::Rc;

    fn pdf(name: &str) -> IncomingFile {
        IncomingFile::new(name, Some("application/pdf"), format!("%PDF-1.7 {name}").into_bytes())
    }

    fn i18n() -> I18n {
        I18n::new(Language::EnUs)
    }

    fn library_with(backend: Rc<MemoryBackend>) -> Library {
        Library::open(Box::new(BlobStore::new(backend, None)), i18n(), None)
    }

    fn library() -> Library {
        library_with(Rc::new(MemoryBackend::new()))
    }

    fn names(files: &[&FileRecord]) -> Vec<String> {
        files.iter().map(|file| file.name.clone()).collect()
    }

    fn assert_consistent(library: &Library) {
        let mut ids = HashSet::new();
        for file in library.files() {
            assert!(ids.insert(file.id.clone()), "duplicate id {}", file.id);
            assert!(library.category(&file.category_id).is_some());
        }
    }

    #[test]
    fn starts_with_default_categories() {
        let library = library();
        assert_eq!(library.categories(), default_categories().as_slice());
        assert!(library.files().is_empty());
        assert!(library.notice().is_none());
    }

    #[test]
    fn ingest_strips_suffix_and_files_under_reserved_category() {
        let mut library = library();
        let outcome = library.ingest(vec![pdf("a.pdf"), pdf("b.pdf")]).unwrap();
        assert!(outcome.is_persisted());
        assert_eq!(outcome.value.added.len(), 2);

        assert_eq!(names(&library.files_in(&CategoryFilter::All)), vec!["a", "b"]);
        for category in library.categories().iter().skip(1) {
            let filter = CategoryFilter::Category(category.id.clone());
            assert!(library.files_in(&filter).is_empty());
        }
        assert_eq!(library.count_in(&CategoryId::uncategorized()), 2);
        assert_eq!(library.files()[0].source_name, "a.pdf");
        assert!(library.files()[0].payload_ref.is_inline());
        assert_consistent(&library);
    }

    #[test]
    fn ingest_keeps_pdfs_and_reports_the_rest() {
        let mut library = library();
        let outcome = library
            .ingest(vec![
                pdf("a.pdf"),
                IncomingFile::new("notes.txt", Some("text/plain"), b"hello".to_vec()),
                IncomingFile::new("scan", None, b"%PDF-1.4".to_vec()),
            ])
            .unwrap();

        assert_eq!(outcome.value.added.len(), 2);
        assert_eq!(
            outcome.value.rejected,
            vec![ValidationError::NotPdf("notes.txt".into())]
        );
        assert_eq!(library.files().len(), 2);
    }

    #[test]
    fn batch_without_pdfs_raises_notice_and_changes_nothing() {
        let backend = Rc::new(MemoryBackend::new());
        let mut library = library_with(Rc::clone(&backend));

        let err = library
            .ingest(vec![IncomingFile::new("a.txt", None, b"text".to_vec())])
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::NoPdfFiles)));
        assert_eq!(library.notice().unwrap().message, i18n().only_pdf_files);
        assert_eq!(library.notice().unwrap().kind, ErrorKind::Validation);
        assert!(library.files().is_empty());
        assert!(backend.raw(FILES_KEY).is_none());

        library.dismiss_notice();
        assert!(library.notice().is_none());
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let backend = Rc::new(MemoryBackend::new());
        let mut library = library_with(Rc::clone(&backend));
        let outcome = library.ingest(Vec::new()).unwrap();
        assert!(outcome.value.added.is_empty());
        assert!(backend.raw(FILES_KEY).is_none());
    }

    #[test]
    fn rename_trims_and_rejects_empty_names() {
        let mut library = library();
        let _ = library.ingest(vec![pdf("a.pdf")]).unwrap();
        let id = library.files()[0].id.clone();

        let _ = library.rename_file(&id, "  Quarterly  ").unwrap();
        assert_eq!(library.file(&id).unwrap().name, "Quarterly");

        let err = library.rename_file(&id, "   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(library.file(&id).unwrap().name, "Quarterly");

        assert!(library.rename_file(&FileId::from("missing"), "x").is_err());
    }

    #[test]
    fn assigning_requires_an_existing_category() {
        let mut library = library();
        let _ = library.ingest(vec![pdf("a.pdf")]).unwrap();
        let id = library.files()[0].id.clone();

        let err = library
            .set_file_category(&id, &CategoryId::from("nope"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::CategoryNotFound(_))
        ));
        assert!(library.files()[0].category_id.is_reserved());

        let _ = library.set_file_category(&id, &CategoryId::from("work")).unwrap();
        assert_eq!(library.count_in(&CategoryId::from("work")), 1);
    }

    #[test]
    fn deleting_a_category_moves_its_files_to_uncategorized() {
        let mut library = library();
        let _ = library.ingest(vec![pdf("a.pdf"), pdf("b.pdf")]).unwrap();
        let work = library.create_category("Work").unwrap().value;
        let a = library.files()[0].id.clone();
        let _ = library.set_file_category(&a, &work).unwrap();
        library
            .set_filter(CategoryFilter::Category(work.clone()))
            .unwrap();
        assert_eq!(names(&library.filtered_files()), vec!["a"]);

        let outcome = library.delete_category(&work).unwrap();
        assert_eq!(outcome.value, 1);
        assert!(library.category(&work).is_none());
        assert_eq!(library.count_in(&work), 0);
        assert!(library.file(&a).unwrap().category_id.is_reserved());
        assert_eq!(library.filter(), &CategoryFilter::All);
        assert_consistent(&library);
    }

    #[test]
    fn deleting_with_many_files_reassigns_all_of_them() {
        let mut library = library();
        let _ = library
            .ingest(vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")])
            .unwrap();
        let finance = CategoryId::from("finance");
        let ids: Vec<FileId> = library.files().iter().map(|f| f.id.clone()).collect();
        for id in &ids {
            let _ = library.set_file_category(id, &finance).unwrap();
        }

        let _ = library.delete_category(&finance).unwrap();
        assert_eq!(library.count_in(&finance), 0);
        assert_eq!(library.count_in(&CategoryId::uncategorized()), 3);
    }

    #[test]
    fn reserved_category_cannot_be_deleted_or_renamed() {
        let backend = Rc::new(MemoryBackend::new());
        let mut library = library_with(Rc::clone(&backend));
        let before = library.categories().to_vec();

        let outcome = library.delete_category(&CategoryId::uncategorized()).unwrap();
        assert_eq!(outcome.value, 0);
        assert_eq!(library.categories(), before.as_slice());
        assert!(backend.raw(crate::store::CATEGORIES_KEY).is_none());

        let err = library
            .rename_category(&CategoryId::uncategorized(), "Misc")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::ReservedCategory)
        ));
    }

    #[test]
    fn new_categories_cycle_the_palette() {
        let mut library = library();
        let first = library.create_category(" Taxes ").unwrap().value;
        let second = library.create_category("Travel").unwrap().value;

        assert_eq!(library.category(&first).unwrap().name, "Taxes");
        assert_eq!(library.category(&first).unwrap().color, CategoryColor::Purple);
        assert_eq!(library.category(&second).unwrap().color, CategoryColor::Pink);
        assert!(library.create_category("  ").is_err());

        let _ = library.rename_category(&second, "Trips").unwrap();
        assert_eq!(library.category(&second).unwrap().name, "Trips");
        assert!(library.rename_category(&second, "").is_err());
    }

    #[test]
    fn delete_file_and_clear() {
        let backend = Rc::new(MemoryBackend::new());
        let mut library = library_with(Rc::clone(&backend));
        let _ = library.ingest(vec![pdf("a.pdf"), pdf("b.pdf")]).unwrap();
        let a = library.files()[0].id.clone();

        let removed = library.delete_file(&a).unwrap().value;
        assert_eq!(removed.name, "a");
        assert!(library.file(&a).is_none());
        assert!(library.delete_file(&a).is_err());

        let outcome = library.clear_files();
        assert_eq!(outcome.value, 1);
        assert!(library.files().is_empty());
        assert!(backend.raw(FILES_KEY).is_none());
    }

    #[test]
    fn filter_must_name_an_existing_category() {
        let mut library = library();
        assert!(
            library
                .set_filter(CategoryFilter::Category(CategoryId::from("ghost")))
                .is_err()
        );
        assert_eq!(library.filter(), &CategoryFilter::All);
    }

    #[test]
    fn failed_writes_keep_the_change_and_post_a_notice() {
        let backend = Rc::new(MemoryBackend::new());
        let mut library = library_with(Rc::clone(&backend));
        backend.set_reject_writes(true);

        let outcome = library.ingest(vec![pdf("a.pdf")]).unwrap();
        assert!(!outcome.is_persisted());
        assert_eq!(library.files().len(), 1);
        let notice = library.notice().unwrap();
        assert_eq!(notice.kind, ErrorKind::Io);
        assert_eq!(notice.message, i18n().save_files_failed);

        let outcome = library.create_category("Later").unwrap();
        assert!(outcome.persist_error.is_some());
        assert_eq!(library.notice().unwrap().message, i18n().save_categories_failed);
        assert_eq!(library.categories().len(), 5);
    }

    #[test]
    fn quota_overflow_is_reported_not_rolled_back() {
        let store = BlobStore::new(MemoryBackend::new(), Some(256));
        let mut library = Library::open(Box::new(store), i18n(), None);

        let mut bytes = b"%PDF-".to_vec();
        bytes.extend([7u8; 4096]);
        let big = IncomingFile::new("big.pdf", None, bytes);
        let outcome = library.ingest(vec![big]).unwrap();
        assert!(matches!(
            outcome.persist_error,
            Some(Error::Storage(StorageError::QuotaExceeded { .. }))
        ));
        assert_eq!(library.files().len(), 1);
    }

    #[test]
    fn corrupt_store_starts_from_defaults_with_notice() {
        let backend = Rc::new(MemoryBackend::new());
        backend.insert_raw(FILES_KEY, "{not json");
        let library = library_with(backend);

        assert!(library.files().is_empty());
        assert_eq!(library.categories(), default_categories().as_slice());
        assert_eq!(library.notice().unwrap().message, i18n().load_failed);
    }

    #[test]
    fn unreadable_store_is_not_overwritten() {
        let backend = Rc::new(MemoryBackend::new());
        let newer = r#"{"version":2,"seq":9,"items":[{"id":"keep","name":"keep","size":3,"dataUrl":"data:application/pdf;base64,JVBE","fileName":"keep.pdf"}]}"#;
        backend.insert_raw(FILES_KEY, newer);
        let mut library = library_with(Rc::clone(&backend));
        assert_eq!(library.notice().unwrap().message, i18n().load_failed);

        let outcome = library.ingest(vec![pdf("new.pdf")]).unwrap();
        assert!(matches!(
            outcome.persist_error,
            Some(Error::Storage(StorageError::Unavailable(_)))
        ));
        assert_eq!(library.files().len(), 1);
        let outcome = library.create_category("Later").unwrap();
        assert!(!outcome.is_persisted());

        assert_eq!(backend.raw(FILES_KEY).unwrap(), newer.as_bytes());
        assert!(backend.raw(crate::store::CATEGORIES_KEY).is_none());
    }

    #[test]
    fn clearing_files_resumes_writes_after_a_failed_load() {
        let backend = Rc::new(MemoryBackend::new());
        backend.insert_raw(FILES_KEY, "{not json");
        let mut library = library_with(Rc::clone(&backend));

        let outcome = library.clear_files();
        assert!(outcome.is_persisted());
        assert!(backend.raw(FILES_KEY).is_none());

        let outcome = library.ingest(vec![pdf("fresh.pdf")]).unwrap();
        assert!(outcome.is_persisted());
        let reloaded = library_with(backend);
        assert_eq!(names(&reloaded.files_in(&CategoryFilter::All)), vec!["fresh"]);
    }

    #[test]
    fn state_survives_a_restart() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("db");
        let (ids, travel) = {
            let store = BlobStore::new(SledBackend::open(&db_path).unwrap(), None);
            let mut library = Library::open(Box::new(store), i18n(), None);
            let _ = library.ingest(vec![pdf("a.pdf"), pdf("b.pdf")]).unwrap();
            let travel = library.create_category("Travel").unwrap().value;
            let b = library.files()[1].id.clone();
            let _ = library.set_file_category(&b, &travel).unwrap();
            let _ = library.rename_file(&b, "Boarding pass").unwrap();
            let ids: Vec<FileId> = library.files().iter().map(|f| f.id.clone()).collect();
            (ids, travel)
        };

        let store = BlobStore::new(SledBackend::open(&db_path).unwrap(), None);
        let library = Library::open(Box::new(store), i18n(), None);
        let reloaded: Vec<FileId> = library.files().iter().map(|f| f.id.clone()).collect();
        assert_eq!(reloaded, ids);
        assert_eq!(library.files()[1].name, "Boarding pass");
        assert_eq!(library.files()[1].category_id, travel);
        assert_eq!(library.files()[0].size, "%PDF-1.7 a.pdf".len() as u64);
        assert_eq!(library.files()[0].payload.as_bytes(), b"%PDF-1.7 a.pdf");
        assert_eq!(library.category(&travel).unwrap().name, "Travel");
        assert!(library.notice().is_none());
    }

    #[test]
    fn export_writes_pdf_copies() {
        let temp = tempfile::tempdir().unwrap();
        let mut library = library();
        let _ = library
            .ingest(vec![pdf("a.pdf"), pdf("b.pdf"), pdf("a.PDF")])
            .unwrap();
        let a = library.files()[0].id.clone();

        let path = library.export_file(&a, temp.path()).unwrap();
        assert_eq!(path, temp.path().join("a.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7 a.pdf");

        let all = library.export_all(&temp.path().join("all")).unwrap();
        let file_names: Vec<String> = all
            .iter()
            .map(|path| crate::utils::display_file_name(path))
            .collect();
        assert_eq!(file_names, vec!["a.pdf", "b.pdf", "a (2).pdf"]);
    }
}
