use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pdfnest::config::Config;
use pdfnest::error::{Error, RemoteError, ViewerError};
use pdfnest::i18n::I18n;
use pdfnest::library::{CategoryFilter, Library, Outcome};
use pdfnest::logger;
use pdfnest::model::{CategoryId, FileId, FileRecord, IncomingFile};
use pdfnest::pdf::PdfiumEngine;
use pdfnest::remote::{self, FirebaseStorage, Firestore, ObjectStore};
use pdfnest::store::{BlobStore, MemoryBackend, MetadataStore, SledBackend};
use pdfnest::utils::format_file_size;
use pdfnest::viewer::{Capability, OpenStatus, ViewerController};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pdfnest")]
#[command(about = "Organize PDF files into categories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add PDF files to the library.
    Add {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
    /// List files, optionally only those in one category.
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one file's details.
    Show { id: String },
    /// Rename a file.
    Rename { id: String, name: String },
    /// Move a file into a category.
    Assign { id: String, category: String },
    /// Delete a file.
    Rm { id: String },
    /// Delete every file.
    Clear,
    /// Write PDF copies to a directory; all files when no id is given.
    Export {
        id: Option<String>,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Manage categories.
    Category {
        #[command(subcommand)]
        action: CategoryCommand,
    },
    /// Render a page of a file to a PNG image.
    View {
        id: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, action = clap::ArgAction::Count)]
        zoom_in: u8,
        #[arg(long, action = clap::ArgAction::Count)]
        zoom_out: u8,
        #[arg(long, action = clap::ArgAction::Count)]
        rotate: u8,
        #[arg(long, default_value = "page.png")]
        out: PathBuf,
    },
    /// Upload a file to remote storage and record it with tags.
    Publish {
        id: String,
        /// Comma separated.
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// Switch the debug log file on or off.
    Logging {
        #[command(subcommand)]
        action: LoggingCommand,
    },
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    List,
    Add { name: String },
    Rename { id: String, name: String },
    Rm { id: String },
}

#[derive(Debug, Subcommand)]
enum LoggingCommand {
    On,
    Off,
    Path,
}

struct RemoteStores {
    objects: FirebaseStorage,
    documents: Firestore,
}

fn main() -> Result<()> {
    logger::initialize();
    let cli = Cli::parse();

    if let Commands::Logging { action } = &cli.command {
        return run_logging(action);
    }

    let config = Config::load().context("failed to load configuration")?;
    let i18n = I18n::new(config.language);
    let remote = connect_remote(&config);
    let store = open_store(&config, i18n);
    let mut library = Library::open(
        store,
        i18n,
        remote
            .as_ref()
            .map(|remote| &remote.objects as &dyn ObjectStore),
    );
    print_notice(&mut library);

    let result = run(cli.command, &config, i18n, &mut library, remote.as_ref());
    print_notice(&mut library);
    result
}

fn connect_remote(config: &Config) -> Option<RemoteStores> {
    let firebase = config.firebase.as_ref()?;
    match (FirebaseStorage::new(firebase), Firestore::new(firebase)) {
        (Ok(objects), Ok(documents)) => Some(RemoteStores { objects, documents }),
        _ => None,
    }
}

fn open_store(config: &Config, i18n: I18n) -> Box<dyn MetadataStore> {
    let db_path = config.db_path();
    match SledBackend::open(&db_path) {
        Ok(backend) => Box::new(BlobStore::new(backend, config.storage_quota_bytes)),
        Err(err) => {
            pdfnest::warn_log!(
                "[store] failed to open {}, keeping data in memory: {}",
                db_path.display(),
                err
            );
            eprintln!("{}", i18n.store_unavailable);
            Box::new(BlobStore::new(
                MemoryBackend::new(),
                config.storage_quota_bytes,
            ))
        }
    }
}

fn print_notice(library: &mut Library) {
    if let Some(notice) = library.notice() {
        eprintln!("{}", notice.message);
        library.dismiss_notice();
    }
}

fn run(
    command: Commands,
    config: &Config,
    i18n: I18n,
    library: &mut Library,
    remote: Option<&RemoteStores>,
) -> Result<()> {
    match command {
        Commands::Add { files } => run_add(library, i18n, &files),
        Commands::List { category } => run_list(library, i18n, category),
        Commands::Show { id } => run_show(library, i18n, &FileId::from(id.as_str())),
        Commands::Rename { id, name } => {
            settle(library.rename_file(&FileId::from(id.as_str()), &name)?);
            Ok(())
        }
        Commands::Assign { id, category } => {
            settle(library.set_file_category(
                &FileId::from(id.as_str()),
                &CategoryId::from(category.as_str()),
            )?);
            Ok(())
        }
        Commands::Rm { id } => {
            let removed = settle(library.delete_file(&FileId::from(id.as_str()))?);
            println!("{}", removed.name);
            Ok(())
        }
        Commands::Clear => {
            let cleared = settle(library.clear_files());
            println!("{}", i18n.file_count(cleared));
            Ok(())
        }
        Commands::Export { id, dir } => run_export(library, id, &dir),
        Commands::Category { action } => run_category(library, action),
        Commands::View {
            id,
            page,
            zoom_in,
            zoom_out,
            rotate,
            out,
        } => {
            let view = ViewRequest {
                page,
                zoom_in,
                zoom_out,
                rotate,
                out: &out,
            };
            run_view(config, i18n, library, &FileId::from(id.as_str()), view)
        }
        Commands::Publish { id, tags } => {
            run_publish(library, i18n, remote, &FileId::from(id.as_str()), &tags)
        }
        Commands::Logging { action } => run_logging(&action),
    }
}

/// Returns the mutation's value; persistence failures were already posted as a notice.
fn settle<T>(outcome: Outcome<T>) -> T {
    if let Some(err) = &outcome.persist_error {
        pdfnest::debug_log!("[cli] change kept in memory only: {}", err);
    }
    outcome.value
}

fn run_add(library: &mut Library, i18n: I18n, paths: &[PathBuf]) -> Result<()> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let input = IncomingFile::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        inputs.push(input);
    }

    let report = settle(library.ingest(inputs)?);
    for id in &report.added {
        if let Some(file) = library.file(id) {
            println!("{}  {}", file.id, file.name);
        }
    }
    for rejected in &report.rejected {
        eprintln!("{}", i18n.describe(&Error::from(rejected.clone())));
    }
    Ok(())
}

fn run_list(library: &mut Library, i18n: I18n, category: Option<String>) -> Result<()> {
    let filter = match category {
        Some(id) => CategoryFilter::Category(CategoryId::from(id.as_str())),
        None => CategoryFilter::All,
    };
    library.set_filter(filter)?;

    let heading = match library.filter() {
        CategoryFilter::All => i18n.all_categories.to_string(),
        CategoryFilter::Category(id) => library
            .category(id)
            .map(|category| category.name.clone())
            .unwrap_or_else(|| id.to_string()),
    };
    let files = library.filtered_files();
    println!("{} ({})", heading, i18n.file_count(files.len()));
    if files.is_empty() {
        println!("{}", i18n.no_files);
        return Ok(());
    }

    for file in files {
        let category = library
            .category(&file.category_id)
            .map(|category| category.name.as_str())
            .unwrap_or(file.category_id.as_str());
        println!(
            "{}  {}  {}  [{}]",
            file.id,
            file.name,
            format_file_size(file.size),
            category
        );
    }
    Ok(())
}

fn run_show(library: &Library, i18n: I18n, id: &FileId) -> Result<()> {
    let Some(file) = library.file(id) else {
        bail!("{}", i18n.file_not_found(id.as_str()));
    };

    let category = library
        .category(&file.category_id)
        .map(|category| category.name.as_str())
        .unwrap_or(file.category_id.as_str());
    println!("id:       {}", file.id);
    println!("name:     {}", file.name);
    println!("file:     {}", file.source_name);
    println!("size:     {}", format_file_size(file.size));
    println!("category: {}", category);
    let source = if file.payload_ref.is_inline() {
        "inline"
    } else {
        file.payload_ref.as_str()
    };
    println!("payload:  {}", source);
    Ok(())
}

fn run_export(library: &mut Library, id: Option<String>, dir: &Path) -> Result<()> {
    let written = match id {
        Some(id) => vec![library.export_file(&FileId::from(id.as_str()), dir)?],
        None => library.export_all(dir)?,
    };
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_category(library: &mut Library, action: CategoryCommand) -> Result<()> {
    match action {
        CategoryCommand::List => {
            for category in library.categories() {
                println!(
                    "{}  {}  {}  {}",
                    category.id,
                    category.name,
                    category.color.label(),
                    library.count_in(&category.id)
                );
            }
        }
        CategoryCommand::Add { name } => {
            let id = settle(library.create_category(&name)?);
            println!("{id}");
        }
        CategoryCommand::Rename { id, name } => {
            settle(library.rename_category(&CategoryId::from(id.as_str()), &name)?);
        }
        CategoryCommand::Rm { id } => {
            let reassigned = settle(library.delete_category(&CategoryId::from(id.as_str()))?);
            println!("{reassigned}");
        }
    }
    Ok(())
}

struct ViewRequest<'a> {
    page: usize,
    zoom_in: u8,
    zoom_out: u8,
    rotate: u8,
    out: &'a Path,
}

fn run_view(
    config: &Config,
    i18n: I18n,
    library: &mut Library,
    id: &FileId,
    request: ViewRequest<'_>,
) -> Result<()> {
    let Some(file) = library.file(id).cloned() else {
        bail!("{}", i18n.file_not_found(id.as_str()));
    };

    let capability = Capability::from_init(PdfiumEngine::initialize(config.pdfium_dir.as_deref()));
    let mut viewer = ViewerController::new(capability);

    if let Err(err) = drive_viewer(&mut viewer, &file, &request) {
        let err = Error::from(err);
        library.report(&err);
        if viewer.download_only() {
            print_notice(library);
            eprintln!("{}", i18n.export_hint(id.as_str()));
        }
        return Err(err.into());
    }

    let Some(session) = viewer.session() else {
        bail!("{}", i18n.viewer_not_open);
    };
    let Some(frame) = session.frame() else {
        bail!("{}", i18n.render_failed(session.page()));
    };
    frame
        .image
        .save(request.out)
        .with_context(|| format!("failed to write {}", request.out.display()))?;

    println!(
        "{}  {}%  {}°  -> {}",
        i18n.page_indicator(session.page(), session.total_pages()),
        (session.zoom() * 100.0).round(),
        session.rotation().degrees(),
        request.out.display()
    );
    Ok(())
}

fn drive_viewer(
    viewer: &mut ViewerController,
    file: &FileRecord,
    request: &ViewRequest<'_>,
) -> Result<(), ViewerError> {
    if viewer.open(file)? == OpenStatus::Discarded {
        return Ok(());
    }
    viewer.go_to_page(request.page)?;
    for _ in 0..request.zoom_in {
        viewer.zoom_in()?;
    }
    for _ in 0..request.zoom_out {
        viewer.zoom_out()?;
    }
    for _ in 0..request.rotate {
        viewer.rotate()?;
    }
    Ok(())
}

fn run_publish(
    library: &mut Library,
    i18n: I18n,
    remote: Option<&RemoteStores>,
    id: &FileId,
    tags: &str,
) -> Result<()> {
    let Some(file) = library.file(id).cloned() else {
        bail!("{}", i18n.file_not_found(id.as_str()));
    };
    let Some(remote) = remote else {
        let err = Error::from(RemoteError::NotConfigured);
        library.report(&err);
        return Err(err.into());
    };

    match remote::publish(&remote.objects, &remote.documents, &file, tags) {
        Ok(url) => {
            println!("{}", i18n.upload_success);
            println!("{url}");
            Ok(())
        }
        Err(err) => {
            let err = Error::from(err);
            library.report(&err);
            Err(err.into())
        }
    }
}

fn run_logging(action: &LoggingCommand) -> Result<()> {
    match action {
        LoggingCommand::On => {
            let path = logger::enable_file_logging().context("failed to enable file logging")?;
            println!("{}", path.display());
        }
        LoggingCommand::Off => logger::disable_file_logging(),
        LoggingCommand::Path => println!("{}", logger::log_file_path().display()),
    }
    Ok(())
}
