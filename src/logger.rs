use std::fs::{create_dir_all, read_to_string, write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tklog::{Format, LEVEL, LOG};

const LOG_FILE_ENV: &str = "PDFNEST_LOG_FILE";
const LOG_FILE_MAX_BYTES: u64 = 10 * 1024 * 1024;
const LOG_FILE_BACKUPS: u32 = 5;

static PATHS: OnceLock<LogPaths> = OnceLock::new();
static FILE_LOGGING_ENABLED: AtomicBool = AtomicBool::new(false);
static FILE_HANDLER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Where the debug log goes and where the on/off switch is remembered.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogPaths {
    log_file: PathBuf,
    switch_file: PathBuf,
}

impl LogPaths {
    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let home = lookup("APPDATA")
            .filter(|_| cfg!(target_os = "windows"))
            .map(|dir| PathBuf::from(dir).join("pdfnest"))
            .or_else(|| lookup("HOME").map(|home| PathBuf::from(home).join(".pdfnest")));

        let log_file = match (lookup(LOG_FILE_ENV), &home) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(home)) => home.join("logs").join("debug.log"),
            (None, None) => std::env::temp_dir().join("pdfnest-debug.log"),
        };
        let switch_file = match &home {
            Some(home) => home.join("logging_enabled"),
            None => std::env::temp_dir().join("pdfnest-logging-enabled"),
        };

        Self {
            log_file,
            switch_file,
        }
    }
}

fn paths() -> &'static LogPaths {
    PATHS.get_or_init(|| {
        LogPaths::resolve(|key| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
    })
}

fn switch_is_on(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn remember_switch(enabled: bool) {
    let path = &paths().switch_file;
    if let Some(parent) = path.parent() {
        let _ = create_dir_all(parent);
    }
    let _ = write(path, if enabled { "1" } else { "0" });
}

pub fn log_file_path() -> &'static Path {
    &paths().log_file
}

pub fn file_logging_enabled() -> bool {
    FILE_LOGGING_ENABLED.load(Ordering::Relaxed)
}

/// Starts writing debug output to the rotating log file and remembers the choice.
pub fn enable_file_logging() -> std::io::Result<&'static Path> {
    let path = log_file_path();
    if file_logging_enabled() {
        return Ok(path);
    }

    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    if !FILE_HANDLER_INITIALIZED.swap(true, Ordering::Relaxed) {
        LOG.set_cutmode_by_size(
            &path.to_string_lossy(),
            LOG_FILE_MAX_BYTES,
            LOG_FILE_BACKUPS,
            true,
        );
    }

    FILE_LOGGING_ENABLED.store(true, Ordering::Relaxed);
    remember_switch(true);
    Ok(path)
}

pub fn disable_file_logging() {
    FILE_LOGGING_ENABLED.store(false, Ordering::Relaxed);
    remember_switch(false);
}

/// Console logging always; the log file too when it was left switched on.
pub fn initialize() {
    LOG.set_level(LEVEL::Debug)
        .set_console(true)
        .set_format(Format::LevelFlag | Format::Date | Format::Time | Format::ShortFileName)
        .set_formatter("{level}{time} {file}:{message}\n");

    let remembered = read_to_string(&paths().switch_file).is_ok_and(|raw| switch_is_on(&raw));
    if remembered && let Err(err) = enable_file_logging() {
        eprintln!(
            "[log] cannot open {}: {}",
            log_file_path().display(),
            err
        );
    }
}

/// Verbose diagnostics, only emitted while file logging is switched on.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        if $crate::logger::file_logging_enabled() {
            tklog::debug!(format!($($arg)*));
        }
    }};
}

/// Failures the user also sees as a notice; always emitted.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {{
        tklog::warn!(format!($($arg)*));
    }};
}
