use std::path::Path;

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

pub fn display_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Display name for a freshly ingested file: the source name without its `.pdf` suffix.
pub fn display_name_for(file_name: &str) -> String {
    let trimmed = file_name.trim();
    let len = trimmed.len();
    if len > 4 && trimmed.is_char_boundary(len - 4) && trimmed[len - 4..].eq_ignore_ascii_case(".pdf")
    {
        return trimmed[..len - 4].to_string();
    }
    trimmed.to_string()
}

/// Name used when a payload is written back out, `<display name>.pdf`.
pub fn export_file_name(display_name: &str) -> String {
    let sanitized: String = display_name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "document.pdf".to_string();
    }
    format!("{sanitized}.pdf")
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}
