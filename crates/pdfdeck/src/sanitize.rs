//! Helpers for file names that come from clients or end up in spans.
//!
//! Traces are safe to share for debugging: span fields only carry file
//! names, never the directories jobs live in.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: keeps the file name, drops the directories.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Makes a client-supplied name safe to use as a single path component.
///
/// Directory parts are dropped, separators and control characters become
/// `_`, and leading dots are stripped so the result can never name a parent
/// or hidden entry. Falls back to `document` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.').trim();
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derives the artifact display name from the uploaded name:
/// `Quarterly Report.pdf` + `pptx` → `Quarterly Report.pptx`.
pub fn artifact_filename(original_filename: &str, extension: &str) -> String {
    let safe = sanitize_filename(original_filename);
    let stem = Path::new(&safe)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{}.{}", stem, extension)
}
