//! Stored filename generation.
//!
//! Names are made unique once, when the upload is written to disk. Preview names are
//! derived from the stored name so they inherit its uniqueness.

use rand::Rng;

const RANDOM_SUFFIX_BOUND: u32 = 1_000_000_000;

/// Replaces whitespace runs with `_` and drops path separators and control characters.
/// An empty result becomes `file`.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c == '/' || c == '\\' || c.is_control() {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits at the final dot. The extension keeps its dot; names without one (or with
/// only a leading dot) have an empty extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// `<base>-<unix millis>-<random>.<ext>` for a client supplied filename.
pub fn unique_stored_name(original: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = rand::rng().random_range(0..RANDOM_SUFFIX_BOUND);
    stored_name_with(original, millis, suffix)
}

fn stored_name_with(original: &str, millis: i64, suffix: u32) -> String {
    let sanitized = sanitize_filename(original);
    let (base, ext) = split_extension(&sanitized);
    format!("{}-{}-{}{}", base, millis, suffix, ext.to_ascii_lowercase())
}

/// Base used for preview filenames: the stored name without its extension.
pub fn preview_base(stored_name: &str) -> String {
    let sanitized = sanitize_filename(stored_name);
    split_extension(&sanitized).0.to_string()
}
