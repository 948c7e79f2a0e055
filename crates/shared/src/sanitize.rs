//! Filename sanitization for archive entries and generated outputs.

/// Reduce a filename to a safe character set (`A-Z a-z 0-9 . _ -`).
///
/// Runs of disallowed characters collapse into a single underscore, and an
/// empty result falls back to `"document"` so archive entries always have a
/// usable name.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_replacement = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            last_was_replacement = false;
        } else if !last_was_replacement {
            out.push('_');
            last_was_replacement = true;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_').to_string();
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed
    }
}

/// Insert a suffix before the file extension: `a.pdf` + `_signed` → `a_signed.pdf`.
pub fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}{suffix}.{ext}"),
        _ => format!("{name}{suffix}"),
    }
}
