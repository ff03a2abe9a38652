//! Client-supplied filename sanitization.
//!
//! Uploaded names are only ever used for display and as part of a storage
//! key, never as a path on their own.

/// Maximum length of a sanitized name in bytes.
pub const MAX_FILENAME_LEN: usize = 255;

/// Name used when nothing usable survives sanitization.
pub const FALLBACK_FILENAME: &str = "upload";

/// Reduce a declared filename to a safe display name.
///
/// - Drops any directory component (`/` or `\` separated).
/// - Replaces every character outside `[A-Za-z0-9._-]` with `_`.
/// - Truncates to [`MAX_FILENAME_LEN`] bytes, keeping the extension.
///
/// # Examples
///
/// ```
/// use stemdeck_core::sanitize::sanitize_filename;
///
/// assert_eq!(sanitize_filename("with spaces.mp3"), "with_spaces.mp3");
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
/// ```
pub fn sanitize_filename(declared: &str) -> String {
    let base = declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    if base.is_empty() || base == "." || base == ".." {
        return FALLBACK_FILENAME.to_string();
    }

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    truncate_preserving_extension(cleaned, MAX_FILENAME_LEN)
}

/// Cut `name` down to `max` bytes, keeping its extension when it fits.
///
/// `name` must be ASCII, which [`sanitize_filename`] guarantees.
fn truncate_preserving_extension(name: String, max: usize) -> String {
    if name.len() <= max {
        return name;
    }

    match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot < max => {
            let ext = &name[dot..];
            let stem = &name[..max - ext.len()];
            format!("{stem}{ext}")
        }
        _ => name[..max].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_safe_names() {
        assert_eq!(sanitize_filename("normal.mp3"), "normal.mp3");
        assert_eq!(sanitize_filename("track_01-final.flac"), "track_01-final.flac");
    }

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("with spaces.mp3"), "with_spaces.mp3");
        assert_eq!(sanitize_filename("file;rm -rf.mp3"), "file_rm_-rf.mp3");
        assert_eq!(sanitize_filename("caf\u{e9}.wav"), "caf_.wav");
    }

    #[test]
    fn strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("path/to/file.wav"), "file.wav");
        assert_eq!(sanitize_filename("C:\\music\\song.mp3"), "song.mp3");
    }

    #[test]
    fn degenerate_names_use_fallback() {
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("dir/"), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(".."), FALLBACK_FILENAME);
    }

    #[test]
    fn long_names_keep_extension() {
        let long = format!("{}.mp3", "a".repeat(400));
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), MAX_FILENAME_LEN);
        assert!(sanitized.ends_with(".mp3"));
    }

    #[test]
    fn long_names_without_extension_are_cut() {
        let sanitized = sanitize_filename(&"b".repeat(300));
        assert_eq!(sanitized.len(), MAX_FILENAME_LEN);
    }
}
