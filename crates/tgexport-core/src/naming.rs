//! Naming rules: combined filenames, post URLs, extensions and output names.

use chrono::{DateTime, NaiveDate, Utc};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// `<YYYYMMDD>-<file name>`, the local name an attachment is exported under.
pub fn combined_name(posted: &DateTime<Utc>, file_name: &str) -> String {
    format!("{}-{file_name}", posted.format("%Y%m%d"))
}

/// Canonical link to a channel post.
///
/// Public channels use their username; private ones use the `/c/` form with the
/// absolute numeric id.
pub fn post_url(username: Option<&str>, channel_id: i64, message_id: i32) -> String {
    match username {
        Some(u) if !u.is_empty() => format!("https://t.me/{u}/{message_id}"),
        _ => format!("https://t.me/c/{}/{message_id}", channel_id.unsigned_abs()),
    }
}

/// Lowercased extension including the dot (`"Report.ZIP"` -> `".zip"`).
///
/// Leading dots of the name do not start an extension, so `".bashrc"` has none.
pub fn extension_of(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem_start = base.len() - base.trim_start_matches('.').len();
    match base[stem_start..].rfind('.') {
        Some(idx) => base[stem_start + idx..].to_lowercase(),
        None => String::new(),
    }
}

/// Normalise a user-supplied extension to the `".ext"` lowercase form.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

pub fn size_in_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Channel identifier made safe for a file name: `@` dropped, `/` -> `_`.
pub fn sanitize_channel_name(channel: &str) -> String {
    channel.replace('@', "").replace('/', "_")
}

/// `<YYYYMMDD>-<sanitized channel>.<ext>`
pub fn default_output_filename(run_date: NaiveDate, channel: &str, ext: &str) -> String {
    format!(
        "{}-{}.{ext}",
        run_date.format("%Y%m%d"),
        sanitize_channel_name(channel)
    )
}
