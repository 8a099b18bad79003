//! Artifact naming
//!
//! The remote working directory and archive names form the layout the
//! transfer step relies on: every artifact sits flat inside
//! `{tmp_root}/backup_{date}_{safe_name}` as `{safe_name}_{category}.{ext}`.

use chrono::NaiveDate;
use stowage_core::domain::target::Target;

/// Derives the filesystem-safe name prefix for a target
///
/// Characters outside `[A-Za-z0-9_.-]` become `_`. The result is never empty
/// and never made of dots only.
pub fn safe_name(target: &Target) -> String {
    sanitize(&target.display_name())
}

pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        // covers the empty string, "." and ".."
        format!("target{}", cleaned.replace('.', "_"))
    } else {
        cleaned
    }
}

/// Remote working directory for one run of one target on one day
pub fn remote_work_dir(tmp_root: &str, date: NaiveDate, safe_name: &str) -> String {
    format!(
        "{}/backup_{}_{}",
        tmp_root.trim_end_matches('/'),
        date.format("%Y-%m-%d"),
        safe_name
    )
}

pub fn archive_name(safe_name: &str, category: &str, ext: &str) -> String {
    format!("{}_{}.{}", safe_name, category, ext)
}
