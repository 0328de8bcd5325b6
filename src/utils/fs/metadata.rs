//! Modification-time sampling.
//!
//! Callers in this crate treat an unreadable timestamp as "unknown" rather than an
//! error, so both helpers return `Option` instead of `Result`.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Modification time of `path` in whole seconds since the Unix epoch.
///
/// Used for artifact freshness checks, where second resolution matches the
/// timestamp stored alongside remote artifacts.
pub fn modified_secs(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since.as_secs()).ok()
}

/// Modification time of `path` in nanoseconds since the Unix epoch.
///
/// Used for discovery fingerprints, where sub-second resolution avoids missing a
/// change made within the same second as the previous scan.
pub fn modified_nanos(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since.as_nanos()).ok()
}
