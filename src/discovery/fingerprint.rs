//! Modification-time fingerprint of the search roots.
//!
//! A fingerprint decides whether a persisted name list can be reused by a new
//! process without rescanning. It hashes the canonical root structure together with
//! a sampled modification time per root:
//!
//! - depth `0`: the root directory's own mtime
//! - depth `d > 0`: the root mtime XOR the mtimes of every subdirectory up to `d`
//!   levels below it, visited breadth-first
//!
//! Depth `0` misses edits deeper than direct children of a root. That window is
//! accepted; raise the depth in configuration to narrow it at the cost of a walk.

use super::roots::CanonicalRoots;
use crate::utils::fs::modified_nanos;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

/// Sampled mtime contribution of one root directory. Missing directories count as `0`.
pub fn sample_dir_mtime(dir: &Path, depth: usize) -> i64 {
    if !dir.is_dir() {
        return 0;
    }
    let mut mtime = modified_nanos(dir).unwrap_or(0);
    if depth == 0 {
        return mtime;
    }

    let mut queue: VecDeque<(PathBuf, usize)> = VecDeque::from([(dir.to_path_buf(), 0)]);
    while let Some((current, level)) = queue.pop_front() {
        if level >= depth {
            continue;
        }
        let Ok(entries) = fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                mtime ^= modified_nanos(&path).unwrap_or(0);
                queue.push_back((path, level + 1));
            }
        }
    }
    mtime
}

/// Fingerprint of `canonical` at the given sampling depth (SHA-256 hex).
pub fn compute(canonical: &CanonicalRoots, depth: usize) -> String {
    let times: BTreeMap<&str, BTreeMap<&str, i64>> = canonical
        .iter()
        .map(|(ns, paths)| {
            let per_path = paths
                .iter()
                .map(|p| (p.as_str(), sample_dir_mtime(Path::new(p), depth)))
                .collect();
            (ns.as_str(), per_path)
        })
        .collect();

    let payload = serde_json::to_string(&(canonical, &times)).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
