//! Process-wide discovery list cache keyed by fingerprint.
//!
//! Every [`TemplateDiscovery`](super::TemplateDiscovery) in the process shares this
//! map, so a second manager over the same roots can adopt the first one's scan
//! without touching the persisted snapshot.

use crate::constants::SHARED_LIST_KEY_PREFIX;
use dashmap::DashMap;
use std::sync::LazyLock;

static SHARED_LISTS: LazyLock<DashMap<String, Vec<String>>> = LazyLock::new(DashMap::new);

fn key(fingerprint: &str) -> String {
    format!("{SHARED_LIST_KEY_PREFIX}{fingerprint}")
}

/// Names stored for `fingerprint`, if any.
pub fn fetch(fingerprint: &str) -> Option<Vec<String>> {
    SHARED_LISTS.get(&key(fingerprint)).map(|entry| entry.value().clone())
}

/// Store `names` for `fingerprint`, replacing any previous list.
pub fn store(fingerprint: &str, names: &[String]) {
    SHARED_LISTS.insert(key(fingerprint), names.to_vec());
}

/// Drop every shared list. Returns how many were removed.
pub fn clear() -> usize {
    let count = SHARED_LISTS.len();
    SHARED_LISTS.clear();
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_store_and_fetch() {
        let fp = "shared-test-fingerprint";
        assert!(fetch(fp).is_none());
        store(fp, &["a".to_string(), "@ns/b".to_string()]);
        assert_eq!(fetch(fp).unwrap(), vec!["a", "@ns/b"]);
    }
}
