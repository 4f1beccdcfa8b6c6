//! In-memory result store.

use async_trait::async_trait;
use medic_core::{Error, Lookup, Platform, Result, ResultKey, ResultRecord, ResultStore, Revision};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    results: HashSet<ResultKey>,
    failing: HashSet<ResultKey>,
}

/// Result store held in process memory.
///
/// Used for `--dry-run` passes with no store attached and as a test double.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    state: Mutex<State>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result.
    pub fn insert(&self, key: ResultKey) {
        self.state().results.insert(key);
    }

    /// Make every query touching `key` fail.
    pub fn fail_on(&self, key: ResultKey) {
        self.state().failing.insert(key);
    }

    pub fn len(&self) -> usize {
        self.state().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn get(&self, key: &ResultKey) -> Result<Lookup> {
        let state = self.state();
        if state.failing.contains(key) {
            return Err(Error::query(key.document_id(), "injected failure"));
        }
        Ok(if state.results.contains(key) {
            Lookup::Found
        } else {
            Lookup::NotFound
        })
    }

    async fn query_by_commit(
        &self,
        platform: &Platform,
        sha: &Revision,
    ) -> Result<Vec<ResultRecord>> {
        let state = self.state();
        let commit_key = ResultKey::commit(platform, sha);
        if state.failing.contains(&commit_key) {
            return Err(Error::query(commit_key.document_id(), "injected failure"));
        }

        let mut rows: Vec<ResultRecord> = state
            .results
            .iter()
            .filter(|k| k.platform() == platform && k.sha() == sha)
            .map(|k| ResultRecord {
                id: Some(k.document_id()),
                key: serde_json::Value::String(sha.to_string()),
                value: serde_json::Value::Null,
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medic_core::DeviceInfo;

    #[tokio::test]
    async fn test_point_lookup() {
        let store = MemoryResultStore::new();
        let android = Platform::new("android");
        let sha = Revision::new("c1");
        let found = ResultKey::device(&android, &sha, &DeviceInfo::new("v1", "m1"));
        let missing = ResultKey::device(&android, &sha, &DeviceInfo::new("v2", "m2"));
        store.insert(found.clone());

        assert_eq!(store.get(&found).await.unwrap(), Lookup::Found);
        assert_eq!(store.get(&missing).await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_query_by_commit() {
        let store = MemoryResultStore::new();
        let ios = Platform::new("ios");
        store.insert(ResultKey::commit(&ios, &Revision::new("c1")));
        store.insert(ResultKey::commit(&Platform::new("android"), &Revision::new("c1")));

        let rows = store.query_by_commit(&ios, &Revision::new("c1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id.as_deref(), Some("ios__c1"));

        let rows = store.query_by_commit(&ios, &Revision::new("c2")).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_not_not_found() {
        let store = MemoryResultStore::new();
        let key = ResultKey::commit(&Platform::new("ios"), &Revision::new("c1"));
        store.fail_on(key.clone());

        assert!(matches!(store.get(&key).await, Err(Error::Query { .. })));
        assert!(
            store
                .query_by_commit(&Platform::new("ios"), &Revision::new("c1"))
                .await
                .is_err()
        );
    }
}
