//! Local view of the server's document list.
//!
//! The list is owned by the server; this index is a read-through cache.
//! Deletion is optimistic: the name disappears locally first, and is put
//! back (and the failure reported) if the server rejects the delete.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, warn};

use askdoc_core::Result;

use crate::api::ApiClient;

/// Read-through cache of ingested document names.
pub struct DocumentIndex {
    api: Arc<ApiClient>,
    names: Mutex<Vec<String>>,
    changed: watch::Sender<u64>,
}

impl DocumentIndex {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            api,
            names: Mutex::new(Vec::new()),
            changed,
        }
    }

    /// Snapshot of the cached names.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    /// Watch for list changes. The value is a generation counter; observers
    /// re-read [`names`](Self::names) when it ticks.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Re-read the list from the server, replacing the cache.
    pub async fn refresh(&self) -> Result<Vec<String>> {
        let names = self.api.list_documents().await?;
        debug!(count = names.len(), "document list refreshed");
        *self.names.lock().unwrap() = names.clone();
        self.bump();
        Ok(names)
    }

    /// Delete one document.
    ///
    /// The name is removed locally before the request goes out; if the
    /// server rejects the delete, the removal is rolled back and the error
    /// returned for reporting.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let removed_at = {
            let mut names = self.names.lock().unwrap();
            match names.iter().position(|n| n == name) {
                Some(index) => {
                    names.remove(index);
                    Some(index)
                }
                None => None,
            }
        };
        if removed_at.is_some() {
            self.bump();
        }

        match self.api.delete_document(name).await {
            Ok(()) => {
                debug!(file_name = name, "document deleted");
                Ok(())
            }
            Err(e) => {
                if let Some(index) = removed_at {
                    let mut names = self.names.lock().unwrap();
                    let index = index.min(names.len());
                    names.insert(index, name.to_string());
                    drop(names);
                    self.bump();
                }
                warn!(file_name = name, error = %e, "delete rejected, restoring local entry");
                Err(e)
            }
        }
    }

    fn bump(&self) {
        self.changed.send_modify(|generation| *generation += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[test]
    fn test_names_starts_empty() {
        let api = Arc::new(ApiClient::new(ClientConfig::default()).unwrap());
        let index = DocumentIndex::new(api);
        assert!(index.names().is_empty());
    }
}
