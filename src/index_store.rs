//! Document index abstraction.
//!
//! The [`DocumentIndex`] trait covers the handful of operations the
//! indexer and `etl status` need, so the HTTP backend can be swapped for
//! [`InMemoryIndex`] in tests.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](DocumentIndex::upsert) | Create or overwrite one document by ID |
//! | [`purge`](DocumentIndex::purge) | Remove every document in the index |
//! | [`refresh`](DocumentIndex::refresh) | Make recent writes visible to reads |
//! | [`count`](DocumentIndex::count) | Number of documents in the index |

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::config::IndexConfig;
use crate::error::{EtlError, Result};

/// A flat key-value document, keys in column order.
pub type Document = Map<String, JsonValue>;

#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Index name documents are written to.
    fn name(&self) -> &str;

    async fn upsert(&self, id: &str, doc: &Document) -> Result<()>;

    async fn purge(&self) -> Result<()>;

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self) -> Result<u64>;
}

// ============ HTTP (Elasticsearch-compatible) ============

/// Index store reached over HTTP using the Elasticsearch document API.
pub struct HttpIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl HttpIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.name.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.index, path)
    }
}

/// Turn a non-success response into [`EtlError::IndexRejected`].
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EtlError::IndexRejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl DocumentIndex for HttpIndex {
    fn name(&self) -> &str {
        &self.index
    }

    async fn upsert(&self, id: &str, doc: &Document) -> Result<()> {
        let response = self
            .client
            .put(self.endpoint(&format!("_doc/{}", id)))
            .json(doc)
            .send()
            .await?;
        let response = check(response).await?;
        debug!(id, status = response.status().as_u16(), "document indexed");
        Ok(())
    }

    async fn purge(&self) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.base_url, self.index))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        let response = self.client.post(self.endpoint("_refresh")).send().await?;
        // A run with no documents never creates the index.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self.client.get(self.endpoint("_count")).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let body = check(response).await?.text().await?;
        let json: JsonValue = serde_json::from_str(&body)?;
        json.get("count")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| EtlError::IndexRejected {
                status: 200,
                body: format!("count response without a count field: {}", json),
            })
    }
}

// ============ In-memory ============

/// In-memory index for tests and dry runs.
///
/// `fail_at` makes the n-th upsert (0-based) fail, to exercise
/// partial-index handling.
pub struct InMemoryIndex {
    name: String,
    docs: RwLock<BTreeMap<String, Document>>,
    upserts: AtomicUsize,
    fail_at: Option<usize>,
}

impl InMemoryIndex {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            docs: RwLock::new(BTreeMap::new()),
            upserts: AtomicUsize::new(0),
            fail_at: None,
        }
    }

    pub fn failing_at(name: &str, n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::new(name)
        }
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.docs.read().unwrap().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs.read().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, id: &str, doc: &Document) -> Result<()> {
        let attempt = self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(attempt) {
            return Err(EtlError::IndexRejected {
                status: 503,
                body: format!("injected failure for document {}", id),
            });
        }
        self.docs
            .write()
            .unwrap()
            .insert(id.to_string(), doc.clone());
        Ok(())
    }

    async fn purge(&self) -> Result<()> {
        self.docs.write().unwrap().clear();
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.docs.read().unwrap().len() as u64)
    }
}
