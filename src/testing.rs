//! In-memory doubles for the driver seams.
//!
//! Each double is cheap to clone; clones share their call recordings, so a
//! test can hand one clone to the code under test and inspect another.
//! Responses are matched by SQL substring in registration order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::SqlExecutor;
use crate::config::ConnectionConfig;
use crate::document::{Document, DocumentSource, RawDocumentIndex};
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::{BackendConnector, MetadataBackend, Row};
use crate::warehouse::{WarehouseClient, WarehouseDriver, WarehouseSession};

/// Build a row from a JSON object literal.
///
/// # Panics
///
/// If `value` is not an object.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row() expects a JSON object, got {}", other),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
struct SqlRule {
    pattern: String,
    binds: Option<Vec<String>>,
    response: Result<Vec<Row>, String>,
}

impl SqlRule {
    fn matches(&self, sql: &str) -> bool {
        sql.contains(&self.pattern)
    }
}

// ============================================================================
// Relational
// ============================================================================

/// Scripted [`SqlExecutor`].
#[derive(Debug, Clone, Default)]
pub struct MockSqlExecutor {
    rules: Vec<SqlRule>,
    executed: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    closes: Arc<AtomicUsize>,
}

impl MockSqlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer SQL containing `pattern` with `rows`.
    pub fn on(mut self, pattern: &str, rows: Vec<Row>) -> Self {
        self.rules.push(SqlRule {
            pattern: pattern.to_string(),
            binds: None,
            response: Ok(rows),
        });
        self
    }

    /// Answer SQL containing `pattern` bound with exactly `binds`.
    /// Takes precedence over [`on`](Self::on) rules.
    pub fn on_binds(mut self, pattern: &str, binds: &[&str], rows: Vec<Row>) -> Self {
        self.rules.push(SqlRule {
            pattern: pattern.to_string(),
            binds: Some(binds.iter().map(|b| b.to_string()).collect()),
            response: Ok(rows),
        });
        self
    }

    /// Fail SQL containing `pattern`.
    pub fn fail(mut self, pattern: &str, message: &str) -> Self {
        self.rules.push(SqlRule {
            pattern: pattern.to_string(),
            binds: None,
            response: Err(message.to_string()),
        });
        self
    }

    /// Fail SQL containing `pattern` bound with exactly `binds`.
    pub fn fail_binds(mut self, pattern: &str, binds: &[&str], message: &str) -> Self {
        self.rules.push(SqlRule {
            pattern: pattern.to_string(),
            binds: Some(binds.iter().map(|b| b.to_string()).collect()),
            response: Err(message.to_string()),
        });
        self
    }

    /// Every statement run so far, with its binds.
    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.executed).clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlExecutor for MockSqlExecutor {
    async fn fetch_all(&self, sql: &str, binds: &[&str]) -> MetadataResult<Vec<Row>> {
        let binds: Vec<String> = binds.iter().map(|b| b.to_string()).collect();
        lock(&self.executed).push((sql.to_string(), binds.clone()));

        let exact = self
            .rules
            .iter()
            .find(|rule| rule.matches(sql) && rule.binds.as_ref() == Some(&binds));
        let rule = exact.or_else(|| {
            self.rules
                .iter()
                .find(|rule| rule.matches(sql) && rule.binds.is_none())
        });

        match rule.map(|rule| &rule.response) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(MetadataError::query(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// [`BackendConnector`] handing out prepared backends in turn.
///
/// The last backend is reused once the sequence runs out.
#[derive(Clone)]
pub struct MockConnector {
    backends: Arc<Mutex<VecDeque<Arc<dyn MetadataBackend>>>>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(backend: Arc<dyn MetadataBackend>) -> Self {
        Self::sequence(vec![backend])
    }

    pub fn sequence(backends: Vec<Arc<dyn MetadataBackend>>) -> Self {
        Self {
            backends: Arc::new(Mutex::new(backends.into())),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendConnector for MockConnector {
    async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn MetadataBackend>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let mut backends = lock(&self.backends);
        let backend = if backends.len() > 1 {
            backends.pop_front()
        } else {
            backends.front().cloned()
        };
        backend.ok_or_else(|| MetadataError::ConnectionFailed {
            target: config.display_target(),
            message: "no backend prepared".to_string(),
        })
    }
}

// ============================================================================
// Document
// ============================================================================

/// Scripted [`DocumentSource`] for one or more databases' worth of
/// collections (the database argument is ignored).
#[derive(Debug, Clone, Default)]
pub struct MockDocumentSource {
    collections: BTreeMap<String, Vec<Document>>,
    indexes: HashMap<String, Vec<RawDocumentIndex>>,
    counts: HashMap<String, u64>,
    failing_samples: HashMap<String, String>,
    failing_indexes: HashMap<String, String>,
    failing_counts: HashMap<String, String>,
    commands: Arc<Mutex<Vec<Document>>>,
    closes: Arc<AtomicUsize>,
}

impl MockDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collection whose sample is `documents`.
    pub fn collection(mut self, name: &str, documents: Vec<Value>) -> Self {
        self.collections
            .insert(name.to_string(), documents.into_iter().map(row).collect());
        self
    }

    pub fn indexes(mut self, name: &str, indexes: Vec<RawDocumentIndex>) -> Self {
        self.indexes.insert(name.to_string(), indexes);
        self
    }

    /// Estimated count for a collection. Defaults to the sample length.
    pub fn count(mut self, name: &str, count: u64) -> Self {
        self.counts.insert(name.to_string(), count);
        self
    }

    pub fn fail_sample(mut self, name: &str, message: &str) -> Self {
        self.collections.entry(name.to_string()).or_default();
        self.failing_samples.insert(name.to_string(), message.to_string());
        self
    }

    pub fn fail_indexes(mut self, name: &str, message: &str) -> Self {
        self.failing_indexes.insert(name.to_string(), message.to_string());
        self
    }

    pub fn fail_count(mut self, name: &str, message: &str) -> Self {
        self.failing_counts.insert(name.to_string(), message.to_string());
        self
    }

    /// Commands received by `run_command`.
    pub fn commands(&self) -> Vec<Document> {
        lock(&self.commands).clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    async fn list_collections(&self, _database: &str) -> MetadataResult<Vec<String>> {
        Ok(self.collections.keys().cloned().collect())
    }

    async fn sample_documents(&self, _database: &str, collection: &str, size: usize) -> MetadataResult<Vec<Document>> {
        if let Some(message) = self.failing_samples.get(collection) {
            return Err(MetadataError::query(message));
        }
        Ok(self
            .collections
            .get(collection)
            .map(|docs| docs.iter().take(size).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_indexes(&self, _database: &str, collection: &str) -> MetadataResult<Vec<RawDocumentIndex>> {
        if let Some(message) = self.failing_indexes.get(collection) {
            return Err(MetadataError::query(message));
        }
        Ok(self.indexes.get(collection).cloned().unwrap_or_default())
    }

    async fn estimated_count(&self, _database: &str, collection: &str) -> MetadataResult<u64> {
        if let Some(message) = self.failing_counts.get(collection) {
            return Err(MetadataError::query(message));
        }
        Ok(self.counts.get(collection).copied().unwrap_or_else(|| {
            self.collections
                .get(collection)
                .map_or(0, |docs| docs.len() as u64)
        }))
    }

    async fn run_command(&self, _database: &str, command: Document) -> MetadataResult<Row> {
        lock(&self.commands).push(command);
        Ok(row(serde_json::json!({"ok": 1})))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Warehouse
// ============================================================================

#[derive(Debug, Default)]
struct WarehouseRecorder {
    connect_attempts: AtomicUsize,
    closed_clients: AtomicUsize,
    active_queries: AtomicUsize,
    max_active_queries: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
struct WarehouseScript {
    rules: Vec<SqlRule>,
    connect_error: Option<String>,
    connect_delay: Option<Duration>,
    query_delay: Option<Duration>,
}

/// Scripted [`WarehouseDriver`].
#[derive(Debug, Clone, Default)]
pub struct MockWarehouseDriver {
    script: WarehouseScript,
    recorder: Arc<WarehouseRecorder>,
}

impl MockWarehouseDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer SQL containing `pattern` with `rows`.
    pub fn on(mut self, pattern: &str, rows: Vec<Row>) -> Self {
        self.script.rules.push(SqlRule {
            pattern: pattern.to_string(),
            binds: None,
            response: Ok(rows),
        });
        self
    }

    /// Fail SQL containing `pattern`.
    pub fn fail_query(mut self, pattern: &str) -> Self {
        self.script.rules.push(SqlRule {
            pattern: pattern.to_string(),
            binds: None,
            response: Err(format!("query failed: {}", pattern)),
        });
        self
    }

    /// Fail every connect attempt.
    pub fn fail_connect(mut self, message: &str) -> Self {
        self.script.connect_error = Some(message.to_string());
        self
    }

    /// Sleep before each connect completes.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.script.connect_delay = Some(delay);
        self
    }

    /// Sleep inside each query.
    pub fn query_delay(mut self, delay: Duration) -> Self {
        self.script.query_delay = Some(delay);
        self
    }

    pub fn connect_attempts(&self) -> usize {
        self.recorder.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn closed_clients(&self) -> usize {
        self.recorder.closed_clients.load(Ordering::SeqCst)
    }

    /// Highest number of queries observed running at once.
    pub fn max_concurrent_queries(&self) -> usize {
        self.recorder.max_active_queries.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        lock(&self.recorder.executed).clone()
    }
}

#[async_trait]
impl WarehouseDriver for MockWarehouseDriver {
    async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn WarehouseClient>> {
        self.recorder.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.script.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.script.connect_error {
            return Err(MetadataError::ConnectionFailed {
                target: config.display_target(),
                message: message.clone(),
            });
        }
        Ok(Arc::new(MockWarehouseClient {
            script: self.script.clone(),
            recorder: self.recorder.clone(),
        }))
    }
}

struct MockWarehouseClient {
    script: WarehouseScript,
    recorder: Arc<WarehouseRecorder>,
}

#[async_trait]
impl WarehouseClient for MockWarehouseClient {
    async fn open_session(&self) -> MetadataResult<Box<dyn WarehouseSession>> {
        Ok(Box::new(MockWarehouseSession {
            script: self.script.clone(),
            recorder: self.recorder.clone(),
        }))
    }

    async fn close(&self) {
        self.recorder.closed_clients.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockWarehouseSession {
    script: WarehouseScript,
    recorder: Arc<WarehouseRecorder>,
}

#[async_trait]
impl WarehouseSession for MockWarehouseSession {
    async fn execute(&mut self, sql: &str) -> MetadataResult<Vec<Row>> {
        lock(&self.recorder.executed).push(sql.to_string());

        let active = self.recorder.active_queries.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_active_queries.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.script.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.recorder.active_queries.fetch_sub(1, Ordering::SeqCst);

        match self
            .script
            .rules
            .iter()
            .find(|rule| rule.matches(sql))
            .map(|rule| &rule.response)
        {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(MetadataError::query(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn close(self: Box<Self>) {}
}
