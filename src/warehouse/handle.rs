use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use super::WarehouseClient;

/// A pooled warehouse connection.
///
/// Owned by the [`WarehousePool`](super::WarehousePool). A handle goes stale
/// after a failed query and is then replaced, never repaired.
pub struct ConnectionHandle {
    id: Uuid,
    key: String,
    client: Arc<dyn WarehouseClient>,
    connected: AtomicBool,
    closed: AtomicBool,
    /// Operations currently running on the client.
    in_flight: AtomicUsize,
    /// Milliseconds since the pool epoch.
    last_used_ms: AtomicU64,
}

impl ConnectionHandle {
    pub(crate) fn new(key: String, client: Arc<dyn WarehouseClient>, now_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            client,
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            last_used_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn last_used_ms(&self) -> u64 {
        self.last_used_ms.load(Ordering::Acquire)
    }

    /// Whether a query is running on this handle.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Count an operation as running until the guard drops.
    pub(crate) fn begin_use(&self) -> InUse<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InUse { handle: self }
    }

    pub(crate) fn client(&self) -> &Arc<dyn WarehouseClient> {
        &self.client
    }

    pub(crate) fn touch(&self, now_ms: u64) {
        self.last_used_ms.fetch_max(now_ms, Ordering::AcqRel);
    }

    pub(crate) fn mark_stale(&self) {
        self.connected.store(false, Ordering::Release);
    }

    /// Close the client once. Later calls do nothing.
    pub(crate) async fn close(&self) {
        self.mark_stale();
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.client.close().await;
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("connected", &self.is_connected())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("last_used_ms", &self.last_used_ms())
            .finish()
    }
}

/// Marks a handle busy for the guard's lifetime, including when the
/// operation's future is dropped mid-query.
pub(crate) struct InUse<'a> {
    handle: &'a ConnectionHandle,
}

impl Drop for InUse<'_> {
    fn drop(&mut self) {
        self.handle.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
