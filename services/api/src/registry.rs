//! The connection registry: the single shared map from `pc_id` to live
//! transport connection. Session bookkeeping lives in the lifecycle module;
//! this map only answers "which connection, if any, owns this id".

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::transport::Connection;

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<String, Arc<dyn Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, pc_id: &str) -> Option<Arc<dyn Connection>> {
        self.inner.lock().expect("lock poisoned").get(pc_id).cloned()
    }

    pub fn register(&self, conn: Arc<dyn Connection>) {
        self.inner
            .lock()
            .expect("lock poisoned")
            .insert(conn.pc_id().to_string(), conn);
    }

    pub fn evict(&self, pc_id: &str) -> Option<Arc<dyn Connection>> {
        self.inner.lock().expect("lock poisoned").remove(pc_id)
    }

    /// Removes and returns every registered connection.
    pub fn drain(&self) -> Vec<Arc<dyn Connection>> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .drain()
            .map(|(_, conn)| conn)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
