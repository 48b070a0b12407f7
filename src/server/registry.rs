//! Registry of connected WebSocket clients.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// A connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    /// Remote socket address.
    pub addr: SocketAddr,
    /// When the connection was upgraded.
    pub connected_at: Instant,
}

impl ClientInfo {
    /// Time elapsed since the connection was upgraded.
    #[must_use]
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Set of currently connected clients, keyed by a per-connection id.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<Uuid, ClientInfo>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection and return its id.
    pub fn register(&self, addr: SocketAddr) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(
            id,
            ClientInfo {
                addr,
                connected_at: Instant::now(),
            },
        );
        id
    }

    /// Forget a connection.
    pub fn unregister(&self, id: &Uuid) -> Option<ClientInfo> {
        self.lock().remove(id)
    }

    /// Number of connected clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no client is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, ClientInfo>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
