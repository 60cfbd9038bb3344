//! Checked-out connection handles

use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use dbpool_core::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one checkout, minted on every `acquire`
///
/// The same physical connection gets a new id each time it is handed out,
/// so an id from an earlier checkout never matches a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(Uuid);

impl HandleId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exclusive access to a pooled connection until it is released
///
/// The handle is not `Clone`: `ConnectionPool::release` consumes it, so
/// the session cannot be reached through it afterwards. Handles compare and
/// hash by `HandleId` only.
pub struct ConnectionHandle {
    id: HandleId,
    connection: Arc<dyn Connection>,
}

impl ConnectionHandle {
    pub(crate) fn new(id: HandleId, connection: Arc<dyn Connection>) -> Self {
        Self { id, connection }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub(crate) fn into_parts(self) -> (HandleId, Arc<dyn Connection>) {
        (self.id, self.connection)
    }
}

impl Deref for ConnectionHandle {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("driver", &self.connection.driver_name())
            .finish()
    }
}
