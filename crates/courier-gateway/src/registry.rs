use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use courier_types::events::GatewayEvent;

/// Broadcast-group membership: which connections receive events for which
/// conversation. This is the gateway's only shared mutable state; it is an
/// explicit object injected into every connection handler, never a
/// module-level singleton.
#[derive(Clone)]
pub struct GroupRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// conversation_id -> (connection_id -> event sender)
    groups: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                groups: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe a connection to a conversation's group. Joining twice
    /// replaces the stored sender.
    pub async fn join(
        &self,
        conversation_id: Uuid,
        conn_id: Uuid,
        tx: mpsc::UnboundedSender<GatewayEvent>,
    ) {
        let mut groups = self.inner.groups.write().await;
        groups.entry(conversation_id).or_default().insert(conn_id, tx);
    }

    /// Unsubscribe a connection from one group. No-op if it was not
    /// subscribed.
    pub async fn leave(&self, conversation_id: Uuid, conn_id: Uuid) {
        let mut groups = self.inner.groups.write().await;
        if let Some(members) = groups.get_mut(&conversation_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                groups.remove(&conversation_id);
            }
        }
    }

    /// Remove a connection from every group it joined. Called on disconnect.
    pub async fn leave_all(&self, conn_id: Uuid) {
        let mut groups = self.inner.groups.write().await;
        groups.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Fan an event out to every connection subscribed to the conversation.
    /// Fire-and-forget: a subscriber whose channel is gone simply misses the
    /// event. Returns the number of subscribers the event was queued for.
    pub async fn publish(&self, conversation_id: Uuid, event: &GatewayEvent) -> usize {
        let groups = self.inner.groups.read().await;
        let Some(members) = groups.get(&conversation_id) else {
            return 0;
        };

        let mut delivered = 0;
        for tx in members.values() {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn is_member(&self, conversation_id: Uuid, conn_id: Uuid) -> bool {
        let groups = self.inner.groups.read().await;
        groups
            .get(&conversation_id)
            .is_some_and(|members| members.contains_key(&conn_id))
    }

    pub async fn group_size(&self, conversation_id: Uuid) -> usize {
        let groups = self.inner.groups.read().await;
        groups.get(&conversation_id).map_or(0, HashMap::len)
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
