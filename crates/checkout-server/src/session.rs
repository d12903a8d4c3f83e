//! Checkout Sessions
//!
//! One flow controller per checkout, each with its own notification feed
//! standing in for the browser's toasts and router.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use checkout_core::{CheckoutFlow, FlowConfig, NotificationFeed, PaymentGateway};
use uuid::Uuid;

/// A hosted checkout
pub struct CheckoutSession {
    pub id: Uuid,
    pub flow: CheckoutFlow,
    pub feed: Arc<NotificationFeed>,
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(gateway: Arc<dyn PaymentGateway>, config: FlowConfig) -> Self {
        let feed = Arc::new(NotificationFeed::new());
        Self {
            id: Uuid::new_v4(),
            flow: CheckoutFlow::new(gateway, feed.clone(), feed.clone(), config),
            feed,
            created_at: Utc::now(),
        }
    }

    /// Last route the flow navigated to
    pub fn redirect(&self) -> Option<String> {
        self.feed.routes().pop()
    }
}

/// In-memory session registry
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<CheckoutSession>>>,
    /// Settled sessions older than this are pruned
    retention: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::hours(1))
    }
}

impl SessionRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retention,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, Arc<CheckoutSession>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, Arc<CheckoutSession>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, session: Arc<CheckoutSession>) {
        self.write().insert(session.id, session);
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<CheckoutSession>> {
        self.read().get(id).cloned()
    }

    /// Remove a session and tear its flow down
    pub fn remove(&self, id: &Uuid) -> Option<Arc<CheckoutSession>> {
        let session = self.write().remove(id)?;
        session.flow.dispose();
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Drop settled sessions past the retention window
    pub fn prune(&self) -> usize {
        let cutoff = Utc::now() - self.retention;
        let mut sessions = self.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at > cutoff || s.flow.state().is_busy());
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, remaining = sessions.len(), "Pruned checkout sessions");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::MockGateway;

    #[tokio::test]
    async fn test_registry_roundtrip() {
        let registry = SessionRegistry::default();
        let session = Arc::new(CheckoutSession::new(Arc::new(MockGateway::new()), FlowConfig::default()));
        let id = session.id;

        registry.insert(session);
        assert!(registry.get(&id).is_some());
        assert!(registry.remove(&id).is_some());
        assert!(registry.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_prune_keeps_fresh_sessions() {
        let registry = SessionRegistry::new(Duration::zero());
        let mut stale = CheckoutSession::new(Arc::new(MockGateway::new()), FlowConfig::default());
        stale.created_at = Utc::now() - Duration::minutes(5);
        registry.insert(Arc::new(stale));

        let fresh_registry = SessionRegistry::default();
        fresh_registry.insert(Arc::new(CheckoutSession::new(
            Arc::new(MockGateway::new()),
            FlowConfig::default(),
        )));

        assert_eq!(registry.prune(), 1);
        assert_eq!(fresh_registry.prune(), 0);
        assert_eq!(fresh_registry.len(), 1);
    }
}
