use std::sync::Arc;

use crate::notify::NotificationDispatcher;
use crate::services::{PurchaseEngine, SessionAuthority};
use crate::store::Store;

/// Shared handler state, generic over the persistence backend.
#[derive(Clone)]
pub struct AppState<S> {
    pub store: S,
    pub sessions: Arc<SessionAuthority<S>>,
    pub purchases: Arc<PurchaseEngine<S>>,
    pub notifications: NotificationDispatcher,
}

impl<S: Store> AppState<S> {
    pub fn new(
        store: S,
        sessions: SessionAuthority<S>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            purchases: Arc::new(PurchaseEngine::new(store.clone())),
            sessions: Arc::new(sessions),
            store,
            notifications,
        }
    }
}
