use crate::schema::{describe, SchemaDescriptor};
use crate::session::history::ConversationLog;
use crate::table::dataset::Dataset;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Everything one session owns. Dataset, descriptor, and log live and die
/// together: installing a dataset resets the log, and session removal drops
/// all three at once.
#[derive(Default)]
pub struct SessionState {
    dataset: Option<Dataset>,
    descriptor: Option<SchemaDescriptor>,
    log: ConversationLog,
}

impl SessionState {
    /// Replace the dataset. The descriptor is recomputed here and nowhere
    /// else, so it can never go stale against the data it describes.
    pub fn install_dataset(&mut self, dataset: Dataset) {
        self.descriptor = Some(describe(&dataset));
        self.dataset = Some(dataset);
        self.log.clear();
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn descriptor(&self) -> Option<&SchemaDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ConversationLog {
        &mut self.log
    }
}

/// Per-session state keyed by session id. Each session's state sits behind
/// its own async mutex: one upload or chat call holds exclusive access to
/// that session for its whole duration, and sessions never share anything.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(SessionState::default())));
        tracing::info!(session = %id, "session created");
        id
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session = %id, "session removed");
        }
        removed
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::dataset::Cell;

    fn dataset(value: i64) -> Dataset {
        Dataset::new(vec!["gross_sal".to_string()], vec![vec![Cell::Int(value)]]).unwrap()
    }

    #[tokio::test]
    async fn test_install_resets_log_and_descriptor() {
        let mut state = SessionState::default();
        state.log_mut().append_exchange("q", "e");
        state.install_dataset(dataset(1));

        assert!(state.log().is_empty());
        assert_eq!(state.descriptor().unwrap().record_count(), 1);

        state.install_dataset(dataset(2));
        assert_eq!(state.descriptor().unwrap().record_count(), 1);
        assert!(state.dataset().is_some());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.create_session().await;
        let b = store.create_session().await;
        assert_ne!(a, b);

        store
            .get(&a)
            .await
            .unwrap()
            .lock()
            .await
            .install_dataset(dataset(42000));

        let state_b = store.get(&b).await.unwrap();
        assert!(state_b.lock().await.dataset().is_none());

        let state_a = store.get(&a).await.unwrap();
        assert_eq!(
            state_a.lock().await.dataset().unwrap().row_count(),
            1
        );
    }

    #[tokio::test]
    async fn test_remove_drops_everything() {
        let store = SessionStore::new();
        let id = store.create_session().await;
        assert_eq!(store.count().await, 1);
        assert!(store.remove(&id).await);
        assert!(!store.remove(&id).await);
        assert!(store.get(&id).await.is_none());
    }
}
