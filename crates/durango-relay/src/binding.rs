//! Agent-thread-id → downstream-thread-id binding map. Bindings are set
//! before any `event.upsert` can be emitted for that agent thread and are
//! never removed during a session; lookups for an unbound agent thread
//! return `None`, which callers treat as "drop the event".

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct ThreadBindings {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl ThreadBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the downstream id for an agent-initiated thread.
    pub fn derive_downstream_id(codex_thread_id: &str) -> String {
        format!("codex:{codex_thread_id}")
    }

    pub async fn bind(&self, codex_thread_id: impl Into<String>, downstream_thread_id: impl Into<String>) {
        self.inner
            .lock()
            .await
            .insert(codex_thread_id.into(), downstream_thread_id.into());
    }

    pub async fn resolve(&self, codex_thread_id: &str) -> Option<String> {
        self.inner.lock().await.get(codex_thread_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbound_thread_resolves_to_none() {
        let bindings = ThreadBindings::new();
        assert_eq!(bindings.resolve("unknown").await, None);
    }

    #[tokio::test]
    async fn bound_thread_resolves_to_its_downstream_id() {
        let bindings = ThreadBindings::new();
        bindings.bind("agent-1", "relay-thread-1").await;
        assert_eq!(bindings.resolve("agent-1").await, Some("relay-thread-1".to_string()));
    }

    #[test]
    fn derived_id_uses_codex_prefix() {
        assert_eq!(ThreadBindings::derive_downstream_id("abc"), "codex:abc");
    }
}
