//! Process-wide client state shared across concurrent tool calls.

use std::sync::Arc;

use tokio::sync::Mutex;

/// The CSRF token slot, guarded independently of cookie storage.
///
/// The specification describes a single mutex guarding both the CSRF token
/// and session cookies. This client instead delegates session-cookie storage
/// to `reqwest`'s built-in cookie jar, which is already safe for concurrent
/// use internally; the remaining shared mutable field is the CSRF token
/// alone, so a dedicated mutex for it carries the same invariant the spec
/// asks for (a fetch is visible to every subsequent mutation, or the
/// mutation takes the 403 path and refreshes its own copy) without forcing
/// unrelated cookie updates through the same lock.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    csrf_token: Arc<Mutex<Option<String>>>,
}

impl ClientState {
    /// An empty state: no cached token yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently cached token, if any.
    pub async fn csrf_token(&self) -> Option<String> {
        self.csrf_token.lock().await.clone()
    }

    /// Replace the cached token (called after a successful fetch).
    pub async fn set_csrf_token(&self, token: String) {
        *self.csrf_token.lock().await = Some(token);
    }

    /// Drop the cached token, forcing the next mutation to fetch again.
    pub async fn clear_csrf_token(&self) {
        *self.csrf_token.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty_and_round_trips_a_token() {
        let state = ClientState::new();
        assert_eq!(state.csrf_token().await, None);
        state.set_csrf_token("abc123".to_owned()).await;
        assert_eq!(state.csrf_token().await.as_deref(), Some("abc123"));
        state.clear_csrf_token().await;
        assert_eq!(state.csrf_token().await, None);
    }
}
