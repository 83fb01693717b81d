// crates/server/src/state.rs
//! Application state for the Axum server.
//!
//! The composition root: every handler reaches the token authority, the
//! job store, and the tool registry through this one object instead of
//! ambient globals, so tests can run with an isolated state per test.

use std::sync::Arc;
use std::time::Instant;

use taskgate_core::{JobStore, Launcher, TokenAuthority, ToolRegistry};

use crate::config::ServerConfig;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub config: ServerConfig,
    /// Issues and verifies session tokens; stateless apart from the secret.
    pub authority: Arc<TokenAuthority>,
    /// In-memory job registry; the only mutable shared resource.
    pub store: Arc<JobStore>,
    /// Launchable tools, immutable after startup wiring.
    pub registry: ToolRegistry,
    /// Token-gated launch adapter.
    pub launcher: Launcher,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(config: ServerConfig, registry: ToolRegistry) -> Arc<Self> {
        let authority = Arc::new(TokenAuthority::new(
            config.secret.as_bytes().to_vec(),
            config.token_ttl,
        ));
        let store = Arc::new(JobStore::new());
        let launcher = Launcher::new(Arc::clone(&authority), Arc::clone(&store));
        Arc::new(Self {
            start_time: Instant::now(),
            config,
            authority,
            store,
            registry,
            launcher,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_new() {
        let state = AppState::new(ServerConfig::default(), ToolRegistry::new());
        assert!(state.uptime_secs() < 1);
        assert!(state.store.is_empty());
    }

    #[test]
    fn test_states_are_isolated() {
        let a = AppState::new(ServerConfig::default(), ToolRegistry::new());
        let b = AppState::new(ServerConfig::default(), ToolRegistry::new());

        a.store.put(taskgate_core::Job::new("j1", "s1", None));
        assert_eq!(a.store.len(), 1);
        assert!(b.store.is_empty());
    }
}
