use std::sync::Arc;

use jobtrail_db::{DataStore, DbPool};
use jobtrail_storage::BlobStore;

use crate::auth::session::SessionStore;
use crate::auth::tokens::TokenFactory;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every member is an `Arc` or wraps one.
#[derive(Clone)]
pub struct AppState {
    /// Retry-wrapped relational store.
    pub db: DataStore,
    /// Retry-wrapped blob store.
    pub blobs: BlobStore,
    /// Access-token signer/verifier.
    pub tokens: Arc<TokenFactory>,
    /// Refresh-token session lifecycle.
    pub sessions: SessionStore,
    pub config: Arc<ServerConfig>,
    /// Postgres pool behind `db`, when there is one to close at teardown.
    pub pool: Option<DbPool>,
}

impl AppState {
    /// Wire the session layer on top of already-constructed gateways.
    pub fn new(db: DataStore, blobs: BlobStore, config: ServerConfig) -> Self {
        let tokens = Arc::new(TokenFactory::new(&config.jwt));
        let sessions = SessionStore::new(db.clone(), Arc::clone(&tokens));
        Self {
            db,
            blobs,
            tokens,
            sessions,
            config: Arc::new(config),
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Release external clients. Call once after the server stops.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            jobtrail_db::close_pool(pool).await;
        }
    }
}
