use std::sync::Arc;

use crate::config::Config;
use crate::notes::store::NoteStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// `PgNoteStore` when `DATABASE_URL` is set, `MemoryNoteStore` otherwise.
    pub store: Arc<dyn NoteStore>,
    pub config: Config,
}
